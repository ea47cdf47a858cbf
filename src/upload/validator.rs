use crate::error::ValidationError;
use crate::upload::types::SelectedFile;

pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Checks a candidate file against an `accept` list such as `".csv, text/*"`.
///
/// Entries containing `/` are MIME types (`type/*` matches by prefix), entries
/// starting with `.` are filename suffixes, and bare words are treated as
/// extensions. Matching is case-insensitive.
pub fn validate(file: Option<&SelectedFile>, accept: &str) -> Result<(), ValidationError> {
    let file = file.ok_or(ValidationError::NoFileSelected)?;

    let name = file.name.to_lowercase();
    let mime = file.mime.as_deref().unwrap_or_default().to_lowercase();

    let allowed = accept
        .split(',')
        .map(|entry| entry.trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
        .any(|entry| entry_matches(&entry, &name, &mime));

    if !allowed {
        return Err(ValidationError::UnsupportedType {
            accept: accept.to_string(),
        });
    }

    if file.size > MAX_FILE_SIZE {
        return Err(ValidationError::FileTooLarge {
            size: file.size,
            limit: MAX_FILE_SIZE,
        });
    }

    Ok(())
}

fn entry_matches(entry: &str, name: &str, mime: &str) -> bool {
    if entry.contains('/') {
        return match entry.strip_suffix('*') {
            Some(prefix) if prefix.ends_with('/') => mime.starts_with(prefix),
            _ => mime == entry,
        };
    }
    if entry.starts_with('.') {
        return name.ends_with(entry);
    }
    name.ends_with(&format!(".{}", entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::types::FileSource;
    use std::path::PathBuf;

    fn file(name: &str, mime: Option<&str>, size: u64) -> SelectedFile {
        SelectedFile {
            name: name.to_string(),
            mime: mime.map(str::to_string),
            size,
            source: FileSource::Path(PathBuf::from(name)),
        }
    }

    #[test]
    fn missing_file_is_rejected() {
        assert_eq!(validate(None, ".csv"), Err(ValidationError::NoFileSelected));
    }

    #[test]
    fn two_megabyte_csv_answer_key_is_valid() {
        let key = file("answer_key.csv", Some("text/csv"), 2 * 1024 * 1024);
        assert_eq!(validate(Some(&key), ".csv"), Ok(()));
    }

    #[test]
    fn sixty_megabyte_csv_is_too_large() {
        let key = file("answer_key.csv", Some("text/csv"), 60 * 1024 * 1024);
        assert_eq!(
            validate(Some(&key), ".csv"),
            Err(ValidationError::FileTooLarge {
                size: 60 * 1024 * 1024,
                limit: MAX_FILE_SIZE
            })
        );
    }

    #[test]
    fn exactly_the_limit_passes() {
        let key = file("key.csv", None, MAX_FILE_SIZE);
        assert!(validate(Some(&key), ".csv").is_ok());
        let key = file("key.csv", None, MAX_FILE_SIZE + 1);
        assert!(validate(Some(&key), ".csv").is_err());
    }

    #[test]
    fn extension_match_ignores_case() {
        let key = file("KEY.CSV", None, 10);
        assert!(validate(Some(&key), ".csv").is_ok());
        assert!(validate(Some(&key), " .CsV ").is_ok());
    }

    #[test]
    fn wrong_extension_is_unsupported() {
        let key = file("key.xlsx", None, 10);
        assert_eq!(
            validate(Some(&key), ".csv"),
            Err(ValidationError::UnsupportedType {
                accept: ".csv".to_string()
            })
        );
    }

    #[test]
    fn type_is_checked_before_size() {
        let key = file("key.pdf", None, MAX_FILE_SIZE * 2);
        assert!(matches!(
            validate(Some(&key), ".csv"),
            Err(ValidationError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn wildcard_mime_matches_by_prefix() {
        let scan = file("scan.bin", Some("image/png"), 10);
        assert!(validate(Some(&scan), "image/*").is_ok());
        assert!(validate(Some(&scan), "text/*").is_err());
    }

    #[test]
    fn exact_mime_must_match_fully() {
        let sheet = file("sheet", Some("text/csv"), 10);
        assert!(validate(Some(&sheet), "text/csv").is_ok());
        assert!(validate(Some(&sheet), "text/plain").is_err());
    }

    #[test]
    fn any_entry_in_the_list_can_match() {
        let sheet = file("sheet.txt", Some("text/plain"), 10);
        assert!(validate(Some(&sheet), ".csv, application/pdf, text/plain").is_ok());
    }

    #[test]
    fn bare_extension_entry_is_accepted() {
        let sheet = file("responses.csv", None, 10);
        assert!(validate(Some(&sheet), "csv").is_ok());
        let sheet = file("responsescsv", None, 10);
        assert!(validate(Some(&sheet), "csv").is_err());
    }

    #[test]
    fn empty_accept_list_rejects_everything() {
        let sheet = file("responses.csv", None, 10);
        assert!(validate(Some(&sheet), " , ").is_err());
    }
}
