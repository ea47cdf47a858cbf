use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// One required file category of the upload wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotKey {
    AnswerKey,
    ResponseSheets,
}

impl SlotKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKey::AnswerKey => "answerKey",
            SlotKey::ResponseSheets => "responseSheets",
        }
    }

    /// Multipart field name expected by `/api/upload_test`.
    pub fn form_field(&self) -> &'static str {
        match self {
            SlotKey::AnswerKey => "answer_key",
            SlotKey::ResponseSheets => "response_sheet",
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a slot: what it accepts and how the wizard presents it.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSlot {
    pub key: SlotKey,
    pub label: &'static str,
    pub accept: &'static str,
    pub action_text: &'static str,
    pub description: &'static str,
    pub multi: bool,
}

impl UploadSlot {
    /// The two categories the backend needs to grade a test.
    pub fn defaults() -> Vec<UploadSlot> {
        vec![
            UploadSlot {
                key: SlotKey::AnswerKey,
                label: "Answer Key",
                accept: ".csv",
                action_text: "Upload Answer Key",
                description: "Upload the answer key in CSV format with correct answers",
                multi: false,
            },
            UploadSlot {
                key: SlotKey::ResponseSheets,
                label: "Response Sheet",
                accept: ".csv",
                action_text: "Upload Response Sheet",
                description: "Upload the student response sheet in CSV format",
                multi: true,
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

/// A file the user picked or dropped, not yet uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime: Option<String>,
    pub size: u64,
    pub source: FileSource,
}

impl SelectedFile {
    pub fn from_path(path: PathBuf, size: u64) -> Self {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Self {
            mime: mime_for_name(&name).map(str::to_string),
            name,
            size,
            source: FileSource::Path(path),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Arc<[u8]>) -> Self {
        let name = name.into();
        Self {
            mime: mime_for_name(&name).map(str::to_string),
            size: bytes.len() as u64,
            name,
            source: FileSource::Bytes(bytes),
        }
    }
}

/// Best-effort MIME type for the handful of formats the desk deals with.
pub fn mime_for_name(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_lowercase();
    let mime = match ext.as_str() {
        "csv" => "text/csv",
        "txt" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => return None,
    };
    Some(mime)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    Uploaded,
    Error,
}

/// Per-slot statuses. Replaced as a whole on every phase change.
pub type SlotStatuses = BTreeMap<SlotKey, UploadStatus>;

/// Files snapshotted for one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionBatch {
    pub files: BTreeMap<SlotKey, Vec<SelectedFile>>,
}

impl SubmissionBatch {
    pub fn keys(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.files.keys().copied()
    }

    pub fn file_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// What the backend reported for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadReceipt {
    pub message: String,
    pub stored_files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_is_guessed_case_insensitively() {
        assert_eq!(mime_for_name("KEY.CSV"), Some("text/csv"));
        assert_eq!(mime_for_name("scan.jpeg"), Some("image/jpeg"));
        assert_eq!(mime_for_name("README"), None);
        assert_eq!(mime_for_name("archive.tar.zst"), None);
    }

    #[test]
    fn bytes_file_takes_size_from_content() {
        let file = SelectedFile::from_bytes("sheet.csv", Arc::from(&b"a,b\n1,2\n"[..]));
        assert_eq!(file.size, 8);
        assert_eq!(file.mime.as_deref(), Some("text/csv"));
    }

    #[test]
    fn default_slots_are_answer_key_then_response_sheets() {
        let slots = UploadSlot::defaults();
        let keys: Vec<_> = slots.iter().map(|s| s.key).collect();
        assert_eq!(keys, vec![SlotKey::AnswerKey, SlotKey::ResponseSheets]);
        assert!(!slots[0].multi);
        assert!(slots[1].multi);
    }
}
