use eframe::egui::Color32;

use crate::registry::TestProgress;
use crate::upload::UploadStatus;

pub trait ColorExt {
    fn from_hex(hex: &str) -> Option<Self>
    where
        Self: Sized;
}

impl ColorExt for Color32 {
    fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }

        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

        Some(Color32::from_rgb(r, g, b))
    }
}

pub const ACCENT: &str = "#2563eb";
const YELLOW: &str = "#eab308";
const BLUE: &str = "#3b82f6";
const GREEN: &str = "#16a34a";
const RED: &str = "#dc2626";
const GRAY: &str = "#6b7280";
const AMBER: &str = "#d97706";

fn hex(value: &str) -> Color32 {
    Color32::from_hex(value).unwrap_or(Color32::GRAY)
}

pub fn accent() -> Color32 {
    hex(ACCENT)
}

pub fn success() -> Color32 {
    hex(GREEN)
}

pub fn warning() -> Color32 {
    hex(AMBER)
}

pub fn danger() -> Color32 {
    hex(RED)
}

pub fn muted() -> Color32 {
    hex(GRAY)
}

pub fn progress_color(progress: &TestProgress) -> Color32 {
    match progress {
        TestProgress::Processing => hex(YELLOW),
        TestProgress::Analyzing => hex(BLUE),
        TestProgress::Successful => hex(GREEN),
        TestProgress::Failed => hex(RED),
        TestProgress::Unknown(_) => hex(GRAY),
    }
}

pub fn upload_status_color(status: UploadStatus) -> Color32 {
    match status {
        UploadStatus::Idle => hex(GRAY),
        UploadStatus::Uploading => hex(BLUE),
        UploadStatus::Uploaded => hex(GREEN),
        UploadStatus::Error => hex(RED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_six_digit_hex() {
        assert_eq!(Color32::from_hex("#16a34a"), Some(Color32::from_rgb(0x16, 0xa3, 0x4a)));
        assert_eq!(Color32::from_hex("ffffff"), Some(Color32::WHITE));
    }

    #[test]
    fn rejects_malformed_hex() {
        assert_eq!(Color32::from_hex("#fff"), None);
        assert_eq!(Color32::from_hex("#gg0000"), None);
    }

    #[test]
    fn unknown_progress_is_gray() {
        assert_eq!(
            progress_color(&TestProgress::Unknown("queued".into())),
            Color32::from_rgb(0x6b, 0x72, 0x80)
        );
    }
}
