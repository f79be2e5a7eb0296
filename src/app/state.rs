use crate::upload::UploadId;
use derivative::Derivative;
use serde::{Deserialize, Serialize};

/// Upload parameters as currently typed into the form.
#[derive(Derivative, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Debug, Default)]
pub struct UploadDraft {
    pub server_url: String,
    pub file_path: String,
    #[derivative(Default(value = "\"uploaded_file\".to_string()"))]
    pub field_name: String,
    #[derivative(Default(value = "true"))]
    pub notify: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusLine {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct UiState {
    pub draft: UploadDraft,
    /// Indicator value, 0..=100.
    pub progress: u8,
    pub tracked_upload: Option<UploadId>,
    pub status_line: Option<StatusLine>,
    /// Pending user-facing notice, shown until dismissed.
    pub notice: Option<String>,
}

impl UiState {
    pub fn with_draft(draft: UploadDraft) -> Self {
        Self {
            draft,
            ..Self::default()
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.tracked_upload.is_some()
    }

    pub fn get_progress_fraction(&self) -> f32 {
        f32::from(self.progress.min(100)) / 100.0
    }

    pub fn get_status_text(&self) -> String {
        match (&self.tracked_upload, &self.status_line) {
            (Some(id), _) => format!("📤 Uploading {id}: {}%", self.progress),
            (None, Some(line)) => line.text.clone(),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_defaults() {
        let draft = UploadDraft::default();
        assert!(draft.server_url.is_empty());
        assert!(draft.file_path.is_empty());
        assert_eq!(draft.field_name, "uploaded_file");
        assert!(draft.notify);
    }

    #[test]
    fn status_text_prefers_active_upload() {
        let mut state = UiState::default();
        assert_eq!(state.get_status_text(), "");

        state.status_line = Some(StatusLine::success("done"));
        assert_eq!(state.get_status_text(), "done");

        let id = UploadId::new();
        state.tracked_upload = Some(id.clone());
        state.progress = 40;
        assert_eq!(state.get_status_text(), format!("📤 Uploading {id}: 40%"));
        assert!((state.get_progress_fraction() - 0.4).abs() < f32::EPSILON);
    }
}
