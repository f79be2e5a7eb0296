use derivative::Derivative;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

pub const USER_AGENT: &str = concat!("UploadServiceDemo/", env!("CARGO_PKG_VERSION"));

/// Header carrying the base name of the file in a binary upload.
pub const FILE_NAME_HEADER: &str = "file-name";

/// Correlates a started upload with the events it produces. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadId(String);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cause of a `Failed` event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadFailure {
    #[error("upload cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("file error: {0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Progress {
        upload_id: UploadId,
        percent: u8,
    },
    Completed {
        upload_id: UploadId,
        response_code: u16,
        response_body: String,
    },
    Failed {
        upload_id: UploadId,
        error: UploadFailure,
    },
}

impl UploadEvent {
    pub fn upload_id(&self) -> &UploadId {
        match self {
            UploadEvent::Progress { upload_id, .. }
            | UploadEvent::Completed { upload_id, .. }
            | UploadEvent::Failed { upload_id, .. } => upload_id,
        }
    }

    /// Completed and Failed end the event stream of their upload.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadEvent::Progress { .. })
    }
}

#[derive(Derivative, Clone, PartialEq, Eq)]
#[derivative(Debug, Default)]
pub struct RetryPolicy {
    #[derivative(Default(value = "2"))]
    pub max_retries: u32,
    #[derivative(Default(value = "Duration::from_millis(500)"))]
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based). Doubles every attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

#[derive(Derivative, Clone, PartialEq, Eq)]
#[derivative(Debug, Default)]
pub struct NotificationConfig {
    #[derivative(Default(value = "\"Upload Service Demo\".to_string()"))]
    pub title: String,
    #[derivative(Default(value = "\"Uploading...\".to_string()"))]
    pub in_progress_message: String,
    #[derivative(Default(value = "\"Upload completed successfully\".to_string()"))]
    pub completed_message: String,
    #[derivative(Default(value = "\"Error while uploading\".to_string()"))]
    pub error_message: String,
    pub auto_clear_on_success: bool,
    #[derivative(Default(value = "true"))]
    pub clear_on_action: bool,
    #[derivative(Default(value = "true"))]
    pub ringtone_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub path: PathBuf,
    pub field_name: String,
}

/// Settings shared by every kind of upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub id: UploadId,
    pub server_url: String,
    pub headers: Vec<(String, String)>,
    pub user_agent: String,
    pub retry: RetryPolicy,
    pub notification: Option<NotificationConfig>,
}

impl UploadRequest {
    pub fn new(id: UploadId, server_url: impl Into<String>) -> Self {
        Self {
            id,
            server_url: server_url.into(),
            headers: Vec::new(),
            user_agent: USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
            notification: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUploadRequest {
    pub request: UploadRequest,
    pub files: Vec<FilePart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryUploadRequest {
    pub request: UploadRequest,
    pub file_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_ids_are_unique_and_non_empty() {
        let a = UploadId::new();
        let b = UploadId::new();
        assert!(!a.as_str().is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn terminal_events() {
        let id = UploadId::new();
        let progress = UploadEvent::Progress {
            upload_id: id.clone(),
            percent: 10,
        };
        let failed = UploadEvent::Failed {
            upload_id: id.clone(),
            error: UploadFailure::Cancelled,
        };
        assert!(!progress.is_terminal());
        assert!(failed.is_terminal());
        assert_eq!(failed.upload_id(), &id);
    }

    #[test]
    fn retry_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn notification_defaults() {
        let config = NotificationConfig::default();
        assert!(!config.auto_clear_on_success);
        assert!(config.clear_on_action);
        assert!(config.ringtone_enabled);
    }
}
