mod engine;
mod error;
mod events;
mod http;
mod types;
pub mod validation;

pub use engine::UploadEngine;
pub use error::{DraftField, EngineInitError, StartError, UploadError, ValidationError};
pub use events::{EventBus, Subscription};
pub use http::HttpUploadEngine;
pub use types::{
    BinaryUploadRequest, FilePart, MultipartUploadRequest, NotificationConfig, RetryPolicy,
    UploadEvent, UploadFailure, UploadId, UploadRequest, FILE_NAME_HEADER, USER_AGENT,
};
