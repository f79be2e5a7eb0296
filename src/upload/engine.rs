use crate::upload::error::StartError;
use crate::upload::events::Subscription;
use crate::upload::types::{BinaryUploadRequest, MultipartUploadRequest, UploadId};

/// Performs uploads in the background and reports their lifecycle.
///
/// For each id, zero or more `Progress` events are followed by exactly one
/// `Completed` or `Failed` event. Starting never blocks on the network.
pub trait UploadEngine {
    fn start_multipart(&self, request: MultipartUploadRequest) -> Result<UploadId, StartError>;

    fn start_binary(&self, request: BinaryUploadRequest) -> Result<UploadId, StartError>;

    /// Asks every in-flight upload to stop. Has no effect when nothing runs.
    fn cancel_all(&self);

    fn subscribe(&self) -> Subscription;

    /// True until the terminal event for `upload_id` has been published.
    fn is_active(&self, upload_id: &UploadId) -> bool;
}
