//! Bridges form actions to the upload engine and engine events back to the form.

use std::fs::File;
use std::path::{Path, PathBuf};

use super::state::{StatusLine, UiState, UploadDraft};
use crate::upload::{
    BinaryUploadRequest, DraftField, FilePart, MultipartUploadRequest, NotificationConfig,
    RetryPolicy, Subscription, UploadEngine, UploadError, UploadEvent, UploadId, UploadRequest,
    ValidationError, FILE_NAME_HEADER,
};
use crate::utils::file_chooser::{FileChooser, PickRequest};

const MAX_BODY_PREVIEW: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadKind {
    Multipart,
    Binary,
}

impl UploadKind {
    fn label(self) -> &'static str {
        match self {
            UploadKind::Multipart => "multipart",
            UploadKind::Binary => "binary",
        }
    }
}

pub struct UploadDemoController<E, C> {
    engine: E,
    chooser: C,
    state: UiState,
    subscription: Option<Subscription>,
    start_directory: Option<PathBuf>,
    retry: RetryPolicy,
}

impl<E: UploadEngine, C: FileChooser> UploadDemoController<E, C> {
    pub fn new(engine: E, chooser: C, draft: UploadDraft) -> Self {
        Self {
            engine,
            chooser,
            state: UiState::with_draft(draft),
            subscription: None,
            start_directory: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_start_directory(mut self, start_directory: Option<PathBuf>) -> Self {
        self.start_directory = start_directory;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn draft_mut(&mut self) -> &mut UploadDraft {
        &mut self.state.draft
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Subscribes to engine events. Calling it again while subscribed does nothing.
    ///
    /// A tracked upload that ended while paused is dropped from tracking, since
    /// its terminal event will never arrive.
    pub fn on_resume(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        self.subscription = Some(self.engine.subscribe());
        tracing::debug!("controller resumed, listening for upload events");

        let Some(upload_id) = self.state.tracked_upload.clone() else {
            return;
        };
        if !self.engine.is_active(&upload_id) {
            tracing::info!(upload_id = %upload_id, "upload ended while paused");
            self.finish(&upload_id);
            self.state.status_line = Some(StatusLine::info(format!(
                "Upload {upload_id} finished while the window was hidden"
            )));
        }
    }

    /// Drops the event subscription; events published meanwhile are not seen.
    pub fn on_pause(&mut self) {
        if self.subscription.take().is_some() {
            tracing::debug!("controller paused, upload events ignored");
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Feeds every pending engine event through [`Self::on_upload_event`].
    pub fn pump_events(&mut self) -> usize {
        let events = match &self.subscription {
            Some(subscription) => subscription.drain(),
            None => return 0,
        };
        let handled = events.len();
        for event in events {
            self.on_upload_event(event);
        }
        handled
    }

    pub fn start_multipart_upload(&mut self, draft: &UploadDraft) -> Result<UploadId, UploadError> {
        self.start(draft, UploadKind::Multipart)
    }

    pub fn start_binary_upload(&mut self, draft: &UploadDraft) -> Result<UploadId, UploadError> {
        self.start(draft, UploadKind::Binary)
    }

    /// Asks the engine to stop whatever is in flight. UI state is left alone;
    /// the outcome arrives as a terminal event, if at all.
    pub fn cancel_current_upload(&mut self) {
        tracing::info!(tracked = ?self.state.tracked_upload, "cancel requested");
        self.engine.cancel_all();
    }

    pub fn on_upload_event(&mut self, event: UploadEvent) {
        match event {
            UploadEvent::Progress { upload_id, percent } => {
                if self.state.tracked_upload.as_ref() != Some(&upload_id) {
                    tracing::debug!(upload_id = %upload_id, percent, "progress for untracked upload");
                    return;
                }
                self.state.progress = percent.min(100);
                tracing::info!(upload_id = %upload_id, percent, "upload progress");
            }
            UploadEvent::Completed {
                upload_id,
                response_code,
                response_body,
            } => {
                self.finish(&upload_id);
                tracing::info!(
                    upload_id = %upload_id,
                    response_code,
                    "upload completed: {response_body}"
                );
                let body = preview(&response_body);
                self.state.status_line = Some(if (200..300).contains(&response_code) {
                    StatusLine::success(format!(
                        "Upload {upload_id} completed: {response_code}, {body}"
                    ))
                } else {
                    StatusLine::error(format!(
                        "Upload {upload_id} rejected by server: {response_code}, {body}"
                    ))
                });
            }
            UploadEvent::Failed { upload_id, error } => {
                self.finish(&upload_id);
                tracing::error!(upload_id = %upload_id, "error in upload: {error}");
                self.state.status_line =
                    Some(StatusLine::error(format!("Error in upload {upload_id}: {error}")));
            }
        }
    }

    /// Opens the file chooser. A cancelled chooser leaves the draft untouched.
    pub fn pick_file(&mut self) -> Option<String> {
        let request = PickRequest::single_file(self.start_directory.clone());
        let Some(picked) = self.chooser.pick(&request) else {
            tracing::debug!("file chooser cancelled");
            return None;
        };

        let absolute = std::path::absolute(&picked).unwrap_or(picked);
        let path = absolute.to_string_lossy().into_owned();
        tracing::info!(file = %path, "file selected");
        self.state.draft.file_path = path.clone();
        Some(path)
    }

    pub fn dismiss_notice(&mut self) {
        self.state.notice = None;
    }

    fn start(&mut self, draft: &UploadDraft, kind: UploadKind) -> Result<UploadId, UploadError> {
        match self.request_upload(draft, kind) {
            Ok(upload_id) => {
                tracing::info!(upload_id = %upload_id, kind = kind.label(), "upload started");
                self.state.tracked_upload = Some(upload_id.clone());
                self.state.progress = 0;
                self.state.notice = None;
                self.state.status_line = Some(StatusLine::info(format!(
                    "Started {} upload {upload_id}",
                    kind.label()
                )));
                Ok(upload_id)
            }
            Err(err) => {
                tracing::warn!(kind = kind.label(), "upload not started: {err}");
                self.state.notice = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn request_upload(&self, draft: &UploadDraft, kind: UploadKind) -> Result<UploadId, UploadError> {
        let file_path = validate_draft(draft)?;

        let mut request = UploadRequest::new(UploadId::new(), draft.server_url.trim());
        request.retry = self.retry.clone();
        request.notification = draft.notify.then(NotificationConfig::default);

        let upload_id = match kind {
            UploadKind::Multipart => self.engine.start_multipart(MultipartUploadRequest {
                request,
                files: vec![FilePart {
                    path: file_path,
                    field_name: draft.field_name.trim().to_string(),
                }],
            })?,
            UploadKind::Binary => {
                request
                    .headers
                    .push((FILE_NAME_HEADER.to_string(), base_name(&file_path)));
                self.engine.start_binary(BinaryUploadRequest { request, file_path })?
            }
        };

        Ok(upload_id)
    }

    fn finish(&mut self, upload_id: &UploadId) {
        self.state.progress = 0;
        if self.state.tracked_upload.as_ref() == Some(upload_id) {
            self.state.tracked_upload = None;
        }
    }
}

/// Checks that every field is filled in and the file can be opened.
pub fn validate_draft(draft: &UploadDraft) -> Result<PathBuf, ValidationError> {
    let mut missing = Vec::new();
    if draft.server_url.trim().is_empty() {
        missing.push(DraftField::ServerUrl);
    }
    if draft.file_path.trim().is_empty() {
        missing.push(DraftField::FilePath);
    }
    if draft.field_name.trim().is_empty() {
        missing.push(DraftField::FieldName);
    }
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields { fields: missing });
    }

    let path = PathBuf::from(draft.file_path.trim());
    let unreadable = |reason: String| ValidationError::UnreadableFile {
        path: path.clone(),
        reason,
    };
    let metadata = path.metadata().map_err(|e| unreadable(e.to_string()))?;
    if !metadata.is_file() {
        return Err(unreadable("not a regular file".into()));
    }
    File::open(&path).map_err(|e| unreadable(e.to_string()))?;

    Ok(path)
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn preview(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_BODY_PREVIEW {
        return body.to_string();
    }
    let mut short: String = body.chars().take(MAX_BODY_PREVIEW).collect();
    short.push('…');
    short
}
