use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::fs::File;
use tokio::runtime::Runtime;
use tokio::task::AbortHandle;
use tokio_util::io::ReaderStream;
use url::Url;

use crate::upload::engine::UploadEngine;
use crate::upload::error::{EngineInitError, StartError};
use crate::upload::events::{EventBus, Subscription};
use crate::upload::types::{
    BinaryUploadRequest, FilePart, MultipartUploadRequest, NotificationConfig, UploadEvent,
    UploadFailure, UploadId, UploadRequest,
};
use crate::upload::validation;

const CHUNK_SIZE: usize = 64 * 1024;

struct Shared {
    bus: EventBus,
    active: Mutex<HashMap<UploadId, AbortHandle>>,
}

impl Shared {
    fn active(&self) -> MutexGuard<'_, HashMap<UploadId, AbortHandle>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Events are published under the `active` lock so that nothing for an id
    // can follow its terminal event.
    fn publish_progress(&self, upload_id: &UploadId, percent: u8) {
        let active = self.active();
        if active.contains_key(upload_id) {
            self.bus.publish(UploadEvent::Progress {
                upload_id: upload_id.clone(),
                percent,
            });
        }
    }

    fn finish(&self, event: UploadEvent) -> bool {
        let mut active = self.active();
        if active.remove(event.upload_id()).is_none() {
            return false;
        }
        self.bus.publish(event);
        true
    }

    fn cancel_all(&self) -> usize {
        let mut active = self.active();
        let cancelled = active.len();
        for (upload_id, handle) in active.drain() {
            handle.abort();
            tracing::info!(upload_id = %upload_id, "upload cancelled");
            self.bus.publish(UploadEvent::Failed {
                upload_id,
                error: UploadFailure::Cancelled,
            });
        }
        cancelled
    }
}

enum Payload {
    Multipart(Vec<FilePart>),
    Binary(PathBuf),
}

struct Job {
    url: Url,
    request: UploadRequest,
    payload: Payload,
}

/// Uploads files over HTTP on its own tokio runtime.
pub struct HttpUploadEngine {
    runtime: Runtime,
    client: Client,
    shared: Arc<Shared>,
}

impl HttpUploadEngine {
    pub fn new() -> Result<Self, EngineInitError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("upload-worker")
            .enable_all()
            .build()?;
        let client = Client::builder().build()?;

        Ok(Self {
            runtime,
            client,
            shared: Arc::new(Shared {
                bus: EventBus::new(),
                active: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn active_uploads(&self) -> usize {
        self.shared.active().len()
    }

    fn launch(&self, job: Job) -> Result<UploadId, StartError> {
        let upload_id = job.request.id.clone();
        let mut active = self.shared.active();
        if active.contains_key(&upload_id) {
            return Err(StartError::MissingArgument(format!(
                "upload {upload_id} is already running"
            )));
        }

        announce(
            job.request.notification.as_ref(),
            &upload_id,
            |config| &config.in_progress_message,
        );

        // The task blocks on `active` until its handle is registered below.
        let handle = self.runtime.spawn(run_upload(
            self.client.clone(),
            Arc::clone(&self.shared),
            job,
        ));
        active.insert(upload_id.clone(), handle.abort_handle());

        Ok(upload_id)
    }
}

impl UploadEngine for HttpUploadEngine {
    fn start_multipart(&self, request: MultipartUploadRequest) -> Result<UploadId, StartError> {
        let url = validation::validate_multipart(&request)?;
        validation::validate_headers(&request.request.headers)?;
        tracing::info!(
            upload_id = %request.request.id,
            url = %url,
            files = request.files.len(),
            "starting multipart upload"
        );

        self.launch(Job {
            url,
            request: request.request,
            payload: Payload::Multipart(request.files),
        })
    }

    fn start_binary(&self, request: BinaryUploadRequest) -> Result<UploadId, StartError> {
        let url = validation::validate_binary(&request)?;
        validation::validate_headers(&request.request.headers)?;
        tracing::info!(
            upload_id = %request.request.id,
            url = %url,
            file = %request.file_path.display(),
            "starting binary upload"
        );

        self.launch(Job {
            url,
            request: request.request,
            payload: Payload::Binary(request.file_path),
        })
    }

    fn cancel_all(&self) {
        let cancelled = self.shared.cancel_all();
        if cancelled == 0 {
            tracing::debug!("cancel requested with no upload in flight");
        }
    }

    fn subscribe(&self) -> Subscription {
        self.shared.bus.subscribe()
    }

    fn is_active(&self, upload_id: &UploadId) -> bool {
        self.shared.active().contains_key(upload_id)
    }
}

async fn run_upload(client: Client, shared: Arc<Shared>, job: Job) {
    let upload_id = job.request.id.clone();
    let retry = job.request.retry.clone();
    let mut attempt = 0;

    let event = loop {
        match send_once(&client, &shared, &job).await {
            Ok((response_code, response_body)) => {
                break UploadEvent::Completed {
                    upload_id: upload_id.clone(),
                    response_code,
                    response_body,
                };
            }
            Err(error) if attempt < retry.max_retries => {
                attempt += 1;
                let delay = retry.backoff(attempt);
                tracing::warn!(
                    upload_id = %upload_id,
                    attempt,
                    ?delay,
                    "upload attempt failed, retrying: {error}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                break UploadEvent::Failed {
                    upload_id: upload_id.clone(),
                    error,
                };
            }
        }
    };

    report_outcome(&shared, job.request.notification.as_ref(), event);
}

/// Publishes the terminal event, then logs and announces it. Returns false
/// when a cancel already ended the upload, in which case nothing is reported.
fn report_outcome(
    shared: &Shared,
    notification: Option<&NotificationConfig>,
    event: UploadEvent,
) -> bool {
    let outcome = event.clone();
    let upload_id = outcome.upload_id();
    if !shared.finish(event) {
        tracing::debug!(upload_id = %upload_id, "result dropped, upload was cancelled");
        return false;
    }

    match &outcome {
        UploadEvent::Completed { response_code, .. } => {
            tracing::info!(upload_id = %upload_id, response_code, "upload completed");
            announce(notification, upload_id, |config| &config.completed_message);
        }
        UploadEvent::Failed { error, .. } => {
            tracing::error!(upload_id = %upload_id, "upload failed: {error}");
            announce(notification, upload_id, |config| &config.error_message);
        }
        UploadEvent::Progress { .. } => {}
    }
    true
}

async fn send_once(
    client: &Client,
    shared: &Arc<Shared>,
    job: &Job,
) -> Result<(u16, String), UploadFailure> {
    let upload_id = &job.request.id;
    let mut builder = client
        .post(job.url.clone())
        .header(USER_AGENT, job.request.user_agent.as_str());
    for (name, value) in &job.request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let builder = match &job.payload {
        Payload::Multipart(files) => {
            let mut opened = Vec::with_capacity(files.len());
            for part in files {
                opened.push(open_file(&part.path).await?);
            }
            let total: u64 = opened.iter().map(|(_, len)| len).sum();
            let reporter = Arc::new(ProgressReporter::new(
                upload_id.clone(),
                total,
                Arc::clone(shared),
            ));

            let mut form = Form::new();
            for (part, (file, len)) in files.iter().zip(opened) {
                let mime = mime_guess::from_path(&part.path).first_or_octet_stream();
                let file_part = Part::stream_with_length(
                    tracked_body(file, Arc::clone(&reporter)),
                    len,
                )
                .file_name(base_name(&part.path))
                .mime_str(mime.essence_str())
                .map_err(|e| UploadFailure::Transport(e.to_string()))?;
                form = form.part(part.field_name.clone(), file_part);
            }
            builder.multipart(form)
        }
        Payload::Binary(file_path) => {
            let (file, len) = open_file(file_path).await?;
            let reporter = Arc::new(ProgressReporter::new(
                upload_id.clone(),
                len,
                Arc::clone(shared),
            ));
            builder
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(CONTENT_LENGTH, len)
                .body(tracked_body(file, reporter))
        }
    };

    let response = builder
        .send()
        .await
        .map_err(|e| UploadFailure::Transport(e.to_string()))?;
    let response_code = response.status().as_u16();
    let response_body = response
        .text()
        .await
        .map_err(|e| UploadFailure::Transport(e.to_string()))?;

    Ok((response_code, response_body))
}

async fn open_file(path: &Path) -> Result<(File, u64), UploadFailure> {
    let io_error = |e: std::io::Error| UploadFailure::Io(format!("{}: {e}", path.display()));
    let file = File::open(path).await.map_err(io_error)?;
    let len = file.metadata().await.map_err(io_error)?.len();
    Ok((file, len))
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn tracked_body(file: File, reporter: Arc<ProgressReporter>) -> Body {
    let stream = ReaderStream::with_capacity(file, CHUNK_SIZE).map(move |chunk| {
        if let Ok(bytes) = &chunk {
            reporter.advance(bytes.len() as u64);
        }
        chunk
    });
    Body::wrap_stream(stream)
}

/// Turns byte counts into whole-percent `Progress` events.
struct ProgressReporter {
    upload_id: UploadId,
    total: u64,
    sent: AtomicU64,
    last_percent: AtomicU8,
    shared: Arc<Shared>,
}

impl ProgressReporter {
    fn new(upload_id: UploadId, total: u64, shared: Arc<Shared>) -> Self {
        Self {
            upload_id,
            total,
            sent: AtomicU64::new(0),
            last_percent: AtomicU8::new(u8::MAX),
            shared,
        }
    }

    fn advance(&self, bytes: u64) {
        let sent = self.sent.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let percent = percent_of(sent, self.total);
        if self.last_percent.swap(percent, Ordering::Relaxed) != percent {
            self.shared.publish_progress(&self.upload_id, percent);
        }
    }
}

fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (sent.min(total) * 100 / total) as u8
}

fn announce(
    config: Option<&NotificationConfig>,
    upload_id: &UploadId,
    message: impl Fn(&NotificationConfig) -> &String,
) {
    if let Some(config) = config {
        tracing::info!(
            target: "notification",
            upload_id = %upload_id,
            title = %config.title,
            "{}",
            message(config)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::types::RetryPolicy;
    use axum::body::Bytes;
    use axum::extract::Multipart;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use std::io::Write;
    use std::net::SocketAddr;
    use std::time::Duration;

    fn serve(router: Router) -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, router).await.unwrap();
            });
        });
        addr
    }

    async fn echo_multipart(mut multipart: Multipart) -> String {
        let mut fields = Vec::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap();
            fields.push(format!("{name}:{file_name}:{}", bytes.len()));
        }
        fields.join(",")
    }

    async fn echo_binary(headers: HeaderMap, body: Bytes) -> String {
        let file_name = headers
            .get("file-name")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        format!("{file_name}:{}:{agent}", body.len())
    }

    async fn broken() -> (StatusCode, &'static str) {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom")
    }

    async fn stall() -> &'static str {
        tokio::time::sleep(Duration::from_secs(30)).await;
        "late"
    }

    fn test_server() -> SocketAddr {
        serve(
            Router::new()
                .route("/multipart", post(echo_multipart))
                .route("/binary", post(echo_binary))
                .route("/broken", post(broken))
                .route("/stall", post(stall)),
        )
    }

    fn sample_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    fn collect_until_terminal(subscription: &Subscription) -> Vec<UploadEvent> {
        let mut events = Vec::new();
        while let Some(event) = subscription.recv_timeout(Duration::from_secs(10)) {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    fn multipart(url: String, path: &Path) -> MultipartUploadRequest {
        MultipartUploadRequest {
            request: UploadRequest::new(UploadId::new(), url),
            files: vec![FilePart {
                path: path.to_path_buf(),
                field_name: "uploaded_file".into(),
            }],
        }
    }

    fn binary(url: String, path: &Path) -> BinaryUploadRequest {
        let mut request = UploadRequest::new(UploadId::new(), url);
        request
            .headers
            .push(("file-name".into(), base_name(path)));
        BinaryUploadRequest {
            request,
            file_path: path.to_path_buf(),
        }
    }

    #[test]
    fn percent_is_clamped_and_handles_empty_files() {
        assert_eq!(percent_of(0, 0), 100);
        assert_eq!(percent_of(50, 200), 25);
        assert_eq!(percent_of(300, 200), 100);
    }

    #[test]
    fn multipart_upload_reports_progress_then_completion() {
        let addr = test_server();
        let file = sample_file(b"hello world");
        let engine = HttpUploadEngine::new().unwrap();
        let subscription = engine.subscribe();

        let request = multipart(format!("http://{addr}/multipart"), file.path());
        let expected_name = base_name(file.path());
        let upload_id = engine.start_multipart(request).unwrap();

        let events = collect_until_terminal(&subscription);
        assert!(events.iter().all(|e| e.upload_id() == &upload_id));
        assert!(events
            .iter()
            .any(|e| matches!(e, UploadEvent::Progress { percent: 100, .. })));
        assert_eq!(
            events.last(),
            Some(&UploadEvent::Completed {
                upload_id: upload_id.clone(),
                response_code: 200,
                response_body: format!("uploaded_file:{expected_name}:11"),
            })
        );
        assert_eq!(engine.active_uploads(), 0);
    }

    #[test]
    fn binary_upload_sends_file_name_header_and_user_agent() {
        let addr = test_server();
        let file = sample_file(b"0123456789");
        let engine = HttpUploadEngine::new().unwrap();
        let subscription = engine.subscribe();

        let request = binary(format!("http://{addr}/binary"), file.path());
        let expected_name = base_name(file.path());
        let upload_id = engine.start_binary(request).unwrap();

        let events = collect_until_terminal(&subscription);
        assert_eq!(
            events.last(),
            Some(&UploadEvent::Completed {
                upload_id,
                response_code: 200,
                response_body: format!(
                    "{expected_name}:10:{}",
                    crate::upload::types::USER_AGENT
                ),
            })
        );
    }

    #[test]
    fn server_errors_complete_with_their_status_code() {
        let addr = test_server();
        let file = sample_file(b"data");
        let engine = HttpUploadEngine::new().unwrap();
        let subscription = engine.subscribe();

        let upload_id = engine
            .start_binary(binary(format!("http://{addr}/broken"), file.path()))
            .unwrap();

        let events = collect_until_terminal(&subscription);
        assert_eq!(
            events.last(),
            Some(&UploadEvent::Completed {
                upload_id,
                response_code: 500,
                response_body: "boom".into(),
            })
        );
    }

    #[test]
    fn unreachable_server_fails_after_retries() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let file = sample_file(b"data");
        let engine = HttpUploadEngine::new().unwrap();
        let subscription = engine.subscribe();

        let mut request = binary(format!("http://{addr}/binary"), file.path());
        request.request.retry = RetryPolicy {
            max_retries: 1,
            initial_backoff: Duration::from_millis(10),
        };
        engine.start_binary(request).unwrap();

        let events = collect_until_terminal(&subscription);
        assert!(matches!(
            events.last(),
            Some(UploadEvent::Failed {
                error: UploadFailure::Transport(_),
                ..
            })
        ));
    }

    #[test]
    fn cancel_all_ends_stream_with_single_failure() {
        let addr = test_server();
        let file = sample_file(b"data");
        let engine = HttpUploadEngine::new().unwrap();
        let subscription = engine.subscribe();

        let upload_id = engine
            .start_binary(binary(format!("http://{addr}/stall"), file.path()))
            .unwrap();
        engine.cancel_all();

        let events = collect_until_terminal(&subscription);
        assert_eq!(
            events.last(),
            Some(&UploadEvent::Failed {
                upload_id,
                error: UploadFailure::Cancelled,
            })
        );
        assert_eq!(subscription.recv_timeout(Duration::from_millis(300)), None);
        assert_eq!(engine.active_uploads(), 0);
    }

    #[test]
    fn cancel_without_uploads_is_a_no_op() {
        let engine = HttpUploadEngine::new().unwrap();
        let subscription = engine.subscribe();
        engine.cancel_all();
        assert_eq!(subscription.try_recv(), None);
    }

    #[test]
    fn start_rejects_invalid_arguments() {
        let engine = HttpUploadEngine::new().unwrap();
        let file = sample_file(b"data");

        let err = engine
            .start_multipart(multipart("not a url".into(), file.path()))
            .unwrap_err();
        assert!(matches!(err, StartError::InvalidUrl { .. }));

        let dir = tempfile::tempdir().unwrap();
        let err = engine
            .start_binary(binary(
                "https://example.com/up".into(),
                &dir.path().join("missing.bin"),
            ))
            .unwrap_err();
        assert!(matches!(err, StartError::InvalidFile { .. }));

        let mut request = multipart("https://example.com/up".into(), file.path());
        request.files[0].field_name.clear();
        let err = engine.start_multipart(request).unwrap_err();
        assert!(matches!(err, StartError::MissingArgument(_)));

        assert_eq!(engine.active_uploads(), 0);
    }

    #[test]
    fn large_file_is_streamed_in_chunks() {
        let addr = test_server();
        let file = sample_file(&vec![7u8; 5 * CHUNK_SIZE]);
        let engine = HttpUploadEngine::new().unwrap();
        let subscription = engine.subscribe();

        let request = binary(format!("http://{addr}/binary"), file.path());
        let expected_name = base_name(file.path());
        let upload_id = engine.start_binary(request).unwrap();

        let events = collect_until_terminal(&subscription);
        let percents: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                UploadEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert!(percents.len() > 1, "expected several progress steps: {percents:?}");
        assert!(percents.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(percents.last(), Some(&100));
        assert_eq!(
            events.last(),
            Some(&UploadEvent::Completed {
                upload_id,
                response_code: 200,
                response_body: format!(
                    "{expected_name}:{}:{}",
                    5 * CHUNK_SIZE,
                    crate::upload::types::USER_AGENT
                ),
            })
        );
    }

    #[test]
    fn upload_is_active_until_its_terminal_event() {
        let addr = test_server();
        let file = sample_file(b"data");
        let engine = HttpUploadEngine::new().unwrap();

        let upload_id = engine
            .start_binary(binary(format!("http://{addr}/stall"), file.path()))
            .unwrap();
        assert!(engine.is_active(&upload_id));
        assert!(!engine.is_active(&UploadId::new()));

        engine.cancel_all();
        assert!(!engine.is_active(&upload_id));
    }

    #[test]
    fn outcome_after_cancel_is_not_reported() {
        let shared = Shared {
            bus: EventBus::new(),
            active: Mutex::new(HashMap::new()),
        };
        let subscription = shared.bus.subscribe();

        let reported = report_outcome(
            &shared,
            Some(&NotificationConfig::default()),
            UploadEvent::Completed {
                upload_id: UploadId::new(),
                response_code: 200,
                response_body: "OK".into(),
            },
        );

        assert!(!reported);
        assert_eq!(subscription.try_recv(), None);
    }
}
