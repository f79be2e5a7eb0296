use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::app::UploadDraft;
use crate::upload::RetryPolicy;
use crate::utils::file_chooser::default_start_directory;

/// Command-line options. Values given here win over persisted settings.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "upload_service_demo",
    version,
    about = "Demo window for multipart and binary HTTP file uploads"
)]
pub struct Config {
    /// Server URL to prefill.
    #[arg(long)]
    pub server_url: Option<String>,

    /// Multipart parameter name to prefill.
    #[arg(long)]
    pub field_name: Option<String>,

    /// Directory the file chooser opens in (defaults to the home directory).
    #[arg(long)]
    pub start_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            ..RetryPolicy::default()
        }
    }

    pub fn start_directory(&self) -> Option<PathBuf> {
        self.start_dir.clone().or_else(default_start_directory)
    }

    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_filter))
    }

    /// Default draft, overlaid with persisted settings, overlaid with flags.
    pub fn initial_draft(&self, persisted: Option<PersistedSettings>) -> UploadDraft {
        let mut draft = UploadDraft::default();
        if let Some(settings) = persisted {
            settings.apply_to(&mut draft);
        }
        if let Some(server_url) = &self.server_url {
            draft.server_url = server_url.clone();
        }
        if let Some(field_name) = &self.field_name {
            draft.field_name = field_name.clone();
        }
        draft
    }
}

/// Form values remembered between runs. The file path is not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSettings {
    pub server_url: String,
    pub field_name: String,
    pub notify: bool,
}

impl PersistedSettings {
    pub const STORAGE_KEY: &'static str = "upload_service_demo.settings";

    pub fn from_draft(draft: &UploadDraft) -> Self {
        Self {
            server_url: draft.server_url.clone(),
            field_name: draft.field_name.clone(),
            notify: draft.notify,
        }
    }

    pub fn apply_to(self, draft: &mut UploadDraft) {
        draft.server_url = self.server_url;
        draft.field_name = self.field_name;
        draft.notify = self.notify;
    }

    pub fn from_json(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(settings) => Some(settings),
            Err(err) => {
                tracing::warn!("ignoring unreadable saved settings: {err}");
                None
            }
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
