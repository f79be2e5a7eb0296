mod controller;
mod state;
mod ui;

pub use controller::{validate_draft, UploadDemoController};
pub use state::{StatusKind, StatusLine, UiState, UploadDraft};

use crate::config::{Config, PersistedSettings};
use crate::upload::HttpUploadEngine;
use crate::utils::file_chooser::NativeFileChooser;
use eframe::{egui, App};
use std::time::Duration;

const REPAINT_WHILE_UPLOADING: Duration = Duration::from_millis(100);

pub struct UploadDemoApp {
    controller: UploadDemoController<HttpUploadEngine, NativeFileChooser>,
    visible: bool,
}

impl UploadDemoApp {
    pub fn new(cc: &eframe::CreationContext<'_>, engine: HttpUploadEngine, config: &Config) -> Self {
        tracing::info!("initializing upload service demo");
        let persisted = cc
            .storage
            .and_then(|storage| storage.get_string(PersistedSettings::STORAGE_KEY))
            .and_then(|text| PersistedSettings::from_json(&text));

        let mut controller =
            UploadDemoController::new(engine, NativeFileChooser, config.initial_draft(persisted))
                .with_start_directory(config.start_directory())
                .with_retry_policy(config.retry_policy());
        controller.on_resume();

        Self {
            controller,
            visible: true,
        }
    }

    /// Listens for upload events only while the window is shown.
    fn sync_lifecycle(&mut self, ctx: &egui::Context) {
        let minimized = ctx.input(|i| i.viewport().minimized.unwrap_or(false));
        if self.visible && minimized {
            self.visible = false;
            self.controller.on_pause();
        } else if !self.visible && !minimized {
            self.visible = true;
            self.controller.on_resume();
        }
    }

    pub fn update_state(&mut self, ctx: &egui::Context) {
        self.sync_lifecycle(ctx);

        if self.controller.pump_events() > 0 {
            ctx.request_repaint();
        }
        if self.controller.state().is_uploading() {
            ctx.request_repaint_after(REPAINT_WHILE_UPLOADING);
        }
    }
}

impl App for UploadDemoApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_state(ctx);
        self.render(ctx);
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedSettings::from_draft(&self.controller.state().draft);
        match settings.to_json() {
            Ok(text) => storage.set_string(PersistedSettings::STORAGE_KEY, text),
            Err(err) => tracing::warn!("failed to save settings: {err}"),
        }
    }
}
