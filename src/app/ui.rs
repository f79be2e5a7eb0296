use super::{StatusKind, UploadDemoApp};
use crate::utils::file_size::FileSizeUtils;
use eframe::egui::{self, Color32, RichText};

const ACCENT: Color32 = Color32::from_rgb(161, 89, 225);
const SUCCESS: Color32 = Color32::from_rgb(0, 180, 0);
const ERROR: Color32 = Color32::from_rgb(220, 50, 50);

enum UiAction {
    PickFile,
    StartMultipart,
    StartBinary,
    Cancel,
    DismissNotice,
}

impl UploadDemoApp {
    pub fn render(&mut self, ctx: &egui::Context) {
        let mut action = None;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(20.0);
            ui.vertical_centered(|ui| {
                ui.heading("Upload Service Demo");
                ui.add_space(5.0);
                ui.label(
                    RichText::new("Send a file as multipart form data or as a raw binary body")
                        .color(ui.visuals().text_color().gamma_multiply(0.7)),
                );
            });

            ui.add_space(20.0);

            ui.group(|ui| {
                let draft = self.controller.draft_mut();

                ui.label("Server URL");
                ui.add(
                    egui::TextEdit::singleline(&mut draft.server_url)
                        .hint_text("https://example.com/upload")
                        .desired_width(f32::INFINITY),
                );
                ui.add_space(8.0);

                ui.label("File to upload");
                ui.horizontal(|ui| {
                    if ui.button("📁 Pick file").clicked() {
                        action = Some(UiAction::PickFile);
                    }
                    ui.add(
                        egui::TextEdit::singleline(&mut draft.file_path)
                            .hint_text("/path/to/file")
                            .desired_width(f32::INFINITY),
                    );
                });
                if let Some(size) = FileSizeUtils::describe_file(&draft.file_path) {
                    ui.label(
                        RichText::new(format!("Size: {size}"))
                            .color(ui.visuals().text_color().gamma_multiply(0.7)),
                    );
                }
                ui.add_space(8.0);

                ui.label("Parameter name (multipart only)");
                ui.add(
                    egui::TextEdit::singleline(&mut draft.field_name)
                        .hint_text("uploaded_file")
                        .desired_width(f32::INFINITY),
                );
                ui.add_space(8.0);

                ui.checkbox(&mut draft.notify, "Display notification");
            });

            ui.add_space(20.0);

            ui.horizontal(|ui| {
                let button_size = egui::vec2(150.0, 36.0);
                if ui
                    .add(egui::Button::new("📤 Multipart upload").min_size(button_size))
                    .clicked()
                {
                    action = Some(UiAction::StartMultipart);
                }
                if ui
                    .add(egui::Button::new("📦 Binary upload").min_size(button_size))
                    .clicked()
                {
                    action = Some(UiAction::StartBinary);
                }
                if ui
                    .add(egui::Button::new("⏹ Cancel").min_size(button_size))
                    .clicked()
                {
                    action = Some(UiAction::Cancel);
                }
            });

            ui.add_space(20.0);

            let state = self.controller.state();
            ui.group(|ui| {
                let progress_bar = egui::ProgressBar::new(state.get_progress_fraction())
                    .show_percentage()
                    .animate(state.is_uploading())
                    .fill(ACCENT);
                ui.add(progress_bar);

                let status_text = state.get_status_text();
                if !status_text.is_empty() {
                    let color = match (&state.tracked_upload, &state.status_line) {
                        (None, Some(line)) => match line.kind {
                            StatusKind::Success => SUCCESS,
                            StatusKind::Error => ERROR,
                            StatusKind::Info => ui.visuals().text_color(),
                        },
                        _ => ui.visuals().text_color(),
                    };
                    ui.colored_label(color, status_text);
                }
            });

            if let Some(notice) = &state.notice {
                ui.add_space(10.0);
                ui.horizontal(|ui| {
                    ui.colored_label(ERROR, notice);
                    if ui.small_button("✖").clicked() {
                        action = Some(UiAction::DismissNotice);
                    }
                });
            }
        });

        match action {
            Some(UiAction::PickFile) => {
                self.controller.pick_file();
            }
            Some(UiAction::StartMultipart) => {
                let draft = self.controller.state().draft.clone();
                // Failures are already surfaced as the notice.
                let _ = self.controller.start_multipart_upload(&draft);
            }
            Some(UiAction::StartBinary) => {
                let draft = self.controller.state().draft.clone();
                let _ = self.controller.start_binary_upload(&draft);
            }
            Some(UiAction::Cancel) => self.controller.cancel_current_upload(),
            Some(UiAction::DismissNotice) => self.controller.dismiss_notice(),
            None => {}
        }
    }
}
