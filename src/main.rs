use anyhow::Context;
use clap::Parser;
use eframe::egui;
use upload_service_demo::app::UploadDemoApp;
use upload_service_demo::config::Config;
use upload_service_demo::upload::HttpUploadEngine;

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .init();

    let engine = HttpUploadEngine::new().context("failed to start upload engine")?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting upload service demo");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([560.0, 600.0])
            .with_min_inner_size([420.0, 520.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Upload Service Demo",
        options,
        Box::new(move |cc| Box::new(UploadDemoApp::new(cc, engine, &config))),
    )
    .map_err(|err| anyhow::anyhow!("failed to run window: {err}"))
}
