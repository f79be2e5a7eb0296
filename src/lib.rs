//! Desktop demo for starting multipart and binary HTTP uploads and following
//! their progress.

pub mod app;
pub mod config;
pub mod upload;
pub mod utils;
