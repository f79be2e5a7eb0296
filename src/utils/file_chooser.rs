use rfd::FileDialog;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickMode {
    SingleFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickRequest {
    pub initial_directory: Option<PathBuf>,
    pub allow_multiple: bool,
    pub allow_create_dir: bool,
    pub mode: PickMode,
}

impl PickRequest {
    /// A single existing file, starting in `initial_directory`.
    pub fn single_file(initial_directory: Option<PathBuf>) -> Self {
        Self {
            initial_directory,
            allow_multiple: false,
            allow_create_dir: false,
            mode: PickMode::SingleFile,
        }
    }
}

/// Lets the user choose a file. `None` means the user cancelled.
pub trait FileChooser {
    fn pick(&self, request: &PickRequest) -> Option<PathBuf>;
}

/// Native open-file dialog.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeFileChooser;

impl FileChooser for NativeFileChooser {
    fn pick(&self, request: &PickRequest) -> Option<PathBuf> {
        let mut dialog = FileDialog::new().set_title("Select a file to upload");
        if let Some(dir) = &request.initial_directory {
            dialog = dialog.set_directory(dir);
        }

        // rfd dialogs never create directories; only the multiplicity varies.
        if request.allow_multiple {
            dialog.pick_files().and_then(|files| files.into_iter().next())
        } else {
            dialog.pick_file()
        }
    }
}

/// Where the chooser opens when nothing else is configured.
pub fn default_start_directory() -> Option<PathBuf> {
    dirs::home_dir()
}
