pub mod file_chooser;
pub mod file_size;
