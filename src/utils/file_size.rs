pub struct FileSizeUtils;

impl FileSizeUtils {
    pub fn format_size(size: u64) -> String {
        const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Size of the file at `path`, formatted, or `None` if it cannot be read.
    pub fn describe_file(path: &str) -> Option<String> {
        if path.trim().is_empty() {
            return None;
        }
        let metadata = std::fs::metadata(path).ok()?;
        metadata.is_file().then(|| Self::format_size(metadata.len()))
    }
}
