use std::fs::File;
use std::path::Path;

use reqwest::header::{HeaderName, HeaderValue};
use url::Url;

use crate::upload::error::StartError;
use crate::upload::types::{BinaryUploadRequest, MultipartUploadRequest};

/// Checks that `server_url` is an absolute http(s) URL.
pub fn validate_server_url(server_url: &str) -> Result<Url, StartError> {
    let invalid = |reason: String| StartError::InvalidUrl {
        url: server_url.to_string(),
        reason,
    };

    let url = Url::parse(server_url.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".into()));
    }

    Ok(url)
}

/// Checks that `path` is a regular file the current user can open.
pub fn validate_file(path: &Path) -> Result<(), StartError> {
    let invalid = |reason: String| StartError::InvalidFile {
        path: path.to_path_buf(),
        reason,
    };

    if path.as_os_str().is_empty() {
        return Err(StartError::MissingArgument("no file to upload".into()));
    }

    let metadata = path.metadata().map_err(|e| invalid(e.to_string()))?;
    if !metadata.is_file() {
        return Err(invalid("not a regular file".into()));
    }
    File::open(path).map_err(|e| invalid(e.to_string()))?;

    Ok(())
}

/// Rejects blank multipart field names.
pub fn validate_field_name(field_name: &str) -> Result<(), StartError> {
    if field_name.trim().is_empty() {
        return Err(StartError::MissingArgument(
            "the file parameter name is empty".into(),
        ));
    }
    Ok(())
}

/// Rejects header names or values that cannot go on the wire.
pub fn validate_headers(headers: &[(String, String)]) -> Result<(), StartError> {
    for (name, value) in headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(StartError::MissingArgument(format!(
                "invalid header name '{name}'"
            )));
        }
        if HeaderValue::from_str(value).is_err() {
            return Err(StartError::MissingArgument(format!(
                "invalid value for header '{name}'"
            )));
        }
    }
    Ok(())
}

pub fn validate_multipart(request: &MultipartUploadRequest) -> Result<Url, StartError> {
    let url = validate_server_url(&request.request.server_url)?;
    if request.files.is_empty() {
        return Err(StartError::MissingArgument(
            "add at least one file to upload".into(),
        ));
    }
    for part in &request.files {
        validate_field_name(&part.field_name)?;
        validate_file(&part.path)?;
    }
    Ok(url)
}

pub fn validate_binary(request: &BinaryUploadRequest) -> Result<Url, StartError> {
    let url = validate_server_url(&request.request.server_url)?;
    validate_file(&request.file_path)?;
    Ok(url)
}
