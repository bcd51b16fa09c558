use std::fs;
use std::path::Path;

use ovs_core::errors::ErrorInfo;
use ovs_core::OvsError;

fn persist_error(code: &str, message: impl Into<String>, path: &Path) -> OvsError {
    OvsError::Persist(
        ErrorInfo::new(code, message).with_context("path", path.display().to_string()),
    )
}

/// Reads a persisted bias value.
///
/// `Ok(None)` when no file exists (a fresh search is not an error). An
/// unreadable, unparseable, or non-positive payload is reported so the caller
/// can fall back to a fresh search.
pub fn load_bias(path: &Path) -> Result<Option<f64>, OvsError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .map_err(|err| persist_error("bias-file-read", err.to_string(), path))?;
    let value: f64 = contents.trim().parse().map_err(|err: std::num::ParseFloatError| {
        persist_error("bias-file-parse", err.to_string(), path)
    })?;
    if !value.is_finite() || value <= 0.0 {
        return Err(persist_error(
            "bias-file-value",
            format!("persisted bias {value} is not a positive finite number"),
            path,
        ));
    }
    Ok(Some(value))
}

/// Writes the locked bias value as a single plain-text float.
///
/// The default float formatting is the shortest string that parses back to
/// the same bits, so a restart resumes with the identical value.
pub fn store_bias(path: &Path, bias: f64) -> Result<(), OvsError> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| persist_error("bias-file-write", err.to_string(), parent))?;
    }
    fs::write(path, format!("{bias}\n"))
        .map_err(|err| persist_error("bias-file-write", err.to_string(), path))
}
