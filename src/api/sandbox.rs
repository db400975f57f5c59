//! Confining user-supplied subdirectory names to the storage root.

use std::path::{Component, Path, PathBuf};

use super::ApiError;

/// Join `subdir` onto `base`, refusing anything that would leave `base`.
///
/// The check is lexical so it also applies to directories that do not exist
/// yet. Absolute paths are rejected outright; `..` is allowed only while it
/// stays inside `base`.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] for absolute or escaping paths.
pub fn resolve_subdir(base: &Path, subdir: &str) -> Result<PathBuf, ApiError> {
    let requested = Path::new(subdir);
    if requested.has_root() {
        return Err(ApiError::BadRequest(
            "Absolute paths are not allowed".to_string(),
        ));
    }

    let mut resolved = base.to_path_buf();
    let mut depth = 0usize;
    for component in requested.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(ApiError::BadRequest(
                        "Path escapes base directory".to_string(),
                    ));
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ApiError::BadRequest(
                    "Absolute paths are not allowed".to_string(),
                ));
            }
        }
    }

    Ok(resolved)
}

/// Make sure the input directory exists, creating it if missing.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] if the path exists but is not a
/// directory, or [`ApiError::Internal`] if it cannot be created.
pub fn ensure_input_dir(input_dir: &Path) -> Result<(), ApiError> {
    if input_dir.exists() {
        if !input_dir.is_dir() {
            return Err(ApiError::BadRequest(format!(
                "Input path is not a directory: {}",
                input_dir.display()
            )));
        }
        return Ok(());
    }

    std::fs::create_dir_all(input_dir).map_err(|e| {
        ApiError::Internal(format!(
            "failed to create input directory {}: {e}",
            input_dir.display()
        ))
    })
}
