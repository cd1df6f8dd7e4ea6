//! Input validation and output preparation.

use std::fs;
use std::path::Path;

use crate::error::LayoutError;

/// Ensure `path` exists and is a directory.
///
/// # Errors
///
/// Returns [`LayoutError::BadInputDir`] otherwise.
pub fn validate_input_dir(path: &Path) -> Result<(), LayoutError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(LayoutError::BadInputDir {
            path: path.to_path_buf(),
        })
    }
}

/// Create `path` if missing; when `clear` is set, remove any existing
/// entries. A non-empty directory without `clear` is left untouched.
///
/// # Errors
///
/// Returns [`LayoutError::Io`] on any filesystem failure.
pub fn prepare_output_dir(path: &Path, clear: bool) -> Result<(), LayoutError> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        return Ok(());
    }
    if !clear {
        return Ok(());
    }
    let mut removed = 0usize;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&entry_path)?;
        } else {
            fs::remove_file(&entry_path)?;
        }
        removed += 1;
    }
    if removed > 0 {
        tracing::debug!(path = %path.display(), removed, "cleared output directory");
    }
    Ok(())
}
