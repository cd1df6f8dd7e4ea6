//! Post-encode integrity verification for PNG outputs.

use std::fs::{self, File};
use std::io::Read;

use serde::Serialize;
use shardlock_io::{Collection, Format};

use crate::error::EngineError;

/// Outcome of a verification pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct VerifyReport {
    /// Wrapper files inspected.
    pub files: u64,
    /// Files whose CRC checked out.
    pub verified: u64,
    /// Files that failed to read or verify.
    pub failures: u64,
}

/// Re-read every produced PNG wrapper and check its CRC.
///
/// Failures are logged and counted; output is never deleted.
///
/// # Errors
///
/// Returns [`EngineError`] only for listing failures; unreadable or corrupt
/// wrappers count as failures in the report.
pub fn verify_png_outputs(collections: &[Collection]) -> Result<VerifyReport, EngineError> {
    let mut report = VerifyReport::default();
    for collection in collections {
        let before = report.failures;
        if collection.is_archive() {
            verify_archive(collection, &mut report)?;
        } else {
            verify_directory(collection, &mut report)?;
        }
        if report.failures > before {
            tracing::warn!(
                label = %collection.label,
                failures = report.failures - before,
                "png verification found damaged wrappers"
            );
        }
    }
    tracing::info!(
        files = report.files,
        verified = report.verified,
        failures = report.failures,
        "png verification pass complete"
    );
    Ok(report)
}

fn verify_directory(collection: &Collection, report: &mut VerifyReport) -> Result<(), EngineError> {
    for entry in fs::read_dir(&collection.path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !Format::Png.matches_chunk_file(&name) {
            continue;
        }
        report.files += 1;
        match fs::read(entry.path())
            .map_err(|e| e.to_string())
            .and_then(|bytes| Format::Png.unwrap(&bytes).map_err(|e| e.to_string()))
        {
            Ok(_) => report.verified += 1,
            Err(e) => {
                tracing::warn!(file = %entry.path().display(), error = %e, "wrapper verification failed");
                report.failures += 1;
            }
        }
    }
    Ok(())
}

fn verify_archive(collection: &Collection, report: &mut VerifyReport) -> Result<(), EngineError> {
    let file = File::open(&collection.path)?;
    let mut archive = tar::Archive::new(file);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();
        let Some(name) = entry_path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !Format::Png.matches_chunk_file(name) {
            continue;
        }
        report.files += 1;
        let mut bytes = Vec::new();
        match entry
            .read_to_end(&mut bytes)
            .map_err(|e| e.to_string())
            .and_then(|_| Format::Png.unwrap(&bytes).map_err(|e| e.to_string()))
        {
            Ok(_) => report.verified += 1,
            Err(e) => {
                tracing::warn!(
                    archive = %collection.path.display(),
                    entry = name,
                    error = %e,
                    "wrapper verification failed"
                );
                report.failures += 1;
            }
        }
    }
    Ok(())
}
