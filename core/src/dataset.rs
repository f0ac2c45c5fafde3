//! Flat JSON record files in the data directory.
//!
//! RULE: only this module touches record files on disk.
//! A missing input file is an empty input, not an error.

use crate::error::{OpsError, OpsResult};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::Path};

pub const TICKETS_FILE: &str = "supportTickets.json";
pub const INCIDENTS_FILE: &str = "incidents.json";
pub const ANALYSIS_FILE: &str = "incidentAnalysis.json";
pub const AUDIT_LOG_FILE: &str = "auditLog.json";
pub const OUTBOX_FILE: &str = "emailOutbox.json";

/// Read a JSON array of records.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> OpsResult<Vec<T>> {
    if !path.exists() {
        log::warn!("{} not found, treating as empty", path.display());
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).map_err(|source| OpsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Write records as a pretty-printed JSON array, creating parent dirs.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> OpsResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| OpsError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
    }
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).map_err(|source| OpsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    log::debug!("wrote {} records to {}", records.len(), path.display());
    Ok(())
}
