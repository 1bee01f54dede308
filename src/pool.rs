use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::types::{Lead, Team};

const EXPECTED_SCHEMA_VERSION: u32 = 1;

/// On-disk snapshot of the lead pool: the pending/assigned leads plus the
/// team and membership records with their period counters.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct PoolFile {
    pub schema_version: u32,
    #[serde(default)]
    pub leads: Vec<Lead>,
    #[serde(default)]
    pub teams: Vec<Team>,
}

impl PoolFile {
    pub fn new(leads: Vec<Lead>, teams: Vec<Team>) -> Self {
        Self {
            schema_version: EXPECTED_SCHEMA_VERSION,
            leads,
            teams,
        }
    }

    /// Write fresh per-member counters back into the team records, e.g.
    /// after a run updated them through the store.
    pub fn apply_counts(&mut self, counts: &HashMap<u32, u32>) {
        for team in &mut self.teams {
            for member in &mut team.members {
                if let Some(count) = counts.get(&member.id) {
                    member.lead_month_count = *count;
                }
            }
        }
    }
}

/// Load a PoolFile from a YAML file at the given path.
///
/// Validates the schema version. Unknown fields are silently ignored
/// (forward compatibility).
pub fn load(path: &Path) -> Result<PoolFile, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let pool: PoolFile = serde_yaml_ng::from_str(&contents)
        .map_err(|e| format!("Failed to parse YAML from {}: {}", path.display(), e))?;

    if pool.schema_version != EXPECTED_SCHEMA_VERSION {
        return Err(format!(
            "Unsupported schema_version {} in {} (expected {})",
            pool.schema_version,
            path.display(),
            EXPECTED_SCHEMA_VERSION
        ));
    }

    Ok(pool)
}

/// Save a PoolFile to a YAML file at the given path using atomic write.
///
/// Uses write-temp-rename: writes to a temporary file in the same directory,
/// syncs to disk, then atomically renames onto the target path, so the file
/// is either the old version or the new version, never partial.
pub fn save(path: &Path, pool: &PoolFile) -> Result<(), String> {
    let parent = path
        .parent()
        .ok_or_else(|| format!("Cannot determine parent directory of {}", path.display()))?;

    fs::create_dir_all(parent)
        .map_err(|e| format!("Failed to create directory {}: {}", parent.display(), e))?;

    let yaml = serde_yaml_ng::to_string(pool)
        .map_err(|e| format!("Failed to serialize pool to YAML: {}", e))?;

    let temp_file = NamedTempFile::new_in(parent)
        .map_err(|e| format!("Failed to create temp file in {}: {}", parent.display(), e))?;

    fs::write(temp_file.path(), &yaml).map_err(|e| format!("Failed to write temp file: {}", e))?;

    // sync to disk before rename
    let file = fs::File::open(temp_file.path())
        .map_err(|e| format!("Failed to open temp file for sync: {}", e))?;
    file.sync_all()
        .map_err(|e| format!("Failed to sync temp file: {}", e))?;

    temp_file
        .persist(path)
        .map_err(|e| format!("Failed to rename temp file to {}: {}", path.display(), e))?;

    Ok(())
}
