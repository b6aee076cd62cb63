//! ---
//! msr_section: "05-cli"
//! msr_subsection: "binary"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "JSON files holding the last known service records."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use msr_core::ServiceRecord;
use tracing::debug;

/// Directory of `<name>.json` service records.
#[derive(Debug, Clone)]
pub struct RecordStore {
    directory: PathBuf,
}

impl RecordStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.directory.join(format!("{name}.json")))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.path(name)?.exists())
    }

    pub fn load(&self, name: &str) -> Result<ServiceRecord> {
        let path = self.path(name)?;
        if !path.exists() {
            return Err(anyhow!(
                "no record for service {name} at {}; create or import it first",
                path.display()
            ));
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read record {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse record {}", path.display()))
    }

    /// Write the record atomically (temp file + rename).
    pub fn save(&self, name: &str, record: &ServiceRecord) -> Result<PathBuf> {
        let path = self.path(name)?;
        fs::create_dir_all(&self.directory).with_context(|| {
            format!("unable to create state directory {}", self.directory.display())
        })?;
        let rendered = serde_json::to_string_pretty(record)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, rendered)
            .with_context(|| format!("unable to write {}", staging.display()))?;
        fs::rename(&staging, &path)
            .with_context(|| format!("unable to replace {}", path.display()))?;
        debug!(record = %path.display(), service_id = record.id(), "record saved");
        Ok(path)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.path(name)?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("unable to remove {}", path.display()))?;
        }
        Ok(())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        || name.starts_with('.')
    {
        bail!("invalid service name {name:?}: use letters, digits, '-', '_' or '.'");
    }
    Ok(())
}
