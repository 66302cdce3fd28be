use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::app::ports::MappingRepository;
use crate::domain::KnownMappings;
use crate::error::{ReconcileError, Result};

/// Mappings kept in memory only; `save` replaces the stored copy
#[derive(Debug, Default)]
pub struct InMemoryMappingRepository {
    stored: RefCell<KnownMappings>,
    saves: RefCell<usize>,
}

impl InMemoryMappingRepository {
    pub fn new(initial: KnownMappings) -> Self {
        Self {
            stored: RefCell::new(initial),
            saves: RefCell::new(0),
        }
    }

    pub fn snapshot(&self) -> KnownMappings {
        self.stored.borrow().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.borrow()
    }
}

impl MappingRepository for InMemoryMappingRepository {
    fn load(&self) -> Result<KnownMappings> {
        Ok(self.snapshot())
    }

    fn save(&self, mappings: &KnownMappings) -> Result<()> {
        *self.stored.borrow_mut() = mappings.clone();
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}

/// Mappings persisted as one JSON document:
/// `{"confirmed": {"canonical": ["variant", ...]}, "rejected": {...}}`.
///
/// A missing file loads as empty mappings. Saves write a sibling temp file first and
/// rename it over the target.
#[derive(Debug, Clone)]
pub struct JsonFileMappingRepository {
    path: PathBuf,
}

impl JsonFileMappingRepository {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MappingRepository for JsonFileMappingRepository {
    fn load(&self) -> Result<KnownMappings> {
        if !self.path.exists() {
            info!("No mapping file at {}, starting empty", self.path.display());
            return Ok(KnownMappings::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ReconcileError::MappingStore(format!(
                "Failed to read mappings '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        if content.trim().is_empty() {
            return Ok(KnownMappings::new());
        }

        let mappings: KnownMappings = serde_json::from_str(&content).map_err(|e| {
            ReconcileError::MappingStore(format!(
                "Malformed mappings '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        debug!(
            "Loaded {} confirmed and {} rejected mapping keys from {}",
            mappings.confirmed.len(),
            mappings.rejected.len(),
            self.path.display()
        );
        Ok(mappings)
    }

    fn save(&self, mappings: &KnownMappings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(mappings)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                ReconcileError::MappingStore(format!(
                    "Failed to write mappings '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        info!("Saved mappings to {}", self.path.display());
        Ok(())
    }
}
