//! Calibration storage that outlives robot resets
//!
//! Keyed by instrument name. When a path is configured every write is
//! flushed to a JSON file, and the file is read back on construction.

use crate::error::HardwareError;
use crate::instrument::InstrumentCalibration;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-instrument calibration store
#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
    path: Option<PathBuf>,
    entries: BTreeMap<String, InstrumentCalibration>,
}

impl CalibrationStore {
    /// In-memory store
    #[inline]
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed store; a missing file starts empty
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HardwareError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(HardwareError::storage(path, e)),
        };
        tracing::debug!(path = %path.display(), instruments = entries.len(), "loaded calibration store");
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// Backing file, if any
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn get(&self, instrument: &str) -> Option<&InstrumentCalibration> {
        self.entries.get(instrument)
    }

    /// Store calibration for an instrument and flush
    pub fn put(
        &mut self,
        instrument: &str,
        calibration: InstrumentCalibration,
    ) -> Result<(), HardwareError> {
        self.entries.insert(instrument.to_string(), calibration);
        self.flush()
    }

    fn flush(&self) -> Result<(), HardwareError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, text).map_err(|e| HardwareError::storage(path, e))
    }
}
