//! An optional lock file which tells the poll loop to hold off probing.
//!
//! The gate only observes the file. Creating and removing it is left to
//! whatever orchestrates the waiting instances.

use std::path::{Path, PathBuf};

/// What the presence of the lock file means.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum GatePolarity {
    /// The file marks the database as busy: probe only while it is absent.
    #[default]
    BusyWhenPresent,

    /// The file marks the database as ready: probe only while it exists.
    ReadyWhenPresent,
}

/// Returns true if anything exists at `path`.
///
/// Errors other than "not found" (e.g. permission denied on a parent
/// directory) count as the file existing.
pub fn lock_file_exists(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(_) => true,
        Err(err) => err.kind() != std::io::ErrorKind::NotFound,
    }
}

#[derive(Clone, Debug)]
pub struct LockGate {
    path: PathBuf,
    polarity: GatePolarity,
}

impl LockGate {
    pub fn new(path: impl Into<PathBuf>, polarity: GatePolarity) -> Self {
        Self {
            path: path.into(),
            polarity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn polarity(&self) -> GatePolarity {
        self.polarity
    }

    /// Returns true if probing should be skipped this cycle.
    pub fn should_hold(&self) -> bool {
        let present = lock_file_exists(&self.path);
        match self.polarity {
            GatePolarity::BusyWhenPresent => present,
            GatePolarity::ReadyWhenPresent => !present,
        }
    }
}
