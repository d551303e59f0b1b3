//! Boundary error types. Nothing inside the frame loop ever fails; these
//! surface only from load, restore, and snapshot operations, which leave
//! the machine untouched on error.

use std::error::Error;
use std::fmt;

/// ROM or RAM payload of the wrong size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// ROM images must be exactly 16,384 bytes.
    RomSize { len: usize },
    /// RAM restores must be exactly 49,152 bytes.
    RamSize { len: usize },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RomSize { len } => {
                write!(f, "ROM must be exactly 16384 bytes, got {len}")
            }
            Self::RamSize { len } => {
                write!(f, "RAM image must be exactly 49152 bytes, got {len}")
            }
        }
    }
}

impl Error for LoadError {}

/// Snapshot state that cannot describe a 48K machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotError {
    /// Hardware modes 0, 1, and 3 are the 48K variants; anything else is
    /// a different machine.
    HardwareMode { mode: u8 },
    /// The RAM payload was the wrong size.
    Ram(LoadError),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardwareMode { mode } => {
                write!(f, "snapshot hardware mode {mode} is not a 48K machine")
            }
            Self::Ram(e) => write!(f, "snapshot RAM: {e}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ram(e) => Some(e),
            Self::HardwareMode { .. } => None,
        }
    }
}

impl From<LoadError> for SnapshotError {
    fn from(e: LoadError) -> Self {
        Self::Ram(e)
    }
}
