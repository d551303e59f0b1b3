//! ZX Spectrum 48K machine.
//!
//! Binds the Z80 interpreter, the ULA, and the tape player into a frame
//! driver that produces exactly one 50 Hz frame (69,888 T-states) per
//! [`Spectrum48::run_frame`] call. A host renderer reads RAM and the
//! border-change log after each frame; a host audio sink drains the
//! beeper's `(level, duration)` stream.

mod beeper;
mod bus;
mod error;
mod input;
mod machine;
mod memory;
mod snapshot;

pub use beeper::Beeper;
pub use bus::SpectrumBus;
pub use error::{LoadError, SnapshotError};
pub use input::{InputQueue, KeyEvent};
pub use machine::{Spectrum48, TSTATES_PER_FRAME};
pub use memory::Memory48;
pub use snapshot::SnapshotState;
