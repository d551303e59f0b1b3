//! Tape support for the Spectrum 48K core.
//!
//! A tape is an ordered sequence of [`TapeBlock`]s, produced by the pure
//! parsing functions in [`tap`] and [`tzx`] and consumed by the
//! [`TapePlayer`], which turns blocks into EAR-line edges at absolute
//! T-state resolution. Parsing never touches playback state.

pub mod blocks;
pub mod player;
pub mod tap;
pub mod tzx;

pub use blocks::{TapeBlock, rom_timing};
pub use player::{PlayPhase, TapePlayer};
pub use tap::TapError;
pub use tzx::{TzxError, TzxFile};
