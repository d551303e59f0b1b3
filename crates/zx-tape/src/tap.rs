//! TAP container parsing.
//!
//! TAP is the simplest Spectrum tape format: a concatenation of blocks,
//! each prefixed by a 2-byte little-endian length. A block holds a flag
//! byte (0x00 header, 0xFF data), the payload, and an XOR checksum of
//! everything before it. Every block plays with standard ROM timing.

use std::error::Error;
use std::fmt;

use crate::blocks::TapeBlock;

/// Pause after each TAP block, matching the gap a real recording leaves.
const BLOCK_PAUSE_MS: u16 = 1000;

/// TAP container errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapError {
    /// Fewer bytes remain than the length word at `offset` declares.
    Truncated { offset: usize },
    /// A block shorter than flag + checksum.
    BlockTooShort { offset: usize, len: usize },
}

impl fmt::Display for TapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { offset } => {
                write!(f, "truncated TAP block at offset {offset}")
            }
            Self::BlockTooShort { offset, len } => {
                write!(
                    f,
                    "TAP block at offset {offset} has length {len}, minimum is 2"
                )
            }
        }
    }
}

impl Error for TapError {}

/// Parse a TAP image into playable blocks.
///
/// A checksum mismatch is not fatal: the byte stream still plays, and the
/// ROM loader is the authority that rejects it. A warning is logged.
pub fn parse_tap(data: &[u8]) -> Result<Vec<TapeBlock>, TapError> {
    let mut blocks = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        if offset + 2 > data.len() {
            return Err(TapError::Truncated { offset });
        }
        let len = usize::from(u16::from(data[offset]) | (u16::from(data[offset + 1]) << 8));
        let body_start = offset + 2;

        if len < 2 {
            return Err(TapError::BlockTooShort { offset, len });
        }
        if body_start + len > data.len() {
            return Err(TapError::Truncated { offset });
        }

        let body = &data[body_start..body_start + len];
        let computed = body[..len - 1].iter().fold(0u8, |acc, &b| acc ^ b);
        if computed != body[len - 1] {
            log::warn!(
                "TAP block at offset {offset}: checksum mismatch \
                 (computed {computed:#04x}, stored {:#04x})",
                body[len - 1]
            );
        }

        blocks.push(TapeBlock::standard(body.to_vec(), BLOCK_PAUSE_MS));
        offset = body_start + len;
    }

    Ok(blocks)
}
