//! TZX container parsing.
//!
//! TZX encodes tape signals as T-state-accurate pulse descriptions, so it
//! can represent turbo loaders and custom protection schemes that TAP
//! cannot. The file is a 10-byte header (`"ZXTape!" 0x1A` plus major and
//! minor version bytes) followed by id-tagged blocks.
//!
//! An unknown block id ends parsing: the already-parsed prefix is kept and
//! a warning is logged, so a tape remains playable up to that point.
//!
//! Reference: <https://worldofspectrum.net/TZXformat.html>

use std::error::Error;
use std::fmt;

use crate::blocks::TapeBlock;

/// TZX header magic.
const MAGIC: &[u8; 8] = b"ZXTape!\x1A";

/// A parsed TZX file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TzxFile {
    pub major: u8,
    pub minor: u8,
    pub blocks: Vec<TapeBlock>,
}

/// TZX container errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TzxError {
    /// Shorter than the 10-byte header.
    TooShort,
    /// Header magic is not `"ZXTape!" 0x1A`.
    BadMagic,
    /// A block body runs past the end of the file.
    Truncated { block_id: u8, offset: usize },
}

impl fmt::Display for TzxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "TZX file too short for header"),
            Self::BadMagic => write!(f, "invalid TZX magic"),
            Self::Truncated { block_id, offset } => {
                write!(f, "truncated TZX block {block_id:#04x} at offset {offset}")
            }
        }
    }
}

impl Error for TzxError {}

impl TzxFile {
    /// Parse a TZX image.
    pub fn parse(data: &[u8]) -> Result<Self, TzxError> {
        if data.len() < 10 {
            return Err(TzxError::TooShort);
        }
        if &data[0..8] != MAGIC {
            return Err(TzxError::BadMagic);
        }

        let major = data[8];
        let minor = data[9];
        let mut blocks = Vec::new();
        let mut pos = 10;

        while pos < data.len() {
            let block_id = data[pos];
            pos += 1;

            let block = match block_id {
                0x10 => parse_standard_speed(data, &mut pos),
                0x11 => parse_turbo_speed(data, &mut pos),
                0x12 => parse_pure_tone(data, &mut pos),
                0x13 => parse_pulse_sequence(data, &mut pos),
                0x14 => parse_pure_data(data, &mut pos),
                0x15 => parse_direct_recording(data, &mut pos),
                0x20 => parse_pause(data, &mut pos),
                0x21 => parse_group_start(data, &mut pos),
                0x22 => Ok(TapeBlock::GroupEnd),
                0x23 => parse_jump(data, &mut pos),
                0x24 => parse_loop_start(data, &mut pos),
                0x25 => Ok(TapeBlock::LoopEnd),
                0x2A => parse_stop_if_48k(data, &mut pos),
                0x30 => parse_text(data, &mut pos),
                0x31 => parse_message(data, &mut pos),
                0x32 => parse_archive_info(data, &mut pos),
                0x33 => parse_hardware(data, &mut pos),
                0x35 => parse_custom(data, &mut pos),
                0x5A => parse_glue(data, &mut pos),
                other => {
                    // Unknown id: keep the playable prefix and stop here
                    log::warn!(
                        "unsupported TZX block id {other:#04x} at offset {}; \
                         keeping the {} blocks parsed so far",
                        pos - 1,
                        blocks.len()
                    );
                    return Ok(Self {
                        major,
                        minor,
                        blocks,
                    });
                }
            };

            blocks.push(block?);
        }

        Ok(Self {
            major,
            minor,
            blocks,
        })
    }
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

fn need(data: &[u8], pos: usize, n: usize, block_id: u8) -> Result<(), TzxError> {
    if pos + n > data.len() {
        Err(TzxError::Truncated {
            block_id,
            offset: pos,
        })
    } else {
        Ok(())
    }
}

fn read_u16(data: &[u8], pos: usize) -> u16 {
    u16::from(data[pos]) | (u16::from(data[pos + 1]) << 8)
}

fn read_u24(data: &[u8], pos: usize) -> u32 {
    u32::from(data[pos]) | (u32::from(data[pos + 1]) << 8) | (u32::from(data[pos + 2]) << 16)
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    read_u24(data, pos) | (u32::from(data[pos + 3]) << 24)
}

fn read_string(data: &[u8], pos: usize, len: usize) -> String {
    String::from_utf8_lossy(&data[pos..pos + len]).into_owned()
}

// ---------------------------------------------------------------------------
// Block parsers
// ---------------------------------------------------------------------------

/// Block 0x10: standard speed data - ROM timing, pilot from the flag byte.
fn parse_standard_speed(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 4, 0x10)?;
    let pause_ms = read_u16(data, *pos);
    let len = usize::from(read_u16(data, *pos + 2));
    *pos += 4;

    need(data, *pos, len, 0x10)?;
    let payload = data[*pos..*pos + len].to_vec();
    *pos += len;

    Ok(TapeBlock::standard(payload, pause_ms))
}

/// Block 0x11: turbo speed data - every timing parameter explicit.
fn parse_turbo_speed(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 18, 0x11)?;
    let pilot_pulse = read_u16(data, *pos);
    let sync1_pulse = read_u16(data, *pos + 2);
    let sync2_pulse = read_u16(data, *pos + 4);
    let zero_pulse = read_u16(data, *pos + 6);
    let one_pulse = read_u16(data, *pos + 8);
    let pilot_count = read_u16(data, *pos + 10);
    let used_bits_last_byte = data[*pos + 12];
    let pause_ms = read_u16(data, *pos + 13);
    let len = read_u24(data, *pos + 15) as usize;
    *pos += 18;

    need(data, *pos, len, 0x11)?;
    let payload = data[*pos..*pos + len].to_vec();
    *pos += len;

    Ok(TapeBlock::Data {
        data: payload,
        pilot_pulse,
        sync1_pulse,
        sync2_pulse,
        zero_pulse,
        one_pulse,
        pilot_count,
        pause_ms,
        used_bits_last_byte,
    })
}

/// Block 0x12: pure tone.
fn parse_pure_tone(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 4, 0x12)?;
    let pulse_length = read_u16(data, *pos);
    let pulse_count = read_u16(data, *pos + 2);
    *pos += 4;
    Ok(TapeBlock::PureTone {
        pulse_length,
        pulse_count,
    })
}

/// Block 0x13: pulse sequence.
fn parse_pulse_sequence(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 1, 0x13)?;
    let count = usize::from(data[*pos]);
    *pos += 1;

    need(data, *pos, count * 2, 0x13)?;
    let pulses = (0..count).map(|i| read_u16(data, *pos + i * 2)).collect();
    *pos += count * 2;

    Ok(TapeBlock::PulseSequence { pulses })
}

/// Block 0x14: pure data - bits only, no pilot or sync.
fn parse_pure_data(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 10, 0x14)?;
    let zero_pulse = read_u16(data, *pos);
    let one_pulse = read_u16(data, *pos + 2);
    let used_bits_last_byte = data[*pos + 4];
    let pause_ms = read_u16(data, *pos + 5);
    let len = read_u24(data, *pos + 7) as usize;
    *pos += 10;

    need(data, *pos, len, 0x14)?;
    let payload = data[*pos..*pos + len].to_vec();
    *pos += len;

    Ok(TapeBlock::PureData {
        data: payload,
        zero_pulse,
        one_pulse,
        used_bits_last_byte,
        pause_ms,
    })
}

/// Block 0x15: direct recording - sampled EAR levels.
fn parse_direct_recording(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 8, 0x15)?;
    let tstates_per_sample = read_u16(data, *pos);
    let pause_ms = read_u16(data, *pos + 2);
    let used_bits_last_byte = data[*pos + 4];
    let len = read_u24(data, *pos + 5) as usize;
    *pos += 8;

    need(data, *pos, len, 0x15)?;
    let payload = data[*pos..*pos + len].to_vec();
    *pos += len;

    Ok(TapeBlock::DirectRecording {
        data: payload,
        tstates_per_sample,
        used_bits_last_byte,
        pause_ms,
    })
}

/// Block 0x20: pause, or stop-the-tape when zero.
fn parse_pause(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 2, 0x20)?;
    let ms = read_u16(data, *pos);
    *pos += 2;
    Ok(TapeBlock::Pause { ms })
}

/// Block 0x21: group start.
fn parse_group_start(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 1, 0x21)?;
    let len = usize::from(data[*pos]);
    *pos += 1;
    need(data, *pos, len, 0x21)?;
    let name = read_string(data, *pos, len);
    *pos += len;
    Ok(TapeBlock::GroupStart { name })
}

/// Block 0x23: relative jump.
fn parse_jump(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 2, 0x23)?;
    let offset = read_u16(data, *pos) as i16;
    *pos += 2;
    Ok(TapeBlock::Jump { offset })
}

/// Block 0x24: loop start.
fn parse_loop_start(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 2, 0x24)?;
    let count = read_u16(data, *pos);
    *pos += 2;
    Ok(TapeBlock::LoopStart { count })
}

/// Block 0x2A: stop the tape if in 48K mode. Carries a length field.
fn parse_stop_if_48k(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 4, 0x2A)?;
    let len = read_u32(data, *pos) as usize;
    *pos += 4;
    need(data, *pos, len, 0x2A)?;
    *pos += len;
    Ok(TapeBlock::StopIf48K)
}

/// Block 0x30: text description.
fn parse_text(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 1, 0x30)?;
    let len = usize::from(data[*pos]);
    *pos += 1;
    need(data, *pos, len, 0x30)?;
    let text = read_string(data, *pos, len);
    *pos += len;
    Ok(TapeBlock::Text { text })
}

/// Block 0x31: message to display for a number of seconds.
fn parse_message(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 2, 0x31)?;
    let display_seconds = data[*pos];
    let len = usize::from(data[*pos + 1]);
    *pos += 2;
    need(data, *pos, len, 0x31)?;
    let text = read_string(data, *pos, len);
    *pos += len;
    Ok(TapeBlock::Message {
        text,
        display_seconds,
    })
}

/// Block 0x32: archive info - (id, text) pairs.
fn parse_archive_info(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 3, 0x32)?;
    let block_len = usize::from(read_u16(data, *pos));
    need(data, *pos + 2, block_len, 0x32)?;
    let count = usize::from(data[*pos + 2]);
    let end = *pos + 2 + block_len;
    *pos += 3;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        need(data, *pos, 2, 0x32)?;
        let id = data[*pos];
        let len = usize::from(data[*pos + 1]);
        *pos += 2;
        need(data, *pos, len, 0x32)?;
        entries.push((id, read_string(data, *pos, len)));
        *pos += len;
    }

    // The declared length is authoritative for the block's extent
    *pos = end;
    Ok(TapeBlock::ArchiveInfo { entries })
}

/// Block 0x33: hardware info - (type, id, support) triples.
fn parse_hardware(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 1, 0x33)?;
    let count = usize::from(data[*pos]);
    *pos += 1;
    need(data, *pos, count * 3, 0x33)?;
    let entries = (0..count)
        .map(|i| {
            let base = *pos + i * 3;
            (data[base], data[base + 1], data[base + 2])
        })
        .collect();
    *pos += count * 3;
    Ok(TapeBlock::Hardware { entries })
}

/// Block 0x35: custom info - 16-character id plus opaque payload.
fn parse_custom(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 20, 0x35)?;
    let id = read_string(data, *pos, 16).trim_end().to_string();
    let len = read_u32(data, *pos + 16) as usize;
    *pos += 20;
    need(data, *pos, len, 0x35)?;
    let payload = data[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(TapeBlock::Custom { id, data: payload })
}

/// Block 0x5A: glue between concatenated TZX files - 9 fixed bytes.
fn parse_glue(data: &[u8], pos: &mut usize) -> Result<TapeBlock, TzxError> {
    need(data, *pos, 9, 0x5A)?;
    *pos += 9;
    Ok(TapeBlock::Glue)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tzx_image(body: &[u8]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.push(1); // major
        out.push(20); // minor
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn header_only() {
        let file = TzxFile::parse(&tzx_image(&[])).expect("bare header is valid");
        assert_eq!(file.major, 1);
        assert_eq!(file.minor, 20);
        assert!(file.blocks.is_empty());
    }

    #[test]
    fn too_short_and_bad_magic() {
        assert_eq!(TzxFile::parse(b"ZXTape!"), Err(TzxError::TooShort));
        assert_eq!(
            TzxFile::parse(b"NotATape\x01\x14"),
            Err(TzxError::BadMagic)
        );
    }

    #[test]
    fn standard_speed_block() {
        // id 0x10, pause 500 ms, 3 bytes: FF 01 FE
        let body = [0x10, 0xF4, 0x01, 0x03, 0x00, 0xFF, 0x01, 0xFE];
        let file = TzxFile::parse(&tzx_image(&body)).expect("parses");
        assert_eq!(file.blocks.len(), 1);
        let TapeBlock::Data {
            data, pause_ms, ..
        } = &file.blocks[0] else {
            panic!("expected Data");
        };
        assert_eq!(data, &[0xFF, 0x01, 0xFE]);
        assert_eq!(*pause_ms, 500);
    }

    #[test]
    fn turbo_speed_block_carries_all_timing() {
        let mut body = vec![0x11];
        body.extend_from_slice(&[
            0x78, 0x08, // pilot 2168
            0x9B, 0x02, // sync1 667
            0xDF, 0x02, // sync2 735
            0x57, 0x03, // zero 855
            0xAE, 0x06, // one 1710
            0x9F, 0x1F, // pilot count 8095
            0x06, // used bits
            0xE8, 0x03, // pause 1000
            0x02, 0x00, 0x00, // length 2
        ]);
        body.extend_from_slice(&[0xAA, 0x55]);

        let file = TzxFile::parse(&tzx_image(&body)).expect("parses");
        let TapeBlock::Data {
            pilot_pulse,
            pilot_count,
            used_bits_last_byte,
            data,
            ..
        } = &file.blocks[0] else {
            panic!("expected Data");
        };
        assert_eq!(*pilot_pulse, 2168);
        assert_eq!(*pilot_count, 8095);
        assert_eq!(*used_bits_last_byte, 6);
        assert_eq!(data, &[0xAA, 0x55]);
    }

    #[test]
    fn control_blocks() {
        let body = [
            0x12, 0x10, 0x00, 0x05, 0x00, // pure tone: 16 T x 5
            0x13, 0x02, 0x0A, 0x00, 0x14, 0x00, // pulses: 10, 20
            0x20, 0x00, 0x00, // pause 0 = stop
            0x24, 0x03, 0x00, // loop start x3
            0x25, // loop end
            0x23, 0xFE, 0xFF, // jump -2
            0x2A, 0x00, 0x00, 0x00, 0x00, // stop if 48K
        ];
        let file = TzxFile::parse(&tzx_image(&body)).expect("parses");
        assert_eq!(
            file.blocks,
            vec![
                TapeBlock::PureTone {
                    pulse_length: 16,
                    pulse_count: 5
                },
                TapeBlock::PulseSequence {
                    pulses: vec![10, 20]
                },
                TapeBlock::Pause { ms: 0 },
                TapeBlock::LoopStart { count: 3 },
                TapeBlock::LoopEnd,
                TapeBlock::Jump { offset: -2 },
                TapeBlock::StopIf48K,
            ]
        );
    }

    #[test]
    fn direct_recording_block() {
        let body = [
            0x15, 0x4F, 0x00, // 79 T-states per sample
            0x00, 0x00, // no pause
            0x04, // 4 used bits
            0x02, 0x00, 0x00, // 2 bytes
            0xF0, 0xA0,
        ];
        let file = TzxFile::parse(&tzx_image(&body)).expect("parses");
        let TapeBlock::DirectRecording {
            tstates_per_sample,
            used_bits_last_byte,
            data,
            ..
        } = &file.blocks[0] else {
            panic!("expected DirectRecording");
        };
        assert_eq!(*tstates_per_sample, 79);
        assert_eq!(*used_bits_last_byte, 4);
        assert_eq!(data, &[0xF0, 0xA0]);
    }

    #[test]
    fn informational_blocks() {
        let body = [
            0x21, 0x04, b'S', b'i', b'd', b'e', // group start "Side"
            0x22, // group end
            0x30, 0x02, b'h', b'i', // text
            0x31, 0x05, 0x02, b'o', b'k', // message, 5 s
            0x33, 0x01, 0x00, 0x00, 0x01, // hardware: one triple
        ];
        let file = TzxFile::parse(&tzx_image(&body)).expect("parses");
        assert_eq!(file.blocks.len(), 5);
        assert!(file.blocks.iter().all(TapeBlock::is_informational));
        assert_eq!(
            file.blocks[0],
            TapeBlock::GroupStart {
                name: "Side".into()
            }
        );
        assert_eq!(
            file.blocks[3],
            TapeBlock::Message {
                text: "ok".into(),
                display_seconds: 5
            }
        );
    }

    #[test]
    fn archive_info_entries() {
        let body = [
            0x32, 0x07, 0x00, // 7 bytes follow the length word
            0x01, // one entry
            0x00, 0x04, b'G', b'a', b'm', b'e', // title "Game"
        ];
        let file = TzxFile::parse(&tzx_image(&body)).expect("parses");
        assert_eq!(
            file.blocks[0],
            TapeBlock::ArchiveInfo {
                entries: vec![(0x00, "Game".into())]
            }
        );
    }

    #[test]
    fn unknown_block_keeps_prefix() {
        let body = [
            0x12, 0x10, 0x00, 0x05, 0x00, // pure tone
            0x19, 0xFF, 0xFF, // generalized data: unsupported
            0x12, 0x10, 0x00, 0x05, 0x00, // never reached
        ];
        let file = TzxFile::parse(&tzx_image(&body)).expect("prefix retained");
        assert_eq!(file.blocks.len(), 1, "parsing stopped at the unknown id");
    }

    #[test]
    fn truncated_block_is_an_error() {
        let body = [0x10, 0x00, 0x00, 0x10, 0x00, 0xFF]; // declares 16, has 1
        assert!(matches!(
            TzxFile::parse(&tzx_image(&body)),
            Err(TzxError::Truncated {
                block_id: 0x10,
                ..
            })
        ));
    }
}
