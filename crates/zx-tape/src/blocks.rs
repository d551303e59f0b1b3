//! The parsed-tape block model.

/// Standard ROM loader timing, in T-states (3.5 MHz clock).
pub mod rom_timing {
    /// Pilot tone pulse length.
    pub const PILOT_PULSE: u16 = 2168;
    /// First sync pulse.
    pub const SYNC1_PULSE: u16 = 667;
    /// Second sync pulse.
    pub const SYNC2_PULSE: u16 = 735;
    /// Half-pulse for a 0 bit.
    pub const ZERO_PULSE: u16 = 855;
    /// Half-pulse for a 1 bit.
    pub const ONE_PULSE: u16 = 1710;
    /// Pilot pulses before a header block (flag byte 0x00).
    pub const HEADER_PILOT_COUNT: u16 = 8063;
    /// Pilot pulses before a data block (flag byte 0xFF).
    pub const DATA_PILOT_COUNT: u16 = 3223;
    /// T-states per millisecond of pause.
    pub const TSTATES_PER_MS: u32 = 3500;
}

/// One block of a parsed tape.
///
/// [`Data`](TapeBlock::Data) covers both standard-speed and turbo blocks:
/// TAP parsing fills in the ROM timing, TZX turbo blocks carry their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapeBlock {
    /// Pilot tone, two sync pulses, then data bits as pulse pairs.
    Data {
        data: Vec<u8>,
        pilot_pulse: u16,
        sync1_pulse: u16,
        sync2_pulse: u16,
        zero_pulse: u16,
        one_pulse: u16,
        pilot_count: u16,
        pause_ms: u16,
        /// Bits of the final byte that are played (1-8).
        used_bits_last_byte: u8,
    },
    /// A run of equal pulses.
    PureTone { pulse_length: u16, pulse_count: u16 },
    /// Arbitrary pulse lengths, one edge each.
    PulseSequence { pulses: Vec<u16> },
    /// Data bits with no pilot or sync.
    PureData {
        data: Vec<u8>,
        zero_pulse: u16,
        one_pulse: u16,
        used_bits_last_byte: u8,
        pause_ms: u16,
    },
    /// Sampled EAR levels, one bit per sample period, MSB first.
    DirectRecording {
        data: Vec<u8>,
        tstates_per_sample: u16,
        used_bits_last_byte: u8,
        pause_ms: u16,
    },
    /// Silence. `ms == 0` means stop the tape.
    Pause { ms: u16 },
    /// Repeat the blocks up to the matching LoopEnd `count` times.
    LoopStart { count: u16 },
    LoopEnd,
    /// Relative jump in the block sequence.
    Jump { offset: i16 },
    /// Stop the tape when running on 48K hardware.
    StopIf48K,

    // Informational blocks: no playback effect
    GroupStart { name: String },
    GroupEnd,
    Text { text: String },
    Message { text: String, display_seconds: u8 },
    ArchiveInfo { entries: Vec<(u8, String)> },
    Hardware { entries: Vec<(u8, u8, u8)> },
    Custom { id: String, data: Vec<u8> },
    Glue,
}

impl TapeBlock {
    /// A standard-speed block with ROM timing. The flag byte picks the
    /// pilot length: headers get the long tone, data blocks the short one.
    #[must_use]
    pub fn standard(data: Vec<u8>, pause_ms: u16) -> Self {
        let pilot_count = if data.first().copied() == Some(0x00) {
            rom_timing::HEADER_PILOT_COUNT
        } else {
            rom_timing::DATA_PILOT_COUNT
        };
        Self::Data {
            data,
            pilot_pulse: rom_timing::PILOT_PULSE,
            sync1_pulse: rom_timing::SYNC1_PULSE,
            sync2_pulse: rom_timing::SYNC2_PULSE,
            zero_pulse: rom_timing::ZERO_PULSE,
            one_pulse: rom_timing::ONE_PULSE,
            pilot_count,
            pause_ms,
            used_bits_last_byte: 8,
        }
    }

    /// Whether the block produces no signal.
    #[must_use]
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            Self::GroupStart { .. }
                | Self::GroupEnd
                | Self::Text { .. }
                | Self::Message { .. }
                | Self::ArchiveInfo { .. }
                | Self::Hardware { .. }
                | Self::Custom { .. }
                | Self::Glue
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_block_pilot_count_follows_flag() {
        let header = TapeBlock::standard(vec![0x00, 1, 2], 1000);
        let TapeBlock::Data { pilot_count, .. } = header else {
            panic!("expected Data");
        };
        assert_eq!(pilot_count, rom_timing::HEADER_PILOT_COUNT);

        let data = TapeBlock::standard(vec![0xFF, 1, 2], 1000);
        let TapeBlock::Data { pilot_count, .. } = data else {
            panic!("expected Data");
        };
        assert_eq!(pilot_count, rom_timing::DATA_PILOT_COUNT);
    }

    #[test]
    fn informational_blocks_are_flagged() {
        assert!(TapeBlock::Glue.is_informational());
        assert!(TapeBlock::Text { text: String::new() }.is_informational());
        assert!(!TapeBlock::Pause { ms: 0 }.is_informational());
        assert!(!TapeBlock::standard(vec![0xFF], 0).is_informational());
    }
}
