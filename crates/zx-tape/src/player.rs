//! The tape pulse engine.
//!
//! Converts a parsed block sequence into EAR-line edges at absolute
//! T-state resolution. The frame driver calls [`TapePlayer::update`] with
//! the CPU's monotonic T-state counter once per instruction; the player
//! catches up by firing every edge whose time has come and returns the
//! resulting EAR level.

use crate::blocks::{TapeBlock, rom_timing::TSTATES_PER_MS};

/// Safety bound on consecutive control blocks (loops, jumps, metadata)
/// processed without producing a pulse. A tape that exceeds it is
/// malformed and playback ends silently.
const CONTROL_BLOCK_GUARD: u32 = 100_000;

/// Where the player is within the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayPhase {
    /// Between blocks (or never started).
    Idle,
    /// Pilot tone of a Data block.
    Pilot,
    /// First sync pulse.
    Sync1,
    /// Second sync pulse.
    Sync2,
    /// Data bits, two half-pulses per bit.
    Data,
    /// PureTone block.
    PureTone,
    /// PulseSequence block.
    PulseSequence,
    /// DirectRecording block.
    DirectRecording,
    /// Inter-block or explicit pause, EAR held low.
    Pause,
}

/// The tape player.
pub struct TapePlayer {
    blocks: Vec<TapeBlock>,
    /// Index of the *next* block to start; the one being played is at
    /// `block_index - 1`.
    block_index: usize,
    phase: PlayPhase,
    playing: bool,
    /// Set by `play()` from Idle: the first block is armed on the next
    /// `update`, anchoring edge times to the CPU clock.
    pending_start: bool,
    ear: bool,
    /// Absolute T-state of the next edge.
    next_edge: u64,
    /// Absolute T-state at which a Pause phase ends.
    pause_until: u64,
    last_update: u64,
    /// T-states that elapsed while not playing; edge deadlines shift by
    /// this amount on resume.
    stopped_tstates: u64,

    // Cursors
    edges_remaining: u32,
    byte_pos: usize,
    bit_pos: u8,
    pulse_half: u8,
    pulse_index: usize,
    loop_stack: Vec<(usize, u16)>,
}

impl TapePlayer {
    #[must_use]
    pub fn new(blocks: Vec<TapeBlock>) -> Self {
        Self {
            blocks,
            block_index: 0,
            phase: PlayPhase::Idle,
            playing: false,
            pending_start: false,
            ear: false,
            next_edge: 0,
            pause_until: 0,
            last_update: 0,
            stopped_tstates: 0,
            edges_remaining: 0,
            byte_pos: 0,
            bit_pos: 0,
            pulse_half: 0,
            pulse_index: 0,
            loop_stack: Vec::new(),
        }
    }

    // === Transport - takes effect on the next update ===

    /// Start or resume playback.
    pub fn play(&mut self) {
        if self.playing {
            return;
        }
        self.playing = true;
        if self.phase == PlayPhase::Idle {
            self.pending_start = true;
        }
    }

    /// Pause playback in place; `play()` resumes mid-block.
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Stop playback. Position stays at the current block boundary.
    pub fn stop(&mut self) {
        self.playing = false;
        self.phase = PlayPhase::Idle;
    }

    /// Back to the first block.
    pub fn rewind(&mut self) {
        self.playing = false;
        self.pending_start = false;
        self.phase = PlayPhase::Idle;
        self.block_index = 0;
        self.ear = false;
        self.loop_stack.clear();
    }

    // === State ===

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// All blocks consumed and nothing in flight.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.block_index >= self.blocks.len() && self.phase == PlayPhase::Idle
    }

    /// Current EAR level without advancing time.
    #[must_use]
    pub fn ear(&self) -> bool {
        self.ear
    }

    #[must_use]
    pub fn phase(&self) -> PlayPhase {
        self.phase
    }

    /// Index of the next block to start.
    #[must_use]
    pub fn block_index(&self) -> usize {
        self.block_index
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Instant-load support: consume blocks up to and including the next
    /// Data block and return its bytes (flag, payload, checksum). The tape
    /// position moves past the block, exactly as playing it would.
    pub fn take_next_data_block(&mut self) -> Option<Vec<u8>> {
        while self.block_index < self.blocks.len() {
            self.block_index += 1;
            if let TapeBlock::Data { data, .. } = &self.blocks[self.block_index - 1] {
                self.phase = PlayPhase::Idle;
                return Some(data.clone());
            }
        }
        None
    }

    // === The engine ===

    /// Advance to the CPU's current T-state and return the EAR level.
    /// `now` must not decrease between calls.
    pub fn update(&mut self, now: u64) -> bool {
        let elapsed = now.saturating_sub(self.last_update);
        self.last_update = now;

        if !self.playing {
            self.stopped_tstates += elapsed;
            return self.ear;
        }

        // Resuming: shift pending deadlines past the stopped interval
        if self.stopped_tstates > 0 {
            self.next_edge += self.stopped_tstates;
            self.pause_until += self.stopped_tstates;
            self.stopped_tstates = 0;
        }

        if self.pending_start {
            self.pending_start = false;
            self.advance_block(now);
        }

        while self.playing {
            match self.phase {
                PlayPhase::Idle => break,
                PlayPhase::Pause => {
                    self.ear = false;
                    if now < self.pause_until {
                        break;
                    }
                    let resume_at = self.pause_until;
                    self.advance_block(resume_at);
                }
                _ => {
                    if now < self.next_edge {
                        break;
                    }
                    self.step_edge();
                }
            }
        }

        self.ear
    }

    /// Fire the edge at `next_edge` and work out when the next one lands.
    fn step_edge(&mut self) {
        let at = self.next_edge;
        match self.phase {
            PlayPhase::Pilot => {
                self.ear = !self.ear;
                self.edges_remaining -= 1;
                if self.edges_remaining == 0 {
                    let (_, sync1) = self.pilot_params();
                    self.phase = PlayPhase::Sync1;
                    self.next_edge = at + u64::from(sync1);
                } else {
                    let (pilot, _) = self.pilot_params();
                    self.next_edge = at + u64::from(pilot);
                }
            }
            PlayPhase::Sync1 => {
                self.ear = !self.ear;
                self.phase = PlayPhase::Sync2;
                self.next_edge = at + u64::from(self.sync2_len());
            }
            PlayPhase::Sync2 => {
                self.ear = !self.ear;
                self.phase = PlayPhase::Data;
                self.byte_pos = 0;
                self.bit_pos = 0;
                self.pulse_half = 0;
                self.next_edge = at + u64::from(self.current_bit_pulse());
            }
            PlayPhase::Data => {
                self.ear = !self.ear;
                if self.pulse_half == 0 {
                    self.pulse_half = 1;
                    self.next_edge = at + u64::from(self.current_bit_pulse());
                } else {
                    self.pulse_half = 0;
                    if self.advance_data_bit() {
                        self.finish_block(at);
                    } else {
                        self.next_edge = at + u64::from(self.current_bit_pulse());
                    }
                }
            }
            PlayPhase::PureTone => {
                self.ear = !self.ear;
                self.edges_remaining -= 1;
                if self.edges_remaining == 0 {
                    self.advance_block(at);
                } else {
                    self.next_edge = at + u64::from(self.tone_pulse_len());
                }
            }
            PlayPhase::PulseSequence => {
                self.ear = !self.ear;
                self.pulse_index += 1;
                match self.sequence_pulse(self.pulse_index) {
                    Some(len) => self.next_edge = at + u64::from(len),
                    None => self.advance_block(at),
                }
            }
            PlayPhase::DirectRecording => {
                // Samples set the level outright, no toggling
                if self.data_exhausted() {
                    self.finish_block(at);
                } else {
                    self.ear = self.current_data_bit();
                    self.advance_data_bit();
                    self.next_edge = at + u64::from(self.direct_sample_len());
                }
            }
            PlayPhase::Idle | PlayPhase::Pause => unreachable!("no edges outside pulse phases"),
        }
    }

    /// Arm the next playable block starting at absolute T-state `at`.
    /// Control and informational blocks are consumed inline.
    fn advance_block(&mut self, at: u64) {
        let mut guard = 0u32;
        loop {
            guard += 1;
            if guard > CONTROL_BLOCK_GUARD {
                self.playing = false;
                self.phase = PlayPhase::Idle;
                return;
            }

            if self.block_index >= self.blocks.len() {
                self.playing = false;
                self.phase = PlayPhase::Idle;
                return;
            }

            self.block_index += 1;
            match &self.blocks[self.block_index - 1] {
                TapeBlock::Data {
                    data,
                    pilot_pulse,
                    sync1_pulse,
                    zero_pulse,
                    one_pulse,
                    pilot_count,
                    ..
                } => {
                    if data.is_empty() || *zero_pulse == 0 || *one_pulse == 0 {
                        continue; // malformed: nothing playable
                    }
                    if *pilot_count == 0 {
                        // Turbo blocks may skip the pilot entirely
                        self.phase = PlayPhase::Sync1;
                        self.next_edge = at + u64::from(*sync1_pulse);
                    } else {
                        if *pilot_pulse == 0 {
                            continue;
                        }
                        self.phase = PlayPhase::Pilot;
                        self.edges_remaining = u32::from(*pilot_count) * 2;
                        self.next_edge = at + u64::from(*pilot_pulse);
                    }
                    return;
                }
                TapeBlock::PureTone {
                    pulse_length,
                    pulse_count,
                } => {
                    if *pulse_length == 0 || *pulse_count == 0 {
                        continue;
                    }
                    self.phase = PlayPhase::PureTone;
                    self.edges_remaining = u32::from(*pulse_count);
                    self.next_edge = at + u64::from(*pulse_length);
                    return;
                }
                TapeBlock::PulseSequence { pulses } => {
                    if pulses.is_empty() {
                        continue;
                    }
                    self.phase = PlayPhase::PulseSequence;
                    self.pulse_index = 0;
                    self.next_edge = at + u64::from(pulses[0]);
                    return;
                }
                TapeBlock::PureData {
                    data,
                    zero_pulse,
                    one_pulse,
                    ..
                } => {
                    if data.is_empty() || *zero_pulse == 0 || *one_pulse == 0 {
                        continue;
                    }
                    self.phase = PlayPhase::Data;
                    self.byte_pos = 0;
                    self.bit_pos = 0;
                    self.pulse_half = 0;
                    self.next_edge = at + u64::from(self.current_bit_pulse());
                    return;
                }
                TapeBlock::DirectRecording {
                    data,
                    tstates_per_sample,
                    ..
                } => {
                    if data.is_empty() || *tstates_per_sample == 0 {
                        continue;
                    }
                    let period = *tstates_per_sample;
                    self.phase = PlayPhase::DirectRecording;
                    self.byte_pos = 0;
                    self.bit_pos = 0;
                    // First sample takes effect immediately
                    self.ear = self.current_data_bit();
                    self.advance_data_bit();
                    self.next_edge = at + u64::from(period);
                    return;
                }
                TapeBlock::Pause { ms } => {
                    if *ms == 0 {
                        // Stop-the-tape marker
                        self.playing = false;
                        self.phase = PlayPhase::Idle;
                        return;
                    }
                    self.phase = PlayPhase::Pause;
                    self.ear = false;
                    self.pause_until = at + u64::from(*ms) * u64::from(TSTATES_PER_MS);
                    return;
                }
                TapeBlock::LoopStart { count } => {
                    let count = (*count).max(1);
                    self.loop_stack.push((self.block_index, count));
                }
                TapeBlock::LoopEnd => {
                    if let Some((body_start, remaining)) = self.loop_stack.pop() {
                        if remaining > 1 {
                            self.loop_stack.push((body_start, remaining - 1));
                            self.block_index = body_start;
                        }
                    }
                }
                TapeBlock::Jump { offset } => {
                    let target = self.block_index as i64 - 1 + i64::from(*offset);
                    if *offset == 0 || target < 0 {
                        // A jump to itself or off the front is malformed
                        self.playing = false;
                        self.phase = PlayPhase::Idle;
                        return;
                    }
                    self.block_index = target as usize;
                }
                TapeBlock::StopIf48K => {
                    // This core is a 48K machine
                    self.playing = false;
                    self.phase = PlayPhase::Idle;
                    return;
                }
                // Informational blocks play nothing
                TapeBlock::GroupStart { .. }
                | TapeBlock::GroupEnd
                | TapeBlock::Text { .. }
                | TapeBlock::Message { .. }
                | TapeBlock::ArchiveInfo { .. }
                | TapeBlock::Hardware { .. }
                | TapeBlock::Custom { .. }
                | TapeBlock::Glue => {}
            }
        }
    }

    /// After the last data bit or direct-recording sample: pause, or move
    /// straight to the next block.
    fn finish_block(&mut self, at: u64) {
        let pause_ms = match &self.blocks[self.block_index - 1] {
            TapeBlock::Data { pause_ms, .. }
            | TapeBlock::PureData { pause_ms, .. }
            | TapeBlock::DirectRecording { pause_ms, .. } => *pause_ms,
            _ => 0,
        };
        if pause_ms > 0 {
            self.phase = PlayPhase::Pause;
            self.ear = false;
            self.pause_until = at + u64::from(pause_ms) * u64::from(TSTATES_PER_MS);
        } else {
            self.advance_block(at);
        }
    }

    // === Current-block accessors (the playing block is at index - 1) ===

    fn pilot_params(&self) -> (u16, u16) {
        match &self.blocks[self.block_index - 1] {
            TapeBlock::Data {
                pilot_pulse,
                sync1_pulse,
                ..
            } => (*pilot_pulse, *sync1_pulse),
            _ => (0, 0),
        }
    }

    fn sync2_len(&self) -> u16 {
        match &self.blocks[self.block_index - 1] {
            TapeBlock::Data { sync2_pulse, .. } => *sync2_pulse,
            _ => 0,
        }
    }

    fn tone_pulse_len(&self) -> u16 {
        match &self.blocks[self.block_index - 1] {
            TapeBlock::PureTone { pulse_length, .. } => *pulse_length,
            _ => 0,
        }
    }

    fn sequence_pulse(&self, index: usize) -> Option<u16> {
        match &self.blocks[self.block_index - 1] {
            TapeBlock::PulseSequence { pulses } => pulses.get(index).copied(),
            _ => None,
        }
    }

    fn direct_sample_len(&self) -> u16 {
        match &self.blocks[self.block_index - 1] {
            TapeBlock::DirectRecording {
                tstates_per_sample, ..
            } => *tstates_per_sample,
            _ => 0,
        }
    }

    fn data_view(&self) -> (&[u8], u8) {
        match &self.blocks[self.block_index - 1] {
            TapeBlock::Data {
                data,
                used_bits_last_byte,
                ..
            }
            | TapeBlock::PureData {
                data,
                used_bits_last_byte,
                ..
            }
            | TapeBlock::DirectRecording {
                data,
                used_bits_last_byte,
                ..
            } => {
                // 0 is treated as a full final byte
                let used = match *used_bits_last_byte {
                    0 => 8,
                    bits => bits.min(8),
                };
                (data.as_slice(), used)
            }
            _ => (&[], 8),
        }
    }

    /// Half-pulse length for the bit at the cursor.
    fn current_bit_pulse(&self) -> u16 {
        let bit = self.current_data_bit();
        match &self.blocks[self.block_index - 1] {
            TapeBlock::Data {
                zero_pulse,
                one_pulse,
                ..
            }
            | TapeBlock::PureData {
                zero_pulse,
                one_pulse,
                ..
            } => {
                if bit {
                    *one_pulse
                } else {
                    *zero_pulse
                }
            }
            _ => 0,
        }
    }

    /// Bit at the cursor, MSB first.
    fn current_data_bit(&self) -> bool {
        let (data, _) = self.data_view();
        data.get(self.byte_pos)
            .is_some_and(|byte| byte >> (7 - self.bit_pos) & 1 != 0)
    }

    fn data_exhausted(&self) -> bool {
        let (data, _) = self.data_view();
        self.byte_pos >= data.len()
    }

    /// Move the bit cursor forward. Returns true when the block's data is
    /// exhausted (the last byte honours `used_bits_last_byte`).
    fn advance_data_bit(&mut self) -> bool {
        let (data, used_bits) = self.data_view();
        let len = data.len();
        let bits_in_byte = if self.byte_pos + 1 == len { used_bits } else { 8 };

        self.bit_pos += 1;
        if self.bit_pos >= bits_in_byte {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        self.byte_pos >= len
    }
}
