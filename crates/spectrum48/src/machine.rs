//! The frame driver.
//!
//! One `run_frame` call executes exactly 69,888 T-states of machine time:
//! step the CPU one instruction, advance the tape to the CPU's clock and
//! feed its EAR level to the ULA, tick the scanline counters by the
//! instruction's cost, and record speaker transitions. The vertical-blank
//! interrupt is offered to the CPU at the frame boundary.

use cpu_z80::Z80;
use zx_tape::{TapeBlock, TapePlayer};

use crate::beeper::Beeper;
use crate::bus::SpectrumBus;
use crate::error::{LoadError, SnapshotError};
use crate::input::InputQueue;
use crate::memory::Memory48;
use crate::snapshot::{self, SnapshotState};

/// CPU T-states per 50 Hz frame.
pub const TSTATES_PER_FRAME: u32 = ferranti_ula::TSTATES_PER_FRAME;

/// ROM entry point of LD-BYTES, the tape-load routine.
const LD_BYTES_ADDR: u16 = 0x0556;

/// The 48K machine.
pub struct Spectrum48 {
    pub(crate) cpu: Z80,
    pub(crate) bus: SpectrumBus,
    tape: TapePlayer,
    beeper: Beeper,
    input: InputQueue,
    frame_count: u64,
    /// When set, LD-BYTES is intercepted and data blocks are copied into
    /// memory directly instead of being played as pulses.
    instant_load: bool,
}

impl Spectrum48 {
    /// Build a machine around a 16,384-byte ROM image.
    pub fn new(rom: &[u8]) -> Result<Self, LoadError> {
        Ok(Self {
            cpu: Z80::new(),
            bus: SpectrumBus::new(Memory48::new(rom)?),
            tape: TapePlayer::new(Vec::new()),
            beeper: Beeper::new(),
            input: InputQueue::new(),
            frame_count: 0,
            instant_load: false,
        })
    }

    /// Run exactly one 50 Hz frame (69,888 T-states).
    pub fn run_frame(&mut self) {
        self.input.process(self.frame_count, &mut self.bus.ula);
        self.frame_count += 1;
        self.bus.ula.begin_frame();

        let target = self.cpu.tstates() + u64::from(TSTATES_PER_FRAME);
        while self.cpu.tstates() < target {
            let speaker_before = self.bus.ula.speaker_out();

            let elapsed = self.cpu.step(&mut self.bus);
            if self.instant_load {
                self.check_tape_trap();
            }

            let ear = self.tape.update(self.cpu.tstates());
            self.bus.ula.set_ear_in(ear);
            self.bus.ula.tick(elapsed);

            let speaker_now = self.bus.ula.speaker_out();
            if speaker_now != speaker_before {
                self.beeper.set_level(speaker_now, self.cpu.tstates());
            }
        }
        self.beeper.flush(self.cpu.tstates());

        // Frame boundary: the scanline wrap has set int_pending; offer the
        // interrupt. A refusal (DI, or the post-EI window) leaves it
        // pending for the next boundary.
        if self.bus.ula.int_pending() {
            let cycles = self.cpu.accept_interrupt(&mut self.bus);
            if cycles > 0 {
                self.bus.ula.acknowledge_int();
                self.bus.ula.tick(cycles);
                self.tape.update(self.cpu.tstates());
            }
        }
    }

    // === Component access ===

    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &SpectrumBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SpectrumBus {
        &mut self.bus
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Reset the CPU to its power-on state. Memory, ULA position, and the
    /// tape are untouched, as on real hardware.
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    // === Renderer surface ===

    /// The display file (bitmap + attributes).
    #[must_use]
    pub fn screen(&self) -> &[u8] {
        self.bus.memory.screen()
    }

    /// Current border colour.
    #[must_use]
    pub fn border(&self) -> u8 {
        self.bus.ula.border()
    }

    /// Border writes during the last frame, as `(frame_tstate, colour)`.
    #[must_use]
    pub fn border_changes(&self) -> &[(u32, u8)] {
        self.bus.ula.border_changes()
    }

    // === Audio surface ===

    /// Drain the speaker stream accumulated so far.
    pub fn take_audio_samples(&mut self) -> Vec<(f32, u32)> {
        self.beeper.take_samples()
    }

    // === Keyboard ===

    pub fn key_down(&mut self, row: usize, col: u8) {
        self.bus.ula.key_down(row, col);
    }

    pub fn key_up(&mut self, row: usize, col: u8) {
        self.bus.ula.key_up(row, col);
    }

    pub fn release_all_keys(&mut self) {
        self.bus.ula.release_all();
    }

    /// Frame-scheduled input events.
    pub fn input_queue(&mut self) -> &mut InputQueue {
        &mut self.input
    }

    // === Tape transport ===

    /// Load a parsed tape, replacing any previous one.
    pub fn insert_tape(&mut self, blocks: Vec<TapeBlock>) {
        self.tape = TapePlayer::new(blocks);
    }

    pub fn eject_tape(&mut self) {
        self.tape = TapePlayer::new(Vec::new());
        self.bus.ula.set_ear_in(false);
    }

    #[must_use]
    pub fn tape(&self) -> &TapePlayer {
        &self.tape
    }

    pub fn tape_mut(&mut self) -> &mut TapePlayer {
        &mut self.tape
    }

    /// Copy tape data straight into memory at LD-BYTES instead of playing
    /// pulses. Off by default.
    pub fn set_instant_load(&mut self, enabled: bool) {
        self.instant_load = enabled;
    }

    // === Snapshot surface ===

    /// Restore a full machine state. On error nothing is modified.
    pub fn restore_snapshot(&mut self, state: &SnapshotState) -> Result<(), SnapshotError> {
        snapshot::restore(self, state)
    }

    /// Capture the current machine state.
    #[must_use]
    pub fn snapshot(&self) -> SnapshotState {
        snapshot::capture(self)
    }

    // === Instant loading ===

    /// Intercept the ROM's LD-BYTES routine.
    ///
    /// Entry conventions: A holds the expected flag byte, DE the byte
    /// count, IX the destination, and carry distinguishes LOAD from
    /// VERIFY. On exit carry reports success and the routine returns to
    /// its caller.
    fn check_tape_trap(&mut self) {
        if self.cpu.regs.pc != LD_BYTES_ADDR {
            return;
        }
        let Some(block) = self.tape.take_next_data_block() else {
            return;
        };

        let expected_flag = self.cpu.regs.a;
        let count = usize::from(self.cpu.regs.de());
        let dest = self.cpu.regs.ix;
        let is_load = self.cpu.regs.f & 0x01 != 0;

        if block.first().copied() != Some(expected_flag) {
            // Flag mismatch: the ROM would report a tape loading error
            self.cpu.regs.f &= !0x01;
            self.pop_ret();
            return;
        }

        if is_load {
            let payload = &block[1..];
            for (i, &byte) in payload.iter().take(count).enumerate() {
                self.bus.memory.write(dest.wrapping_add(i as u16), byte);
            }
        }

        self.cpu.regs.f |= 0x01;
        self.pop_ret();
    }

    /// Return to LD-BYTES' caller: pop the return address into PC.
    fn pop_ret(&mut self) {
        let ret = self.bus.read16(self.cpu.regs.sp);
        self.cpu.regs.sp = self.cpu.regs.sp.wrapping_add(2);
        self.cpu.regs.pc = ret;
    }
}
