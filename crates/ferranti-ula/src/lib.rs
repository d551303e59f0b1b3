//! The Spectrum 48K ULA (Uncommitted Logic Array).
//!
//! The ULA owns everything on port 0xFE - border colour, the speaker level
//! (MIC OR EAR output bits), the keyboard matrix, and the EAR input driven
//! by the tape - plus the scanline counter that raises the vertical-blank
//! interrupt once per frame and the memory contention calculation.
//!
//! # Standalone IC
//!
//! This crate has no dependencies. The machine's bus routes even-port
//! accesses here and consults [`Ula::contention`] for memory wait states.
//!
//! # Timing (48K PAL)
//!
//! - 224 T-states per scanline
//! - 312 scanlines per frame (64 top border, 192 display, 56 bottom)
//! - 69,888 T-states per frame (50 Hz)
//! - INT raised at the 311 -> 0 scanline wrap, cleared on CPU acceptance
//!
//! # Contention
//!
//! During the display area (scanlines 64-255, line T-states 0-127) the ULA
//! stalls CPU access to 0x4000-0x7FFF. The delay pattern repeats every
//! 8 T-states: `[6, 5, 4, 3, 2, 1, 0, 0]`.

/// CPU T-states per scanline.
pub const TSTATES_PER_LINE: u16 = 224;
/// Scanlines per frame.
pub const LINES_PER_FRAME: u16 = 312;
/// CPU T-states per 50 Hz frame.
pub const TSTATES_PER_FRAME: u32 = TSTATES_PER_LINE as u32 * LINES_PER_FRAME as u32;

/// First scanline of the 192-line display area.
const FIRST_DISPLAY_LINE: u16 = 64;
/// Number of display scanlines.
const DISPLAY_LINES: u16 = 192;
/// Contended portion of each display line, in T-states.
const CONTENTION_END_TSTATE: u16 = 128;

/// Contention delay pattern, repeating every 8 T-states.
const CONTENTION_PATTERN: [u8; 8] = [6, 5, 4, 3, 2, 1, 0, 0];

/// Contended RAM range: the ULA shares the bus for 0x4000-0x7FFF.
const CONTENDED_START: u16 = 0x4000;
const CONTENDED_END: u16 = 0x8000;

/// The ULA state.
pub struct Ula {
    /// Current border colour (0-7).
    border: u8,
    /// Border writes this frame as `(frame_tstate, colour)`, for the
    /// renderer. Cleared by the frame driver at frame start.
    border_log: Vec<(u32, u8)>,
    /// Beeper level: MIC OR EAR bits of the last port 0xFE write.
    speaker_out: bool,
    /// Keyboard matrix, one byte per half-row, bit clear = key pressed.
    keyboard: [u8; 8],
    /// EAR input line, driven by the tape player.
    ear_in: bool,
    /// Current scanline (0 = start of frame).
    scanline: u16,
    /// T-state within the current scanline (0-223).
    scanline_tstate: u16,
    /// Vertical-blank interrupt: set at the scanline wrap, cleared when
    /// the CPU accepts.
    int_pending: bool,
    /// Last value the ULA drove onto the data bus; undecoded port reads
    /// leak it.
    floating_bus: u8,
}

impl Ula {
    #[must_use]
    pub fn new() -> Self {
        Self {
            border: 7, // white on power-up
            border_log: Vec::new(),
            speaker_out: false,
            keyboard: [0xFF; 8],
            ear_in: false,
            scanline: 0,
            scanline_tstate: 0,
            int_pending: false,
            floating_bus: 0xFF,
        }
    }

    // === Port 0xFE ===

    /// Read a port. Even ports scan the keyboard and EAR; odd ports leak
    /// the floating bus.
    pub fn read(&mut self, port: u16) -> u8 {
        if port & 1 != 0 {
            return self.floating_bus;
        }

        let mut result = 0xFF;
        let rows = (port >> 8) as u8;
        for (row, &keys) in self.keyboard.iter().enumerate() {
            // A cleared address bit selects this half-row
            if rows & (1 << row) == 0 {
                result &= keys;
            }
        }

        // Bit 6: EAR input. Bits 5 and 7 stay high.
        if self.ear_in {
            result |= 0x40;
        } else {
            result &= !0x40;
        }

        self.floating_bus = result;
        result
    }

    /// Write a port. Even ports set border (bits 0-2) and the beeper level
    /// (MIC bit 3 OR speaker bit 4); odd-port writes are ignored.
    pub fn write(&mut self, port: u16, value: u8) {
        if port & 1 != 0 {
            return;
        }

        self.border = value & 0x07;
        self.border_log.push((self.frame_tstate(), self.border));
        self.speaker_out = value & 0x18 != 0;
    }

    // === Frame timing ===

    /// Advance the scanline counters by `cycles` T-states. Sets
    /// `int_pending` when the frame wraps.
    pub fn tick(&mut self, cycles: u32) {
        let mut tstate = u32::from(self.scanline_tstate) + cycles;
        while tstate >= u32::from(TSTATES_PER_LINE) {
            tstate -= u32::from(TSTATES_PER_LINE);
            self.scanline += 1;
            if self.scanline == LINES_PER_FRAME {
                self.scanline = 0;
                self.int_pending = true;
            }
        }
        self.scanline_tstate = tstate as u16;
    }

    /// T-states since the start of the current frame.
    #[must_use]
    pub fn frame_tstate(&self) -> u32 {
        u32::from(self.scanline) * u32::from(TSTATES_PER_LINE)
            + u32::from(self.scanline_tstate)
    }

    /// Current scanline (0-311).
    #[must_use]
    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    /// T-state within the current scanline (0-223).
    #[must_use]
    pub fn scanline_tstate(&self) -> u16 {
        self.scanline_tstate
    }

    /// Whether the vertical-blank interrupt is waiting for the CPU.
    #[must_use]
    pub fn int_pending(&self) -> bool {
        self.int_pending
    }

    /// The CPU accepted the interrupt.
    pub fn acknowledge_int(&mut self) {
        self.int_pending = false;
    }

    /// Start a new frame: clears the border-change log. Called by the
    /// frame driver; the counters themselves free-run.
    pub fn begin_frame(&mut self) {
        self.border_log.clear();
    }

    // === Contention ===

    /// Wait states for a memory access at `addr` at the current beam
    /// position. Non-contended addresses and border/retrace time cost 0.
    #[must_use]
    pub fn contention(&self, addr: u16) -> u8 {
        if !(CONTENDED_START..CONTENDED_END).contains(&addr) || !self.in_display_fetch() {
            return 0;
        }
        CONTENTION_PATTERN[usize::from(self.scanline_tstate) & 7]
    }

    fn in_display_fetch(&self) -> bool {
        self.scanline >= FIRST_DISPLAY_LINE
            && self.scanline < FIRST_DISPLAY_LINE + DISPLAY_LINES
            && self.scanline_tstate < CONTENTION_END_TSTATE
    }

    // === Keyboard ===

    /// Press a key: `row` 0-7, `col` 0-4.
    pub fn key_down(&mut self, row: usize, col: u8) {
        if row < 8 && col < 5 {
            self.keyboard[row] &= !(1 << col);
        }
    }

    /// Release a key.
    pub fn key_up(&mut self, row: usize, col: u8) {
        if row < 8 && col < 5 {
            self.keyboard[row] |= 1 << col;
        }
    }

    /// Release every key.
    pub fn release_all(&mut self) {
        self.keyboard = [0xFF; 8];
    }

    // === Lines and levels ===

    /// Current border colour (0-7).
    #[must_use]
    pub fn border(&self) -> u8 {
        self.border
    }

    /// Set the border directly (snapshot restore); not logged.
    pub fn set_border(&mut self, colour: u8) {
        self.border = colour & 0x07;
    }

    /// Border writes this frame, in T-state order.
    #[must_use]
    pub fn border_changes(&self) -> &[(u32, u8)] {
        &self.border_log
    }

    /// Beeper output level.
    #[must_use]
    pub fn speaker_out(&self) -> bool {
        self.speaker_out
    }

    /// Drive the EAR input line from the tape.
    pub fn set_ear_in(&mut self, level: bool) {
        self.ear_in = level;
    }

    /// Current EAR input level.
    #[must_use]
    pub fn ear_in(&self) -> bool {
        self.ear_in
    }

    /// Last byte the ULA drove onto the data bus.
    #[must_use]
    pub fn floating_bus(&self) -> u8 {
        self.floating_bus
    }

    /// Position the beam (tests and snapshot restore).
    pub fn set_position(&mut self, scanline: u16, tstate: u16) {
        self.scanline = scanline % LINES_PER_FRAME;
        self.scanline_tstate = tstate % TSTATES_PER_LINE;
    }
}

impl Default for Ula {
    fn default() -> Self {
        Self::new()
    }
}
