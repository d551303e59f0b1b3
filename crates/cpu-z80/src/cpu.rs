//! The Z80 CPU: fetch-execute stepping and interrupt acceptance.

use crate::bus::Bus;
use crate::flags::{CF, PF, SF, ZF};
use crate::registers::Registers;
use crate::timing;

/// The Z80 CPU state.
///
/// The CPU owns no bus; [`Z80::step`] takes it per call so the machine can
/// hand the same bus to the ULA and tape between instructions.
pub struct Z80 {
    pub regs: Registers,
    /// Monotonic T-state counter. Never reset; tape timing is defined in
    /// absolute T-states.
    tstates: u64,
    /// Set by EI; acceptance stays gated until one more instruction has
    /// executed, so `EI; RETI` cannot be interrupted between the two.
    ei_pending: bool,
}

impl Z80 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            tstates: 0,
            ei_pending: false,
        }
    }

    /// Reset to power-on state. The T-state counter keeps running.
    pub fn reset(&mut self) {
        self.regs = Registers::new();
        self.ei_pending = false;
    }

    /// The monotonic T-state counter.
    #[must_use]
    pub fn tstates(&self) -> u64 {
        self.tstates
    }

    /// Whether EI executed without a following instruction yet.
    #[must_use]
    pub fn ei_pending(&self) -> bool {
        self.ei_pending
    }

    /// Execute one instruction (or one HALT cycle) and return the T-states
    /// consumed, contention included.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let start = self.tstates;
        let ei_was_pending = self.ei_pending;
        self.ei_pending = false;

        if self.regs.halted {
            // A halted CPU executes internal NOPs until an interrupt.
            self.tstates += 4;
        } else {
            let opcode = self.fetch_opcode(bus);
            self.dispatch(bus, opcode);
        }

        if ei_was_pending {
            self.regs.iff1 = true;
            self.regs.iff2 = true;
        }

        (self.tstates - start) as u32
    }

    /// Accept a maskable interrupt, if the flip-flops allow it.
    ///
    /// Returns the T-states consumed, or 0 when the interrupt is refused
    /// (`IFF1` clear, or within the one-instruction post-EI window). The
    /// Spectrum's data bus floats to 0xFF during INT acknowledge, so IM 0
    /// sees RST 38 and behaves exactly like IM 1.
    pub fn accept_interrupt<B: Bus>(&mut self, bus: &mut B) -> u32 {
        if !self.regs.iff1 || self.ei_pending {
            return 0;
        }

        let start = self.tstates;
        self.regs.halted = false;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.regs.inc_r();

        let pc = self.regs.pc;
        self.push16(bus, pc);

        if self.regs.im == 2 {
            self.tstates += u64::from(timing::INT_ACCEPT_IM2);
            let vector_addr = (u16::from(self.regs.i) << 8) | 0x00FF;
            self.regs.pc = self.read16(bus, vector_addr);
        } else {
            self.tstates += u64::from(timing::INT_ACCEPT_IM01);
            self.regs.pc = 0x0038;
        }

        (self.tstates - start) as u32
    }

    /// Non-maskable interrupt: always taken, jumps to 0x0066. IFF2 keeps
    /// the pre-NMI IFF1 so RETN can restore it.
    pub fn nmi<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let start = self.tstates;
        self.regs.halted = false;
        self.regs.iff2 = self.regs.iff1;
        self.regs.iff1 = false;
        self.regs.inc_r();
        self.tstates += u64::from(timing::NMI_ACCEPT);

        let pc = self.regs.pc;
        self.push16(bus, pc);
        self.regs.pc = 0x0066;

        (self.tstates - start) as u32
    }

    // =========================================================================
    // Fetch and dispatch
    // =========================================================================

    /// Fetch the opcode byte at PC: advances PC and the refresh counter.
    pub(crate) fn fetch_opcode<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let opcode = self.mem_read(bus, self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.regs.inc_r();
        opcode
    }

    /// Charge the base cost and route to the decode table for `opcode`.
    fn dispatch<B: Bus>(&mut self, bus: &mut B, opcode: u8) {
        match opcode {
            0xCB => {
                let sub = self.fetch_opcode(bus);
                self.tstates += u64::from(timing::CB[usize::from(sub)]);
                self.execute_cb(bus, sub);
            }
            0xED => {
                let sub = self.fetch_opcode(bus);
                self.tstates += u64::from(timing::ED[usize::from(sub)]);
                self.execute_ed(bus, sub);
            }
            0xDD => {
                self.tstates += u64::from(timing::BASE[0xDD]);
                self.execute_index(bus, IndexReg::Ix);
            }
            0xFD => {
                self.tstates += u64::from(timing::BASE[0xFD]);
                self.execute_index(bus, IndexReg::Iy);
            }
            _ => {
                self.tstates += u64::from(timing::BASE[usize::from(opcode)]);
                self.execute_base(bus, opcode);
            }
        }
    }

    // =========================================================================
    // Bus helpers - every access charges its wait states
    // =========================================================================

    pub(crate) fn charge(&mut self, tstates: u8) {
        self.tstates += u64::from(tstates);
    }

    pub(crate) fn mem_read<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u8 {
        let result = bus.read(addr);
        self.tstates += u64::from(result.wait);
        result.value
    }

    pub(crate) fn mem_write<B: Bus>(&mut self, bus: &mut B, addr: u16, value: u8) {
        let wait = bus.write(addr, value);
        self.tstates += u64::from(wait);
    }

    /// Little-endian 16-bit read; each sub-read wraps modulo 2^16.
    pub(crate) fn read16<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u16 {
        let lo = self.mem_read(bus, addr);
        let hi = self.mem_read(bus, addr.wrapping_add(1));
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Little-endian 16-bit write, low byte first.
    pub(crate) fn write16<B: Bus>(&mut self, bus: &mut B, addr: u16, value: u16) {
        self.mem_write(bus, addr, value as u8);
        self.mem_write(bus, addr.wrapping_add(1), (value >> 8) as u8);
    }

    /// Fetch an immediate operand byte at PC.
    pub(crate) fn fetch8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = self.mem_read(bus, self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    /// Fetch an immediate 16-bit operand at PC, little-endian.
    pub(crate) fn fetch16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Push a word: high byte first, SP decremented twice.
    pub(crate) fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.mem_write(bus, self.regs.sp, (value >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.mem_write(bus, self.regs.sp, value as u8);
    }

    /// Pop a word: low byte first, SP incremented twice.
    pub(crate) fn pop16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.mem_read(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.mem_read(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    // =========================================================================
    // Register helpers
    // =========================================================================

    /// Register by decode index: 0=B 1=C 2=D 3=E 4=H 5=L 7=A.
    /// Index 6 is the (HL) slot and never reaches here.
    pub(crate) fn get_reg8(&self, index: u8) -> u8 {
        match index {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            7 => self.regs.a,
            _ => unreachable!("(HL) slot decoded as register"),
        }
    }

    pub(crate) fn set_reg8(&mut self, index: u8, value: u8) {
        match index {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            7 => self.regs.a = value,
            _ => unreachable!("(HL) slot decoded as register"),
        }
    }

    /// Register pair by decode index: 0=BC 1=DE 2=HL 3=SP.
    pub(crate) fn get_reg16(&self, index: u8) -> u16 {
        match index {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            3 => self.regs.sp,
            _ => unreachable!(),
        }
    }

    pub(crate) fn set_reg16(&mut self, index: u8, value: u16) {
        match index {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            3 => self.regs.sp = value,
            _ => unreachable!(),
        }
    }

    /// PUSH/POP register pair by decode index: 0=BC 1=DE 2=HL 3=AF.
    pub(crate) fn get_reg16_af(&self, index: u8) -> u16 {
        match index {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            3 => self.regs.af(),
            _ => unreachable!(),
        }
    }

    pub(crate) fn set_reg16_af(&mut self, index: u8, value: u16) {
        match index {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            3 => self.regs.set_af(value),
            _ => unreachable!(),
        }
    }

    /// Evaluate flag condition by decode index:
    /// 0=NZ 1=Z 2=NC 3=C 4=PO 5=PE 6=P 7=M.
    pub(crate) fn condition(&self, index: u8) -> bool {
        match index {
            0 => self.regs.f & ZF == 0,
            1 => self.regs.f & ZF != 0,
            2 => self.regs.f & CF == 0,
            3 => self.regs.f & CF != 0,
            4 => self.regs.f & PF == 0,
            5 => self.regs.f & PF != 0,
            6 => self.regs.f & SF == 0,
            7 => self.regs.f & SF != 0,
            _ => unreachable!(),
        }
    }

    /// EI handler hook: set from the execute table.
    pub(crate) fn set_ei_pending(&mut self) {
        self.ei_pending = true;
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

/// Which index register a DD/FD prefix selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexReg {
    Ix,
    Iy,
}
