//! CB-prefixed instruction execution: rotates, shifts, and bit operations.

use crate::alu;
use crate::bus::Bus;
use crate::cpu::Z80;
use crate::flags::{CF, HF, PF, SF, XF, YF, ZF};

impl Z80 {
    /// Execute a CB-prefixed instruction.
    pub(crate) fn execute_cb<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let r = op & 7;

        if r == 6 {
            // (HL) form. BIT takes its undocumented Y/X from H.
            let addr = self.regs.hl();
            let value = self.mem_read(bus, addr);
            if let Some(result) = self.cb_operation(op, value, self.regs.h) {
                self.mem_write(bus, addr, result);
            }
            return;
        }

        let value = self.get_reg8(r);
        if let Some(result) = self.cb_operation(op, value, value) {
            self.set_reg8(r, result);
        }
    }

    /// Run the CB operation on `value`. Returns the byte to write back, or
    /// `None` for BIT, which only sets flags. `flag_source` supplies the
    /// undocumented Y/X bits for BIT (the operand for registers, H for
    /// (HL), the effective-address high byte for DDCB/FDCB).
    pub(crate) fn cb_operation(&mut self, op: u8, value: u8, flag_source: u8) -> Option<u8> {
        match op & 0xC0 {
            0x00 => {
                // Rotates and shifts, selected by bits 3-5
                let result = match (op >> 3) & 7 {
                    0 => alu::rlc8(value),
                    1 => alu::rrc8(value),
                    2 => alu::rl8(value, self.regs.f & CF != 0),
                    3 => alu::rr8(value, self.regs.f & CF != 0),
                    4 => alu::sla8(value),
                    5 => alu::sra8(value),
                    6 => alu::sll8(value),
                    7 => alu::srl8(value),
                    _ => unreachable!(),
                };
                self.regs.f = result.flags;
                Some(result.value)
            }
            // BIT b - Z and PV track the tested bit, H set, S only for bit 7
            0x40 => {
                let bit = (op >> 3) & 7;
                let is_zero = value & (1 << bit) == 0;

                let mut f = (self.regs.f & CF) | HF;
                if is_zero {
                    f |= ZF | PF;
                }
                if bit == 7 && !is_zero {
                    f |= SF;
                }
                f |= flag_source & (YF | XF);
                self.regs.f = f;
                None
            }
            // RES b
            0x80 => Some(value & !(1 << ((op >> 3) & 7))),
            // SET b
            0xC0 => Some(value | (1 << ((op >> 3) & 7))),
            _ => unreachable!(),
        }
    }
}
