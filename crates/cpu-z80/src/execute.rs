//! Unprefixed instruction execution.

use crate::alu;
use crate::bus::Bus;
use crate::cpu::Z80;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53p};
use crate::timing;

impl Z80 {
    /// Execute an unprefixed instruction. The base T-state cost has already
    /// been charged; handlers only add taken-branch surcharges.
    pub(crate) fn execute_base<B: Bus>(&mut self, bus: &mut B, op: u8) {
        match op {
            // NOP
            0x00 => {}

            // LD rr, nn (01=BC, 11=DE, 21=HL, 31=SP)
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.fetch16(bus);
                self.set_reg16((op >> 4) & 3, value);
            }

            // LD (BC), A
            0x02 => {
                let addr = self.regs.bc();
                let a = self.regs.a;
                self.mem_write(bus, addr, a);
            }

            // INC rr (03=BC, 13=DE, 23=HL, 33=SP) - no flags
            0x03 | 0x13 | 0x23 | 0x33 => {
                let rp = (op >> 4) & 3;
                let value = self.get_reg16(rp).wrapping_add(1);
                self.set_reg16(rp, value);
            }

            // INC r (04=B, 0C=C, 14=D, 1C=E, 24=H, 2C=L, 3C=A)
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C => {
                let r = (op >> 3) & 7;
                let result = alu::inc8(self.get_reg8(r));
                self.set_reg8(r, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
            }

            // DEC r (05=B, 0D=C, 15=D, 1D=E, 25=H, 2D=L, 3D=A)
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x3D => {
                let r = (op >> 3) & 7;
                let result = alu::dec8(self.get_reg8(r));
                self.set_reg8(r, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
            }

            // LD r, n (06=B, 0E=C, 16=D, 1E=E, 26=H, 2E=L, 3E=A)
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => {
                let value = self.fetch8(bus);
                self.set_reg8((op >> 3) & 7, value);
            }

            // RLCA - S/Z/PV preserved, Y/X from A
            0x07 => {
                let carry = self.regs.a >> 7;
                self.regs.a = (self.regs.a << 1) | carry;
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | (self.regs.a & (YF | XF)) | carry;
            }

            // EX AF, AF'
            0x08 => self.regs.ex_af(),

            // ADD HL, rr (09=BC, 19=DE, 29=HL, 39=SP)
            0x09 | 0x19 | 0x29 | 0x39 => {
                let rr = self.get_reg16((op >> 4) & 3);
                let (result, flags) = alu::add16(self.regs.hl(), rr);
                self.regs.set_hl(result);
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | flags;
            }

            // LD A, (BC)
            0x0A => {
                let addr = self.regs.bc();
                self.regs.a = self.mem_read(bus, addr);
            }

            // DEC rr (0B=BC, 1B=DE, 2B=HL, 3B=SP) - no flags
            0x0B | 0x1B | 0x2B | 0x3B => {
                let rp = (op >> 4) & 3;
                let value = self.get_reg16(rp).wrapping_sub(1);
                self.set_reg16(rp, value);
            }

            // RRCA
            0x0F => {
                let carry = self.regs.a & 1;
                self.regs.a = (self.regs.a >> 1) | (carry << 7);
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | (self.regs.a & (YF | XF)) | carry;
            }

            // DJNZ e
            0x10 => {
                let displacement = self.fetch8(bus) as i8;
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    self.charge(timing::JR_TAKEN_EXTRA);
                    self.regs.pc = self.regs.pc.wrapping_add(displacement as u16);
                }
            }

            // LD (DE), A
            0x12 => {
                let addr = self.regs.de();
                let a = self.regs.a;
                self.mem_write(bus, addr, a);
            }

            // RLA - rotate through carry
            0x17 => {
                let old_carry = self.regs.f & CF;
                let new_carry = self.regs.a >> 7;
                self.regs.a = (self.regs.a << 1) | old_carry;
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | (self.regs.a & (YF | XF)) | new_carry;
            }

            // JR e
            0x18 => {
                let displacement = self.fetch8(bus) as i8;
                self.regs.pc = self.regs.pc.wrapping_add(displacement as u16);
            }

            // LD A, (DE)
            0x1A => {
                let addr = self.regs.de();
                self.regs.a = self.mem_read(bus, addr);
            }

            // RRA
            0x1F => {
                let old_carry = (self.regs.f & CF) << 7;
                let new_carry = self.regs.a & 1;
                self.regs.a = (self.regs.a >> 1) | old_carry;
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | (self.regs.a & (YF | XF)) | new_carry;
            }

            // JR cc, e (20=NZ, 28=Z, 30=NC, 38=C)
            0x20 | 0x28 | 0x30 | 0x38 => {
                let displacement = self.fetch8(bus) as i8;
                if self.condition((op >> 3) & 3) {
                    self.charge(timing::JR_TAKEN_EXTRA);
                    self.regs.pc = self.regs.pc.wrapping_add(displacement as u16);
                }
            }

            // LD (nn), HL
            0x22 => {
                let addr = self.fetch16(bus);
                let hl = self.regs.hl();
                self.write16(bus, addr, hl);
            }

            // DAA
            0x27 => self.daa(),

            // LD HL, (nn)
            0x2A => {
                let addr = self.fetch16(bus);
                let value = self.read16(bus, addr);
                self.regs.set_hl(value);
            }

            // CPL - A = ~A, H and N set, Y/X from result
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF | CF)) | HF | NF | (self.regs.a & (YF | XF));
            }

            // LD (nn), A
            0x32 => {
                let addr = self.fetch16(bus);
                let a = self.regs.a;
                self.mem_write(bus, addr, a);
            }

            // INC (HL)
            0x34 => {
                let addr = self.regs.hl();
                let result = alu::inc8(self.mem_read(bus, addr));
                self.mem_write(bus, addr, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
            }

            // DEC (HL)
            0x35 => {
                let addr = self.regs.hl();
                let result = alu::dec8(self.mem_read(bus, addr));
                self.mem_write(bus, addr, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
            }

            // LD (HL), n
            0x36 => {
                let value = self.fetch8(bus);
                let addr = self.regs.hl();
                self.mem_write(bus, addr, value);
            }

            // SCF - C set, H/N cleared, Y/X from A
            0x37 => {
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | CF | (self.regs.a & (YF | XF));
            }

            // LD A, (nn)
            0x3A => {
                let addr = self.fetch16(bus);
                self.regs.a = self.mem_read(bus, addr);
            }

            // CCF - C inverted, H takes old C, N cleared, Y/X from A
            0x3F => {
                let old_carry = self.regs.f & CF;
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (YF | XF))
                    | (old_carry << 4)
                    | (old_carry ^ CF);
            }

            // HALT
            0x76 => {
                self.regs.halted = true;
            }

            // LD r, r' (40-7F except 76)
            0x40..=0x7F => {
                let src = op & 7;
                let dst = (op >> 3) & 7;
                if src == 6 {
                    // LD r, (HL)
                    let addr = self.regs.hl();
                    let value = self.mem_read(bus, addr);
                    self.set_reg8(dst, value);
                } else if dst == 6 {
                    // LD (HL), r
                    let addr = self.regs.hl();
                    let value = self.get_reg8(src);
                    self.mem_write(bus, addr, value);
                } else {
                    let value = self.get_reg8(src);
                    self.set_reg8(dst, value);
                }
            }

            // ALU A, r / ALU A, (HL) (80-BF)
            0x80..=0xBF => {
                let r = op & 7;
                let value = if r == 6 {
                    let addr = self.regs.hl();
                    self.mem_read(bus, addr)
                } else {
                    self.get_reg8(r)
                };
                self.alu_a(op, value);
            }

            // RET cc (C0=NZ, C8=Z, D0=NC, D8=C, E0=PO, E8=PE, F0=P, F8=M)
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                if self.condition((op >> 3) & 7) {
                    self.charge(timing::RET_TAKEN_EXTRA);
                    self.regs.pc = self.pop16(bus);
                }
            }

            // POP rr (C1=BC, D1=DE, E1=HL, F1=AF)
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let value = self.pop16(bus);
                self.set_reg16_af((op >> 4) & 3, value);
            }

            // JP cc, nn - same cost taken or not
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let target = self.fetch16(bus);
                if self.condition((op >> 3) & 7) {
                    self.regs.pc = target;
                }
            }

            // JP nn
            0xC3 => {
                self.regs.pc = self.fetch16(bus);
            }

            // CALL cc, nn
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let target = self.fetch16(bus);
                if self.condition((op >> 3) & 7) {
                    self.charge(timing::CALL_TAKEN_EXTRA);
                    let ret = self.regs.pc;
                    self.push16(bus, ret);
                    self.regs.pc = target;
                }
            }

            // PUSH rr (C5=BC, D5=DE, E5=HL, F5=AF)
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let value = self.get_reg16_af((op >> 4) & 3);
                self.push16(bus, value);
            }

            // ALU A, n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let value = self.fetch8(bus);
                self.alu_a(op, value);
            }

            // RST n (target = op & 0x38)
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                let ret = self.regs.pc;
                self.push16(bus, ret);
                self.regs.pc = u16::from(op & 0x38);
            }

            // RET
            0xC9 => {
                self.regs.pc = self.pop16(bus);
            }

            // CALL nn
            0xCD => {
                let target = self.fetch16(bus);
                let ret = self.regs.pc;
                self.push16(bus, ret);
                self.regs.pc = target;
            }

            // OUT (n), A - port = A<<8 | n
            0xD3 => {
                let n = self.fetch8(bus);
                let port = (u16::from(self.regs.a) << 8) | u16::from(n);
                bus.port_out(port, self.regs.a);
            }

            // EXX
            0xD9 => self.regs.exx(),

            // IN A, (n) - port = A<<8 | n, no flags
            0xDB => {
                let n = self.fetch8(bus);
                let port = (u16::from(self.regs.a) << 8) | u16::from(n);
                self.regs.a = bus.port_in(port);
            }

            // EX (SP), HL
            0xE3 => {
                let sp = self.regs.sp;
                let stacked = self.read16(bus, sp);
                let hl = self.regs.hl();
                self.write16(bus, sp, hl);
                self.regs.set_hl(stacked);
            }

            // JP (HL)
            0xE9 => {
                self.regs.pc = self.regs.hl();
            }

            // EX DE, HL
            0xEB => self.regs.ex_de_hl(),

            // DI
            0xF3 => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
            }

            // LD SP, HL
            0xF9 => {
                self.regs.sp = self.regs.hl();
            }

            // EI - takes effect after the next instruction
            0xFB => self.set_ei_pending(),

            // Prefix bytes are routed before this table is reached
            0xCB | 0xDD | 0xED | 0xFD => {
                unreachable!("prefix byte {op:#04X} reached the base table")
            }
        }
    }

    /// ALU group dispatch: operation selected by bits 3-5 of the opcode.
    pub(crate) fn alu_a(&mut self, op: u8, value: u8) {
        match (op >> 3) & 7 {
            // ADD
            0 => {
                let result = alu::add8(self.regs.a, value, false);
                self.regs.a = result.value;
                self.regs.f = result.flags;
            }
            // ADC
            1 => {
                let carry = self.regs.f & CF != 0;
                let result = alu::add8(self.regs.a, value, carry);
                self.regs.a = result.value;
                self.regs.f = result.flags;
            }
            // SUB
            2 => {
                let result = alu::sub8(self.regs.a, value, false);
                self.regs.a = result.value;
                self.regs.f = result.flags;
            }
            // SBC
            3 => {
                let carry = self.regs.f & CF != 0;
                let result = alu::sub8(self.regs.a, value, carry);
                self.regs.a = result.value;
                self.regs.f = result.flags;
            }
            // AND
            4 => {
                self.regs.a &= value;
                self.regs.f = sz53p(self.regs.a) | HF;
            }
            // XOR
            5 => {
                self.regs.a ^= value;
                self.regs.f = sz53p(self.regs.a);
            }
            // OR
            6 => {
                self.regs.a |= value;
                self.regs.f = sz53p(self.regs.a);
            }
            // CP - Y/X come from the operand, not the difference
            7 => {
                let result = alu::sub8(self.regs.a, value, false);
                self.regs.f = (result.flags & !(YF | XF)) | (value & (YF | XF));
            }
            _ => unreachable!(),
        }
    }

    /// DAA: decimal-adjust A after BCD arithmetic.
    fn daa(&mut self) {
        let a = self.regs.a;
        let nf = self.regs.f & NF != 0;
        let cf = self.regs.f & CF != 0;
        let hf = self.regs.f & HF != 0;

        let mut correction: u8 = 0;
        let mut new_cf = cf;
        if hf || (a & 0x0F) > 9 {
            correction |= 0x06;
        }
        if cf || a > 0x99 {
            correction |= 0x60;
            new_cf = true;
        }

        let result = if nf {
            a.wrapping_sub(correction)
        } else {
            a.wrapping_add(correction)
        };

        let new_hf = if nf {
            hf && (a & 0x0F) < 6
        } else {
            (a & 0x0F) > 9
        };

        self.regs.a = result;
        self.regs.f = sz53p(result)
            | if nf { NF } else { 0 }
            | if new_cf { CF } else { 0 }
            | if new_hf { HF } else { 0 };
    }
}
