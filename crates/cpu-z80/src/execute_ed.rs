//! ED-prefixed instruction execution: 16-bit arithmetic with carry, block
//! transfers, block I/O, and interrupt plumbing.
//!
//! Undefined ED opcodes execute as 8-T-state NOPs, which is the documented
//! hardware behaviour, never an error.

use crate::alu;
use crate::bus::Bus;
use crate::cpu::Z80;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, parity, sz53, sz53p};
use crate::timing;

impl Z80 {
    /// Execute an ED-prefixed instruction.
    pub(crate) fn execute_ed<B: Bus>(&mut self, bus: &mut B, op: u8) {
        match op {
            // IN r, (C) - 70 is IN (C): flags only, result discarded
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                let value = bus.port_in(self.regs.bc());
                let r = (op >> 3) & 7;
                if r != 6 {
                    self.set_reg8(r, value);
                }
                self.regs.f = sz53p(value) | (self.regs.f & CF);
            }

            // OUT (C), r - 71 is OUT (C),0
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let r = (op >> 3) & 7;
                let value = if r == 6 { 0 } else { self.get_reg8(r) };
                bus.port_out(self.regs.bc(), value);
            }

            // SBC HL, rr (42=BC, 52=DE, 62=HL, 72=SP)
            0x42 | 0x52 | 0x62 | 0x72 => {
                let rr = self.get_reg16((op >> 4) & 3);
                let carry = self.regs.f & CF != 0;
                let (result, flags) = alu::sbc16(self.regs.hl(), rr, carry);
                self.regs.set_hl(result);
                self.regs.f = flags;
            }

            // ADC HL, rr (4A=BC, 5A=DE, 6A=HL, 7A=SP)
            0x4A | 0x5A | 0x6A | 0x7A => {
                let rr = self.get_reg16((op >> 4) & 3);
                let carry = self.regs.f & CF != 0;
                let (result, flags) = alu::adc16(self.regs.hl(), rr, carry);
                self.regs.set_hl(result);
                self.regs.f = flags;
            }

            // LD (nn), rr (43=BC, 53=DE, 63=HL, 73=SP)
            0x43 | 0x53 | 0x63 | 0x73 => {
                let addr = self.fetch16(bus);
                let value = self.get_reg16((op >> 4) & 3);
                self.write16(bus, addr, value);
            }

            // LD rr, (nn) (4B=BC, 5B=DE, 6B=HL, 7B=SP)
            0x4B | 0x5B | 0x6B | 0x7B => {
                let addr = self.fetch16(bus);
                let value = self.read16(bus, addr);
                self.set_reg16((op >> 4) & 3, value);
            }

            // NEG (and undocumented mirrors)
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                let result = alu::sub8(0, self.regs.a, false);
                self.regs.a = result.value;
                self.regs.f = result.flags;
            }

            // RETN (and undocumented mirrors) - restores IFF1 from IFF2
            0x45 | 0x55 | 0x65 | 0x75 => {
                self.regs.iff1 = self.regs.iff2;
                self.regs.pc = self.pop16(bus);
            }

            // RETI - identical IFF handling on real silicon
            0x4D | 0x5D | 0x6D | 0x7D => {
                self.regs.iff1 = self.regs.iff2;
                self.regs.pc = self.pop16(bus);
            }

            // IM 0 (and mirrors)
            0x46 | 0x4E | 0x66 | 0x6E => self.regs.im = 0,
            // IM 1 (and mirror)
            0x56 | 0x76 => self.regs.im = 1,
            // IM 2 (and mirror)
            0x5E | 0x7E => self.regs.im = 2,

            // LD I, A
            0x47 => self.regs.i = self.regs.a,

            // LD R, A - the only way to set bit 7 of R
            0x4F => self.regs.r = self.regs.a,

            // LD A, I - PV exposes IFF2
            0x57 => {
                self.regs.a = self.regs.i;
                self.regs.f = (self.regs.f & CF)
                    | sz53(self.regs.a)
                    | if self.regs.iff2 { PF } else { 0 };
            }

            // LD A, R - PV exposes IFF2
            0x5F => {
                self.regs.a = self.regs.r;
                self.regs.f = (self.regs.f & CF)
                    | sz53(self.regs.a)
                    | if self.regs.iff2 { PF } else { 0 };
            }

            // RRD - low nibble of (HL) rotates into A
            0x67 => {
                let addr = self.regs.hl();
                let mem = self.mem_read(bus, addr);
                let new_a = (self.regs.a & 0xF0) | (mem & 0x0F);
                let new_mem = ((self.regs.a & 0x0F) << 4) | (mem >> 4);
                self.regs.a = new_a;
                self.mem_write(bus, addr, new_mem);
                self.regs.f = sz53p(self.regs.a) | (self.regs.f & CF);
            }

            // RLD - high nibble of (HL) rotates into A
            0x6F => {
                let addr = self.regs.hl();
                let mem = self.mem_read(bus, addr);
                let new_a = (self.regs.a & 0xF0) | (mem >> 4);
                let new_mem = ((mem & 0x0F) << 4) | (self.regs.a & 0x0F);
                self.regs.a = new_a;
                self.mem_write(bus, addr, new_mem);
                self.regs.f = sz53p(self.regs.a) | (self.regs.f & CF);
            }

            // Block transfers
            0xA0 => self.ld_block(bus, 1, false),
            0xA8 => self.ld_block(bus, 0xFFFF, false),
            0xB0 => self.ld_block(bus, 1, true),
            0xB8 => self.ld_block(bus, 0xFFFF, true),

            // Block compares
            0xA1 => self.cp_block(bus, 1, false),
            0xA9 => self.cp_block(bus, 0xFFFF, false),
            0xB1 => self.cp_block(bus, 1, true),
            0xB9 => self.cp_block(bus, 0xFFFF, true),

            // Block port reads
            0xA2 => self.in_block(bus, 1, false),
            0xAA => self.in_block(bus, 0xFFFF, false),
            0xB2 => self.in_block(bus, 1, true),
            0xBA => self.in_block(bus, 0xFFFF, true),

            // Block port writes
            0xA3 => self.out_block(bus, 1, false),
            0xAB => self.out_block(bus, 0xFFFF, false),
            0xB3 => self.out_block(bus, 1, true),
            0xBB => self.out_block(bus, 0xFFFF, true),

            // Every other ED opcode is a NOP (cost already charged)
            _ => {}
        }
    }

    /// LDI/LDD/LDIR/LDDR: (HL) -> (DE), advance pointers by `delta`,
    /// decrement BC. Y and X encode `n = transferred + A` (bits 1 and 3);
    /// on the repeat path they come from the high byte of the rewound PC.
    fn ld_block<B: Bus>(&mut self, bus: &mut B, delta: u16, repeat: bool) {
        let hl = self.regs.hl();
        let de = self.regs.de();
        let value = self.mem_read(bus, hl);
        self.mem_write(bus, de, value);

        self.regs.set_hl(hl.wrapping_add(delta));
        self.regs.set_de(de.wrapping_add(delta));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        if repeat && bc != 0 {
            self.charge(timing::BLOCK_REPEAT_EXTRA);
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            let pch = (self.regs.pc >> 8) as u8;
            self.regs.f = (self.regs.f & (SF | ZF | CF)) | PF | (pch & (YF | XF));
        } else {
            let n = value.wrapping_add(self.regs.a);
            self.regs.f = (self.regs.f & (SF | ZF | CF))
                | (n & XF)
                | if n & 0x02 != 0 { YF } else { 0 }
                | if bc != 0 { PF } else { 0 };
        }
    }

    /// CPI/CPD/CPIR/CPDR: compare A with (HL), advance HL, decrement BC.
    /// Z tracks `A == (HL)`; the repeat variants stop early on a match.
    fn cp_block<B: Bus>(&mut self, bus: &mut B, delta: u16, repeat: bool) {
        let hl = self.regs.hl();
        let value = self.mem_read(bus, hl);
        let result = self.regs.a.wrapping_sub(value);
        let hf = (self.regs.a & 0x0F) < (value & 0x0F);
        let n = result.wrapping_sub(u8::from(hf));

        self.regs.set_hl(hl.wrapping_add(delta));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        let base = (self.regs.f & CF)
            | NF
            | (result & SF)
            | if result == 0 { ZF } else { 0 }
            | if hf { HF } else { 0 }
            | if bc != 0 { PF } else { 0 };

        if repeat && bc != 0 && result != 0 {
            self.charge(timing::BLOCK_REPEAT_EXTRA);
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            let pch = (self.regs.pc >> 8) as u8;
            self.regs.f = base | (pch & (YF | XF));
        } else {
            self.regs.f = base | (n & XF) | if n & 0x02 != 0 { YF } else { 0 };
        }
    }

    /// INI/IND/INIR/INDR: port (BC) -> (HL), advance HL, decrement B.
    fn in_block<B: Bus>(&mut self, bus: &mut B, delta: u16, repeat: bool) {
        let value = bus.port_in(self.regs.bc());
        let hl = self.regs.hl();
        self.mem_write(bus, hl, value);

        self.regs.b = self.regs.b.wrapping_sub(1);
        self.regs.set_hl(hl.wrapping_add(delta));

        // The undocumented flag material: k = value + (C ± 1)
        let adjacent = if delta == 1 {
            self.regs.c.wrapping_add(1)
        } else {
            self.regs.c.wrapping_sub(1)
        };
        let k = u16::from(value) + u16::from(adjacent);
        self.io_block_flags(value, k, repeat);
    }

    /// OUTI/OUTD/OTIR/OTDR: (HL) -> port (BC), advance HL, decrement B.
    /// B is decremented before it appears on the port address.
    fn out_block<B: Bus>(&mut self, bus: &mut B, delta: u16, repeat: bool) {
        let hl = self.regs.hl();
        let value = self.mem_read(bus, hl);
        self.regs.b = self.regs.b.wrapping_sub(1);
        bus.port_out(self.regs.bc(), value);
        self.regs.set_hl(hl.wrapping_add(delta));

        // k = value + L, after the HL adjustment
        let k = u16::from(value) + u16::from(self.regs.l);
        self.io_block_flags(value, k, repeat);
    }

    /// Shared flag computation for the four block I/O families, matching
    /// the Fuse test-suite semantics.
    fn io_block_flags(&mut self, value: u8, k: u16, repeat: bool) {
        let b = self.regs.b;
        let hcf = k > 255;
        let nf = value & 0x80 != 0;
        let p = ((k as u8) & 7) ^ b;

        if repeat && b != 0 {
            self.charge(timing::BLOCK_REPEAT_EXTRA);
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            let pch = (self.regs.pc >> 8) as u8;

            // On the repeat path H and parity are derived from the state the
            // next iteration will observe.
            let (hf, pf) = if hcf {
                if nf {
                    (
                        if b & 0x0F == 0x00 { HF } else { 0 },
                        parity(p ^ (b.wrapping_sub(1) & 7)),
                    )
                } else {
                    (
                        if b & 0x0F == 0x0F { HF } else { 0 },
                        parity(p ^ (b.wrapping_add(1) & 7)),
                    )
                }
            } else {
                (0, parity(p ^ (b & 7)))
            };

            self.regs.f = (b & SF)
                | (pch & (YF | XF))
                | if nf { NF } else { 0 }
                | if hcf { CF } else { 0 }
                | hf
                | pf;
        } else {
            self.regs.f = (if b == 0 { ZF } else { 0 })
                | (b & (SF | YF | XF))
                | if nf { NF } else { 0 }
                | if hcf { HF | CF } else { 0 }
                | parity(p);
        }
    }
}
