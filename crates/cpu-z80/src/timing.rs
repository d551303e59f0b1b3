//! Base T-state cost tables, one per decode table.
//!
//! Entries are the documented not-taken costs; handlers add the surcharge
//! for taken conditionals (DJNZ/JR +5, RET cc +6, CALL cc +7) and for
//! repeating block instructions (+5). Contention waits come from the bus
//! and are charged on top.

/// Unprefixed opcodes. The CB/ED/DD/FD entries hold the 4 T-states of the
/// prefix fetch itself; the prefixed tables below carry the rest.
#[rustfmt::skip]
pub const BASE: [u8; 256] = [
    //  x0  x1  x2  x3  x4  x5  x6  x7  x8  x9  xA  xB  xC  xD  xE  xF
         4, 10,  7,  6,  4,  4,  7,  4,  4, 11,  7,  6,  4,  4,  7,  4, // 0x
         8, 10,  7,  6,  4,  4,  7,  4, 12, 11,  7,  6,  4,  4,  7,  4, // 1x
         7, 10, 16,  6,  4,  4,  7,  4,  7, 11, 16,  6,  4,  4,  7,  4, // 2x
         7, 10, 13,  6, 11, 11, 10,  4,  7, 11, 13,  6,  4,  4,  7,  4, // 3x
         4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 4x
         4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 5x
         4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 6x
         7,  7,  7,  7,  7,  7,  4,  7,  4,  4,  4,  4,  4,  4,  7,  4, // 7x
         4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 8x
         4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 9x
         4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // Ax
         4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // Bx
         5, 10, 10, 10, 10, 11,  7, 11,  5, 10, 10,  4, 10, 17,  7, 11, // Cx
         5, 10, 10, 11, 10, 11,  7, 11,  5,  4, 10, 11, 10,  4,  7, 11, // Dx
         5, 10, 10, 19, 10, 11,  7, 11,  5,  4, 10,  4, 10,  4,  7, 11, // Ex
         5, 10, 10,  4, 10, 11,  7, 11,  5,  6, 10,  4, 10,  4,  7, 11, // Fx
];

/// CB-prefixed opcodes, full cost including the prefix fetch.
/// Rotate/shift/RES/SET: 8 on registers, 15 on (HL). BIT: 8 / 12.
pub const CB: [u8; 256] = {
    let mut t = [8u8; 256];
    let mut op = 0x06;
    while op < 0x100 {
        t[op] = if op >= 0x40 && op < 0x80 { 12 } else { 15 };
        op += 8;
    }
    t
};

/// ED-prefixed opcodes, full cost including the prefix fetch.
/// Undefined entries are the documented 8-T-state NOP.
#[rustfmt::skip]
pub const ED: [u8; 256] = [
    //  x0  x1  x2  x3  x4  x5  x6  x7  x8  x9  xA  xB  xC  xD  xE  xF
         8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8, // 0x
         8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8, // 1x
         8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8, // 2x
         8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8, // 3x
        12, 12, 15, 20,  8, 14,  8,  9, 12, 12, 15, 20,  8, 14,  8,  9, // 4x
        12, 12, 15, 20,  8, 14,  8,  9, 12, 12, 15, 20,  8, 14,  8,  9, // 5x
        12, 12, 15, 20,  8, 14,  8, 18, 12, 12, 15, 20,  8, 14,  8, 18, // 6x
        12, 12, 15, 20,  8, 14,  8,  8, 12, 12, 15, 20,  8, 14,  8,  8, // 7x
         8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8, // 8x
         8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8, // 9x
        16, 16, 16, 16,  8,  8,  8,  8, 16, 16, 16, 16,  8,  8,  8,  8, // Ax
        16, 16, 16, 16,  8,  8,  8,  8, 16, 16, 16, 16,  8,  8,  8,  8, // Bx
         8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8, // Cx
         8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8, // Dx
         8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8, // Ex
         8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8,  8, // Fx
];

/// DD/FD-prefixed opcodes: cost of the instruction *after* the 4-T-state
/// prefix. Mirrored register forms keep their base cost; the (IX+d)/(IY+d)
/// memory forms carry the displacement fetch and the internal add.
pub const INDEXED: [u8; 256] = {
    let mut t = BASE;
    t[0x34] = 19; // INC (IX+d): 23 total
    t[0x35] = 19; // DEC (IX+d): 23 total
    t[0x36] = 15; // LD (IX+d),n: 19 total
    let mut r = 0;
    while r < 8 {
        if r != 6 {
            t[0x46 + r * 8] = 15; // LD r,(IX+d): 19 total
            t[0x70 + r] = 15; // LD (IX+d),r: 19 total
        }
        t[0x86 + r * 8] = 15; // ALU A,(IX+d): 19 total
        r += 1;
    }
    t
};

/// DDCB/FDCB sub-opcodes: cost after the 4-T-state DD/FD prefix.
/// Rotate/shift/RES/SET on (IX+d): 23 total. BIT: 20 total.
pub const INDEXED_CB: [u8; 256] = {
    let mut t = [19u8; 256];
    let mut op = 0x40;
    while op < 0x80 {
        t[op] = 16;
        op += 1;
    }
    t
};

/// Surcharge for a taken JR/DJNZ.
pub const JR_TAKEN_EXTRA: u8 = 5;
/// Surcharge for a taken RET cc.
pub const RET_TAKEN_EXTRA: u8 = 6;
/// Surcharge for a taken CALL cc.
pub const CALL_TAKEN_EXTRA: u8 = 7;
/// Surcharge when a block instruction repeats (LDIR and friends).
pub const BLOCK_REPEAT_EXTRA: u8 = 5;

/// Cost of accepting a maskable interrupt in IM 0 / IM 1.
pub const INT_ACCEPT_IM01: u8 = 13;
/// Cost of accepting a maskable interrupt in IM 2 (vector fetch).
pub const INT_ACCEPT_IM2: u8 = 19;
/// Cost of a non-maskable interrupt.
pub const NMI_ACCEPT: u8 = 11;
