//! Cycle-accurate Z80 CPU interpreter.
//!
//! Each call to [`Z80::step`] executes exactly one instruction and returns
//! the T-states it consumed, including contention wait states reported by
//! the bus. The T-state counter is a monotonic `u64` that is never reset;
//! callers that want a per-frame target work with deltas.

mod alu;
mod bus;
mod cpu;
mod execute;
mod execute_cb;
mod execute_ed;
mod execute_index;
mod flags;
mod registers;
mod timing;

pub use bus::{Bus, MemRead};
pub use cpu::Z80;
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use registers::Registers;
