//! Programmatic bytecode builder.
//!
//! The engine consumes any flat byte sequence; this builder is one
//! convenient producer. Its one non-trivial job is widening: an
//! immediate that does not fit the 5-bit field is emitted as an
//! `Extend` chain that stages descriptor cells on the machine's own
//! stack, most significant chunk first, exactly the composition
//! protocol the engine implements.

use crate::vm::instr::{descriptor, encode, Opcode, IMM_MAX};

/// Bytecode builder.
#[derive(Debug, Default)]
pub struct Asm {
    code: Vec<u8>,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit one instruction. Values wider than the 5-bit field are
    /// emitted as an `Extend` chain; see [`op_wide`](Asm::op_wide).
    pub fn op(&mut self, op: Opcode, imm: u8) -> &mut Self {
        self.op_wide(op, imm as i64)
    }

    /// Emit `op` with an arbitrary non-negative immediate.
    ///
    /// A value over 5 bits becomes: push the descriptor cell carrying
    /// the low 8-bit chunk (itself widened the same way if needed),
    /// then `Extend` over the remaining high bits. Executing the emitted
    /// sequence nets exactly `execute(op, value)`.
    pub fn op_wide(&mut self, op: Opcode, value: i64) -> &mut Self {
        debug_assert!(value >= 0, "the builder emits non-negative immediates");
        if value <= IMM_MAX as i64 {
            let byte = encode(op, value as u8).expect("value fits the 5-bit field");
            self.code.push(byte);
        } else {
            self.op_wide(Opcode::Push, descriptor(op, value & 0xff));
            self.op_wide(Opcode::Extend, value >> 8);
        }
        self
    }

    /// Push a value onto the machine stack.
    pub fn push(&mut self, value: i64) -> &mut Self {
        self.op_wide(Opcode::Push, value)
    }

    /// Discard `count` cells.
    pub fn pop(&mut self, count: i64) -> &mut Self {
        self.op_wide(Opcode::Pop, count)
    }

    /// Add `value` into the top cell.
    pub fn add(&mut self, value: i64) -> &mut Self {
        self.op_wide(Opcode::Add, value)
    }

    /// Load from memory; the effective address is `(high << 8)` plus
    /// the low byte of the top cell. `high` must be nonzero or the
    /// instruction turns into an input read.
    pub fn load(&mut self, high: i64) -> &mut Self {
        debug_assert!(high != 0, "use input() for the Load(0) special case");
        self.op_wide(Opcode::Load, high)
    }

    /// Store the top cell at memory address `addr` (nonzero).
    pub fn store(&mut self, addr: i64) -> &mut Self {
        debug_assert!(addr != 0, "use output() for the Store(0) special case");
        self.op_wide(Opcode::Store, addr)
    }

    /// Replace the top cell with one unit of external input.
    pub fn input(&mut self) -> &mut Self {
        self.op_wide(Opcode::Load, 0)
    }

    /// Emit the top cell to external output (and consume it).
    pub fn output(&mut self) -> &mut Self {
        self.op_wide(Opcode::Store, 0)
    }

    /// The bytes emitted so far.
    pub fn bytes(&self) -> &[u8] {
        &self.code
    }

    /// Finish the program.
    pub fn finish(self) -> Vec<u8> {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::vm::machine::Machine;
    use std::io;

    fn run(program: &[u8]) -> Machine {
        let mut m = Machine::with_io(
            &RuntimeConfig::default(),
            Box::new(io::empty()),
            Box::new(io::sink()),
        );
        m.run(program).unwrap();
        m
    }

    #[test]
    fn test_small_immediates_are_single_bytes() {
        let mut asm = Asm::new();
        asm.push(5).add(3).output();
        assert_eq!(asm.bytes(), &[40, 26, 7]);
    }

    #[test]
    fn test_wide_push_round_trips_through_machine() {
        for value in [32, 300, 2047, 70_000, 1 << 20] {
            let mut asm = Asm::new();
            asm.push(value);
            let m = run(&asm.finish());
            assert_eq!(m.top(), 1, "value {}", value);
            assert_eq!(m.stack()[1] as i64, value, "value {}", value);
        }
    }

    #[test]
    fn test_wide_chain_for_300_matches_hand_encoding() {
        // 300 = chunks 1 and 44: stage (Push, 44) as a descriptor, then
        // Extend(1). The descriptor cell 352 needs its own chain.
        let mut asm = Asm::new();
        asm.push(300);
        let m = run(asm.bytes());
        assert_eq!(m.stack(), &[0, 300]);
    }

    #[test]
    fn test_wide_pop_discards_many_cells() {
        let mut asm = Asm::new();
        for _ in 0..40 {
            asm.push(1);
        }
        asm.pop(39);
        let m = run(&asm.finish());
        assert_eq!(m.top(), 1);
    }

    #[test]
    fn test_wide_store_and_load() {
        // memory[300] = 77, then read it back via (1 << 8) | 44.
        let mut asm = Asm::new();
        asm.push(77).store(300).push(44).load(1);
        let m = run(&asm.finish());
        assert_eq!(m.memory()[300], 77);
        assert_eq!(m.stack(), &[0, 77]);
    }
}
