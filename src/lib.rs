//! Okto — a minimal stack-based bytecode virtual machine.
//!
//! Each instruction is one byte: a 3-bit opcode and a 5-bit immediate.
//! Three composition opcodes (`Repeat`, `Extend`, `Conditional`) pop a
//! stack cell, reinterpret it as a further instruction, and recurse,
//! which is how the machine gets arbitrarily wide immediates and
//! data-dependent control flow out of an 8-bit encoding.

pub mod config;
pub mod vm;

// Re-export commonly used types
pub use config::{Profile, RuntimeConfig};
pub use vm::{interpret, Asm, Machine, Opcode, RunError, Trap};
