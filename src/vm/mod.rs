mod asm;
mod instr;
mod machine;

pub use asm::Asm;
pub use instr::{decode, decode_cell, descriptor, encode, EncodeError, Opcode};
pub use machine::{interpret, Machine, RunError, Trap};
