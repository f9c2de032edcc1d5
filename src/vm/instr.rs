//! Instruction encoding for the okto VM.
//!
//! Wire format (one instruction per byte):
//! - bits 0..2: opcode (0-7)
//! - bits 3..7: immediate (0-31)
//!
//! Every byte value decodes to a valid instruction; the opcode numbering
//! below is part of the wire format and must not change.
//!
//! The same bit layout is applied to stack cells when a composition
//! opcode (`Repeat`, `Extend`, `Conditional`) reinterprets a cell as a
//! descriptor. A cell is wider than a byte, so the constant extracted
//! from a descriptor can exceed 5 bits; that is what lets descriptor
//! tails carry full 8-bit chunks in an `Extend` chain.

/// Mask selecting the 3 opcode bits of an instruction.
pub const OP_MASK: u8 = 0b0000_0111;

/// Shift separating the immediate field from the opcode bits.
pub const IMM_SHIFT: u32 = 3;

/// Largest immediate representable in a single instruction byte.
pub const IMM_MAX: u8 = 0b1_1111;

/// The eight opcodes of the machine, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Push the immediate onto the stack.
    Push = 0,
    /// Pop `immediate` cells off the stack.
    Pop = 1,
    /// Add the immediate to the top cell in place.
    Add = 2,
    /// Pop a descriptor cell and run its opcode `constant` times.
    Repeat = 3,
    /// Pop a descriptor cell and run its opcode with a widened immediate.
    Extend = 4,
    /// Pop a descriptor cell and run its opcode only if `constant > 0`.
    Conditional = 5,
    /// Read memory (or, with immediate 0, one unit of external input).
    Load = 6,
    /// Write memory (or, with immediate 0, one unit of external output).
    Store = 7,
}

impl Opcode {
    /// Decode the opcode bits of a raw value. Total: every 3-bit value
    /// names an opcode.
    pub fn from_bits(bits: u8) -> Opcode {
        match bits & OP_MASK {
            0 => Opcode::Push,
            1 => Opcode::Pop,
            2 => Opcode::Add,
            3 => Opcode::Repeat,
            4 => Opcode::Extend,
            5 => Opcode::Conditional,
            6 => Opcode::Load,
            7 => Opcode::Store,
            _ => unreachable!("masked to 3 bits"),
        }
    }
}

/// Error type for instruction encoding.
///
/// Decoding is total and cannot fail; this only guards the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Immediate does not fit the 5-bit field.
    ImmediateOutOfRange(u32),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::ImmediateOutOfRange(v) => {
                write!(f, "immediate {} does not fit in 5 bits (max {})", v, IMM_MAX)
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// Decode one program byte into `(opcode, immediate)`.
pub fn decode(byte: u8) -> (Opcode, u8) {
    (Opcode::from_bits(byte), byte >> IMM_SHIFT)
}

/// Decode a stack cell as a descriptor: same layout as [`decode`], but
/// the constant keeps the full width of the cell above the opcode bits.
pub fn decode_cell(cell: i32) -> (Opcode, i64) {
    let raw = cell as u32;
    (Opcode::from_bits(raw as u8), (raw >> IMM_SHIFT) as i64)
}

/// Build the cell value a composition opcode would decode back into
/// `(op, constant)`. Inverse of [`decode_cell`] for in-range constants.
pub fn descriptor(op: Opcode, constant: i64) -> i64 {
    (constant << IMM_SHIFT) | op as i64
}

/// Encode an `(opcode, immediate)` pair into one instruction byte.
pub fn encode(op: Opcode, immediate: u8) -> Result<u8, EncodeError> {
    if immediate > IMM_MAX {
        return Err(EncodeError::ImmediateOutOfRange(immediate as u32));
    }
    Ok((immediate << IMM_SHIFT) | op as u8)
}
