//! The okto execution engine.
//!
//! A [`Machine`] owns the stack and memory for one run. The run loop
//! decodes each program byte as a top-level instruction; the composition
//! opcodes (`Repeat`, `Extend`, `Conditional`) re-enter the dispatcher
//! recursively, reinterpreting stack cells as further instructions. That
//! recursion is what turns a 5-bit immediate into arbitrarily wide
//! values and data-dependent control flow.

use std::io::{self, Read, Write};

use crate::config::RuntimeConfig;
use crate::vm::instr::{decode, decode_cell, Opcode};

/// A fatal condition raised during execution.
///
/// The engine never recovers from a trap: the run aborts and effects
/// already performed (including emitted output) stand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trap {
    /// The stack index was driven below zero.
    StackUnderflow { top: isize },
    /// The stack index was driven at or past capacity.
    StackOverflow { top: isize },
    /// A `Load`/`Store` address fell outside memory.
    MemoryOutOfRange { addr: i64 },
    /// `Load(0)` requested input but the source is exhausted.
    EndOfInput,
    /// Composition recursion exceeded the configured depth limit.
    NestingTooDeep { depth: usize },
    /// The input or output hook failed.
    Io(io::ErrorKind),
}

impl std::fmt::Display for Trap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trap::StackUnderflow { top } => {
                write!(f, "stack underflow (top = {})", top)
            }
            Trap::StackOverflow { top } => {
                write!(f, "stack overflow (top = {})", top)
            }
            Trap::MemoryOutOfRange { addr } => {
                write!(f, "memory address {} out of range", addr)
            }
            Trap::EndOfInput => write!(f, "end of input"),
            Trap::NestingTooDeep { depth } => {
                write!(f, "composition nesting too deep (depth = {})", depth)
            }
            Trap::Io(kind) => write!(f, "i/o error: {}", kind),
        }
    }
}

impl std::error::Error for Trap {}

/// A trap together with the index of the violating top-level instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    /// Byte index of the top-level instruction that trapped.
    pub index: usize,
    pub trap: Trap,
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "instruction {}: {}", self.index, self.trap)
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.trap)
    }
}

/// The okto virtual machine.
///
/// Stack and memory are private to the machine and zeroed at the start
/// of each [`run`](Machine::run). Input and output hooks are injectable
/// streams; the defaults are stdin and stdout.
pub struct Machine {
    /// Backing cells. One spare slot past the configured capacity so the
    /// first out-of-range `top` produced by a full-stack `Push` is seen
    /// by the top-level bounds check instead of an out-of-range write.
    stack: Vec<i32>,
    /// Index of the last occupied stack slot. Starts at 0 with slot 0
    /// pre-zeroed, so the stack always has at least one valid cell.
    top: isize,
    memory: Vec<i32>,
    stack_capacity: usize,
    max_depth: usize,
    trace: bool,
    input: Box<dyn Read>,
    output: Box<dyn Write>,
}

impl Machine {
    /// Create a machine wired to stdin/stdout.
    pub fn new(config: &RuntimeConfig) -> Self {
        Self::with_io(config, Box::new(io::stdin()), Box::new(io::stdout()))
    }

    /// Create a machine with custom input and output streams.
    pub fn with_io(
        config: &RuntimeConfig,
        input: Box<dyn Read>,
        output: Box<dyn Write>,
    ) -> Self {
        Self {
            stack: vec![0; config.stack_capacity + 1],
            top: 0,
            memory: vec![0; config.memory_capacity],
            stack_capacity: config.stack_capacity,
            max_depth: config.max_nesting_depth,
            trace: false,
            input,
            output,
        }
    }

    /// Log each top-level instruction to stderr while running.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// Index of the last occupied stack slot.
    pub fn top(&self) -> isize {
        self.top
    }

    /// The occupied portion of the stack, bottom first.
    pub fn stack(&self) -> &[i32] {
        let len = (self.top + 1).clamp(0, self.stack.len() as isize) as usize;
        &self.stack[..len]
    }

    /// The machine's memory array.
    pub fn memory(&self) -> &[i32] {
        &self.memory
    }

    /// Run a program: decode each byte in order and dispatch it as a
    /// top-level instruction, enforcing stack bounds after each one.
    ///
    /// Stack and memory are zeroed first, so a machine can be reused,
    /// but nothing carries over between runs.
    pub fn run(&mut self, program: &[u8]) -> Result<(), RunError> {
        self.stack.fill(0);
        self.memory.fill(0);
        self.top = 0;

        for (index, &byte) in program.iter().enumerate() {
            let (op, imm) = decode(byte);
            if self.trace {
                eprintln!("[trace] {:4}: {:?} imm={} top={}", index, op, imm, self.top);
            }
            self.execute(op, imm as i64, 0)
                .map_err(|trap| RunError { index, trap })?;

            // Bounds are enforced only between top-level instructions;
            // composition opcodes may transiently leave `top` outside as
            // long as the outer instruction restores it before returning.
            if self.top < 0 {
                return Err(RunError {
                    index,
                    trap: Trap::StackUnderflow { top: self.top },
                });
            }
            if self.top as usize >= self.stack_capacity {
                return Err(RunError {
                    index,
                    trap: Trap::StackOverflow { top: self.top },
                });
            }
        }
        Ok(())
    }

    /// Execute one instruction. `value` is the already-resolved
    /// immediate: the byte's own 5-bit field at top level, or a widened
    /// value when reached through `Extend`.
    fn execute(&mut self, op: Opcode, value: i64, depth: usize) -> Result<(), Trap> {
        if depth > self.max_depth {
            return Err(Trap::NestingTooDeep { depth });
        }

        match op {
            Opcode::Push => {
                self.top += 1;
                let slot = self.slot(self.top)?;
                self.stack[slot] = value as i32;
            }
            Opcode::Pop => {
                self.top -= value as isize;
            }
            Opcode::Add => {
                let slot = self.slot(self.top)?;
                self.stack[slot] = self.stack[slot].wrapping_add(value as i32);
            }
            Opcode::Repeat => {
                let (inner, count) = decode_cell(self.pop_descriptor()?);
                for _ in 0..count {
                    self.execute(inner, value, depth + 1)?;
                }
            }
            Opcode::Extend => {
                let (inner, tail) = decode_cell(self.pop_descriptor()?);
                self.execute(inner, value.wrapping_shl(8) | tail, depth + 1)?;
            }
            Opcode::Conditional => {
                let (inner, guard) = decode_cell(self.pop_descriptor()?);
                if guard > 0 {
                    self.execute(inner, value, depth + 1)?;
                }
            }
            Opcode::Load => {
                let slot = self.slot(self.top)?;
                if value != 0 {
                    let addr = value.wrapping_shl(8) | (self.stack[slot] as u8 as i64);
                    self.stack[slot] = self.mem_read(addr)?;
                } else {
                    self.stack[slot] = self.read_input()?;
                }
            }
            Opcode::Store => {
                let slot = self.slot(self.top)?;
                let cell = self.stack[slot];
                if value != 0 {
                    self.mem_write(value, cell)?;
                } else {
                    writeln!(self.output, "{}", cell).map_err(|e| Trap::Io(e.kind()))?;
                }
                self.top -= 1;
            }
        }
        Ok(())
    }

    /// Consume the top cell as a composition descriptor.
    fn pop_descriptor(&mut self) -> Result<i32, Trap> {
        let slot = self.slot(self.top)?;
        let cell = self.stack[slot];
        self.top -= 1;
        Ok(cell)
    }

    /// Validate a stack index against the physical backing. Even where
    /// the top-level bounds check is deferred, a cell access at an
    /// out-of-range index traps immediately rather than touching memory
    /// the machine does not own.
    fn slot(&self, at: isize) -> Result<usize, Trap> {
        if at < 0 {
            Err(Trap::StackUnderflow { top: at })
        } else if at as usize >= self.stack.len() {
            Err(Trap::StackOverflow { top: at })
        } else {
            Ok(at as usize)
        }
    }

    fn mem_read(&self, addr: i64) -> Result<i32, Trap> {
        if addr < 0 || addr as usize >= self.memory.len() {
            return Err(Trap::MemoryOutOfRange { addr });
        }
        Ok(self.memory[addr as usize])
    }

    fn mem_write(&mut self, addr: i64, value: i32) -> Result<(), Trap> {
        if addr < 0 || addr as usize >= self.memory.len() {
            return Err(Trap::MemoryOutOfRange { addr });
        }
        self.memory[addr as usize] = value;
        Ok(())
    }

    /// Read exactly one input unit (one byte) for `Load(0)`.
    fn read_input(&mut self) -> Result<i32, Trap> {
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Err(Trap::EndOfInput),
                Ok(_) => return Ok(buf[0] as i32),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Trap::Io(e.kind())),
            }
        }
    }
}

/// Run a program on a fresh machine with default limits, wired to
/// stdin/stdout.
pub fn interpret(program: &[u8]) -> Result<(), RunError> {
    Machine::new(&RuntimeConfig::default()).run(program)
}
