//! In-process integration tests driving the engine through the public
//! API, with programs produced by the bytecode builder.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use okto::vm::descriptor;
use okto::{Asm, Machine, Opcode, RunError, RuntimeConfig, Trap};

/// Writer handing its bytes to a shared buffer the test keeps.
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn run_with_input(program: &[u8], input: &[u8]) -> (Result<(), RunError>, String, Machine) {
    let out = Rc::new(RefCell::new(Vec::new()));
    let mut machine = Machine::with_io(
        &RuntimeConfig::default(),
        Box::new(io::Cursor::new(input.to_vec())),
        Box::new(SharedBuf(out.clone())),
    );
    let result = machine.run(program);
    let stdout = String::from_utf8(out.borrow().clone()).unwrap();
    (result, stdout, machine)
}

fn run(program: &[u8]) -> (Result<(), RunError>, String, Machine) {
    run_with_input(program, &[])
}

#[test]
fn test_output_special_case() {
    let mut asm = Asm::new();
    asm.push(5).add(3).output();
    let (result, stdout, _) = run(&asm.finish());
    result.unwrap();
    assert_eq!(stdout, "8\n");
}

#[test]
fn test_memory_round_trip_across_address_range() {
    // Load composes addresses as (high << 8) | low-byte-of-top, so the
    // loadable range starts at 256; cover it up to the last memory cell.
    for (i, addr) in [256i64, 300, 511, 600, 777, 999].into_iter().enumerate() {
        let value = 100 + i as i64;
        let mut asm = Asm::new();
        asm.push(value)
            .store(addr)
            .push(addr & 0xff)
            .load(addr >> 8)
            .output();
        let (result, stdout, machine) = run(&asm.finish());
        result.unwrap();
        assert_eq!(stdout, format!("{}\n", value), "address {}", addr);
        assert_eq!(machine.memory()[addr as usize] as i64, value);
    }
}

#[test]
fn test_wide_immediate_behaves_like_single_instruction() {
    let mut asm = Asm::new();
    asm.push(300).output();
    let (result, stdout, _) = run(&asm.finish());
    result.unwrap();
    assert_eq!(stdout, "300\n");
}

#[test]
fn test_repeat_with_computed_count() {
    // Build the descriptor (Add, 6) at run time: 2 + 6 * 8 = 50. The
    // repeat count comes off the stack, not out of the program.
    let mut asm = Asm::new();
    asm.push(0)
        .push(descriptor(Opcode::Add, 0))
        .add(6 * 8)
        .op(Opcode::Repeat, 5);
    let (result, _, machine) = run(&asm.finish());
    result.unwrap();
    assert_eq!(machine.stack(), &[0, 30]); // Add(5) six times
}

#[test]
fn test_conditional_gates_output() {
    let emit_when = |guard: i64| {
        let mut asm = Asm::new();
        asm.push(8)
            .push(descriptor(Opcode::Store, guard))
            .op(Opcode::Conditional, 0);
        let (result, stdout, _) = run(&asm.finish());
        result.unwrap();
        stdout
    };
    assert_eq!(emit_when(1), "8\n");
    assert_eq!(emit_when(0), "");
}

#[test]
fn test_input_feeds_the_stack() {
    let mut asm = Asm::new();
    asm.push(0).input().output().push(0).input().output();
    let (result, stdout, _) = run_with_input(&asm.finish(), b"AB");
    result.unwrap();
    assert_eq!(stdout, "65\n66\n");
}

#[test]
fn test_exhausted_input_is_fatal() {
    let mut asm = Asm::new();
    asm.push(0).input();
    let (result, _, _) = run(&asm.finish());
    let err = result.unwrap_err();
    assert_eq!(err.trap, Trap::EndOfInput);
}

#[test]
fn test_overflow_reports_index_and_state() {
    let mut asm = Asm::new();
    for _ in 0..101 {
        asm.push(0);
    }
    let (result, _, _) = run(&asm.finish());
    let err = result.unwrap_err();
    assert_eq!(err.trap, Trap::StackOverflow { top: 100 });
    assert_eq!(err.to_string(), "instruction 99: stack overflow (top = 100)");
}

#[test]
fn test_effects_before_a_trap_stand() {
    // Output already emitted is not rolled back by a later trap.
    let mut asm = Asm::new();
    asm.push(3).output().pop(1);
    let (result, stdout, _) = run(&asm.finish());
    assert!(result.is_err());
    assert_eq!(stdout, "3\n");
}
