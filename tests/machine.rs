//! Whole-program runs through the public API

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use emu_lib::config::MachineConfig;
use emu_lib::cpu::MCAUSE;
use emu_lib::cpu::MEPC;
use emu_lib::cpu::MIP;
use emu_lib::error::MemoryError;
use emu_lib::error::MemoryErrorKind;
use emu_lib::error::SimulatorError;
use emu_lib::interrupt::Cause;
use emu_lib::interrupt::ManualClock;
use emu_lib::run_wrapper;
use emu_lib::run_wrapper::Machine;
use emu_lib::single_cycle::step;
use emu_lib::single_cycle::ExitReason;
use emu_lib::single_cycle::StepOutcome;

const QUANTUM_MS: u64 = 10;
const HANDLER: usize = 0x100;

const ECALL: i32 = 0x0000_0073;
const EBREAK: i32 = 0x0010_0073;
const MRET: i32 = 0x3020_0073;
// jal x0, 0
const SPIN: i32 = 0x0000_006f;

fn config() -> MachineConfig {
    MachineConfig {
        memory_size: 4096,
        width: 4,
        height: 2,
        timer_quantum: Duration::from_millis(QUANTUM_MS),
        ..Default::default()
    }
}

fn machine(program: &[i32]) -> (Machine, ManualClock) {
    let clock = ManualClock::default();
    let mut machine = Machine::with_clock(config(), Box::new(clock.clone())).unwrap();
    machine.load(program).unwrap();
    (machine, clock)
}

/// Enables interrupts with the vector at `HANDLER`, then spins at 16.
/// `handler` is placed `offset` bytes past the vector base.
fn interrupt_program(offset: usize, handler: &[i32]) -> Vec<i32> {
    let mut program = vec![
        0x1000_0093u32 as i32, // addi x1, x0, 0x100
        0x3050_9073,           // csrrw x0, mtvec, x1
        0x0010_0113,           // addi x2, x0, 1
        0x3041_1073,           // csrrw x0, mie, x2
        SPIN,
    ];
    program.resize(HANDLER / 4 + 8, 0);
    let at = (HANDLER + offset) / 4;
    program[at..at + handler.len()].copy_from_slice(handler);
    program
}

fn step_n(machine: &mut Machine, n: usize) {
    for _ in 0..n {
        step(&mut machine.cpu).unwrap();
    }
}

#[test]
fn test_load_then_add() {
    // lw x1, 5(x0); add x3, x1, x2; ecall
    let (mut m, _clock) = machine(&[0x0050_2083, 0x0020_81b3, ECALL]);
    m.cpu.gpr.write(2, 2);

    // Address 5 straddles the first two program words
    step_n(&mut m, 1);
    let loaded = m.cpu.gpr.read(1);
    assert_eq!(loaded, m.cpu.bus.read_word(5).unwrap());

    step_n(&mut m, 1);
    assert_eq!(m.cpu.gpr.read(3), loaded.wrapping_add(2));
}

#[test]
fn test_ebreak_reports_guest_counters() {
    let program = [
        0x0030_0093, // addi x1, x0, 3
        0x4010_2023, // sw x1, 1024(x0)
        0x0040_0093, // addi x1, x0, 4
        0x4010_2223, // sw x1, 1028(x0)
        EBREAK,
    ];
    let (mut m, _clock) = machine(&program);

    let summary = m.run(&AtomicBool::new(false), None).unwrap();
    assert_eq!(summary.exit, ExitReason::Ebreak { timer_interrupts: 3, key_interrupts: 4 });
    assert_eq!(summary.instructions, 4);
}

#[test]
fn test_timer_round_trip() {
    // Handler: addi x5, x5, 1; mret
    let program = interrupt_program(0, &[0x0012_8293, MRET]);
    let (mut m, clock) = machine(&program);

    // Setup and the first spin
    step_n(&mut m, 5);
    assert_eq!(m.cpu.pc.read(), 16);

    clock.advance(QUANTUM_MS);
    let outcome = step(&mut m.cpu).unwrap();
    assert_eq!(outcome, StepOutcome::Trapped { cause: Cause::Timer, from: 16, to: 0x100 });
    assert_eq!(m.cpu.csr.get(MCAUSE), 1);

    // No nesting while the handler runs
    clock.advance(10 * QUANTUM_MS);
    step_n(&mut m, 2);
    assert_eq!(m.cpu.gpr.read(5), 1);
    assert_eq!(m.cpu.pc.read(), 16);
    assert_eq!(m.cpu.csr.get(MIP), 0);

    // mret started a fresh epoch
    step_n(&mut m, 1);
    assert_eq!(m.cpu.pc.read(), 16);
    clock.advance(QUANTUM_MS);
    assert!(matches!(step(&mut m.cpu).unwrap(), StepOutcome::Trapped { .. }));
    step_n(&mut m, 2);

    assert_eq!(m.cpu.gpr.read(5), 2);
    assert_eq!(m.cpu.history.trap_count, 2);
}

#[test]
fn test_key_vectors_past_timer_slot() {
    // Key 1 has cause 3 and lands two slots in: addi x6, x6, 1; mret
    let program = interrupt_program(8, &[0x0013_0313, MRET]);
    let (mut m, _clock) = machine(&program);
    let keys = m.key_sender();

    step_n(&mut m, 5);
    keys.send(1).unwrap();
    keys.send(1).unwrap();

    let outcome = step(&mut m.cpu).unwrap();
    assert_eq!(outcome, StepOutcome::Trapped { cause: Cause::Key(1), from: 16, to: 0x108 });
    assert_eq!(m.cpu.csr.get(MEPC), 16);

    // Two queued events, two handler runs
    step_n(&mut m, 2);
    assert!(matches!(step(&mut m.cpu).unwrap(), StepOutcome::Trapped { .. }));
    step_n(&mut m, 2);
    assert_eq!(m.cpu.gpr.read(6), 2);
}

#[test]
fn test_pixel_program_swaps_frame() {
    let program = [
        0x0000_10b7,          // lui x1, 1
        0x0040_8093,          // addi x1, x1, 4
        0xfff0_0113u32 as i32, // addi x2, x0, -1
        0x0020_a023,          // sw x2, 0(x1)
        0xfe00_ae23u32 as i32, // sw x0, -4(x1)
        ECALL,
    ];
    let (m, _clock) = machine(&program);
    let frame_buffer = m.frame_buffer();
    assert_eq!(m.cpu.bus.map().pixel_base(), 0x1004);

    let summary = run_wrapper::spawn(m, None).unwrap().join().unwrap();
    assert_eq!(summary.exit, ExitReason::Ecall);
    assert_eq!(summary.frames, 1);

    assert_eq!(frame_buffer.read_front_pixels(0, 8).unwrap(), vec![-1, 0]);
    let vertex = &frame_buffer.front_vertices()[..8];
    assert_eq!(vertex, &[-1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
}

#[test]
fn test_negative_load_address_faults() {
    // addi x1, x0, -1; lw x2, 0(x1)
    let (mut m, _clock) = machine(&[0xfff0_0093u32 as i32, 0x0000_a103]);

    let err = m.run(&AtomicBool::new(false), None).unwrap_err();
    assert!(!err.is_termination());
    assert!(matches!(
        err,
        SimulatorError::MemoryError(MemoryError::AccessError {
            kind: MemoryErrorKind::NegativeAddress,
            ..
        })
    ));
}

#[test]
fn test_bus_rejects_out_of_range() {
    let (m, _clock) = machine(&[ECALL]);
    let end = m.cpu.bus.map().end;

    assert!(m.cpu.bus.read_word(u32::MAX).is_err());
    assert!(m.cpu.bus.read_word(end + 1).is_err());
}

#[test]
fn test_stop_from_another_thread() {
    let (m, _clock) = machine(&[SPIN]);
    let handle = run_wrapper::spawn(m, None).unwrap();

    handle.stop();
    assert_eq!(handle.join().unwrap().exit, ExitReason::Stopped);
}
