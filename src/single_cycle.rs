//! Single cycle implementation
//!
//! One instruction per cycle. Before fetching, an open interrupt window
//! lets the controller redirect the PC into the trap vector instead.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::cpu::Cpu;
use crate::cpu::MCAUSE;
use crate::cpu::MEPC;
use crate::cpu::MIP;
use crate::cpu::MTVEC;
use crate::error::SimulatorError;
use crate::error::SimulatorResult;
use crate::error::Termination;
use crate::execute::execute;
use crate::instruction::decode;
use crate::instruction::Instruction;
use crate::interrupt::Cause;
use crate::trace_log::TraceLog;

/// What a single cycle did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// An instruction ran to completion
    Retired { pc: u32, raw: u32, inst: Instruction },
    /// An interrupt was taken instead of fetching
    Trapped { cause: Cause, from: u32, to: u32 },
}

/// Why a run ended without a fault
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    Ecall,
    Ebreak { timer_interrupts: i32, key_interrupts: i32 },
    /// The stop flag was raised
    Stopped,
    /// The configured cycle budget ran out
    CycleLimit,
}

impl From<Termination> for ExitReason {
    fn from(termination: Termination) -> Self {
        match termination {
            Termination::Ecall => ExitReason::Ecall,
            Termination::Ebreak { timer_interrupts, key_interrupts } => {
                ExitReason::Ebreak { timer_interrupts, key_interrupts }
            }
        }
    }
}

/// Runs one cycle
pub fn step(cpu: &mut Cpu) -> SimulatorResult<StepOutcome> {
    // Increment CPU cycle count
    cpu.history.cycle_count += 1;

    if cpu.interrupts_open() {
        if let Some(cause) = cpu.interrupts.poll() {
            return Ok(enter_trap(cpu, cause));
        }
    }

    // IF
    let pc = cpu.pc.read();
    let raw = cpu.bus.read_word(pc)? as u32;
    // ID
    let inst = decode(raw);
    trace!("{pc:#010x}: {inst}");

    // Read and increment PC; handlers may override
    cpu.pc.write(pc.wrapping_add(4));
    // EX
    execute(cpu, inst, pc)?;

    cpu.history.inst_count += 1;
    Ok(StepOutcome::Retired { pc, raw, inst })
}

/// Saves the PC and jumps to the vector entry for `cause`
fn enter_trap(cpu: &mut Cpu, cause: Cause) -> StepOutcome {
    let from = cpu.pc.read();
    let code = cause.code();

    cpu.csr.set(MEPC, from as i32);
    cpu.csr.set(MIP, 1);
    cpu.csr.set(MCAUSE, code);

    let slot = (code as u32).wrapping_sub(1);
    let to = (cpu.csr.get(MTVEC) as u32).wrapping_add(slot.wrapping_mul(4));
    cpu.pc.write(to);
    cpu.history.trap_count += 1;

    debug!("trap {cause:?} (mcause {code}) from {from:#010x} to {to:#010x}");
    StepOutcome::Trapped { cause, from, to }
}

/// Runs until the program ends, the stop flag is raised or a fault occurs
pub fn run(
    cpu: &mut Cpu,
    stop: &AtomicBool,
    max_cycles: Option<u64>,
    mut trace: Option<&mut TraceLog>,
) -> SimulatorResult<ExitReason> {
    cpu.interrupts.reset_epoch();

    loop {
        if stop.load(Ordering::Relaxed) {
            warn!(cycles = cpu.history.cycle_count, "stop requested");
            return Ok(ExitReason::Stopped);
        }
        if let Some(limit) = max_cycles {
            if cpu.history.cycle_count >= limit {
                warn!(limit, "cycle limit reached");
                return Ok(ExitReason::CycleLimit);
            }
        }

        match step(cpu) {
            Ok(outcome) => {
                if let Some(log) = trace.as_deref_mut() {
                    log.record(cpu.history.cycle_count, &outcome)?;
                }
            }
            Err(SimulatorError::Terminated(termination)) => {
                return Ok(termination.into());
            }
            Err(e) => return Err(e),
        }
    }
}
