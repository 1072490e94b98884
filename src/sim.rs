use std::error::Error;
use std::io;
use std::io::BufRead;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use emu_lib::error::ExecutionError;
use emu_lib::error::SimulatorError;
use emu_lib::interrupt::KeySender;
use emu_lib::loader;
use emu_lib::run_wrapper;
use emu_lib::run_wrapper::Machine;
use emu_lib::single_cycle::ExitReason;
use emu_lib::trace_log::TraceLog;

mod flags;

use flags::EmuArgs;

fn main() -> Result<(), Box<dyn Error>> {
    let args = EmuArgs::parse();
    let config = args.machine_config();

    let default_level = if config.verbose { "trace" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let words = loader::load_program(&args.program)?;
    let mut machine = Machine::new(config)?;
    machine.load(&words)?;

    let trace = match &args.trace {
        Some(path) => Some(TraceLog::create(path)?),
        None => None,
    };

    let handle = run_wrapper::spawn(machine, trace)?;
    forward_keys(handle.key_sender(), handle.stop_flag());

    let summary = handle.join()?;
    println!(
        "cycles={} instructions={} traps={} frames={}",
        summary.cycles, summary.instructions, summary.traps, summary.frames
    );

    match summary.exit {
        ExitReason::Ecall => info!("program exited through ecall"),
        ExitReason::Ebreak { timer_interrupts, key_interrupts } => {
            println!("timer interrupts={timer_interrupts} key interrupts={key_interrupts}");
        }
        ExitReason::Stopped => warn!("stopped before the program finished"),
        ExitReason::CycleLimit => {
            let limit = config.max_cycles.unwrap_or(summary.cycles);
            return Err(SimulatorError::from(ExecutionError::ExecutionLimitReached(limit)).into());
        }
    }

    Ok(())
}

/// Sends the first byte of every non-empty stdin line as a key event.
/// The stop flag is checked between lines; a read already blocked on
/// stdin only returns with the next line or at process exit.
fn forward_keys(keys: KeySender, stop: Arc<AtomicBool>) {
    let spawned = thread::Builder::new().name("keys".into()).spawn(move || {
        for line in io::stdin().lock().lines() {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let Ok(line) = line else { break };
            if let Some(byte) = line.bytes().next() {
                if keys.send(byte).is_err() {
                    break;
                }
            }
        }
    });
    if let Err(e) = spawned {
        warn!("keyboard input disabled: {e}");
    }
}
