use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use emu_lib::config::MachineConfig;
use emu_lib::config::DEFAULT_HEIGHT;
use emu_lib::config::DEFAULT_MEMORY_SIZE;
use emu_lib::config::DEFAULT_WIDTH;

/// RV32I emulator with a memory-mapped, double-buffered display.
#[derive(Parser, Debug)]
#[command(name = "emu", version)]
pub struct EmuArgs {
    /// Program to run: `.bin` (big-endian words) or `.txt` (sign-prefixed binary lines).
    pub program: PathBuf,

    /// Bytes of main memory.
    #[arg(short, long, default_value_t = DEFAULT_MEMORY_SIZE)]
    pub memory: usize,

    /// Display width in pixels.
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub width: usize,

    /// Display height in pixels.
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    pub height: usize,

    /// Timer interrupt period in milliseconds.
    #[arg(short, long, default_value_t = 1000)]
    pub timer_ms: u64,

    /// Stop with an error after this many cycles.
    #[arg(long)]
    pub max_cycles: Option<u64>,

    /// Write a CSV trace of every cycle to this file.
    #[arg(long)]
    pub trace: Option<PathBuf>,

    /// Enables verbose mode, logging every executed instruction.
    #[arg(short, long)]
    pub verbose: bool,
}

impl EmuArgs {
    pub fn machine_config(&self) -> MachineConfig {
        MachineConfig {
            memory_size: self.memory,
            width: self.width,
            height: self.height,
            timer_quantum: Duration::from_millis(self.timer_ms),
            max_cycles: self.max_cycles,
            verbose: self.verbose,
        }
    }
}
