//! A simulator wrapper
//!
//! Assembles memory, frame buffer, bus and CPU from a [`MachineConfig`]
//! and runs the CPU loop, either inline or on its own thread.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use tracing::info;

use crate::bus::Bus;
use crate::config::MachineConfig;
use crate::cpu::Cpu;
use crate::error::SimulatorError;
use crate::error::SimulatorResult;
use crate::frame_buffer::FrameBuffer;
use crate::interrupt::Clock;
use crate::interrupt::InterruptController;
use crate::interrupt::KeySender;
use crate::interrupt::SystemClock;
use crate::loader;
use crate::memory::Memory;
use crate::single_cycle;
use crate::single_cycle::ExitReason;
use crate::trace_log::TraceLog;

/// Counters reported after a run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub instructions: u64,
    pub traps: u64,
    /// Completed buffer swaps
    pub frames: u64,
    pub exit: ExitReason,
}

/// A ready-to-run emulator instance
pub struct Machine {
    pub cpu: Cpu,
    config: MachineConfig,
    keys: KeySender,
}

impl Machine {
    /// Builds a machine driven by the wall clock
    pub fn new(config: MachineConfig) -> SimulatorResult<Self> {
        Self::with_clock(config, Box::new(SystemClock::default()))
    }

    pub fn with_clock(config: MachineConfig, clock: Box<dyn Clock>) -> SimulatorResult<Self> {
        config.validate()?;

        let memory = Memory::make(config.memory_size);
        let frame_buffer = Arc::new(FrameBuffer::make(config.width, config.height));
        let bus = Bus::make(memory, frame_buffer)?;
        let (interrupts, keys) = InterruptController::make(clock, config.timer_quantum);

        Ok(Self { cpu: Cpu::make(bus, interrupts), config, keys })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Places a program at address 0
    pub fn load(&mut self, words: &[i32]) -> SimulatorResult<()> {
        loader::write_program(&mut self.cpu.bus, words)
    }

    pub fn key_sender(&self) -> KeySender {
        self.keys.clone()
    }

    pub fn frame_buffer(&self) -> Arc<FrameBuffer> {
        Arc::clone(self.cpu.bus.frame_buffer())
    }

    /// Runs on the calling thread
    pub fn run(
        &mut self,
        stop: &AtomicBool,
        trace: Option<&mut TraceLog>,
    ) -> SimulatorResult<RunSummary> {
        let map = self.cpu.bus.map();
        info!(
            memory = map.memory_end,
            frame_buffer = map.frame_buffer_base(),
            end = map.end,
            "starting run"
        );

        let exit = single_cycle::run(&mut self.cpu, stop, self.config.max_cycles, trace)?;
        let summary = self.summary(exit);

        info!(
            cycles = summary.cycles,
            instructions = summary.instructions,
            traps = summary.traps,
            frames = summary.frames,
            "run finished: {:?}",
            summary.exit
        );
        Ok(summary)
    }

    fn summary(&self, exit: ExitReason) -> RunSummary {
        let history = self.cpu.history;
        RunSummary {
            cycles: history.cycle_count,
            instructions: history.inst_count,
            traps: history.trap_count,
            frames: self.cpu.bus.frame_buffer().swap_count(),
            exit,
        }
    }
}

/// Handle to a machine running on its own thread
pub struct RunHandle {
    stop: Arc<AtomicBool>,
    keys: KeySender,
    frame_buffer: Arc<FrameBuffer>,
    thread: JoinHandle<SimulatorResult<RunSummary>>,
}

impl RunHandle {
    /// Asks the CPU loop to exit at the next cycle
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn key_sender(&self) -> KeySender {
        self.keys.clone()
    }

    pub fn frame_buffer(&self) -> Arc<FrameBuffer> {
        Arc::clone(&self.frame_buffer)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> SimulatorResult<RunSummary> {
        self.thread
            .join()
            .map_err(|_| SimulatorError::ThreadPanicked)?
    }
}

/// Moves the machine onto a dedicated CPU thread
pub fn spawn(mut machine: Machine, mut trace: Option<TraceLog>) -> SimulatorResult<RunHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let keys = machine.key_sender();
    let frame_buffer = machine.frame_buffer();

    let flag = Arc::clone(&stop);
    let thread = thread::Builder::new().name("cpu".into()).spawn(move || {
        let result = machine.run(&flag, trace.as_mut());
        // Auxiliary threads watch the same flag
        flag.store(true, Ordering::Relaxed);
        if let Some(log) = trace.as_mut() {
            log.flush()?;
        }
        result
    })?;

    Ok(RunHandle { stop, keys, frame_buffer, thread })
}
