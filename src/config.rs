//! Machine configuration

use std::time::Duration;

use crate::bus::SWAP_CONTROL_BYTES;
use crate::error::SimulatorError;
use crate::error::SimulatorResult;
use crate::execute::KEY_COUNT_ADDRESS;
use crate::frame_buffer::PIXEL_STRIDE;

pub const DEFAULT_MEMORY_SIZE: usize = 4 * 1024 * 1024;
pub const DEFAULT_WIDTH: usize = 320;
pub const DEFAULT_HEIGHT: usize = 240;
pub const DEFAULT_TIMER_QUANTUM: Duration = Duration::from_millis(1000);

/// Smallest memory holding the words read by `ebreak`
pub const MIN_MEMORY_SIZE: usize = KEY_COUNT_ADDRESS as usize + 4;
/// Largest memory whose top address is still a positive register value
pub const MAX_MEMORY_SIZE: usize = i32::MAX as usize;

/// Machine configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MachineConfig {
    /// Bytes of main memory
    pub memory_size: usize,
    /// Display width in pixels
    pub width: usize,
    /// Display height in pixels
    pub height: usize,
    /// Wall-clock period of the timer interrupt
    pub timer_quantum: Duration,
    /// Stop after this many cycles
    pub max_cycles: Option<u64>,
    /// Enables per-instruction logging in the binary
    pub verbose: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            timer_quantum: DEFAULT_TIMER_QUANTUM,
            max_cycles: None,
            verbose: false,
        }
    }
}

impl MachineConfig {
    /// Bytes of pixel plane mapped on the bus
    pub fn frame_buffer_bytes(&self) -> Option<usize> {
        self.width.checked_mul(self.height)?.checked_mul(PIXEL_STRIDE)
    }

    pub fn validate(&self) -> SimulatorResult<()> {
        if !(MIN_MEMORY_SIZE..=MAX_MEMORY_SIZE).contains(&self.memory_size) {
            return Err(SimulatorError::ConfigError(format!(
                "memory size {} outside [{MIN_MEMORY_SIZE}, {MAX_MEMORY_SIZE}]",
                self.memory_size
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(SimulatorError::ConfigError(format!(
                "display {}x{} has no pixels",
                self.width, self.height
            )));
        }
        if self.timer_quantum.is_zero() {
            return Err(SimulatorError::ConfigError("timer quantum must be non-zero".into()));
        }

        let end = self
            .frame_buffer_bytes()
            .and_then(|fb| fb.checked_add(self.memory_size))
            .and_then(|total| total.checked_add(SWAP_CONTROL_BYTES as usize));
        match end {
            Some(end) if end <= u32::MAX as usize => Ok(()),
            _ => Err(SimulatorError::ConfigError(
                "address space does not fit in 32 bits".into(),
            )),
        }
    }
}
