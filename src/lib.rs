pub mod alu;
pub mod bus;
pub mod config;
pub mod cpu;
pub mod execute;
pub mod frame_buffer;
pub mod instruction;
pub mod interrupt;
pub mod loader;
pub mod memory;
pub mod run_wrapper;
pub mod trace_log;

pub mod single_cycle;

pub mod error;
