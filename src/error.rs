use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the emulator
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Failed to load program: {0}")]
    LoaderError(#[from] LoaderError),

    #[error("CPU execution error: {0}")]
    ExecutionError(#[from] ExecutionError),

    #[error("Memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("Program terminated: {0}")]
    Terminated(Termination),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Trace error: {0}")]
    TraceError(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("CPU thread panicked")]
    ThreadPanicked,
}

impl SimulatorError {
    /// True when the program ended itself through `ecall` or `ebreak`
    pub fn is_termination(&self) -> bool {
        matches!(self, SimulatorError::Terminated(_))
    }
}

/// Deliberate program end requested by the guest
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    #[error("ecall")]
    Ecall,

    #[error("ebreak (timer interrupts: {timer_interrupts}, key interrupts: {key_interrupts})")]
    Ebreak { timer_interrupts: i32, key_interrupts: i32 },
}

/// Errors related to program files
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read program file '{0}': {1}")]
    FileReadError(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse '{0}' at line {1}: {2}")]
    ParseError(PathBuf, usize, String),

    #[error("Unsupported program file '{0}': expected a .bin or .txt extension")]
    UnsupportedExtension(PathBuf),
}

/// Errors related to CPU execution
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Unknown instruction {raw:032b} at PC={pc:#010x}")]
    UnknownInstruction { raw: u32, pc: u32 },

    #[error("CSR index out of range: {0}")]
    CsrOutOfRange(i32),

    #[error("Execution limit reached: {0} cycles")]
    ExecutionLimitReached(u64),
}

/// Errors related to memory and bus operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Memory access error at address {address:#010x}: {kind}")]
    AccessError { address: i64, kind: MemoryErrorKind },

    #[error("Invalid memory alignment: address {0:#010x} is not aligned to {1} bytes")]
    AlignmentError(u32, u32),
}

impl MemoryError {
    pub(crate) fn access(address: impl Into<i64>, kind: MemoryErrorKind) -> Self {
        MemoryError::AccessError { address: address.into(), kind }
    }
}

/// Specific kinds of memory errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryErrorKind {
    #[error("Attempted to access memory outside addressable range")]
    OutOfBounds,

    #[error("Write runs past the end of the store")]
    Overflow,

    #[error("End position must be greater than begin position")]
    EmptyRange,

    #[error("Effective address is negative")]
    NegativeAddress,

    #[error("Address is not mapped to any device")]
    Unmapped,

    #[error("Range straddles memory and frame buffer")]
    StraddlesRegions,

    #[error("Invalid access size: {0}")]
    InvalidSize(usize),
}

/// Type alias for Result with SimulatorError
pub type SimulatorResult<T> = Result<T, SimulatorError>;
