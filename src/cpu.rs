//! rv32i CPU state

use crate::bus::Bus;
use crate::error::ExecutionError;
use crate::interrupt::InterruptController;

/// Machine interrupt-enable flag (0/1)
pub const MIE: usize = 0x304;
/// Trap vector base
pub const MTVEC: usize = 0x305;
/// PC saved on trap entry
pub const MEPC: usize = 0x341;
/// Trap cause, 0 when none
pub const MCAUSE: usize = 0x342;
/// Interrupt pending flag (0/1)
pub const MIP: usize = 0x344;

/// Number of addressable CSRs
pub const CSR_COUNT: usize = 4096;

/// ABI register numbers set up at reset
pub const SP: usize = 2;
pub const GP: usize = 3;
pub const FP: usize = 8;

/// CPU state
pub struct Cpu {
    /// Program counter
    pub pc: Register,
    /// General purpose registers
    pub gpr: RegisterFile,
    /// Control and status registers
    pub csr: CsrFile,
    /// Memory-mapped bus
    pub bus: Bus,
    /// Timer and keyboard interrupt source
    pub interrupts: InterruptController,
    /// History of execution
    pub history: CPUHistory,
}

impl Cpu {
    /// Builds a CPU at PC 0 with the stack at the top of main memory
    pub fn make(bus: Bus, interrupts: InterruptController) -> Self {
        let memory_size = bus.map().memory_end as i32;
        let mut gpr = RegisterFile::default();
        gpr.write(SP, memory_size.wrapping_sub(4));
        gpr.write(GP, memory_size / 2);
        gpr.write(FP, gpr.read(SP));

        Self {
            pc: Register::new(0),
            gpr,
            csr: CsrFile::default(),
            bus,
            interrupts,
            history: CPUHistory::default(),
        }
    }

    /// True when interrupts are enabled and none is being handled
    pub fn interrupts_open(&self) -> bool {
        self.csr.get(MIE) == 1 && self.csr.get(MIP) == 0
    }
}

/// Register file simulation
#[derive(Clone, Copy, Debug, Default)]
pub struct Register {
    /// Current data in the register
    data: u32,
}

impl Register {
    pub fn new(data: u32) -> Self {
        Self { data }
    }

    /// Reads the register
    pub fn read(&self) -> u32 {
        self.data
    }

    /// Writes to register
    pub fn write(&mut self, value: u32) {
        self.data = value;
    }
}

/// 32 general purpose registers; x0 always reads zero
#[derive(Clone, Debug, Default)]
pub struct RegisterFile {
    regs: [Register; 32],
}

impl RegisterFile {
    pub fn read(&self, index: usize) -> i32 {
        self.regs[index].read() as i32
    }

    pub fn write(&mut self, index: usize, value: i32) {
        // You don't write to x0
        if index != 0 {
            self.regs[index].write(value as u32);
        }
    }

    /// Snapshot of all registers, x0 first
    pub fn values(&self) -> [i32; 32] {
        std::array::from_fn(|i| self.read(i))
    }
}

/// 4096 CSR slots
#[derive(Clone, Debug)]
pub struct CsrFile {
    slots: Vec<i32>,
}

impl Default for CsrFile {
    fn default() -> Self {
        Self { slots: vec![0; CSR_COUNT] }
    }
}

impl CsrFile {
    /// Reads a CSR addressed by a guest-supplied index
    pub fn read(&self, index: i32) -> Result<i32, ExecutionError> {
        Ok(self.slots[Self::check(index)?])
    }

    /// Writes a CSR addressed by a guest-supplied index
    pub fn write(&mut self, index: i32, value: i32) -> Result<(), ExecutionError> {
        self.slots[Self::check(index)?] = value;
        Ok(())
    }

    /// Reads one of the well-known CSRs
    pub fn get(&self, index: usize) -> i32 {
        self.slots[index]
    }

    /// Writes one of the well-known CSRs
    pub fn set(&mut self, index: usize, value: i32) {
        self.slots[index] = value;
    }

    fn check(index: i32) -> Result<usize, ExecutionError> {
        usize::try_from(index)
            .ok()
            .filter(|i| *i < CSR_COUNT)
            .ok_or(ExecutionError::CsrOutOfRange(index))
    }
}

/// History module
#[derive(Clone, Copy, Debug, Default)]
pub struct CPUHistory {
    pub cycle_count: u64,
    pub inst_count: u64,
    pub trap_count: u64,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::frame_buffer::FrameBuffer;
    use crate::interrupt::ManualClock;
    use crate::memory::Memory;

    #[test]
    fn test_x0_is_hardwired() {
        let mut gpr = RegisterFile::default();
        gpr.write(0, 42);
        gpr.write(1, 42);

        assert_eq!(gpr.read(0), 0);
        assert_eq!(gpr.read(1), 42);
    }

    #[test]
    fn test_csr_bounds() {
        let mut csr = CsrFile::default();
        csr.write(4095, 7).unwrap();

        assert_eq!(csr.read(4095).unwrap(), 7);
        assert!(matches!(csr.read(-1), Err(ExecutionError::CsrOutOfRange(-1))));
        assert!(csr.write(4096, 0).is_err());
    }

    #[test]
    fn test_reset_state() {
        let bus = Bus::make(Memory::make(4096), Arc::new(FrameBuffer::make(1, 1))).unwrap();
        let (ic, _keys) =
            InterruptController::make(Box::new(ManualClock::default()), Duration::from_millis(1));
        let cpu = Cpu::make(bus, ic);

        assert_eq!(cpu.pc.read(), 0);
        assert_eq!(cpu.gpr.read(SP), 4092);
        assert_eq!(cpu.gpr.read(GP), 2048);
        assert_eq!(cpu.gpr.read(FP), 4092);
        assert!(!cpu.interrupts_open());
    }
}
