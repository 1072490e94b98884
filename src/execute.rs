//! Instruction execution
//!
//! Handlers run after the fetch loop has already advanced the PC by 4;
//! `pc` is always the address of the instruction being executed.

use tracing::debug;
use tracing::info;
use tracing::trace;

use crate::alu::alu;
use crate::alu::branch_taken;
use crate::cpu::Cpu;
use crate::cpu::MEPC;
use crate::cpu::MIP;
use crate::error::ExecutionError;
use crate::error::MemoryError;
use crate::error::MemoryErrorKind;
use crate::error::SimulatorError;
use crate::error::SimulatorResult;
use crate::error::Termination;
use crate::instruction::decode_helper::sign_extend;
use crate::instruction::CsrOp;
use crate::instruction::Instruction;
use crate::instruction::LoadOp;

/// Word read by `ebreak` holding the guest's timer interrupt count
pub const TIMER_COUNT_ADDRESS: u32 = 1024;
/// Word read by `ebreak` holding the guest's key interrupt count
pub const KEY_COUNT_ADDRESS: u32 = 1028;

/// Executes one decoded instruction
pub fn execute(cpu: &mut Cpu, inst: Instruction, pc: u32) -> SimulatorResult<()> {
    use Instruction::*;
    let next_pc = pc.wrapping_add(4);

    match inst {
        Op { op, rd, rs1, rs2 } => {
            let result = alu(op, cpu.gpr.read(rs1), cpu.gpr.read(rs2));
            cpu.gpr.write(rd, result);
        }
        OpImm { op, rd, rs1, imm } => {
            let result = alu(op, cpu.gpr.read(rs1), imm);
            cpu.gpr.write(rd, result);
        }
        Lui { rd, imm } => cpu.gpr.write(rd, imm << 12),
        AuiPc { rd, imm } => cpu.gpr.write(rd, (imm << 12).wrapping_add(pc as i32)),
        Jal { rd, imm } => {
            cpu.gpr.write(rd, next_pc as i32);
            cpu.pc.write(pc.wrapping_add(imm as u32));
        }
        Jalr { rd, rs1, imm } => {
            // Target first: rd may alias rs1
            let target = (cpu.gpr.read(rs1).wrapping_add(imm) as u32) & !1u32;
            cpu.gpr.write(rd, next_pc as i32);
            cpu.pc.write(target);
        }
        Branch { op, rs1, rs2, imm } => {
            if branch_taken(op, cpu.gpr.read(rs1), cpu.gpr.read(rs2)) {
                cpu.pc.write(pc.wrapping_add(imm as u32));
            }
        }
        Load { op, rd, rs1, imm } => {
            let address = effective_address(cpu.gpr.read(rs1), imm)?;
            let value = load(cpu, op, address)?;
            trace!("load {address:#010x} -> {value:#010x}");
            cpu.gpr.write(rd, value);
        }
        Store { op, rs1, rs2, imm } => {
            let address = effective_address(cpu.gpr.read(rs1), imm)?;
            let value = cpu.gpr.read(rs2);
            let width = op.width() as usize;
            let bytes = value.to_be_bytes();
            trace!("store {address:#010x} <- {value:#010x} ({width} bytes)");
            cpu.bus.write(address, &bytes[4 - width..])?;
        }
        Csr { op, rd, csr, src } => execute_csr(cpu, op, rd, csr, src)?,
        Ecall => return Err(SimulatorError::Terminated(Termination::Ecall)),
        Ebreak => {
            let timer_interrupts = cpu.bus.read_word(TIMER_COUNT_ADDRESS)?;
            let key_interrupts = cpu.bus.read_word(KEY_COUNT_ADDRESS)?;
            info!(timer_interrupts, key_interrupts, "ebreak");
            return Err(SimulatorError::Terminated(Termination::Ebreak {
                timer_interrupts,
                key_interrupts,
            }));
        }
        Mret => {
            let target = cpu.csr.get(MEPC) as u32;
            cpu.pc.write(target);
            cpu.csr.set(MIP, 0);
            cpu.interrupts.rearm_timer();
            debug!("mret to {target:#010x}");
        }
        Unknown(raw) => {
            // Leave the PC on the faulting instruction
            cpu.pc.write(pc);
            return Err(ExecutionError::UnknownInstruction { raw, pc }.into());
        }
    }
    Ok(())
}

/// `base + imm`, which must not be negative
fn effective_address(base: i32, imm: i32) -> Result<u32, MemoryError> {
    let address = base.wrapping_add(imm);
    if address < 0 {
        return Err(MemoryError::access(address, MemoryErrorKind::NegativeAddress));
    }
    Ok(address as u32)
}

/// Reads `op.width()` big-endian bytes and extends them to 32 bits
fn load(cpu: &Cpu, op: LoadOp, address: u32) -> SimulatorResult<i32> {
    let end = address
        .checked_add(op.width())
        .ok_or_else(|| MemoryError::access(address, MemoryErrorKind::Unmapped))?;
    let raw = cpu
        .bus
        .read(address, end)?
        .iter()
        .fold(0u32, |acc, b| (acc << 8) | *b as u32);
    Ok(match op {
        LoadOp::LB => sign_extend(raw, 8),
        LoadOp::LH => sign_extend(raw, 16),
        LoadOp::LW => raw as i32,
        LoadOp::LBU => (raw & 0xff) as i32,
        LoadOp::LHU => (raw & 0xffff) as i32,
    })
}

/// Atomic read-modify-write of a CSR; `rd` gets the old value
fn execute_csr(
    cpu: &mut Cpu,
    op: CsrOp,
    rd: usize,
    csr: u32,
    src: usize,
) -> SimulatorResult<()> {
    let index = sign_extend(csr, 12);
    let old = cpu.csr.read(index)?;
    let operand = match op.is_immediate() {
        true => src as i32,
        false => cpu.gpr.read(src),
    };
    let new = match op {
        CsrOp::CSRRW | CsrOp::CSRRWI => operand,
        CsrOp::CSRRS | CsrOp::CSRRSI => old | operand,
        CsrOp::CSRRC | CsrOp::CSRRCI => old & !operand,
    };
    cpu.csr.write(index, new)?;
    cpu.gpr.write(rd, old);
    trace!("csr {index:#05x}: {old:#x} -> {new:#x}");
    Ok(())
}
