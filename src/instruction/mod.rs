//! Instruction representation

use std::fmt;

use crate::alu::ALUOp;
use crate::alu::BranchOp;

pub mod decode_helper;

pub use decode_helper::decode;

/// NOP: ADDI x0, x0, 0
pub const NOP: u32 = 0x13;

/// Decoded rv32i instruction.
///
/// Register fields are indices in `0..32`. Immediates are already
/// sign-extended except where noted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Register-register ALU operation
    Op { op: ALUOp, rd: usize, rs1: usize, rs2: usize },
    /// Register-immediate ALU operation; shifts carry an unsigned 5-bit amount
    OpImm { op: ALUOp, rd: usize, rs1: usize, imm: i32 },
    /// `imm` is the 20-bit upper immediate, not yet shifted
    Lui { rd: usize, imm: i32 },
    /// `imm` is the 20-bit upper immediate, not yet shifted
    AuiPc { rd: usize, imm: i32 },
    Jal { rd: usize, imm: i32 },
    Jalr { rd: usize, rs1: usize, imm: i32 },
    Branch { op: BranchOp, rs1: usize, rs2: usize, imm: i32 },
    Load { op: LoadOp, rd: usize, rs1: usize, imm: i32 },
    Store { op: StoreOp, rs1: usize, rs2: usize, imm: i32 },
    Ecall,
    Ebreak,
    Mret,
    /// `csr` is the raw 12-bit field; `src` is a register index or,
    /// for the immediate forms, a 5-bit literal
    Csr { op: CsrOp, rd: usize, csr: u32, src: usize },
    /// Opcode or function fields match nothing we execute
    Unknown(u32),
}

/// Load variants
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOp {
    LB,
    LH,
    LW,
    LBU,
    LHU,
}

impl LoadOp {
    /// Bytes read
    pub fn width(&self) -> u32 {
        match self {
            LoadOp::LB | LoadOp::LBU => 1,
            LoadOp::LH | LoadOp::LHU => 2,
            LoadOp::LW => 4,
        }
    }
}

/// Store variants
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    SB,
    SH,
    SW,
}

impl StoreOp {
    /// Bytes written
    pub fn width(&self) -> u32 {
        match self {
            StoreOp::SB => 1,
            StoreOp::SH => 2,
            StoreOp::SW => 4,
        }
    }
}

/// CSR read-modify-write variants
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsrOp {
    CSRRW,
    CSRRS,
    CSRRC,
    CSRRWI,
    CSRRSI,
    CSRRCI,
}

impl CsrOp {
    /// True for the forms whose source is a literal instead of a register
    pub fn is_immediate(&self) -> bool {
        matches!(self, CsrOp::CSRRWI | CsrOp::CSRRSI | CsrOp::CSRRCI)
    }
}

impl Instruction {
    /// Assembly mnemonic, e.g. `addi` or `csrrs`
    pub fn mnemonic(&self) -> &'static str {
        use Instruction::*;
        match self {
            Op { op, .. } => match op {
                ALUOp::ADD => "add",
                ALUOp::SUB => "sub",
                ALUOp::AND => "and",
                ALUOp::OR => "or",
                ALUOp::XOR => "xor",
                ALUOp::SLT => "slt",
                ALUOp::SLTU => "sltu",
                ALUOp::SLL => "sll",
                ALUOp::SRL => "srl",
                ALUOp::SRA => "sra",
            },
            OpImm { op, .. } => match op {
                ALUOp::ADD | ALUOp::SUB => "addi",
                ALUOp::AND => "andi",
                ALUOp::OR => "ori",
                ALUOp::XOR => "xori",
                ALUOp::SLT => "slti",
                ALUOp::SLTU => "sltiu",
                ALUOp::SLL => "slli",
                ALUOp::SRL => "srli",
                ALUOp::SRA => "srai",
            },
            Lui { .. } => "lui",
            AuiPc { .. } => "auipc",
            Jal { .. } => "jal",
            Jalr { .. } => "jalr",
            Branch { op, .. } => match op {
                BranchOp::BEQ => "beq",
                BranchOp::BNE => "bne",
                BranchOp::BLT => "blt",
                BranchOp::BGE => "bge",
                BranchOp::BLTU => "bltu",
                BranchOp::BGEU => "bgeu",
            },
            Load { op, .. } => match op {
                LoadOp::LB => "lb",
                LoadOp::LH => "lh",
                LoadOp::LW => "lw",
                LoadOp::LBU => "lbu",
                LoadOp::LHU => "lhu",
            },
            Store { op, .. } => match op {
                StoreOp::SB => "sb",
                StoreOp::SH => "sh",
                StoreOp::SW => "sw",
            },
            Ecall => "ecall",
            Ebreak => "ebreak",
            Mret => "mret",
            Csr { op, .. } => match op {
                CsrOp::CSRRW => "csrrw",
                CsrOp::CSRRS => "csrrs",
                CsrOp::CSRRC => "csrrc",
                CsrOp::CSRRWI => "csrrwi",
                CsrOp::CSRRSI => "csrrsi",
                CsrOp::CSRRCI => "csrrci",
            },
            Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        let name = self.mnemonic();
        match *self {
            Op { rd, rs1, rs2, .. } => write!(f, "{name} rd={rd}, rs1={rs1}, rs2={rs2}"),
            OpImm { op: ALUOp::SLL | ALUOp::SRL | ALUOp::SRA, rd, rs1, imm } => {
                write!(f, "{name} rd={rd}, rs1={rs1}, shamt={imm}")
            }
            OpImm { rd, rs1, imm, .. }
            | Jalr { rd, rs1, imm }
            | Load { rd, rs1, imm, .. } => write!(f, "{name} rd={rd}, rs1={rs1}, imm={imm}"),
            Lui { rd, imm } | AuiPc { rd, imm } | Jal { rd, imm } => {
                write!(f, "{name} rd={rd}, imm={imm}")
            }
            Branch { rs1, rs2, imm, .. } | Store { rs1, rs2, imm, .. } => {
                write!(f, "{name} rs1={rs1}, rs2={rs2}, imm={imm}")
            }
            Ecall | Ebreak | Mret => f.write_str(name),
            Csr { rd, csr, src, .. } => write!(f, "{name} rd={rd}, csr={csr}, rs1={src}"),
            Unknown(raw) => write!(f, "{name} {raw:#010x}"),
        }
    }
}
