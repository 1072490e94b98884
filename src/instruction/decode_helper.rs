//! Decoding helper functions.
//!
//! Turns a raw word into an [`Instruction`]. Decoding never fails: words
//! that match no supported encoding come back as [`Instruction::Unknown`].

use super::CsrOp;
use super::Instruction;
use super::LoadOp;
use super::StoreOp;
use crate::alu::ALUOp;
use crate::alu::BranchOp;

/// Major opcodes
pub const OP: u32 = 0x33;
pub const JALR: u32 = 0x67;
pub const LOAD: u32 = 0x03;
pub const OP_IMM: u32 = 0x13;
pub const SYSTEM: u32 = 0x73;
pub const STORE: u32 = 0x23;
pub const BRANCH: u32 = 0x63;
pub const LUI: u32 = 0x37;
pub const AUIPC: u32 = 0x17;
pub const JAL: u32 = 0x6f;

/// Decodes a raw instruction word
pub fn decode(raw_inst: u32) -> Instruction {
    match get_opcode(raw_inst) {
        OP => decode_format_r(raw_inst),
        JALR => Instruction::Jalr {
            rd: get_rd(raw_inst),
            rs1: get_rs1(raw_inst),
            imm: get_imm_i(raw_inst),
        },
        LOAD => decode_load(raw_inst),
        OP_IMM => decode_op_imm(raw_inst),
        SYSTEM => decode_system(raw_inst),
        STORE => decode_store(raw_inst),
        BRANCH => decode_branch(raw_inst),
        LUI => Instruction::Lui { rd: get_rd(raw_inst), imm: get_imm_u(raw_inst) },
        AUIPC => Instruction::AuiPc { rd: get_rd(raw_inst), imm: get_imm_u(raw_inst) },
        JAL => Instruction::Jal { rd: get_rd(raw_inst), imm: get_imm_j(raw_inst) },
        _ => Instruction::Unknown(raw_inst),
    }
}

/// Sign-extends the low `bits` bits of `value`
pub fn sign_extend(value: u32, bits: u32) -> i32 {
    let shamt = 32 - bits;
    ((value << shamt) as i32) >> shamt
}

fn decode_format_r(raw_inst: u32) -> Instruction {
    use ALUOp::*;
    let alternate = get_funct7(raw_inst) != 0;
    let op = match (get_funct3(raw_inst), alternate) {
        (0b000, false) => ADD,
        (0b000, true) => SUB,
        (0b001, _) => SLL,
        (0b010, _) => SLT,
        (0b011, _) => SLTU,
        (0b100, _) => XOR,
        (0b101, false) => SRL,
        (0b101, true) => SRA,
        (0b110, _) => OR,
        (0b111, _) => AND,
        _ => return Instruction::Unknown(raw_inst),
    };
    Instruction::Op {
        op,
        rd: get_rd(raw_inst),
        rs1: get_rs1(raw_inst),
        rs2: get_rs2(raw_inst),
    }
}

fn decode_load(raw_inst: u32) -> Instruction {
    let op = match get_funct3(raw_inst) {
        0b000 => LoadOp::LB,
        0b001 => LoadOp::LH,
        0b010 => LoadOp::LW,
        0b100 => LoadOp::LBU,
        0b101 => LoadOp::LHU,
        _ => return Instruction::Unknown(raw_inst),
    };
    Instruction::Load {
        op,
        rd: get_rd(raw_inst),
        rs1: get_rs1(raw_inst),
        imm: get_imm_i(raw_inst),
    }
}

fn decode_op_imm(raw_inst: u32) -> Instruction {
    use ALUOp::*;
    let imm = get_imm_i(raw_inst);
    // Shifts only use the low five bits; bit 10 picks arithmetic
    let shamt = imm & 0x1f;
    let (op, imm) = match get_funct3(raw_inst) {
        0b000 => (ADD, imm),
        0b010 => (SLT, imm),
        0b011 => (SLTU, imm),
        0b100 => (XOR, imm),
        0b110 => (OR, imm),
        0b111 => (AND, imm),
        0b001 => (SLL, shamt),
        0b101 if imm & 0x400 == 0 => (SRL, shamt),
        0b101 => (SRA, shamt),
        _ => return Instruction::Unknown(raw_inst),
    };
    Instruction::OpImm { op, rd: get_rd(raw_inst), rs1: get_rs1(raw_inst), imm }
}

fn decode_system(raw_inst: u32) -> Instruction {
    let csr = get_csr(raw_inst);
    let op = match get_funct3(raw_inst) {
        0b000 => {
            return match sign_extend(csr, 12) {
                0 => Instruction::Ecall,
                1 => Instruction::Ebreak,
                c if c > 1 => Instruction::Mret,
                _ => Instruction::Unknown(raw_inst),
            }
        }
        0b001 => CsrOp::CSRRW,
        0b010 => CsrOp::CSRRS,
        0b011 => CsrOp::CSRRC,
        0b101 => CsrOp::CSRRWI,
        0b110 => CsrOp::CSRRSI,
        0b111 => CsrOp::CSRRCI,
        _ => return Instruction::Unknown(raw_inst),
    };
    Instruction::Csr { op, rd: get_rd(raw_inst), csr, src: get_rs1(raw_inst) }
}

fn decode_store(raw_inst: u32) -> Instruction {
    let op = match get_funct3(raw_inst) {
        0b000 => StoreOp::SB,
        0b001 => StoreOp::SH,
        0b010 => StoreOp::SW,
        _ => return Instruction::Unknown(raw_inst),
    };
    Instruction::Store {
        op,
        rs1: get_rs1(raw_inst),
        rs2: get_rs2(raw_inst),
        imm: get_imm_s(raw_inst),
    }
}

fn decode_branch(raw_inst: u32) -> Instruction {
    use BranchOp::*;
    let op = match get_funct3(raw_inst) {
        0b000 => BEQ,
        0b001 => BNE,
        0b100 => BLT,
        0b101 => BGE,
        0b110 => BLTU,
        0b111 => BGEU,
        _ => return Instruction::Unknown(raw_inst),
    };
    Instruction::Branch {
        op,
        rs1: get_rs1(raw_inst),
        rs2: get_rs2(raw_inst),
        imm: get_imm_b(raw_inst),
    }
}

/// Extracts opcode from a raw instruction
fn get_opcode(raw_inst: u32) -> u32 {
    raw_inst & 0x7f
}

/// Extracts funct3 from a raw instruction
fn get_funct3(raw_inst: u32) -> u32 {
    (raw_inst >> 12) & 0x7
}

/// Extracts the rs1 field from a raw instruction
fn get_rs1(raw_inst: u32) -> usize {
    ((raw_inst >> 15) & 0x1f) as usize
}

/// Extracts the rs2 field from a raw instruction
fn get_rs2(raw_inst: u32) -> usize {
    ((raw_inst >> 20) & 0x1f) as usize
}

/// Extracts the rd field from a raw instruction
fn get_rd(raw_inst: u32) -> usize {
    ((raw_inst >> 7) & 0x1f) as usize
}

/// Extracts the funct7 field from a raw instruction
fn get_funct7(raw_inst: u32) -> u32 {
    (raw_inst >> 25) & 0x7f
}

/// Extracts the 12-bit CSR index
fn get_csr(raw_inst: u32) -> u32 {
    raw_inst >> 20
}

/// I-type: imm[11:0] = inst[31:20]
fn get_imm_i(raw_inst: u32) -> i32 {
    (raw_inst as i32) >> 20
}

/// S-type: imm[11:5] = inst[31:25], imm[4:0] = inst[11:7]
fn get_imm_s(raw_inst: u32) -> i32 {
    sign_extend(((raw_inst & 0xfe000000) >> 20) | ((raw_inst & 0xf80) >> 7), 12)
}

/// B-type: imm[12|10:5] = inst[31:25], imm[4:1|11] = inst[11:7]
fn get_imm_b(raw_inst: u32) -> i32 {
    sign_extend(
        ((raw_inst & 0x80000000) >> 19)
            | ((raw_inst & 0x80) << 4)
            | ((raw_inst & 0x7e000000) >> 20)
            | ((raw_inst & 0xf00) >> 7),
        13,
    )
}

/// U-type: the 20 bits of inst[31:12], unshifted
fn get_imm_u(raw_inst: u32) -> i32 {
    (raw_inst as i32) >> 12
}

/// J-type: imm[20|10:1|11|19:12] = inst[31:12]
fn get_imm_j(raw_inst: u32) -> i32 {
    sign_extend(
        ((raw_inst & 0x80000000) >> 11)
            | (raw_inst & 0xff000)
            | ((raw_inst & 0x100000) >> 9)
            | ((raw_inst & 0x7fe00000) >> 20),
        21,
    )
}
