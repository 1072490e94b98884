//! ALU implementation

/// Performs an ALU operation on two's-complement operands.
/// Shift amounts use the low five bits of `op2`.
pub fn alu(op: ALUOp, op1: i32, op2: i32) -> i32 {
    let shamt = (op2 as u32) & 0x1f;
    match op {
        ALUOp::ADD => op1.wrapping_add(op2),
        ALUOp::SUB => op1.wrapping_sub(op2),
        ALUOp::AND => op1 & op2,
        ALUOp::OR => op1 | op2,
        ALUOp::XOR => op1 ^ op2,
        ALUOp::SLL => op1.wrapping_shl(shamt),
        ALUOp::SRL => ((op1 as u32) >> shamt) as i32,
        ALUOp::SRA => op1 >> shamt,
        ALUOp::SLT => (op1 < op2) as i32,
        ALUOp::SLTU => ((op1 as u32) < (op2 as u32)) as i32,
    }
}

/// Evaluates a branch condition
pub fn branch_taken(op: BranchOp, op1: i32, op2: i32) -> bool {
    match op {
        BranchOp::BEQ => op1 == op2,
        BranchOp::BNE => op1 != op2,
        BranchOp::BLT => op1 < op2,
        BranchOp::BGE => op1 >= op2,
        BranchOp::BLTU => (op1 as u32) < (op2 as u32),
        BranchOp::BGEU => (op1 as u32) >= (op2 as u32),
    }
}

/// Set of ALU operations needed for rv32i
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ALUOp {
    // Arithmetic
    #[default]
    ADD,
    SUB,
    // Logical
    AND,
    OR,
    XOR,
    // Set
    SLT,
    SLTU,
    // Shift
    SLL,
    SRL,
    SRA,
}

/// Branch comparisons
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchOp {
    BEQ,
    BNE,
    BLT,
    BGE,
    BLTU,
    BGEU,
}
