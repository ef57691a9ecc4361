//! Dense, version-aware opcode metadata tables: does this opcode store a
//! result, take a branch, carry inline text, and how many operands does it
//! expect. Indexed by `(opcode, form, operand_count)` rather than a
//! string-keyed map, per the redesign direction.

use crate::instruction::{InstructionForm, OperandCount};

pub fn stores_result(
    opcode: u8,
    ext_opcode: Option<u8>,
    form: InstructionForm,
    operand_count: OperandCount,
    version: u8,
) -> bool {
    match form {
        InstructionForm::Extended => matches!(ext_opcode, Some(0x00..=0x04) | Some(0x09..=0x0C)),
        InstructionForm::Variable => {
            if operand_count == OperandCount::OP2 {
                stores_result_2op(opcode)
            } else {
                match opcode {
                    0x00 | 0x0C => true,         // call_vs, call_vs2
                    0x04 => version >= 5,        // aread stores in V5+, sread does not
                    0x07 | 0x16 | 0x17 => true,  // random, read_char, scan_table
                    0x18 => version >= 5,        // not is VAR-form only from V5 on
                    _ => false,
                }
            }
        }
        InstructionForm::Short => match operand_count {
            OperandCount::OP0 => opcode == 0x09, // catch, V5+
            OperandCount::OP1 => matches!(opcode, 0x01..=0x04 | 0x08 | 0x0E | 0x0F),
            _ => false,
        },
        InstructionForm::Long => stores_result_2op(opcode),
    }
}

fn stores_result_2op(opcode: u8) -> bool {
    matches!(opcode, 0x08 | 0x09 | 0x0F..=0x13 | 0x14..=0x18 | 0x19)
}

pub fn has_branch(
    opcode: u8,
    form: InstructionForm,
    operand_count: OperandCount,
) -> bool {
    match form {
        InstructionForm::Extended => false,
        InstructionForm::Variable => {
            if opcode >= 0x20 {
                has_branch_2op(opcode - 0x20)
            } else if operand_count == OperandCount::OP2 {
                has_branch_2op(opcode)
            } else {
                false
            }
        }
        InstructionForm::Short => match operand_count {
            OperandCount::OP0 => matches!(opcode, 0x05 | 0x06 | 0x0D | 0x0F),
            OperandCount::OP1 => matches!(opcode, 0x00..=0x02),
            _ => false,
        },
        InstructionForm::Long => has_branch_2op(opcode),
    }
}

fn has_branch_2op(opcode: u8) -> bool {
    matches!(opcode, 0x01..=0x07 | 0x0A)
}

pub fn has_text(form: InstructionForm, operand_count: OperandCount, opcode: u8) -> bool {
    matches!(form, InstructionForm::Short)
        && operand_count == OperandCount::OP0
        && matches!(opcode, 0x02 | 0x03)
}

/// Some VAR opcodes take a fixed operand count regardless of how many operand
/// type slots the type byte encodes; `None` means "use everything the type
/// byte says is present" (e.g. `call`, `sread`).
pub fn fixed_operand_count(
    opcode: u8,
    form: InstructionForm,
    operand_count: OperandCount,
    version: u8,
) -> Option<usize> {
    if form != InstructionForm::Variable {
        return None;
    }
    if operand_count == OperandCount::OP2 {
        return Some(2);
    }
    match opcode {
        0x01 | 0x02 | 0x03 => Some(3), // storew, storeb, put_prop
        0x05 | 0x06 | 0x07 | 0x08 => Some(1),
        0x09 => {
            if version <= 5 {
                Some(1)
            } else {
                None
            }
        }
        0x0A | 0x0B => Some(1),
        _ => None,
    }
}
