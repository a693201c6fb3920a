use std::collections::BTreeSet;

use anyhow::{Context, Result};

use crate::classfile::{Code, Instruction, opcode_length, opcodes, padding, read_u16, read_u32};

/// Coarse control flow shape of a method body, compared by the method classifiers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FlowShape {
    pub blocks: u32,
    pub branch_edges: u32,
    pub fall_through_edges: u32,
    pub exception_edges: u32,
    pub exits: u32,
}

impl FlowShape {
    /// Similarity in `[0, 1]` over the shape counters.
    pub fn similarity(&self, other: &FlowShape) -> f64 {
        let pairs = [
            (self.blocks, other.blocks),
            (self.branch_edges, other.branch_edges),
            (self.fall_through_edges, other.fall_through_edges),
            (self.exception_edges, other.exception_edges),
            (self.exits, other.exits),
        ];
        let (mut shared, mut total) = (0u32, 0u32);
        for (a, b) in pairs {
            shared += a.min(b);
            total += a.max(b);
        }
        if total == 0 {
            1.0
        } else {
            shared as f64 / total as f64
        }
    }
}

/// Split the method body into basic blocks and count the edges between them.
pub(crate) fn flow_shape(code: &Code) -> Result<FlowShape> {
    let bytecode = &code.bytecode;
    let instructions = &code.instructions;
    if instructions.is_empty() {
        return Ok(FlowShape::default());
    }

    let mut leaders = BTreeSet::new();
    leaders.insert(0u32);
    for handler in &code.exception_handlers {
        leaders.insert(handler.handler_pc);
    }
    for inst in instructions {
        let next = inst.offset + opcode_length(bytecode, inst.offset as usize)? as u32;
        if let Some(targets) = branch_targets(bytecode, inst.offset as usize)? {
            leaders.extend(targets);
            leaders.insert(next);
        }
        if is_exit_opcode(inst.opcode) {
            leaders.insert(next);
        }
    }
    leaders.retain(|offset| (*offset as usize) < bytecode.len());
    let leaders: Vec<u32> = leaders.into_iter().collect();

    let mut shape = FlowShape {
        blocks: leaders.len() as u32,
        exception_edges: code.exception_handlers.len() as u32,
        ..FlowShape::default()
    };
    for (index, start) in leaders.iter().enumerate() {
        let end = leaders.get(index + 1).copied().unwrap_or(bytecode.len() as u32);
        let Some(last) = last_instruction(instructions, *start, end) else {
            continue;
        };
        let has_next = index + 1 < leaders.len();
        if let Some(targets) = branch_targets(bytecode, last.offset as usize)? {
            shape.branch_edges += targets.len() as u32;
            if !is_unconditional_branch(last.opcode) && has_next {
                shape.fall_through_edges += 1;
            }
        } else if is_exit_opcode(last.opcode) {
            shape.exits += 1;
        } else if has_next {
            shape.fall_through_edges += 1;
        }
    }
    Ok(shape)
}

fn last_instruction(instructions: &[Instruction], start: u32, end: u32) -> Option<&Instruction> {
    instructions
        .iter()
        .rev()
        .find(|inst| inst.offset >= start && inst.offset < end)
}

fn is_exit_opcode(opcode: u8) -> bool {
    matches!(
        opcode,
        opcodes::IRETURN
            | opcodes::LRETURN
            | opcodes::FRETURN
            | opcodes::DRETURN
            | opcodes::ARETURN
            | opcodes::RETURN
            | opcodes::ATHROW
    )
}

fn is_unconditional_branch(opcode: u8) -> bool {
    matches!(
        opcode,
        opcodes::GOTO
            | opcodes::JSR
            | opcodes::GOTO_W
            | opcodes::JSR_W
            | opcodes::TABLESWITCH
            | opcodes::LOOKUPSWITCH
    )
}

fn branch_targets(code: &[u8], offset: usize) -> Result<Option<Vec<u32>>> {
    let opcode = code[offset];
    let targets = match opcode {
        opcodes::IFEQ..=opcodes::JSR | opcodes::IFNULL | opcodes::IFNONNULL => {
            let branch = read_u16(code, offset + 1)? as i16;
            vec![relative(offset, branch as i32)]
        }
        opcodes::GOTO_W | opcodes::JSR_W => {
            let branch = read_u32(code, offset + 1)? as i32;
            vec![relative(offset, branch)]
        }
        opcodes::TABLESWITCH => tableswitch_targets(code, offset)?,
        opcodes::LOOKUPSWITCH => lookupswitch_targets(code, offset)?,
        _ => return Ok(None),
    };
    Ok(Some(targets))
}

fn relative(offset: usize, branch: i32) -> u32 {
    (offset as i64 + branch as i64).max(0) as u32
}

fn tableswitch_targets(code: &[u8], offset: usize) -> Result<Vec<u32>> {
    let base = offset + 1 + padding(offset);
    let default = read_u32(code, base)? as i32;
    let low = read_u32(code, base + 4)? as i32;
    let high = read_u32(code, base + 8)? as i32;
    let count = high
        .checked_sub(low)
        .and_then(|v| v.checked_add(1))
        .context("invalid tableswitch range")?;
    let mut targets = vec![relative(offset, default)];
    let mut idx = base + 12;
    for _ in 0..count {
        targets.push(relative(offset, read_u32(code, idx)? as i32));
        idx += 4;
    }
    Ok(targets)
}

fn lookupswitch_targets(code: &[u8], offset: usize) -> Result<Vec<u32>> {
    let base = offset + 1 + padding(offset);
    let default = read_u32(code, base)? as i32;
    let npairs = read_u32(code, base + 4)? as i32;
    let mut targets = vec![relative(offset, default)];
    let mut idx = base + 8;
    for _ in 0..npairs {
        targets.push(relative(offset, read_u32(code, idx + 4)? as i32));
        idx += 8;
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::InstructionKind;

    fn code_for(bytecode: Vec<u8>) -> Code {
        let mut instructions = Vec::new();
        let mut offset = 0;
        while offset < bytecode.len() {
            instructions.push(Instruction {
                offset: offset as u32,
                opcode: bytecode[offset],
                kind: InstructionKind::Other,
            });
            offset += opcode_length(&bytecode, offset).expect("length");
        }
        Code {
            bytecode,
            instructions,
            ..Code::default()
        }
    }

    #[test]
    fn straight_line_code_is_one_block() {
        let shape = flow_shape(&code_for(vec![0x03, 0x3b, opcodes::RETURN])).expect("shape");
        assert_eq!(1, shape.blocks);
        assert_eq!(1, shape.exits);
        assert_eq!(0, shape.branch_edges);
    }

    #[test]
    fn conditional_branch_splits_blocks() {
        // 0: iload_0, 1: ifeq +6 -> 7, 4: iconst_1, 5: ireturn, 6: nop, 7: iconst_0, 8: ireturn
        let bytecode = vec![
            0x1a,
            opcodes::IFEQ,
            0x00,
            0x06,
            0x04,
            opcodes::IRETURN,
            0x00,
            0x03,
            opcodes::IRETURN,
        ];
        let shape = flow_shape(&code_for(bytecode)).expect("shape");
        assert_eq!(4, shape.blocks);
        assert_eq!(1, shape.branch_edges);
        assert_eq!(2, shape.exits);
        assert!(shape.fall_through_edges >= 1);
    }

    #[test]
    fn similarity_is_symmetric_and_bounded() {
        let a = FlowShape {
            blocks: 4,
            branch_edges: 2,
            fall_through_edges: 2,
            exception_edges: 0,
            exits: 1,
        };
        let b = FlowShape {
            blocks: 2,
            exits: 1,
            ..FlowShape::default()
        };
        assert_eq!(a.similarity(&b), b.similarity(&a));
        assert!(a.similarity(&b) < 1.0);
        assert_eq!(1.0, a.similarity(&a));
    }
}
