use anyhow::{Context, Result};
use jclassfile::attributes::BootstrapMethodRecord;

use super::opcodes;
use super::reader::Pool;
use super::{
    CallKind, CallSite, Constant, DynamicSite, FieldAccess, Instruction, InstructionKind, TypeOp,
};

/// Decode a method body into the instruction list used by the extractor.
pub(crate) fn decode_instructions(
    code: &[u8],
    pool: &Pool<'_>,
    bootstraps: &[BootstrapMethodRecord],
) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut offset = 0usize;
    while offset < code.len() {
        let opcode = code[offset];
        let length = opcode_length(code, offset)?;
        if offset + length > code.len() {
            anyhow::bail!("truncated instruction 0x{opcode:02x} at offset {offset}");
        }
        let kind = decode_kind(code, offset, opcode, pool, bootstraps)
            .with_context(|| format!("failed to decode opcode 0x{opcode:02x} at {offset}"))?;
        instructions.push(Instruction {
            offset: offset as u32,
            opcode,
            kind,
        });
        offset += length;
    }
    Ok(instructions)
}

fn decode_kind(
    code: &[u8],
    offset: usize,
    opcode: u8,
    pool: &Pool<'_>,
    bootstraps: &[BootstrapMethodRecord],
) -> Result<InstructionKind> {
    let kind = match opcode {
        opcodes::BIPUSH => InstructionKind::Constant(Constant::Int(code[offset + 1] as i8 as i32)),
        opcodes::SIPUSH => {
            let value = read_u16(code, offset + 1)? as i16;
            InstructionKind::Constant(Constant::Int(value as i32))
        }
        opcodes::LDC => InstructionKind::Constant(pool.constant(code[offset + 1] as u16)?),
        opcodes::LDC_W | opcodes::LDC2_W => {
            InstructionKind::Constant(pool.constant(read_u16(code, offset + 1)?)?)
        }
        opcodes::GETSTATIC | opcodes::PUTSTATIC | opcodes::GETFIELD | opcodes::PUTFIELD => {
            let member = pool.member_ref(read_u16(code, offset + 1)?)?;
            InstructionKind::Field(FieldAccess {
                owner: member.owner,
                name: member.name,
                descriptor: member.descriptor,
                is_write: matches!(opcode, opcodes::PUTSTATIC | opcodes::PUTFIELD),
                is_static: matches!(opcode, opcodes::GETSTATIC | opcodes::PUTSTATIC),
            })
        }
        opcodes::INVOKEVIRTUAL
        | opcodes::INVOKESPECIAL
        | opcodes::INVOKESTATIC
        | opcodes::INVOKEINTERFACE => {
            let member = pool.member_ref(read_u16(code, offset + 1)?)?;
            let kind = match opcode {
                opcodes::INVOKEVIRTUAL => CallKind::Virtual,
                opcodes::INVOKESPECIAL => CallKind::Special,
                opcodes::INVOKESTATIC => CallKind::Static,
                _ => CallKind::Interface,
            };
            InstructionKind::Invoke(CallSite {
                owner: member.owner,
                name: member.name,
                descriptor: member.descriptor,
                kind,
                is_interface: member.is_interface,
            })
        }
        opcodes::INVOKEDYNAMIC => {
            let (bootstrap_index, name, descriptor) =
                pool.invoke_dynamic(read_u16(code, offset + 1)?)?;
            let bootstrap = bootstraps
                .get(bootstrap_index as usize)
                .with_context(|| format!("missing bootstrap method {bootstrap_index}"))?;
            let mut handle_args = Vec::new();
            for arg in bootstrap.bootstrap_arguments() {
                if let Constant::Handle(handle) = pool.constant(*arg)? {
                    handle_args.push(handle);
                }
            }
            InstructionKind::InvokeDynamic(DynamicSite {
                name,
                descriptor,
                bootstrap: pool.handle(bootstrap.bootstrap_method_ref())?,
                handle_args,
            })
        }
        opcodes::NEW | opcodes::CHECKCAST | opcodes::INSTANCEOF | opcodes::ANEWARRAY => {
            let op = match opcode {
                opcodes::NEW => TypeOp::New,
                opcodes::CHECKCAST => TypeOp::CheckCast,
                opcodes::INSTANCEOF => TypeOp::InstanceOf,
                _ => TypeOp::NewArray,
            };
            let class = pool.class_name(read_u16(code, offset + 1)?)?.to_string();
            InstructionKind::Type { op, class }
        }
        opcodes::MULTIANEWARRAY => {
            let class = pool.class_name(read_u16(code, offset + 1)?)?.to_string();
            InstructionKind::Type {
                op: TypeOp::NewArray,
                class,
            }
        }
        _ => InstructionKind::Other,
    };
    Ok(kind)
}

/// Length in bytes of the instruction starting at `offset`.
pub(crate) fn opcode_length(code: &[u8], offset: usize) -> Result<usize> {
    let opcode = *code
        .get(offset)
        .with_context(|| format!("offset {offset} out of bounds"))?;
    let length = match opcode {
        0x00..=0x0f => 1,
        opcodes::BIPUSH => 2,
        opcodes::SIPUSH => 3,
        opcodes::LDC => 2,
        opcodes::LDC_W | opcodes::LDC2_W => 3,
        opcodes::ILOAD..=opcodes::ALOAD => 2,
        0x1a..=0x35 => 1,
        opcodes::ISTORE..=opcodes::ASTORE => 2,
        0x3b..=0x83 => 1,
        opcodes::IINC => 3,
        0x85..=0x98 => 1,
        opcodes::IFEQ..=opcodes::JSR => 3,
        opcodes::RET => 2,
        opcodes::TABLESWITCH => {
            let base = offset + 1 + padding(offset);
            let low = read_u32(code, base + 4)? as i32;
            let high = read_u32(code, base + 8)? as i32;
            let count = (high as i64) - (low as i64) + 1;
            if count < 0 {
                anyhow::bail!("invalid tableswitch range at {offset}");
            }
            1 + padding(offset) + 12 + 4 * count as usize
        }
        opcodes::LOOKUPSWITCH => {
            let base = offset + 1 + padding(offset);
            let npairs = read_u32(code, base + 4)? as i32;
            if npairs < 0 {
                anyhow::bail!("invalid lookupswitch pair count at {offset}");
            }
            1 + padding(offset) + 8 + 8 * npairs as usize
        }
        opcodes::IRETURN..=opcodes::RETURN => 1,
        opcodes::GETSTATIC..=opcodes::INVOKESTATIC => 3,
        opcodes::INVOKEINTERFACE | opcodes::INVOKEDYNAMIC => 5,
        opcodes::NEW => 3,
        opcodes::NEWARRAY => 2,
        opcodes::ANEWARRAY => 3,
        0xbe | opcodes::ATHROW => 1,
        opcodes::CHECKCAST | opcodes::INSTANCEOF => 3,
        0xc2 | 0xc3 => 1,
        opcodes::WIDE => {
            let inner = *code
                .get(offset + 1)
                .with_context(|| format!("truncated wide instruction at {offset}"))?;
            if inner == opcodes::IINC { 6 } else { 4 }
        }
        opcodes::MULTIANEWARRAY => 4,
        opcodes::IFNULL | opcodes::IFNONNULL => 3,
        opcodes::GOTO_W | opcodes::JSR_W => 5,
        _ => anyhow::bail!("unknown opcode 0x{opcode:02x} at {offset}"),
    };
    Ok(length)
}

/// Alignment padding after a switch opcode.
pub(crate) fn padding(offset: usize) -> usize {
    (4 - ((offset + 1) % 4)) % 4
}

pub(crate) fn read_u16(code: &[u8], offset: usize) -> Result<u16> {
    let bytes = code
        .get(offset..offset + 2)
        .with_context(|| format!("u16 read out of bounds at {offset}"))?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn read_u32(code: &[u8], offset: usize) -> Result<u32> {
    let bytes = code
        .get(offset..offset + 4)
        .with_context(|| format!("u32 read out of bounds at {offset}"))?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_length_handles_fixed_width_instructions() {
        let code = [opcodes::INVOKEINTERFACE, 0, 1, 1, 0, opcodes::RETURN];
        assert_eq!(5, opcode_length(&code, 0).expect("length"));
        assert_eq!(1, opcode_length(&code, 5).expect("length"));
    }

    #[test]
    fn opcode_length_handles_wide_forms() {
        let wide_iinc = [opcodes::WIDE, opcodes::IINC, 0, 1, 0, 5];
        let wide_load = [opcodes::WIDE, opcodes::ILOAD, 0, 1];
        assert_eq!(6, opcode_length(&wide_iinc, 0).expect("length"));
        assert_eq!(4, opcode_length(&wide_load, 0).expect("length"));
    }

    #[test]
    fn opcode_length_accounts_for_switch_padding() {
        // tableswitch at offset 1: two padding bytes, default, low=0, high=1, two targets.
        let mut code = vec![0x00, opcodes::TABLESWITCH, 0, 0];
        code.extend_from_slice(&10i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&1i32.to_be_bytes());
        code.extend_from_slice(&20i32.to_be_bytes());
        code.extend_from_slice(&30i32.to_be_bytes());

        assert_eq!(2, padding(1));
        assert_eq!(1 + 2 + 12 + 8, opcode_length(&code, 1).expect("length"));
    }

    #[test]
    fn opcode_length_rejects_unknown_opcode() {
        assert!(opcode_length(&[0xfe], 0).is_err());
    }
}
