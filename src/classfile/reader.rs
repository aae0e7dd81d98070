//! Class image decoder.
//!
//! Decoding is strict: unknown opcodes, invalid descriptors, out-of-range flags and
//! trailing bytes after the last method are all reported as [`crate::Error::Malformed`].

use crate::{
    classfile::{
        ClassDef, ClassFlags, Constant, FieldDef, FieldRef, Instruction, MemberFlags, MethodBody,
        MethodDef, MethodRef, NativeRef, Opcode, CLASS_MAGIC, CLASS_VERSION,
    },
    file::parser::Parser,
    signatures::{parse_method_descriptor, parse_type_descriptor},
    Error, Result,
};

/// Smallest encoded size of a counted entry.
const MIN_ENTRY_SIZE: usize = 1;

/// Decodes a class from its binary image.
///
/// # Errors
/// Returns [`Error::Empty`] for empty input, [`Error::OutOfBounds`] for truncated input and
/// [`Error::Malformed`] for anything that does not follow the image format.
pub fn decode_class(data: &[u8]) -> Result<ClassDef> {
    if data.is_empty() {
        return Err(Error::Empty);
    }

    let mut parser = Parser::new(data);

    let magic = parser.read_le::<u32>()?;
    if magic != CLASS_MAGIC {
        return Err(malformed_error!("Invalid class image magic 0x{:08X}", magic));
    }

    let version = parser.read_le::<u16>()?;
    if version != CLASS_VERSION {
        return Err(malformed_error!("Unsupported class image version {}", version));
    }

    let flags_raw = parser.read_le::<u16>()?;
    let Some(flags) = ClassFlags::from_bits(flags_raw) else {
        return Err(malformed_error!("Invalid class flags 0x{:04X}", flags_raw));
    };

    let name = parser.read_prefixed_string_utf8()?;
    let super_name = if parser.read_bool()? {
        Some(parser.read_prefixed_string_utf8()?)
    } else {
        None
    };

    let field_count = read_count(&mut parser)?;
    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        fields.push(read_field(&mut parser)?);
    }

    let method_count = read_count(&mut parser)?;
    let mut methods = Vec::with_capacity(method_count);
    for _ in 0..method_count {
        methods.push(read_method(&mut parser)?);
    }

    if parser.has_more_data() {
        return Err(malformed_error!(
            "{} trailing bytes after class {}",
            parser.len() - parser.pos(),
            name
        ));
    }

    Ok(ClassDef {
        flags,
        name,
        super_name,
        fields,
        methods,
    })
}

/// Reads a count and checks it against the remaining input, so a corrupt count cannot
/// trigger a huge allocation.
fn read_count(parser: &mut Parser<'_>) -> Result<usize> {
    let count = parser.read_compressed_usize()?;
    let remaining = parser.len() - parser.pos();
    if count.saturating_mul(MIN_ENTRY_SIZE) > remaining {
        return Err(malformed_error!(
            "Count {} exceeds remaining {} bytes",
            count,
            remaining
        ));
    }
    Ok(count)
}

fn read_member_flags(parser: &mut Parser<'_>) -> Result<MemberFlags> {
    let raw = parser.read_le::<u16>()?;
    MemberFlags::from_bits(raw)
        .ok_or_else(|| malformed_error!("Invalid member flags 0x{:04X}", raw))
}

fn read_field(parser: &mut Parser<'_>) -> Result<FieldDef> {
    let flags = read_member_flags(parser)?;
    let name = parser.read_prefixed_string_utf8()?;
    let descriptor = parse_type_descriptor(&parser.read_prefixed_string_utf8()?)?;

    Ok(FieldDef {
        flags,
        name,
        descriptor,
    })
}

fn read_method(parser: &mut Parser<'_>) -> Result<MethodDef> {
    let flags = read_member_flags(parser)?;
    let name = parser.read_prefixed_string_utf8()?;
    let signature = parse_method_descriptor(&parser.read_prefixed_string_utf8()?)?;

    let body = if parser.read_bool()? {
        Some(read_body(parser)?)
    } else {
        None
    };

    Ok(MethodDef {
        flags,
        name,
        signature,
        body,
    })
}

fn read_u16_value(parser: &mut Parser<'_>, what: &str) -> Result<u16> {
    let value = parser.read_compressed_uint()?;
    u16::try_from(value).map_err(|_| malformed_error!("{} {} out of range", what, value))
}

fn read_body(parser: &mut Parser<'_>) -> Result<MethodBody> {
    let max_locals = read_u16_value(parser, "max_locals")?;
    let max_stack = read_u16_value(parser, "max_stack")?;

    let code_len = read_count(parser)?;
    let mut code = Vec::with_capacity(code_len);
    for _ in 0..code_len {
        code.push(read_instruction(parser)?);
    }

    Ok(MethodBody {
        max_locals,
        max_stack,
        code,
    })
}

fn read_field_ref(parser: &mut Parser<'_>) -> Result<FieldRef> {
    let owner = parser.read_prefixed_string_utf8()?;
    let name = parser.read_prefixed_string_utf8()?;
    let descriptor = parse_type_descriptor(&parser.read_prefixed_string_utf8()?)?;
    Ok(FieldRef {
        owner,
        name,
        descriptor,
    })
}

fn read_method_ref(parser: &mut Parser<'_>) -> Result<MethodRef> {
    let owner = parser.read_prefixed_string_utf8()?;
    let name = parser.read_prefixed_string_utf8()?;
    let signature = parse_method_descriptor(&parser.read_prefixed_string_utf8()?)?;
    Ok(MethodRef {
        owner,
        name,
        signature,
    })
}

/// Reads one instruction: the opcode byte followed by its operands.
///
/// # Errors
/// Returns [`Error::Malformed`] for unknown opcodes or invalid operands.
pub fn read_instruction(parser: &mut Parser<'_>) -> Result<Instruction> {
    let byte = parser.read_le::<u8>()?;
    let Some(opcode) = Opcode::from_byte(byte) else {
        return Err(malformed_error!(
            "Unknown opcode 0x{:02X} at offset {}",
            byte,
            parser.pos() - 1
        ));
    };

    Ok(match opcode {
        Opcode::Nop => Instruction::Nop,
        Opcode::Pop => Instruction::Pop,
        Opcode::Dup => Instruction::Dup,
        Opcode::ConstNull => Instruction::Const(Constant::Null),
        Opcode::ConstInt => Instruction::Const(Constant::Int(parser.read_le::<i32>()?)),
        Opcode::ConstLong => Instruction::Const(Constant::Long(parser.read_le::<i64>()?)),
        Opcode::ConstDouble => Instruction::Const(Constant::Double(parser.read_le::<f64>()?)),
        Opcode::ConstStr => Instruction::Const(Constant::Str(parser.read_prefixed_string_utf8()?)),
        Opcode::Load => Instruction::Load(parser.read_le::<u16>()?),
        Opcode::Store => Instruction::Store(parser.read_le::<u16>()?),
        Opcode::Add => Instruction::Add,
        Opcode::Sub => Instruction::Sub,
        Opcode::Mul => Instruction::Mul,
        Opcode::CmpEq => Instruction::CmpEq,
        Opcode::CmpLt => Instruction::CmpLt,
        Opcode::Jump => Instruction::Jump(parser.read_le::<u32>()?),
        Opcode::JumpIfZero => Instruction::JumpIfZero(parser.read_le::<u32>()?),
        Opcode::JumpIfNonZero => Instruction::JumpIfNonZero(parser.read_le::<u32>()?),
        Opcode::New => Instruction::New(parser.read_prefixed_string_utf8()?),
        Opcode::GetField => Instruction::GetField(read_field_ref(parser)?),
        Opcode::PutField => Instruction::PutField(read_field_ref(parser)?),
        Opcode::GetStatic => Instruction::GetStatic(read_field_ref(parser)?),
        Opcode::PutStatic => Instruction::PutStatic(read_field_ref(parser)?),
        Opcode::InvokeVirtual => Instruction::InvokeVirtual(read_method_ref(parser)?),
        Opcode::InvokeStatic => Instruction::InvokeStatic(read_method_ref(parser)?),
        Opcode::CallNative => {
            let name = parser.read_prefixed_string_utf8()?;
            let signature = parse_method_descriptor(&parser.read_prefixed_string_utf8()?)?;
            Instruction::CallNative(NativeRef { name, signature })
        }
        Opcode::Return => Instruction::Return,
        Opcode::ReturnValue => Instruction::ReturnValue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::encode_class,
        signatures::{MethodSignature, TypeSignature},
        test::factories::counter_class,
    };

    #[test]
    fn counter_image_decodes_to_same_class() {
        let class = counter_class();
        let bytes = encode_class(&class).unwrap();

        assert_eq!(&bytes[..4], b"TPCL");
        assert_eq!(decode_class(&bytes).unwrap(), class);
    }

    #[test]
    fn every_operand_kind_survives() {
        let mut class = ClassDef::new("pkg.Ops", ClassFlags::PUBLIC);
        let sig = MethodSignature::new(vec![TypeSignature::Int], TypeSignature::Void);
        class.methods.push(MethodDef::new(
            MemberFlags::STATIC,
            "all",
            sig.clone(),
            vec![
                Instruction::Const(Constant::Null),
                Instruction::Pop,
                Instruction::long(-5),
                Instruction::Pop,
                Instruction::Const(Constant::Double(2.5)),
                Instruction::Pop,
                Instruction::string("héllo"),
                Instruction::Pop,
                Instruction::Load(0),
                Instruction::JumpIfZero(12),
                Instruction::New("pkg.Ops".into()),
                Instruction::Pop,
                Instruction::CallNative(NativeRef::new("trace", MethodSignature::void())),
                Instruction::InvokeStatic(MethodRef::new("pkg.Ops", "all", sig)),
                Instruction::Return,
            ],
        ));

        let decoded = decode_class(&encode_class(&class).unwrap()).unwrap();
        assert_eq!(decoded, class);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(decode_class(&[]), Err(Error::Empty)));
        assert!(matches!(
            decode_class(b"NOPE\x01\x00"),
            Err(Error::Malformed { .. })
        ));

        let mut bytes = encode_class(&counter_class()).unwrap();
        assert!(matches!(
            decode_class(&bytes[..bytes.len() - 1]),
            Err(Error::OutOfBounds | Error::Malformed { .. })
        ));

        bytes.push(0);
        assert!(matches!(decode_class(&bytes), Err(Error::Malformed { .. })));
    }

    #[test]
    fn rejects_unknown_opcode() {
        let data = [0xEE];
        let mut parser = Parser::new(&data);
        assert!(matches!(
            read_instruction(&mut parser),
            Err(Error::Malformed { .. })
        ));
    }
}
