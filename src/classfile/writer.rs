//! Class image encoder.

use crate::{
    classfile::{
        ClassDef, Constant, FieldDef, FieldRef, Instruction, MethodBody, MethodDef, CLASS_MAGIC,
        CLASS_VERSION,
    },
    file::io::{write_compressed_usize, write_le, write_prefixed_string},
    Result,
};

/// Encodes a class into its binary image.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a count or string length does not fit the
/// compressed integer encoding.
pub fn encode_class(class: &ClassDef) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);

    write_le(&mut out, CLASS_MAGIC);
    write_le(&mut out, CLASS_VERSION);
    write_le(&mut out, class.flags.bits());
    write_prefixed_string(&class.name, &mut out)?;

    match &class.super_name {
        Some(super_name) => {
            write_le(&mut out, 1u8);
            write_prefixed_string(super_name, &mut out)?;
        }
        None => write_le(&mut out, 0u8),
    }

    write_compressed_usize(class.fields.len(), &mut out)?;
    for field in &class.fields {
        encode_field(field, &mut out)?;
    }

    write_compressed_usize(class.methods.len(), &mut out)?;
    for method in &class.methods {
        encode_method(method, &mut out)?;
    }

    Ok(out)
}

fn encode_field(field: &FieldDef, out: &mut Vec<u8>) -> Result<()> {
    write_le(out, field.flags.bits());
    write_prefixed_string(&field.name, out)?;
    write_prefixed_string(&field.descriptor.descriptor(), out)
}

fn encode_method(method: &MethodDef, out: &mut Vec<u8>) -> Result<()> {
    write_le(out, method.flags.bits());
    write_prefixed_string(&method.name, out)?;
    write_prefixed_string(&method.descriptor(), out)?;

    match &method.body {
        Some(body) => {
            write_le(out, 1u8);
            encode_body(body, out)
        }
        None => {
            write_le(out, 0u8);
            Ok(())
        }
    }
}

fn encode_body(body: &MethodBody, out: &mut Vec<u8>) -> Result<()> {
    write_compressed_usize(usize::from(body.max_locals), out)?;
    write_compressed_usize(usize::from(body.max_stack), out)?;
    write_compressed_usize(body.code.len(), out)?;

    for instruction in &body.code {
        encode_instruction(instruction, out)?;
    }
    Ok(())
}

fn encode_field_ref(field: &FieldRef, out: &mut Vec<u8>) -> Result<()> {
    write_prefixed_string(&field.owner, out)?;
    write_prefixed_string(&field.name, out)?;
    write_prefixed_string(&field.descriptor.descriptor(), out)
}

/// Appends one instruction: the opcode byte followed by its operands.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a string operand is too long.
pub fn encode_instruction(instruction: &Instruction, out: &mut Vec<u8>) -> Result<()> {
    out.push(instruction.opcode() as u8);

    match instruction {
        Instruction::Const(Constant::Int(value)) => write_le(out, *value),
        Instruction::Const(Constant::Long(value)) => write_le(out, *value),
        Instruction::Const(Constant::Double(value)) => write_le(out, *value),
        Instruction::Const(Constant::Str(value)) => write_prefixed_string(value, out)?,
        Instruction::Load(index) | Instruction::Store(index) => write_le(out, *index),
        Instruction::Jump(target)
        | Instruction::JumpIfZero(target)
        | Instruction::JumpIfNonZero(target) => write_le(out, *target),
        Instruction::New(class) => write_prefixed_string(class, out)?,
        Instruction::GetField(field)
        | Instruction::PutField(field)
        | Instruction::GetStatic(field)
        | Instruction::PutStatic(field) => encode_field_ref(field, out)?,
        Instruction::InvokeVirtual(method) | Instruction::InvokeStatic(method) => {
            write_prefixed_string(&method.owner, out)?;
            write_prefixed_string(&method.name, out)?;
            write_prefixed_string(&method.signature.descriptor(), out)?;
        }
        Instruction::CallNative(native) => {
            write_prefixed_string(&native.name, out)?;
            write_prefixed_string(&native.signature.descriptor(), out)?;
        }
        Instruction::Nop
        | Instruction::Pop
        | Instruction::Dup
        | Instruction::Const(Constant::Null)
        | Instruction::Add
        | Instruction::Sub
        | Instruction::Mul
        | Instruction::CmpEq
        | Instruction::CmpLt
        | Instruction::Return
        | Instruction::ReturnValue => {}
    }

    Ok(())
}
