//! Instruction set of the class image format.
//!
//! Method bodies are sequences of [`Instruction`]s for a stack machine. Branch targets are
//! instruction indices into the same body, not byte offsets, which keeps body editing (see
//! [`crate::classfile::MethodBody`]) a matter of index relocation.
//!
//! # Key Components
//!
//! - [`Instruction`] - A decoded instruction with its operands
//! - [`Opcode`] - The one-byte operation code of each instruction
//! - [`Constant`] - Literal operands of [`Instruction::Const`]
//! - [`FieldRef`], [`MethodRef`], [`NativeRef`] - Symbolic member references
//! - [`FlowType`] - Control flow classification used by the verifier
//!
//! # Stack Behavior
//!
//! | Instruction | Pops | Pushes |
//! |-------------|------|--------|
//! | `Const`, `Load`, `New`, `GetStatic` | 0 | 1 |
//! | `Pop`, `Store`, `PutStatic`, `JumpIfZero`, `JumpIfNonZero`, `ReturnValue` | 1 | 0 |
//! | `Dup` | 1 | 2 |
//! | `Add`, `Sub`, `Mul`, `CmpEq`, `CmpLt` | 2 | 1 |
//! | `GetField` | 1 | 1 |
//! | `PutField` | 2 | 0 |
//! | `InvokeVirtual` | 1 + params | 0 or 1 |
//! | `InvokeStatic`, `CallNative` | params | 0 or 1 |

use std::fmt;

use strum::{Display, EnumIter};

use crate::signatures::{MethodSignature, TypeSignature};

/// Operation codes, as stored in the class image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    Nop = 0x00,
    Pop = 0x01,
    Dup = 0x02,
    ConstNull = 0x10,
    ConstInt = 0x11,
    ConstLong = 0x12,
    ConstDouble = 0x13,
    ConstStr = 0x14,
    Load = 0x20,
    Store = 0x21,
    Add = 0x30,
    Sub = 0x31,
    Mul = 0x32,
    CmpEq = 0x33,
    CmpLt = 0x34,
    Jump = 0x40,
    JumpIfZero = 0x41,
    JumpIfNonZero = 0x42,
    New = 0x50,
    GetField = 0x51,
    PutField = 0x52,
    GetStatic = 0x53,
    PutStatic = 0x54,
    InvokeVirtual = 0x60,
    InvokeStatic = 0x61,
    CallNative = 0x62,
    Return = 0x70,
    ReturnValue = 0x71,
}

impl Opcode {
    /// Looks up the opcode for a byte read from a class image
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        use strum::IntoEnumIterator;
        Opcode::iter().find(|op| *op as u8 == byte)
    }
}

/// Literal operand of [`Instruction::Const`]
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// The null reference
    Null,
    /// 32-bit integer, also used for booleans, bytes, chars and shorts
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 64-bit float, also used for floats
    Double(f64),
    /// String literal
    Str(String),
}

/// Symbolic reference to a field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Qualified name of the declaring class
    pub owner: String,
    /// Field name
    pub name: String,
    /// Field type
    pub descriptor: TypeSignature,
}

impl FieldRef {
    /// Creates a new field reference
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: TypeSignature,
    ) -> Self {
        FieldRef {
            owner: owner.into(),
            name: name.into(),
            descriptor,
        }
    }
}

/// Symbolic reference to a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Qualified name of the class the lookup starts at
    pub owner: String,
    /// Method name
    pub name: String,
    /// Method signature
    pub signature: MethodSignature,
}

impl MethodRef {
    /// Creates a new method reference
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        signature: MethodSignature,
    ) -> Self {
        MethodRef {
            owner: owner.into(),
            name: name.into(),
            signature,
        }
    }
}

/// Reference to a native function registered with the runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeRef {
    /// Registered name of the native
    pub name: String,
    /// Signature the call site assumes
    pub signature: MethodSignature,
}

impl NativeRef {
    /// Creates a new native reference
    #[must_use]
    pub fn new(name: impl Into<String>, signature: MethodSignature) -> Self {
        NativeRef {
            name: name.into(),
            signature,
        }
    }
}

/// Control flow behavior of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Continues with the next instruction
    Sequential,
    /// Always transfers control to the branch target
    UnconditionalBranch,
    /// Transfers control to the branch target or the next instruction
    ConditionalBranch,
    /// Leaves the method
    Return,
}

/// A single instruction with its operands
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Does nothing
    Nop,
    /// Discards the top of the stack
    Pop,
    /// Duplicates the top of the stack
    Dup,
    /// Pushes a literal
    Const(Constant),
    /// Pushes a local variable (arguments occupy the first slots)
    Load(u16),
    /// Pops into a local variable
    Store(u16),
    /// Integer or floating-point addition, string concatenation
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Pushes 1 if the two top values are equal, 0 otherwise
    CmpEq,
    /// Pushes 1 if the second value is less than the top value, 0 otherwise
    CmpLt,
    /// Unconditional branch
    Jump(u32),
    /// Branch if the popped integer is zero
    JumpIfZero(u32),
    /// Branch if the popped integer is not zero
    JumpIfNonZero(u32),
    /// Allocates an instance of the named class
    New(String),
    /// Pops an object, pushes the field's value
    GetField(FieldRef),
    /// Pops a value and an object, stores the value into the field
    PutField(FieldRef),
    /// Pushes a static field's value
    GetStatic(FieldRef),
    /// Pops a value into a static field
    PutStatic(FieldRef),
    /// Calls an instance method, dispatched on the receiver's class
    InvokeVirtual(MethodRef),
    /// Calls a static method
    InvokeStatic(MethodRef),
    /// Calls a native function registered with the runtime
    CallNative(NativeRef),
    /// Returns from a `void` method
    Return,
    /// Returns the popped value
    ReturnValue,
}

impl Instruction {
    /// Shorthand for `Const(Constant::Int(value))`
    #[must_use]
    pub fn int(value: i32) -> Self {
        Instruction::Const(Constant::Int(value))
    }

    /// Shorthand for `Const(Constant::Long(value))`
    #[must_use]
    pub fn long(value: i64) -> Self {
        Instruction::Const(Constant::Long(value))
    }

    /// Shorthand for `Const(Constant::Str(value))`
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Instruction::Const(Constant::Str(value.into()))
    }

    /// The opcode this instruction is encoded with
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Nop => Opcode::Nop,
            Instruction::Pop => Opcode::Pop,
            Instruction::Dup => Opcode::Dup,
            Instruction::Const(Constant::Null) => Opcode::ConstNull,
            Instruction::Const(Constant::Int(_)) => Opcode::ConstInt,
            Instruction::Const(Constant::Long(_)) => Opcode::ConstLong,
            Instruction::Const(Constant::Double(_)) => Opcode::ConstDouble,
            Instruction::Const(Constant::Str(_)) => Opcode::ConstStr,
            Instruction::Load(_) => Opcode::Load,
            Instruction::Store(_) => Opcode::Store,
            Instruction::Add => Opcode::Add,
            Instruction::Sub => Opcode::Sub,
            Instruction::Mul => Opcode::Mul,
            Instruction::CmpEq => Opcode::CmpEq,
            Instruction::CmpLt => Opcode::CmpLt,
            Instruction::Jump(_) => Opcode::Jump,
            Instruction::JumpIfZero(_) => Opcode::JumpIfZero,
            Instruction::JumpIfNonZero(_) => Opcode::JumpIfNonZero,
            Instruction::New(_) => Opcode::New,
            Instruction::GetField(_) => Opcode::GetField,
            Instruction::PutField(_) => Opcode::PutField,
            Instruction::GetStatic(_) => Opcode::GetStatic,
            Instruction::PutStatic(_) => Opcode::PutStatic,
            Instruction::InvokeVirtual(_) => Opcode::InvokeVirtual,
            Instruction::InvokeStatic(_) => Opcode::InvokeStatic,
            Instruction::CallNative(_) => Opcode::CallNative,
            Instruction::Return => Opcode::Return,
            Instruction::ReturnValue => Opcode::ReturnValue,
        }
    }

    /// Number of stack slots consumed and produced, as `(pops, pushes)`
    #[must_use]
    pub fn stack_effect(&self) -> (usize, usize) {
        let call_effect = |receiver: usize, signature: &MethodSignature| {
            (
                receiver + signature.params.len(),
                usize::from(signature.returns_value()),
            )
        };

        match self {
            Instruction::Nop | Instruction::Jump(_) | Instruction::Return => (0, 0),
            Instruction::Pop
            | Instruction::Store(_)
            | Instruction::PutStatic(_)
            | Instruction::JumpIfZero(_)
            | Instruction::JumpIfNonZero(_)
            | Instruction::ReturnValue => (1, 0),
            Instruction::Dup => (1, 2),
            Instruction::Const(_)
            | Instruction::Load(_)
            | Instruction::New(_)
            | Instruction::GetStatic(_) => (0, 1),
            Instruction::Add
            | Instruction::Sub
            | Instruction::Mul
            | Instruction::CmpEq
            | Instruction::CmpLt => (2, 1),
            Instruction::GetField(_) => (1, 1),
            Instruction::PutField(_) => (2, 0),
            Instruction::InvokeVirtual(method) => call_effect(1, &method.signature),
            Instruction::InvokeStatic(method) => call_effect(0, &method.signature),
            Instruction::CallNative(native) => call_effect(0, &native.signature),
        }
    }

    /// Control flow classification
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        match self {
            Instruction::Jump(_) => FlowType::UnconditionalBranch,
            Instruction::JumpIfZero(_) | Instruction::JumpIfNonZero(_) => {
                FlowType::ConditionalBranch
            }
            Instruction::Return | Instruction::ReturnValue => FlowType::Return,
            _ => FlowType::Sequential,
        }
    }

    /// The branch target of a jump instruction
    #[must_use]
    pub fn branch_target(&self) -> Option<u32> {
        match self {
            Instruction::Jump(target)
            | Instruction::JumpIfZero(target)
            | Instruction::JumpIfNonZero(target) => Some(*target),
            _ => None,
        }
    }

    /// Mutable access to the branch target of a jump instruction
    pub fn branch_target_mut(&mut self) -> Option<&mut u32> {
        match self {
            Instruction::Jump(target)
            | Instruction::JumpIfZero(target)
            | Instruction::JumpIfNonZero(target) => Some(target),
            _ => None,
        }
    }

    /// Returns `true` if execution can continue with the next instruction
    #[must_use]
    pub fn falls_through(&self) -> bool {
        matches!(
            self.flow_type(),
            FlowType::Sequential | FlowType::ConditionalBranch
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Const(Constant::Null) => f.write_str("const null"),
            Instruction::Const(Constant::Int(v)) => write!(f, "const {v}"),
            Instruction::Const(Constant::Long(v)) => write!(f, "const {v}L"),
            Instruction::Const(Constant::Double(v)) => write!(f, "const {v}D"),
            Instruction::Const(Constant::Str(v)) => write!(f, "const {v:?}"),
            Instruction::Load(index) => write!(f, "load {index}"),
            Instruction::Store(index) => write!(f, "store {index}"),
            Instruction::Jump(target) => write!(f, "jump {target}"),
            Instruction::JumpIfZero(target) => write!(f, "jump_if_zero {target}"),
            Instruction::JumpIfNonZero(target) => write!(f, "jump_if_nonzero {target}"),
            Instruction::New(class) => write!(f, "new {class}"),
            Instruction::GetField(field) => write!(f, "getfield {}.{}", field.owner, field.name),
            Instruction::PutField(field) => write!(f, "putfield {}.{}", field.owner, field.name),
            Instruction::GetStatic(field) => {
                write!(f, "getstatic {}.{}", field.owner, field.name)
            }
            Instruction::PutStatic(field) => {
                write!(f, "putstatic {}.{}", field.owner, field.name)
            }
            Instruction::InvokeVirtual(method) => write!(
                f,
                "invokevirtual {}.{}{}",
                method.owner, method.name, method.signature
            ),
            Instruction::InvokeStatic(method) => write!(
                f,
                "invokestatic {}.{}{}",
                method.owner, method.name, method.signature
            ),
            Instruction::CallNative(native) => {
                write!(f, "callnative {}{}", native.name, native.signature)
            }
            other => write!(f, "{}", other.opcode().to_string().to_lowercase()),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn opcode_bytes_are_unique() {
        for op in Opcode::iter() {
            assert_eq!(Opcode::from_byte(op as u8), Some(op));
        }
        assert_eq!(Opcode::from_byte(0xFF), None);
    }

    #[test]
    fn call_stack_effects() {
        let sig = MethodSignature::new(
            vec![TypeSignature::Int, TypeSignature::Long],
            TypeSignature::Int,
        );

        let virt = Instruction::InvokeVirtual(MethodRef::new("pkg.A", "m", sig.clone()));
        assert_eq!(virt.stack_effect(), (3, 1));

        let stat = Instruction::InvokeStatic(MethodRef::new("pkg.A", "m", sig));
        assert_eq!(stat.stack_effect(), (2, 1));

        let native = Instruction::CallNative(NativeRef::new("trace", MethodSignature::void()));
        assert_eq!(native.stack_effect(), (0, 0));
    }

    #[test]
    fn flow() {
        assert!(!Instruction::Jump(0).falls_through());
        assert!(Instruction::JumpIfZero(0).falls_through());
        assert!(!Instruction::ReturnValue.falls_through());
        assert_eq!(Instruction::Add.branch_target(), None);
        assert_eq!(Instruction::int(3).to_string(), "const 3");
        assert_eq!(Instruction::Dup.to_string(), "dup");
    }
}
