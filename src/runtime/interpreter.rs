//! Stack machine interpreter of the reference runtime.
//!
//! One `Interpreter` runs one top-level invocation. Each call gets a frame with its
//! own operand stack and locals; the instruction budget and the call depth of
//! [`crate::runtime::ExecutionLimits`] apply to the whole invocation.
//!
//! Method code is fetched from the class's current definition at call time. Frames keep the
//! code they started with, so a redefinition affects calls made after it.

use std::{collections::HashMap, sync::Arc};

use crate::{
    classfile::{Constant, FieldRef, Instruction, MemberFlags, MethodDef, MethodRef},
    runtime::{ClassHandle, Object, ObjectRef, Value, Vm, VmError},
    signatures::MethodSignature,
    Result,
};

struct Frame {
    class: ClassHandle,
    method: MethodDef,
    locals: Vec<Value>,
    stack: Vec<Value>,
}

impl Frame {
    fn pop(&mut self) -> std::result::Result<Value, VmError> {
        self.stack.pop().ok_or_else(|| VmError::StackUnderflow {
            method: format!("{}.{}", self.class.name(), self.method.display_name()),
        })
    }

    fn pop_args(&mut self, count: usize) -> std::result::Result<Vec<Value>, VmError> {
        if self.stack.len() < count {
            return Err(VmError::StackUnderflow {
                method: format!("{}.{}", self.class.name(), self.method.display_name()),
            });
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }
}

pub(crate) struct Interpreter<'vm> {
    vm: &'vm Vm,
    executed: u64,
    depth: usize,
}

impl<'vm> Interpreter<'vm> {
    pub(crate) fn new(vm: &'vm Vm) -> Self {
        Interpreter {
            vm,
            executed: 0,
            depth: 0,
        }
    }

    /// Calls `name` on `receiver`, dispatching on the receiver's class.
    pub(crate) fn invoke_virtual(
        &mut self,
        receiver: ObjectRef,
        name: &str,
        signature: &MethodSignature,
        args: Vec<Value>,
    ) -> Result<Value> {
        let start = receiver.class().clone();
        let (class, method) = self.find_method(&start, name, signature)?;
        if method.is_static() {
            return Err(VmError::NoSuchMethod {
                class: start.name().to_string(),
                method: format!("{name}{signature} (static)"),
            }
            .into());
        }

        let mut locals = Vec::with_capacity(args.len() + 1);
        locals.push(Value::Ref(receiver));
        locals.extend(args);
        self.call(class, method, locals)
    }

    /// Calls the static method `name` of `class` or one of its ancestors.
    pub(crate) fn invoke_static(
        &mut self,
        class: &ClassHandle,
        name: &str,
        signature: &MethodSignature,
        args: Vec<Value>,
    ) -> Result<Value> {
        let (owner, method) = self.find_method(class, name, signature)?;
        if !method.is_static() {
            return Err(VmError::NoSuchMethod {
                class: class.name().to_string(),
                method: format!("{name}{signature} (not static)"),
            }
            .into());
        }
        self.call(owner, method, args)
    }

    fn find_method(
        &self,
        class: &ClassHandle,
        name: &str,
        signature: &MethodSignature,
    ) -> Result<(ClassHandle, MethodDef)> {
        let found = {
            let _safepoint = vm_read_lock!(self.vm.safepoint);
            class.lookup_method(name, signature)?
        };

        found.ok_or_else(|| {
            VmError::NoSuchMethod {
                class: class.name().to_string(),
                method: format!("{name}{signature}"),
            }
            .into()
        })
    }

    fn call(&mut self, class: ClassHandle, method: MethodDef, args: Vec<Value>) -> Result<Value> {
        if args.len() != usize::from(method.argument_slots()) {
            return Err(VmError::TypeMismatch {
                expected: format!("{} arguments", method.argument_slots()),
                found: format!("{} arguments", args.len()),
            }
            .into());
        }

        if method.flags.contains(MemberFlags::NATIVE) {
            let name = format!("{}.{}", class.name(), method.name);
            return self.call_native(&name, &method.signature, &args);
        }

        let Some((max_locals, max_stack)) = method
            .body
            .as_ref()
            .map(|body| (body.max_locals, body.max_stack))
        else {
            return Err(VmError::AbstractMethod {
                class: class.name().to_string(),
                method: method.display_name(),
            }
            .into());
        };

        let max_depth = self.vm.config().limits.max_call_depth;
        if self.depth >= max_depth {
            return Err(VmError::CallDepthExceeded(max_depth).into());
        }

        let mut locals = args;
        locals.resize(usize::from(max_locals).max(locals.len()), Value::Void);
        let frame = Frame {
            class,
            stack: Vec::with_capacity(usize::from(max_stack)),
            method,
            locals,
        };

        self.depth += 1;
        let result = self.run(frame);
        self.depth -= 1;
        result
    }

    fn call_native(
        &self,
        name: &str,
        signature: &MethodSignature,
        args: &[Value],
    ) -> Result<Value> {
        let native = self
            .vm
            .native(name)
            .ok_or_else(|| VmError::NativeNotFound(name.to_string()))?;

        let value = native(args).map_err(|message| VmError::NativeFailed {
            name: name.to_string(),
            message,
        })?;

        if signature.returns_value() {
            Ok(value)
        } else {
            Ok(Value::Void)
        }
    }

    fn tick(&mut self) -> Result<()> {
        self.executed += 1;
        let budget = self.vm.config().limits.max_instructions;
        if budget != 0 && self.executed > budget {
            return Err(VmError::InstructionLimit(budget).into());
        }
        Ok(())
    }

    fn static_owner(&self, context: &ClassHandle, field: &FieldRef) -> Result<ClassHandle> {
        let class = self.vm.resolve_class(context, &field.owner)?;
        class.static_owner(&field.name)?.ok_or_else(|| {
            VmError::NoSuchField {
                class: field.owner.clone(),
                field: field.name.clone(),
            }
            .into()
        })
    }

    fn instantiate(&self, context: &ClassHandle, name: &str) -> Result<Value> {
        let class = self.vm.resolve_class(context, name)?;
        Ok(Value::Ref(self.vm.allocate(&class)?))
    }

    fn invoke_from(
        &mut self,
        frame: &mut Frame,
        target: &MethodRef,
        virtual_call: bool,
    ) -> Result<()> {
        let args = frame.pop_args(target.signature.params.len())?;
        let result = if virtual_call {
            let receiver = frame.pop()?.as_object()?.clone();
            self.invoke_virtual(receiver, &target.name, &target.signature, args)?
        } else {
            let class = self.vm.resolve_class(&frame.class, &target.owner)?;
            self.invoke_static(&class, &target.name, &target.signature, args)?
        };

        if target.signature.returns_value() {
            frame.stack.push(result);
        }
        Ok(())
    }

    fn run(&mut self, mut frame: Frame) -> Result<Value> {
        let Some(body) = frame.method.body.take() else {
            return Ok(Value::Void);
        };
        let code = body.code;
        let mut pc = 0usize;

        loop {
            let Some(instruction) = code.get(pc) else {
                return Err(VmError::TypeMismatch {
                    expected: "return".to_string(),
                    found: format!("end of {}", frame.method.display_name()),
                }
                .into());
            };
            self.tick()?;
            pc += 1;

            match instruction {
                Instruction::Nop => {}
                Instruction::Pop => {
                    frame.pop()?;
                }
                Instruction::Dup => {
                    let top = frame.pop()?;
                    frame.stack.push(top.clone());
                    frame.stack.push(top);
                }
                Instruction::Const(constant) => frame.stack.push(match constant {
                    Constant::Null => Value::Null,
                    Constant::Int(value) => Value::Int(*value),
                    Constant::Long(value) => Value::Long(*value),
                    Constant::Double(value) => Value::Double(*value),
                    Constant::Str(value) => Value::Str(Arc::from(value.as_str())),
                }),
                Instruction::Load(index) => {
                    let value = frame
                        .locals
                        .get(usize::from(*index))
                        .cloned()
                        .ok_or_else(|| VmError::TypeMismatch {
                            expected: format!("local {index}"),
                            found: "out of range".to_string(),
                        })?;
                    frame.stack.push(value);
                }
                Instruction::Store(index) => {
                    let value = frame.pop()?;
                    let Some(slot) = frame.locals.get_mut(usize::from(*index)) else {
                        return Err(VmError::TypeMismatch {
                            expected: format!("local {index}"),
                            found: "out of range".to_string(),
                        }
                        .into());
                    };
                    *slot = value;
                }
                Instruction::Add | Instruction::Sub | Instruction::Mul => {
                    let right = frame.pop()?;
                    let left = frame.pop()?;
                    frame.stack.push(arithmetic(instruction, &left, &right)?);
                }
                Instruction::CmpEq => {
                    let right = frame.pop()?;
                    let left = frame.pop()?;
                    frame.stack.push(Value::Int(i32::from(left == right)));
                }
                Instruction::CmpLt => {
                    let right = frame.pop()?;
                    let left = frame.pop()?;
                    frame.stack.push(Value::Int(i32::from(less_than(&left, &right)?)));
                }
                Instruction::Jump(target) => pc = *target as usize,
                Instruction::JumpIfZero(target) => {
                    if frame.pop()?.is_zero()? {
                        pc = *target as usize;
                    }
                }
                Instruction::JumpIfNonZero(target) => {
                    if !frame.pop()?.is_zero()? {
                        pc = *target as usize;
                    }
                }
                Instruction::New(class) => {
                    let object = self.instantiate(&frame.class, class)?;
                    frame.stack.push(object);
                }
                Instruction::GetField(field) => {
                    let object = frame.pop()?;
                    frame.stack.push(object.as_object()?.get_field(&field.name)?);
                }
                Instruction::PutField(field) => {
                    let value = frame.pop()?;
                    let object = frame.pop()?;
                    object.as_object()?.set_field(&field.name, value)?;
                }
                Instruction::GetStatic(field) => {
                    let owner = self.static_owner(&frame.class, field)?;
                    frame.stack.push(owner.get_static(&field.name)?);
                }
                Instruction::PutStatic(field) => {
                    let value = frame.pop()?;
                    let owner = self.static_owner(&frame.class, field)?;
                    owner.set_static(&field.name, value)?;
                }
                Instruction::InvokeVirtual(target) => self.invoke_from(&mut frame, target, true)?,
                Instruction::InvokeStatic(target) => self.invoke_from(&mut frame, target, false)?,
                Instruction::CallNative(native) => {
                    let args = frame.pop_args(native.signature.params.len())?;
                    let result = self.call_native(&native.name, &native.signature, &args)?;
                    if native.signature.returns_value() {
                        frame.stack.push(result);
                    }
                }
                Instruction::Return => return Ok(Value::Void),
                Instruction::ReturnValue => return Ok(frame.pop()?),
            }
        }
    }
}

fn arithmetic(
    op: &Instruction,
    left: &Value,
    right: &Value,
) -> std::result::Result<Value, VmError> {
    match (op, left, right) {
        (Instruction::Add, Value::Str(_), _) | (Instruction::Add, _, Value::Str(_)) => {
            Ok(Value::Str(Arc::from(format!("{left}{right}").as_str())))
        }
        (_, Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
            Instruction::Add => a.wrapping_add(*b),
            Instruction::Sub => a.wrapping_sub(*b),
            _ => a.wrapping_mul(*b),
        })),
        (_, Value::Long(a), Value::Long(b)) => Ok(Value::Long(match op {
            Instruction::Add => a.wrapping_add(*b),
            Instruction::Sub => a.wrapping_sub(*b),
            _ => a.wrapping_mul(*b),
        })),
        (_, Value::Double(a), Value::Double(b)) => Ok(Value::Double(match op {
            Instruction::Add => a + b,
            Instruction::Sub => a - b,
            _ => a * b,
        })),
        _ => Err(VmError::TypeMismatch {
            expected: format!("matching numeric operands for {op}"),
            found: format!("{} and {}", left.kind(), right.kind()),
        }),
    }
}

fn less_than(left: &Value, right: &Value) -> std::result::Result<bool, VmError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a < b),
        (Value::Long(a), Value::Long(b)) => Ok(a < b),
        (Value::Double(a), Value::Double(b)) => Ok(a < b),
        _ => Err(VmError::TypeMismatch {
            expected: "matching numeric operands for cmp_lt".to_string(),
            found: format!("{} and {}", left.kind(), right.kind()),
        }),
    }
}

/// Builds the field table of a new instance of `class`.
pub(crate) fn initial_fields(
    class: &ClassHandle,
) -> std::result::Result<HashMap<String, Value>, VmError> {
    Ok(class
        .instance_fields()?
        .into_iter()
        .map(|field| {
            let value = Value::default_for(&field.descriptor);
            (field.name, value)
        })
        .collect())
}

pub(crate) fn new_object(class: &ClassHandle) -> std::result::Result<ObjectRef, VmError> {
    Ok(Arc::new(Object::new(class.clone(), initial_fields(class)?)))
}
