//! Structural verification of classes.
//!
//! The verifier checks what can be decided without resolving any other class: member
//! uniqueness, body presence, branch targets, local indices, return kinds and the operand
//! stack depth along every control flow path. Whether the referenced classes, fields and
//! methods exist is left to the runtime that loads the class.

use std::collections::HashSet;

use crate::{
    classfile::{ClassDef, FlowType, Instruction, MemberFlags, MethodBody, MethodDef},
    Error, Result,
};

fn verification_error(class: &ClassDef, method: Option<&MethodDef>, message: String) -> Error {
    Error::Verification {
        class: class.name.clone(),
        method: method.map(MethodDef::display_name).unwrap_or_default(),
        message,
    }
}

/// Verifies a whole class, including that every declared `max_stack` covers the depth the
/// body actually reaches.
///
/// # Errors
/// Returns [`Error::Verification`] describing the first problem found.
pub fn verify_class(class: &ClassDef) -> Result<()> {
    let mut field_names = HashSet::new();
    for field in &class.fields {
        if !field_names.insert(field.name.as_str()) {
            return Err(verification_error(
                class,
                None,
                format!("duplicate field {}", field.name),
            ));
        }
    }

    let mut method_keys = HashSet::new();
    for method in &class.methods {
        if !method_keys.insert((method.name.as_str(), &method.signature)) {
            return Err(verification_error(
                class,
                Some(method),
                "duplicate method".to_string(),
            ));
        }

        let Some(body) = check_body_presence(class, method)? else {
            continue;
        };

        let required = compute_max_stack(class, method, body)?;
        if body.max_stack < required {
            return Err(verification_error(
                class,
                Some(method),
                format!(
                    "declared max_stack {} but the body reaches {}",
                    body.max_stack, required
                ),
            ));
        }
    }

    Ok(())
}

/// Recomputes `max_stack` of every body from its code.
///
/// # Errors
/// Returns [`Error::Verification`] if a body is structurally invalid.
pub fn update_max_stack(class: &mut ClassDef) -> Result<()> {
    let mut computed = Vec::with_capacity(class.methods.len());
    for method in &class.methods {
        computed.push(match &method.body {
            Some(body) => Some(compute_max_stack(class, method, body)?),
            None => None,
        });
    }

    for (method, max_stack) in class.methods.iter_mut().zip(computed) {
        if let (Some(body), Some(max_stack)) = (method.body.as_mut(), max_stack) {
            body.max_stack = max_stack;
        }
    }
    Ok(())
}

fn check_body_presence<'a>(
    class: &ClassDef,
    method: &'a MethodDef,
) -> Result<Option<&'a MethodBody>> {
    if method.is_bodiless() {
        if method.body.is_some() {
            return Err(verification_error(
                class,
                Some(method),
                "abstract or native method has a body".to_string(),
            ));
        }
        if method.flags.contains(MemberFlags::ABSTRACT) && !class.is_abstract() {
            return Err(verification_error(
                class,
                Some(method),
                "abstract method in a concrete class".to_string(),
            ));
        }
        return Ok(None);
    }

    match &method.body {
        Some(body) => Ok(Some(body)),
        None => Err(verification_error(
            class,
            Some(method),
            "concrete method has no body".to_string(),
        )),
    }
}

/// Checks one body and returns the deepest operand stack it can reach.
///
/// # Errors
/// Returns [`Error::Verification`] for out-of-range branch targets or locals, mismatched
/// return kinds, stack underflow, inconsistent stack depths at merge points and paths that
/// run past the last instruction.
pub fn compute_max_stack(class: &ClassDef, method: &MethodDef, body: &MethodBody) -> Result<u16> {
    let fail = |message: String| verification_error(class, Some(method), message);

    let code = &body.code;
    if code.is_empty() {
        return Err(fail("empty body".to_string()));
    }
    if body.max_locals < method.argument_slots() {
        return Err(fail(format!(
            "max_locals {} is smaller than the {} argument slots",
            body.max_locals,
            method.argument_slots()
        )));
    }

    let returns_value = method.signature.returns_value();
    for (pc, instruction) in code.iter().enumerate() {
        match instruction {
            Instruction::Load(index) | Instruction::Store(index) if *index >= body.max_locals => {
                return Err(fail(format!(
                    "local {index} at {pc} is out of range (max_locals {})",
                    body.max_locals
                )));
            }
            Instruction::Return if returns_value => {
                return Err(fail(format!("return without value at {pc}")));
            }
            Instruction::ReturnValue if !returns_value => {
                return Err(fail(format!("return with value at {pc} in a void method")));
            }
            _ => {}
        }

        if let Some(target) = instruction.branch_target() {
            if target as usize >= code.len() {
                return Err(fail(format!("branch at {pc} targets {target} past the end")));
            }
        }
    }

    let mut depths: Vec<Option<usize>> = vec![None; code.len()];
    let mut worklist = vec![0usize];
    depths[0] = Some(0);
    let mut max_depth = 0usize;

    while let Some(pc) = worklist.pop() {
        let Some(depth) = depths[pc] else {
            continue;
        };
        let instruction = &code[pc];

        let (pops, pushes) = instruction.stack_effect();
        if depth < pops {
            return Err(fail(format!(
                "stack underflow at {pc}: {instruction} needs {pops}, has {depth}"
            )));
        }
        let after = depth - pops + pushes;
        max_depth = max_depth.max(after);

        let mut successors = Vec::with_capacity(2);
        if instruction.falls_through() {
            if pc + 1 >= code.len() {
                return Err(fail(format!("execution falls off the end after {pc}")));
            }
            successors.push(pc + 1);
        }
        if matches!(
            instruction.flow_type(),
            FlowType::UnconditionalBranch | FlowType::ConditionalBranch
        ) {
            if let Some(target) = instruction.branch_target() {
                successors.push(target as usize);
            }
        }

        for next in successors {
            match depths[next] {
                None => {
                    depths[next] = Some(after);
                    worklist.push(next);
                }
                Some(existing) if existing != after => {
                    return Err(fail(format!(
                        "inconsistent stack depth at {next}: {existing} vs {after}"
                    )));
                }
                Some(_) => {}
            }
        }
    }

    u16::try_from(max_depth).map_err(|_| fail(format!("stack depth {max_depth} too large")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::ClassFlags,
        signatures::{MethodSignature, TypeSignature},
        test::factories::counter_class,
    };

    fn single_method(signature: MethodSignature, code: Vec<Instruction>) -> ClassDef {
        let mut class = ClassDef::new("pkg.V", ClassFlags::PUBLIC);
        class.methods.push(MethodDef::new(MemberFlags::STATIC, "m", signature, code));
        class
    }

    fn int_method(code: Vec<Instruction>) -> ClassDef {
        single_method(MethodSignature::new(vec![TypeSignature::Int], TypeSignature::Int), code)
    }

    fn message(result: Result<()>) -> String {
        match result {
            Err(Error::Verification { message, .. }) => message,
            other => panic!("expected verification error, got {other:?}"),
        }
    }

    #[test]
    fn counter_verifies_after_update() {
        let mut class = counter_class();
        update_max_stack(&mut class).unwrap();
        verify_class(&class).unwrap();
    }

    #[test]
    fn computes_depth_over_branches() {
        let mut class = int_method(vec![
            Instruction::Load(0),
            Instruction::JumpIfZero(5),
            Instruction::int(1),
            Instruction::int(2),
            Instruction::Add,
            Instruction::int(7),
            Instruction::ReturnValue,
        ]);
        // fallthrough reaches 5 with one value, the branch with none
        assert!(message(update_max_stack(&mut class)).contains("inconsistent"));

        let mut class = int_method(vec![
            Instruction::Load(0),
            Instruction::JumpIfZero(4),
            Instruction::int(1),
            Instruction::ReturnValue,
            Instruction::int(2),
            Instruction::int(3),
            Instruction::Add,
            Instruction::ReturnValue,
        ]);
        update_max_stack(&mut class).unwrap();
        assert_eq!(class.methods[0].body.as_ref().unwrap().max_stack, 2);
        verify_class(&class).unwrap();
    }

    #[test]
    fn declared_max_stack_must_cover() {
        let class = int_method(vec![Instruction::int(1), Instruction::ReturnValue]);
        assert!(message(verify_class(&class)).contains("max_stack"));
    }

    #[test]
    fn structural_errors() {
        let class = int_method(vec![Instruction::Add, Instruction::ReturnValue]);
        assert!(message(verify_class(&class)).contains("underflow"));

        let class = int_method(vec![Instruction::Load(0), Instruction::Pop]);
        assert!(message(verify_class(&class)).contains("falls off"));

        let class = int_method(vec![Instruction::Load(1), Instruction::ReturnValue]);
        assert!(message(verify_class(&class)).contains("out of range"));

        let class = int_method(vec![Instruction::Jump(9)]);
        assert!(message(verify_class(&class)).contains("past the end"));

        let class = int_method(vec![Instruction::Return]);
        assert!(message(verify_class(&class)).contains("without value"));

        let class = single_method(
            MethodSignature::void(),
            vec![Instruction::int(1), Instruction::ReturnValue],
        );
        assert!(message(verify_class(&class)).contains("void"));
    }

    #[test]
    fn class_level_errors() {
        let mut class = counter_class();
        let duplicate = class.methods[0].clone();
        class.methods.push(duplicate);
        assert!(message(verify_class(&class)).contains("duplicate method"));

        let mut class = ClassDef::new("pkg.V", ClassFlags::PUBLIC);
        class.methods.push(MethodDef::bodiless(
            MemberFlags::ABSTRACT,
            "m",
            MethodSignature::void(),
        ));
        assert!(message(verify_class(&class)).contains("concrete class"));

        class.flags |= ClassFlags::ABSTRACT;
        verify_class(&class).unwrap();

        class.methods[0].flags = MemberFlags::PUBLIC;
        assert!(message(verify_class(&class)).contains("no body"));
    }
}
