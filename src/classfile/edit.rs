//! In-place editing of method bodies.
//!
//! Snippets handed to the editing methods are ordinary instruction sequences whose branch
//! targets are relative to the snippet itself. A target equal to the snippet's length means
//! "continue after the snippet". Both the snippet and the original code are relocated when
//! they are spliced together, and branches of the original code that pointed at an
//! instruction which received an expansion now point at the start of that expansion.

use crate::{
    classfile::{Instruction, MethodBody},
    Result,
};

fn check_snippet(snippet: &[Instruction]) -> Result<()> {
    for (index, instruction) in snippet.iter().enumerate() {
        if let Some(target) = instruction.branch_target() {
            if target as usize > snippet.len() {
                return Err(malformed_error!(
                    "Snippet branch at {} targets {} beyond the snippet length {}",
                    index,
                    target,
                    snippet.len()
                ));
            }
        }
    }
    Ok(())
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| malformed_error!("Body of {} instructions is too long", value))
}

/// Appends `snippet` to `out`, shifting its branch targets by `base`.
fn push_relocated(out: &mut Vec<Instruction>, snippet: &[Instruction], base: u32) {
    for instruction in snippet {
        let mut instruction = instruction.clone();
        if let Some(target) = instruction.branch_target_mut() {
            *target += base;
        }
        out.push(instruction);
    }
}

impl MethodBody {
    /// Runs `snippet` at method entry, before the original code.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a snippet branch points past the snippet.
    pub fn insert_before(&mut self, snippet: &[Instruction]) -> Result<()> {
        check_snippet(snippet)?;
        let shift = to_u32(snippet.len())?;
        to_u32(snippet.len() + self.code.len())?;

        let mut code = Vec::with_capacity(snippet.len() + self.code.len());
        push_relocated(&mut code, snippet, 0);
        push_relocated(&mut code, &self.code, shift);

        self.code = code;
        Ok(())
    }

    /// Runs `snippet` whenever the method returns normally.
    ///
    /// The snippet is placed in front of every return instruction. A returned value is
    /// spilled to a fresh local slot around the snippet, so the snippet starts and ends with
    /// the operand stack the return saw, minus that value.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a snippet branch points past the snippet or the
    /// body runs out of local slots.
    pub fn insert_after(&mut self, snippet: &[Instruction]) -> Result<()> {
        check_snippet(snippet)?;

        let needs_spill = self
            .code
            .iter()
            .any(|instruction| matches!(instruction, Instruction::ReturnValue));
        let spill = self.max_locals;
        if needs_spill && spill == u16::MAX {
            return Err(malformed_error!("No local slot left to spill the return value"));
        }

        let expansion_len = |instruction: &Instruction| match instruction {
            Instruction::Return => snippet.len() + 1,
            Instruction::ReturnValue => snippet.len() + 3,
            _ => 1,
        };

        let mut starts = Vec::with_capacity(self.code.len());
        let mut next = 0usize;
        for instruction in &self.code {
            starts.push(to_u32(next)?);
            next += expansion_len(instruction);
        }
        to_u32(next)?;

        let mut code = Vec::with_capacity(next);
        for (index, instruction) in self.code.iter().enumerate() {
            let start = starts[index];
            match instruction {
                Instruction::Return => {
                    push_relocated(&mut code, snippet, start);
                    code.push(Instruction::Return);
                }
                Instruction::ReturnValue => {
                    code.push(Instruction::Store(spill));
                    push_relocated(&mut code, snippet, start + 1);
                    code.push(Instruction::Load(spill));
                    code.push(Instruction::ReturnValue);
                }
                other => {
                    let mut relocated = other.clone();
                    if let Some(target) = relocated.branch_target_mut() {
                        let Some(mapped) = starts.get(*target as usize) else {
                            return Err(malformed_error!(
                                "Branch at {} targets {} past the end",
                                index,
                                target
                            ));
                        };
                        *target = *mapped;
                    }
                    code.push(relocated);
                }
            }
        }

        self.code = code;
        if needs_spill {
            self.max_locals = spill + 1;
        }
        Ok(())
    }

    /// Replaces the whole code with `code`; branch targets are taken as they are.
    ///
    /// `max_stack` is reset and recomputed when the class is finalized.
    pub fn replace(&mut self, code: Vec<Instruction>) {
        self.code = code;
        self.max_stack = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: Vec<Instruction>) -> MethodBody {
        MethodBody::new(1, code)
    }

    #[test]
    fn before_shifts_original_branches() {
        let mut body = body(vec![
            Instruction::Load(0),
            Instruction::JumpIfZero(3),
            Instruction::Nop,
            Instruction::Return,
        ]);
        body.insert_before(&[Instruction::Nop, Instruction::Jump(2)]).unwrap();

        assert_eq!(body.code[1], Instruction::Jump(2));
        assert_eq!(body.code[3], Instruction::JumpIfZero(5));
        assert_eq!(body.code.len(), 6);
    }

    #[test]
    fn after_wraps_every_return() {
        let mut body = body(vec![
            Instruction::Load(0),
            Instruction::JumpIfZero(4),
            Instruction::int(1),
            Instruction::ReturnValue,
            Instruction::int(2),
            Instruction::ReturnValue,
        ]);
        body.insert_after(&[Instruction::Nop]).unwrap();

        assert_eq!(body.max_locals, 2);
        assert_eq!(
            body.code,
            vec![
                Instruction::Load(0),
                Instruction::JumpIfZero(7),
                Instruction::int(1),
                Instruction::Store(1),
                Instruction::Nop,
                Instruction::Load(1),
                Instruction::ReturnValue,
                Instruction::int(2),
                Instruction::Store(1),
                Instruction::Nop,
                Instruction::Load(1),
                Instruction::ReturnValue,
            ]
        );
    }

    #[test]
    fn branch_to_return_lands_on_snippet() {
        let mut body = body(vec![Instruction::Jump(1), Instruction::Return]);
        body.insert_after(&[Instruction::Nop, Instruction::Jump(2)]).unwrap();

        assert_eq!(body.max_locals, 1);
        assert_eq!(
            body.code,
            vec![
                Instruction::Jump(1),
                Instruction::Nop,
                Instruction::Jump(3),
                Instruction::Return,
            ]
        );
    }

    #[test]
    fn rejects_escaping_snippet_branch() {
        let mut body = body(vec![Instruction::Return]);
        assert!(body.insert_before(&[Instruction::Jump(2)]).is_err());
        assert!(body.insert_after(&[Instruction::Jump(2)]).is_err());
        assert_eq!(body.code, vec![Instruction::Return]);
    }
}
