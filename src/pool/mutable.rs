//! Editable class records held by the [`crate::pool::TypePool`].

use std::{
    fmt,
    sync::{Arc, RwLock},
};

use crate::{
    classfile::{
        encode_class, update_max_stack, verify_class, ClassDef, FieldDef, Instruction,
        MemberFlags, MethodBody, MethodDef,
    },
    signatures::{parse_method_descriptor, TypeSignature},
    Error, Result,
};

/// A shared, lockable [`MutableType`] as handed out by the pool
pub type MutableTypeRc = Arc<RwLock<MutableType>>;

/// Index of a declared method of a [`MutableType`].
///
/// Ids stay valid while methods are only added; they are handed to transformations
/// through [`crate::patch::ResolvedMethod::Method`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(usize);

impl MethodId {
    /// Position in [`MutableType::methods`]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An editable class.
///
/// A `MutableType` wraps a [`ClassDef`] with a frozen flag. Finalizing it with
/// [`MutableType::to_bytecode`] freezes it, after which structural edits fail with
/// [`Error::Frozen`] until [`MutableType::thaw`] is called.
#[derive(Debug, Clone)]
pub struct MutableType {
    class: ClassDef,
    frozen: bool,
}

impl MutableType {
    /// Wraps `class` in a thawed record
    #[must_use]
    pub fn new(class: ClassDef) -> Self {
        MutableType {
            class,
            frozen: false,
        }
    }

    /// Qualified name of the class
    #[must_use]
    pub fn name(&self) -> &str {
        &self.class.name
    }

    /// The current class definition
    #[must_use]
    pub fn class(&self) -> &ClassDef {
        &self.class
    }

    /// Returns `true` once the type was finalized and not thawed since
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Allows structural edits again; thawing a thawed type does nothing
    pub fn thaw(&mut self) {
        self.frozen = false;
    }

    /// Declared fields
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.class.fields
    }

    /// Declared methods, indexed by [`MethodId`]
    #[must_use]
    pub fn methods(&self) -> &[MethodDef] {
        &self.class.methods
    }

    /// The declared method with this id
    #[must_use]
    pub fn method(&self, id: MethodId) -> Option<&MethodDef> {
        self.class.methods.get(id.0)
    }

    /// Ids of all declared methods
    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> + '_ {
        (0..self.class.methods.len()).map(MethodId)
    }

    fn no_such_method(&self, name: &str, descriptor: String) -> Error {
        Error::NoSuchMethod {
            class: self.class.name.clone(),
            name: name.to_string(),
            descriptor,
        }
    }

    /// Finds the declared method with `name` and exactly these parameter types.
    ///
    /// Inherited methods are not considered. The return type is not part of the match,
    /// so overloads that differ only in their return type are rejected as ambiguous.
    ///
    /// # Errors
    /// Returns [`Error::NoSuchMethod`] if no declared method matches and
    /// [`Error::AmbiguousMethod`] if more than one does.
    pub fn declared_method(&self, name: &str, params: &[TypeSignature]) -> Result<MethodId> {
        let matches: Vec<usize> = self
            .class
            .methods
            .iter()
            .enumerate()
            .filter(|(_, method)| method.name == name && method.signature.params == params)
            .map(|(index, _)| index)
            .collect();

        let listed: Vec<String> = params.iter().map(ToString::to_string).collect();
        let listed = format!("({})", listed.join(", "));
        match matches.as_slice() {
            [index] => Ok(MethodId(*index)),
            [] => Err(self.no_such_method(name, listed)),
            _ => Err(Error::AmbiguousMethod {
                class: self.class.name.clone(),
                name: name.to_string(),
                params: listed,
                candidates: matches
                    .iter()
                    .map(|index| self.class.methods[*index].descriptor())
                    .collect(),
            }),
        }
    }

    /// Finds the declared method with `name` and exactly this descriptor.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if `descriptor` does not parse and
    /// [`Error::NoSuchMethod`] if no declared method matches.
    pub fn declared_method_by_descriptor(&self, name: &str, descriptor: &str) -> Result<MethodId> {
        let signature = parse_method_descriptor(descriptor)?;
        self.class
            .methods
            .iter()
            .position(|method| method.name == name && method.signature == signature)
            .map(MethodId)
            .ok_or_else(|| self.no_such_method(name, descriptor.to_string()))
    }

    fn ensure_thawed(&self) -> Result<()> {
        if self.frozen {
            return Err(Error::Frozen(self.class.name.clone()));
        }
        Ok(())
    }

    fn method_mut(&mut self, id: MethodId) -> Result<&mut MethodDef> {
        self.ensure_thawed()?;
        let class = self.class.name.clone();
        self.class
            .methods
            .get_mut(id.0)
            .ok_or_else(|| Error::NoSuchMethod {
                class,
                name: id.to_string(),
                descriptor: String::new(),
            })
    }

    /// Mutable access to the body of a concrete method.
    ///
    /// # Errors
    /// Returns [`Error::Frozen`] on a frozen type and [`Error::NoSuchMethod`] if the
    /// method does not exist or has no body.
    pub fn body_mut(&mut self, id: MethodId) -> Result<&mut MethodBody> {
        let class = self.class.name.clone();
        let method = self.method_mut(id)?;
        let display = method.display_name();
        method.body.as_mut().ok_or_else(|| Error::NoSuchMethod {
            class,
            name: display,
            descriptor: " (no body)".to_string(),
        })
    }

    /// Declares a new field.
    ///
    /// # Errors
    /// Returns [`Error::Frozen`] on a frozen type and [`Error::DuplicateMember`] if a
    /// field with this name exists.
    pub fn add_field(&mut self, field: FieldDef) -> Result<()> {
        self.ensure_thawed()?;
        if self.class.field(&field.name).is_some() {
            return Err(Error::DuplicateMember {
                class: self.class.name.clone(),
                member: field.name,
            });
        }
        self.class.fields.push(field);
        Ok(())
    }

    /// Declares a new method and returns its id.
    ///
    /// # Errors
    /// Returns [`Error::Frozen`] on a frozen type and [`Error::DuplicateMember`] if a
    /// method with the same name and signature exists.
    pub fn add_method(&mut self, method: MethodDef) -> Result<MethodId> {
        self.ensure_thawed()?;
        if self.class.method(&method.name, &method.signature).is_some() {
            return Err(Error::DuplicateMember {
                class: self.class.name.clone(),
                member: method.display_name(),
            });
        }
        self.class.methods.push(method);
        Ok(MethodId(self.class.methods.len() - 1))
    }

    /// Runs `snippet` at the entry of the method.
    ///
    /// # Errors
    /// See [`MutableType::body_mut`] and [`MethodBody::insert_before`].
    pub fn insert_before(&mut self, id: MethodId, snippet: &[Instruction]) -> Result<()> {
        self.body_mut(id)?.insert_before(snippet)
    }

    /// Runs `snippet` whenever the method returns normally.
    ///
    /// # Errors
    /// See [`MutableType::body_mut`] and [`MethodBody::insert_after`].
    pub fn insert_after(&mut self, id: MethodId, snippet: &[Instruction]) -> Result<()> {
        self.body_mut(id)?.insert_after(snippet)
    }

    /// Replaces the code of the method, giving bodiless methods a body.
    ///
    /// Existing local slots are kept; a new body gets exactly the argument slots.
    ///
    /// # Errors
    /// Returns [`Error::Frozen`] on a frozen type and [`Error::NoSuchMethod`] if the
    /// method does not exist.
    pub fn set_body(&mut self, id: MethodId, code: Vec<Instruction>) -> Result<()> {
        let method = self.method_mut(id)?;
        if let Some(body) = method.body.as_mut() {
            body.replace(code);
        } else {
            method.body = Some(MethodBody::new(method.argument_slots(), code));
        }
        Ok(())
    }

    /// Replaces the flags of the method.
    ///
    /// # Errors
    /// Returns [`Error::Frozen`] on a frozen type and [`Error::NoSuchMethod`] if the
    /// method does not exist.
    pub fn set_method_flags(&mut self, id: MethodId, flags: MemberFlags) -> Result<()> {
        self.method_mut(id)?.flags = flags;
        Ok(())
    }

    /// Finalizes the type into a class image and freezes it.
    ///
    /// Stack depths are recomputed before the class is verified, so edits never need to
    /// maintain `max_stack` themselves.
    ///
    /// # Errors
    /// Returns [`Error::Verification`] if the class is structurally invalid, or an encoding
    /// error. The type stays thawed on failure.
    pub fn to_bytecode(&mut self) -> Result<Vec<u8>> {
        update_max_stack(&mut self.class)?;
        verify_class(&self.class)?;
        let bytes = encode_class(&self.class)?;
        self.frozen = true;
        Ok(bytes)
    }

    pub(crate) fn snapshot(&self) -> ClassDef {
        self.class.clone()
    }

    pub(crate) fn restore(&mut self, class: ClassDef) {
        self.class = class;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{signatures::MethodSignature, test::factories::counter_class};

    #[test]
    fn lookups() {
        let ty = MutableType::new(counter_class());

        let increment = ty.declared_method("increment", &[]).unwrap();
        assert_eq!(ty.method(increment).unwrap().name, "increment");

        let add = ty.declared_method("add", &[TypeSignature::Int]).unwrap();
        assert_eq!(ty.declared_method_by_descriptor("add", "(I)V").unwrap(), add);

        assert!(matches!(
            ty.declared_method("add", &[TypeSignature::Long]),
            Err(Error::NoSuchMethod { .. })
        ));
        assert!(matches!(
            ty.declared_method_by_descriptor("add", "(I"),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn freeze_and_thaw() {
        let mut ty = MutableType::new(counter_class());
        let first = ty.to_bytecode().unwrap();
        assert!(ty.is_frozen());

        let id = ty.declared_method("increment", &[]).unwrap();
        assert!(matches!(
            ty.insert_before(id, &[Instruction::Nop]),
            Err(Error::Frozen(name)) if name == "pkg.Counter"
        ));

        ty.thaw();
        ty.thaw();
        assert!(!ty.is_frozen());
        assert_eq!(ty.to_bytecode().unwrap(), first);
    }

    #[test]
    fn member_edits() {
        let mut ty = MutableType::new(counter_class());

        let dup = ty.add_field(FieldDef::new(MemberFlags::PRIVATE, "count", TypeSignature::Int));
        assert!(matches!(dup, Err(Error::DuplicateMember { .. })));

        let id = ty
            .add_method(MethodDef::new(
                MemberFlags::PUBLIC,
                "twice",
                MethodSignature::new(vec![], TypeSignature::Int),
                vec![Instruction::int(2), Instruction::ReturnValue],
            ))
            .unwrap();
        assert_eq!(id.index(), ty.methods().len() - 1);

        ty.set_body(id, vec![Instruction::int(4), Instruction::ReturnValue])
            .unwrap();
        ty.set_method_flags(id, MemberFlags::PUBLIC | MemberFlags::FINAL)
            .unwrap();
        ty.to_bytecode().unwrap();
    }

    #[test]
    fn failed_finalize_stays_thawed() {
        let mut ty = MutableType::new(counter_class());
        let id = ty.declared_method("increment", &[]).unwrap();
        ty.set_body(id, vec![Instruction::Pop, Instruction::Return]).unwrap();

        assert!(matches!(ty.to_bytecode(), Err(Error::Verification { .. })));
        assert!(!ty.is_frozen());
    }

    #[test]
    fn overloads_by_return_type_are_ambiguous() {
        let mut ty = MutableType::new(counter_class());
        let widened = ty
            .add_method(MethodDef::new(
                MemberFlags::PUBLIC,
                "add",
                MethodSignature::new(vec![TypeSignature::Int], TypeSignature::Int),
                vec![Instruction::Load(1), Instruction::ReturnValue],
            ))
            .unwrap();

        match ty.declared_method("add", &[TypeSignature::Int]) {
            Err(Error::AmbiguousMethod { candidates, .. }) => {
                assert_eq!(candidates, ["(I)V", "(I)I"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ty.declared_method_by_descriptor("add", "(I)I").unwrap(), widened);
    }
}
