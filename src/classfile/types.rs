use bitflags::bitflags;

use crate::{
    classfile::Instruction,
    signatures::{MethodSignature, TypeSignature},
};

bitflags! {
    /// Access and property flags of a class
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClassFlags: u16 {
        /// Visible outside its package
        const PUBLIC = 0x0001;
        /// Cannot be extended
        const FINAL = 0x0010;
        /// Declares an interface
        const INTERFACE = 0x0200;
        /// Cannot be instantiated
        const ABSTRACT = 0x0400;
    }
}

bitflags! {
    /// Access and property flags of a field or method
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemberFlags: u16 {
        /// Visible everywhere
        const PUBLIC = 0x0001;
        /// Visible only inside the declaring class
        const PRIVATE = 0x0002;
        /// Visible to subclasses
        const PROTECTED = 0x0004;
        /// Belongs to the class instead of its instances
        const STATIC = 0x0008;
        /// Cannot be reassigned or overridden
        const FINAL = 0x0010;
        /// Implemented by the runtime, has no body
        const NATIVE = 0x0100;
        /// Has no implementation in this class
        const ABSTRACT = 0x0400;
    }
}

/// A field declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Access and property flags
    pub flags: MemberFlags,
    /// Field name
    pub name: String,
    /// Field type
    pub descriptor: TypeSignature,
}

impl FieldDef {
    /// Creates a new field declaration
    #[must_use]
    pub fn new(flags: MemberFlags, name: impl Into<String>, descriptor: TypeSignature) -> Self {
        FieldDef {
            flags,
            name: name.into(),
            descriptor,
        }
    }

    /// Returns `true` if the field belongs to the class
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }
}

/// The code of a concrete method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    /// Number of local variable slots, including the receiver and the arguments
    pub max_locals: u16,
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// The instructions
    pub code: Vec<Instruction>,
}

impl MethodBody {
    /// Creates a body; `max_stack` is left at zero until the class is finalized
    #[must_use]
    pub fn new(max_locals: u16, code: Vec<Instruction>) -> Self {
        MethodBody {
            max_locals,
            max_stack: 0,
            code,
        }
    }
}

/// A method declaration, with its body if the method is concrete
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// Access and property flags
    pub flags: MemberFlags,
    /// Method name
    pub name: String,
    /// Parameter and return types
    pub signature: MethodSignature,
    /// The code, absent for abstract and native methods
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// Creates a concrete method whose locals are exactly the receiver and the arguments
    #[must_use]
    pub fn new(
        flags: MemberFlags,
        name: impl Into<String>,
        signature: MethodSignature,
        code: Vec<Instruction>,
    ) -> Self {
        let mut method = MethodDef {
            flags,
            name: name.into(),
            signature,
            body: None,
        };
        method.body = Some(MethodBody::new(method.argument_slots(), code));
        method
    }

    /// Creates a method without a body
    #[must_use]
    pub fn bodiless(
        flags: MemberFlags,
        name: impl Into<String>,
        signature: MethodSignature,
    ) -> Self {
        MethodDef {
            flags,
            name: name.into(),
            signature,
            body: None,
        }
    }

    /// Returns `true` if the method has no receiver
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    /// Returns `true` if the method must not carry a body
    #[must_use]
    pub fn is_bodiless(&self) -> bool {
        self.flags
            .intersects(MemberFlags::ABSTRACT | MemberFlags::NATIVE)
    }

    /// Number of local slots taken by the receiver and the arguments
    #[must_use]
    pub fn argument_slots(&self) -> u16 {
        let receiver = u16::from(!self.is_static());
        u16::try_from(self.signature.params.len())
            .unwrap_or(u16::MAX)
            .saturating_add(receiver)
    }

    /// The method descriptor, e.g. `(I)V`
    #[must_use]
    pub fn descriptor(&self) -> String {
        self.signature.descriptor()
    }

    /// Name and descriptor, as used in error messages
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}{}", self.name, self.signature)
    }
}

/// An in-memory class: its header, fields and methods
///
/// ```rust
/// use typepatch::classfile::{ClassDef, ClassFlags, MemberFlags, MethodDef, Instruction};
/// use typepatch::signatures::{MethodSignature, TypeSignature};
///
/// let mut class = ClassDef::new("pkg.Answer", ClassFlags::PUBLIC);
/// class.methods.push(MethodDef::new(
///     MemberFlags::PUBLIC | MemberFlags::STATIC,
///     "get",
///     MethodSignature::new(vec![], TypeSignature::Int),
///     vec![Instruction::int(42), Instruction::ReturnValue],
/// ));
///
/// let bytes = class.to_bytes()?;
/// assert_eq!(ClassDef::from_bytes(&bytes)?.name, "pkg.Answer");
/// # Ok::<(), typepatch::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    /// Access and property flags
    pub flags: ClassFlags,
    /// Qualified (dotted) name
    pub name: String,
    /// Qualified name of the superclass, if any
    pub super_name: Option<String>,
    /// Declared fields
    pub fields: Vec<FieldDef>,
    /// Declared methods
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    /// Creates an empty class without a superclass
    #[must_use]
    pub fn new(name: impl Into<String>, flags: ClassFlags) -> Self {
        ClassDef {
            flags,
            name: name.into(),
            super_name: None,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Sets the superclass
    #[must_use]
    pub fn extending(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    /// Returns `true` if the class cannot be instantiated
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags
            .intersects(ClassFlags::ABSTRACT | ClassFlags::INTERFACE)
    }

    /// Finds a declared field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Finds the declared method with this name and signature
    #[must_use]
    pub fn method(&self, name: &str, signature: &MethodSignature) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.signature == *signature)
    }
}
