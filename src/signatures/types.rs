use std::fmt;

use crate::signatures::{encode_method_descriptor, encode_type_descriptor};

/// Represents a parsed type in descriptors and member signatures
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSignature {
    /// void, only valid as a return type
    Void,
    /// boolean
    Boolean,
    /// signed 8bit integer
    Byte,
    /// 16bit character
    Char,
    /// signed 16bit integer
    Short,
    /// signed 32bit integer
    Int,
    /// signed 64bit integer
    Long,
    /// 32bit floating-point
    Float,
    /// 64bit floating-point
    Double,
    /// Reference to a class, by qualified (dotted) name
    Class(String),
    /// Single dimension array of the element type
    Array(Box<TypeSignature>),
}

impl TypeSignature {
    /// Creates a class reference from a qualified name
    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        TypeSignature::Class(name.into())
    }

    /// Creates an array type with `element` as its element type
    #[must_use]
    pub fn array_of(element: TypeSignature) -> Self {
        TypeSignature::Array(Box::new(element))
    }

    /// Returns `true` for the eight primitive value types
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            TypeSignature::Void | TypeSignature::Class(_) | TypeSignature::Array(_)
        )
    }

    /// Returns `true` for class and array types
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, TypeSignature::Class(_) | TypeSignature::Array(_))
    }

    /// Returns `true` for [`TypeSignature::Void`]
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, TypeSignature::Void)
    }

    /// The qualified name of the class at the bottom of this type, if any
    ///
    /// For `pkg.Counter[][]` this is `pkg.Counter`; primitive types and arrays of
    /// primitives have none.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            TypeSignature::Class(name) => Some(name),
            TypeSignature::Array(element) => element.class_name(),
            _ => None,
        }
    }

    /// Encodes this type as a descriptor string (`I`, `Lpkg/Counter;`, `[J`, ...)
    #[must_use]
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        encode_type_descriptor(self, &mut out);
        out
    }
}

/// Formats the type the way it is written in source: `int`, `pkg.Counter`, `long[]`.
impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSignature::Void => f.write_str("void"),
            TypeSignature::Boolean => f.write_str("boolean"),
            TypeSignature::Byte => f.write_str("byte"),
            TypeSignature::Char => f.write_str("char"),
            TypeSignature::Short => f.write_str("short"),
            TypeSignature::Int => f.write_str("int"),
            TypeSignature::Long => f.write_str("long"),
            TypeSignature::Float => f.write_str("float"),
            TypeSignature::Double => f.write_str("double"),
            TypeSignature::Class(name) => f.write_str(name),
            TypeSignature::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// Represents a method signature: parameter types and the return type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// The parameters of this method, excluding the implicit receiver
    pub params: Vec<TypeSignature>,
    /// The return type of this method
    pub return_type: TypeSignature,
}

impl MethodSignature {
    /// Creates a new method signature
    #[must_use]
    pub fn new(params: Vec<TypeSignature>, return_type: TypeSignature) -> Self {
        MethodSignature {
            params,
            return_type,
        }
    }

    /// `()V` - no parameters, no return value
    #[must_use]
    pub fn void() -> Self {
        MethodSignature::new(Vec::new(), TypeSignature::Void)
    }

    /// Returns `true` if the method leaves a value on the caller's stack
    #[must_use]
    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }

    /// Encodes this signature as a method descriptor string, e.g. `(ILpkg/Counter;)V`
    #[must_use]
    pub fn descriptor(&self) -> String {
        encode_method_descriptor(self)
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}
