use strum::{Display, EnumIter, EnumString};

use crate::signatures::TypeSignature;

/// The primitive value types, named as they are written in source.
///
/// `PrimitiveKind` parses from and displays as the source spelling, which is how
/// [`crate::patch::ParamSpec::ByName`] parameter lists refer to primitives.
///
/// ```rust
/// use std::str::FromStr;
/// use typepatch::typesystem::PrimitiveKind;
///
/// assert_eq!(PrimitiveKind::from_str("long").unwrap(), PrimitiveKind::Long);
/// assert_eq!(PrimitiveKind::Boolean.to_string(), "boolean");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum PrimitiveKind {
    /// `boolean`
    #[strum(serialize = "boolean")]
    Boolean,
    /// `byte`
    #[strum(serialize = "byte")]
    Byte,
    /// `char`
    #[strum(serialize = "char")]
    Char,
    /// `short`
    #[strum(serialize = "short")]
    Short,
    /// `int`
    #[strum(serialize = "int")]
    Int,
    /// `long`
    #[strum(serialize = "long")]
    Long,
    /// `float`
    #[strum(serialize = "float")]
    Float,
    /// `double`
    #[strum(serialize = "double")]
    Double,
}

impl PrimitiveKind {
    /// The signature handle of this primitive
    #[must_use]
    pub fn signature(self) -> TypeSignature {
        match self {
            PrimitiveKind::Boolean => TypeSignature::Boolean,
            PrimitiveKind::Byte => TypeSignature::Byte,
            PrimitiveKind::Char => TypeSignature::Char,
            PrimitiveKind::Short => TypeSignature::Short,
            PrimitiveKind::Int => TypeSignature::Int,
            PrimitiveKind::Long => TypeSignature::Long,
            PrimitiveKind::Float => TypeSignature::Float,
            PrimitiveKind::Double => TypeSignature::Double,
        }
    }
}
