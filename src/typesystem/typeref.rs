//! Resolution of parameter type specifications into signature handles.
//!
//! A patch can describe the parameter list of an overloaded method either by qualified
//! type names or by reflected types taken from the running runtime. Both forms are
//! resolved here into [`TypeSignature`] handles that can be compared against the declared
//! signatures of a [`crate::pool::MutableType`].
//!
//! Class types are looked up in the [`TypePool`] during resolution, so a misspelled class
//! name fails with [`crate::Error::TypeNotFound`] instead of silently matching nothing.

use std::{fmt, str::FromStr};

use crate::{
    pool::TypePool, runtime::ClassHandle, signatures::TypeSignature,
    typesystem::PrimitiveKind, Result,
};

/// A reflected type, as obtained from the running runtime.
#[derive(Clone, Debug)]
pub enum TypeRef {
    /// A primitive value type
    Primitive(PrimitiveKind),
    /// A class loaded in the runtime
    Class(ClassHandle),
    /// An array of the element type
    Array(Box<TypeRef>),
}

impl TypeRef {
    /// Reflected reference to a loaded class
    #[must_use]
    pub fn class(handle: &ClassHandle) -> Self {
        TypeRef::Class(handle.clone())
    }

    /// Reflected array type
    #[must_use]
    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }
}

impl From<PrimitiveKind> for TypeRef {
    fn from(kind: PrimitiveKind) -> Self {
        TypeRef::Primitive(kind)
    }
}

impl From<&ClassHandle> for TypeRef {
    fn from(handle: &ClassHandle) -> Self {
        TypeRef::Class(handle.clone())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(kind) => write!(f, "{kind}"),
            TypeRef::Class(handle) => f.write_str(handle.name()),
            TypeRef::Array(element) => write!(f, "{element}[]"),
        }
    }
}

fn is_valid_qualified_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && !segment
                    .chars()
                    .any(|c| c.is_whitespace() || matches!(c, ';' | '[' | ']' | '/' | '(' | ')'))
        })
}

/// Parses a type name as written in source (`int`, `pkg.Counter`, `long[][]`).
///
/// This is purely syntactic; class names are not looked up.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for empty names, `void`, or names containing
/// descriptor punctuation.
pub fn parse_type_name(name: &str) -> Result<TypeSignature> {
    let name = name.trim();
    if let Some(element) = name.strip_suffix("[]") {
        return Ok(TypeSignature::array_of(parse_type_name(element)?));
    }

    if let Ok(kind) = PrimitiveKind::from_str(name) {
        return Ok(kind.signature());
    }

    if name == "void" || !is_valid_qualified_name(name) {
        return Err(malformed_error!("Invalid parameter type name '{}'", name));
    }

    Ok(TypeSignature::class(name))
}

fn ensure_class_known(pool: &TypePool, signature: &TypeSignature) -> Result<()> {
    if let Some(class_name) = signature.class_name() {
        pool.get(class_name)?;
    }
    Ok(())
}

/// Resolves a qualified type name against `pool`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for syntactically invalid names and
/// [`crate::Error::TypeNotFound`] if a class name is unknown to the pool.
pub fn resolve_type_name(pool: &TypePool, name: &str) -> Result<TypeSignature> {
    let signature = parse_type_name(name)?;
    ensure_class_known(pool, &signature)?;
    Ok(signature)
}

/// Resolves a reflected type against `pool`.
///
/// # Errors
/// Returns [`crate::Error::TypeNotFound`] if the reflected class is unknown to the pool.
pub fn resolve_type_ref(pool: &TypePool, type_ref: &TypeRef) -> Result<TypeSignature> {
    let signature = type_ref_signature(type_ref);
    ensure_class_known(pool, &signature)?;
    Ok(signature)
}

fn type_ref_signature(type_ref: &TypeRef) -> TypeSignature {
    match type_ref {
        TypeRef::Primitive(kind) => kind.signature(),
        TypeRef::Class(handle) => TypeSignature::class(handle.name()),
        TypeRef::Array(element) => TypeSignature::array_of(type_ref_signature(element)),
    }
}

/// Resolves every name of a parameter list, stopping at the first failure.
///
/// # Errors
/// See [`resolve_type_name`].
pub fn resolve_type_names<S: AsRef<str>>(
    pool: &TypePool,
    names: &[S],
) -> Result<Vec<TypeSignature>> {
    names
        .iter()
        .map(|name| resolve_type_name(pool, name.as_ref()))
        .collect()
}

/// Resolves every reflected type of a parameter list, stopping at the first failure.
///
/// # Errors
/// See [`resolve_type_ref`].
pub fn resolve_type_refs(pool: &TypePool, refs: &[TypeRef]) -> Result<Vec<TypeSignature>> {
    refs.iter()
        .map(|type_ref| resolve_type_ref(pool, type_ref))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::factories::counter_pool, Error};

    #[test]
    fn parse_names() {
        assert_eq!(parse_type_name("int").unwrap(), TypeSignature::Int);
        assert_eq!(
            parse_type_name("pkg.Counter[][]").unwrap(),
            TypeSignature::array_of(TypeSignature::array_of(TypeSignature::class(
                "pkg.Counter"
            )))
        );
        assert_eq!(
            parse_type_name(" long[] ").unwrap(),
            TypeSignature::array_of(TypeSignature::Long)
        );

        for bad in ["", "void", "[]", "pkg..Counter", "Lpkg/Counter;", "a b"] {
            assert!(parse_type_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn resolve_checks_pool() {
        let pool = counter_pool();

        let resolved =
            resolve_type_names(&pool, &["int", "pkg.Counter", "pkg.Counter[]"]).unwrap();
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[1], TypeSignature::class("pkg.Counter"));

        let err = resolve_type_names(&pool, &["int", "pkg.Missing"]).unwrap_err();
        assert!(matches!(err, Error::TypeNotFound(name) if name == "pkg.Missing"));
    }

    #[test]
    fn resolve_primitive_refs() {
        let pool = counter_pool();
        let refs = [
            TypeRef::from(PrimitiveKind::Int),
            TypeRef::array_of(PrimitiveKind::Long.into()),
        ];

        let resolved = resolve_type_refs(&pool, &refs).unwrap();
        assert_eq!(
            resolved,
            vec![
                TypeSignature::Int,
                TypeSignature::array_of(TypeSignature::Long)
            ]
        );
        assert_eq!(refs[1].to_string(), "long[]");
    }
}
