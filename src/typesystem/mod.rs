//! Type names, primitive kinds and reflected type references.
//!
//! # Key Components
//!
//! - [`PrimitiveKind`] - The primitive value types with their source spellings
//! - [`TypeRef`] - A reflected type taken from the running runtime
//! - [`resolve_type_names`] / [`resolve_type_refs`] - Turn parameter specifications into
//!   [`crate::signatures::TypeSignature`] handles, checking class names against a
//!   [`crate::pool::TypePool`]

mod primitives;
mod typeref;

pub use primitives::PrimitiveKind;
pub use typeref::{
    parse_type_name, resolve_type_name, resolve_type_names, resolve_type_ref,
    resolve_type_refs, TypeRef,
};
