//! Type and method descriptor parsing and encoding.
//!
//! Descriptors are the compact textual form in which class images record field types and
//! method signatures. They are also one of the three ways a patch can pick an overloaded
//! method (see [`crate::patch::ParamSpec::ByDescriptor`]).
//!
//! # Grammar
//!
//! ```text
//! FieldType  := 'Z' | 'B' | 'C' | 'S' | 'I' | 'J' | 'F' | 'D'
//!             | 'L' binary-name ';'
//!             | '[' FieldType
//! ReturnType := FieldType | 'V'
//! Method     := '(' FieldType* ')' ReturnType
//! ```
//!
//! Binary names separate packages with `/`; everywhere else in the API qualified names are
//! dotted, so `Lpkg/Counter;` parses to `TypeSignature::Class("pkg.Counter")`.
//!
//! # Examples
//!
//! ```rust
//! use typepatch::signatures::{parse_method_descriptor, TypeSignature};
//!
//! let sig = parse_method_descriptor("(ILpkg/Counter;)J")?;
//! assert_eq!(sig.params[1], TypeSignature::class("pkg.Counter"));
//! assert_eq!(sig.return_type, TypeSignature::Long);
//! # Ok::<(), typepatch::Error>(())
//! ```

mod encoders;
mod parser;
mod types;

pub use encoders::*;
pub use parser::*;
pub use types::*;

use crate::Result;

/// Parse a method descriptor such as `(IJ)V`
///
/// # Errors
/// Returns an error if the descriptor is malformed
pub fn parse_method_descriptor(descriptor: &str) -> Result<MethodSignature> {
    let mut parser = DescriptorParser::new(descriptor);
    parser.parse_method_descriptor()
}

/// Parse a single field type descriptor such as `[Lpkg/Counter;`
///
/// # Errors
/// Returns an error if the descriptor is malformed or has trailing characters
pub fn parse_type_descriptor(descriptor: &str) -> Result<TypeSignature> {
    let mut parser = DescriptorParser::new(descriptor);
    let signature = parser.parse_field_type()?;
    parser.expect_end()?;
    Ok(signature)
}
