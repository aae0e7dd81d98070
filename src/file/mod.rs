//! Binary input/output primitives for class images.
//!
//! - [`crate::file::parser::Parser`] - Cursor-based, bounds-checked reader
//! - [`crate::file::io`] - Little-endian conversions and append-style writers

pub mod io;
pub mod parser;
