//! The registry of editable types and the classpath sources that populate it.
//!
//! # Key Components
//!
//! - [`TypePool`] - Memoizing name => [`MutableType`] registry
//! - [`MutableType`] - An editable class with freeze/thaw semantics
//! - [`MethodId`] - Index of a declared method of a [`MutableType`]
//! - [`ClassPath`] - Source of raw class images, with [`MemoryClassPath`] and
//!   [`DirClassPath`] implementations

mod classpath;
mod mutable;
mod registry;

pub use classpath::{ClassPath, DirClassPath, MemoryClassPath, CLASS_FILE_EXTENSION};
pub use mutable::{MethodId, MutableType, MutableTypeRc};
pub use registry::TypePool;
