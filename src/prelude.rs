//! # typepatch Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! of the typepatch library. Import it to get quick access to everything a typical patch
//! needs: the engine, the pool, the reference runtime and the redefinition bridge.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all typepatch operations
pub use crate::Error;

/// The result type used throughout typepatch
pub use crate::Result;

// ================================================================================================
// Patching
// ================================================================================================

/// Patch pipeline entry point and patch descriptions
pub use crate::patch::{ParamSpec, PatchEngine, PatchSpec, ResolvedMethod};

// ================================================================================================
// Type Pool
// ================================================================================================

/// The pool of mutable types and its classpath sources
pub use crate::pool::{ClassPath, DirClassPath, MemoryClassPath, MethodId, MutableType, TypePool};

// ================================================================================================
// Runtime and Redefinition
// ================================================================================================

/// The reference runtime and the host seam the engine talks to
pub use crate::runtime::{ClassHandle, HostRuntime, Value, Vm, VmConfig};

/// Lazy attach and batched live redefinition
pub use crate::instrument::{
    Attacher, Instrumentation, RedefinitionBridge, RedefinitionUnit, SelfAttach,
};

// ================================================================================================
// Types and Code
// ================================================================================================

/// Type names, descriptors and reflected types
pub use crate::signatures::{MethodSignature, TypeSignature};
pub use crate::typesystem::{PrimitiveKind, TypeRef};

/// Instructions used when editing method bodies
pub use crate::classfile::Instruction;
