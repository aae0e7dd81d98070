//! The host runtime interface and a reference runtime implementing it.
//!
//! The patch pipeline talks to the runtime it patches only through [`HostRuntime`]: it
//! defines new classes from bytes and looks up classes that are already loaded. Live
//! redefinition goes through [`crate::instrument`] instead.
//!
//! [`Vm`] is a complete, small stack machine that implements the interface. It is what the
//! crate's tests run patched code on, and what [`crate::instrument::SelfAttach`] attaches to.
//!
//! # Key Components
//!
//! - [`HostRuntime`] - What the patch engine needs from a runtime
//! - [`Vm`] - The reference runtime
//! - [`ClassHandle`] - A loaded class
//! - [`Value`], [`ObjectRef`] - Runtime values
//! - [`VmConfig`], [`ExecutionLimits`] - Configuration
//! - [`VmError`] - Runtime failures

mod class;
mod config;
mod interpreter;
mod value;
mod vm;

pub use class::{ClassHandle, LoadedClass, LoaderId};
pub use config::{ExecutionLimits, VmConfig};
pub use value::{Object, ObjectRef, Value};
pub use vm::{NativeFn, Vm};

use thiserror::Error;

use crate::Result;

/// What the patch engine needs from the runtime it patches.
pub trait HostRuntime: Send + Sync {
    /// Defines a new class from a class image.
    ///
    /// The new class must not replace a class that is already loaded under the same name.
    ///
    /// # Errors
    /// Returns an error if the image is invalid or cannot be linked.
    fn define_class(&self, bytecode: &[u8]) -> Result<ClassHandle>;

    /// Returns the class currently loaded under `name`, without loading it
    fn find_loaded_class(&self, name: &str) -> Option<ClassHandle>;
}

/// Failures raised by the reference runtime.
#[derive(Error, Debug)]
pub enum VmError {
    /// No classpath source provides the class.
    #[error("Class not found - {0}")]
    ClassNotFound(String),

    /// The class could not be linked.
    #[error("Cannot link {class}: {reason}")]
    Linkage {
        /// Qualified name of the class
        class: String,
        /// What went wrong
        reason: String,
    },

    /// Method lookup failed.
    #[error("No method {method} in {class}")]
    NoSuchMethod {
        /// Class the lookup started at
        class: String,
        /// Name and descriptor of the method
        method: String,
    },

    /// Field lookup failed.
    #[error("No field {field} in {class}")]
    NoSuchField {
        /// Class the lookup started at
        class: String,
        /// Field name
        field: String,
    },

    /// An instruction needed more operands than the stack held.
    #[error("Operand stack underflow in {method}")]
    StackUnderflow {
        /// Class and method that underflowed
        method: String,
    },

    /// A value of the wrong kind was used.
    #[error("Type mismatch - expected {expected}, found {found}")]
    TypeMismatch {
        /// What the operation needed
        expected: String,
        /// What it got
        found: String,
    },

    /// Field access or call on null.
    #[error("Null reference")]
    NullReference,

    /// Nested calls exceeded the configured depth.
    #[error("Call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),

    /// The invocation exceeded its instruction budget.
    #[error("Instruction limit of {0} exceeded")]
    InstructionLimit(u64),

    /// Invocation of a method without a body.
    #[error("Abstract method {class}.{method} invoked")]
    AbstractMethod {
        /// Declaring class
        class: String,
        /// Name and descriptor of the method
        method: String,
    },

    /// No native is registered under this name.
    #[error("Native not registered - {0}")]
    NativeNotFound(String),

    /// A native reported a failure.
    #[error("Native {name} failed: {message}")]
    NativeFailed {
        /// Registered name of the native
        name: String,
        /// The native's message
        message: String,
    },

    /// The runtime refuses to hand out the redefinition capability to itself.
    #[error("Self-attach is not permitted by the runtime configuration")]
    AttachNotPermitted,

    /// A redefinition would change the class schema.
    #[error("Unsupported redefinition of {class}: {reason}")]
    UnsupportedRedefinition {
        /// Qualified name of the class
        class: String,
        /// What changed
        reason: String,
    },

    /// A runtime lock was poisoned.
    #[error("Runtime lock poisoned")]
    LockPoisoned,
}

impl VmError {
    pub(crate) fn type_mismatch(expected: &str, found: &Value) -> Self {
        VmError::TypeMismatch {
            expected: expected.to_string(),
            found: found.kind().to_string(),
        }
    }
}
