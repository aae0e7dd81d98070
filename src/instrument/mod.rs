//! Live redefinition of loaded classes.
//!
//! Redefinition needs a privileged capability ([`Instrumentation`]) that a host hands out
//! through an [`Attacher`]. The [`RedefinitionBridge`] obtains it lazily, at most once, and
//! forwards batches of [`RedefinitionUnit`]s to it. Batching matters: the runtime pauses
//! method lookups while it swaps a batch, so one batch means one pause.
//!
//! # Key Components
//!
//! - [`RedefinitionBridge`] - Lazy attach plus batched redefinition
//! - [`RedefinitionUnit`] - A live class paired with replacement bytecode
//! - [`Attacher`], [`Instrumentation`] - The host seams
//! - [`SelfAttach`] - Attacher for the reference [`crate::runtime::Vm`]

mod attach;
mod bridge;
mod unit;

pub use attach::{Attacher, SelfAttach};
pub use bridge::RedefinitionBridge;
pub use unit::RedefinitionUnit;

use crate::{runtime::ClassHandle, Result};

/// The privileged capability to swap the code of live classes.
pub trait Instrumentation: Send + Sync {
    /// Redefines every unit in one atomic step and returns the classes in input order.
    ///
    /// # Errors
    /// Returns an error, and leaves every class unchanged, if any unit is rejected.
    fn redefine_classes(&self, units: &[RedefinitionUnit]) -> Result<Vec<ClassHandle>>;
}
