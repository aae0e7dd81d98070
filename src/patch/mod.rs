//! Patch descriptions, method resolution and the patch engine.
//!
//! # Key Components
//!
//! - [`PatchSpec`] - What to patch: target type, optional method, parameter description
//!   and the transformation
//! - [`ParamSpec`] - The three ways of picking an overload
//! - [`MethodResolver`] - Resolves a [`PatchSpec`] to a [`ResolvedMethod`]
//! - [`PatchEngine`] - Runs the pipeline and delivers the result

mod engine;
mod resolver;
mod spec;

pub use engine::PatchEngine;
pub use resolver::{MethodResolver, ResolvedMethod};
pub use spec::{ParamSpec, PatchSpec, PatchSpecBuilder, TransformFn};
