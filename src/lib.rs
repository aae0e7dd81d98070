// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # typepatch
//!
//! Patch the types of a running managed runtime.
//!
//! `typepatch` takes a named type, edits it through a caller-supplied transformation and
//! hands the result back in one of three forms: as a brand new class defined in the
//! runtime, as a raw class image, or as a redefinition unit that swaps the code of the
//! live class in place.
//!
//! Every patch runs the same pipeline:
//!
//! 1. **Lookup** - the target is fetched from a [`pool::TypePool`], loading its image from
//!    the pool's classpath on first use
//! 2. **Thaw** - the pooled type is made editable again
//! 3. **Resolve** - the named method is found by parameter names, reflected types or
//!    descriptor ([`patch::MethodResolver`])
//! 4. **Transform** - the caller's closure edits the type
//! 5. **Finalize** - the edited type is verified and serialized into a class image
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use typepatch::prelude::*;
//! use typepatch::classfile::{
//!     update_max_stack, ClassDef, ClassFlags, Instruction, MemberFlags, MethodDef,
//! };
//!
//! // A class `demo.Greeter` with `static int answer()` returning 41
//! let mut class = ClassDef::new("demo.Greeter", ClassFlags::PUBLIC);
//! class.methods.push(MethodDef::new(
//!     MemberFlags::PUBLIC | MemberFlags::STATIC,
//!     "answer",
//!     MethodSignature::new(vec![], TypeSignature::Int),
//!     vec![Instruction::int(41), Instruction::ReturnValue],
//! ));
//! update_max_stack(&mut class)?;
//!
//! let source = Arc::new(MemoryClassPath::new());
//! source.add_class(&class)?;
//!
//! let pool = Arc::new(TypePool::new());
//! pool.append_classpath(source.clone())?;
//! let vm = Arc::new(Vm::new(VmConfig::permissive()).with_classpath(source));
//! let engine = PatchEngine::new(
//!     pool,
//!     vm.clone(),
//!     Arc::new(RedefinitionBridge::new(Arc::new(SelfAttach::new(vm.clone())))),
//! );
//!
//! let live = vm.load_class("demo.Greeter")?;
//! assert_eq!(vm.invoke_static(&live, "answer", "()I", vec![])?, Value::Int(41));
//!
//! // Replace the body in place; the running class sees the new code
//! let patch = PatchSpec::builder("demo.Greeter")
//!     .method("answer")
//!     .transform(|_, ty, method| {
//!         if let ResolvedMethod::Method(id) = method {
//!             ty.set_body(id, vec![Instruction::int(42), Instruction::ReturnValue])?;
//!         }
//!         Ok(())
//!     })
//!     .build()?;
//! engine.apply_patch(&patch, true)?;
//!
//! assert_eq!(vm.invoke_static(&live, "answer", "()I", vec![])?, Value::Int(42));
//! # Ok::<(), typepatch::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`classfile`] - The class image model, its codec, verifier and body editing
//! - [`pool`] - The type pool, classpath sources and mutable pooled types
//! - [`patch`] - Patch descriptions, method resolution and the [`PatchEngine`]
//! - [`instrument`] - Lazy attach and batched live redefinition
//! - [`runtime`] - A reference runtime with class loading, an interpreter and
//!   redefinition support
//! - [`signatures`] / [`typesystem`] - Descriptors, type names and reflected types
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). The patch pipeline wraps the
//! underlying cause of a failure in the variant of the stage that failed:
//!
//! ```rust,no_run
//! use typepatch::prelude::*;
//!
//! # fn example(engine: &PatchEngine, patch: &PatchSpec) {
//! match engine.apply_patch(patch, true) {
//!     Ok(class) => println!("redefined {}", class.name()),
//!     Err(Error::LiveClassNotFound(name)) => println!("{name} is not running"),
//!     Err(Error::Attach(cause)) => println!("cannot redefine at all: {cause}"),
//!     Err(e) => println!("patch failed: {e}"),
//! }
//! # }
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: pool loads, method resolution, definitions,
//! attach and redefinitions at `debug`, rejected redefinitions at `warn`. Install any
//! `log` backend to see them.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use typepatch::prelude::*;
///
/// let pool = TypePool::new();
/// assert!(pool.is_empty());
/// ```
pub mod prelude;

pub mod classfile;
pub mod file;
pub mod instrument;
pub mod patch;
pub mod pool;
pub mod runtime;
pub mod signatures;
pub mod typesystem;

/// `typepatch` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `typepatch` Error type
///
/// Every fallible operation of the crate reports one of its variants.
pub use error::Error;

/// Cursor-based reader for class images and descriptors.
pub use file::parser::Parser;

pub use patch::{PatchEngine, PatchSpec};
