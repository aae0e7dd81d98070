//! Runtime configuration types.
//!
//! - [`VmConfig`] - Top-level configuration of a [`crate::runtime::Vm`]
//! - [`ExecutionLimits`] - Bounds on a single invocation
//!
//! # Configuration Presets
//!
//! - [`VmConfig::default()`] - Generous limits, self-attach allowed
//! - [`VmConfig::strict()`] - Tight limits, self-attach refused
//! - [`VmConfig::permissive()`] - No instruction budget, deep call stacks
//!
//! # Example
//!
//! ```rust
//! use typepatch::runtime::{ExecutionLimits, VmConfig};
//!
//! let config = VmConfig {
//!     limits: ExecutionLimits::new()
//!         .with_max_instructions(10_000)
//!         .with_max_call_depth(32),
//!     ..VmConfig::default()
//! };
//! assert!(config.allow_self_attach);
//! ```

/// Bounds on a single invocation.
///
/// # Default Values
///
/// | Setting | Default Value |
/// |---------|---------------|
/// | `max_instructions` | 1,000,000 |
/// | `max_call_depth` | 256 |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Maximum instructions executed by one top-level invocation.
    ///
    /// Set to 0 for unlimited execution.
    pub max_instructions: u64,

    /// Maximum depth of nested method calls.
    pub max_call_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_instructions: 1_000_000,
            max_call_depth: 256,
        }
    }
}

impl ExecutionLimits {
    /// Creates the default limits
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instruction budget (0 for unlimited).
    ///
    /// # Returns
    ///
    /// Returns `self` for method chaining.
    #[must_use]
    pub fn with_max_instructions(mut self, max: u64) -> Self {
        self.max_instructions = max;
        self
    }

    /// Sets the maximum call depth.
    ///
    /// # Returns
    ///
    /// Returns `self` for method chaining.
    #[must_use]
    pub fn with_max_call_depth(mut self, max: usize) -> Self {
        self.max_call_depth = max;
        self
    }
}

/// Configuration of a [`crate::runtime::Vm`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmConfig {
    /// Execution bounds for every invocation.
    pub limits: ExecutionLimits,

    /// Whether [`crate::instrument::SelfAttach`] may obtain the redefinition capability.
    ///
    /// Mirrors hosts that refuse a process attaching to itself unless explicitly enabled.
    pub allow_self_attach: bool,

    /// Verify class images before defining or loading them.
    pub verify_on_define: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            limits: ExecutionLimits::default(),
            allow_self_attach: true,
            verify_on_define: true,
        }
    }
}

impl VmConfig {
    /// Tight limits and no self-attach.
    ///
    /// # Settings
    ///
    /// - **Instruction limit**: 100,000
    /// - **Call depth**: 64
    /// - **Self-attach**: refused
    #[must_use]
    pub fn strict() -> Self {
        Self {
            limits: ExecutionLimits {
                max_instructions: 100_000,
                max_call_depth: 64,
            },
            allow_self_attach: false,
            verify_on_define: true,
        }
    }

    /// No instruction budget and deep call stacks, for long running tests.
    ///
    /// # Settings
    ///
    /// - **Instruction limit**: unlimited
    /// - **Call depth**: 4096
    /// - **Self-attach**: allowed
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            limits: ExecutionLimits {
                max_instructions: 0,
                max_call_depth: 4096,
            },
            ..Default::default()
        }
    }
}
