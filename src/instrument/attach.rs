use std::sync::Arc;

use log::debug;

use crate::{
    instrument::{Instrumentation, RedefinitionUnit},
    runtime::{ClassHandle, Vm, VmError},
    Result,
};

/// Obtains the privileged redefinition capability of a running runtime.
///
/// Attaching can be expensive and may have side effects on the target, so
/// [`crate::instrument::RedefinitionBridge`] calls it at most once per successful attach.
pub trait Attacher: Send + Sync {
    /// Attaches and returns the capability.
    ///
    /// # Errors
    /// Returns an error if the runtime refuses the attach or cannot be reached.
    fn attach(&self) -> Result<Arc<dyn Instrumentation>>;
}

/// Attaches to the [`Vm`] the caller runs in.
///
/// The attach is refused with [`VmError::AttachNotPermitted`] unless the runtime was
/// configured with `allow_self_attach`.
#[derive(Debug, Clone)]
pub struct SelfAttach {
    vm: Arc<Vm>,
}

impl SelfAttach {
    /// Creates an attacher for `vm`
    #[must_use]
    pub fn new(vm: Arc<Vm>) -> Self {
        SelfAttach { vm }
    }
}

impl Attacher for SelfAttach {
    fn attach(&self) -> Result<Arc<dyn Instrumentation>> {
        if !self.vm.config().allow_self_attach {
            return Err(VmError::AttachNotPermitted.into());
        }
        debug!("instrument: attached to {:?}", self.vm);
        Ok(Arc::new(VmInstrumentation {
            vm: self.vm.clone(),
        }))
    }
}

/// The redefinition capability of a [`Vm`]
struct VmInstrumentation {
    vm: Arc<Vm>,
}

impl Instrumentation for VmInstrumentation {
    fn redefine_classes(&self, units: &[RedefinitionUnit]) -> Result<Vec<ClassHandle>> {
        self.vm.redefine_classes(units)
    }
}
