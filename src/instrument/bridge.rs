use std::sync::Arc;

use log::debug;
use once_cell::sync::OnceCell;

use crate::{
    instrument::{Attacher, Instrumentation, RedefinitionUnit},
    runtime::ClassHandle,
    Error, Result,
};

static SHARED_BRIDGE: OnceCell<Arc<RedefinitionBridge>> = OnceCell::new();

/// Hands batches of [`RedefinitionUnit`]s to the runtime's redefinition capability.
///
/// The capability is obtained lazily on the first non-empty batch and then reused; the
/// attacher runs at most once per bridge after a successful attach. A failed attach is
/// reported as [`Error::Attach`] and tried again on the next batch.
///
/// Engines hold the bridge behind an [`Arc`]; [`RedefinitionBridge::shared`] gives every
/// engine of the process the same one, so the runtime is attached to once.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use typepatch::instrument::{RedefinitionBridge, SelfAttach};
/// use typepatch::runtime::{Vm, VmConfig};
///
/// let vm = Arc::new(Vm::new(VmConfig::default()));
/// let bridge = RedefinitionBridge::new(Arc::new(SelfAttach::new(vm)));
///
/// assert!(!bridge.is_attached());
/// assert!(bridge.redefine(Vec::new())?.is_empty());
/// assert!(!bridge.is_attached());
/// # Ok::<(), typepatch::Error>(())
/// ```
pub struct RedefinitionBridge {
    attacher: Arc<dyn Attacher>,
    capability: OnceCell<Arc<dyn Instrumentation>>,
}

impl RedefinitionBridge {
    /// Creates a bridge that attaches through `attacher` when first needed
    #[must_use]
    pub fn new(attacher: Arc<dyn Attacher>) -> Self {
        RedefinitionBridge {
            attacher,
            capability: OnceCell::new(),
        }
    }

    /// The process-wide bridge, mirroring [`crate::pool::TypePool::shared`].
    ///
    /// `attacher` is only called by the first caller; later calls return the same bridge
    /// and ignore their argument.
    pub fn shared(attacher: impl FnOnce() -> Arc<dyn Attacher>) -> Arc<RedefinitionBridge> {
        SHARED_BRIDGE
            .get_or_init(|| Arc::new(RedefinitionBridge::new(attacher())))
            .clone()
    }

    /// Returns `true` once the capability was obtained
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.capability.get().is_some()
    }

    /// The redefinition capability, attaching on first use.
    ///
    /// # Errors
    /// Returns [`Error::Attach`] wrapping the attacher's failure.
    pub fn instrumentation(&self) -> Result<Arc<dyn Instrumentation>> {
        self.capability
            .get_or_try_init(|| {
                debug!("instrument: attaching");
                self.attacher
                    .attach()
                    .map_err(|error| Error::Attach(Box::new(error)))
            })
            .cloned()
    }

    /// Redefines all units in one step and returns their classes in input order.
    ///
    /// The batch is atomic: either every class is redefined or none is. An empty batch
    /// succeeds without attaching.
    ///
    /// # Errors
    /// Returns [`Error::Attach`] if the capability cannot be obtained and
    /// [`Error::Redefinition`] if the runtime rejects the batch.
    pub fn redefine(&self, units: Vec<RedefinitionUnit>) -> Result<Vec<ClassHandle>> {
        if units.is_empty() {
            return Ok(Vec::new());
        }

        let instrumentation = self.instrumentation()?;
        debug!("instrument: redefining {} classes", units.len());
        instrumentation
            .redefine_classes(&units)
            .map_err(|error| Error::Redefinition(Box::new(error)))
    }
}
