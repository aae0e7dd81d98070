use std::{fmt, sync::Arc};

use log::{debug, warn};

use crate::{
    classfile::ClassDef,
    instrument::{RedefinitionBridge, RedefinitionUnit},
    patch::{MethodResolver, PatchSpec},
    pool::{MutableType, MutableTypeRc, TypePool},
    runtime::{ClassHandle, HostRuntime},
    Error, Result,
};

/// Applies [`PatchSpec`]s to the types of a running runtime.
///
/// Every patch runs the same pipeline: look the target up in the [`TypePool`], thaw it,
/// resolve the method, run the transformation and finalize the edited type. The result is
/// delivered in one of three forms:
///
/// - [`PatchEngine::apply_patch`] with `redefine == false` defines a brand new class from
///   the patched bytecode; the class that is already loaded stays as it is
/// - [`PatchEngine::get_bytecode`] returns the patched class image
/// - [`PatchEngine::get_definition`] pairs the live class with the patched image, ready for
///   the [`RedefinitionBridge`]; [`PatchEngine::apply_patch`] with `redefine == true` and
///   [`PatchEngine::apply_patches`] hand such units to the bridge directly
///
/// A patch that fails while transforming, finalizing or redefining leaves the pooled type
/// as it was before the patch started.
///
/// # Concurrency
///
/// The target's write lock is held from the thaw until the type is finalized, so two
/// patches of the same target never interleave. Their order is unspecified; callers that
/// care should serialize patches per target.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use typepatch::prelude::*;
/// use typepatch::classfile::{ClassDef, ClassFlags};
///
/// let source = Arc::new(MemoryClassPath::new());
/// source.add_class(&ClassDef::new("pkg.Empty", ClassFlags::PUBLIC))?;
///
/// let pool = Arc::new(TypePool::new());
/// pool.append_classpath(source.clone())?;
/// let vm = Arc::new(Vm::new(VmConfig::default()).with_classpath(source));
/// let bridge = Arc::new(RedefinitionBridge::new(Arc::new(SelfAttach::new(vm.clone()))));
/// let engine = PatchEngine::new(pool, vm, bridge);
///
/// let patch = PatchSpec::builder("pkg.Empty")
///     .transform(|_, _, method| {
///         assert_eq!(method, ResolvedMethod::WholeType);
///         Ok(())
///     })
///     .build()?;
/// let image = engine.get_bytecode(&patch)?;
/// assert_eq!(&image[..4], b"TPCL");
/// # Ok::<(), typepatch::Error>(())
/// ```
pub struct PatchEngine {
    pool: Arc<TypePool>,
    runtime: Arc<dyn HostRuntime>,
    bridge: Arc<RedefinitionBridge>,
}

/// The state of a pooled type before a patch was applied to it
struct Restore {
    record: MutableTypeRc,
    snapshot: ClassDef,
}

impl Restore {
    /// Puts the snapshot back and leaves the type thawed
    fn apply(self) {
        let Restore { record, snapshot } = self;
        match record.write() {
            Ok(mut ty) => {
                ty.restore(snapshot);
                ty.thaw();
            }
            Err(_) => warn!("patch: cannot roll back {}, lock poisoned", snapshot.name),
        };
    }
}

impl PatchEngine {
    /// Creates an engine over `pool` that defines classes in `runtime` and redefines live
    /// classes through `bridge`.
    ///
    /// Engines that share a bridge also share its attach: the capability is obtained once
    /// for all of them. See [`RedefinitionBridge::shared`].
    #[must_use]
    pub fn new(
        pool: Arc<TypePool>,
        runtime: Arc<dyn HostRuntime>,
        bridge: Arc<RedefinitionBridge>,
    ) -> Self {
        PatchEngine {
            pool,
            runtime,
            bridge,
        }
    }

    /// Creates an engine over the process-wide [`TypePool::shared`] pool
    #[must_use]
    pub fn with_shared_pool(
        runtime: Arc<dyn HostRuntime>,
        bridge: Arc<RedefinitionBridge>,
    ) -> Self {
        Self::new(TypePool::shared(), runtime, bridge)
    }

    /// The pool patches are applied to
    #[must_use]
    pub fn pool(&self) -> &Arc<TypePool> {
        &self.pool
    }

    /// The bridge used for live redefinition
    #[must_use]
    pub fn bridge(&self) -> &Arc<RedefinitionBridge> {
        &self.bridge
    }

    /// Runs the patch pipeline and hands the transformed type to `finalize` while the
    /// target is still locked.
    ///
    /// If the transformation or `finalize` fails, the type is restored to its state
    /// before the patch. On success the returned [`Restore`] can still undo the patch.
    fn apply_transforms<T>(
        &self,
        spec: &PatchSpec,
        finalize: impl FnOnce(&mut MutableType) -> Result<T>,
    ) -> Result<(T, Restore)> {
        let target = spec.target();
        let Some(record) = self.pool.get_or_none(target)? else {
            return Err(Error::TargetNotFound(target.to_string()));
        };

        let mut ty = write_lock!(record);
        ty.thaw();

        let resolved = MethodResolver::new(&self.pool).resolve(spec, &*ty)?;
        let snapshot = ty.snapshot();

        if let Err(error) = spec.transform(&self.pool, &mut *ty, resolved) {
            ty.restore(snapshot);
            ty.thaw();
            return Err(Error::Transform {
                target: target.to_string(),
                source: Box::new(error),
            });
        }

        match finalize(&mut *ty) {
            Ok(value) => {
                drop(ty);
                Ok((value, Restore { record, snapshot }))
            }
            Err(error) => {
                ty.restore(snapshot);
                ty.thaw();
                Err(error)
            }
        }
    }

    fn live_class(&self, spec: &PatchSpec) -> Result<ClassHandle> {
        self.runtime
            .find_loaded_class(spec.target())
            .ok_or_else(|| Error::LiveClassNotFound(spec.target().to_string()))
    }

    /// Builds the redefinition unit of `spec` and keeps what is needed to undo it
    fn prepare_definition(&self, spec: &PatchSpec) -> Result<(RedefinitionUnit, Restore)> {
        let class = self.live_class(spec)?;
        self.apply_transforms(spec, |ty| {
            let bytecode = ty
                .to_bytecode()
                .map_err(|error| Self::definition_error(spec, error))?;
            Ok(RedefinitionUnit::new(class, bytecode))
        })
    }

    fn definition_error(spec: &PatchSpec, error: Error) -> Error {
        Error::Definition {
            target: spec.target().to_string(),
            source: Box::new(error),
        }
    }

    /// Applies the patch.
    ///
    /// With `redefine == false` the patched type is defined as a new class and returned;
    /// the class already loaded under the target's name is not affected. With
    /// `redefine == true` the live class is redefined in place and returned; if the
    /// bridge fails to attach or the runtime rejects the new definition, the pooled type
    /// is rolled back as well.
    ///
    /// # Errors
    /// Returns [`Error::TargetNotFound`], [`Error::MethodNotFound`] or [`Error::Transform`]
    /// from the pipeline, [`Error::Definition`] if the patched type cannot be finalized or
    /// defined, and for live redefinition [`Error::LiveClassNotFound`],
    /// [`Error::Attach`] or [`Error::Redefinition`].
    pub fn apply_patch(&self, spec: &PatchSpec, redefine: bool) -> Result<ClassHandle> {
        if redefine {
            let class = self.live_class(spec)?;
            let bridge = &self.bridge;
            // The target stays locked until the runtime has the new definition
            let (mut classes, _) = self.apply_transforms(spec, |ty| {
                let bytecode = ty
                    .to_bytecode()
                    .map_err(|error| Self::definition_error(spec, error))?;
                bridge.redefine(vec![RedefinitionUnit::new(class, bytecode)])
            })?;
            return classes
                .pop()
                .ok_or_else(|| Error::Redefinition(Box::new(Error::Empty)));
        }

        let runtime = &self.runtime;
        let (class, _) = self.apply_transforms(spec, |ty| {
            let bytecode = ty
                .to_bytecode()
                .map_err(|error| Self::definition_error(spec, error))?;
            runtime
                .define_class(&bytecode)
                .map_err(|error| Self::definition_error(spec, error))
        })?;

        debug!("patch: defined patched {}", spec.target());
        Ok(class)
    }

    /// Applies the patch and returns the patched class image.
    ///
    /// Nothing is loaded or defined in the runtime.
    ///
    /// # Errors
    /// Returns [`Error::TargetNotFound`], [`Error::MethodNotFound`] or [`Error::Transform`]
    /// from the pipeline and [`Error::Definition`] if the patched type cannot be finalized.
    pub fn get_bytecode(&self, spec: &PatchSpec) -> Result<Vec<u8>> {
        let (bytecode, _) = self.apply_transforms(spec, |ty| {
            ty.to_bytecode()
                .map_err(|error| Self::definition_error(spec, error))
        })?;
        Ok(bytecode)
    }

    /// Applies the patch and pairs the patched image with the live class.
    ///
    /// The live class is looked up first and never loaded on demand, so no patch is
    /// applied for a target that is not running. The pooled type keeps the patch, as the
    /// caller is expected to redefine the class with the returned unit.
    ///
    /// # Errors
    /// Returns [`Error::LiveClassNotFound`] if the target is not loaded, otherwise the
    /// errors of [`PatchEngine::get_bytecode`].
    pub fn get_definition(&self, spec: &PatchSpec) -> Result<RedefinitionUnit> {
        let (unit, _) = self.prepare_definition(spec)?;
        Ok(unit)
    }

    /// Applies every patch and redefines all targets in one batch, in input order.
    ///
    /// All units are built before anything is redefined, so a failing patch redefines
    /// nothing. If a patch fails or the bridge fails, every patch of the batch is rolled
    /// back in the pool, latest first.
    ///
    /// Unlike [`PatchEngine::apply_patch`], targets are not locked while the batch is
    /// redefined; a patch of one of them that completes in the meantime is lost if the
    /// batch is rolled back.
    ///
    /// # Errors
    /// Returns the first patch failure, or the bridge's [`Error::Attach`] or
    /// [`Error::Redefinition`].
    pub fn apply_patches(&self, specs: &[PatchSpec]) -> Result<Vec<ClassHandle>> {
        let mut units = Vec::with_capacity(specs.len());
        let mut undo = Vec::with_capacity(specs.len());

        for spec in specs {
            match self.prepare_definition(spec) {
                Ok((unit, restore)) => {
                    units.push(unit);
                    undo.push(restore);
                }
                Err(error) => {
                    Self::roll_back(undo);
                    return Err(error);
                }
            }
        }

        self.bridge.redefine(units).inspect_err(|_| Self::roll_back(undo))
    }

    fn roll_back(undo: Vec<Restore>) {
        if !undo.is_empty() {
            debug!("patch: rolling back {} patches", undo.len());
        }
        undo.into_iter().rev().for_each(Restore::apply);
    }
}

impl fmt::Debug for PatchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchEngine")
            .field("pool_types", &self.pool.len())
            .field("attached", &self.bridge.is_attached())
            .finish_non_exhaustive()
    }
}
