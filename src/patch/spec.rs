use std::{fmt, sync::Arc};

use crate::{
    patch::ResolvedMethod,
    pool::{MutableType, TypePool},
    typesystem::TypeRef,
    Error, Result,
};

/// The caller's edit: receives the pool, the thawed target and the resolved method.
pub type TransformFn =
    dyn Fn(&TypePool, &mut MutableType, ResolvedMethod) -> Result<()> + Send + Sync;

/// How the parameter list of an overloaded method is described.
#[derive(Clone, Debug, Default)]
pub enum ParamSpec {
    /// No parameter description: the method without parameters
    #[default]
    None,
    /// Qualified type names such as `int`, `pkg.Counter` or `long[]`
    ByName(Vec<String>),
    /// Reflected types taken from the running runtime
    ByType(Vec<TypeRef>),
    /// A method descriptor such as `(ILpkg/Counter;)V`
    ByDescriptor(String),
}

/// An immutable description of one patch.
///
/// A patch names its target type, optionally one method of it, and the transformation
/// to apply. Without a method the transformation receives
/// [`ResolvedMethod::WholeType`] and decides itself which members to edit.
///
/// # Examples
///
/// ```rust
/// use typepatch::classfile::Instruction;
/// use typepatch::patch::{PatchSpec, ResolvedMethod};
///
/// let patch = PatchSpec::builder("pkg.Counter")
///     .method("add")
///     .params_by_name(["int"])
///     .transform(|_pool, ty, method| {
///         if let ResolvedMethod::Method(id) = method {
///             ty.insert_before(id, &[Instruction::Nop])?;
///         }
///         Ok(())
///     })
///     .build()?;
///
/// assert_eq!(patch.target(), "pkg.Counter");
/// assert_eq!(patch.method(), Some("add"));
/// # Ok::<(), typepatch::Error>(())
/// ```
#[derive(Clone)]
pub struct PatchSpec {
    target: String,
    method: Option<String>,
    params: ParamSpec,
    transform: Arc<TransformFn>,
}

impl PatchSpec {
    /// Starts describing a patch of `target`
    #[must_use]
    pub fn builder(target: impl Into<String>) -> PatchSpecBuilder {
        PatchSpecBuilder {
            target: target.into(),
            method: None,
            params: Vec::new(),
            transform: None,
        }
    }

    /// Qualified name of the type to patch
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Name of the method to patch, if the patch is not for the whole type
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// The parameter description
    #[must_use]
    pub fn params(&self) -> &ParamSpec {
        &self.params
    }

    /// Runs the transformation.
    ///
    /// # Errors
    /// Returns whatever the transformation returns.
    pub fn transform(
        &self,
        pool: &TypePool,
        ty: &mut MutableType,
        method: ResolvedMethod,
    ) -> Result<()> {
        (self.transform)(pool, ty, method)
    }
}

impl fmt::Debug for PatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchSpec")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Builder of [`PatchSpec`]; at most one parameter description may be set.
#[must_use]
pub struct PatchSpecBuilder {
    target: String,
    method: Option<String>,
    params: Vec<ParamSpec>,
    transform: Option<Arc<TransformFn>>,
}

impl PatchSpecBuilder {
    /// Patches the method `name` instead of the whole type
    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.method = Some(name.into());
        self
    }

    /// Describes the parameters by qualified type name
    pub fn params_by_name<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params
            .push(ParamSpec::ByName(names.into_iter().map(Into::into).collect()));
        self
    }

    /// Describes the parameters by reflected type
    pub fn params_by_type(mut self, types: impl IntoIterator<Item = TypeRef>) -> Self {
        self.params.push(ParamSpec::ByType(types.into_iter().collect()));
        self
    }

    /// Describes the method by descriptor
    pub fn descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.params.push(ParamSpec::ByDescriptor(descriptor.into()));
        self
    }

    /// Sets the transformation
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&TypePool, &mut MutableType, ResolvedMethod) -> Result<()> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Finishes the patch.
    ///
    /// A parameter description given without a method is kept and ignored.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPatch`] if the target is empty, no transformation was set or
    /// more than one parameter description was given.
    pub fn build(mut self) -> Result<PatchSpec> {
        if self.target.trim().is_empty() {
            return Err(Error::InvalidPatch("empty target name".to_string()));
        }
        let Some(transform) = self.transform else {
            return Err(Error::InvalidPatch(format!(
                "patch of {} has no transformation",
                self.target
            )));
        };
        if self.params.len() > 1 {
            return Err(Error::InvalidPatch(format!(
                "patch of {} describes its parameters {} ways; use only one",
                self.target,
                self.params.len()
            )));
        }

        Ok(PatchSpec {
            target: self.target,
            method: self.method,
            params: self.params.pop().unwrap_or_default(),
            transform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &TypePool, _: &mut MutableType, _: ResolvedMethod) -> Result<()> {
        Ok(())
    }

    #[test]
    fn requires_transform() {
        let err = PatchSpec::builder("pkg.Counter").method("get").build().unwrap_err();
        assert!(matches!(err, Error::InvalidPatch(_)));
    }

    #[test]
    fn channels_are_exclusive() {
        let err = PatchSpec::builder("pkg.Counter")
            .method("add")
            .params_by_name(["int"])
            .descriptor("(I)V")
            .transform(noop)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPatch(_)));
    }

    #[test]
    fn defaults() {
        let patch = PatchSpec::builder("pkg.Counter").transform(noop).build().unwrap();
        assert_eq!(patch.method(), None);
        assert!(matches!(patch.params(), ParamSpec::None));

        let patch = PatchSpec::builder("pkg.Counter")
            .descriptor("(I)V")
            .transform(noop)
            .build()
            .unwrap();
        assert!(matches!(patch.params(), ParamSpec::ByDescriptor(d) if d == "(I)V"));
    }
}
