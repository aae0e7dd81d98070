use log::debug;

use crate::{
    patch::{ParamSpec, PatchSpec},
    pool::{MethodId, MutableType, TypePool},
    typesystem::{resolve_type_names, resolve_type_refs},
    Error, Result,
};

/// The method a transformation should edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedMethod {
    /// The patch names no method; the transformation works on the whole type
    WholeType,
    /// A declared method of the target
    Method(MethodId),
}

impl ResolvedMethod {
    /// The method id, if one was resolved
    #[must_use]
    pub fn id(self) -> Option<MethodId> {
        match self {
            ResolvedMethod::WholeType => None,
            ResolvedMethod::Method(id) => Some(id),
        }
    }
}

/// Resolves the method a [`PatchSpec`] names against its target.
///
/// The parameter descriptions are tried in a fixed order and only declared methods are
/// considered:
///
/// 1. no method name => [`ResolvedMethod::WholeType`], parameters are ignored
/// 2. [`ParamSpec::ByName`] => exact parameter list from qualified names
/// 3. [`ParamSpec::ByType`] => exact parameter list from reflected types
/// 4. [`ParamSpec::ByDescriptor`] => exact descriptor
/// 5. [`ParamSpec::None`] => the overload without parameters
///
/// Lookups by parameter list never pick between overloads that differ only in their
/// return type; such a patch fails with [`Error::AmbiguousMethod`] as its cause and
/// has to name the method by descriptor.
pub struct MethodResolver<'a> {
    pool: &'a TypePool,
}

impl<'a> MethodResolver<'a> {
    /// Creates a resolver that looks up parameter classes in `pool`
    #[must_use]
    pub fn new(pool: &'a TypePool) -> Self {
        MethodResolver { pool }
    }

    /// Resolves `spec` against `ty`.
    ///
    /// `pool` is consulted for parameter class names only; `ty` itself is never looked up
    /// again, so this is safe to call while holding the lock of `ty`.
    ///
    /// # Errors
    /// Returns [`Error::MethodNotFound`] wrapping the lookup or parameter resolution
    /// failure.
    pub fn resolve(&self, spec: &PatchSpec, ty: &MutableType) -> Result<ResolvedMethod> {
        let Some(name) = spec.method() else {
            return Ok(ResolvedMethod::WholeType);
        };

        let found = match spec.params() {
            ParamSpec::ByName(names) => resolve_type_names(self.pool, names)
                .and_then(|params| ty.declared_method(name, &params)),
            ParamSpec::ByType(types) => resolve_type_refs(self.pool, types)
                .and_then(|params| ty.declared_method(name, &params)),
            ParamSpec::ByDescriptor(descriptor) => {
                ty.declared_method_by_descriptor(name, descriptor)
            }
            ParamSpec::None => ty.declared_method(name, &[]),
        };

        match found {
            Ok(id) => {
                debug!("patch: resolved {}.{} to {}", spec.target(), name, id);
                Ok(ResolvedMethod::Method(id))
            }
            Err(source) => Err(Error::MethodNotFound {
                target: spec.target().to_string(),
                method: name.to_string(),
                source: Box::new(source),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        runtime::HostRuntime,
        test::factories::{counter_pool, counter_vm},
        typesystem::{PrimitiveKind, TypeRef},
    };

    fn spec(builder: crate::patch::PatchSpecBuilder) -> PatchSpec {
        builder.transform(|_, _, _| Ok(())).build().unwrap()
    }

    fn resolve(spec: &PatchSpec) -> Result<ResolvedMethod> {
        let pool = counter_pool();
        let ty = pool.get("pkg.Counter")?;
        let ty = ty.read().unwrap();
        MethodResolver::new(&pool).resolve(spec, &ty)
    }

    fn method_name(resolved: ResolvedMethod) -> (String, String) {
        let pool = counter_pool();
        let ty = pool.get("pkg.Counter").unwrap();
        let ty = ty.read().unwrap();
        let method = ty.method(resolved.id().unwrap()).unwrap();
        (method.name.clone(), method.descriptor())
    }

    #[test]
    fn whole_type_ignores_params() {
        let patch = spec(PatchSpec::builder("pkg.Counter").params_by_name(["pkg.Missing"]));
        assert_eq!(resolve(&patch).unwrap(), ResolvedMethod::WholeType);
    }

    #[test]
    fn no_params_means_zero_params() {
        let patch = spec(PatchSpec::builder("pkg.Counter").method("increment"));
        assert_eq!(method_name(resolve(&patch).unwrap()).1, "()V");

        // add only has overloads with parameters
        let patch = spec(PatchSpec::builder("pkg.Counter").method("add"));
        assert!(matches!(resolve(&patch), Err(Error::MethodNotFound { .. })));
    }

    #[test]
    fn every_channel_picks_the_same_overload() {
        let by_name = spec(
            PatchSpec::builder("pkg.Counter")
                .method("add")
                .params_by_name(["pkg.Counter"]),
        );
        let by_desc = spec(
            PatchSpec::builder("pkg.Counter")
                .method("add")
                .descriptor("(Lpkg/Counter;)V"),
        );

        let first = resolve(&by_name).unwrap();
        assert_eq!(first, resolve(&by_name).unwrap());
        assert_eq!(first, resolve(&by_desc).unwrap());
        assert_eq!(method_name(first).1, "(Lpkg/Counter;)V");

        let by_type = spec(
            PatchSpec::builder("pkg.Counter")
                .method("add")
                .params_by_type([TypeRef::from(PrimitiveKind::Int)]),
        );
        assert_eq!(method_name(resolve(&by_type).unwrap()).1, "(I)V");
    }

    #[test]
    fn live_class_refs_resolve() {
        let vm = counter_vm();
        let live = vm.load_class("pkg.Counter").unwrap();
        assert!(vm.find_loaded_class("pkg.Counter").is_some());

        let patch = spec(
            PatchSpec::builder("pkg.Counter")
                .method("add")
                .params_by_type([TypeRef::class(&live)]),
        );
        assert_eq!(method_name(resolve(&patch).unwrap()).1, "(Lpkg/Counter;)V");
    }

    #[test]
    fn failures_keep_their_cause() {
        let unknown = spec(
            PatchSpec::builder("pkg.Counter")
                .method("add")
                .params_by_name(["pkg.Nope"]),
        );
        match resolve(&unknown) {
            Err(Error::MethodNotFound { method, source, .. }) => {
                assert_eq!(method, "add");
                assert!(matches!(*source, Error::TypeNotFound(_)));
            }
            other => panic!("unexpected {other:?}"),
        }

        let bad_desc = spec(PatchSpec::builder("pkg.Counter").method("add").descriptor("(I"));
        match resolve(&bad_desc) {
            Err(Error::MethodNotFound { source, .. }) => {
                assert!(matches!(*source, Error::Malformed { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }

        let missing = spec(PatchSpec::builder("pkg.Counter").method("reset"));
        match resolve(&missing) {
            Err(Error::MethodNotFound { source, .. }) => {
                assert!(matches!(*source, Error::NoSuchMethod { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn return_type_overloads_need_a_descriptor() {
        use crate::classfile::{Instruction, MemberFlags, MethodDef};
        use crate::signatures::{MethodSignature, TypeSignature};

        let pool = counter_pool();
        let record = pool.get("pkg.Counter").unwrap();
        let mut ty = record.write().unwrap();
        ty.add_method(MethodDef::new(
            MemberFlags::PUBLIC,
            "add",
            MethodSignature::new(vec![TypeSignature::Int], TypeSignature::Int),
            vec![Instruction::Load(1), Instruction::ReturnValue],
        ))
        .unwrap();
        let resolver = MethodResolver::new(&pool);

        let by_name = spec(PatchSpec::builder("pkg.Counter").method("add").params_by_name(["int"]));
        match resolver.resolve(&by_name, &ty) {
            Err(Error::MethodNotFound { source, .. }) => {
                assert!(matches!(*source, Error::AmbiguousMethod { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }

        let by_desc = spec(PatchSpec::builder("pkg.Counter").method("add").descriptor("(I)I"));
        let id = resolver.resolve(&by_desc, &ty).unwrap().id().unwrap();
        assert_eq!(ty.method(id).unwrap().descriptor(), "(I)I");
    }
}
