//! Integration tests for live redefinition: lazy attach, batches and classpath sources.

mod common;

use std::sync::Arc;

use common::{audit_increment, greet_with, Fixture, COUNTER, GREETER};
use typepatch::{
    classfile::{Instruction, MemberFlags, MethodDef},
    prelude::*,
    runtime::VmError,
};

/// Adds a static method to `pkg.Counter`, a schema change live redefinition refuses
fn grow_counter() -> PatchSpec {
    PatchSpec::builder(COUNTER)
        .transform(|_, ty, _| {
            ty.add_method(MethodDef::new(
                MemberFlags::PUBLIC | MemberFlags::STATIC,
                "extra",
                MethodSignature::void(),
                vec![Instruction::Return],
            ))?;
            Ok(())
        })
        .build()
        .unwrap()
}

fn identity(target: &str) -> PatchSpec {
    PatchSpec::builder(target)
        .transform(|_, _, _| Ok(()))
        .build()
        .unwrap()
}

#[test]
fn attaches_once_across_redefinitions() -> Result<()> {
    let fixture = Fixture::new();
    let greeter = fixture.vm.load_class(GREETER)?;
    assert!(!fixture.engine.bridge().is_attached());

    for (round, text) in ["one", "two", "three", "four"].into_iter().enumerate() {
        fixture.engine.apply_patch(&greet_with(text), true)?;
        assert_eq!(
            fixture.vm.invoke_static(&greeter, "greet", "()Llang/String;", vec![])?,
            Value::from(text)
        );
        assert_eq!(greeter.redefinition_count() as usize, round + 1);
    }

    assert!(fixture.engine.bridge().is_attached());
    assert_eq!(fixture.attacher.calls(), 1);
    Ok(())
}

#[test]
fn batch_redefines_all_in_order() -> Result<()> {
    let fixture = Fixture::new();
    let counter = fixture.vm.load_class(COUNTER)?;
    let greeter = fixture.vm.load_class(GREETER)?;
    let object = fixture.vm.new_instance(&counter)?;

    let classes = fixture
        .engine
        .apply_patches(&[greet_with("batched"), audit_increment()])?;
    assert_eq!(classes.len(), 2);
    assert!(classes[0].same_class(&greeter));
    assert!(classes[1].same_class(&counter));

    fixture.vm.invoke_virtual(&object, "increment", "()V", vec![])?;
    assert_eq!(fixture.hits(), 1);
    assert_eq!(
        fixture.vm.invoke_static(&greeter, "greet", "()Llang/String;", vec![])?,
        Value::from("batched")
    );
    assert_eq!(fixture.attacher.calls(), 1);
    Ok(())
}

#[test]
fn batch_with_missing_live_class_redefines_nothing() -> Result<()> {
    let fixture = Fixture::new();
    let greeter = fixture.vm.load_class(GREETER)?;

    // pkg.Counter is only on the classpath
    let result = fixture
        .engine
        .apply_patches(&[greet_with("never"), audit_increment()]);
    assert!(matches!(result, Err(Error::LiveClassNotFound(name)) if name == COUNTER));

    assert_eq!(greeter.redefinition_count(), 0);
    assert_eq!(fixture.attacher.calls(), 0);
    assert_eq!(
        fixture.vm.invoke_static(&greeter, "greet", "()Llang/String;", vec![])?,
        Value::from("hello")
    );
    Ok(())
}

#[test]
fn rejected_unit_rolls_back_the_whole_batch() -> Result<()> {
    let fixture = Fixture::new();
    let counter = fixture.vm.load_class(COUNTER)?;
    let greeter = fixture.vm.load_class(GREETER)?;

    match fixture.engine.apply_patches(&[greet_with("never"), grow_counter()]) {
        Err(Error::Redefinition(source)) => {
            assert!(matches!(
                *source,
                Error::Vm(VmError::UnsupportedRedefinition { ref class, .. }) if class == COUNTER
            ));
        }
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(counter.redefinition_count(), 0);
    assert_eq!(greeter.redefinition_count(), 0);
    assert_eq!(
        fixture.vm.invoke_static(&greeter, "greet", "()Llang/String;", vec![])?,
        Value::from("hello")
    );
    Ok(())
}

#[test]
fn rejected_redefinition_leaves_pool_unpatched() -> Result<()> {
    let fixture = Fixture::new();
    let counter = fixture.vm.load_class(COUNTER)?;

    assert!(matches!(
        fixture.engine.apply_patch(&grow_counter(), true),
        Err(Error::Redefinition(_))
    ));
    {
        let record = fixture.engine.pool().get(COUNTER)?;
        let ty = record.read().unwrap();
        assert!(ty.declared_method("extra", &[]).is_err());
        assert!(!ty.is_frozen());
    }

    // The rejected method does not poison later redefinitions of the same class
    fixture.engine.apply_patch(&audit_increment(), true)?;
    assert_eq!(counter.redefinition_count(), 1);

    let object = fixture.vm.new_instance(&counter)?;
    fixture.vm.invoke_virtual(&object, "increment", "()V", vec![])?;
    assert_eq!(fixture.hits(), 1);
    Ok(())
}

#[test]
fn rejected_batch_leaves_pool_unpatched() -> Result<()> {
    let fixture = Fixture::new();
    let counter = fixture.vm.load_class(COUNTER)?;
    let greeter = fixture.vm.load_class(GREETER)?;

    let result = fixture
        .engine
        .apply_patches(&[greet_with("never"), audit_increment(), grow_counter()]);
    assert!(matches!(result, Err(Error::Redefinition(_))));

    // Both earlier patches were rolled back too, so the pool still yields the originals
    let copy = fixture.engine.apply_patch(&identity(GREETER), false)?;
    assert_eq!(
        fixture.vm.invoke_static(&copy, "greet", "()Llang/String;", vec![])?,
        Value::from("hello")
    );

    fixture
        .engine
        .apply_patches(&[greet_with("after"), audit_increment()])?;
    assert_eq!(counter.redefinition_count(), 1);
    assert_eq!(
        fixture.vm.invoke_static(&greeter, "greet", "()Llang/String;", vec![])?,
        Value::from("after")
    );

    // One audit call, not two
    let object = fixture.vm.new_instance(&counter)?;
    fixture.vm.invoke_virtual(&object, "increment", "()V", vec![])?;
    assert_eq!(fixture.hits(), 1);
    Ok(())
}

#[test]
fn engines_sharing_a_bridge_attach_once() -> Result<()> {
    let fixture = Fixture::new();
    let sibling = fixture.sibling_engine();
    let counter = fixture.vm.load_class(COUNTER)?;
    let greeter = fixture.vm.load_class(GREETER)?;

    fixture.engine.apply_patch(&greet_with("first"), true)?;
    assert!(sibling.bridge().is_attached());

    sibling.apply_patch(&audit_increment(), true)?;
    sibling.apply_patches(&[greet_with("second")])?;

    assert_eq!(fixture.attacher.calls(), 1);
    assert_eq!(counter.redefinition_count(), 1);
    assert_eq!(greeter.redefinition_count(), 2);
    assert_eq!(
        fixture.vm.invoke_static(&greeter, "greet", "()Llang/String;", vec![])?,
        Value::from("second")
    );
    Ok(())
}

#[test]
fn refused_attach_is_an_attach_error() -> Result<()> {
    let fixture = Fixture::with_config(VmConfig::strict());
    let greeter = fixture.vm.load_class(GREETER)?;

    for _ in 0..2 {
        match fixture.engine.apply_patch(&greet_with("never"), true) {
            Err(Error::Attach(source)) => {
                assert!(matches!(*source, Error::Vm(VmError::AttachNotPermitted)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    // Failures are not cached, every call tries again
    assert_eq!(fixture.attacher.calls(), 2);
    assert!(!fixture.engine.bridge().is_attached());
    assert_eq!(greeter.redefinition_count(), 0);

    // The refused patch is not left behind in the pool
    let copy = fixture.engine.apply_patch(&identity(GREETER), false)?;
    assert_eq!(
        fixture.vm.invoke_static(&copy, "greet", "()Llang/String;", vec![])?,
        Value::from("hello")
    );

    // Defining a patched copy needs no attach
    let copy = fixture.engine.apply_patch(&greet_with("copy"), false)?;
    assert_eq!(
        fixture.vm.invoke_static(&copy, "greet", "()Llang/String;", vec![])?,
        Value::from("copy")
    );
    Ok(())
}

#[test]
fn directory_classpath_end_to_end() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = Arc::new(DirClassPath::new(dir.path()));
    let stored = source.store(&common::counter_class())?;
    assert!(stored.starts_with(dir.path()));

    let vm = Arc::new(Vm::new(VmConfig::default()).with_classpath(source.clone()));
    let pool = Arc::new(TypePool::new());
    pool.append_classpath(source)?;
    let engine = PatchEngine::new(
        pool,
        vm.clone(),
        Arc::new(RedefinitionBridge::new(Arc::new(SelfAttach::new(vm.clone())))),
    );

    let live = vm.load_class(COUNTER)?;
    let object = vm.new_instance(&live)?;

    let double = PatchSpec::builder(COUNTER)
        .method("increment")
        .transform(|_, ty, method| {
            if let ResolvedMethod::Method(id) = method {
                let body = ty
                    .method(id)
                    .and_then(|m| m.body.as_ref())
                    .map(|body| body.code.clone())
                    .ok_or_else(|| Error::Error("increment has no body".into()))?;
                // Run the original code twice
                let once: Vec<_> = body
                    .into_iter()
                    .filter(|instruction| *instruction != Instruction::Return)
                    .collect();
                ty.insert_before(id, &once)?;
            }
            Ok(())
        })
        .build()?;

    engine.apply_patch(&double, true)?;
    vm.invoke_virtual(&object, "increment", "()V", vec![])?;
    assert_eq!(vm.invoke_virtual(&object, "get", "()I", vec![])?, Value::Int(2));
    Ok(())
}
