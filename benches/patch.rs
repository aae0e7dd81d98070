//! Benchmarks for the patch pipeline.
//!
//! - Class image decoding and encoding
//! - Patching a method into bytecode (lookup, resolve, transform, finalize)
//! - Live redefinition of a loaded class

extern crate typepatch;

use criterion::{criterion_group, criterion_main, Criterion};
use std::{hint::black_box, sync::Arc};
use typepatch::{
    classfile::{
        decode_class, encode_class, update_max_stack, ClassDef, ClassFlags, FieldDef, FieldRef,
        Instruction, MemberFlags, MethodDef,
    },
    prelude::*,
};

const TARGET: &str = "bench.Accumulator";

/// A class with one int field and `methods` adders `add0(int)` .. `addN(int)`
fn accumulator(methods: usize) -> ClassDef {
    let total = FieldRef::new(TARGET, "total", TypeSignature::Int);

    let mut class = ClassDef::new(TARGET, ClassFlags::PUBLIC);
    class
        .fields
        .push(FieldDef::new(MemberFlags::PRIVATE, "total", TypeSignature::Int));
    for index in 0..methods {
        class.methods.push(MethodDef::new(
            MemberFlags::PUBLIC,
            format!("add{index}"),
            MethodSignature::new(vec![TypeSignature::Int], TypeSignature::Void),
            vec![
                Instruction::Load(0),
                Instruction::Load(0),
                Instruction::GetField(total.clone()),
                Instruction::Load(1),
                Instruction::Add,
                Instruction::PutField(total.clone()),
                Instruction::Return,
            ],
        ));
    }
    update_max_stack(&mut class).unwrap();
    class
}

fn engine(methods: usize) -> (PatchEngine, Arc<Vm>) {
    let source = Arc::new(MemoryClassPath::new());
    source.add_class(&accumulator(methods)).unwrap();

    let pool = Arc::new(TypePool::new());
    pool.append_classpath(source.clone()).unwrap();
    let vm = Arc::new(Vm::new(VmConfig::permissive()).with_classpath(source));
    let bridge = Arc::new(RedefinitionBridge::new(Arc::new(SelfAttach::new(vm.clone()))));
    (PatchEngine::new(pool, vm.clone(), bridge), vm)
}

/// Replaces the body of `add0`, so repeated runs do not grow the method
fn reset_add0() -> PatchSpec {
    PatchSpec::builder(TARGET)
        .method("add0")
        .params_by_name(["int"])
        .transform(|_, ty, method| {
            if let ResolvedMethod::Method(id) = method {
                ty.set_body(id, vec![Instruction::Return])?;
            }
            Ok(())
        })
        .build()
        .unwrap()
}

fn bench_decode(c: &mut Criterion) {
    let image = encode_class(&accumulator(64)).unwrap();

    c.bench_function("classimage_decode_64_methods", |b| {
        b.iter(|| {
            let class = decode_class(black_box(&image)).unwrap();
            black_box(class)
        });
    });
}

fn bench_encode(c: &mut Criterion) {
    let class = accumulator(64);

    c.bench_function("classimage_encode_64_methods", |b| {
        b.iter(|| {
            let image = encode_class(black_box(&class)).unwrap();
            black_box(image)
        });
    });
}

fn bench_get_bytecode(c: &mut Criterion) {
    let (engine, _vm) = engine(64);
    let patch = reset_add0();

    c.bench_function("patch_get_bytecode", |b| {
        b.iter(|| {
            let image = engine.get_bytecode(black_box(&patch)).unwrap();
            black_box(image)
        });
    });
}

fn bench_redefine(c: &mut Criterion) {
    let (engine, vm) = engine(16);
    vm.load_class(TARGET).unwrap();
    let patch = reset_add0();

    c.bench_function("patch_redefine_live", |b| {
        b.iter(|| {
            let class = engine.apply_patch(black_box(&patch), true).unwrap();
            black_box(class)
        });
    });
}

criterion_group!(
    benches,
    bench_decode,
    bench_encode,
    bench_get_bytecode,
    bench_redefine
);
criterion_main!(benches);
