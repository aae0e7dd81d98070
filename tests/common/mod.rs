//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use typepatch::{
    classfile::{
        update_max_stack, ClassDef, ClassFlags, FieldDef, FieldRef, Instruction, MemberFlags,
        MethodDef, NativeRef,
    },
    prelude::*,
};

pub const COUNTER: &str = "pkg.Counter";
pub const GREETER: &str = "pkg.Greeter";
pub const AUDIT_HOOK: &str = "audit.hit";

/// `pkg.Counter` with an int field `count`, `void increment()` and `int get()`
pub fn counter_class() -> ClassDef {
    let count = FieldRef::new(COUNTER, "count", TypeSignature::Int);

    let mut class = ClassDef::new(COUNTER, ClassFlags::PUBLIC);
    class
        .fields
        .push(FieldDef::new(MemberFlags::PRIVATE, "count", TypeSignature::Int));
    class.methods.push(MethodDef::new(
        MemberFlags::PUBLIC,
        "increment",
        MethodSignature::void(),
        vec![
            Instruction::Load(0),
            Instruction::Load(0),
            Instruction::GetField(count.clone()),
            Instruction::int(1),
            Instruction::Add,
            Instruction::PutField(count.clone()),
            Instruction::Return,
        ],
    ));
    class.methods.push(MethodDef::new(
        MemberFlags::PUBLIC,
        "get",
        MethodSignature::new(vec![], TypeSignature::Int),
        vec![
            Instruction::Load(0),
            Instruction::GetField(count),
            Instruction::ReturnValue,
        ],
    ));
    update_max_stack(&mut class).unwrap();
    class
}

/// `pkg.Greeter` with `static String greet()` returning `"hello"`
pub fn greeter_class() -> ClassDef {
    let mut class = ClassDef::new(GREETER, ClassFlags::PUBLIC);
    class.methods.push(MethodDef::new(
        MemberFlags::PUBLIC | MemberFlags::STATIC,
        "greet",
        MethodSignature::new(vec![], TypeSignature::class("lang.String")),
        vec![Instruction::string("hello"), Instruction::ReturnValue],
    ));
    update_max_stack(&mut class).unwrap();
    class
}

pub fn classpath() -> Arc<MemoryClassPath> {
    let source = MemoryClassPath::new();
    source.add_class(&counter_class()).unwrap();
    source.add_class(&greeter_class()).unwrap();
    Arc::new(source)
}

/// Counts attaches and forwards to [`SelfAttach`]
pub struct CountingAttacher {
    inner: SelfAttach,
    pub calls: AtomicUsize,
}

impl CountingAttacher {
    pub fn new(vm: Arc<Vm>) -> Self {
        CountingAttacher {
            inner: SelfAttach::new(vm),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Attacher for CountingAttacher {
    fn attach(&self) -> Result<Arc<dyn Instrumentation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.attach()
    }
}

/// A VM, an engine over a private pool and the attacher the engine's bridge uses.
///
/// The VM has the native `audit.hit` registered; every call bumps `hits`.
pub struct Fixture {
    pub vm: Arc<Vm>,
    pub engine: PatchEngine,
    pub attacher: Arc<CountingAttacher>,
    pub hits: Arc<AtomicUsize>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let source = classpath();
        let vm = Arc::new(Vm::new(config).with_classpath(source.clone()));

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        vm.register_native(AUDIT_HOOK, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Void)
        });

        let pool = Arc::new(TypePool::new());
        pool.append_classpath(source).unwrap();

        let attacher = Arc::new(CountingAttacher::new(vm.clone()));
        let bridge = Arc::new(RedefinitionBridge::new(attacher.clone()));
        let engine = PatchEngine::new(pool, vm.clone(), bridge);

        Fixture {
            vm,
            engine,
            attacher,
            hits,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Another engine over its own pool that shares this fixture's VM and bridge
    pub fn sibling_engine(&self) -> PatchEngine {
        let pool = Arc::new(TypePool::new());
        pool.append_classpath(classpath()).unwrap();
        PatchEngine::new(pool, self.vm.clone(), self.engine.bridge().clone())
    }
}

/// A call of the `audit.hit` native
pub fn audit_call() -> Instruction {
    Instruction::CallNative(NativeRef::new(AUDIT_HOOK, MethodSignature::void()))
}

/// Patches `pkg.Counter.increment()` to call `audit.hit` after its original code
pub fn audit_increment() -> PatchSpec {
    PatchSpec::builder(COUNTER)
        .method("increment")
        .transform(|_, ty, method| {
            if let ResolvedMethod::Method(id) = method {
                ty.insert_after(id, &[audit_call()])?;
            }
            Ok(())
        })
        .build()
        .unwrap()
}

/// Replaces `pkg.Greeter.greet()` to return `text`
pub fn greet_with(text: &'static str) -> PatchSpec {
    PatchSpec::builder(GREETER)
        .method("greet")
        .transform(move |_, ty, method| {
            if let ResolvedMethod::Method(id) = method {
                ty.set_body(id, vec![Instruction::string(text), Instruction::ReturnValue])?;
            }
            Ok(())
        })
        .build()
        .unwrap()
}
