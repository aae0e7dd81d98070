use std::{
    collections::BTreeSet,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use dashmap::DashMap;
use log::{debug, warn};

use crate::{
    classfile::{verify_class, ClassDef},
    instrument::RedefinitionUnit,
    pool::ClassPath,
    runtime::{
        interpreter::{new_object, Interpreter},
        ClassHandle, HostRuntime, LoaderId, ObjectRef, Value, VmConfig, VmError,
    },
    signatures::parse_method_descriptor,
    Error, Result,
};

/// Maximum length of a superclass chain.
const MAX_HIERARCHY_DEPTH: usize = 64;

/// A native function callable from class code.
///
/// Natives receive the call's arguments and return a value or a failure message.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync>;

/// The reference runtime: a small stack machine that loads, defines, runs and redefines
/// classes.
///
/// Classes loaded from the classpath live in the system namespace, one class per name.
/// [`Vm::define_class`] instead gives every definition a namespace of its own, so a patched
/// copy of a class never replaces the class that is already loaded under that name. Code
/// inside a class resolves names to the class itself first and to the system namespace
/// otherwise.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use typepatch::classfile::{ClassDef, ClassFlags, Instruction, MemberFlags, MethodDef};
/// use typepatch::pool::MemoryClassPath;
/// use typepatch::runtime::{Value, Vm, VmConfig};
/// use typepatch::signatures::{MethodSignature, TypeSignature};
///
/// let mut class = ClassDef::new("pkg.Answer", ClassFlags::PUBLIC);
/// class.methods.push(MethodDef::new(
///     MemberFlags::PUBLIC | MemberFlags::STATIC,
///     "get",
///     MethodSignature::new(vec![], TypeSignature::Int),
///     vec![Instruction::int(42), Instruction::ReturnValue],
/// ));
/// typepatch::classfile::update_max_stack(&mut class)?;
///
/// let source = MemoryClassPath::new();
/// source.add_class(&class)?;
/// let vm = Vm::new(VmConfig::default()).with_classpath(Arc::new(source));
///
/// let answer = vm.load_class("pkg.Answer")?;
/// assert_eq!(vm.invoke_static(&answer, "get", "()I", vec![])?, Value::Int(42));
/// # Ok::<(), typepatch::Error>(())
/// ```
pub struct Vm {
    config: VmConfig,
    classpath: RwLock<Vec<Arc<dyn ClassPath>>>,
    system: DashMap<String, ClassHandle>,
    defined: boxcar::Vec<ClassHandle>,
    natives: DashMap<String, NativeFn>,
    next_loader: AtomicU64,
    /// Held for reading during method lookup and for writing while classes are swapped
    pub(crate) safepoint: RwLock<()>,
}

impl Vm {
    /// Creates a runtime without classpath sources
    #[must_use]
    pub fn new(config: VmConfig) -> Self {
        Vm {
            config,
            classpath: RwLock::new(Vec::new()),
            system: DashMap::new(),
            defined: boxcar::Vec::new(),
            natives: DashMap::new(),
            next_loader: AtomicU64::new(1),
            safepoint: RwLock::new(()),
        }
    }

    /// Adds a classpath source
    #[must_use]
    pub fn with_classpath(mut self, source: Arc<dyn ClassPath>) -> Self {
        match self.classpath.get_mut() {
            Ok(sources) => sources.push(source),
            Err(poisoned) => poisoned.into_inner().push(source),
        }
        self
    }

    /// Adds a classpath source to a shared runtime.
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the source list is poisoned.
    pub fn append_classpath(&self, source: Arc<dyn ClassPath>) -> Result<()> {
        write_lock!(self.classpath).push(source);
        Ok(())
    }

    /// The configuration the runtime was created with
    #[must_use]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Registers a native under `name`.
    ///
    /// Methods flagged `NATIVE` are bound to the native named `<class>.<method>`;
    /// `CallNative` instructions name their native directly.
    pub fn register_native<F>(&self, name: impl Into<String>, native: F)
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.natives.insert(name.into(), Arc::new(native));
    }

    pub(crate) fn native(&self, name: &str) -> Option<NativeFn> {
        self.natives.get(name).map(|native| native.value().clone())
    }

    /// Number of classes loaded or defined so far
    #[must_use]
    pub fn loaded_class_count(&self) -> usize {
        self.system.len() + self.defined.count()
    }

    /// Returns the class `name` of the system namespace, loading it from the classpath on
    /// first use.
    ///
    /// # Errors
    /// Returns [`VmError::ClassNotFound`] if no source provides the class, or the
    /// decoding, verification or linkage failure.
    pub fn load_class(&self, name: &str) -> Result<ClassHandle> {
        self.load_system_class(name, 0)
    }

    fn load_system_class(&self, name: &str, depth: usize) -> Result<ClassHandle> {
        if let Some(class) = self.system.get(name) {
            return Ok(class.value().clone());
        }
        if depth > MAX_HIERARCHY_DEPTH {
            return Err(VmError::Linkage {
                class: name.to_string(),
                reason: "superclass chain too deep or circular".to_string(),
            }
            .into());
        }

        let Some(image) = self.find_image(name)? else {
            return Err(VmError::ClassNotFound(name.to_string()).into());
        };
        let definition = self.decode(&image)?;
        if definition.name != name {
            return Err(VmError::Linkage {
                class: name.to_string(),
                reason: format!("image declares {}", definition.name),
            }
            .into());
        }

        let super_class = match &definition.super_name {
            Some(super_name) => Some(self.load_system_class(super_name, depth + 1)?),
            None => None,
        };

        let class = ClassHandle::new(LoaderId::SYSTEM, definition, super_class);
        let class = self
            .system
            .entry(name.to_string())
            .or_insert(class)
            .value()
            .clone();
        debug!("vm: loaded {}", name);
        Ok(class)
    }

    fn find_image(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let sources = read_lock!(self.classpath);
        for source in sources.iter() {
            if let Some(image) = source.find(name)? {
                return Ok(Some(image));
            }
        }
        Ok(None)
    }

    fn decode(&self, image: &[u8]) -> Result<ClassDef> {
        let definition = ClassDef::from_bytes(image)?;
        if self.config.verify_on_define {
            verify_class(&definition)?;
        }
        Ok(definition)
    }

    /// Resolves a class name as seen from code of `context`.
    pub(crate) fn resolve_class(&self, context: &ClassHandle, name: &str) -> Result<ClassHandle> {
        if context.name() == name {
            return Ok(context.clone());
        }
        self.load_class(name)
    }

    /// Allocates an instance with every field at its zero value.
    pub(crate) fn allocate(&self, class: &ClassHandle) -> Result<ObjectRef> {
        if class.definition()?.is_abstract() {
            return Err(VmError::TypeMismatch {
                expected: "instantiable class".to_string(),
                found: format!("abstract {}", class.name()),
            }
            .into());
        }
        Ok(new_object(class)?)
    }

    /// Creates an instance of `class` with every field at its zero value.
    ///
    /// # Errors
    /// Returns [`VmError::TypeMismatch`] for abstract classes and interfaces.
    pub fn new_instance(&self, class: &ClassHandle) -> Result<ObjectRef> {
        self.allocate(class)
    }

    /// Calls an instance method, dispatching on the receiver's class.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] for an invalid descriptor and [`Error::Vm`] for
    /// failures during execution.
    pub fn invoke_virtual(
        &self,
        receiver: &ObjectRef,
        name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        let signature = parse_method_descriptor(descriptor)?;
        Interpreter::new(self).invoke_virtual(receiver.clone(), name, &signature, args)
    }

    /// Calls a static method of `class` or one of its ancestors.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] for an invalid descriptor and [`Error::Vm`] for
    /// failures during execution.
    pub fn invoke_static(
        &self,
        class: &ClassHandle,
        name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        let signature = parse_method_descriptor(descriptor)?;
        Interpreter::new(self).invoke_static(class, name, &signature, args)
    }

    /// Reads a static field of `class` or one of its ancestors.
    ///
    /// # Errors
    /// Returns [`VmError::NoSuchField`] if no class in the chain declares the field.
    pub fn get_static(&self, class: &ClassHandle, field: &str) -> Result<Value> {
        let owner = class
            .static_owner(field)?
            .ok_or_else(|| VmError::NoSuchField {
                class: class.name().to_string(),
                field: field.to_string(),
            })?;
        Ok(owner.get_static(field)?)
    }

    /// Swaps the code of live classes, all or nothing.
    ///
    /// Every unit is decoded, verified and checked for schema compatibility before the
    /// first class is touched. The swap itself happens while holding the safepoint, so no
    /// method lookup observes a partially redefined batch. Static values are kept and
    /// existing instances see the new code on their next call.
    pub(crate) fn redefine_classes(&self, units: &[RedefinitionUnit]) -> Result<Vec<ClassHandle>> {
        let mut prepared = Vec::with_capacity(units.len());
        for unit in units {
            match self.prepare_redefinition(unit) {
                Ok(definition) => prepared.push((unit.class.clone(), definition)),
                Err(error) => {
                    warn!("vm: redefinition of {} rejected: {}", unit.class.name(), error);
                    return Err(error);
                }
            }
        }

        {
            let _safepoint = write_lock!(self.safepoint);
            for (class, definition) in prepared {
                class.swap_definition(definition)?;
            }
        }

        debug!("vm: redefined {} classes", units.len());
        Ok(units.iter().map(|unit| unit.class.clone()).collect())
    }

    fn prepare_redefinition(&self, unit: &RedefinitionUnit) -> Result<ClassDef> {
        let definition = self.decode(&unit.bytecode)?;
        let current = unit.class.definition()?;

        let unsupported = |reason: String| -> Error {
            VmError::UnsupportedRedefinition {
                class: unit.class.name().to_string(),
                reason,
            }
            .into()
        };

        if definition.name != current.name {
            return Err(unsupported(format!("image declares {}", definition.name)));
        }
        if definition.super_name != current.super_name {
            return Err(unsupported("superclass changed".to_string()));
        }
        if definition.flags != current.flags {
            return Err(unsupported("class flags changed".to_string()));
        }

        let field_schema = |class: &ClassDef| -> BTreeSet<(String, String, bool)> {
            class
                .fields
                .iter()
                .map(|field| (field.name.clone(), field.descriptor.descriptor(), field.is_static()))
                .collect()
        };
        if field_schema(&definition) != field_schema(current.as_ref()) {
            return Err(unsupported("fields added, removed or changed".to_string()));
        }

        let method_schema = |class: &ClassDef| -> BTreeSet<(String, String)> {
            class
                .methods
                .iter()
                .map(|method| (method.name.clone(), method.descriptor()))
                .collect()
        };
        if method_schema(&definition) != method_schema(current.as_ref()) {
            return Err(unsupported("methods added or removed".to_string()));
        }

        Ok(definition)
    }
}

impl HostRuntime for Vm {
    fn define_class(&self, bytecode: &[u8]) -> Result<ClassHandle> {
        let definition = self.decode(bytecode)?;
        let super_class = match &definition.super_name {
            Some(super_name) => Some(self.load_class(super_name)?),
            None => None,
        };

        let loader = LoaderId(self.next_loader.fetch_add(1, Ordering::Relaxed));
        let name = definition.name.clone();
        let class = ClassHandle::new(loader, definition, super_class);
        self.defined.push(class.clone());

        debug!("vm: defined {} in loader {}", name, loader.0);
        Ok(class)
    }

    fn find_loaded_class(&self, name: &str) -> Option<ClassHandle> {
        self.system.get(name).map(|class| class.value().clone())
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("config", &self.config)
            .field("loaded", &self.system.len())
            .field("defined", &self.defined.count())
            .finish_non_exhaustive()
    }
}
