use std::{
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, RwLock,
    },
};

use crate::{
    classfile::{ClassDef, FieldDef, MethodDef},
    runtime::{Value, VmError},
    signatures::MethodSignature,
};

/// Identifies the namespace a class was loaded into.
///
/// Classes loaded from the classpath share [`LoaderId::SYSTEM`]; every class defined from
/// raw bytes gets a loader of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoaderId(pub(crate) u64);

impl LoaderId {
    /// The namespace of classes loaded from the classpath
    pub const SYSTEM: LoaderId = LoaderId(0);

    /// Returns `true` for the system namespace
    #[must_use]
    pub fn is_system(self) -> bool {
        self == Self::SYSTEM
    }
}

/// A class loaded into a [`crate::runtime::Vm`]
pub struct LoadedClass {
    name: String,
    loader: LoaderId,
    super_class: Option<ClassHandle>,
    code: RwLock<Arc<ClassDef>>,
    statics: RwLock<HashMap<String, Value>>,
    redefinitions: AtomicU32,
}

/// Reference-counted handle of a loaded class.
///
/// Handles compare by identity: a patched copy defined under the same name is a different
/// class than the original.
#[derive(Clone)]
pub struct ClassHandle(Arc<LoadedClass>);

impl ClassHandle {
    pub(crate) fn new(
        loader: LoaderId,
        definition: ClassDef,
        super_class: Option<ClassHandle>,
    ) -> Self {
        let statics = definition
            .fields
            .iter()
            .filter(|field| field.is_static())
            .map(|field| (field.name.clone(), Value::default_for(&field.descriptor)))
            .collect();

        ClassHandle(Arc::new(LoadedClass {
            name: definition.name.clone(),
            loader,
            super_class,
            code: RwLock::new(Arc::new(definition)),
            statics: RwLock::new(statics),
            redefinitions: AtomicU32::new(0),
        }))
    }

    /// Qualified name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The namespace the class was loaded into
    #[must_use]
    pub fn loader(&self) -> LoaderId {
        self.0.loader
    }

    /// The resolved superclass
    #[must_use]
    pub fn super_class(&self) -> Option<&ClassHandle> {
        self.0.super_class.as_ref()
    }

    /// The current definition; changes when the class is redefined.
    ///
    /// # Errors
    /// Returns [`VmError::LockPoisoned`] if the code slot is poisoned.
    pub fn definition(&self) -> Result<Arc<ClassDef>, VmError> {
        Ok(vm_read_lock!(self.0.code).clone())
    }

    /// How many times the class was redefined
    #[must_use]
    pub fn redefinition_count(&self) -> u32 {
        self.0.redefinitions.load(Ordering::Acquire)
    }

    /// Returns `true` if `other` is this very class, not merely one with the same name
    #[must_use]
    pub fn same_class(&self, other: &ClassHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns `true` if this class is `ancestor` or inherits from it
    #[must_use]
    pub fn is_subclass_of(&self, ancestor: &ClassHandle) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.same_class(ancestor) {
                return true;
            }
            current = class.super_class();
        }
        false
    }

    /// Finds a method declared by this class or inherited, walking the super chain.
    ///
    /// Returns the declaring class together with the method.
    ///
    /// # Errors
    /// Returns [`VmError::LockPoisoned`] if a code slot is poisoned.
    pub fn lookup_method(
        &self,
        name: &str,
        signature: &MethodSignature,
    ) -> Result<Option<(ClassHandle, MethodDef)>, VmError> {
        let mut current = Some(self);
        while let Some(class) = current {
            let definition = class.definition()?;
            if let Some(method) = definition.method(name, signature) {
                return Ok(Some((class.clone(), method.clone())));
            }
            current = class.super_class();
        }
        Ok(None)
    }

    /// All instance fields of this class and its ancestors, superclass fields first
    ///
    /// # Errors
    /// Returns [`VmError::LockPoisoned`] if a code slot is poisoned.
    pub fn instance_fields(&self) -> Result<Vec<FieldDef>, VmError> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(class) = current {
            chain.push(class.definition()?);
            current = class.super_class();
        }

        Ok(chain
            .iter()
            .rev()
            .flat_map(|definition| definition.fields.iter())
            .filter(|field| !field.is_static())
            .cloned()
            .collect())
    }

    /// The class in the super chain that declares the static field `name`
    ///
    /// # Errors
    /// Returns [`VmError::LockPoisoned`] if a statics table is poisoned.
    pub fn static_owner(&self, name: &str) -> Result<Option<ClassHandle>, VmError> {
        let mut current = Some(self);
        while let Some(class) = current {
            if vm_read_lock!(class.0.statics).contains_key(name) {
                return Ok(Some(class.clone()));
            }
            current = class.super_class();
        }
        Ok(None)
    }

    /// Reads a static field declared by this class.
    ///
    /// # Errors
    /// Returns [`VmError::NoSuchField`] if the class declares no such static field.
    pub fn get_static(&self, name: &str) -> Result<Value, VmError> {
        vm_read_lock!(self.0.statics)
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::NoSuchField {
                class: self.name().to_string(),
                field: name.to_string(),
            })
    }

    /// Writes a static field declared by this class.
    ///
    /// # Errors
    /// Returns [`VmError::NoSuchField`] if the class declares no such static field.
    pub fn set_static(&self, name: &str, value: Value) -> Result<(), VmError> {
        let mut statics = vm_write_lock!(self.0.statics);
        match statics.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(VmError::NoSuchField {
                class: self.name().to_string(),
                field: name.to_string(),
            }),
        }
    }

    /// Swaps in a new definition; static values are kept.
    pub(crate) fn swap_definition(&self, definition: ClassDef) -> Result<(), VmError> {
        *vm_write_lock!(self.0.code) = Arc::new(definition);
        self.0.redefinitions.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

impl PartialEq for ClassHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_class(other)
    }
}

impl Eq for ClassHandle {}

impl Hash for ClassHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for ClassHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassHandle")
            .field("name", &self.0.name)
            .field("loader", &self.0.loader)
            .field("redefinitions", &self.redefinition_count())
            .finish()
    }
}

impl fmt::Display for ClassHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}
