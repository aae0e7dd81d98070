use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock},
};

use crate::{
    runtime::{ClassHandle, VmError},
    signatures::TypeSignature,
};

/// A value on the operand stack, in a local slot or in a field.
///
/// All integral types narrower than `long` are carried as [`Value::Int`], `float` is carried
/// as [`Value::Double`]. References compare by identity.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value, the result of a `void` call
    #[default]
    Void,
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 64-bit float
    Double(f64),
    /// Immutable string
    Str(Arc<str>),
    /// Reference to an object
    Ref(ObjectRef),
    /// The null reference
    Null,
}

impl Value {
    /// The zero value a field or local of type `ty` starts with
    #[must_use]
    pub fn default_for(ty: &TypeSignature) -> Value {
        match ty {
            TypeSignature::Void => Value::Void,
            TypeSignature::Long => Value::Long(0),
            TypeSignature::Float | TypeSignature::Double => Value::Double(0.0),
            TypeSignature::Class(_) | TypeSignature::Array(_) => Value::Null,
            _ => Value::Int(0),
        }
    }

    /// Short name of the value's kind, used in error messages
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::Ref(_) => "object",
            Value::Null => "null",
        }
    }

    /// The integer carried by this value.
    ///
    /// # Errors
    /// Returns [`VmError::TypeMismatch`] for any other kind.
    pub fn as_int(&self) -> Result<i32, VmError> {
        match self {
            Value::Int(value) => Ok(*value),
            other => Err(VmError::type_mismatch("int", other)),
        }
    }

    /// The long carried by this value.
    ///
    /// # Errors
    /// Returns [`VmError::TypeMismatch`] for any other kind.
    pub fn as_long(&self) -> Result<i64, VmError> {
        match self {
            Value::Long(value) => Ok(*value),
            other => Err(VmError::type_mismatch("long", other)),
        }
    }

    /// The object referenced by this value.
    ///
    /// # Errors
    /// Returns [`VmError::NullReference`] for null and [`VmError::TypeMismatch`] for
    /// non-reference kinds.
    pub fn as_object(&self) -> Result<&ObjectRef, VmError> {
        match self {
            Value::Ref(object) => Ok(object),
            Value::Null => Err(VmError::NullReference),
            other => Err(VmError::type_mismatch("object", other)),
        }
    }

    /// The string carried by this value, if any
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` for values that count as false in a conditional branch
    ///
    /// # Errors
    /// Returns [`VmError::TypeMismatch`] for `void` and `double`.
    pub fn is_zero(&self) -> Result<bool, VmError> {
        match self {
            Value::Int(value) => Ok(*value == 0),
            Value::Long(value) => Ok(*value == 0),
            Value::Null => Ok(true),
            Value::Ref(_) | Value::Str(_) => Ok(false),
            other => Err(VmError::type_mismatch("int", other)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Long(value) => write!(f, "{value}"),
            Value::Double(value) => write!(f, "{value}"),
            Value::Str(value) => f.write_str(value),
            Value::Ref(object) => write!(f, "{}@{:p}", object.class().name(), Arc::as_ptr(object)),
            Value::Null => f.write_str("null"),
        }
    }
}

/// Shared reference to a heap object
pub type ObjectRef = Arc<Object>;

/// An instance of a loaded class
pub struct Object {
    class: ClassHandle,
    fields: RwLock<HashMap<String, Value>>,
}

impl Object {
    pub(crate) fn new(class: ClassHandle, fields: HashMap<String, Value>) -> Self {
        Object {
            class,
            fields: RwLock::new(fields),
        }
    }

    /// The class the object was instantiated from
    #[must_use]
    pub fn class(&self) -> &ClassHandle {
        &self.class
    }

    /// Reads an instance field.
    ///
    /// # Errors
    /// Returns [`VmError::NoSuchField`] if the object has no such field.
    pub fn get_field(&self, name: &str) -> Result<Value, VmError> {
        let fields = vm_read_lock!(self.fields);
        fields.get(name).cloned().ok_or_else(|| VmError::NoSuchField {
            class: self.class.name().to_string(),
            field: name.to_string(),
        })
    }

    /// Writes an instance field.
    ///
    /// # Errors
    /// Returns [`VmError::NoSuchField`] if the object has no such field.
    pub fn set_field(&self, name: &str, value: Value) -> Result<(), VmError> {
        let mut fields = vm_write_lock!(self.fields);
        match fields.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(VmError::NoSuchField {
                class: self.class.name().to_string(),
                field: name.to_string(),
            }),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_types() {
        assert_eq!(Value::default_for(&TypeSignature::Boolean), Value::Int(0));
        assert_eq!(Value::default_for(&TypeSignature::Long), Value::Long(0));
        assert_eq!(Value::default_for(&TypeSignature::Float), Value::Double(0.0));
        assert_eq!(
            Value::default_for(&TypeSignature::class("pkg.Counter")),
            Value::Null
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::from(3).as_int().unwrap(), 3);
        assert!(matches!(
            Value::from(3i64).as_int(),
            Err(VmError::TypeMismatch { .. })
        ));
        assert!(matches!(Value::Null.as_object(), Err(VmError::NullReference)));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert!(Value::Null.is_zero().unwrap());
        assert!(Value::Void.is_zero().is_err());
    }
}
