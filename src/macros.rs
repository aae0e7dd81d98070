#![allow(unused_macros)]

/// Helper macro for reading locked items
///
/// Evaluates to the read guard, or returns [`crate::Error::LockError`] from the
/// enclosing function if the lock is poisoned.
///
/// ```rust, ignore
///  let ty = read_lock!(mutable_type_rc);
///  println!("{}", ty.name());
/// ```
macro_rules! read_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.read().map_err(|_| crate::Error::LockError)?
    };
}

/// Helper macro for writing to locked items
///
/// Evaluates to the write guard, or returns [`crate::Error::LockError`] from the
/// enclosing function if the lock is poisoned.
///
/// ```rust, ignore
///  let mut ty = write_lock!(mutable_type_rc);
///  ty.thaw();
/// ```
macro_rules! write_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.write().map_err(|_| crate::Error::LockError)?
    };
}

/// Helper macro for reading locked items from code that reports [`crate::runtime::VmError`]
///
/// ```rust, ignore
///  let statics = vm_read_lock!(class.statics);
/// ```
macro_rules! vm_read_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock
            .read()
            .map_err(|_| crate::runtime::VmError::LockPoisoned)?
    };
}

/// Helper macro for writing locked items from code that reports [`crate::runtime::VmError`]
///
/// ```rust, ignore
///  vm_write_lock!(object.fields).insert(name, value);
/// ```
macro_rules! vm_write_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock
            .write()
            .map_err(|_| crate::runtime::VmError::LockPoisoned)?
    };
}
