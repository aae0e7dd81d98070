use std::sync::{Arc, RwLock};

use dashmap::{mapref::entry::Entry, DashMap};
use log::debug;
use once_cell::sync::Lazy;

use crate::{
    classfile::ClassDef,
    pool::{ClassPath, MutableType, MutableTypeRc},
    Error, Result,
};

static SHARED_POOL: Lazy<Arc<TypePool>> = Lazy::new(|| Arc::new(TypePool::new()));

/// Registry of editable types, keyed by qualified name.
///
/// Types are stored in an append-only arena and indexed by name. A lookup for a name that
/// is not yet known consults the classpath sources in the order they were appended, decodes
/// the first image found and memoizes the result; every later lookup returns the same
/// [`MutableTypeRc`], so edits made through it accumulate. Entries are never evicted.
///
/// # Thread Safety
///
/// The pool can be shared between threads and engines. The name index is a [`DashMap`]
/// whose entry API guarantees that concurrent first lookups of the same name create a
/// single record. Each record carries its own [`RwLock`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use typepatch::classfile::{ClassDef, ClassFlags};
/// use typepatch::pool::{MemoryClassPath, TypePool};
///
/// let source = MemoryClassPath::new();
/// source.add_class(&ClassDef::new("pkg.Empty", ClassFlags::PUBLIC))?;
///
/// let pool = TypePool::new();
/// pool.append_classpath(Arc::new(source))?;
///
/// let first = pool.get("pkg.Empty")?;
/// let second = pool.get("pkg.Empty")?;
/// assert!(Arc::ptr_eq(&first, &second));
/// assert!(pool.get_or_none("pkg.Missing")?.is_none());
/// # Ok::<(), typepatch::Error>(())
/// ```
#[derive(Default)]
pub struct TypePool {
    /// All records, in creation order
    types: boxcar::Vec<MutableTypeRc>,
    /// Qualified name => index into `types`
    by_name: DashMap<String, usize>,
    /// Sources consulted for unknown names
    classpath: RwLock<Vec<Arc<dyn ClassPath>>>,
}

impl TypePool {
    /// Creates an empty pool without classpath sources
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default pool.
    ///
    /// This is a convenience for hosts that patch a single runtime; every
    /// [`crate::PatchEngine`] still receives its pool explicitly.
    #[must_use]
    pub fn shared() -> Arc<TypePool> {
        SHARED_POOL.clone()
    }

    /// Adds a classpath source, consulted after all sources added before it.
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the source list is poisoned.
    pub fn append_classpath(&self, source: Arc<dyn ClassPath>) -> Result<()> {
        write_lock!(self.classpath).push(source);
        Ok(())
    }

    /// Number of types in the pool
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.count()
    }

    /// Returns `true` if the pool holds no types
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.count() == 0
    }

    /// Returns `true` if `name` was already loaded into the pool; sources are not consulted
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Returns the type named `name`, loading it from the classpath on first use.
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if no source provides the type, or the error of a
    /// source that failed to read or decode it.
    pub fn get(&self, name: &str) -> Result<MutableTypeRc> {
        self.get_or_none(name)?
            .ok_or_else(|| Error::TypeNotFound(name.to_string()))
    }

    /// Returns the type named `name` if any source provides it.
    ///
    /// # Errors
    /// Returns the error of a source that failed to read or decode the type.
    pub fn get_or_none(&self, name: &str) -> Result<Option<MutableTypeRc>> {
        if let Some(index) = self.by_name.get(name) {
            return Ok(self.types.get(*index).cloned());
        }

        let Some(image) = self.find_image(name)? else {
            return Ok(None);
        };
        let class = ClassDef::from_bytes(&image)?;
        if class.name != name {
            return Err(malformed_error!(
                "Classpath image for {} declares class {}",
                name,
                class.name
            ));
        }

        match self.by_name.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(self.types.get(*entry.get()).cloned()),
            Entry::Vacant(entry) => {
                debug!("pool: loaded {} ({} bytes)", name, image.len());
                let record = Arc::new(RwLock::new(MutableType::new(class)));
                let index = self.types.push(record.clone());
                entry.insert(index);
                Ok(Some(record))
            }
        }
    }

    /// Creates a type directly in the pool.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateMember`] if a type with this name is already in the pool.
    pub fn insert(&self, class: ClassDef) -> Result<MutableTypeRc> {
        match self.by_name.entry(class.name.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateMember {
                class: class.name,
                member: "<type>".to_string(),
            }),
            Entry::Vacant(entry) => {
                let record = Arc::new(RwLock::new(MutableType::new(class)));
                let index = self.types.push(record.clone());
                entry.insert(index);
                Ok(record)
            }
        }
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
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{
        pool::MemoryClassPath,
        test::factories::{counter_class, counter_pool},
    };

    #[test]
    fn memoized_lookup() {
        let pool = counter_pool();
        let first = pool.get("pkg.Counter").unwrap();
        let second = pool.get("pkg.Counter").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len(), 1);
        assert!(pool.contains("pkg.Counter"));
    }

    #[test]
    fn missing_type() {
        let pool = counter_pool();
        assert!(matches!(
            pool.get("pkg.Nope"),
            Err(Error::TypeNotFound(name)) if name == "pkg.Nope"
        ));
        assert!(pool.get_or_none("pkg.Nope").unwrap().is_none());
        assert!(!pool.contains("pkg.Nope"));
    }

    #[test]
    fn first_source_wins() {
        let mut shadow = counter_class();
        shadow.fields.clear();

        let first = MemoryClassPath::new();
        first.add_class(&shadow).unwrap();
        let second = MemoryClassPath::new();
        second.add_class(&counter_class()).unwrap();

        let pool = TypePool::new();
        pool.append_classpath(Arc::new(first)).unwrap();
        pool.append_classpath(Arc::new(second)).unwrap();

        let ty = pool.get("pkg.Counter").unwrap();
        assert!(ty.read().unwrap().fields().is_empty());
    }

    #[test]
    fn mismatched_image_name() {
        let source = MemoryClassPath::new();
        source.add("pkg.Alias", counter_class().to_bytes().unwrap());

        let pool = TypePool::new();
        pool.append_classpath(Arc::new(source)).unwrap();
        assert!(matches!(pool.get("pkg.Alias"), Err(Error::Malformed { .. })));
    }

    #[test]
    fn insert_rejects_existing() {
        let pool = counter_pool();
        pool.get("pkg.Counter").unwrap();
        assert!(pool.insert(counter_class()).is_err());

        let created = pool
            .insert(ClassDef::new("pkg.Fresh", crate::classfile::ClassFlags::PUBLIC))
            .unwrap();
        assert!(Arc::ptr_eq(&created, &pool.get("pkg.Fresh").unwrap()));
    }

    #[test]
    fn concurrent_first_lookup() {
        let pool = Arc::new(counter_pool());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || pool.get("pkg.Counter").unwrap())
            })
            .collect();
        let records: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(pool.len(), 1);
        assert!(records.iter().all(|r| Arc::ptr_eq(r, &records[0])));
    }

    #[test]
    fn shared_pool_is_singleton() {
        assert!(Arc::ptr_eq(&TypePool::shared(), &TypePool::shared()));
    }
}
