use std::fmt;

use crate::runtime::ClassHandle;

/// A live class paired with the bytecode that should replace its code.
///
/// Units are consumed by [`crate::instrument::RedefinitionBridge::redefine`].
#[derive(Clone)]
pub struct RedefinitionUnit {
    /// The currently loaded class
    pub class: ClassHandle,
    /// The replacement class image
    pub bytecode: Vec<u8>,
}

impl RedefinitionUnit {
    /// Pairs `class` with its replacement image
    #[must_use]
    pub fn new(class: ClassHandle, bytecode: Vec<u8>) -> Self {
        RedefinitionUnit { class, bytecode }
    }
}

impl fmt::Debug for RedefinitionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedefinitionUnit")
            .field("class", &self.class.name())
            .field("bytecode_len", &self.bytecode.len())
            .finish()
    }
}
