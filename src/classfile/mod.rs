//! The class image toolkit: class model, binary codec, verifier and body editing.
//!
//! A class image is the unit that moves between the [`crate::pool::TypePool`], the patch
//! pipeline and the runtime. This module owns its in-memory form ([`ClassDef`]) and the
//! little-endian binary layout:
//!
//! ```text
//! u32 magic = 0x4C435054 ("TPCL")   u16 version = 1
//! u16 class flags   string name   u8 has_super [string super]
//! cuint field_count  { u16 flags, string name, string descriptor }*
//! cuint method_count { u16 flags, string name, string descriptor, u8 has_body
//!                      [cuint max_locals, cuint max_stack, cuint code_len, insn*] }*
//! ```
//!
//! # Key Components
//!
//! - [`ClassDef`], [`FieldDef`], [`MethodDef`], [`MethodBody`] - The class model
//! - [`Instruction`] - The stack machine instruction set
//! - [`decode_class`] / [`encode_class`] - The binary codec
//! - [`verify_class`] / [`update_max_stack`] - Structural verification
//! - [`MethodBody::insert_before`], [`MethodBody::insert_after`], [`MethodBody::replace`] -
//!   Body editing with branch relocation

mod edit;
mod instruction;
mod reader;
mod types;
mod verify;
mod writer;

pub use instruction::*;
pub use reader::{decode_class, read_instruction};
pub use types::*;
pub use verify::{compute_max_stack, update_max_stack, verify_class};
pub use writer::{encode_class, encode_instruction};

use crate::Result;

/// Magic number at the start of every class image, `TPCL` in file order
pub const CLASS_MAGIC: u32 = 0x4C43_5054;

/// Version of the class image layout
pub const CLASS_VERSION: u16 = 1;

impl ClassDef {
    /// Decodes a class image.
    ///
    /// # Errors
    /// See [`decode_class`].
    pub fn from_bytes(data: &[u8]) -> Result<ClassDef> {
        decode_class(data)
    }

    /// Encodes this class into its image, without verifying it.
    ///
    /// # Errors
    /// See [`encode_class`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_class(self)
    }
}
