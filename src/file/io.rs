//! Low-level byte order and safe reading/writing utilities for class images.
//!
//! This module provides endian-aware, bounds-checked reading of primitive values from byte
//! buffers, and the matching append-style writers used by the class image encoder.
//!
//! # Key Components
//!
//! - [`crate::file::io::ByteIO`] - Trait defining little-endian conversion for primitive types
//! - [`crate::file::io::read_le_at`] - Read a value at an offset and advance the offset
//! - [`crate::file::io::write_le`] - Append a value in little-endian format
//! - [`crate::file::io::write_compressed_uint`] - Append an ECMA-335 style compressed integer
//! - [`crate::file::io::write_prefixed_string`] - Append a length-prefixed UTF-8 string
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use typepatch::file::io::{read_le_at, write_le};
//!
//! let mut data = Vec::new();
//! write_le(&mut data, 1u16);
//! write_le(&mut data, 2u32);
//!
//! let mut offset = 0;
//! let first: u16 = read_le_at(&data, &mut offset)?;
//! let second: u32 = read_le_at(&data, &mut offset)?;
//! assert_eq!((first, second, offset), (1, 2, 6));
//! # Ok::<(), typepatch::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Largest value representable by the compressed unsigned integer encoding.
pub const MAX_COMPRESSED_UINT: u32 = 0x1FFF_FFFF;

/// Trait for primitive types that can be read from and written to little-endian byte buffers.
pub trait ByteIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_byte_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl ByteIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_byte_io! {
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f64 => 8,
}

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the size of `T` on success and left untouched on failure.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset.checked_add(type_len).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Appends `value` to `buffer` in little-endian byte order.
pub fn write_le<T: ByteIO>(buffer: &mut Vec<u8>, value: T) {
    buffer.extend_from_slice(value.to_le_bytes().as_ref());
}

/// Appends `value` as a compressed unsigned integer.
///
/// Values below `0x80` take one byte, values below `0x4000` two bytes, anything up to
/// [`MAX_COMPRESSED_UINT`] four bytes (big-endian, with the length encoded in the top bits
/// of the first byte).
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if `value` exceeds [`MAX_COMPRESSED_UINT`].
pub fn write_compressed_uint(value: u32, buffer: &mut Vec<u8>) -> Result<()> {
    if value < 0x80 {
        buffer.push(value as u8);
    } else if value < 0x4000 {
        buffer.push(0x80 | (value >> 8) as u8);
        buffer.push(value as u8);
    } else if value <= MAX_COMPRESSED_UINT {
        buffer.push(0xC0 | (value >> 24) as u8);
        buffer.push((value >> 16) as u8);
        buffer.push((value >> 8) as u8);
        buffer.push(value as u8);
    } else {
        return Err(malformed_error!(
            "Value {} is too large for a compressed uint",
            value
        ));
    }

    Ok(())
}

/// Appends `value` as a compressed-length-prefixed UTF-8 string.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the string is longer than [`MAX_COMPRESSED_UINT`] bytes.
pub fn write_prefixed_string(value: &str, buffer: &mut Vec<u8>) -> Result<()> {
    let Ok(length) = u32::try_from(value.len()) else {
        return Err(malformed_error!("String of {} bytes is too long", value.len()));
    };

    write_compressed_uint(length, buffer)?;
    buffer.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Appends a count or index as a compressed unsigned integer.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if `value` does not fit the compressed encoding.
pub fn write_compressed_usize(value: usize, buffer: &mut Vec<u8>) -> Result<()> {
    let Ok(value) = u32::try_from(value) else {
        return Err(malformed_error!("Count {} is too large", value));
    };

    write_compressed_uint(value, buffer)
}
