//! Low-level byte stream parser for class image decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data
//! parser used by the class image reader. It offers bounds-checked access to binary data,
//! little-endian primitive reads, compressed integer decoding and length-prefixed strings.
//!
//! # Usage Examples
//!
//! ```rust
//! use typepatch::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04];
//! let mut parser = Parser::new(&data);
//!
//! let value = parser.read_le::<u16>()?;
//! assert_eq!(value, 0x0201);
//! assert_eq!(parser.pos(), 2);
//! # Ok::<(), typepatch::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, ByteIO},
    Error::OutOfBounds,
    Result,
};

/// A generic binary data parser for reading class images.
///
/// `Parser` maintains an internal position cursor and provides bounds checking to prevent
/// buffer overruns when reading malformed or truncated data. Every read either succeeds and
/// advances the cursor, or fails with [`crate::Error::OutOfBounds`] /
/// [`crate::Error::Malformed`].
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new `Parser` from a byte slice
    ///
    /// ## Arguments
    /// * 'data' - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the underlying data is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if there is more data to parse
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Returns the current position of the cursor
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Read a value of type `T` in little-endian format and advance the cursor
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: ByteIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a compressed unsigned integer.
    ///
    /// The encoding uses the top bits of the first byte to select 1, 2 or 4 byte forms:
    /// `0xxxxxxx`, `10xxxxxx xxxxxxxx` and `110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for invalid encoding.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_le::<u8>()?;

        // 1-byte encoding: 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        // 2-byte encoding: 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_le::<u8>()?;
            let value = ((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte);
            return Ok(value);
        }

        // 4-byte encoding: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let b1 = u32::from(self.read_le::<u8>()?);
            let b2 = u32::from(self.read_le::<u8>()?);
            let b3 = u32::from(self.read_le::<u8>()?);
            let value = ((u32::from(first_byte) & 0x1F) << 24) | (b1 << 16) | (b2 << 8) | b3;
            return Ok(value);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Read a compressed unsigned integer that is used as a count or an index.
    ///
    /// # Errors
    /// See [`Parser::read_compressed_uint`].
    pub fn read_compressed_usize(&mut self) -> Result<usize> {
        Ok(self.read_compressed_uint()? as usize)
    }

    /// Read a compressed-length-prefixed UTF-8 string.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the string extends past the data or
    /// [`crate::Error::Malformed`] if the bytes are not valid UTF-8.
    pub fn read_prefixed_string_utf8(&mut self) -> Result<String> {
        let length = self.read_compressed_usize()?;

        if self.position + length > self.data.len() {
            return Err(OutOfBounds);
        }

        let string_data = &self.data[self.position..self.position + length];
        self.position += length;

        String::from_utf8(string_data.to_vec()).map_err(|e| {
            malformed_error!(
                "Invalid UTF-8 string at offset {}-{}: {}",
                self.position - length,
                self.position,
                e.utf8_error()
            )
        })
    }

    /// Read a single byte that must be `0` or `1`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for any other value.
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_le::<u8>()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(malformed_error!(
                "Invalid boolean byte {} at offset {}",
                other,
                self.position - 1
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_read_le() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_le::<u32>().unwrap(), 0x04030201);
        assert_eq!(parser.read_le::<u16>().unwrap(), 0x0605);
        assert_eq!(parser.pos(), 6);
        assert!(parser.has_more_data());
        assert!(parser.read_le::<u32>().is_err());
    }

    #[test]
    fn test_failed_read_keeps_position() {
        let data = [0x2A, 0x00, 0x01];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_le::<u16>().unwrap(), 42);
        assert!(matches!(parser.read_le::<u16>(), Err(Error::OutOfBounds)));
        assert_eq!(parser.pos(), 2);
        assert_eq!(parser.read_le::<u8>().unwrap(), 1);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn test_compressed_uint() {
        let test_cases = vec![
            (vec![0x03], 3),
            (vec![0x7F], 0x7F),
            (vec![0x80, 0x80], 0x80),
            (vec![0xAE, 0x57], 0x2E57),
            (vec![0xBF, 0xFF], 0x3FFF),
            (vec![0xC0, 0x00, 0x40, 0x00], 0x4000),
            (vec![0xDF, 0xFF, 0xFF, 0xFF], 0x1FFF_FFFF),
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            assert_eq!(parser.read_compressed_uint().unwrap(), expected);
            assert!(!parser.has_more_data());
        }

        let mut parser = Parser::new(&[0xE0, 0, 0, 0]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_prefixed_string() {
        let data = [0x05, b'h', b'e', b'l', b'l', b'o', 0x02, b'h'];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_prefixed_string_utf8().unwrap(), "hello");
        assert!(matches!(
            parser.read_prefixed_string_utf8(),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn test_read_bool() {
        let mut parser = Parser::new(&[0x00, 0x01, 0x02]);
        assert!(!parser.read_bool().unwrap());
        assert!(parser.read_bool().unwrap());
        assert!(parser.read_bool().is_err());
    }
}
