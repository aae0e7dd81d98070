use crate::{
    signatures::{MethodSignature, TypeSignature},
    Error::RecursionLimit,
    Result,
};

/// Maximum number of array dimensions in a single descriptor
pub const MAX_ARRAY_DIMENSIONS: usize = 255;

/// Descriptor parser for field types and method descriptors
///
/// # Example
///
/// ```rust
/// use typepatch::signatures::DescriptorParser;
///
/// let mut parser = DescriptorParser::new("(I[Lpkg/Counter;)V");
/// let sig = parser.parse_method_descriptor()?;
/// assert_eq!(sig.params.len(), 2);
/// # Ok::<(), typepatch::Error>(())
/// ```
///
/// ## Notes:
/// - Do not re-use a parser instance for multiple descriptors, the wrapper functions in
///   [`crate::signatures`] create a fresh one per call.
pub struct DescriptorParser<'a> {
    input: &'a str,
    position: usize,
    depth: usize,
}

impl<'a> DescriptorParser<'a> {
    /// Create a new `DescriptorParser` over a descriptor string
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        DescriptorParser {
            input,
            position: 0,
            depth: 0,
        }
    }

    fn next_char(&mut self) -> Result<char> {
        let Some(c) = self.input[self.position..].chars().next() else {
            return Err(malformed_error!(
                "Unexpected end of descriptor '{}'",
                self.input
            ));
        };
        self.position += c.len_utf8();
        Ok(c)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn parse_class_name(&mut self) -> Result<String> {
        let rest = &self.input[self.position..];
        let Some(end) = rest.find(';') else {
            return Err(malformed_error!(
                "Unterminated class name in descriptor '{}'",
                self.input
            ));
        };

        let binary_name = &rest[..end];
        if binary_name.is_empty()
            || binary_name.split('/').any(str::is_empty)
            || binary_name.contains(['.', '[', '(', ')'])
        {
            return Err(malformed_error!(
                "Invalid class name '{}' in descriptor '{}'",
                binary_name,
                self.input
            ));
        }

        self.position += end + 1;
        Ok(binary_name.replace('/', "."))
    }

    /// Parse a single field type, `V` is rejected
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown type characters or broken class
    /// names, and [`crate::Error::RecursionLimit`] for too many array dimensions.
    pub fn parse_field_type(&mut self) -> Result<TypeSignature> {
        match self.next_char()? {
            'Z' => Ok(TypeSignature::Boolean),
            'B' => Ok(TypeSignature::Byte),
            'C' => Ok(TypeSignature::Char),
            'S' => Ok(TypeSignature::Short),
            'I' => Ok(TypeSignature::Int),
            'J' => Ok(TypeSignature::Long),
            'F' => Ok(TypeSignature::Float),
            'D' => Ok(TypeSignature::Double),
            'L' => Ok(TypeSignature::Class(self.parse_class_name()?)),
            '[' => {
                self.depth += 1;
                if self.depth > MAX_ARRAY_DIMENSIONS {
                    return Err(RecursionLimit(MAX_ARRAY_DIMENSIONS));
                }
                let element = self.parse_field_type()?;
                self.depth -= 1;
                Ok(TypeSignature::Array(Box::new(element)))
            }
            other => Err(malformed_error!(
                "Invalid type character '{}' in descriptor '{}'",
                other,
                self.input
            )),
        }
    }

    fn parse_return_type(&mut self) -> Result<TypeSignature> {
        if self.peek_char() == Some('V') {
            self.position += 1;
            return Ok(TypeSignature::Void);
        }
        self.parse_field_type()
    }

    /// Parse a complete method descriptor, `(params)return`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the descriptor is not well formed or has
    /// trailing characters.
    pub fn parse_method_descriptor(&mut self) -> Result<MethodSignature> {
        if self.next_char()? != '(' {
            return Err(malformed_error!(
                "Method descriptor '{}' does not start with '('",
                self.input
            ));
        }

        let mut params = Vec::new();
        loop {
            match self.peek_char() {
                Some(')') => {
                    self.position += 1;
                    break;
                }
                Some(_) => params.push(self.parse_field_type()?),
                None => {
                    return Err(malformed_error!(
                        "Unterminated parameter list in '{}'",
                        self.input
                    ))
                }
            }
        }

        let return_type = self.parse_return_type()?;
        self.expect_end()?;

        Ok(MethodSignature {
            params,
            return_type,
        })
    }

    /// Fails unless the whole input has been consumed
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on trailing characters.
    pub fn expect_end(&self) -> Result<()> {
        if self.position != self.input.len() {
            return Err(malformed_error!(
                "Trailing characters '{}' in descriptor '{}'",
                &self.input[self.position..],
                self.input
            ));
        }
        Ok(())
    }
}
