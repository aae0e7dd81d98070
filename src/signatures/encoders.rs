//! Descriptor encoders, the reverse of [`crate::signatures::DescriptorParser`].

use crate::signatures::{MethodSignature, TypeSignature};

/// Appends the descriptor of `signature` to `out`.
///
/// Qualified class names are written in binary form, with `.` replaced by `/`.
pub fn encode_type_descriptor(signature: &TypeSignature, out: &mut String) {
    match signature {
        TypeSignature::Void => out.push('V'),
        TypeSignature::Boolean => out.push('Z'),
        TypeSignature::Byte => out.push('B'),
        TypeSignature::Char => out.push('C'),
        TypeSignature::Short => out.push('S'),
        TypeSignature::Int => out.push('I'),
        TypeSignature::Long => out.push('J'),
        TypeSignature::Float => out.push('F'),
        TypeSignature::Double => out.push('D'),
        TypeSignature::Class(name) => {
            out.push('L');
            out.extend(name.chars().map(|c| if c == '.' { '/' } else { c }));
            out.push(';');
        }
        TypeSignature::Array(element) => {
            out.push('[');
            encode_type_descriptor(element, out);
        }
    }
}

/// Encodes a full method descriptor.
#[must_use]
pub fn encode_method_descriptor(signature: &MethodSignature) -> String {
    let mut out = String::with_capacity(2 + signature.params.len() * 2);
    out.push('(');
    for param in &signature.params {
        encode_type_descriptor(param, &mut out);
    }
    out.push(')');
    encode_type_descriptor(&signature.return_type, &mut out);
    out
}

/// Encodes a bare parameter list as `(..)`, used in lookup error messages.
#[must_use]
pub fn encode_parameter_list(params: &[TypeSignature]) -> String {
    let mut out = String::from("(");
    for param in params {
        encode_type_descriptor(param, &mut out);
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_method() {
        let signature = MethodSignature::new(
            vec![
                TypeSignature::Int,
                TypeSignature::class("pkg.Counter"),
                TypeSignature::array_of(TypeSignature::Long),
            ],
            TypeSignature::Void,
        );

        assert_eq!(signature.descriptor(), "(ILpkg/Counter;[J)V");
        assert_eq!(encode_parameter_list(&signature.params), "(ILpkg/Counter;[J)");
    }

    #[test]
    fn encode_nested_arrays() {
        let signature =
            TypeSignature::array_of(TypeSignature::array_of(TypeSignature::class("a.b.C")));
        assert_eq!(signature.descriptor(), "[[La/b/C;");
        assert_eq!(signature.to_string(), "a.b.C[][]");
    }
}
