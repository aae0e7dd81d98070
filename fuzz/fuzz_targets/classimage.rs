#![no_main]

use libfuzzer_sys::fuzz_target;
use typepatch::classfile::{decode_class, encode_class, verify_class};

fuzz_target!(|data: &[u8]| {
    if let Ok(class) = decode_class(data) {
        let _ = verify_class(&class);
        let bytes = encode_class(&class).expect("decoded class encodes");
        assert!(decode_class(&bytes).is_ok());
    }
});
