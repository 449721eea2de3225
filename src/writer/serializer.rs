//! PDF object serialization.
//!
//! Converts [`Object`] values to their byte representation following the
//! PDF specification syntax rules, including the text-string convention
//! used for metadata and URIs: ASCII strings are written as escaped
//! literals, non-ASCII strings are transcoded to UTF-16BE with a
//! byte-order mark first.

use crate::object::Object;

/// Serializer for PDF object values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer;

impl ObjectSerializer {
    /// Create a new object serializer.
    pub fn new() -> Self {
        Self
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an object to a string (lossy, for tests and debugging).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).to_string()
    }

    fn write_object(&self, buf: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => buf.extend_from_slice(b"null"),
            Object::Boolean(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => buf.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => self.write_real(buf, *r),
            Object::String(s) => buf.extend_from_slice(&text_string(s)),
            Object::Name(n) => self.write_name(buf, n),
            Object::Array(arr) => {
                buf.push(b'[');
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        buf.push(b' ');
                    }
                    self.write_object(buf, item);
                }
                buf.push(b']');
            },
            Object::Dictionary(entries) => {
                buf.extend_from_slice(b"<<");
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        buf.push(b' ');
                    }
                    self.write_name(buf, key);
                    buf.push(b' ');
                    self.write_object(buf, value);
                }
                buf.extend_from_slice(b">>");
            },
            Object::Reference(r) => buf.extend_from_slice(format!("{}", r).as_bytes()),
        }
    }

    /// Write a real number with two decimal places, trimming a trailing
    /// fractional part of zero down to the integer form.
    fn write_real(&self, buf: &mut Vec<u8>, value: f64) {
        if value.fract() == 0.0 && value.abs() < 1e15 {
            buf.extend_from_slice((value as i64).to_string().as_bytes());
        } else {
            buf.extend_from_slice(format!("{:.2}", value).as_bytes());
        }
    }

    /// Write a PDF name, escaping delimiter and non-regular characters
    /// as `#xx`.
    fn write_name(&self, buf: &mut Vec<u8>, name: &str) {
        buf.push(b'/');
        for byte in name.bytes() {
            match byte {
                b'!' | b'"' | b'$'..=b'&' | b'\''..=b'.' | b'0'..=b'9' | b';' | b'<' | b'>'
                | b'?' | b'@' | b'A'..=b'Z' | b'^'..=b'z' | b'|' | b'~' => buf.push(byte),
                _ => buf.extend_from_slice(format!("#{:02X}", byte).as_bytes()),
            }
        }
    }
}

/// Escape the characters that are special inside a PDF literal string.
///
/// Backslash, parentheses and carriage return are escaped; everything
/// else passes through untouched.
pub(crate) fn escape_bytes(s: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for &b in s {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'(' => out.extend_from_slice(b"\\("),
            b')' => out.extend_from_slice(b"\\)"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
    out
}

/// Escape a UTF-8 string for embedding in a content-stream literal.
pub(crate) fn escape_str(s: &str) -> String {
    // Escaping only inserts ASCII backslash pairs, so the result stays
    // valid UTF-8.
    String::from_utf8(escape_bytes(s.as_bytes())).unwrap_or_default()
}

/// Format a text string as a parenthesized PDF literal.
///
/// Non-ASCII content is transcoded to UTF-16BE with a byte-order mark
/// before escaping.
pub(crate) fn text_string(s: &str) -> Vec<u8> {
    let bytes: Vec<u8> = if s.is_ascii() {
        s.as_bytes().to_vec()
    } else {
        let mut utf16 = vec![0xFE, 0xFF];
        for unit in s.encode_utf16() {
            utf16.extend_from_slice(&unit.to_be_bytes());
        }
        utf16
    };
    let mut out = vec![b'('];
    out.extend_from_slice(&escape_bytes(&bytes));
    out.push(b')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    #[test]
    fn test_serialize_scalars() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::Null), "null");
        assert_eq!(s.serialize_to_string(&Object::Boolean(true)), "true");
        assert_eq!(s.serialize_to_string(&Object::Integer(-123)), "-123");
        assert_eq!(s.serialize_to_string(&Object::Real(1.0)), "1");
        assert_eq!(s.serialize_to_string(&Object::Real(0.5)), "0.50");
    }

    #[test]
    fn test_serialize_string_escaping() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::string("Hello")), "(Hello)");
        assert_eq!(
            s.serialize_to_string(&Object::string("a (b) c\\d")),
            "(a \\(b\\) c\\\\d)"
        );
    }

    #[test]
    fn test_serialize_string_utf16_transcoding() {
        let s = ObjectSerializer::new();
        let bytes = s.serialize(&Object::string("é"));
        // BOM followed by the UTF-16BE code unit
        assert_eq!(&bytes[..5], &[b'(', 0xFE, 0xFF, 0x00, 0xE9]);
        assert_eq!(*bytes.last().unwrap(), b')');
    }

    #[test]
    fn test_serialize_name_with_special_chars() {
        let s = ObjectSerializer::new();
        assert_eq!(
            s.serialize_to_string(&Object::Name("Name With Space".to_string())),
            "/Name#20With#20Space"
        );
    }

    #[test]
    fn test_serialize_array() {
        let s = ObjectSerializer::new();
        let arr = Object::Array(vec![Object::Integer(1), Object::name("XYZ"), Object::Null]);
        assert_eq!(s.serialize_to_string(&arr), "[1 /XYZ null]");
    }

    #[test]
    fn test_serialize_dictionary_in_order() {
        let s = ObjectSerializer::new();
        let dict = Object::dict(vec![
            ("Type", Object::name("Annot")),
            ("Rect", Object::Array(vec![Object::Real(0.0), Object::Real(10.5)])),
        ]);
        assert_eq!(s.serialize_to_string(&dict), "<</Type /Annot /Rect [0 10.50]>>");
    }

    #[test]
    fn test_serialize_reference() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::reference(10)), "10 0 R");
    }
}
