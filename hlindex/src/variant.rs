//! The portable payload used to persist and transport highlight indexes.
//!
//! A `Variant` is a small, self-describing, dynamically typed value. An index
//! is exported as a dictionary from tag name to the list of words carrying
//! that tag:
//!
//! ```ignore
//!     { "c:type": ["GObject", "gsize"], "c:boolean": ["TRUE", "FALSE"] }
//! ```
//!
//! The binary encoding starts every value with a one-byte type code followed
//! by its contents. All integers are little endian and all strings are
//! prefixed with their length as a `u32`:
//!
//! ```ignore
//!     'b' <u8>                         boolean
//!     'x' <i64>                        64-bit integer
//!     's' <u32 len> <UTF-8 bytes>      string
//!     'a' <u32 count> <string>*        string array (strings without type code)
//!     '{' <u32 count> (<string> <value>)*   dictionary
//!     'v' <value>                      boxed value
//! ```

use byteorder::{ByteOrder, LittleEndian};
use serde_json::Value;
use std::error::Error;

const TYPE_BOOL: u8 = b'b';
const TYPE_INT64: u8 = b'x';
const TYPE_STR: u8 = b's';
const TYPE_STR_ARRAY: u8 = b'a';
const TYPE_DICT: u8 = b'{';
const TYPE_BOXED: u8 = b'v';

/// Values nested deeper than this are rejected by the decoder.
const MAX_DEPTH: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub enum Variant {
    Bool(bool),
    Int64(i64),
    Str(String),
    StrArray(Vec<String>),
    Dict(Vec<(String, Variant)>),
    Boxed(Box<Variant>),
}

impl Variant {
    /// Strips any number of `Boxed` layers.
    pub fn unboxed(&self) -> &Variant {
        let mut v = self;
        while let Variant::Boxed(inner) = v {
            v = &**inner;
        }
        v
    }

    /// A short description of the value's type, for diagnostics.
    pub fn type_string(&self) -> &'static str {
        match self {
            Variant::Bool(_) => "b",
            Variant::Int64(_) => "x",
            Variant::Str(_) => "s",
            Variant::StrArray(_) => "as",
            Variant::Dict(_) => "a{sv}",
            Variant::Boxed(_) => "v",
        }
    }

    pub fn serialized_size(&self) -> usize {
        1 + match self {
            Variant::Bool(_) => 1,
            Variant::Int64(_) => 8,
            Variant::Str(s) => str_size(s),
            Variant::StrArray(strings) => {
                4 + strings.iter().map(|s| str_size(s)).sum::<usize>()
            }
            Variant::Dict(entries) => {
                4 + entries
                    .iter()
                    .map(|(k, v)| str_size(k) + v.serialized_size())
                    .sum::<usize>()
            }
            Variant::Boxed(inner) => inner.serialized_size(),
        }
    }

    /// Writes the encoding of `self` into `bytes`, which must be exactly
    /// `serialized_size()` bytes long.
    pub fn serialize(&self, bytes: &mut [u8]) {
        assert!(bytes.len() == self.serialized_size());
        let rest = self.serialize_into(bytes);

        // Assert that we used the exact number of bytes we anticipated.
        assert!(rest.is_empty());
    }

    fn serialize_into<'b>(&self, bytes: &'b mut [u8]) -> &'b mut [u8] {
        let (type_byte, bytes) = bytes.split_at_mut(1);

        match self {
            Variant::Bool(b) => {
                type_byte[0] = TYPE_BOOL;
                bytes[0] = *b as u8;
                &mut bytes[1..]
            }
            Variant::Int64(x) => {
                type_byte[0] = TYPE_INT64;
                LittleEndian::write_i64(&mut bytes[..8], *x);
                &mut bytes[8..]
            }
            Variant::Str(s) => {
                type_byte[0] = TYPE_STR;
                write_str(bytes, s)
            }
            Variant::StrArray(strings) => {
                type_byte[0] = TYPE_STR_ARRAY;
                write_count(bytes, strings.len());
                let mut bytes = &mut bytes[4..];
                for s in strings {
                    bytes = write_str(bytes, s);
                }
                bytes
            }
            Variant::Dict(entries) => {
                type_byte[0] = TYPE_DICT;
                write_count(bytes, entries.len());
                let mut bytes = &mut bytes[4..];
                for (key, value) in entries {
                    bytes = write_str(bytes, key);
                    bytes = value.serialize_into(bytes);
                }
                bytes
            }
            Variant::Boxed(inner) => {
                type_byte[0] = TYPE_BOXED;
                inner.serialize_into(bytes)
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0; self.serialized_size()];
        self.serialize(&mut bytes);
        bytes
    }

    /// Decodes a value that occupies all of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Variant, Box<dyn Error + Send + Sync>> {
        let mut decoder = Decoder { bytes, pos: 0 };
        let variant = decoder.read_variant(0)?;

        if decoder.pos != bytes.len() {
            Err(format!(
                "Variant: {} trailing bytes after value",
                bytes.len() - decoder.pos
            ))?;
        }

        Ok(variant)
    }

    /// Converts to JSON. Boxed values are replaced by their contents.
    pub fn to_json(&self) -> Value {
        match self {
            Variant::Bool(b) => Value::Bool(*b),
            Variant::Int64(x) => Value::from(*x),
            Variant::Str(s) => Value::String(s.clone()),
            Variant::StrArray(strings) => {
                Value::Array(strings.iter().cloned().map(Value::String).collect())
            }
            Variant::Dict(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Variant::Boxed(inner) => inner.to_json(),
        }
    }

    /// Converts from JSON. Returns `None` for values that have no variant
    /// counterpart (`null`, floats, arrays that are not all strings); such
    /// values are dropped from the object containing them.
    pub fn from_json(value: &Value) -> Option<Variant> {
        match value {
            Value::Bool(b) => Some(Variant::Bool(*b)),
            Value::Number(n) => n.as_i64().map(Variant::Int64),
            Value::String(s) => Some(Variant::Str(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_owned))
                .collect::<Option<Vec<_>>>()
                .map(Variant::StrArray),
            Value::Object(map) => Some(Variant::Dict(
                map.iter()
                    .filter_map(|(k, v)| Variant::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
            Value::Null => None,
        }
    }
}

#[inline]
fn str_size(s: &str) -> usize {
    4 + s.len()
}

// Lengths and counts are stored as `u32`.
fn write_count(bytes: &mut [u8], count: usize) {
    assert!(count <= u32::MAX as usize);
    LittleEndian::write_u32(&mut bytes[..4], count as u32);
}

fn write_str<'b>(bytes: &'b mut [u8], s: &str) -> &'b mut [u8] {
    write_count(bytes, s.len());
    bytes[4..4 + s.len()].copy_from_slice(s.as_bytes());
    &mut bytes[4 + s.len()..]
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], Box<dyn Error + Send + Sync>> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                format!(
                    "Variant: unexpected end of data at offset {} (needed {} bytes)",
                    self.pos, n
                )
            })?;

        let bytes = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u32(&mut self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        Ok(LittleEndian::read_u32(self.take(4)?) as usize)
    }

    fn read_str(&mut self) -> Result<String, Box<dyn Error + Send + Sync>> {
        let len = self.read_u32()?;
        let offset = self.pos;
        let bytes = self.take(len)?;

        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_owned()),
            Err(e) => {
                let msg = format!("Variant: invalid UTF-8 in string at offset {}: {}", offset, e);
                Err(msg.into())
            }
        }
    }

    // Counts are not trusted for preallocation; every element needs at least
    // four bytes, which bounds the capacity by the remaining input.
    fn capacity_for(&self, count: usize) -> usize {
        count.min((self.bytes.len() - self.pos) / 4)
    }

    fn read_variant(&mut self, depth: usize) -> Result<Variant, Box<dyn Error + Send + Sync>> {
        if depth > MAX_DEPTH {
            Err(format!("Variant: nesting deeper than {} levels", MAX_DEPTH))?;
        }

        let offset = self.pos;
        let type_byte = self.take(1)?[0];

        let variant = match type_byte {
            TYPE_BOOL => match self.take(1)?[0] {
                0 => Variant::Bool(false),
                1 => Variant::Bool(true),
                b => Err(format!("Variant: invalid boolean {} at offset {}", b, offset))?,
            },
            TYPE_INT64 => Variant::Int64(LittleEndian::read_i64(self.take(8)?)),
            TYPE_STR => Variant::Str(self.read_str()?),
            TYPE_STR_ARRAY => {
                let count = self.read_u32()?;
                let mut strings = Vec::with_capacity(self.capacity_for(count));
                for _ in 0..count {
                    strings.push(self.read_str()?);
                }
                Variant::StrArray(strings)
            }
            TYPE_DICT => {
                let count = self.read_u32()?;
                let mut entries = Vec::with_capacity(self.capacity_for(count));
                for _ in 0..count {
                    let key = self.read_str()?;
                    let value = self.read_variant(depth + 1)?;
                    entries.push((key, value));
                }
                Variant::Dict(entries)
            }
            TYPE_BOXED => Variant::Boxed(Box::new(self.read_variant(depth + 1)?)),
            other => Err(format!(
                "Variant: unknown type code 0x{:02x} at offset {}",
                other, offset
            ))?,
        };

        Ok(variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Variant {
        Variant::Dict(vec![
            (
                "c:type".to_string(),
                Variant::StrArray(vec!["GObject".to_string(), "gsize".to_string()]),
            ),
            (
                "c:boolean".to_string(),
                Variant::Boxed(Box::new(Variant::StrArray(vec!["TRUE".to_string()]))),
            ),
            ("count".to_string(), Variant::Int64(-3)),
            ("flag".to_string(), Variant::Bool(true)),
            ("name".to_string(), Variant::Str("Über".to_string())),
        ])
    }

    #[test]
    fn encoding_layout() {
        let v = Variant::StrArray(vec!["ab".to_string(), "".to_string()]);
        assert_eq!(
            v.to_bytes(),
            vec![b'a', 2, 0, 0, 0, 2, 0, 0, 0, b'a', b'b', 0, 0, 0, 0]
        );

        let v = Variant::Boxed(Box::new(Variant::Bool(true)));
        assert_eq!(v.to_bytes(), vec![b'v', b'b', 1]);
    }

    #[test]
    fn decode_encoded() {
        let v = sample();
        let bytes = v.to_bytes();

        assert_eq!(bytes.len(), v.serialized_size());
        assert_eq!(Variant::decode(&bytes).unwrap(), v);
    }

    #[test]
    fn decode_rejects_truncation() {
        let bytes = sample().to_bytes();

        for len in 0..bytes.len() {
            assert!(Variant::decode(&bytes[..len]).is_err(), "len {}", len);
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Variant::decode(&[b'?']).is_err());
        assert!(Variant::decode(&[b'b', 7]).is_err());
        assert!(Variant::decode(&[b'b', 1, 0]).is_err());
        assert!(Variant::decode(&[b's', 2, 0, 0, 0, 0xff, 0xfe]).is_err());
        // A huge count must not cause a huge allocation.
        assert!(Variant::decode(&[b'a', 0xff, 0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn decode_rejects_deep_nesting() {
        let mut bytes = vec![b'v'; MAX_DEPTH + 2];
        bytes.extend_from_slice(&[b'b', 0]);
        assert!(Variant::decode(&bytes).is_err());

        let mut bytes = vec![b'v'; MAX_DEPTH];
        bytes.extend_from_slice(&[b'b', 0]);
        assert!(Variant::decode(&bytes).is_ok());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    #[should_panic]
    fn oversized_count_is_rejected() {
        let mut bytes = [0u8; 4];
        write_count(&mut bytes, u32::MAX as usize + 1);
    }

    #[test]
    fn largest_count_is_written() {
        let mut bytes = [0u8; 4];
        write_count(&mut bytes, u32::MAX as usize);
        assert_eq!(bytes, [0xff; 4]);
    }

    #[test]
    fn unboxed_strips_all_layers() {
        let v = Variant::Boxed(Box::new(Variant::Boxed(Box::new(Variant::Int64(1)))));
        assert_eq!(v.unboxed(), &Variant::Int64(1));
        assert_eq!(Variant::Int64(1).unboxed(), &Variant::Int64(1));
    }

    #[test]
    fn json_conversion() {
        let json = sample().to_json();
        assert_eq!(
            json,
            json!({
                "c:type": ["GObject", "gsize"],
                "c:boolean": ["TRUE"],
                "count": -3,
                "flag": true,
                "name": "Über",
            })
        );

        let value = json!({
            "keyword": ["if", "else"],
            "mixed": ["a", 1],
            "nothing": null,
            "float": 1.5,
        });

        let variant = Variant::from_json(&value).unwrap();
        assert_eq!(
            variant,
            Variant::Dict(vec![(
                "keyword".to_string(),
                Variant::StrArray(vec!["if".to_string(), "else".to_string()])
            )])
        );
    }
}
