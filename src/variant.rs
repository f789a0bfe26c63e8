//! Variant: a tagged union of scalar and document values.
//!
//! On the wire a variant is `[typeTag: u16 LE][payload]`. Scalars have a
//! fixed or length-prefixed payload. Documents (arrays and objects of
//! variants) and any tag this module does not know use a textual escape,
//! `[varint length][JSON text]`, so a stream produced by a writer with
//! more variant kinds still loads and re-saves byte for byte.

use crate::codec::{Reader, Writer};
use crate::error::{Error, Result};
use crate::hashing::{compare_bytes_ci, compare_f64, hash_bytes, hash_bytes_ci, hash_f64};
use core::cmp::Ordering;

/// Two-byte type tags.
pub mod tag {
    pub const EMPTY: u16 = 0x0000;
    pub const NULL: u16 = 0x0001;
    pub const INT16: u16 = 0x0002;
    pub const INT32: u16 = 0x0003;
    pub const SINGLE: u16 = 0x0004;
    pub const DOUBLE: u16 = 0x0005;
    pub const CURRENCY: u16 = 0x0006;
    pub const DATE: u16 = 0x0007;
    pub const OLE_STR: u16 = 0x0008;
    pub const BOOL: u16 = 0x000B;
    pub const INT8: u16 = 0x0010;
    pub const UINT8: u16 = 0x0011;
    pub const UINT16: u16 = 0x0012;
    pub const UINT32: u16 = 0x0013;
    pub const INT64: u16 = 0x0014;
    pub const UINT64: u16 = 0x0015;
    pub const STRING: u16 = 0x0100;
    pub const USTRING: u16 = 0x0102;
    /// First user-defined tag; used for documents.
    pub const DOCUMENT: u16 = 0x010F;
}

/// Fixed-point scale of [`Variant::Currency`].
pub const CURRENCY_SCALE: i64 = 10_000;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Variant {
    #[default]
    Empty,
    Null,
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    /// Fixed point, scaled by [`CURRENCY_SCALE`].
    Currency(i64),
    /// Days since 1899-12-30, fraction is the time of day.
    Date(f64),
    /// UTF-8 text.
    Str(String),
    /// UTF-16 text (OLE string).
    OleStr(Vec<u16>),
    /// UTF-16 text (unicode string).
    UStr(Vec<u16>),
    Array(Vec<Variant>),
    Object(Vec<(String, Variant)>),
    /// A tag this crate has no native form for, kept as its JSON text.
    Custom { tag: u16, text: String },
}

enum Num {
    Int(i128),
    Float(f64),
}

impl Num {
    fn as_f64(&self) -> f64 {
        match *self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

impl Variant {
    pub fn tag(&self) -> u16 {
        match self {
            Variant::Empty => tag::EMPTY,
            Variant::Null => tag::NULL,
            Variant::Bool(_) => tag::BOOL,
            Variant::Int8(_) => tag::INT8,
            Variant::UInt8(_) => tag::UINT8,
            Variant::Int16(_) => tag::INT16,
            Variant::UInt16(_) => tag::UINT16,
            Variant::Int32(_) => tag::INT32,
            Variant::UInt32(_) => tag::UINT32,
            Variant::Int64(_) => tag::INT64,
            Variant::UInt64(_) => tag::UINT64,
            Variant::Single(_) => tag::SINGLE,
            Variant::Double(_) => tag::DOUBLE,
            Variant::Currency(_) => tag::CURRENCY,
            Variant::Date(_) => tag::DATE,
            Variant::Str(_) => tag::STRING,
            Variant::OleStr(_) => tag::OLE_STR,
            Variant::UStr(_) => tag::USTRING,
            Variant::Array(_) | Variant::Object(_) => tag::DOCUMENT,
            Variant::Custom { tag, .. } => *tag,
        }
    }

    pub fn save(&self, w: &mut Writer) -> Result<()> {
        w.write_u16(self.tag());
        match self {
            Variant::Empty | Variant::Null => {}
            Variant::Bool(b) => w.write_u8(*b as u8),
            Variant::Int8(v) => w.write_u8(*v as u8),
            Variant::UInt8(v) => w.write_u8(*v),
            Variant::Int16(v) => w.write_u16(*v as u16),
            Variant::UInt16(v) => w.write_u16(*v),
            Variant::Int32(v) => w.write_u32(*v as u32),
            Variant::UInt32(v) => w.write_u32(*v),
            Variant::Int64(v) | Variant::Currency(v) => w.write_u64(*v as u64),
            Variant::UInt64(v) => w.write_u64(*v),
            Variant::Single(v) => w.write_u32(v.to_bits()),
            Variant::Double(v) | Variant::Date(v) => w.write_u64(v.to_bits()),
            Variant::Str(s) => w.write_len_prefixed(s.as_bytes()),
            Variant::OleStr(u) | Variant::UStr(u) => write_units(w, u),
            Variant::Array(_) | Variant::Object(_) => w.write_len_prefixed(self.json_text()?.as_bytes()),
            Variant::Custom { text, .. } => w.write_len_prefixed(text.as_bytes()),
        }
        Ok(())
    }

    pub fn load(r: &mut Reader<'_>) -> Result<Variant> {
        let t = r.read_u16()?;
        Ok(match t {
            tag::EMPTY => Variant::Empty,
            tag::NULL => Variant::Null,
            tag::BOOL => Variant::Bool(r.read_u8()? != 0),
            tag::INT8 => Variant::Int8(r.read_u8()? as i8),
            tag::UINT8 => Variant::UInt8(r.read_u8()?),
            tag::INT16 => Variant::Int16(r.read_u16()? as i16),
            tag::UINT16 => Variant::UInt16(r.read_u16()?),
            tag::INT32 => Variant::Int32(r.read_u32()? as i32),
            tag::UINT32 => Variant::UInt32(r.read_u32()?),
            tag::INT64 => Variant::Int64(r.read_u64()? as i64),
            tag::UINT64 => Variant::UInt64(r.read_u64()?),
            tag::CURRENCY => Variant::Currency(r.read_u64()? as i64),
            tag::SINGLE => Variant::Single(f32::from_bits(r.read_u32()?)),
            tag::DOUBLE => Variant::Double(f64::from_bits(r.read_u64()?)),
            tag::DATE => Variant::Date(f64::from_bits(r.read_u64()?)),
            tag::STRING => Variant::Str(read_utf8(r)?),
            tag::OLE_STR => Variant::OleStr(read_units(r)?),
            tag::USTRING => Variant::UStr(read_units(r)?),
            tag::DOCUMENT => {
                let text = read_utf8(r)?;
                let json: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| Error::Corrupt(format!("variant document: {e}")))?;
                Variant::from_json(json)
            }
            other => Variant::Custom {
                tag: other,
                text: read_utf8(r)?,
            },
        })
    }

    /// JSON form used by the textual escape. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Variant::Empty | Variant::Null => J::Null,
            Variant::Bool(b) => J::Bool(*b),
            Variant::Int8(v) => J::from(*v),
            Variant::UInt8(v) => J::from(*v),
            Variant::Int16(v) => J::from(*v),
            Variant::UInt16(v) => J::from(*v),
            Variant::Int32(v) => J::from(*v),
            Variant::UInt32(v) => J::from(*v),
            Variant::Int64(v) => J::from(*v),
            Variant::UInt64(v) => J::from(*v),
            Variant::Single(_) | Variant::Double(_) | Variant::Currency(_) | Variant::Date(_) => {
                serde_json::Number::from_f64(self.number().map(|n| n.as_f64()).unwrap_or(0.0))
                    .map(J::Number)
                    .unwrap_or(J::Null)
            }
            Variant::Str(s) => J::String(s.clone()),
            Variant::OleStr(u) | Variant::UStr(u) => J::String(String::from_utf16_lossy(u)),
            Variant::Array(items) => J::Array(items.iter().map(Variant::to_json).collect()),
            Variant::Object(fields) => J::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Variant::Custom { text, .. } => {
                serde_json::from_str(text).unwrap_or_else(|_| J::String(text.clone()))
            }
        }
    }

    pub fn from_json(json: serde_json::Value) -> Variant {
        use serde_json::Value as J;
        match json {
            J::Null => Variant::Null,
            J::Bool(b) => Variant::Bool(b),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Variant::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Variant::UInt64(u)
                } else {
                    Variant::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            J::String(s) => Variant::Str(s),
            J::Array(items) => Variant::Array(items.into_iter().map(Variant::from_json).collect()),
            J::Object(map) => Variant::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Variant::from_json(v)))
                    .collect(),
            ),
        }
    }

    fn json_text(&self) -> Result<String> {
        match self {
            Variant::Custom { text, .. } => Ok(text.clone()),
            _ => serde_json::to_string(&self.to_json())
                .map_err(|e| Error::Corrupt(format!("variant document: {e}"))),
        }
    }

    fn number(&self) -> Option<Num> {
        Some(match *self {
            Variant::Bool(b) => Num::Int(b as i128),
            Variant::Int8(v) => Num::Int(v as i128),
            Variant::UInt8(v) => Num::Int(v as i128),
            Variant::Int16(v) => Num::Int(v as i128),
            Variant::UInt16(v) => Num::Int(v as i128),
            Variant::Int32(v) => Num::Int(v as i128),
            Variant::UInt32(v) => Num::Int(v as i128),
            Variant::Int64(v) => Num::Int(v as i128),
            Variant::UInt64(v) => Num::Int(v as i128),
            Variant::Currency(c) if c % CURRENCY_SCALE == 0 => Num::Int((c / CURRENCY_SCALE) as i128),
            Variant::Currency(c) => Num::Float(c as f64 / CURRENCY_SCALE as f64),
            Variant::Single(v) => Num::Float(v as f64),
            Variant::Double(v) | Variant::Date(v) => Num::Float(v),
            _ => return None,
        })
    }

    fn text(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            Variant::Str(s) => Some(std::borrow::Cow::Borrowed(s.as_str())),
            Variant::OleStr(u) | Variant::UStr(u) => Some(String::from_utf16_lossy(u).into()),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Variant::Empty => 0,
            Variant::Null => 1,
            _ if self.number().is_some() => 2,
            _ if self.text().is_some() => 3,
            _ => 4,
        }
    }

    /// Orders by kind first (empty, null, numbers, strings, documents),
    /// then by value. Numbers of different tags compare by value.
    pub fn compare(&self, other: &Variant, case_insensitive: bool) -> Ordering {
        let (ra, rb) = (self.rank(), other.rank());
        if ra != rb {
            return ra.cmp(&rb);
        }
        match ra {
            0 | 1 => Ordering::Equal,
            2 => match (self.number(), other.number()) {
                (Some(Num::Int(a)), Some(Num::Int(b))) => a.cmp(&b),
                (Some(a), Some(b)) => compare_f64(a.as_f64(), b.as_f64()),
                _ => Ordering::Equal,
            },
            3 => {
                let a = self.text().unwrap_or_default();
                let b = other.text().unwrap_or_default();
                compare_text(a.as_bytes(), b.as_bytes(), case_insensitive)
            }
            _ => {
                let a = self.json_text().unwrap_or_default();
                let b = other.json_text().unwrap_or_default();
                compare_text(a.as_bytes(), b.as_bytes(), case_insensitive)
            }
        }
    }

    /// Hash consistent with [`Variant::compare`].
    pub fn hash(&self, case_insensitive: bool) -> u32 {
        match self.rank() {
            0 => hash_bytes(&[0]),
            1 => hash_bytes(&[1]),
            2 => hash_f64(self.number().map(|n| n.as_f64()).unwrap_or(0.0)),
            3 => hash_text(self.text().unwrap_or_default().as_bytes(), case_insensitive),
            _ => hash_text(self.json_text().unwrap_or_default().as_bytes(), case_insensitive),
        }
    }
}

fn compare_text(a: &[u8], b: &[u8], case_insensitive: bool) -> Ordering {
    if case_insensitive {
        compare_bytes_ci(a, b)
    } else {
        a.cmp(b)
    }
}

fn hash_text(bytes: &[u8], case_insensitive: bool) -> u32 {
    if case_insensitive {
        hash_bytes_ci(bytes)
    } else {
        hash_bytes(bytes)
    }
}

/// `[byteLength: varint][UTF-16 LE code units]`
pub(crate) fn write_units(w: &mut Writer, units: &[u16]) {
    w.write_varuint((units.len() * 2) as u64);
    for u in units {
        w.write_u16(*u);
    }
}

pub(crate) fn read_units(r: &mut Reader<'_>) -> Result<Vec<u16>> {
    let bytes = r.read_len_prefixed()?;
    if bytes.len() % 2 != 0 {
        return Err(Error::Corrupt(format!(
            "wide string of odd byte length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect())
}

fn read_utf8(r: &mut Reader<'_>) -> Result<String> {
    let bytes = r.read_len_prefixed()?;
    String::from_utf8(bytes.to_vec()).map_err(|e| Error::Corrupt(format!("invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: &Variant) -> Variant {
        let mut w = Writer::new();
        v.save(&mut w).unwrap();
        let bytes = w.into_inner();
        let mut r = Reader::new(&bytes);
        let back = Variant::load(&mut r).unwrap();
        assert_eq!(r.remaining(), 0);
        back
    }

    #[test]
    fn scalar_tags_roundtrip_exactly() {
        let cases = vec![
            Variant::Empty,
            Variant::Null,
            Variant::Bool(true),
            Variant::Int8(-3),
            Variant::UInt8(250),
            Variant::Int16(-30_000),
            Variant::UInt16(60_000),
            Variant::Int32(i32::MIN),
            Variant::UInt32(u32::MAX),
            Variant::Int64(i64::MIN),
            Variant::UInt64(u64::MAX),
            Variant::Single(1.5),
            Variant::Double(-0.25),
            Variant::Currency(123_4567),
            Variant::Date(45_000.5),
            Variant::Str("héllo".into()),
            Variant::OleStr("ole".encode_utf16().collect()),
            Variant::UStr("uni".encode_utf16().collect()),
        ];
        for v in cases {
            assert_eq!(roundtrip(&v), v);
        }
    }

    #[test]
    fn header_is_two_byte_tag() {
        let mut w = Writer::new();
        Variant::Int32(7).save(&mut w).unwrap();
        assert_eq!(w.as_slice(), &[0x03, 0x00, 7, 0, 0, 0]);
    }

    #[test]
    fn documents_use_textual_escape() {
        let doc = Variant::Object(vec![
            ("b".into(), Variant::Int32(1)),
            ("a".into(), Variant::Array(vec![Variant::Str("x".into()), Variant::Null])),
        ]);
        let mut w = Writer::new();
        doc.save(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), tag::DOCUMENT);
        assert!(bytes.ends_with(br#"{"b":1,"a":["x",null]}"#));

        let back = roundtrip(&doc);
        assert_eq!(back.compare(&doc, false), Ordering::Equal);
        assert_eq!(back.hash(false), doc.hash(false));
    }

    #[test]
    fn unknown_tags_are_kept_verbatim() {
        let mut w = Writer::new();
        w.write_u16(0x4242);
        w.write_len_prefixed(br#"{"opaque":true}"#);
        let bytes = w.into_inner();
        let v = Variant::load(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(
            v,
            Variant::Custom {
                tag: 0x4242,
                text: r#"{"opaque":true}"#.into()
            }
        );
        let mut again = Writer::new();
        v.save(&mut again).unwrap();
        assert_eq!(again.into_inner(), bytes);
    }

    #[test]
    fn numbers_compare_across_tags() {
        assert_eq!(
            Variant::Int32(2).compare(&Variant::Double(2.0), false),
            Ordering::Equal
        );
        assert_eq!(Variant::Int32(2).hash(false), Variant::Double(2.0).hash(false));
        assert_eq!(
            Variant::Currency(25_000).compare(&Variant::Double(2.5), false),
            Ordering::Equal
        );
        assert_eq!(
            Variant::UInt64(u64::MAX).compare(&Variant::Int64(-1), false),
            Ordering::Greater
        );
        assert_eq!(Variant::Null.compare(&Variant::Int8(0), false), Ordering::Less);
        assert_eq!(Variant::Empty.compare(&Variant::Null, false), Ordering::Less);
    }

    #[test]
    fn strings_compare_across_encodings() {
        let wide = Variant::UStr("Key".encode_utf16().collect());
        let narrow = Variant::Str("key".into());
        assert_eq!(wide.compare(&narrow, true), Ordering::Equal);
        assert_eq!(wide.hash(true), narrow.hash(true));
        assert_ne!(wide.compare(&narrow, false), Ordering::Equal);
    }

    #[test]
    fn truncated_payload_fails() {
        let bytes = [0x05u8, 0x00, 1, 2, 3];
        assert!(matches!(
            Variant::load(&mut Reader::new(&bytes)),
            Err(Error::Truncated { .. })
        ));
        let bad_json = {
            let mut w = Writer::new();
            w.write_u16(tag::DOCUMENT);
            w.write_len_prefixed(b"{oops");
            w.into_inner()
        };
        assert!(matches!(
            Variant::load(&mut Reader::new(&bad_json)),
            Err(Error::Corrupt(_))
        ));
    }
}
