//! Type-erased values.
//!
//! A [`Value`] is the dynamic counterpart of a typed element: its shape is
//! only meaningful together with the [`TypeDescriptor`] it conforms to.
//! Nested dynamic arrays hold a shared [`Buffer`], so cloning a value is
//! shallow for them and writes go through copy-on-write.

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::rtti::{Category, ClassInfo, TypeDescriptor};
use crate::variant::Variant;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Signed ordinal of any width.
    Int(i64),
    /// Unsigned ordinal of any width.
    UInt(u64),
    /// Float32, Float64 or Extended.
    Float(f64),
    Bytes(Vec<u8>),
    Wide(Vec<u16>),
    /// Record fields in declaration order.
    Record(Vec<Value>),
    /// Static array items.
    Array(Vec<Value>),
    /// Dynamic array; `None` is the empty array.
    DynArray(Option<Buffer<Value>>),
    Variant(Variant),
    /// Class instance reference; `None` is nil.
    Object(Option<Arc<Object>>),
}

impl Value {
    /// The zero value of `ty`: zero numbers, empty strings and arrays,
    /// nil references, an empty variant.
    pub fn zeroed(ty: &TypeDescriptor) -> Value {
        match ty.category() {
            c if c.is_ordinal() => {
                if ty.is_signed() {
                    Value::Int(0)
                } else {
                    Value::UInt(0)
                }
            }
            c if c.is_float() => Value::Float(0.0),
            Category::ByteString => Value::Bytes(Vec::new()),
            Category::WideString => Value::Wide(Vec::new()),
            Category::Record => Value::Record(ty.fields().iter().map(|f| Value::zeroed(&f.ty)).collect()),
            Category::StaticArray => {
                let count = ty.count().unwrap_or(0);
                let items = match ty.item() {
                    Some(item) => (0..count).map(|_| Value::zeroed(item)).collect(),
                    None => Vec::new(),
                };
                Value::Array(items)
            }
            Category::DynamicArray => Value::DynArray(None),
            Category::Variant => Value::Variant(Variant::Empty),
            _ => Value::Object(None),
        }
    }

    pub fn str(s: &str) -> Value {
        Value::Bytes(s.as_bytes().to_vec())
    }

    pub fn wide(s: &str) -> Value {
        Value::Wide(s.encode_utf16().collect())
    }

    /// Dynamic array over `items`; an empty vector gives the nil array.
    pub fn dyn_array(items: Vec<Value>) -> Value {
        if items.is_empty() {
            Value::DynArray(None)
        } else {
            Value::DynArray(Some(Buffer::from_vec(items)))
        }
    }

    /// Items of a dynamic or static array; empty otherwise.
    pub fn items(&self) -> &[Value] {
        match self {
            Value::DynArray(Some(b)) => b.as_slice(),
            Value::Array(items) | Value::Record(items) => items,
            _ => &[],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "signed ordinal",
            Value::UInt(_) => "unsigned ordinal",
            Value::Float(_) => "float",
            Value::Bytes(_) => "byte string",
            Value::Wide(_) => "wide string",
            Value::Record(_) => "record",
            Value::Array(_) => "static array",
            Value::DynArray(_) => "dynamic array",
            Value::Variant(_) => "variant",
            Value::Object(_) => "object",
        }
    }

    /// True when this value has the shape described by `ty`, recursively,
    /// and ordinals fit the declared width.
    pub fn conforms(&self, ty: &TypeDescriptor) -> bool {
        let bits = (ty.size() * 8) as u32;
        match (self, ty.category()) {
            (Value::Int(v), c) if c.is_ordinal() => {
                ty.is_signed() && (bits == 64 || (*v >= -(1i64 << (bits - 1)) && *v < (1i64 << (bits - 1))))
            }
            (Value::UInt(v), c) if c.is_ordinal() => {
                !ty.is_signed() && (bits == 64 || *v < (1u64 << bits))
            }
            (Value::Float(_), c) => c.is_float(),
            (Value::Bytes(_), Category::ByteString) => true,
            (Value::Wide(_), Category::WideString) => true,
            (Value::Record(values), Category::Record) => {
                let fields = ty.fields();
                values.len() == fields.len() && values.iter().zip(fields).all(|(v, f)| v.conforms(&f.ty))
            }
            (Value::Array(items), Category::StaticArray) => match (ty.item(), ty.count()) {
                (Some(item), Some(count)) => items.len() == count && items.iter().all(|v| v.conforms(item)),
                _ => false,
            },
            (Value::DynArray(buf), Category::DynamicArray) => match (buf, ty.item()) {
                (None, Some(_)) => true,
                (Some(b), Some(item)) => b.as_slice().iter().all(|v| v.conforms(item)),
                _ => false,
            },
            (Value::Variant(_), Category::Variant) => true,
            (Value::Object(obj), Category::Class) => match (obj, ty.class_info()) {
                (None, Some(_)) => true,
                (Some(o), Some(info)) => o.class().inherits_from(info),
                _ => false,
            },
            _ => false,
        }
    }

    /// [`Value::conforms`] as a caller-contract check.
    pub fn check(&self, ty: &TypeDescriptor) -> Result<()> {
        if self.conforms(ty) {
            Ok(())
        } else {
            Err(Error::mismatch(ty.name(), self.kind_name()))
        }
    }
}

/// Instance of a reflected class. Field values follow
/// [`ClassInfo::fields`] order.
#[derive(Clone, Debug)]
pub struct Object {
    class: Arc<ClassInfo>,
    fields: Vec<Value>,
}

impl Object {
    /// New instance with every field zeroed.
    pub fn new(class: Arc<ClassInfo>) -> Self {
        let fields = class.fields().iter().map(|f| Value::zeroed(&f.ty)).collect();
        Self { class, fields }
    }

    pub fn with_fields(class: Arc<ClassInfo>, fields: Vec<Value>) -> Result<Self> {
        if fields.len() != class.fields().len() {
            return Err(Error::mismatch(
                format!("{} fields of {}", class.fields().len(), class.name()),
                format!("{} values", fields.len()),
            ));
        }
        for (v, f) in fields.iter().zip(class.fields()) {
            v.check(&f.ty)?;
        }
        Ok(Self { class, fields })
    }

    pub fn class(&self) -> &Arc<ClassInfo> {
        &self.class
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.class.field_index(name).map(|i| &self.fields[i])
    }

    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let i = self
            .class
            .field_index(name)
            .ok_or_else(|| Error::mismatch(format!("field of {}", self.class.name()), name))?;
        value.check(&self.class.fields()[i].ty)?;
        self.fields[i] = value;
        Ok(())
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.class, &other.class) && self.fields == other.fields
    }
}
