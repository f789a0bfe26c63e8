//! Runtime type descriptors.
//!
//! A [`TypeDescriptor`] tells the dispatch tables how a value is shaped:
//! its [`Category`], its in-memory element size and, for composites, the
//! nested descriptors of its fields or items. Descriptors are immutable
//! and shared through [`Descriptor`] (an `Arc`), so a graph of them is a
//! DAG at the type level even when the data it describes is not.

use crate::error::{Error, Result};
use core::fmt;
use std::sync::Arc;

/// Size of a reference (string, dynamic array, class instance) slot.
pub const POINTER_SIZE: usize = 8;

/// Size of a variant slot.
pub const VARIANT_SIZE: usize = 24;

/// Coarse kind of a type, used to select a dispatch function.
///
/// The discriminant doubles as the one-byte tag written in dynamic
/// array frames.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Category {
    Ordinal8 = 1,
    Ordinal16 = 2,
    Ordinal32 = 3,
    Ordinal64 = 4,
    Float32 = 5,
    Float64 = 6,
    Extended = 7,
    ByteString = 8,
    WideString = 9,
    Record = 10,
    StaticArray = 11,
    DynamicArray = 12,
    Variant = 13,
    Class = 14,
}

impl Category {
    /// Number of categories, i.e. the length of every dispatch table.
    pub const COUNT: usize = 14;

    pub const ALL: [Category; Category::COUNT] = [
        Category::Ordinal8,
        Category::Ordinal16,
        Category::Ordinal32,
        Category::Ordinal64,
        Category::Float32,
        Category::Float64,
        Category::Extended,
        Category::ByteString,
        Category::WideString,
        Category::Record,
        Category::StaticArray,
        Category::DynamicArray,
        Category::Variant,
        Category::Class,
    ];

    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1..=14 => Some(Self::ALL[tag as usize - 1]),
            _ => None,
        }
    }

    /// Position of this category in the dispatch tables.
    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize - 1
    }

    pub fn is_ordinal(self) -> bool {
        matches!(
            self,
            Category::Ordinal8 | Category::Ordinal16 | Category::Ordinal32 | Category::Ordinal64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            Category::Float32 | Category::Float64 | Category::Extended
        )
    }
}

/// Shared handle to an immutable descriptor.
pub type Descriptor = Arc<TypeDescriptor>;

/// A field of a record, at a fixed byte offset.
#[derive(Clone, Debug)]
pub struct RecordField {
    pub name: String,
    pub offset: usize,
    pub ty: Descriptor,
}

impl RecordField {
    pub fn new(name: impl Into<String>, offset: usize, ty: Descriptor) -> Self {
        Self {
            name: name.into(),
            offset,
            ty,
        }
    }

    /// First byte past this field.
    pub fn end(&self) -> usize {
        self.offset + self.ty.size()
    }
}

#[derive(Clone, Debug)]
enum Shape {
    Scalar,
    Record(Vec<RecordField>),
    StaticArray { item: Descriptor, count: usize },
    DynamicArray { item: Descriptor },
    Class(Arc<ClassInfo>),
}

/// Runtime description of a value's shape.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    name: String,
    category: Category,
    size: usize,
    signed: bool,
    managed: bool,
    shape: Shape,
}

impl TypeDescriptor {
    fn scalar(name: &str, category: Category, size: usize, signed: bool, managed: bool) -> Descriptor {
        Arc::new(Self {
            name: name.to_string(),
            category,
            size,
            signed,
            managed,
            shape: Shape::Scalar,
        })
    }

    /// Integer of `width` bytes (1, 2, 4 or 8).
    pub fn ordinal(width: usize, signed: bool) -> Result<Descriptor> {
        let (category, name) = match (width, signed) {
            (1, true) => (Category::Ordinal8, "i8"),
            (1, false) => (Category::Ordinal8, "u8"),
            (2, true) => (Category::Ordinal16, "i16"),
            (2, false) => (Category::Ordinal16, "u16"),
            (4, true) => (Category::Ordinal32, "i32"),
            (4, false) => (Category::Ordinal32, "u32"),
            (8, true) => (Category::Ordinal64, "i64"),
            (8, false) => (Category::Ordinal64, "u64"),
            _ => {
                return Err(Error::InvalidDescriptor(format!(
                    "ordinal width must be 1, 2, 4 or 8, got {width}"
                )))
            }
        };
        Ok(Self::scalar(name, category, width, signed, false))
    }

    pub fn i8() -> Descriptor {
        Self::scalar("i8", Category::Ordinal8, 1, true, false)
    }
    pub fn u8() -> Descriptor {
        Self::scalar("u8", Category::Ordinal8, 1, false, false)
    }
    pub fn boolean() -> Descriptor {
        Self::scalar("bool", Category::Ordinal8, 1, false, false)
    }
    pub fn i16() -> Descriptor {
        Self::scalar("i16", Category::Ordinal16, 2, true, false)
    }
    pub fn u16() -> Descriptor {
        Self::scalar("u16", Category::Ordinal16, 2, false, false)
    }
    pub fn i32() -> Descriptor {
        Self::scalar("i32", Category::Ordinal32, 4, true, false)
    }
    pub fn u32() -> Descriptor {
        Self::scalar("u32", Category::Ordinal32, 4, false, false)
    }
    pub fn i64() -> Descriptor {
        Self::scalar("i64", Category::Ordinal64, 8, true, false)
    }
    pub fn u64() -> Descriptor {
        Self::scalar("u64", Category::Ordinal64, 8, false, false)
    }
    pub fn float32() -> Descriptor {
        Self::scalar("f32", Category::Float32, 4, true, false)
    }
    pub fn float64() -> Descriptor {
        Self::scalar("f64", Category::Float64, 8, true, false)
    }
    /// 80-bit extended precision float.
    pub fn extended() -> Descriptor {
        Self::scalar("extended", Category::Extended, 10, true, false)
    }
    /// Byte string without any encoding assumption.
    pub fn byte_string() -> Descriptor {
        Self::scalar("bytes", Category::ByteString, POINTER_SIZE, false, true)
    }
    /// String of UTF-16 code units.
    pub fn wide_string() -> Descriptor {
        Self::scalar("wide", Category::WideString, POINTER_SIZE, false, true)
    }
    pub fn variant() -> Descriptor {
        Self::scalar("variant", Category::Variant, VARIANT_SIZE, false, true)
    }

    /// Record of `size` bytes. Fields are given in declaration order, with
    /// strictly increasing, non-overlapping offsets inside `size`; any
    /// bytes not covered by a field are padding.
    pub fn record(name: impl Into<String>, size: usize, fields: Vec<RecordField>) -> Result<Descriptor> {
        let name = name.into();
        let mut end = 0;
        for f in &fields {
            if f.offset < end {
                return Err(Error::InvalidDescriptor(format!(
                    "{name}.{}: offset {} overlaps the previous field",
                    f.name, f.offset
                )));
            }
            end = f.end();
            if end > size {
                return Err(Error::InvalidDescriptor(format!(
                    "{name}.{}: ends at {end}, past record size {size}",
                    f.name
                )));
            }
        }
        let managed = fields.iter().any(|f| f.ty.is_managed());
        Ok(Arc::new(Self {
            name,
            category: Category::Record,
            size,
            signed: false,
            managed,
            shape: Shape::Record(fields),
        }))
    }

    /// Fixed-size array of `count` items.
    pub fn static_array(item: Descriptor, count: usize) -> Result<Descriptor> {
        let size = item.size().checked_mul(count).ok_or_else(|| {
            Error::InvalidDescriptor(format!("[{}; {count}] overflows", item.name))
        })?;
        Ok(Arc::new(Self {
            name: format!("[{}; {count}]", item.name),
            category: Category::StaticArray,
            size,
            signed: false,
            managed: item.is_managed(),
            shape: Shape::StaticArray { item, count },
        }))
    }

    /// Reference-counted dynamic array of `item`.
    pub fn dynamic_array(item: Descriptor) -> Descriptor {
        Arc::new(Self {
            name: format!("array of {}", item.name),
            category: Category::DynamicArray,
            size: POINTER_SIZE,
            signed: false,
            managed: true,
            shape: Shape::DynamicArray { item },
        })
    }

    /// Reference to an instance of `info` (or nil).
    pub fn class(info: Arc<ClassInfo>) -> Descriptor {
        Arc::new(Self {
            name: info.name().to_string(),
            category: Category::Class,
            size: POINTER_SIZE,
            signed: false,
            managed: true,
            shape: Shape::Class(info),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn category(&self) -> Category {
        self.category
    }

    /// In-memory element size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Signedness of an ordinal; always false for other categories except floats.
    #[inline]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// True when a value holds references or nested managed values, so it
    /// cannot be copied as raw bytes.
    #[inline]
    pub fn is_managed(&self) -> bool {
        self.managed
    }

    /// Record fields in declaration order; empty for other categories.
    pub fn fields(&self) -> &[RecordField] {
        match &self.shape {
            Shape::Record(fields) => fields,
            _ => &[],
        }
    }

    /// Item descriptor of a static or dynamic array.
    pub fn item(&self) -> Option<&Descriptor> {
        match &self.shape {
            Shape::StaticArray { item, .. } | Shape::DynamicArray { item } => Some(item),
            _ => None,
        }
    }

    /// Item count of a static array.
    pub fn count(&self) -> Option<usize> {
        match &self.shape {
            Shape::StaticArray { count, .. } => Some(*count),
            _ => None,
        }
    }

    pub fn class_info(&self) -> Option<&Arc<ClassInfo>> {
        match &self.shape {
            Shape::Class(info) => Some(info),
            _ => None,
        }
    }

    /// Structural equality: same category, size, signedness and nested
    /// shapes. Names are ignored except for classes.
    pub fn same_shape(&self, other: &TypeDescriptor) -> bool {
        if core::ptr::eq(self, other) {
            return true;
        }
        if self.category != other.category || self.size != other.size || self.signed != other.signed {
            return false;
        }
        match (&self.shape, &other.shape) {
            (Shape::Scalar, Shape::Scalar) => true,
            (Shape::Record(a), Shape::Record(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b)
                        .all(|(x, y)| x.offset == y.offset && x.ty.same_shape(&y.ty))
            }
            (
                Shape::StaticArray { item: a, count: n },
                Shape::StaticArray { item: b, count: m },
            ) => n == m && a.same_shape(b),
            (Shape::DynamicArray { item: a }, Shape::DynamicArray { item: b }) => a.same_shape(b),
            (Shape::Class(a), Shape::Class(b)) => Arc::ptr_eq(a, b) || a.name() == b.name(),
            _ => false,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A named, typed property of a class.
#[derive(Clone, Debug)]
pub struct ClassField {
    pub name: String,
    pub ty: Descriptor,
}

impl ClassField {
    pub fn new(name: impl Into<String>, ty: Descriptor) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Reflection data of a class: its name, optional parent and the fields
/// it declares. Instances store inherited fields first.
#[derive(Debug)]
pub struct ClassInfo {
    name: String,
    parent: Option<Arc<ClassInfo>>,
    fields: Vec<ClassField>,
    by_name: hashbrown::HashMap<String, usize>,
}

impl ClassInfo {
    pub fn new(
        name: impl Into<String>,
        parent: Option<Arc<ClassInfo>>,
        declared: Vec<ClassField>,
    ) -> Result<Arc<ClassInfo>> {
        let name = name.into();
        let mut fields = parent
            .as_ref()
            .map(|p| p.fields.clone())
            .unwrap_or_default();
        fields.extend(declared);
        let mut by_name = hashbrown::HashMap::with_capacity(fields.len());
        for (i, f) in fields.iter().enumerate() {
            if by_name.insert(f.name.clone(), i).is_some() {
                return Err(Error::InvalidDescriptor(format!(
                    "{name}: field {} declared twice",
                    f.name
                )));
            }
        }
        Ok(Arc::new(Self {
            name,
            parent,
            fields,
            by_name,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<ClassInfo>> {
        self.parent.as_ref()
    }

    /// All fields, inherited ones first.
    pub fn fields(&self) -> &[ClassField] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// True if `self` is `other` or one of its descendants.
    pub fn inherits_from(&self, other: &ClassInfo) -> bool {
        let mut cur = Some(self);
        while let Some(c) = cur {
            if core::ptr::eq(c, other) {
                return true;
            }
            cur = c.parent.as_deref();
        }
        false
    }
}
