//! Element types a [`Container`](crate::Container) can hold.
//!
//! [`Element`] is the monomorphized counterpart of the dispatch tables:
//! every method receives the container's descriptor, and native Rust
//! types ignore most of it because their shape is fixed at compile time.
//! [`Value`] implements the trait by forwarding to [`crate::dispatch`],
//! which makes a `Container<Value>` the type-erased fallback.
//!
//! Native implementations produce the same bytes, ordering and hashes as
//! the dynamic path for the descriptor they report from
//! [`Typed::descriptor`].

use crate::codec::{extended_to_f64, f64_to_extended, Reader, Writer};
use crate::dispatch;
use crate::error::{Error, Result};
use crate::hashing::{
    combine, compare_bytes_ci, compare_f64, compare_units_ci, hash_bytes, hash_bytes_ci, hash_f64,
    hash_units, hash_units_ci,
};
use crate::rtti::{Category, Descriptor, TypeDescriptor};
use crate::value::Value;
use crate::variant::{read_units, write_units, Variant};
use core::cmp::Ordering;

pub trait Element: Clone + 'static {
    /// True when values of `Self` can be laid out as `ty` describes.
    fn accepts(ty: &TypeDescriptor) -> bool;

    fn zeroed(ty: &TypeDescriptor) -> Self;

    fn save(&self, ty: &TypeDescriptor, w: &mut Writer) -> Result<()>;

    fn load(ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Self>;

    fn compare(&self, other: &Self, ty: &TypeDescriptor, case_insensitive: bool) -> Ordering;

    /// Must agree with [`Element::compare`]: equal items hash equal.
    fn hash(&self, ty: &TypeDescriptor, case_insensitive: bool) -> u32;

    /// Per-item shape check on insertion; native types always pass.
    fn check(&self, _ty: &TypeDescriptor) -> Result<()> {
        Ok(())
    }
}

/// An element whose descriptor is known statically.
pub trait Typed: Element {
    fn descriptor() -> Descriptor;
}

macro_rules! ordinal_element {
    ($($t:ty => $ctor:ident),* $(,)?) => {$(
        impl Element for $t {
            fn accepts(ty: &TypeDescriptor) -> bool {
                ty.category().is_ordinal()
                    && ty.size() == core::mem::size_of::<$t>()
                    && ty.is_signed() == (<$t>::MIN != 0)
            }

            fn zeroed(_ty: &TypeDescriptor) -> Self {
                0
            }

            fn save(&self, _ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
                w.write_bytes(&self.to_le_bytes());
                Ok(())
            }

            fn load(_ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Self> {
                Ok(<$t>::from_le_bytes(r.read_array::<{ core::mem::size_of::<$t>() }>()?))
            }

            #[inline]
            fn compare(&self, other: &Self, _ty: &TypeDescriptor, _ci: bool) -> Ordering {
                self.cmp(other)
            }

            #[inline]
            fn hash(&self, _ty: &TypeDescriptor, _ci: bool) -> u32 {
                hash_bytes(&self.to_le_bytes())
            }
        }

        impl Typed for $t {
            fn descriptor() -> Descriptor {
                TypeDescriptor::$ctor()
            }
        }
    )*};
}

ordinal_element!(
    i8 => i8,
    u8 => u8,
    i16 => i16,
    u16 => u16,
    i32 => i32,
    u32 => u32,
    i64 => i64,
    u64 => u64,
);

impl Element for bool {
    fn accepts(ty: &TypeDescriptor) -> bool {
        ty.category() == Category::Ordinal8 && !ty.is_signed()
    }

    fn zeroed(_ty: &TypeDescriptor) -> Self {
        false
    }

    fn save(&self, _ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
        w.write_u8(*self as u8);
        Ok(())
    }

    fn load(_ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Self> {
        Ok(r.read_u8()? != 0)
    }

    fn compare(&self, other: &Self, _ty: &TypeDescriptor, _ci: bool) -> Ordering {
        self.cmp(other)
    }

    fn hash(&self, _ty: &TypeDescriptor, _ci: bool) -> u32 {
        hash_bytes(&[*self as u8])
    }
}

impl Typed for bool {
    fn descriptor() -> Descriptor {
        TypeDescriptor::boolean()
    }
}

impl Element for f32 {
    fn accepts(ty: &TypeDescriptor) -> bool {
        ty.category() == Category::Float32
    }

    fn zeroed(_ty: &TypeDescriptor) -> Self {
        0.0
    }

    fn save(&self, _ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
        w.write_u32(self.to_bits());
        Ok(())
    }

    fn load(_ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Self> {
        Ok(f32::from_bits(r.read_u32()?))
    }

    fn compare(&self, other: &Self, _ty: &TypeDescriptor, _ci: bool) -> Ordering {
        compare_f64(*self as f64, *other as f64)
    }

    fn hash(&self, _ty: &TypeDescriptor, _ci: bool) -> u32 {
        hash_f64(*self as f64)
    }
}

impl Typed for f32 {
    fn descriptor() -> Descriptor {
        TypeDescriptor::float32()
    }
}

/// `f64` fits both the Float64 and the Extended layouts.
impl Element for f64 {
    fn accepts(ty: &TypeDescriptor) -> bool {
        matches!(ty.category(), Category::Float64 | Category::Extended)
    }

    fn zeroed(_ty: &TypeDescriptor) -> Self {
        0.0
    }

    fn save(&self, ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
        if ty.category() == Category::Extended {
            w.write_bytes(&f64_to_extended(*self));
        } else {
            w.write_u64(self.to_bits());
        }
        Ok(())
    }

    fn load(ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Self> {
        if ty.category() == Category::Extended {
            Ok(extended_to_f64(r.read_array::<10>()?))
        } else {
            Ok(f64::from_bits(r.read_u64()?))
        }
    }

    fn compare(&self, other: &Self, _ty: &TypeDescriptor, _ci: bool) -> Ordering {
        compare_f64(*self, *other)
    }

    fn hash(&self, _ty: &TypeDescriptor, _ci: bool) -> u32 {
        hash_f64(*self)
    }
}

impl Typed for f64 {
    fn descriptor() -> Descriptor {
        TypeDescriptor::float64()
    }
}

/// Byte string; compared and hashed over its UTF-8 bytes.
impl Element for String {
    fn accepts(ty: &TypeDescriptor) -> bool {
        ty.category() == Category::ByteString
    }

    fn zeroed(_ty: &TypeDescriptor) -> Self {
        String::new()
    }

    fn save(&self, _ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
        w.write_len_prefixed(self.as_bytes());
        Ok(())
    }

    fn load(_ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Self> {
        let at = r.position();
        let bytes = r.read_len_prefixed()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Corrupt(format!("invalid UTF-8 in string at offset {at}: {e}")))
    }

    fn compare(&self, other: &Self, _ty: &TypeDescriptor, ci: bool) -> Ordering {
        if ci {
            compare_bytes_ci(self.as_bytes(), other.as_bytes())
        } else {
            self.as_bytes().cmp(other.as_bytes())
        }
    }

    fn hash(&self, _ty: &TypeDescriptor, ci: bool) -> u32 {
        if ci {
            hash_bytes_ci(self.as_bytes())
        } else {
            hash_bytes(self.as_bytes())
        }
    }
}

impl Typed for String {
    fn descriptor() -> Descriptor {
        TypeDescriptor::byte_string()
    }
}

/// UTF-16 string stored as raw code units.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WideString(pub Vec<u16>);

impl WideString {
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }
}

impl From<&str> for WideString {
    fn from(s: &str) -> Self {
        WideString(s.encode_utf16().collect())
    }
}

impl Element for WideString {
    fn accepts(ty: &TypeDescriptor) -> bool {
        ty.category() == Category::WideString
    }

    fn zeroed(_ty: &TypeDescriptor) -> Self {
        WideString::default()
    }

    fn save(&self, _ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
        write_units(w, &self.0);
        Ok(())
    }

    fn load(_ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Self> {
        Ok(WideString(read_units(r)?))
    }

    fn compare(&self, other: &Self, _ty: &TypeDescriptor, ci: bool) -> Ordering {
        if ci {
            compare_units_ci(&self.0, &other.0)
        } else {
            self.0.cmp(&other.0)
        }
    }

    fn hash(&self, _ty: &TypeDescriptor, ci: bool) -> u32 {
        if ci {
            hash_units_ci(&self.0)
        } else {
            hash_units(&self.0)
        }
    }
}

impl Typed for WideString {
    fn descriptor() -> Descriptor {
        TypeDescriptor::wide_string()
    }
}

impl Element for Variant {
    fn accepts(ty: &TypeDescriptor) -> bool {
        ty.category() == Category::Variant
    }

    fn zeroed(_ty: &TypeDescriptor) -> Self {
        Variant::Empty
    }

    fn save(&self, _ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
        Variant::save(self, w)
    }

    fn load(_ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Self> {
        Variant::load(r)
    }

    fn compare(&self, other: &Self, _ty: &TypeDescriptor, ci: bool) -> Ordering {
        Variant::compare(self, other, ci)
    }

    fn hash(&self, _ty: &TypeDescriptor, ci: bool) -> u32 {
        Variant::hash(self, ci)
    }
}

impl Typed for Variant {
    fn descriptor() -> Descriptor {
        TypeDescriptor::variant()
    }
}

/// A nested dynamic array of a statically typed item.
impl<T: Typed> Element for Vec<T> {
    fn accepts(ty: &TypeDescriptor) -> bool {
        ty.category() == Category::DynamicArray
            && ty.item().is_some_and(|item| item.same_shape(&T::descriptor()))
    }

    fn zeroed(_ty: &TypeDescriptor) -> Self {
        Vec::new()
    }

    fn save(&self, _ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
        let item = T::descriptor();
        dispatch::write_array_frame(&item, self, w, |it, w| it.save(&item, w))
    }

    fn load(_ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Self> {
        let item = T::descriptor();
        dispatch::read_array_frame(&item, r, |r| T::load(&item, r))
    }

    fn compare(&self, other: &Self, _ty: &TypeDescriptor, ci: bool) -> Ordering {
        let item = T::descriptor();
        for (a, b) in self.iter().zip(other) {
            let c = a.compare(b, &item, ci);
            if c != Ordering::Equal {
                return c;
            }
        }
        self.len().cmp(&other.len())
    }

    fn hash(&self, _ty: &TypeDescriptor, ci: bool) -> u32 {
        let item = T::descriptor();
        self.iter()
            .fold(combine(0, self.len() as u32), |h, it| combine(h, it.hash(&item, ci)))
    }
}

impl<T: Typed> Typed for Vec<T> {
    fn descriptor() -> Descriptor {
        TypeDescriptor::dynamic_array(T::descriptor())
    }
}

/// Type-erased items, processed through the dispatch tables.
impl Element for Value {
    fn accepts(_ty: &TypeDescriptor) -> bool {
        true
    }

    fn zeroed(ty: &TypeDescriptor) -> Self {
        Value::zeroed(ty)
    }

    fn save(&self, ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
        dispatch::save_value(self, ty, w)
    }

    fn load(ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Self> {
        dispatch::load_value(ty, r)
    }

    fn compare(&self, other: &Self, ty: &TypeDescriptor, ci: bool) -> Ordering {
        dispatch::compare_value(self, other, ty, ci)
    }

    fn hash(&self, ty: &TypeDescriptor, ci: bool) -> u32 {
        dispatch::hash_value(self, ty, ci)
    }

    fn check(&self, ty: &TypeDescriptor) -> Result<()> {
        Value::check(self, ty)
    }
}
