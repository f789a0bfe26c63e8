//! Per-category dispatch tables: save, load, compare and hash.
//!
//! Each table has one slot per [`Category`]. Composite entries recurse
//! through the entry points below ([`save_value`], [`load_value`],
//! [`compare_value`], [`hash_value`]), which look the nested descriptor's
//! category up again. An empty slot means the operation is not supported
//! for that category; [`save_value`] and [`load_value`] turn it into
//! [`Error::Unsupported`], and [`hashable`] reports it before any hash is
//! taken.
//!
//! Record layout on the wire: unmanaged fields are written into a zeroed
//! image of the record (little endian, at their offsets), and that image
//! is flushed in runs: the bytes between the end of the previous managed
//! field and the start of the next one, then the tail after the last.
//! Managed fields are encoded recursively in between.

use crate::codec::{extended_to_f64, f64_to_extended, Reader, Writer};
use crate::error::{Error, Result};
use crate::hashing::{
    combine, compare_bytes_ci, compare_f64, compare_units_ci, hash_bytes, hash_bytes_ci, hash_f64,
    hash_units, hash_units_ci,
};
use crate::rtti::{Category, TypeDescriptor};
use crate::value::{Object, Value};
use crate::variant::{read_units, write_units, Variant};
use core::cmp::Ordering;
use std::sync::Arc;

pub type SaveFn = fn(&Value, &TypeDescriptor, &mut Writer) -> Result<()>;
pub type LoadFn = fn(&TypeDescriptor, &mut Reader<'_>) -> Result<Value>;
pub type CompareFn = fn(&Value, &Value, &TypeDescriptor, bool) -> Ordering;
pub type HashFn = fn(&Value, &TypeDescriptor, bool) -> u32;

/// Reserved checksum word written after a non-empty array count.
const RESERVED_CHECKSUM: u32 = 0;

pub static SAVE: [Option<SaveFn>; Category::COUNT] = [
    Some(save_fixed),
    Some(save_fixed),
    Some(save_fixed),
    Some(save_fixed),
    Some(save_fixed),
    Some(save_fixed),
    Some(save_fixed),
    Some(save_byte_string),
    Some(save_wide_string),
    Some(save_record),
    Some(save_static_array),
    Some(save_dynamic_array),
    Some(save_variant),
    None,
];

pub static LOAD: [Option<LoadFn>; Category::COUNT] = [
    Some(load_fixed),
    Some(load_fixed),
    Some(load_fixed),
    Some(load_fixed),
    Some(load_fixed),
    Some(load_fixed),
    Some(load_fixed),
    Some(load_byte_string),
    Some(load_wide_string),
    Some(load_record),
    Some(load_static_array),
    Some(load_dynamic_array),
    Some(load_variant),
    None,
];

pub static COMPARE: [Option<CompareFn>; Category::COUNT] = [
    Some(compare_ordinal),
    Some(compare_ordinal),
    Some(compare_ordinal),
    Some(compare_ordinal),
    Some(compare_float),
    Some(compare_float),
    Some(compare_float),
    Some(compare_byte_string),
    Some(compare_wide_string),
    Some(compare_record),
    Some(compare_static_array),
    Some(compare_dynamic_array),
    Some(compare_variant),
    Some(compare_class),
];

pub static HASH: [Option<HashFn>; Category::COUNT] = [
    Some(hash_fixed),
    Some(hash_fixed),
    Some(hash_fixed),
    Some(hash_fixed),
    Some(hash_float),
    Some(hash_float),
    Some(hash_float),
    Some(hash_byte_string),
    Some(hash_wide_string),
    Some(hash_record),
    Some(hash_items),
    Some(hash_dynamic_array),
    Some(hash_variant),
    None,
];

#[inline]
pub fn save_fn(category: Category) -> Option<SaveFn> {
    SAVE[category.index()]
}

#[inline]
pub fn load_fn(category: Category) -> Option<LoadFn> {
    LOAD[category.index()]
}

#[inline]
pub fn compare_fn(category: Category) -> Option<CompareFn> {
    COMPARE[category.index()]
}

#[inline]
pub fn hash_fn(category: Category) -> Option<HashFn> {
    HASH[category.index()]
}

pub fn save_value(v: &Value, ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
    let f = save_fn(ty.category()).ok_or(Error::Unsupported {
        category: ty.category(),
        operation: "save",
    })?;
    f(v, ty, w)
}

pub fn load_value(ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Value> {
    let f = load_fn(ty.category()).ok_or(Error::Unsupported {
        category: ty.category(),
        operation: "load",
    })?;
    f(ty, r)
}

/// Encodes one value into a fresh buffer.
pub fn save_to_vec(v: &Value, ty: &TypeDescriptor) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    save_value(v, ty, &mut w)?;
    Ok(w.into_inner())
}

/// Decodes one value from the start of `bytes`; returns it with the
/// number of bytes consumed.
pub fn load_from_slice(ty: &TypeDescriptor, bytes: &[u8]) -> Result<(Value, usize)> {
    let mut r = Reader::new(bytes);
    let v = load_value(ty, &mut r)?;
    Ok((v, r.position()))
}

pub fn compare_value(a: &Value, b: &Value, ty: &TypeDescriptor, case_insensitive: bool) -> Ordering {
    match compare_fn(ty.category()) {
        Some(f) => f(a, b, ty, case_insensitive),
        None => mismatched(a, b),
    }
}

/// Hash consistent with [`compare_value`]. Parts whose category has no
/// hash function contribute nothing; check [`hashable`] first.
pub fn hash_value(v: &Value, ty: &TypeDescriptor, case_insensitive: bool) -> u32 {
    match hash_fn(ty.category()) {
        Some(f) => f(v, ty, case_insensitive),
        None => 0,
    }
}

/// True when every category reachable from `ty` has a hash function.
pub fn hashable(ty: &TypeDescriptor) -> bool {
    if hash_fn(ty.category()).is_none() {
        return false;
    }
    match ty.category() {
        Category::Record => ty.fields().iter().all(|f| hashable(&f.ty)),
        Category::StaticArray | Category::DynamicArray => ty.item().map(|i| hashable(i)).unwrap_or(false),
        _ => true,
    }
}

fn mismatch_error(ty: &TypeDescriptor, v: &Value) -> Error {
    Error::mismatch(ty.name(), v.kind_name())
}

/// Ordering for values that do not fit their descriptor: by kind only.
fn mismatched(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Int(_) => 0,
            Value::UInt(_) => 1,
            Value::Float(_) => 2,
            Value::Bytes(_) => 3,
            Value::Wide(_) => 4,
            Value::Record(_) => 5,
            Value::Array(_) => 6,
            Value::DynArray(_) => 7,
            Value::Variant(_) => 8,
            Value::Object(_) => 9,
        }
    }
    rank(a).cmp(&rank(b))
}

// ---------------------------------------------------------------------------
// Raw (unmanaged) encoding
// ---------------------------------------------------------------------------

/// Writes an unmanaged value into `out` (exactly `ty.size()` bytes).
fn write_raw(v: &Value, ty: &TypeDescriptor, out: &mut [u8]) -> Result<()> {
    match (ty.category(), v) {
        (c, Value::Int(x)) if c.is_ordinal() => out.copy_from_slice(&x.to_le_bytes()[..ty.size()]),
        (c, Value::UInt(x)) if c.is_ordinal() => out.copy_from_slice(&x.to_le_bytes()[..ty.size()]),
        (Category::Float32, Value::Float(x)) => out.copy_from_slice(&(*x as f32).to_bits().to_le_bytes()),
        (Category::Float64, Value::Float(x)) => out.copy_from_slice(&x.to_bits().to_le_bytes()),
        (Category::Extended, Value::Float(x)) => out.copy_from_slice(&f64_to_extended(*x)),
        (Category::Record, Value::Record(values)) if values.len() == ty.fields().len() => {
            for (f, fv) in ty.fields().iter().zip(values) {
                write_raw(fv, &f.ty, &mut out[f.offset..f.end()])?;
            }
        }
        (Category::StaticArray, Value::Array(items)) => {
            let item = ty.item().ok_or_else(|| mismatch_error(ty, v))?;
            if Some(items.len()) != ty.count() {
                return Err(mismatch_error(ty, v));
            }
            for (i, iv) in items.iter().enumerate() {
                write_raw(iv, item, &mut out[i * item.size()..(i + 1) * item.size()])?;
            }
        }
        _ => return Err(mismatch_error(ty, v)),
    }
    Ok(())
}

/// Decodes an unmanaged value from exactly `ty.size()` bytes.
fn read_raw(ty: &TypeDescriptor, bytes: &[u8]) -> Result<Value> {
    Ok(match ty.category() {
        c if c.is_ordinal() => {
            let mut buf = [0u8; 8];
            buf[..bytes.len()].copy_from_slice(bytes);
            let raw = u64::from_le_bytes(buf);
            if ty.is_signed() {
                let shift = 64 - 8 * bytes.len() as u32;
                Value::Int(((raw << shift) as i64) >> shift)
            } else {
                Value::UInt(raw)
            }
        }
        Category::Float32 => Value::Float(f32::from_bits(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])) as f64),
        Category::Float64 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            Value::Float(f64::from_bits(u64::from_le_bytes(buf)))
        }
        Category::Extended => {
            let mut buf = [0u8; 10];
            buf.copy_from_slice(bytes);
            Value::Float(extended_to_f64(buf))
        }
        Category::Record => Value::Record(
            ty.fields()
                .iter()
                .map(|f| read_raw(&f.ty, &bytes[f.offset..f.end()]))
                .collect::<Result<_>>()?,
        ),
        Category::StaticArray => {
            let (item, count) = match (ty.item(), ty.count()) {
                (Some(i), Some(n)) => (i, n),
                _ => return Err(Error::Corrupt(format!("{ty} has no item type"))),
            };
            Value::Array(
                (0..count)
                    .map(|i| read_raw(item, &bytes[i * item.size()..(i + 1) * item.size()]))
                    .collect::<Result<_>>()?,
            )
        }
        other => {
            return Err(Error::Unsupported {
                category: other,
                operation: "raw copy",
            })
        }
    })
}

/// Smallest number of bytes one encoded value of `ty` can take.
fn min_encoded_size(ty: &TypeDescriptor) -> usize {
    match ty.category() {
        Category::ByteString | Category::WideString => 1,
        Category::Variant => 2,
        Category::DynamicArray => 3,
        Category::Class => 0,
        Category::StaticArray if ty.is_managed() => {
            let items = match (ty.item(), ty.count()) {
                (Some(i), Some(n)) => min_encoded_size(i).saturating_mul(n),
                _ => 0,
            };
            items.saturating_add(3)
        }
        Category::Record if ty.is_managed() => ty
            .fields()
            .iter()
            .filter(|f| f.ty.is_managed())
            .fold(ty.size(), |acc, f| acc - f.ty.size() + min_encoded_size(&f.ty)),
        _ => ty.size(),
    }
}

// ---------------------------------------------------------------------------
// Save / load
// ---------------------------------------------------------------------------

fn save_fixed(v: &Value, ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
    let mut buf = [0u8; 10];
    let out = &mut buf[..ty.size()];
    write_raw(v, ty, out)?;
    w.write_bytes(out);
    Ok(())
}

fn load_fixed(ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Value> {
    read_raw(ty, r.take(ty.size())?)
}

fn save_byte_string(v: &Value, ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
    match v {
        Value::Bytes(b) => {
            w.write_len_prefixed(b);
            Ok(())
        }
        _ => Err(mismatch_error(ty, v)),
    }
}

fn load_byte_string(_ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Value> {
    Ok(Value::Bytes(r.read_len_prefixed()?.to_vec()))
}

fn save_wide_string(v: &Value, ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
    match v {
        Value::Wide(u) => {
            write_units(w, u);
            Ok(())
        }
        _ => Err(mismatch_error(ty, v)),
    }
}

fn load_wide_string(_ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Value> {
    Ok(Value::Wide(read_units(r)?))
}

fn save_record(v: &Value, ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
    let values = match v {
        Value::Record(values) if values.len() == ty.fields().len() => values,
        _ => return Err(mismatch_error(ty, v)),
    };
    let mut image = vec![0u8; ty.size()];
    let mut run_start = 0;
    for (f, fv) in ty.fields().iter().zip(values) {
        if f.ty.is_managed() {
            w.write_bytes(&image[run_start..f.offset]);
            save_value(fv, &f.ty, w)?;
            run_start = f.end();
        } else {
            write_raw(fv, &f.ty, &mut image[f.offset..f.end()])?;
        }
    }
    w.write_bytes(&image[run_start..]);
    Ok(())
}

fn load_record(ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Value> {
    let fields = ty.fields();
    let mut image = vec![0u8; ty.size()];
    let mut managed = Vec::new();
    let mut run_start = 0;
    for f in fields.iter().filter(|f| f.ty.is_managed()) {
        image[run_start..f.offset].copy_from_slice(r.take(f.offset - run_start)?);
        managed.push(load_value(&f.ty, r)?);
        run_start = f.end();
    }
    image[run_start..].copy_from_slice(r.take(ty.size() - run_start)?);

    let mut managed = managed.into_iter();
    let mut values = Vec::with_capacity(fields.len());
    for f in fields {
        let v = if f.ty.is_managed() {
            managed
                .next()
                .ok_or_else(|| Error::Corrupt(format!("{ty}: missing managed field {}", f.name)))?
        } else {
            read_raw(&f.ty, &image[f.offset..f.end()])?
        };
        values.push(v);
    }
    Ok(Value::Record(values))
}

/// `[itemSize: varint][itemCategoryTag: u8][count: varint]`
fn write_frame_header(item: &TypeDescriptor, count: usize, w: &mut Writer) {
    w.write_varuint(item.size() as u64);
    w.write_u8(item.category().tag());
    w.write_varuint(count as u64);
}

/// Reads and validates a frame header against `item`; returns the count,
/// after checking that `count` items can fit in what is left of the input.
fn read_frame_header(item: &TypeDescriptor, r: &mut Reader<'_>) -> Result<usize> {
    let at = r.position();
    let size = r.read_len()?;
    let tag = r.read_u8()?;
    if tag != item.category().tag() {
        tracing::debug!(offset = at, expected = item.category().tag(), found = tag, "array frame tag mismatch");
        return Err(Error::Corrupt(format!(
            "array item category tag {tag}, expected {} for {item}",
            item.category().tag()
        )));
    }
    if size != item.size() {
        tracing::debug!(offset = at, expected = item.size(), found = size, "array frame item size mismatch");
        return Err(Error::Corrupt(format!(
            "array item size {size}, expected {} for {item}",
            item.size()
        )));
    }
    let count = r.read_len()?;
    let needed = min_encoded_size(item).max(1).saturating_mul(count);
    if needed > r.remaining() {
        tracing::debug!(offset = at, count, remaining = r.remaining(), "array count exceeds input");
        return Err(Error::Truncated {
            needed,
            available: r.remaining(),
        });
    }
    Ok(count)
}

fn load_items(item: &TypeDescriptor, count: usize, r: &mut Reader<'_>) -> Result<Vec<Value>> {
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(load_value(item, r)?);
    }
    Ok(items)
}

fn save_static_array(v: &Value, ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
    let (item, items) = match (ty.item(), v) {
        (Some(item), Value::Array(items)) if Some(items.len()) == ty.count() => (item, items),
        _ => return Err(mismatch_error(ty, v)),
    };
    write_frame_header(item, items.len(), w);
    for iv in items {
        save_value(iv, item, w)?;
    }
    Ok(())
}

fn load_static_array(ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Value> {
    let item = ty
        .item()
        .ok_or_else(|| Error::Corrupt(format!("{ty} has no item type")))?;
    let count = read_frame_header(item, r)?;
    if Some(count) != ty.count() {
        return Err(Error::Corrupt(format!(
            "{ty}: stored count {count} does not match"
        )));
    }
    Ok(Value::Array(load_items(item, count, r)?))
}

/// DynamicArray frame over `items`: header, then for a non-empty array
/// the reserved checksum word and each item.
pub(crate) fn write_array_frame<T>(
    item: &TypeDescriptor,
    items: &[T],
    w: &mut Writer,
    mut save: impl FnMut(&T, &mut Writer) -> Result<()>,
) -> Result<()> {
    write_frame_header(item, items.len(), w);
    if items.is_empty() {
        return Ok(());
    }
    w.write_u32(RESERVED_CHECKSUM);
    for it in items {
        save(it, w)?;
    }
    Ok(())
}

/// Reads a DynamicArray frame, calling `load` once per item.
pub(crate) fn read_array_frame<T>(
    item: &TypeDescriptor,
    r: &mut Reader<'_>,
    mut load: impl FnMut(&mut Reader<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    let count = read_frame_header(item, r)?;
    if count == 0 {
        return Ok(Vec::new());
    }
    let _reserved = r.read_u32()?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(load(r)?);
    }
    Ok(out)
}

fn save_dynamic_array(v: &Value, ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
    let item = match (ty.item(), v) {
        (Some(item), Value::DynArray(_)) => item,
        _ => return Err(mismatch_error(ty, v)),
    };
    write_array_frame(item, v.items(), w, |iv, w| save_value(iv, item, w))
}

fn load_dynamic_array(ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Value> {
    let item = ty
        .item()
        .ok_or_else(|| Error::Corrupt(format!("{ty} has no item type")))?;
    let items = read_array_frame(item, r, |r| load_value(item, r))?;
    Ok(Value::dyn_array(items))
}

fn save_variant(v: &Value, ty: &TypeDescriptor, w: &mut Writer) -> Result<()> {
    match v {
        Value::Variant(var) => var.save(w),
        _ => Err(mismatch_error(ty, v)),
    }
}

fn load_variant(_ty: &TypeDescriptor, r: &mut Reader<'_>) -> Result<Value> {
    Ok(Value::Variant(Variant::load(r)?))
}

// ---------------------------------------------------------------------------
// Compare
// ---------------------------------------------------------------------------

fn compare_ordinal(a: &Value, b: &Value, _ty: &TypeDescriptor, _ci: bool) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::UInt(x), Value::UInt(y)) => x.cmp(y),
        (Value::Int(x), Value::UInt(y)) => (*x as i128).cmp(&(*y as i128)),
        (Value::UInt(x), Value::Int(y)) => (*x as i128).cmp(&(*y as i128)),
        _ => mismatched(a, b),
    }
}

/// A Float32 slot only ever persists single precision, so compare and hash
/// see the value the way it will be saved.
fn stored_float(x: f64, ty: &TypeDescriptor) -> f64 {
    match ty.category() {
        Category::Float32 => x as f32 as f64,
        _ => x,
    }
}

fn compare_float(a: &Value, b: &Value, ty: &TypeDescriptor, _ci: bool) -> Ordering {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => compare_f64(stored_float(*x, ty), stored_float(*y, ty)),
        _ => mismatched(a, b),
    }
}

fn compare_byte_string(a: &Value, b: &Value, _ty: &TypeDescriptor, ci: bool) -> Ordering {
    match (a, b) {
        (Value::Bytes(x), Value::Bytes(y)) if ci => compare_bytes_ci(x, y),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        _ => mismatched(a, b),
    }
}

fn compare_wide_string(a: &Value, b: &Value, _ty: &TypeDescriptor, ci: bool) -> Ordering {
    match (a, b) {
        (Value::Wide(x), Value::Wide(y)) if ci => compare_units_ci(x, y),
        (Value::Wide(x), Value::Wide(y)) => x.cmp(y),
        _ => mismatched(a, b),
    }
}

fn compare_record(a: &Value, b: &Value, ty: &TypeDescriptor, ci: bool) -> Ordering {
    match (a, b) {
        (Value::Record(x), Value::Record(y)) => {
            for ((f, xv), yv) in ty.fields().iter().zip(x).zip(y) {
                let c = compare_value(xv, yv, &f.ty, ci);
                if c != Ordering::Equal {
                    return c;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => mismatched(a, b),
    }
}

fn compare_items(x: &[Value], y: &[Value], item: &TypeDescriptor, ci: bool) -> Ordering {
    for (xv, yv) in x.iter().zip(y) {
        let c = compare_value(xv, yv, item, ci);
        if c != Ordering::Equal {
            return c;
        }
    }
    x.len().cmp(&y.len())
}

fn compare_static_array(a: &Value, b: &Value, ty: &TypeDescriptor, ci: bool) -> Ordering {
    match (a, b, ty.item()) {
        (Value::Array(x), Value::Array(y), Some(item)) => compare_items(x, y, item, ci),
        _ => mismatched(a, b),
    }
}

fn compare_dynamic_array(a: &Value, b: &Value, ty: &TypeDescriptor, ci: bool) -> Ordering {
    match (a, b, ty.item()) {
        (Value::DynArray(Some(x)), Value::DynArray(Some(y)), _) if x.ptr_eq(y) => Ordering::Equal,
        (Value::DynArray(None), Value::DynArray(None), _) => Ordering::Equal,
        (Value::DynArray(_), Value::DynArray(_), Some(item)) => compare_items(a.items(), b.items(), item, ci),
        _ => mismatched(a, b),
    }
}

fn compare_variant(a: &Value, b: &Value, _ty: &TypeDescriptor, ci: bool) -> Ordering {
    match (a, b) {
        (Value::Variant(x), Value::Variant(y)) => x.compare(y, ci),
        _ => mismatched(a, b),
    }
}

fn compare_class(a: &Value, b: &Value, _ty: &TypeDescriptor, ci: bool) -> Ordering {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => compare_objects(x.as_ref(), y.as_ref(), ci),
        _ => mismatched(a, b),
    }
}

/// Walks the fields of the more-derived class (the left one when the
/// classes are unrelated) and compares each against the same-named field
/// of the other instance; names missing on the other side are skipped.
fn compare_objects(a: Option<&Arc<Object>>, b: Option<&Arc<Object>>, ci: bool) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(a), Some(b)) if Arc::ptr_eq(a, b) => return Ordering::Equal,
        (Some(a), Some(b)) => (a, b),
    };
    let walk_right = b.class().inherits_from(a.class()) && !Arc::ptr_eq(a.class(), b.class());
    let primary = if walk_right { b.class() } else { a.class() };
    for (i, field) in primary.fields().iter().enumerate() {
        let (av, bv) = if walk_right {
            match a.class().field_index(&field.name) {
                Some(j) => (&a.fields()[j], &b.fields()[i]),
                None => continue,
            }
        } else {
            match b.class().field_index(&field.name) {
                Some(j) => (&a.fields()[i], &b.fields()[j]),
                None => continue,
            }
        };
        let c = compare_value(av, bv, &field.ty, ci);
        if c != Ordering::Equal {
            return c;
        }
    }
    Ordering::Equal
}

// ---------------------------------------------------------------------------
// Hash
// ---------------------------------------------------------------------------

fn hash_fixed(v: &Value, ty: &TypeDescriptor, _ci: bool) -> u32 {
    let mut buf = [0u8; 10];
    let out = &mut buf[..ty.size()];
    match write_raw(v, ty, out) {
        Ok(()) => hash_bytes(out),
        Err(_) => 0,
    }
}

fn hash_float(v: &Value, ty: &TypeDescriptor, _ci: bool) -> u32 {
    match v {
        Value::Float(x) => hash_f64(stored_float(*x, ty)),
        _ => 0,
    }
}

fn hash_byte_string(v: &Value, _ty: &TypeDescriptor, ci: bool) -> u32 {
    match v {
        Value::Bytes(b) if ci => hash_bytes_ci(b),
        Value::Bytes(b) => hash_bytes(b),
        _ => 0,
    }
}

fn hash_wide_string(v: &Value, _ty: &TypeDescriptor, ci: bool) -> u32 {
    match v {
        Value::Wide(u) if ci => hash_units_ci(u),
        Value::Wide(u) => hash_units(u),
        _ => 0,
    }
}

fn hash_record(v: &Value, ty: &TypeDescriptor, ci: bool) -> u32 {
    match v {
        Value::Record(values) => ty
            .fields()
            .iter()
            .zip(values)
            .fold(0, |h, (f, fv)| combine(h, hash_value(fv, &f.ty, ci))),
        _ => 0,
    }
}

fn hash_items(v: &Value, ty: &TypeDescriptor, ci: bool) -> u32 {
    match ty.item() {
        Some(item) => v
            .items()
            .iter()
            .fold(combine(0, v.items().len() as u32), |h, iv| combine(h, hash_value(iv, item, ci))),
        None => 0,
    }
}

fn hash_dynamic_array(v: &Value, ty: &TypeDescriptor, ci: bool) -> u32 {
    hash_items(v, ty, ci)
}

fn hash_variant(v: &Value, _ty: &TypeDescriptor, ci: bool) -> u32 {
    match v {
        Value::Variant(var) => var.hash(ci),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtti::{ClassField, ClassInfo, RecordField};

    fn person() -> crate::rtti::Descriptor {
        TypeDescriptor::record(
            "Person",
            24,
            vec![
                RecordField::new("id", 0, TypeDescriptor::u16()),
                RecordField::new("age", 2, TypeDescriptor::i8()),
                RecordField::new("name", 8, TypeDescriptor::byte_string()),
                RecordField::new("score", 16, TypeDescriptor::float32()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn unsupported_categories_have_no_entry() {
        assert!(save_fn(Category::Class).is_none());
        assert!(load_fn(Category::Class).is_none());
        assert!(hash_fn(Category::Class).is_none());
        assert!(compare_fn(Category::Class).is_some());

        let class = ClassInfo::new("C", None, vec![]).unwrap();
        let ty = TypeDescriptor::class(class);
        let err = save_to_vec(&Value::Object(None), &ty).unwrap_err();
        assert_eq!(
            err,
            Error::Unsupported {
                category: Category::Class,
                operation: "save"
            }
        );
        assert!(!hashable(&ty));
        assert!(!hashable(&TypeDescriptor::dynamic_array(ty)));
        assert!(hashable(&person()));
    }

    #[test]
    fn record_flushes_raw_runs_around_managed_fields() {
        let v = Value::Record(vec![
            Value::UInt(0x0102),
            Value::Int(-1),
            Value::str("ab"),
            Value::Float(1.0),
        ]);
        let bytes = save_to_vec(&v, &person()).unwrap();
        // raw run [0..8): id, age, padding
        assert_eq!(&bytes[..8], &[0x02, 0x01, 0xff, 0, 0, 0, 0, 0]);
        // managed name
        assert_eq!(&bytes[8..11], &[2, b'a', b'b']);
        // tail run [16..24): score then padding
        assert_eq!(&bytes[11..15], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[15..], &[0, 0, 0, 0]);

        let (back, used) = load_from_slice(&person(), &bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(back, v);
    }

    #[test]
    fn signedness_drives_ordinal_compare() {
        let i = TypeDescriptor::i8();
        let u = TypeDescriptor::u8();
        let (neg, _) = load_from_slice(&i, &[0xff]).unwrap();
        let (big, _) = load_from_slice(&u, &[0xff]).unwrap();
        assert_eq!(neg, Value::Int(-1));
        assert_eq!(big, Value::UInt(255));
        assert_eq!(compare_value(&neg, &Value::Int(0), &i, false), Ordering::Less);
        assert_eq!(compare_value(&big, &Value::UInt(0), &u, false), Ordering::Greater);
    }

    #[test]
    fn dynamic_array_frame_layout() {
        let ty = TypeDescriptor::dynamic_array(TypeDescriptor::u16());
        let v = Value::dyn_array(vec![Value::UInt(1), Value::UInt(2)]);
        let bytes = save_to_vec(&v, &ty).unwrap();
        assert_eq!(bytes, vec![2, Category::Ordinal16.tag(), 2, 0, 0, 0, 0, 1, 0, 2, 0]);

        let empty = save_to_vec(&Value::DynArray(None), &ty).unwrap();
        assert_eq!(empty, vec![2, Category::Ordinal16.tag(), 0]);
    }

    #[test]
    fn dynamic_array_load_rejects_bad_frames() {
        let ty = TypeDescriptor::dynamic_array(TypeDescriptor::u16());
        // wrong category tag
        let bad_tag = [2u8, Category::Ordinal32.tag(), 0];
        assert!(matches!(load_from_slice(&ty, &bad_tag), Err(Error::Corrupt(_))));
        // wrong item size
        let bad_size = [4u8, Category::Ordinal16.tag(), 0];
        assert!(matches!(load_from_slice(&ty, &bad_size), Err(Error::Corrupt(_))));
        // count reaching past the input
        let huge = [2u8, Category::Ordinal16.tag(), 0xff, 0xff, 0x03, 0, 0, 0, 0, 1, 0];
        assert!(matches!(load_from_slice(&ty, &huge), Err(Error::Truncated { .. })));
    }

    #[test]
    fn dynamic_array_compare_short_circuits() {
        let ty = TypeDescriptor::dynamic_array(TypeDescriptor::i32());
        let a = Value::dyn_array(vec![Value::Int(1), Value::Int(2)]);
        let shared = a.clone();
        assert_eq!(compare_value(&a, &shared, &ty, false), Ordering::Equal);
        let shorter = Value::dyn_array(vec![Value::Int(1)]);
        assert_eq!(compare_value(&shorter, &a, &ty, false), Ordering::Less);
        assert_eq!(compare_value(&Value::DynArray(None), &shorter, &ty, false), Ordering::Less);
        let bigger = Value::dyn_array(vec![Value::Int(3)]);
        assert_eq!(compare_value(&bigger, &a, &ty, false), Ordering::Greater);
    }

    #[test]
    fn class_compare_walks_more_derived_fields() {
        let base = ClassInfo::new("Base", None, vec![ClassField::new("id", TypeDescriptor::i32())]).unwrap();
        let derived = ClassInfo::new(
            "Derived",
            Some(base.clone()),
            vec![ClassField::new("name", TypeDescriptor::byte_string())],
        )
        .unwrap();
        let other = ClassInfo::new(
            "Other",
            None,
            vec![
                ClassField::new("name", TypeDescriptor::byte_string()),
                ClassField::new("id", TypeDescriptor::i32()),
            ],
        )
        .unwrap();
        let ty = TypeDescriptor::class(base.clone());

        let b = Value::Object(Some(Arc::new(Object::with_fields(base, vec![Value::Int(1)]).unwrap())));
        let d = Value::Object(Some(Arc::new(
            Object::with_fields(derived, vec![Value::Int(1), Value::str("x")]).unwrap(),
        )));
        let o = Value::Object(Some(Arc::new(
            Object::with_fields(other, vec![Value::str("y"), Value::Int(1)]).unwrap(),
        )));

        // Derived has no counterpart for "name" in Base: only "id" counts.
        assert_eq!(compare_value(&b, &d, &ty, false), Ordering::Equal);
        assert_eq!(compare_value(&d, &b, &ty, false), Ordering::Equal);
        // Unrelated classes match by name: "name" differs.
        assert_eq!(compare_value(&d, &o, &ty, false), Ordering::Less);
        assert_eq!(compare_value(&Value::Object(None), &b, &ty, false), Ordering::Less);
        assert_eq!(compare_value(&Value::Object(None), &Value::Object(None), &ty, false), Ordering::Equal);
    }

    #[test]
    fn extended_fields_use_ten_bytes() {
        let ty = TypeDescriptor::extended();
        let bytes = save_to_vec(&Value::Float(-3.5), &ty).unwrap();
        assert_eq!(bytes.len(), 10);
        assert_eq!(load_from_slice(&ty, &bytes).unwrap().0, Value::Float(-3.5));
    }

    #[test]
    fn float32_compares_at_saved_precision() {
        let ty = TypeDescriptor::float32();
        let wide = Value::Float(0.1);
        let bytes = save_to_vec(&wide, &ty).unwrap();
        let narrowed = load_from_slice(&ty, &bytes).unwrap().0;
        assert_ne!(narrowed, wide);
        assert_eq!(compare_value(&wide, &narrowed, &ty, false), Ordering::Equal);
        assert_eq!(hash_value(&wide, &ty, false), hash_value(&narrowed, &ty, false));

        let double = TypeDescriptor::float64();
        assert_ne!(compare_value(&wide, &narrowed, &double, false), Ordering::Equal);
    }
}
