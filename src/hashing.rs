//! 32-bit hashing primitives shared by the typed and dynamic paths.
//!
//! All hashes are CRC-32 based. Composite values chain the hashes of
//! their parts with [`combine`], so two values that compare equal part by
//! part always hash equal.
//!
//! The case-insensitive variants fold at most [`CASE_FOLD_LIMIT`] units
//! of their input into a stack buffer and ignore the rest. Comparison in
//! case-insensitive mode applies the same truncation, so strings that
//! only differ past the limit are equal there and hash equal.

use core::cmp::Ordering;

/// Number of bytes (or UTF-16 code units) the case-insensitive path looks at.
pub const CASE_FOLD_LIMIT: usize = 256;

#[inline]
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// Chains `part` onto `seed`.
#[inline]
pub fn combine(seed: u32, part: u32) -> u32 {
    let mut h = crc32fast::Hasher::new_with_initial(seed);
    h.update(&part.to_le_bytes());
    h.finalize()
}

/// Upper-cases the bounded prefix of `bytes` into `buf`, returning the
/// folded slice.
#[inline]
fn fold_bytes<'b>(bytes: &[u8], buf: &'b mut [u8; CASE_FOLD_LIMIT]) -> &'b [u8] {
    let n = bytes.len().min(CASE_FOLD_LIMIT);
    for (d, s) in buf.iter_mut().zip(&bytes[..n]) {
        *d = s.to_ascii_uppercase();
    }
    &buf[..n]
}

#[inline]
fn upper_unit(u: u16) -> u16 {
    if (b'a' as u16..=b'z' as u16).contains(&u) {
        u - 32
    } else {
        u
    }
}

pub fn hash_bytes_ci(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; CASE_FOLD_LIMIT];
    hash_bytes(fold_bytes(bytes, &mut buf))
}

/// Hash of UTF-16 code units, over their little endian bytes.
pub fn hash_units(units: &[u16]) -> u32 {
    let mut h = crc32fast::Hasher::new();
    for u in units {
        h.update(&u.to_le_bytes());
    }
    h.finalize()
}

pub fn hash_units_ci(units: &[u16]) -> u32 {
    let mut buf = [0u8; CASE_FOLD_LIMIT * 2];
    let n = units.len().min(CASE_FOLD_LIMIT);
    for (i, u) in units[..n].iter().enumerate() {
        buf[2 * i..2 * i + 2].copy_from_slice(&upper_unit(*u).to_le_bytes());
    }
    hash_bytes(&buf[..2 * n])
}

pub fn compare_bytes_ci(a: &[u8], b: &[u8]) -> Ordering {
    let mut ba = [0u8; CASE_FOLD_LIMIT];
    let mut bb = [0u8; CASE_FOLD_LIMIT];
    fold_bytes(a, &mut ba).cmp(fold_bytes(b, &mut bb))
}

pub fn compare_units_ci(a: &[u16], b: &[u16]) -> Ordering {
    let a = &a[..a.len().min(CASE_FOLD_LIMIT)];
    let b = &b[..b.len().min(CASE_FOLD_LIMIT)];
    a.iter()
        .map(|u| upper_unit(*u))
        .cmp(b.iter().map(|u| upper_unit(*u)))
}

/// Folds `-0.0` into `0.0` so that equal floats share one bit pattern.
#[inline]
pub fn fold_float(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// Total order on floats with both zeros equal.
#[inline]
pub fn compare_f64(a: f64, b: f64) -> Ordering {
    fold_float(a).total_cmp(&fold_float(b))
}

#[inline]
pub fn hash_f64(v: f64) -> u32 {
    hash_bytes(&fold_float(v).to_bits().to_le_bytes())
}
