//! Byte-level plumbing for the binary format.
//!
//! Multi-byte fixed-width integers are little endian. Lengths and counts
//! use unsigned base-128 varints (7 bits per byte, low group first, high
//! bit set on every byte but the last). [`Reader`] is always bounded by
//! the slice it was created from: every read checks the remaining length
//! first and fails with [`Error::Truncated`] instead of reading past it.

use crate::error::{Error, Result};

/// Longest varint accepted for a `u64`.
const MAX_VARINT_LEN: usize = 10;

/// Growable output buffer.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    #[inline]
    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_varuint(&mut self, mut v: u64) {
        while v >= 0x80 {
            self.buf.push((v as u8) | 0x80);
            v >>= 7;
        }
        self.buf.push(v as u8);
    }

    /// `[byteLength: varint][raw bytes]`
    pub fn write_len_prefixed(&mut self, bytes: &[u8]) {
        self.write_varuint(bytes.len() as u64);
        self.write_bytes(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounded cursor over an input slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Unread tail of the input.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_varuint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let b = self.read_u8()?;
            let bits = (b & 0x7f) as u64;
            if i == MAX_VARINT_LEN - 1 && b > 1 {
                return Err(Error::Corrupt("varint overflows 64 bits".into()));
            }
            value |= bits << (7 * i);
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::Corrupt("varint longer than 10 bytes".into()))
    }

    /// A varint that must fit `usize`.
    pub fn read_len(&mut self) -> Result<usize> {
        let v = self.read_varuint()?;
        usize::try_from(v).map_err(|_| Error::Corrupt(format!("length {v} does not fit usize")))
    }

    /// `[byteLength: varint][raw bytes]`, bounded by the input.
    pub fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let n = self.read_len()?;
        self.take(n)
    }
}

/// Converts an `f64` to the 10-byte x87 extended precision layout
/// (64-bit significand with explicit integer bit, 15-bit exponent, sign).
pub fn f64_to_extended(v: f64) -> [u8; 10] {
    let bits = v.to_bits();
    let sign = ((bits >> 63) as u16) << 15;
    let exp = ((bits >> 52) & 0x7ff) as i32;
    let frac = bits & ((1u64 << 52) - 1);
    let (e, m): (u16, u64) = if exp == 0 && frac == 0 {
        (0, 0)
    } else if exp == 0x7ff {
        (0x7fff, (1u64 << 63) | (frac << 11))
    } else if exp == 0 {
        let lz = frac.leading_zeros() as i32;
        ((15372 - lz) as u16, frac << lz)
    } else {
        ((exp - 1023 + 16383) as u16, (1u64 << 63) | (frac << 11))
    };
    let mut out = [0u8; 10];
    out[..8].copy_from_slice(&m.to_le_bytes());
    out[8..].copy_from_slice(&(sign | e).to_le_bytes());
    out
}

/// Inverse of [`f64_to_extended`]; values outside the `f64` range round
/// to infinity or zero.
pub fn extended_to_f64(raw: [u8; 10]) -> f64 {
    let mut mb = [0u8; 8];
    mb.copy_from_slice(&raw[..8]);
    let m = u64::from_le_bytes(mb);
    let se = u16::from_le_bytes([raw[8], raw[9]]);
    let negative = se & 0x8000 != 0;
    let e = (se & 0x7fff) as i32;
    let magnitude = if m == 0 {
        0.0
    } else if e == 0x7fff {
        let frac = (m >> 11) & ((1u64 << 52) - 1);
        if frac == 0 {
            f64::INFINITY
        } else {
            f64::from_bits((0x7ffu64 << 52) | frac)
        }
    } else {
        scale_pow2(m as f64, e - 16383 - 63)
    };
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

fn pow2(n: i32) -> f64 {
    f64::from_bits(((n + 1023) as u64) << 52)
}

fn scale_pow2(mut v: f64, mut n: i32) -> f64 {
    while n > 1023 {
        v *= pow2(1023);
        n -= 1023;
        if v.is_infinite() {
            return v;
        }
    }
    while n < -1022 {
        v *= pow2(-1022);
        n += 1022;
        if v == 0.0 {
            return v;
        }
    }
    v * pow2(n)
}
