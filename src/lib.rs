//! rtti-array: reflection-driven dynamic arrays with copy-on-write
//! buffers, an open-addressing hash index and a recursive binary codec.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: one array handle that works for any element type, whether its
//!   shape is known at compile time (`u32`, `String`, `Vec<T>`, ...) or
//!   only at runtime through a [`TypeDescriptor`].
//! - Layers:
//!   - `rtti`: runtime type descriptors (category, size, nested shape).
//!   - `dispatch`: four per-category tables (save, load, compare, hash)
//!     that recurse through nested descriptors for type-erased [`Value`]s.
//!   - `element`: the [`Element`] trait. Native types implement it
//!     directly (monomorphized); `Value` implements it through the tables.
//!   - `buffer`: reference-counted storage with copy-on-write.
//!   - `container`: [`Container`], a non-owning handle over a caller's
//!     buffer slot with the usual array operations.
//!   - `hash_index` / `hashed_container`: an open-addressing index of
//!     item positions layered over a container.
//!
//! Constraints
//! - Single-threaded: nothing here locks. A buffer may be shared between
//!   holders; copy-on-write keeps readers of other references unaffected,
//!   it does not make concurrent writers safe.
//! - No `unsafe`: storage is `Arc<Vec<T>>`, and the reference count is
//!   the `Arc` strong count.
//! - Load never reads past the input it is given; malformed input is an
//!   error, not a panic.
//!
//! Wire format
//! - Little endian; lengths and counts are LEB128 varints.
//! - Dynamic array: `[itemSize][itemCategoryTag: u8][count]`, then for
//!   `count > 0` a reserved `u32` (always 0) and each item.
//! - Strings: `[byteLength][bytes]`. Variants: `[tag: u16][payload]`.
//! - Records: raw little-endian image of the unmanaged fields, split
//!   around each managed field's own encoding.
//!
//! Hashing and equality
//! - Hashes are 32 bits and always agree with compare: equal items hash
//!   equal, including case-insensitive mode, which folds at most
//!   [`CASE_FOLD_LIMIT`] units of a string.
//! - Class instances compare but do not hash or serialize.
//!
//! Notes and non-goals
//! - No locking wrappers, no interning pools, no JSON API; documents
//!   inside variants are stored as JSON text only to stay round-trippable.
//! - Cyclic object graphs are not detected by compare.

pub mod buffer;
pub mod codec;
pub mod container;
pub mod dispatch;
pub mod element;
mod error;
pub mod hash_index;
pub mod hashed_container;
mod hashed_container_proptest;
pub mod hashing;
pub mod rtti;
pub mod sort;
pub mod value;
pub mod variant;

// Public surface
pub use buffer::Buffer;
pub use codec::{Reader, Writer};
pub use container::{Comparator, Container};
pub use element::{Element, Typed, WideString};
pub use error::{Error, Result};
pub use hash_index::{HashIndex, Probe, DEFAULT_COUNT_TRIGGER, HASH_PRIMES, POW2_TABLE_LIMIT};
pub use hashed_container::{HashedContainer, Hasher};
pub use hashing::CASE_FOLD_LIMIT;
pub use rtti::{Category, ClassField, ClassInfo, Descriptor, RecordField, TypeDescriptor};
pub use value::{Object, Value};
pub use variant::Variant;
