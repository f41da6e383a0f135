#![warn(missing_docs, missing_debug_implementations)]

//! # denseslot
//!
//! This library provides [`DenseSlotMap`], a container with persistent unique
//! keys to access stored values. Upon insertion a key is returned that can be
//! used to later access or remove the value. Insertion, deletion and access
//! all take O(1) time with low overhead, and the values themselves are kept
//! in one contiguous array no matter how many have been removed.
//!
//! # Examples
//!
//! ```
//! # use denseslot::*;
//! let mut sm = DenseSlotMap::new();
//! let foo = sm.insert("foo").unwrap();  // Key generated on insert.
//! let bar = sm.insert("bar").unwrap();
//! assert_eq!(sm[foo], "foo");
//! assert_eq!(sm[bar], "bar");
//!
//! sm.remove(bar).unwrap();
//! let reused = sm.insert("reuse").unwrap();  // Slot from bar reused.
//! assert_eq!(reused.index(), bar.index());
//! assert_eq!(sm.contains_key(bar), false);  // After deletion a key stays invalid.
//! ```
//!
//! # Implementation details
//!
//! A [`DenseSlotMap`] is built from three [`DynamicBuffer`]s:
//!
//! * the slots, one per key index, each holding a generation and either the
//!   position of its value or the next free slot;
//! * the values, packed at the front with no holes;
//! * the slot finder, which maps every value position back to its slot.
//!
//! Removing a value moves the last value into the hole, and the slot finder
//! tells which slot has to be pointed at the new position. The freed slot gets
//! its generation bumped and is pushed onto a freelist threaded through the
//! slots themselves, so the next insertion reuses it in O(1).
//!
//! A key is only valid while its generation matches the generation stored in
//! its slot. This allows reusing slots after deletion without letting removed
//! keys point to spurious new elements. After 2<sup>32</sup> deletions of the
//! same slot the generation wraps around and such a spurious reference could
//! potentially occur. It is incredibly unlikely however, and in all
//! circumstances the behavior is safe. A slot map can hold up to
//! 2<sup>32</sup> - 1 elements at a time.
//!
//! A slot map never shrinks its slot array: it needs to remember the latest
//! generation of every slot so it never hands out duplicate keys.
//!
//! # Errors
//!
//! Growth uses fallible allocation, so running out of memory is reported as
//! [`Error::AllocationFailure`] and leaves the container untouched. Keys are
//! treated as untrusted input: a key whose slot index is out of bounds yields
//! [`Error::IndexOutOfRange`], a removed key yields [`Error::StaleKey`].

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod buffer;
pub use buffer::DynamicBuffer;

pub mod dense;
pub use dense::DenseSlotMap;

mod error;
pub use error::{Error, Result};

mod key;
pub use key::Key;

mod slot;
