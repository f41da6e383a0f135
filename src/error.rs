//! Errors reported by the buffer and the slot map.

use thiserror::Error;

/// Everything that can go wrong when touching a [`DynamicBuffer`] or a
/// [`DenseSlotMap`].
///
/// None of these leave the container in a half-modified state: a call that
/// returns an error made no observable change.
///
/// [`DynamicBuffer`]: crate::DynamicBuffer
/// [`DenseSlotMap`]: crate::DenseSlotMap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The allocator could not provide room for `requested` elements.
    #[error("failed to allocate room for {requested} elements")]
    AllocationFailure {
        /// Total capacity that was asked for.
        requested: usize,
    },

    /// The key's value has been removed. Stale keys stay stale forever, even
    /// when their slot is reused.
    #[error("key refers to a removed value")]
    StaleKey,

    /// An index (or the slot index of a key) lies outside the container.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Length of the container at the time of the access.
        len: usize,
    },

    /// The slot map ran out of addressable slots.
    #[error("slot map cannot address more than {max} slots")]
    CapacityOverflow {
        /// Maximum number of slots.
        max: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
