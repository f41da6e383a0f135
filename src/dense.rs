//! Contains the dense slot map implementation.

// Keys received from the user are not trusted: they might be stale, null, or
// come from a different slot map. Everything a key points at is bounds- and
// generation-checked before use. Indices stored *inside* the map (slot finder
// entries, occupied slot states) are kept consistent by every operation.

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::slice;

use crate::buffer::{self, DynamicBuffer};
use crate::error::{Error, Result};
use crate::slot::{Slot, SlotState};
use crate::Key;

// Slot indices have to stay below u32::MAX, the index of the null key.
const MAX_SLOTS: usize = std::u32::MAX as usize;

/// Dense slot map, storage with stable unique keys.
///
/// Values live contiguously in insertion-then-swap order, so iteration is as
/// fast as iterating a `Vec`. A key goes through one extra indirection, its
/// slot, to find the current position of its value.
///
/// See [crate documentation](index.html) for more details.
#[derive(Clone)]
pub struct DenseSlotMap<T> {
    // Key index -> position in `values` (or next free slot).
    slots: DynamicBuffer<Slot>,
    // Position in `values` -> key index.
    slot_finder: DynamicBuffer<u32>,
    values: DynamicBuffer<T>,
    free_head: Option<u32>,
    // Only meaningful while `free_head` is `Some`.
    free_tail: u32,
}

impl<T> DenseSlotMap<T> {
    /// Construct a new, empty `DenseSlotMap`.
    ///
    /// The slot map will not allocate until values are inserted.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm: DenseSlotMap<i32> = DenseSlotMap::new();
    /// ```
    pub fn new() -> Self {
        DenseSlotMap {
            slots: DynamicBuffer::new(),
            slot_finder: DynamicBuffer::new(),
            values: DynamicBuffer::new(),
            free_head: None,
            free_tail: 0,
        }
    }

    /// Creates an empty `DenseSlotMap` with the given capacity.
    ///
    /// The slot map will not reallocate until it holds at least `capacity`
    /// elements. Fails with [`Error::AllocationFailure`] if the memory cannot
    /// be obtained.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let sm: DenseSlotMap<f64> = DenseSlotMap::with_capacity(10).unwrap();
    /// assert_eq!(sm.capacity(), 10);
    /// ```
    pub fn with_capacity(capacity: usize) -> Result<DenseSlotMap<T>> {
        Ok(DenseSlotMap {
            slots: DynamicBuffer::with_capacity(capacity)?,
            slot_finder: DynamicBuffer::with_capacity(capacity)?,
            values: DynamicBuffer::with_capacity(capacity)?,
            free_head: None,
            free_tail: 0,
        })
    }

    /// Returns the number of elements in the slot map.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::with_capacity(10).unwrap();
    /// sm.insert("len() counts actual elements, not capacity").unwrap();
    /// let key = sm.insert("removed elements don't count either").unwrap();
    /// sm.remove(key).unwrap();
    /// assert_eq!(sm.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns if the slot map is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the number of elements the `DenseSlotMap` can hold without
    /// reallocating.
    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    /// Reserves capacity for at least `additional` more elements to be
    /// inserted in the `DenseSlotMap`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// sm.insert("foo").unwrap();
    /// sm.reserve(32).unwrap();
    /// assert!(sm.capacity() >= 33);
    /// ```
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.values.reserve(additional)?;
        self.slot_finder.reserve(additional)?;
        let needed = self
            .len()
            .saturating_add(additional)
            .saturating_sub(self.slots.len());
        self.slots.reserve(needed)
    }

    /// Returns `true` if the slot map contains `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// let key = sm.insert(42).unwrap();
    /// assert_eq!(sm.contains_key(key), true);
    /// sm.remove(key).unwrap();
    /// assert_eq!(sm.contains_key(key), false);
    /// ```
    pub fn contains_key(&self, key: Key<T>) -> bool {
        self.value_idx(key).is_ok()
    }

    // Translates an untrusted key into a position in `values`.
    fn value_idx(&self, key: Key<T>) -> Result<usize> {
        self.slots
            .get(key.idx as usize)?
            .value_idx(key.generation)
            .map(|idx| idx as usize)
            .ok_or(Error::StaleKey)
    }

    /// Inserts a value into the slot map. Returns a unique [`Key`] that can
    /// be used to access this value.
    ///
    /// A slot freed by an earlier removal is reused if there is one, with a
    /// generation newer than any key previously handed out for it.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationFailure`] if the storage could not grow and
    /// [`Error::CapacityOverflow`] if the map already uses every addressable
    /// slot. The map is unchanged in both cases.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// let key = sm.insert(42).unwrap();
    /// assert_eq!(sm[key], 42);
    /// ```
    pub fn insert(&mut self, value: T) -> Result<Key<T>> {
        self.insert_with_key(|_| value)
    }

    /// Inserts a value given by `f` into the slot map. The `Key` where the
    /// value will be stored is passed into `f`. This is useful to store values
    /// that contain their own key.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// let key = sm.insert_with_key(|k| (k.index(), 20)).unwrap();
    /// assert_eq!(sm[key], (key.index(), 20));
    /// ```
    pub fn insert_with_key<F>(&mut self, f: F) -> Result<Key<T>>
    where
        F: FnOnce(Key<T>) -> T,
    {
        let (idx, generation) = match self.free_head {
            Some(head) => (head, self.slots.get(head as usize)?.generation),
            None => {
                if self.slots.len() >= MAX_SLOTS {
                    return Err(Error::CapacityOverflow { max: MAX_SLOTS });
                }
                self.slots.reserve(1)?;
                (self.slots.len() as u32, 1)
            }
        };

        // Grow up front so nothing below can fail halfway through.
        self.values.reserve(1)?;
        self.slot_finder.reserve(1)?;

        let key = Key::new(idx, generation);
        let value_idx = self.values.len() as u32;

        // Push value before adjusting slots/freelist in case f panics.
        self.values.push(f(key))?;
        self.slot_finder.push(idx)?;

        match self.free_head {
            Some(head) => {
                let slot = self.slots.get_mut(head as usize)?;
                let next_free = slot.next_free();
                slot.state = SlotState::Occupied { value_idx };
                self.free_head = if head == self.free_tail {
                    None
                } else {
                    next_free
                };
            }
            None => {
                self.slots.push(Slot::occupied(value_idx))?;
            }
        }

        Ok(key)
    }

    // Marks an occupied slot as free and puts it at the head of the freelist.
    // Returns the position its value had in `values`.
    fn free_slot(&mut self, slot_idx: u32) -> Result<usize> {
        let next_free = self.free_head.unwrap_or(slot_idx);
        let slot = self.slots.get_mut(slot_idx as usize)?;
        let value_idx = match slot.state {
            SlotState::Occupied { value_idx } => value_idx,
            SlotState::Vacant { .. } => return Err(Error::StaleKey),
        };

        slot.generation = slot.generation.wrapping_add(1);
        slot.state = SlotState::Vacant { next_free };

        if self.free_head.is_none() {
            self.free_tail = slot_idx;
        }
        self.free_head = Some(slot_idx);

        Ok(value_idx as usize)
    }

    // Removes the value of an occupied slot and frees the slot.
    fn remove_from_slot(&mut self, slot_idx: u32) -> Result<T> {
        let value_idx = self.free_slot(slot_idx)?;

        // Remove values/slot_finder entries by swapping to end.
        let value = self.values.swap_remove(value_idx)?;
        self.slot_finder.swap_remove(value_idx)?;

        // Did something take our place? Update its slot to the new position.
        if let Ok(&moved) = self.slot_finder.get(value_idx) {
            self.slots.get_mut(moved as usize)?.state = SlotState::Occupied {
                value_idx: value_idx as u32,
            };
        }

        Ok(value)
    }

    /// Removes a key from the slot map, returning the value at the key if the
    /// key was not previously removed.
    ///
    /// # Errors
    ///
    /// [`Error::StaleKey`] if the value was already removed and
    /// [`Error::IndexOutOfRange`] if the key does not belong to this map. The
    /// map is not modified in either case.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// let key = sm.insert(42).unwrap();
    /// assert_eq!(sm.remove(key), Ok(42));
    /// assert_eq!(sm.remove(key), Err(Error::StaleKey));
    /// ```
    pub fn remove(&mut self, key: Key<T>) -> Result<T> {
        self.value_idx(key)?;
        self.remove_from_slot(key.idx)
    }

    /// Retains only the elements specified by the predicate.
    ///
    /// In other words, remove all key-value pairs (k, v) such that
    /// `f(k, &mut v)` returns false. This method operates in place and
    /// invalidates any removed keys.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    ///
    /// let k3 = sm.insert(2).unwrap();
    /// let k1 = sm.insert(0).unwrap();
    /// let k2 = sm.insert(1).unwrap();
    ///
    /// sm.retain(|key, val| key == k1 || *val == 1);
    ///
    /// assert!(sm.contains_key(k1));
    /// assert!(sm.contains_key(k2));
    /// assert!(!sm.contains_key(k3));
    ///
    /// assert_eq!(2, sm.len());
    /// ```
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(Key<T>, &mut T) -> bool,
    {
        let mut i = 0;
        while i < self.values.len() {
            let slot_idx = self.slot_finder[i];
            let key = key_for(self.slots.as_slice(), slot_idx);

            if f(key, &mut self.values[i]) {
                i += 1;
            } else {
                // Do not advance: index i now holds what used to be the last
                // element.
                let removed = self.remove_from_slot(slot_idx);
                debug_assert!(removed.is_ok());
            }
        }
    }

    /// Clears the slot map. Keeps the allocated memory for reuse.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// for i in 0..10 {
    ///     sm.insert(i).unwrap();
    /// }
    /// assert_eq!(sm.len(), 10);
    /// sm.clear();
    /// assert_eq!(sm.len(), 0);
    /// ```
    pub fn clear(&mut self) {
        self.drain();
    }

    /// Clears the slot map, returning all key-value pairs as an iterator. Keeps
    /// the allocated memory for reuse.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// let k = sm.insert(0).unwrap();
    /// let v: Vec<_> = sm.drain().collect();
    /// assert_eq!(sm.len(), 0);
    /// assert_eq!(v, vec![(k, 0)]);
    /// ```
    pub fn drain(&mut self) -> Drain<T> {
        Drain { sm: self }
    }

    /// Returns a reference to the value corresponding to the key, or `None`
    /// if the key is stale or was never valid for this map.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// let key = sm.insert("bar").unwrap();
    /// assert_eq!(sm.get(key), Some(&"bar"));
    /// sm.remove(key).unwrap();
    /// assert_eq!(sm.get(key), None);
    /// ```
    pub fn get(&self, key: Key<T>) -> Option<&T> {
        self.try_get(key).ok()
    }

    /// Like [`get`](DenseSlotMap::get), but says why the lookup failed.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// let key = sm.insert("bar").unwrap();
    /// sm.remove(key).unwrap();
    /// assert_eq!(sm.try_get(key), Err(Error::StaleKey));
    /// assert!(matches!(sm.try_get(Key::null()), Err(Error::IndexOutOfRange { .. })));
    /// ```
    pub fn try_get(&self, key: Key<T>) -> Result<&T> {
        let idx = self.value_idx(key)?;
        self.values.get(idx)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// let key = sm.insert(3.5).unwrap();
    /// if let Some(x) = sm.get_mut(key) {
    ///     *x += 3.0;
    /// }
    /// assert_eq!(sm[key], 6.5);
    /// ```
    pub fn get_mut(&mut self, key: Key<T>) -> Option<&mut T> {
        self.try_get_mut(key).ok()
    }

    /// Like [`get_mut`](DenseSlotMap::get_mut), but says why the lookup
    /// failed.
    pub fn try_get_mut(&mut self, key: Key<T>) -> Result<&mut T> {
        let idx = self.value_idx(key)?;
        self.values.get_mut(idx)
    }

    /// An iterator visiting all key-value pairs in arbitrary order. The
    /// iterator element type is `(Key<T>, &'a T)`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// let k0 = sm.insert(0).unwrap();
    /// let k1 = sm.insert(1).unwrap();
    /// let k2 = sm.insert(2).unwrap();
    ///
    /// let mut it = sm.iter();
    /// assert_eq!(it.next(), Some((k0, &0)));
    /// assert_eq!(it.len(), 2);
    /// assert_eq!(it.next(), Some((k1, &1)));
    /// assert_eq!(it.next(), Some((k2, &2)));
    /// assert_eq!(it.next(), None);
    /// ```
    pub fn iter(&self) -> Iter<T> {
        Iter {
            slots: self.slots.as_slice(),
            slot_finder: self.slot_finder.iter(),
            values: self.values.iter(),
        }
    }

    /// An iterator visiting all key-value pairs in arbitrary order, with
    /// mutable references to the values. The iterator element type is
    /// `(Key<T>, &'a mut T)`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// let k0 = sm.insert(10).unwrap();
    /// let k1 = sm.insert(20).unwrap();
    /// let k2 = sm.insert(30).unwrap();
    ///
    /// for (k, v) in sm.iter_mut() {
    ///     if k != k1 {
    ///         *v *= -1;
    ///     }
    /// }
    ///
    /// assert_eq!(sm.values().collect::<Vec<_>>(), vec![&-10, &20, &-30]);
    /// ```
    pub fn iter_mut(&mut self) -> IterMut<T> {
        IterMut {
            slots: self.slots.as_slice(),
            slot_finder: self.slot_finder.iter(),
            values: self.values.iter_mut(),
        }
    }

    /// An iterator visiting all keys in arbitrary order.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// let k0 = sm.insert(10).unwrap();
    /// let k1 = sm.insert(20).unwrap();
    /// let k2 = sm.insert(30).unwrap();
    /// let v: Vec<_> = sm.keys().collect();
    /// assert_eq!(v, vec![k0, k1, k2]);
    /// ```
    pub fn keys(&self) -> Keys<T> {
        Keys {
            slots: self.slots.as_slice(),
            slot_finder: self.slot_finder.iter(),
            value_type: PhantomData,
        }
    }

    /// An iterator visiting all values in arbitrary order. This is a plain
    /// walk over the dense value storage.
    pub fn values(&self) -> Values<T> {
        Values {
            inner: self.values.iter(),
        }
    }

    /// An iterator visiting all values mutably in arbitrary order.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// sm.insert(10).unwrap();
    /// sm.insert(20).unwrap();
    /// sm.insert(30).unwrap();
    /// sm.values_mut().for_each(|n| { *n *= 3 });
    /// let v: Vec<_> = sm.into_iter().map(|(_k, v)| v).collect();
    /// assert_eq!(v, vec![30, 60, 90]);
    /// ```
    pub fn values_mut(&mut self) -> ValuesMut<T> {
        ValuesMut {
            inner: self.values.iter_mut(),
        }
    }

    /// An iterator over the slot indices on the freelist, from the one the
    /// next insertion reuses to the one reused last.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut sm = DenseSlotMap::new();
    /// let keys: Vec<_> = (0..4).map(|i| sm.insert(i).unwrap()).collect();
    /// sm.remove(keys[1]).unwrap();
    /// sm.remove(keys[3]).unwrap();
    /// assert_eq!(sm.free_slots().collect::<Vec<_>>(), vec![3, 1]);
    ///
    /// let reused = sm.insert(9).unwrap();
    /// assert_eq!(reused.index(), 3);
    /// assert_eq!(sm.free_slots().collect::<Vec<_>>(), vec![1]);
    /// ```
    pub fn free_slots(&self) -> FreeSlots {
        FreeSlots {
            slots: self.slots.as_slice(),
            next: self.free_head,
            tail: self.free_tail,
            remaining: self.slots.len() - self.len(),
        }
    }
}

// Rebuilds the key of an occupied slot.
#[inline(always)]
fn key_for<T>(slots: &[Slot], slot_idx: u32) -> Key<T> {
    Key::new(slot_idx, slots[slot_idx as usize].generation)
}

impl<T> Default for DenseSlotMap<T> {
    fn default() -> Self {
        DenseSlotMap::new()
    }
}

impl<T> Index<Key<T>> for DenseSlotMap<T> {
    type Output = T;

    fn index(&self, key: Key<T>) -> &T {
        match self.get(key) {
            Some(r) => r,
            None => panic!("invalid DenseSlotMap key used"),
        }
    }
}

impl<T> IndexMut<Key<T>> for DenseSlotMap<T> {
    fn index_mut(&mut self, key: Key<T>) -> &mut T {
        match self.get_mut(key) {
            Some(r) => r,
            None => panic!("invalid DenseSlotMap key used"),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DenseSlotMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// Iterators.
/// A draining iterator for `DenseSlotMap`.
#[derive(Debug)]
pub struct Drain<'a, T: 'a> {
    sm: &'a mut DenseSlotMap<T>,
}

/// An iterator that moves key-value pairs out of a `DenseSlotMap`.
#[derive(Debug)]
pub struct IntoIter<T> {
    slots: DynamicBuffer<Slot>,
    slot_finder: buffer::IntoIter<u32>,
    values: buffer::IntoIter<T>,
}

/// An iterator over the key-value pairs in a `DenseSlotMap`.
#[derive(Debug)]
pub struct Iter<'a, T: 'a> {
    slots: &'a [Slot],
    slot_finder: slice::Iter<'a, u32>,
    values: slice::Iter<'a, T>,
}

/// A mutable iterator over the key-value pairs in a `DenseSlotMap`.
#[derive(Debug)]
pub struct IterMut<'a, T: 'a> {
    slots: &'a [Slot],
    slot_finder: slice::Iter<'a, u32>,
    values: slice::IterMut<'a, T>,
}

/// An iterator over the keys in a `DenseSlotMap`.
#[derive(Debug)]
pub struct Keys<'a, T: 'a> {
    slots: &'a [Slot],
    slot_finder: slice::Iter<'a, u32>,
    value_type: PhantomData<fn() -> T>,
}

/// An iterator over the values in a `DenseSlotMap`.
#[derive(Debug)]
pub struct Values<'a, T: 'a> {
    inner: slice::Iter<'a, T>,
}

/// A mutable iterator over the values in a `DenseSlotMap`.
#[derive(Debug)]
pub struct ValuesMut<'a, T: 'a> {
    inner: slice::IterMut<'a, T>,
}

/// An iterator over the free slot indices of a `DenseSlotMap`, head first.
#[derive(Debug)]
pub struct FreeSlots<'a> {
    slots: &'a [Slot],
    next: Option<u32>,
    tail: u32,
    remaining: usize,
}

impl<'a, T> Iterator for Drain<'a, T> {
    type Item = (Key<T>, T);

    fn next(&mut self) -> Option<(Key<T>, T)> {
        // We make no iteration order guarantees, so we just repeatedly pop.
        let slot_idx = self.sm.slot_finder.pop()?;
        let value = self.sm.values.pop()?;
        let key = key_for(self.sm.slots.as_slice(), slot_idx);

        // The value was last, so nothing needs to be moved into its place.
        let freed = self.sm.free_slot(slot_idx);
        debug_assert!(freed.is_ok());

        Some((key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.sm.len();
        (len, Some(len))
    }
}

impl<'a, T> Drop for Drain<'a, T> {
    fn drop(&mut self) {
        self.for_each(|_drop| {});
    }
}

impl<T> Iterator for IntoIter<T> {
    type Item = (Key<T>, T);

    fn next(&mut self) -> Option<(Key<T>, T)> {
        let slot_idx = self.slot_finder.next()?;
        let value = self.values.next()?;
        Some((key_for(self.slots.as_slice(), slot_idx), value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Key<T>, &'a T);

    fn next(&mut self) -> Option<(Key<T>, &'a T)> {
        let slot_idx = *self.slot_finder.next()?;
        let value = self.values.next()?;
        Some((key_for(self.slots, slot_idx), value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = (Key<T>, &'a mut T);

    fn next(&mut self) -> Option<(Key<T>, &'a mut T)> {
        let slot_idx = *self.slot_finder.next()?;
        let value = self.values.next()?;
        Some((key_for(self.slots, slot_idx), value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl<'a, T> Iterator for Keys<'a, T> {
    type Item = Key<T>;

    fn next(&mut self) -> Option<Key<T>> {
        let slot_idx = *self.slot_finder.next()?;
        Some(key_for(self.slots, slot_idx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slot_finder.size_hint()
    }
}

impl<'a, T> Iterator for Values<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, T> Iterator for ValuesMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<&'a mut T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> Iterator for FreeSlots<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.next?;

        self.remaining -= 1;
        self.next = if idx == self.tail {
            None
        } else {
            self.slots.get(idx as usize).and_then(Slot::next_free)
        };

        Some(idx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<'a, T> IntoIterator for &'a DenseSlotMap<T> {
    type Item = (Key<T>, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut DenseSlotMap<T> {
    type Item = (Key<T>, &'a mut T);
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T> IntoIterator for DenseSlotMap<T> {
    type Item = (Key<T>, T);
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            slots: self.slots,
            slot_finder: self.slot_finder.into_iter(),
            values: self.values.into_iter(),
        }
    }
}

impl<'a, T> FusedIterator for Iter<'a, T> {}
impl<'a, T> FusedIterator for IterMut<'a, T> {}
impl<'a, T> FusedIterator for Keys<'a, T> {}
impl<'a, T> FusedIterator for Values<'a, T> {}
impl<'a, T> FusedIterator for ValuesMut<'a, T> {}
impl<'a, T> FusedIterator for Drain<'a, T> {}
impl<'a> FusedIterator for FreeSlots<'a> {}
impl<T> FusedIterator for IntoIter<T> {}

impl<'a, T> ExactSizeIterator for Iter<'a, T> {}
impl<'a, T> ExactSizeIterator for IterMut<'a, T> {}
impl<'a, T> ExactSizeIterator for Keys<'a, T> {}
impl<'a, T> ExactSizeIterator for Values<'a, T> {}
impl<'a, T> ExactSizeIterator for ValuesMut<'a, T> {}
impl<'a, T> ExactSizeIterator for Drain<'a, T> {}
impl<T> ExactSizeIterator for IntoIter<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use fxhash::FxHashMap;
    use std::collections::BTreeSet;

    // Checks the dense layout and freelist against each other.
    fn invariants_hold<T>(sm: &DenseSlotMap<T>) -> bool {
        if sm.values.len() != sm.slot_finder.len() {
            return false;
        }

        for (i, &slot_idx) in sm.slot_finder.iter().enumerate() {
            match sm.slots.get(slot_idx as usize) {
                Ok(slot) if slot.state == (SlotState::Occupied { value_idx: i as u32 }) => {}
                _ => return false,
            }
        }

        let vacant: Vec<u32> = sm
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.next_free().is_some())
            .map(|(i, _)| i as u32)
            .collect();
        if vacant.len() + sm.len() != sm.slots.len() {
            return false;
        }

        let free: Vec<u32> = sm.free_slots().collect();
        let unique: BTreeSet<u32> = free.iter().cloned().collect();
        unique.len() == free.len() && unique.into_iter().eq(vacant.into_iter())
    }

    #[test]
    fn sixteen_inserts_two_removals_two_reinserts() {
        let mut sm = DenseSlotMap::with_capacity(4).unwrap();
        let mut keys: Vec<_> = (0..16).map(|i| sm.insert(i).unwrap()).collect();

        let unique: BTreeSet<_> = keys.iter().cloned().collect();
        assert_eq!(unique.len(), 16);
        for (i, &k) in keys.iter().enumerate() {
            assert_eq!(sm.get(k), Some(&(i as i32)));
        }
        assert!(invariants_hold(&sm));

        let (old_5, old_12) = (keys[5], keys[12]);
        assert_eq!(sm.remove(old_5), Ok(5));
        assert_eq!(sm.remove(old_12), Ok(12));
        assert!(invariants_hold(&sm));
        assert_eq!(sm.free_slots().collect::<Vec<_>>(), vec![12, 5]);

        keys[5] = sm.insert(5).unwrap();
        keys[12] = sm.insert(12).unwrap();
        assert!(invariants_hold(&sm));
        assert_eq!(sm.free_slots().count(), 0);

        assert_eq!(sm.get(keys[5]), Some(&5));
        assert_eq!(sm.get(keys[12]), Some(&12));
        assert_eq!(sm.get(old_5), None);
        assert_eq!(sm.get(old_12), None);

        // Both slots were recycled with a bumped generation.
        assert_eq!((keys[5].index(), keys[5].generation()), (12, 2));
        assert_eq!((keys[12].index(), keys[12].generation()), (5, 2));

        for (i, &k) in keys.iter().enumerate() {
            assert_eq!(sm[k], i as i32);
        }
    }

    #[test]
    fn removed_key_stays_removed() {
        let mut sm = DenseSlotMap::new();
        let a = sm.insert("a").unwrap();
        let b = sm.insert("b").unwrap();

        assert_eq!(sm.remove(a), Ok("a"));
        assert_eq!(sm.get(a), None);
        assert_eq!(sm.remove(a), Err(Error::StaleKey));

        // The slot is reused, the old key does not come back to life.
        let c = sm.insert("c").unwrap();
        assert_eq!(c.index(), a.index());
        assert_eq!(sm.get(a), None);
        assert_eq!(sm.remove(a), Err(Error::StaleKey));
        assert_eq!(sm.get(c), Some(&"c"));
        assert_eq!(sm.get(b), Some(&"b"));
    }

    #[test]
    fn failed_remove_changes_nothing() {
        let mut sm = DenseSlotMap::new();
        let keys: Vec<_> = (0..8).map(|i| sm.insert(i).unwrap()).collect();
        sm.remove(keys[2]).unwrap();
        sm.remove(keys[6]).unwrap();

        let before: Vec<_> = sm.iter().map(|(k, &v)| (k, v)).collect();
        let free_before: Vec<_> = sm.free_slots().collect();

        assert_eq!(sm.remove(keys[2]), Err(Error::StaleKey));
        assert_eq!(
            sm.remove(Key::new(100, 1)),
            Err(Error::IndexOutOfRange { index: 100, len: 8 })
        );
        assert!(matches!(
            sm.remove(Key::null()),
            Err(Error::IndexOutOfRange { .. })
        ));

        let after: Vec<_> = sm.iter().map(|(k, &v)| (k, v)).collect();
        assert_eq!(before, after);
        assert_eq!(free_before, sm.free_slots().collect::<Vec<_>>());
        assert!(invariants_hold(&sm));
    }

    #[test]
    fn forged_and_foreign_keys_are_rejected() {
        let mut small = DenseSlotMap::new();
        let mut big = DenseSlotMap::new();
        small.insert(1u8).unwrap();
        let far = (0..10).map(|i| big.insert(i).unwrap()).last().unwrap();

        assert_eq!(
            small.try_get(far),
            Err(Error::IndexOutOfRange { index: 9, len: 1 })
        );
        assert_eq!(small.get(far), None);
        assert!(!small.contains_key(far));
        assert_eq!(small.get_mut(Key::new(0, 2)), None);
        assert_eq!(small.try_get(Key::new(0, 2)), Err(Error::StaleKey));
    }

    #[test]
    fn generation_bumps_once_per_removal() {
        let mut sm = DenseSlotMap::new();
        let mut key = sm.insert(0u32).unwrap();
        assert_eq!(key.generation(), 1);

        for round in 1..50u32 {
            assert_eq!(sm.remove(key), Ok(round - 1));
            assert_eq!(sm.slots[0].generation, round + 1);

            key = sm.insert(round).unwrap();
            assert_eq!(key.index(), 0);
            assert_eq!(key.generation(), round + 1);
        }
        assert_eq!(sm.slots.len(), 1);
    }

    #[test]
    fn freelist_is_lifo_with_fixed_tail() {
        let mut sm = DenseSlotMap::new();
        let keys: Vec<_> = (0..6).map(|i| sm.insert(i).unwrap()).collect();

        for &i in &[1, 4, 0] {
            sm.remove(keys[i]).unwrap();
            assert!(invariants_hold(&sm));
        }
        assert_eq!(sm.free_slots().collect::<Vec<_>>(), vec![0, 4, 1]);
        assert_eq!(sm.free_tail, 1);

        assert_eq!(sm.insert(10).unwrap().index(), 0);
        assert_eq!(sm.insert(11).unwrap().index(), 4);
        assert_eq!(sm.free_slots().collect::<Vec<_>>(), vec![1]);
        assert_eq!(sm.insert(12).unwrap().index(), 1);
        assert_eq!(sm.free_head, None);

        // Freelist exhausted, a brand new slot is created.
        let fresh = sm.insert(13).unwrap();
        assert_eq!((fresh.index(), fresh.generation()), (6, 1));
        assert!(invariants_hold(&sm));
    }

    #[test]
    fn growth_keeps_values_and_keys() {
        let mut sm = DenseSlotMap::with_capacity(2).unwrap();
        let keys: Vec<_> = (0..100u64).map(|i| sm.insert(i * i).unwrap()).collect();
        assert!(sm.capacity() >= 100);
        for (i, &k) in keys.iter().enumerate() {
            assert_eq!(sm[k], (i * i) as u64);
        }
    }

    #[test]
    fn retain_drain_and_clear() {
        let mut sm = DenseSlotMap::new();
        let keys: Vec<_> = (0..20).map(|i| sm.insert(i).unwrap()).collect();

        sm.retain(|_, v| *v % 3 == 0);
        assert!(invariants_hold(&sm));
        assert_eq!(sm.len(), 7);
        for (i, &k) in keys.iter().enumerate() {
            assert_eq!(sm.contains_key(k), i % 3 == 0);
        }

        let mut drained: Vec<_> = sm.drain().collect();
        drained.sort();
        assert_eq!(drained.len(), 7);
        assert_eq!(drained[1], (keys[3], 3));
        assert!(sm.is_empty());
        assert!(invariants_hold(&sm));
        assert_eq!(sm.free_slots().count(), 20);

        let k = sm.insert(99).unwrap();
        sm.insert(100).unwrap();
        sm.clear();
        assert!(sm.is_empty());
        assert!(!sm.contains_key(k));
        assert!(invariants_hold(&sm));
    }

    #[test]
    fn partial_drain_still_empties() {
        let mut sm = DenseSlotMap::new();
        for i in 0..5 {
            sm.insert(i).unwrap();
        }
        {
            let mut drain = sm.drain();
            assert_eq!(drain.len(), 5);
            drain.next();
        }
        assert!(sm.is_empty());
        assert!(invariants_hold(&sm));
    }

    #[test]
    fn iteration_follows_dense_order() {
        let mut sm = DenseSlotMap::new();
        let keys: Vec<_> = (0..4).map(|i| sm.insert(i).unwrap()).collect();
        sm.remove(keys[0]).unwrap();

        // The last value was swapped into the hole.
        assert_eq!(sm.values().cloned().collect::<Vec<_>>(), vec![3, 1, 2]);
        assert_eq!(
            sm.keys().collect::<Vec<_>>(),
            vec![keys[3], keys[1], keys[2]]
        );

        for (k, v) in &mut sm {
            *v += k.index() as i32;
        }
        let owned: Vec<_> = sm.into_iter().collect();
        assert_eq!(owned, vec![(keys[3], 6), (keys[1], 2), (keys[2], 4)]);
    }

    #[test]
    fn self_referencing_values() {
        let mut sm = DenseSlotMap::new();
        let a = sm.insert_with_key(|k| (k.index(), k.generation())).unwrap();
        sm.remove(a).unwrap();
        let b = sm.insert_with_key(|k| (k.index(), k.generation())).unwrap();
        assert_eq!(sm[b], (0, 2));
    }

    #[test]
    fn debug_lists_entries() {
        let mut sm = DenseSlotMap::new();
        let k = sm.insert("x").unwrap();
        sm.insert("y").unwrap();
        sm.remove(k).unwrap();
        assert_eq!(format!("{:?}", sm), r#"{1v1: "y"}"#);
    }

    #[test]
    #[should_panic(expected = "invalid DenseSlotMap key used")]
    fn index_with_stale_key_panics() {
        let mut sm = DenseSlotMap::new();
        let k = sm.insert(1).unwrap();
        sm.remove(k).unwrap();
        let _ = sm[k];
    }

    #[test]
    fn check_drops() {
        let drops = std::cell::RefCell::new(0usize);
        #[derive(Clone)]
        struct CountDrop<'a>(&'a std::cell::RefCell<usize>);
        impl<'a> Drop for CountDrop<'a> {
            fn drop(&mut self) {
                *self.0.borrow_mut() += 1;
            }
        }

        {
            let mut clone = {
                // Insert 1000 items.
                let mut sm = DenseSlotMap::new();
                let mut sm_keys = Vec::new();
                for _ in 0..1000 {
                    sm_keys.push(sm.insert(CountDrop(&drops)).unwrap());
                }

                // Remove even keys.
                for i in (0..1000).filter(|i| i % 2 == 0) {
                    let _ = sm.remove(sm_keys[i]);
                }

                // Should only have dropped 500 so far.
                assert_eq!(*drops.borrow(), 500);

                // Let's clone ourselves and then die.
                sm.clone()
            };

            // Now all original items should have been dropped exactly once.
            assert_eq!(*drops.borrow(), 1000);

            // Re-use some empty slots.
            for _ in 0..250 {
                clone.insert(CountDrop(&drops)).unwrap();
            }
        }

        // 1000 + 750 drops in total should have happened.
        assert_eq!(*drops.borrow(), 1750);
    }

    quickcheck! {
        fn qc_slotmap_equiv_hashmap(operations: Vec<(u8, u32)>) -> bool {
            let mut hm = FxHashMap::default();
            let mut hm_keys = Vec::new();
            let mut unique_key = 0u32;
            let mut sm = DenseSlotMap::new();
            let mut sm_keys = Vec::new();

            for (op, val) in operations {
                match op % 4 {
                    // Insert.
                    0 => {
                        hm.insert(unique_key, val);
                        hm_keys.push(unique_key);
                        unique_key += 1;

                        sm_keys.push(sm.insert(val).unwrap());
                    }

                    // Delete.
                    1 => {
                        if hm_keys.is_empty() { continue; }

                        let idx = val as usize % hm_keys.len();
                        if hm.remove(&hm_keys[idx]) != sm.remove(sm_keys[idx]).ok() {
                            return false;
                        }
                    }

                    // Access.
                    2 => {
                        if hm_keys.is_empty() { continue; }
                        let idx = val as usize % hm_keys.len();
                        let (hm_key, sm_key) = (&hm_keys[idx], sm_keys[idx]);

                        if hm.contains_key(hm_key) != sm.contains_key(sm_key) ||
                           hm.get(hm_key) != sm.get(sm_key) {
                            return false;
                        }
                    }

                    // Retain.
                    3 => {
                        if val % 8 != 0 { continue; }
                        hm.retain(|_, v| *v % 2 == 0);
                        sm.retain(|_, v| *v % 2 == 0);
                    }

                    _ => unreachable!(),
                }

                if !invariants_hold(&sm) || hm.len() != sm.len() {
                    return false;
                }
            }

            let mut smv: Vec<_> = sm.values().collect();
            let mut hmv: Vec<_> = hm.values().collect();
            smv.sort();
            hmv.sort();
            smv == hmv
        }
    }
}
