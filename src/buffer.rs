//! Contains the growable buffer every slot map array is stored in.

use std::iter::FusedIterator;
use std::ops::{Index, IndexMut};
use std::slice;
use std::vec;

use crate::error::{Error, Result};

/// Contiguous, growable storage with an explicit growth policy.
///
/// This is a thin layer over [`Vec`] that owns the capacity decisions:
/// capacity only ever doubles (starting from 1 when empty) until it fits the
/// new length, and every allocation goes through the fallible allocation API
/// so an out-of-memory condition comes back as
/// [`Error::AllocationFailure`] instead of aborting.
///
/// References handed out by [`get`](DynamicBuffer::get) and
/// [`push`](DynamicBuffer::push) borrow the buffer, so they cannot be held
/// across a push that might reallocate.
///
/// # Examples
///
/// ```
/// # use denseslot::*;
/// let mut buf = DynamicBuffer::with_capacity(2).unwrap();
/// buf.push('a').unwrap();
/// buf.push('b').unwrap();
/// buf.push('c').unwrap();
/// assert_eq!(buf.capacity(), 4);
/// assert_eq!(buf.swap_remove(0), Ok('a'));
/// assert_eq!(buf.as_slice(), &['c', 'b']);
/// ```
#[derive(Debug, Clone)]
pub struct DynamicBuffer<T> {
    elements: Vec<T>,
}

impl<T> DynamicBuffer<T> {
    /// Creates an empty buffer. It will not allocate until the first push.
    pub fn new() -> Self {
        DynamicBuffer {
            elements: Vec::new(),
        }
    }

    /// Creates an empty buffer with room for `capacity` elements.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let buf: DynamicBuffer<u64> = DynamicBuffer::with_capacity(10).unwrap();
    /// assert_eq!(buf.capacity(), 10);
    ///
    /// let huge = DynamicBuffer::<u64>::with_capacity(usize::MAX);
    /// assert!(matches!(huge, Err(Error::AllocationFailure { .. })));
    /// ```
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut elements = Vec::new();
        elements
            .try_reserve_exact(capacity)
            .map_err(|_| Error::AllocationFailure {
                requested: capacity,
            })?;
        Ok(DynamicBuffer { elements })
    }

    /// Returns the number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns the number of elements the buffer can hold without
    /// reallocating.
    pub fn capacity(&self) -> usize {
        self.elements.capacity()
    }

    /// Makes sure `additional` more elements fit without another allocation,
    /// following the doubling policy.
    ///
    /// On failure the buffer is left exactly as it was.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let required = self
            .len()
            .checked_add(additional)
            .ok_or(Error::AllocationFailure {
                requested: usize::MAX,
            })?;
        self.grow_to(required)
    }

    // Doubles the capacity until `required` elements fit.
    fn grow_to(&mut self, required: usize) -> Result<()> {
        let capacity = self.capacity();
        if required <= capacity {
            return Ok(());
        }

        let mut new_capacity = capacity.max(1);
        while new_capacity < required {
            new_capacity = new_capacity
                .checked_mul(2)
                .ok_or(Error::AllocationFailure {
                    requested: required,
                })?;
        }

        self.elements
            .try_reserve_exact(new_capacity - self.len())
            .map_err(|_| Error::AllocationFailure {
                requested: new_capacity,
            })
    }

    /// Returns a reference to the element at `index`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut buf = DynamicBuffer::new();
    /// buf.push(5).unwrap();
    /// assert_eq!(buf.get(0), Ok(&5));
    /// assert_eq!(buf.get(1), Err(Error::IndexOutOfRange { index: 1, len: 1 }));
    /// ```
    pub fn get(&self, index: usize) -> Result<&T> {
        let len = self.len();
        self.elements
            .get(index)
            .ok_or(Error::IndexOutOfRange { index, len })
    }

    /// Returns a mutable reference to the element at `index`.
    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        let len = self.len();
        self.elements
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })
    }

    /// Appends `value`, growing the allocation first if it is full. Returns a
    /// reference to the freshly written element.
    ///
    /// If growing fails the value is dropped and the buffer is unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut buf = DynamicBuffer::new();
    /// *buf.push(1).unwrap() += 10;
    /// assert_eq!(buf[0], 11);
    /// ```
    pub fn push(&mut self, value: T) -> Result<&mut T> {
        let idx = self.len();
        self.grow_to(idx + 1)?;
        self.elements.push(value);
        self.get_mut(idx)
    }

    /// Removes the element at `index` and returns it, filling the hole with
    /// the last element. Does not preserve ordering, but is O(1).
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let mut buf = DynamicBuffer::new();
    /// for c in "abcd".chars() {
    ///     buf.push(c).unwrap();
    /// }
    /// assert_eq!(buf.swap_remove(1), Ok('b'));
    /// assert_eq!(buf.as_slice(), &['a', 'd', 'c']);
    /// assert_eq!(buf.swap_remove(2), Ok('c'));
    /// assert_eq!(buf.as_slice(), &['a', 'd']);
    /// ```
    pub fn swap_remove(&mut self, index: usize) -> Result<T> {
        let len = self.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        Ok(self.elements.swap_remove(index))
    }

    /// Removes the last element and returns it, or `None` if empty.
    pub fn pop(&mut self) -> Option<T> {
        self.elements.pop()
    }

    /// Drops every element. Keeps the allocation.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    /// The elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.elements
    }

    /// Iterates over the elements front to back.
    pub fn iter(&self) -> slice::Iter<T> {
        self.elements.iter()
    }

    /// Iterates mutably over the elements front to back.
    pub fn iter_mut(&mut self) -> slice::IterMut<T> {
        self.elements.iter_mut()
    }
}

impl<T> Default for DynamicBuffer<T> {
    fn default() -> Self {
        DynamicBuffer::new()
    }
}

impl<T> Index<usize> for DynamicBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Ok(r) => r,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<T> IndexMut<usize> for DynamicBuffer<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.get_mut(index) {
            Ok(r) => r,
            Err(e) => panic!("{}", e),
        }
    }
}

/// An iterator that moves elements out of a `DynamicBuffer`.
#[derive(Debug)]
pub struct IntoIter<T> {
    inner: vec::IntoIter<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    fn next_back(&mut self) -> Option<T> {
        self.inner.next_back()
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}
impl<T> FusedIterator for IntoIter<T> {}

impl<T> IntoIterator for DynamicBuffer<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.elements.into_iter(),
        }
    }
}

impl<'a, T> IntoIterator for &'a DynamicBuffer<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut DynamicBuffer<T> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
