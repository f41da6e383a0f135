use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Key used to access stored values in a slot map.
///
/// A key is tagged with the value type of the map that produced it, so keys of
/// a `DenseSlotMap<A>` cannot be used with a `DenseSlotMap<B>`. Keys can only
/// be obtained from a map (or as the [`null`](Key::null) key), never built
/// from raw parts.
///
/// Do not use a key from one slot map in another map of the same type. The
/// behavior is safe but non-sensical: the key is checked like any other and
/// either refers to some unrelated value or is rejected. Keys implement `Ord`
/// so they can be used in e.g.
/// [`BTreeMap`](https://doc.rust-lang.org/std/collections/struct.BTreeMap.html)
/// but their order is arbitrary.
pub struct Key<T> {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
    // fn() -> T keeps Key Send + Sync + Copy no matter what T is.
    value_type: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// Creates a new key that is always invalid and distinct from any non-null
    /// key. A null key can only be created through this method, or default
    /// initialization of `Key`.
    ///
    /// A null key is always invalid, but an invalid key (that is, a key that
    /// has been removed from the slot map) does not become a null key.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let sm = DenseSlotMap::<i32>::new();
    /// let nk = Key::null();
    /// assert!(nk.is_null());
    /// assert_eq!(sm.get(nk), None);
    /// ```
    pub fn null() -> Self {
        Self::new(std::u32::MAX, 1)
    }

    /// Checks if a key is null. There is only a single null key, that is
    /// `a.is_null() && b.is_null()` implies `a == b`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use denseslot::*;
    /// let a: Key<i32> = Key::null();
    /// let b: Key<i32> = Key::default();
    /// assert_eq!(a, b);
    /// ```
    pub fn is_null(self) -> bool {
        self.idx == std::u32::MAX
    }

    /// Index of the slot this key points at.
    pub fn index(self) -> u32 {
        self.idx
    }

    /// Generation the slot had when this key was handed out.
    pub fn generation(self) -> u32 {
        self.generation
    }

    // Not public: users cannot create arbitrary keys.
    pub(crate) fn new(idx: u32, generation: u32) -> Self {
        Self {
            idx,
            generation,
            value_type: PhantomData,
        }
    }
}

// The std traits are implemented by hand so that they hold for every T, not
// only for the T that implement them too.
impl<T> Copy for Key<T> {}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Default for Key<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx && self.generation == other.generation
    }
}

impl<T> Eq for Key<T> {}

impl<T> PartialOrd for Key<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Key<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.idx, self.generation).cmp(&(other.idx, other.generation))
    }
}

impl<T> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.idx.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}v{}", self.idx, self.generation)
    }
}
