//! Append-only handle tables for minting small integer handles.
//!
//! The adapter core hands out integer "handles" to the DAP client for
//! long-lived references it cannot otherwise name: stack frames, variable
//! containers, source containers. Handles from a pause that has since ended
//! must never resolve to an unrelated entry minted during a later pause, so
//! each table stamps every handle with a generation number that changes
//! whenever the table is reset.
//!
//! # Example
//!
//! ```rust
//! use js_dap_handles::HandleTable;
//!
//! let mut frames = HandleTable::new();
//! let h = frames.alloc("frame#0");
//! assert_eq!(frames.get(h), Some(&"frame#0"));
//!
//! frames.reset();
//! assert_eq!(frames.get(h), None, "handles from a prior generation never resolve");
//! ```

use std::collections::HashMap;
use std::hash::Hash;

const INDEX_BITS: u32 = 32;
const INDEX_MASK: i64 = 0xFFFF_FFFF;

fn encode(generation: u32, index: usize) -> i64 {
    ((generation as i64) << INDEX_BITS) | (index as i64 + 1)
}

fn decode(handle: i64) -> Option<(u32, usize)> {
    if handle <= 0 {
        return None;
    }
    let generation = (handle >> INDEX_BITS) as u32;
    let index = (handle & INDEX_MASK) - 1;
    if index < 0 { None } else { Some((generation, index as usize)) }
}

/// An append-only registry that mints a fresh, generation-stamped handle for
/// every value pushed into it.
#[derive(Debug, Clone, Default)]
pub struct HandleTable<T> {
    items: Vec<T>,
    generation: u32,
}

impl<T> HandleTable<T> {
    /// Creates an empty table at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self { items: Vec::new(), generation: 0 }
    }

    /// Appends `value` and returns its freshly minted handle.
    pub fn alloc(&mut self, value: T) -> i64 {
        self.items.push(value);
        encode(self.generation, self.items.len() - 1)
    }

    /// Looks up a handle minted by this table's current generation.
    #[must_use]
    pub fn get(&self, handle: i64) -> Option<&T> {
        let (generation, index) = decode(handle)?;
        if generation != self.generation {
            return None;
        }
        self.items.get(index)
    }

    /// Mutable variant of [`Self::get`].
    pub fn get_mut(&mut self, handle: i64) -> Option<&mut T> {
        let (generation, index) = decode(handle)?;
        if generation != self.generation {
            return None;
        }
        self.items.get_mut(index)
    }

    /// Drains every entry and advances the generation counter, invalidating
    /// every handle minted before this call.
    pub fn reset(&mut self) {
        self.items.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// A [`HandleTable`] that also supports lookup by value, so the same value
/// always maps back to the same handle within a generation.
#[derive(Debug, Clone)]
pub struct ReverseHandleTable<T>
where
    T: Eq + Hash + Clone,
{
    table: HandleTable<T>,
    reverse: HashMap<T, i64>,
}

impl<T> ReverseHandleTable<T>
where
    T: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self { table: HandleTable::new(), reverse: HashMap::new() }
    }

    /// Returns the existing handle for `value` if one was already minted this
    /// generation, otherwise allocates and records a new one.
    pub fn get_or_alloc(&mut self, value: T) -> i64 {
        if let Some(&handle) = self.reverse.get(&value) {
            return handle;
        }
        let handle = self.table.alloc(value.clone());
        self.reverse.insert(value, handle);
        handle
    }

    #[must_use]
    pub fn lookup(&self, value: &T) -> Option<i64> {
        self.reverse.get(value).copied()
    }

    #[must_use]
    pub fn get(&self, handle: i64) -> Option<&T> {
        self.table.get(handle)
    }

    pub fn reset(&mut self) {
        self.table.reset();
        self.reverse.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<T> Default for ReverseHandleTable<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn alloc_returns_distinct_handles() {
        let mut table = HandleTable::new();
        let a = table.alloc("a");
        let b = table.alloc("b");
        assert_ne!(a, b);
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.get(b), Some(&"b"));
    }

    #[test]
    fn reset_invalidates_prior_handles_even_if_index_reused() {
        let mut table = HandleTable::new();
        let stale = table.alloc("first");
        table.reset();
        let fresh = table.alloc("second");

        // Same index slot (0), different generation: must not alias.
        assert_eq!(table.get(stale), None);
        assert_eq!(table.get(fresh), Some(&"second"));
    }

    #[test]
    fn unknown_or_zero_handles_resolve_to_none() {
        let table: HandleTable<&str> = HandleTable::new();
        assert_eq!(table.get(0), None);
        assert_eq!(table.get(-1), None);
        assert_eq!(table.get(12345), None);
    }

    #[test]
    fn reverse_table_reuses_handle_for_equal_value() {
        let mut table = ReverseHandleTable::new();
        let h1 = table.get_or_alloc("objectId-1".to_string());
        let h2 = table.get_or_alloc("objectId-1".to_string());
        assert_eq!(h1, h2);
        assert_eq!(table.lookup(&"objectId-1".to_string()), Some(h1));
    }

    #[test]
    fn reverse_table_reset_clears_both_directions() {
        let mut table = ReverseHandleTable::new();
        let h = table.get_or_alloc("x".to_string());
        table.reset();
        assert_eq!(table.get(h), None);
        assert_eq!(table.lookup(&"x".to_string()), None);
    }

    proptest! {
        #[test]
        fn every_alloc_roundtrips_until_reset(values in proptest::collection::vec(any::<i32>(), 0..64)) {
            let mut table = HandleTable::new();
            let handles: Vec<i64> = values.iter().map(|v| table.alloc(*v)).collect();
            for (value, handle) in values.iter().zip(handles.iter()) {
                prop_assert_eq!(table.get(*handle), Some(value));
            }
        }
    }
}
