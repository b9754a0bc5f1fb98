//! Bounded Recent Windows
//!
//! Fixed-capacity buffers that keep only the most recent items. When an
//! insert overflows the capacity the oldest items are evicted.

use std::collections::VecDeque;

/// Fixed-capacity, drop-oldest buffer
///
/// The window does not decide which end is "newest"; callers pick the
/// insertion method that matches their orientation:
///
/// * newest-first windows use [`push_front_batch`](Self::push_front_batch) or
///   [`insert_batch_descending_by_key`](Self::insert_batch_descending_by_key)
///   and evict from the back.
/// * oldest-first windows use [`push_back`](Self::push_back) or
///   [`insert_ascending_by_key`](Self::insert_ascending_by_key) and evict from
///   the front.
#[derive(Debug, Clone)]
pub struct RecentWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
    evicted: u64,
}

impl<T> RecentWindow<T> {
    /// Create an empty window holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Append an item at the back, evicting from the front on overflow
    ///
    /// # Returns
    /// The number of items evicted
    pub fn push_back(&mut self, item: T) -> usize {
        self.items.push_back(item);
        self.evict_front()
    }

    /// Insert a batch at the front, keeping the batch order, evicting from
    /// the back on overflow
    ///
    /// # Returns
    /// The number of items evicted
    pub fn push_front_batch(&mut self, batch: Vec<T>) -> usize {
        for item in batch.into_iter().rev() {
            self.items.push_front(item);
        }
        self.evict_back()
    }

    /// Insert an item into a window kept in ascending key order
    ///
    /// The item goes after every item with an equal or smaller key. Overflow
    /// evicts from the front, so an item older than everything in a full
    /// window is dropped immediately.
    ///
    /// # Returns
    /// The number of items evicted
    pub fn insert_ascending_by_key<K, F>(&mut self, item: T, key: F) -> usize
    where
        K: Ord,
        F: Fn(&T) -> K,
    {
        let new_key = key(&item);
        let position = self
            .items
            .iter()
            .position(|existing| key(existing) > new_key)
            .unwrap_or(self.items.len());
        self.items.insert(position, item);
        self.evict_front()
    }

    /// Insert a batch sharing one key into a window kept in descending key
    /// order
    ///
    /// The batch goes before the first item with a smaller key and keeps its
    /// internal order. Overflow evicts from the back.
    ///
    /// # Returns
    /// The number of items evicted
    pub fn insert_batch_descending_by_key<K, F>(&mut self, batch: Vec<T>, key: F) -> usize
    where
        K: Ord,
        F: Fn(&T) -> K,
    {
        let Some(first) = batch.first() else {
            return 0;
        };
        let new_key = key(first);
        let position = self
            .items
            .iter()
            .position(|existing| key(existing) < new_key)
            .unwrap_or(self.items.len());

        for (offset, item) in batch.into_iter().enumerate() {
            self.items.insert(position + offset, item);
        }
        self.evict_back()
    }

    /// Keep only the items matching the predicate
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.items.retain(keep);
    }

    /// Remove every item
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of items evicted since creation
    pub fn evicted_count(&self) -> u64 {
        self.evicted
    }

    /// Fill level as a percentage of capacity
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 100.0;
        }
        (self.items.len() as f64 / self.capacity as f64) * 100.0
    }

    fn evict_front(&mut self) -> usize {
        let mut count = 0;
        while self.items.len() > self.capacity {
            self.items.pop_front();
            count += 1;
        }
        self.evicted += count as u64;
        count
    }

    fn evict_back(&mut self) -> usize {
        let overflow = self.items.len().saturating_sub(self.capacity);
        self.items.truncate(self.capacity);
        self.evicted += overflow as u64;
        overflow
    }
}

impl<T: Clone> RecentWindow<T> {
    /// Copy the items out, front to back
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T: PartialEq> RecentWindow<T> {
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }
}
