use std::hash::Hash;

use ahash::AHashMap;

/// Indexed min-heap ordered by `|value|`.
///
/// Tracks the `capacity` keys with the largest-magnitude values seen so
/// far. Generic over the key so the same structure serves feature ids
/// (`u32`) and token pairs (`(String, String)`).
pub struct MagnitudeHeap<K> {
    capacity: usize,
    /// Keys in heap order; logical positions are 1-based (`pq[p - 1]`).
    pq: Vec<K>,
    /// key → (1-based position, value).
    qp: AHashMap<K, (u32, f32)>,
}

impl<K: Hash + Eq + Clone> MagnitudeHeap<K> {
    pub fn new(capacity: u32) -> Self {
        let capacity = capacity as usize;
        MagnitudeHeap {
            capacity,
            pq: Vec::with_capacity(capacity),
            qp: AHashMap::with_capacity(capacity + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.pq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pq.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pq.len() == self.capacity
    }

    pub fn contains(&self, key: &K) -> bool {
        self.qp.contains_key(key)
    }

    /// Value stored for `key`. Panics if absent.
    pub fn get(&self, key: &K) -> f32 {
        self.qp[key].1
    }

    /// Keys in heap order (root first).
    pub fn keys(&self) -> Vec<K> {
        self.pq.clone()
    }

    /// All `(key, value)` pairs, in no particular order.
    pub fn items(&self) -> Vec<(K, f32)> {
        self.qp.iter().map(|(k, &(_, v))| (k.clone(), v)).collect()
    }

    /// Reassigns the value of an existing key and restores heap order.
    /// Panics if `key` is absent.
    pub fn change_val(&mut self, key: &K, val: f32) {
        let entry = self.qp.get_mut(key).expect("key not in heap");
        entry.1 = val;
        let pos = entry.0;
        // One of the two is a no-op depending on the direction of change.
        self.swim(pos);
        self.sink(self.qp[key].0);
    }

    /// Inserts a new key, evicting the minimum-magnitude item when full.
    ///
    /// Returns the evicted `(key, value)` — possibly the pair just offered,
    /// when its magnitude does not beat the current minimum. Panics if the
    /// key is already present (use [`insert_or_change`](Self::insert_or_change)).
    pub fn insert(&mut self, key: K, val: f32) -> Option<(K, f32)> {
        assert!(!self.contains(&key), "key already in heap");
        let mut evicted = None;
        if self.pq.len() == self.capacity {
            if self.min_val().abs() > val.abs() {
                return Some((key, val));
            }
            evicted = Some(self.del_min());
        }
        self.pq.push(key.clone());
        let n = self.pq.len() as u32;
        self.qp.insert(key, (n, val));
        self.swim(n);
        evicted
    }

    /// Inserts a new key or updates an existing one. Eviction semantics as
    /// in [`insert`](Self::insert); updates never evict.
    pub fn insert_or_change(&mut self, key: K, val: f32) -> Option<(K, f32)> {
        if self.contains(&key) {
            self.change_val(&key, val);
            None
        } else {
            self.insert(key, val)
        }
    }

    /// Value of the minimum-magnitude item. Panics if empty.
    pub fn min_val(&self) -> f32 {
        assert!(!self.pq.is_empty(), "heap underflow");
        self.qp[&self.pq[0]].1
    }

    /// Minimum-magnitude `(key, value)`. Panics if empty.
    pub fn min(&self) -> (K, f32) {
        assert!(!self.pq.is_empty(), "heap underflow");
        let key = self.pq[0].clone();
        let val = self.qp[&key].1;
        (key, val)
    }

    /// Removes and returns the minimum-magnitude item. Panics if empty.
    pub fn del_min(&mut self) -> (K, f32) {
        assert!(!self.pq.is_empty(), "heap underflow");
        let n = self.pq.len() as u32;
        self.exch(1, n);
        let key = self.pq.pop().expect("heap underflow");
        let (_, val) = self.qp.remove(&key).expect("pq/qp desync");
        self.sink(1);
        (key, val)
    }

    #[inline]
    fn at(&self, pos: u32) -> &K {
        &self.pq[pos as usize - 1]
    }

    /// `true` when the item at `i` should sit below the item at `j`.
    #[inline]
    fn greater(&self, i: u32, j: u32) -> bool {
        self.qp[self.at(i)].1.abs() > self.qp[self.at(j)].1.abs()
    }

    fn exch(&mut self, i: u32, j: u32) {
        self.pq.swap(i as usize - 1, j as usize - 1);
        self.qp.get_mut(&self.pq[i as usize - 1]).expect("pq/qp desync").0 = i;
        self.qp.get_mut(&self.pq[j as usize - 1]).expect("pq/qp desync").0 = j;
    }

    fn swim(&mut self, mut k: u32) {
        while k > 1 && self.greater(k / 2, k) {
            self.exch(k, k / 2);
            k /= 2;
        }
    }

    fn sink(&mut self, mut k: u32) {
        let n = self.pq.len() as u32;
        while 2 * k <= n {
            let mut j = 2 * k;
            if j < n && self.greater(j, j + 1) {
                j += 1;
            }
            if !self.greater(k, j) {
                break;
            }
            self.exch(k, j);
            k = j;
        }
    }
}
