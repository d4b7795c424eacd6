use ahash::AHashMap;

/// Indexed min-heap ordered by an unsigned occurrence count.
///
/// Each entry carries an auxiliary float value (a learned weight) that has
/// no effect on heap order. Backs the SpaceSaving and Count-Min top-k
/// estimators, where membership is decided by frequency but the payload is
/// a weight.
pub struct CountHeap {
    capacity: usize,
    /// Keys in heap order; logical positions are 1-based (`pq[p - 1]`).
    pq: Vec<u32>,
    /// key → (1-based position, count, auxiliary value).
    qp: AHashMap<u32, (u32, u32, f32)>,
}

impl CountHeap {
    pub fn new(capacity: u32) -> Self {
        let capacity = capacity as usize;
        CountHeap {
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

    pub fn contains(&self, key: u32) -> bool {
        self.qp.contains_key(&key)
    }

    /// Auxiliary value for `key`. Panics if absent.
    pub fn get(&self, key: u32) -> f32 {
        self.qp[&key].2
    }

    /// Count for `key`. Panics if absent.
    pub fn count(&self, key: u32) -> u32 {
        self.qp[&key].1
    }

    /// All `(key, value)` pairs, in no particular order.
    pub fn items(&self) -> Vec<(u32, f32)> {
        self.qp.iter().map(|(&k, &(_, _, v))| (k, v)).collect()
    }

    /// Bumps the count of an existing key by one and restores heap order.
    /// Counts only grow, so sinking suffices. Panics if `key` is absent.
    pub fn increment_count(&mut self, key: u32) {
        let entry = self.qp.get_mut(&key).expect("key not in heap");
        entry.1 += 1;
        let pos = entry.0;
        self.sink(pos);
    }

    /// Reassigns count and value of an existing key and restores heap
    /// order. Panics if `key` is absent.
    pub fn change_val(&mut self, key: u32, count: u32, val: f32) {
        let entry = self.qp.get_mut(&key).expect("key not in heap");
        entry.1 = count;
        entry.2 = val;
        let pos = entry.0;
        self.swim(pos);
        self.sink(self.qp[&key].0);
    }

    /// Inserts a new key, evicting the minimum-count item when full.
    ///
    /// Returns the evicted `(key, count, value)` — possibly the triple just
    /// offered, when its count does not beat the current minimum. Panics if
    /// the key is already present.
    pub fn insert(&mut self, key: u32, count: u32, val: f32) -> Option<(u32, u32, f32)> {
        assert!(!self.contains(key), "key already in heap");
        let mut evicted = None;
        if self.pq.len() == self.capacity {
            if self.min_count() > count {
                return Some((key, count, val));
            }
            evicted = Some(self.del_min());
        }
        self.pq.push(key);
        let n = self.pq.len() as u32;
        self.qp.insert(key, (n, count, val));
        self.swim(n);
        evicted
    }

    /// Inserts a new key or updates an existing one.
    pub fn insert_or_change(&mut self, key: u32, count: u32, val: f32) -> Option<(u32, u32, f32)> {
        if self.contains(key) {
            self.change_val(key, count, val);
            None
        } else {
            self.insert(key, count, val)
        }
    }

    /// Smallest count in the heap. Panics if empty.
    pub fn min_count(&self) -> u32 {
        assert!(!self.pq.is_empty(), "heap underflow");
        self.qp[&self.pq[0]].1
    }

    /// Removes and returns the minimum-count `(key, count, value)`.
    /// Panics if empty.
    pub fn del_min(&mut self) -> (u32, u32, f32) {
        assert!(!self.pq.is_empty(), "heap underflow");
        let n = self.pq.len() as u32;
        self.exch(1, n);
        let key = self.pq.pop().expect("heap underflow");
        let (_, count, val) = self.qp.remove(&key).expect("pq/qp desync");
        self.sink(1);
        (key, count, val)
    }

    #[inline]
    fn greater(&self, i: u32, j: u32) -> bool {
        self.qp[&self.pq[i as usize - 1]].1 > self.qp[&self.pq[j as usize - 1]].1
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

#[cfg(test)]
mod tests {
    use super::*;

    fn check_consistency(heap: &CountHeap) {
        for (p, key) in heap.pq.iter().enumerate() {
            let pos = p as u32 + 1;
            assert_eq!(heap.qp[key].0, pos, "qp position desync for key {key}");
            if pos > 1 {
                let parent = heap.pq[(pos / 2) as usize - 1];
                assert!(
                    heap.qp[&parent].1 <= heap.qp[key].1,
                    "heap order violated at position {pos}"
                );
            }
        }
    }

    #[test]
    fn value_does_not_affect_order() {
        let mut heap = CountHeap::new(3);
        heap.insert(1, 10, 0.1);
        heap.insert(2, 5, 100.0);
        heap.insert(3, 7, -50.0);
        // Key 2 has the huge value but the smallest count.
        assert_eq!(heap.min_count(), 5);
        assert_eq!(heap.del_min().0, 2);
        check_consistency(&heap);
    }

    #[test]
    fn low_count_candidate_bounces_off_full_heap() {
        let mut heap = CountHeap::new(2);
        heap.insert(1, 10, 0.0);
        heap.insert(2, 20, 0.0);
        assert_eq!(heap.insert(3, 4, 1.5), Some((3, 4, 1.5)));
        assert!(!heap.contains(3));
    }

    #[test]
    fn eviction_prefers_lowest_count() {
        let mut heap = CountHeap::new(2);
        heap.insert(1, 3, 0.0);
        heap.insert(2, 8, 0.0);
        let evicted = heap.insert(3, 5, 0.0);
        assert_eq!(evicted, Some((1, 3, 0.0)));
        check_consistency(&heap);
    }

    #[test]
    fn increment_count_restores_order() {
        let mut heap = CountHeap::new(3);
        heap.insert(1, 1, 0.0);
        heap.insert(2, 2, 0.0);
        heap.insert(3, 3, 0.0);
        // Root (key 1) overtakes both siblings; it must sink.
        for _ in 0..5 {
            heap.increment_count(1);
        }
        assert_eq!(heap.min_count(), 2);
        assert_eq!(heap.count(1), 6);
        check_consistency(&heap);
    }

    #[test]
    #[should_panic(expected = "key already in heap")]
    fn duplicate_insert_panics() {
        let mut heap = CountHeap::new(4);
        heap.insert(1, 1, 0.0);
        heap.insert(1, 2, 0.0);
    }
}
