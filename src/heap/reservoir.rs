use ahash::AHashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Weighted reservoir sampler over keyed float values (A-Res scheme).
///
/// Each inserted item draws a rank `r = |value|^p · ln(U)` with
/// `U ~ Uniform(0,1)`; since `ln(U) ≤ 0`, heavier items are pushed toward
/// more negative ranks. The reservoir keeps the `capacity` items with the
/// *smallest* ranks, implemented as a max-heap on `r` whose root — the
/// item least likely to be retained — is evicted first
/// (Efraimidis & Spirakis, 2006).
///
/// When a retained item's value changes, its rank is rescaled by
/// `(|new| / |old|)^p`, which preserves the A-Res inclusion distribution
/// without redrawing `U`.
pub struct WeightedReservoir {
    capacity: usize,
    /// Keys in heap order; logical positions are 1-based (`pq[p - 1]`).
    pq: Vec<u32>,
    /// key → (1-based position, rank, value).
    qp: AHashMap<u32, (u32, f32, f32)>,
    rng: StdRng,
    pow: f32,
}

impl WeightedReservoir {
    /// The seed is mandatory: reservoir contents must be reproducible from
    /// the run configuration alone.
    pub fn new(capacity: u32, seed: u64, pow: f32) -> Self {
        let capacity = capacity as usize;
        WeightedReservoir {
            capacity,
            pq: Vec::with_capacity(capacity),
            qp: AHashMap::with_capacity(capacity + 1),
            rng: StdRng::seed_from_u64(seed),
            pow,
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

    /// Value stored for `key`. Panics if absent.
    pub fn get(&self, key: u32) -> f32 {
        self.qp[&key].2
    }

    /// All `(key, value)` pairs, in no particular order.
    pub fn items(&self) -> Vec<(u32, f32)> {
        self.qp.iter().map(|(&k, &(_, _, v))| (k, v)).collect()
    }

    /// Reassigns the value of a retained key, rescaling its rank.
    /// Panics if `key` is absent.
    pub fn change_val(&mut self, key: u32, val: f32) {
        let entry = self.qp.get_mut(&key).expect("key not in reservoir");
        let old_val = entry.2;
        if self.pow == 1.0 {
            entry.1 *= (val / old_val).abs();
        } else {
            entry.1 *= (val / old_val).abs().powf(self.pow);
        }
        entry.2 = val;
        let pos = entry.0;
        self.swim(pos);
        self.sink(self.qp[&key].0);
    }

    /// Offers a new key to the reservoir.
    ///
    /// Returns the rejected `(key, value)` when the reservoir is full —
    /// either the worst-ranked incumbent or the candidate itself. Panics if
    /// the key is already present.
    pub fn insert(&mut self, key: u32, val: f32) -> Option<(u32, f32)> {
        assert!(!self.contains(key), "key already in reservoir");
        let u: f64 = self.rng.gen();
        let r = val.abs().powf(self.pow) * u.ln() as f32;

        let mut evicted = None;
        if self.pq.len() == self.capacity {
            if r > self.max_rank() {
                return Some((key, val));
            }
            evicted = Some(self.del_max());
        }
        self.pq.push(key);
        let n = self.pq.len() as u32;
        self.qp.insert(key, (n, r, val));
        self.swim(n);
        evicted
    }

    /// Offers a new key or updates an existing one.
    pub fn insert_or_change(&mut self, key: u32, val: f32) -> Option<(u32, f32)> {
        if self.contains(key) {
            self.change_val(key, val);
            None
        } else {
            self.insert(key, val)
        }
    }

    /// Largest (worst) rank in the reservoir. Panics if empty.
    fn max_rank(&self) -> f32 {
        assert!(!self.pq.is_empty(), "reservoir underflow");
        self.qp[&self.pq[0]].1
    }

    /// Removes and returns the worst-ranked `(key, value)`. Panics if empty.
    fn del_max(&mut self) -> (u32, f32) {
        assert!(!self.pq.is_empty(), "reservoir underflow");
        let n = self.pq.len() as u32;
        self.exch(1, n);
        let key = self.pq.pop().expect("reservoir underflow");
        let (_, _, val) = self.qp.remove(&key).expect("pq/qp desync");
        self.sink(1);
        (key, val)
    }

    #[inline]
    fn rank_at(&self, i: u32) -> f32 {
        self.qp[&self.pq[i as usize - 1]].1
    }

    fn exch(&mut self, i: u32, j: u32) {
        self.pq.swap(i as usize - 1, j as usize - 1);
        self.qp.get_mut(&self.pq[i as usize - 1]).expect("pq/qp desync").0 = i;
        self.qp.get_mut(&self.pq[j as usize - 1]).expect("pq/qp desync").0 = j;
    }

    fn swim(&mut self, mut k: u32) {
        while k > 1 && self.rank_at(k) > self.rank_at(k / 2) {
            self.exch(k, k / 2);
            k /= 2;
        }
    }

    fn sink(&mut self, mut k: u32) {
        let n = self.pq.len() as u32;
        while 2 * k <= n {
            let mut j = 2 * k;
            if j < n && self.rank_at(j + 1) > self.rank_at(j) {
                j += 1;
            }
            if self.rank_at(j) <= self.rank_at(k) {
                break;
            }
            self.exch(k, j);
            k = j;
        }
    }
}
