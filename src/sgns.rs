//! Streaming skip-gram with negative sampling for online PMI estimation.
//!
//! Token pairs from a sliding context window are positives; pairs with one
//! side replaced by a unigram reservoir sample are negatives. The learned
//! log-odds of "real pair vs. product-of-unigrams pair" converges to the
//! pair's pointwise mutual information, so the top-k heap over pair weights
//! surfaces the strongest collocations.

use std::collections::VecDeque;

use ahash::AHashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::hash::pair_key;
use crate::heap::MagnitudeHeap;
use crate::logistic::scale_shrink;
use crate::math::logistic_grad;
use crate::sketch::CountSketch;

/// A directed token pair `(center, context)`.
pub type TokenPair = (String, String);

/// Configuration for [`StreamingSgns`].
#[derive(Debug, Clone, Serialize)]
pub struct SgnsConfig {
    /// Number of high-magnitude PMI pairs to track.
    pub k: u32,
    pub log2_width: u32,
    pub depth: u32,
    /// Negatives drawn per positive pair.
    pub neg_samples: u32,
    /// Context radius: token `i` pairs with `i+1 ..= i+window_size`.
    pub window_size: u32,
    /// Capacity of the unigram reservoir.
    pub reservoir_size: u32,
    pub seed: u64,
    pub lr_init: f32,
    pub l2_reg: f32,
}

impl Default for SgnsConfig {
    fn default() -> Self {
        SgnsConfig {
            k: 1024,
            log2_width: 12,
            depth: 1,
            neg_samples: 5,
            window_size: 5,
            reservoir_size: 4000,
            seed: 1,
            lr_init: 0.1,
            l2_reg: 1e-7,
        }
    }
}

struct TokenSlot {
    token: String,
    refs: u32,
}

/// Uniform reservoir sample of the unigram stream, with duplicate
/// consolidation: repeated tokens share one interned slot and a refcount,
/// so sampling a slot-uniform index weights each distinct token by its
/// reservoir multiplicity.
pub struct TokenReservoir {
    capacity: usize,
    /// Virtual stream length.
    seen: u64,
    /// Slot id per reservoir position.
    reservoir: Vec<u32>,
    slots: Vec<TokenSlot>,
    free: Vec<u32>,
    index: AHashMap<String, u32>,
    rng: StdRng,
}

impl TokenReservoir {
    pub fn new(capacity: u32, seed: u64) -> Self {
        let capacity = capacity as usize;
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(TokenSlot {
                token: String::new(),
                refs: 0,
            });
        }
        TokenReservoir {
            capacity,
            seen: 0,
            reservoir: Vec::with_capacity(capacity),
            slots,
            free: (0..capacity as u32).rev().collect(),
            index: AHashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn len(&self) -> usize {
        self.reservoir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservoir.is_empty()
    }

    /// Offers one stream token to the reservoir.
    pub fn update(&mut self, token: &str) {
        self.seen += 1;
        if self.seen <= self.capacity as u64 {
            let idx = self.intern(token);
            self.reservoir.push(idx);
            return;
        }

        let r = (self.rng.gen::<f64>() * self.seen as f64) as usize;
        if r >= self.capacity {
            return;
        }
        let displaced = self.reservoir[r];
        let slot = &mut self.slots[displaced as usize];
        slot.refs -= 1;
        if slot.refs == 0 {
            self.index.remove(&slot.token);
            self.free.push(displaced);
        }
        let idx = self.intern(token);
        self.reservoir[r] = idx;
    }

    /// Draws a token uniformly over reservoir positions, so each distinct
    /// token is weighted by its multiplicity. Panics on an empty reservoir.
    pub fn sample(&mut self) -> String {
        let r = (self.rng.gen::<f64>() * self.reservoir.len() as f64) as usize;
        self.slots[self.reservoir[r] as usize].token.clone()
    }

    fn intern(&mut self, token: &str) -> u32 {
        if let Some(&idx) = self.index.get(token) {
            self.slots[idx as usize].refs += 1;
            return idx;
        }
        let idx = self.free.pop().expect("reservoir slot available");
        let slot = &mut self.slots[idx as usize];
        slot.token.clear();
        slot.token.push_str(token);
        slot.refs = 1;
        self.index.insert(token.to_owned(), idx);
        idx
    }
}

/// Streaming SGNS trainer over a token stream.
///
/// Weights live in the same active-set arrangement as the classification
/// estimator: exact values for heap members, Count-Sketch residuals keyed
/// by `101·murmur3(center) + murmur3(context)` for the tail.
pub struct StreamingSgns {
    heap: MagnitudeHeap<TokenPair>,
    reservoir: TokenReservoir,
    sk: CountSketch,
    window: VecDeque<String>,
    window_size: usize,
    neg_samples: u32,
    /// Seed for the murmur pair keys.
    key_seed: u32,
    bias: f32,
    lr_init: f32,
    l2_reg: f32,
    scale: f32,
    t: u64,
    rng: StdRng,
}

impl StreamingSgns {
    pub fn new(cfg: &SgnsConfig) -> Result<Self> {
        if cfg.lr_init <= 0.0 {
            return Err(Error::InvalidLearningRate(cfg.lr_init));
        }
        Ok(StreamingSgns {
            heap: MagnitudeHeap::new(cfg.k),
            reservoir: TokenReservoir::new(cfg.reservoir_size, cfg.seed),
            sk: CountSketch::new(cfg.log2_width, cfg.depth, cfg.seed)?,
            window: VecDeque::with_capacity(cfg.window_size as usize + 1),
            window_size: cfg.window_size as usize,
            neg_samples: cfg.neg_samples,
            key_seed: cfg.seed as u32,
            bias: 0.0,
            lr_init: cfg.lr_init,
            l2_reg: cfg.l2_reg,
            scale: 1.0,
            t: 0,
            rng: StdRng::seed_from_u64(cfg.seed),
        })
    }

    /// Feeds one token: the reservoir always sees it; once the window is
    /// full, the oldest token pairs with every other window position.
    pub fn update(&mut self, token: &str) {
        if token.is_empty() {
            return;
        }

        self.reservoir.update(token);
        if self.window.len() == self.window_size + 1 {
            self.window.pop_front();
        }
        self.window.push_back(token.to_owned());
        if self.window.len() < self.window_size + 1 {
            return;
        }

        let center = self.window[0].clone();
        for i in 0..self.window_size {
            let context = self.window[i + 1].clone();
            self.update_pair(&center, &context);
        }
    }

    /// Drains the window at a sentence boundary, emitting the remaining
    /// in-flight pairs.
    ///
    /// When the window is full its front element is dropped undrained: a
    /// full window means `update` already emitted that element's pairs, so
    /// draining it again would double-count them.
    pub fn flush(&mut self) {
        if self.window.len() == self.window_size + 1 {
            self.window.pop_front();
        }

        while let Some(center) = self.window.front().cloned() {
            for i in 1..self.window.len() {
                let context = self.window[i].clone();
                self.update_pair(&center, &context);
            }
            self.window.pop_front();
        }
    }

    /// Current top-k `(pair, estimated PMI)` entries, sorted by descending
    /// magnitude.
    pub fn top_k(&mut self) -> Vec<(TokenPair, f32)> {
        let mut out = self.heap.items();
        for item in &mut out {
            item.1 *= self.scale;
        }
        out.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        out
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// One positive update plus `neg_samples` negatives, each replacing a
    /// uniformly chosen side of the pair with a reservoir sample.
    fn update_pair(&mut self, a: &str, b: &str) {
        self.update_signed(a, b, true);
        for _ in 0..self.neg_samples {
            if self.rng.gen::<f64>() < 0.5 {
                let neg = self.reservoir.sample();
                self.update_signed(a, &neg, false);
            } else {
                let neg = self.reservoir.sample();
                self.update_signed(&neg, b, false);
            }
        }
    }

    /// One logistic step on a single pair, with the active-set coupling
    /// between the heap and the pair sketch.
    fn update_signed(&mut self, a: &str, b: &str, real: bool) {
        let y = if real { 1.0 } else { -1.0 };
        let pair: TokenPair = (a.to_owned(), b.to_owned());
        let in_heap = self.heap.contains(&pair);

        let mut h = 0;
        let w = if in_heap {
            self.heap.get(&pair)
        } else {
            h = pair_key(a, b, self.key_seed);
            self.sk.get(h)
        };

        let lr = self.lr_init / (1.0 + self.lr_init * self.l2_reg * self.t as f32);
        let z = w * self.scale + self.bias;
        let g = logistic_grad(y * z);
        self.scale *= scale_shrink(lr, self.l2_reg);
        let u = lr * y * g / self.scale;

        if in_heap {
            self.heap.change_val(&pair, w - u);
        } else if let Some((popped, popped_w)) = self.heap.insert(pair.clone(), w - u) {
            if popped == pair {
                // Rejected: the pair stays sketched; write this step's delta.
                self.sk.update(h, -u);
            } else {
                // Demoted member: future sketch reads return its parting
                // exact weight.
                let ph = pair_key(&popped.0, &popped.1, self.key_seed);
                let residual = self.sk.get(ph);
                self.sk.update(ph, popped_w - residual);
            }
        }

        self.bias -= lr * y * g;
        self.t += 1;
    }
}
