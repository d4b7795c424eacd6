//! Hash families backing the sketches.
//!
//! Two multi-row families over 32-bit keys, plus MurmurHash3 for string
//! keying. Each instance owns its seed tables, drawn once at construction
//! from a seeded [`StdRng`]; the same seed always reproduces the same
//! tables, so sketch contents are reproducible run to run.
//!
//! [`PolynomialHash`] outputs lie in `[0, 2^31 - 1]` (the high bit is always
//! clear), which is fine for unsigned counters. [`TabulationHash`] produces
//! full 32-bit words, so its high bit can double as a Rademacher sign — the
//! signed sketches use it for exactly that.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MERSENNE_31: u64 = (1 << 31) - 1;

const CHUNK_BITS: usize = 8;
const NUM_CHUNKS: usize = 32 / CHUNK_BITS;
const CHUNK_CARD: usize = 1 << CHUNK_BITS;

/// 2-independent polynomial hash: per row, `((a·x + b) >> 31) + (a·x + b)`
/// folded into the Mersenne prime `2^31 - 1`.
pub struct PolynomialHash {
    /// One `(a, b)` pair per row.
    params: Vec<(u32, u32)>,
}

impl PolynomialHash {
    pub fn new(rows: u32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let params = (0..rows).map(|_| (rng.gen(), rng.gen())).collect();
        PolynomialHash { params }
    }

    /// Writes one hash per row into `out`. `out.len()` must equal the row
    /// count given at construction.
    pub fn hash(&self, out: &mut [u32], x: u32) {
        debug_assert_eq!(out.len(), self.params.len());
        for (o, &(a, b)) in out.iter_mut().zip(&self.params) {
            let r = (a as u64) * (x as u64) + b as u64;
            let r = (r >> 31).wrapping_add(r) & MERSENNE_31;
            *o = r as u32;
        }
    }
}

/// Tabulation hash: the key is split into four 8-bit chunks; each chunk
/// indexes a table of random words and the results are XORed.
///
/// 3-independent, and strong enough in practice for median-of-rows
/// estimators (Pătraşcu & Thorup, 2012).
pub struct TabulationHash {
    rows: usize,
    /// `NUM_CHUNKS × CHUNK_CARD × rows` words; the slice for chunk `c` with
    /// value `v` starts at `(c·CHUNK_CARD + v)·rows`.
    table: Vec<u32>,
}

impl TabulationHash {
    pub fn new(rows: u32, seed: u64) -> Self {
        let rows = rows as usize;
        let mut rng = StdRng::seed_from_u64(seed);
        let table = (0..NUM_CHUNKS * CHUNK_CARD * rows)
            .map(|_| rng.gen())
            .collect();
        TabulationHash { rows, table }
    }

    /// Writes one hash per row into `out`. `out.len()` must equal the row
    /// count given at construction.
    pub fn hash(&self, out: &mut [u32], x: u32) {
        debug_assert_eq!(out.len(), self.rows);
        out.fill(0);
        for c in 0..NUM_CHUNKS {
            let v = (x >> (c * CHUNK_BITS)) as usize & (CHUNK_CARD - 1);
            let slice = &self.table[(c * CHUNK_CARD + v) * self.rows..][..self.rows];
            for (o, &w) in out.iter_mut().zip(slice) {
                *o ^= w;
            }
        }
    }
}

#[inline]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// MurmurHash3 x86_32 over a byte slice.
pub fn murmur3_32(key: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h1 = seed;
    let mut chunks = key.chunks_exact(4);
    for block in &mut chunks {
        let mut k1 = u32::from_le_bytes(block.try_into().unwrap());
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k1 = 0u32;
        for (i, &b) in tail.iter().enumerate() {
            k1 ^= (b as u32) << (8 * i);
        }
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= key.len() as u32;
    fmix32(h1)
}

/// 32-bit key for an ordered string pair: `101·h(a) + h(b)`, wrapping.
///
/// Non-commutative, so `(a, b)` and `(b, a)` land in different sketch cells.
pub fn pair_key(a: &str, b: &str, seed: u32) -> u32 {
    let h1 = murmur3_32(a.as_bytes(), seed);
    let h2 = murmur3_32(b.as_bytes(), seed);
    h1.wrapping_mul(101).wrapping_add(h2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polynomial_is_deterministic_per_seed() {
        let h1 = PolynomialHash::new(5, 42);
        let h2 = PolynomialHash::new(5, 42);
        let mut a = [0u32; 5];
        let mut b = [0u32; 5];
        h1.hash(&mut a, 12345);
        h2.hash(&mut b, 12345);
        assert_eq!(a, b);
    }

    #[test]
    fn polynomial_high_bit_is_clear() {
        let h = PolynomialHash::new(8, 7);
        let mut out = [0u32; 8];
        for x in [0u32, 1, 999, u32::MAX] {
            h.hash(&mut out, x);
            for &v in &out {
                assert!(v <= (1 << 31) - 1, "output {v:#x} exceeds 2^31 - 1");
            }
        }
    }

    #[test]
    fn polynomial_rows_differ() {
        let h = PolynomialHash::new(4, 3);
        let mut out = [0u32; 4];
        h.hash(&mut out, 1_000_003);
        // Four independent rows agreeing on one key would be suspicious.
        assert!(out.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn tabulation_is_deterministic_per_seed() {
        let h1 = TabulationHash::new(3, 99);
        let h2 = TabulationHash::new(3, 99);
        let mut a = [0u32; 3];
        let mut b = [0u32; 3];
        h1.hash(&mut a, 0xDEAD_BEEF);
        h2.hash(&mut b, 0xDEAD_BEEF);
        assert_eq!(a, b);
    }

    #[test]
    fn tabulation_distinct_keys_distinct_hashes() {
        let h = TabulationHash::new(1, 5);
        let mut seen = std::collections::HashSet::new();
        let mut out = [0u32; 1];
        for x in 0..512u32 {
            h.hash(&mut out, x);
            seen.insert(out[0]);
        }
        // A handful of collisions over 512 keys is fine; mass collision is not.
        assert!(seen.len() > 500, "only {} distinct hashes", seen.len());
    }

    #[test]
    fn murmur3_reference_vectors() {
        // Vectors from the SMHasher reference implementation.
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"", 1), 0x514e_28b7);
        assert_eq!(murmur3_32(b"test", 0x9747_b28c), 0x704b_81dc);
        assert_eq!(murmur3_32(b"Hello, world!", 0x9747_b28c), 0x24bb_fe8e);
    }

    #[test]
    fn pair_key_is_order_sensitive() {
        assert_ne!(pair_key("cat", "dog", 1), pair_key("dog", "cat", 1));
        assert_eq!(pair_key("cat", "dog", 1), pair_key("cat", "dog", 1));
    }
}
