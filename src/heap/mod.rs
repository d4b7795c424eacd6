//! Indexed binary heaps tracking the top-k features of a stream.
//!
//! All three variants share one shape: a 1-indexed priority array `pq` and
//! a key → (position, …) map `qp`, kept mutually consistent — for a key `k`
//! at position `p`, `pq[p] == k` and `qp[k].position == p`. Capacity is
//! fixed at construction; the only removal path is eviction on insert into
//! a full heap, and the evicted item can be the one the caller just tried
//! to insert.
//!
//! - [`MagnitudeHeap`] — min-heap by `|value|`; the least influential
//!   feature sits at the root and is evicted first.
//! - [`CountHeap`] — min-heap by integer count with an auxiliary float
//!   value that does not affect ordering (SpaceSaving / Count-Min tops).
//! - [`WeightedReservoir`] — Efraimidis–Spirakis A-Res sampler; max-heap
//!   on the random rank `|value|^p · ln(U)`.
//!
//! Duplicate-key insertion and empty-heap minima are caller bugs and panic.

mod count;
mod magnitude;
mod reservoir;

pub use count::CountHeap;
pub use magnitude::MagnitudeHeap;
pub use reservoir::WeightedReservoir;
