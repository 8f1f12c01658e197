//! Top-K selection algorithms
//!
//! **Problem**: ranking a whole candidate set just to keep its best K entries is
//! O(N log N), and N is routinely millions of scored candidates while K is tens.
//!
//! **Solution**: two phases.
//! 1. Bounded selection: a binary heap of capacity K whose top is the worst entry
//!    kept so far. A candidate only enters by evicting that top. O(N log K) time,
//!    O(K) memory.
//! 2. Sort only the K survivors by the requested output criterion.
//!
//! ## Ranking rules
//!
//! - [`SortOrder::Descending`] keeps the largest keys, [`SortOrder::Ascending`] the smallest.
//! - Equal keys rank by input position: the entry seen first ranks first.
//! - NaN keys (and `None` keys) always rank last, in both directions.
//! - `k > n` clamps to `n` unless [`OversizePolicy::Strict`] is requested.
//!
//! Inputs are borrowed immutably and the selector keeps no state, so every entry
//! point is safe to call concurrently on independent inputs.

use crate::{Error, Result};
use rand::Rng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

mod batch;

pub use batch::TopKSelection;

/// Sort order for Top-K selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending order (smallest K keys)
    Ascending,
    /// Descending order (largest K keys)
    #[default]
    Descending,
}

/// Which array drives the order of the returned selection.
///
/// Both variants select the same subset; only the output order differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Order the selection by key rank
    #[default]
    Key,
    /// Order the selection by value rank (ties fall back to key rank, then input position)
    Value,
}

/// What to do when more entries are requested than exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OversizePolicy {
    /// Return all `n` entries, ranked
    #[default]
    Clamp,
    /// Fail with [`Error::InvalidArgument`]
    Strict,
}

/// Scalar usable as a ranking key.
///
/// `rank_cmp` only has to be meaningful between two ranked keys: keys reporting
/// [`is_unranked`](RankKey::is_unranked) are placed after every ranked key before
/// `rank_cmp` is ever consulted.
pub trait RankKey {
    /// Natural ascending comparison between two ranked keys
    fn rank_cmp(&self, other: &Self) -> Ordering;

    /// True for keys without a position in the natural order (NaN, missing)
    fn is_unranked(&self) -> bool {
        false
    }
}

macro_rules! impl_rank_key_for_int {
    ($($t:ty),*) => {
        $(
            impl RankKey for $t {
                #[inline]
                fn rank_cmp(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }
        )*
    };
}

impl_rank_key_for_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! impl_rank_key_for_float {
    ($($t:ty),*) => {
        $(
            impl RankKey for $t {
                // -0.0 == 0.0 here; input position decides between them
                #[inline]
                fn rank_cmp(&self, other: &Self) -> Ordering {
                    self.partial_cmp(other).unwrap_or(Ordering::Equal)
                }

                #[inline]
                fn is_unranked(&self) -> bool {
                    self.is_nan()
                }
            }
        )*
    };
}

impl_rank_key_for_float!(f32, f64);

impl<K: RankKey> RankKey for Option<K> {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Some(a), Some(b)) => a.rank_cmp(b),
            _ => Ordering::Equal,
        }
    }

    fn is_unranked(&self) -> bool {
        self.as_ref().map_or(true, RankKey::is_unranked)
    }
}

/// Compare two keys by rank.
///
/// `Ordering::Less` means `a` ranks ahead of `b` (is "more top") under `order`.
/// Unranked keys compare after every ranked key regardless of `order`.
#[must_use]
pub fn compare_rank<K: RankKey + ?Sized>(a: &K, b: &K, order: SortOrder) -> Ordering {
    match (a.is_unranked(), b.is_unranked()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match order {
            SortOrder::Ascending => a.rank_cmp(b),
            SortOrder::Descending => b.rank_cmp(a),
        },
    }
}

/// Keys addressed by input position.
///
/// Slices of [`RankKey`] implement it directly. Columnar sources implement it so
/// they can be ranked in place, without first copying the keys out.
pub trait KeySource {
    /// Number of entries
    fn key_count(&self) -> usize;

    /// [`compare_rank`] between the keys at positions `a` and `b`
    fn compare_at(&self, a: usize, b: usize, order: SortOrder) -> Ordering;
}

impl<K: RankKey> KeySource for [K] {
    #[inline]
    fn key_count(&self) -> usize {
        self.len()
    }

    #[inline]
    fn compare_at(&self, a: usize, b: usize, order: SortOrder) -> Ordering {
        compare_rank(&self[a], &self[b], order)
    }
}

/// Strict total order over input positions: key rank, then position.
#[inline]
fn rank_positions<S: KeySource + ?Sized>(
    keys: &S,
    a: usize,
    b: usize,
    order: SortOrder,
) -> Ordering {
    keys.compare_at(a, b, order).then(a.cmp(&b))
}

// Heap entry ordered so that the *worst* retained entry is the greatest, which
// puts it at the top of std's max-heap where it can be evicted in O(log K).
#[derive(Debug)]
struct HeapEntry<'a, S: ?Sized> {
    keys: &'a S,
    index: usize,
    order: SortOrder,
}

impl<S: KeySource + ?Sized> PartialEq for HeapEntry<'_, S> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<S: KeySource + ?Sized> Eq for HeapEntry<'_, S> {}

impl<S: KeySource + ?Sized> Ord for HeapEntry<'_, S> {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_positions(self.keys, self.index, other.index, self.order)
    }
}

impl<S: KeySource + ?Sized> PartialOrd for HeapEntry<'_, S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Positions of the top `k` keys, best first.
///
/// `k` is clamped to `keys.len()`.
///
/// Time complexity: O(N log K) where N = number of keys, K = selection size
/// Space complexity: O(K) for the heap
#[must_use]
pub fn top_k_indices<K: RankKey>(keys: &[K], k: usize, order: SortOrder) -> Vec<usize> {
    top_k_positions(keys, k, order)
}

/// [`top_k_indices`] over any [`KeySource`].
#[must_use]
pub fn top_k_positions<S: KeySource + ?Sized>(keys: &S, k: usize, order: SortOrder) -> Vec<usize> {
    let n = keys.key_count();
    let k = k.min(n);
    if k == 0 {
        return Vec::new();
    }

    // Everything survives: no point paying for the heap
    if k == n {
        let mut all: Vec<usize> = (0..n).collect();
        all.sort_unstable_by(|&a, &b| rank_positions(keys, a, b, order));
        return all;
    }

    let mut heap: BinaryHeap<HeapEntry<'_, S>> = BinaryHeap::with_capacity(k);
    for index in 0..n {
        let entry = HeapEntry { keys, index, order };

        if heap.len() < k {
            heap.push(entry);
        } else if let Some(top) = heap.peek() {
            if entry < *top {
                heap.pop();
                heap.push(entry);
            }
        }
    }

    // Ascending by heap order == best first
    heap.into_sorted_vec()
        .into_iter()
        .map(|entry| entry.index)
        .collect()
}

/// Positions of the top `k` keys, best first, via randomized quickselect.
///
/// Pivots are drawn from the caller's `rng`, so runs are reproducible from a seed.
/// The ranking is a strict total order (key rank, then position), which makes the
/// result identical to [`top_k_indices`] for every RNG state.
///
/// Uses one O(N) index buffer; prefer [`top_k_indices`] when K is small.
#[must_use]
pub fn top_k_indices_randomized<K: RankKey, R: Rng>(
    keys: &[K],
    k: usize,
    order: SortOrder,
    rng: &mut R,
) -> Vec<usize> {
    let n = keys.len();
    let k = k.min(n);
    if k == 0 {
        return Vec::new();
    }

    let mut positions: Vec<usize> = (0..n).collect();
    let (mut lo, mut hi) = (0, n);

    // Invariant: positions[..lo] outrank positions[lo..hi], which outrank positions[hi..]
    while lo < k && k < hi {
        let pivot_slot = rng.gen_range(lo..hi);
        positions.swap(pivot_slot, hi - 1);
        let pivot = positions[hi - 1];

        let mut store = lo;
        for slot in lo..hi - 1 {
            if rank_positions(keys, positions[slot], pivot, order) == Ordering::Less {
                positions.swap(slot, store);
                store += 1;
            }
        }
        positions.swap(store, hi - 1);

        match store.cmp(&k) {
            Ordering::Equal => break,
            Ordering::Greater => hi = store,
            Ordering::Less => lo = store + 1,
        }
    }

    positions.truncate(k);
    positions.sort_unstable_by(|&a, &b| rank_positions(keys, a, b, order));
    positions
}

/// Ranked result of a top-K selection.
///
/// `keys[i]`, `values[i]` and `indices[i]` describe the same input entry;
/// index 0 is the best-ranked one.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
    indices: Vec<usize>,
}

impl<K: Clone, V: Clone> Selection<K, V> {
    fn gather(keys: &[K], values: &[V], indices: Vec<usize>) -> Self {
        Self {
            keys: indices.iter().map(|&i| keys[i].clone()).collect(),
            values: indices.iter().map(|&i| values[i].clone()).collect(),
            indices,
        }
    }
}

impl<K, V> Selection<K, V> {
    /// Selected keys, best first
    #[must_use]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Values paired with [`keys`](Self::keys)
    #[must_use]
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// Input positions of the selected entries
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of selected entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when nothing was selected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate over `(key, value)` pairs, best first
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.keys.iter().zip(self.values.iter())
    }

    /// Split into the parallel key and value vectors
    #[must_use]
    pub fn into_parts(self) -> (Vec<K>, Vec<V>) {
        (self.keys, self.values)
    }
}

/// Configurable top-K selector.
///
/// ```rust
/// use cifar_topk::topk::{OversizePolicy, SortOrder, TopKSelector};
///
/// let keys = [5, 1, 9, 3, 7];
/// let values = ["e", "a", "i", "c", "g"];
///
/// let top3 = TopKSelector::new(3).select(&keys, &values)?;
/// assert_eq!(top3.keys(), &[9, 7, 5]);
/// assert_eq!(top3.values(), &["i", "g", "e"]);
///
/// let strict = TopKSelector::new(10)
///     .order(SortOrder::Ascending)
///     .oversize(OversizePolicy::Strict);
/// assert!(strict.select(&keys, &values).is_err());
/// # Ok::<(), cifar_topk::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopKSelector {
    k: usize,
    order: SortOrder,
    oversize: OversizePolicy,
}

impl TopKSelector {
    /// Selector for `k` entries, descending, clamping oversized `k`
    #[must_use]
    pub const fn new(k: usize) -> Self {
        Self {
            k,
            order: SortOrder::Descending,
            oversize: OversizePolicy::Clamp,
        }
    }

    /// Set the ranking direction
    #[must_use]
    pub const fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Set the `k > n` policy
    #[must_use]
    pub const fn oversize(mut self, oversize: OversizePolicy) -> Self {
        self.oversize = oversize;
        self
    }

    /// Requested selection size
    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }

    fn check<K, V>(&self, keys: &[K], values: &[V]) -> Result<()> {
        if keys.len() != values.len() {
            return Err(Error::InvalidArgument(format!(
                "keys and values must have the same length (keys: {}, values: {})",
                keys.len(),
                values.len()
            )));
        }
        if self.oversize == OversizePolicy::Strict && self.k > keys.len() {
            return Err(Error::InvalidArgument(format!(
                "k ({}) exceeds number of entries ({})",
                self.k,
                keys.len()
            )));
        }
        Ok(())
    }

    /// Select the top K entries, ordered by key rank.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if `keys` and `values` differ in length,
    /// or if `k` exceeds their length under [`OversizePolicy::Strict`].
    pub fn select<K, V>(&self, keys: &[K], values: &[V]) -> Result<Selection<K, V>>
    where
        K: RankKey + Clone,
        V: Clone,
    {
        self.check(keys, values)?;
        let indices = top_k_indices(keys, self.k, self.order);
        Ok(Selection::gather(keys, values, indices))
    }

    /// Same selection as [`select`](Self::select), with pivots for the partition
    /// phase drawn from the caller's `rng`.
    ///
    /// # Errors
    /// Same conditions as [`select`](Self::select).
    pub fn select_randomized<K, V, R>(
        &self,
        keys: &[K],
        values: &[V],
        rng: &mut R,
    ) -> Result<Selection<K, V>>
    where
        K: RankKey + Clone,
        V: Clone,
        R: Rng,
    {
        self.check(keys, values)?;
        let indices = top_k_indices_randomized(keys, self.k, self.order, rng);
        Ok(Selection::gather(keys, values, indices))
    }

    /// Select the top K entries by key, then order the output by `sort_by`.
    ///
    /// With [`SortBy::Value`] the selected subset is unchanged; it is re-ranked by
    /// value in the same direction, falling back to key rank and input position.
    ///
    /// # Errors
    /// Same conditions as [`select`](Self::select).
    pub fn select_sorted_by<K, V>(
        &self,
        keys: &[K],
        values: &[V],
        sort_by: SortBy,
    ) -> Result<Selection<K, V>>
    where
        K: RankKey + Clone,
        V: RankKey + Clone,
    {
        self.check(keys, values)?;
        let mut indices = top_k_indices(keys, self.k, self.order);
        if sort_by == SortBy::Value {
            let order = self.order;
            indices.sort_unstable_by(|&a, &b| {
                compare_rank(&values[a], &values[b], order)
                    .then_with(|| rank_positions(keys, a, b, order))
            });
        }
        Ok(Selection::gather(keys, values, indices))
    }
}

/// Select the `k` best entries of parallel `keys`/`values`, ordered by key.
///
/// Shorthand for `TopKSelector::new(k).order(order).select(keys, values)`.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] if `keys` and `values` differ in length.
pub fn select_top_k<K, V>(
    keys: &[K],
    values: &[V],
    k: usize,
    order: SortOrder,
) -> Result<Selection<K, V>>
where
    K: RankKey + Clone,
    V: Clone,
{
    TopKSelector::new(k).order(order).select(keys, values)
}
