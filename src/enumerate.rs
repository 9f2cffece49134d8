//! Level-by-level enumeration of all shapes of `n` cubes.

use std::{collections::hash_map::RandomState, hash::BuildHasher};

use hashbrown::{hash_map::Entry, HashMap};
use indicatif::ProgressBar;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::shape::{CanonicalKey, Shape, Symmetry};

/// All unique shapes of exactly [`n`](ShapeSet::n) cubes, keyed by their
/// canonical key under [`symmetry`](ShapeSet::symmetry).
#[derive(Clone, Debug)]
pub struct ShapeSet {
    n: usize,
    symmetry: Symmetry,
    shapes: HashMap<CanonicalKey, Shape>,
}

impl PartialEq for ShapeSet {
    fn eq(&self, other: &Self) -> bool {
        self.n == other.n && self.symmetry == other.symmetry && self.shapes == other.shapes
    }
}

impl Eq for ShapeSet {}

impl ShapeSet {
    /// An empty set of shapes of size `n`.
    pub fn empty(n: usize, symmetry: Symmetry) -> Self {
        Self {
            n,
            symmetry,
            shapes: HashMap::new(),
        }
    }

    /// Build a set out of `shapes`, keeping the first shape seen for
    /// every canonical key. Stored shapes are normalized.
    ///
    /// Returns the set and the amount of shapes that were dropped as duplicates.
    pub fn from_shapes<I>(n: usize, symmetry: Symmetry, shapes: I) -> (Self, usize)
    where
        I: IntoIterator<Item = Shape>,
    {
        let mut set = Self::empty(n, symmetry);
        let mut duplicates = 0;

        for shape in shapes {
            let key = shape.canonical_key_with(symmetry);
            match set.shapes.entry(key) {
                Entry::Vacant(v) => {
                    v.insert(shape.normalize());
                }
                Entry::Occupied(_) => duplicates += 1,
            }
        }

        (set, duplicates)
    }

    /// The amount of cubes in each shape of this set.
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn symmetry(&self) -> Symmetry {
        self.symmetry
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// `true` if a shape equivalent to `shape` is part of this set.
    pub fn contains(&self, shape: &Shape) -> bool {
        self.shapes
            .contains_key(&shape.canonical_key_with(self.symmetry))
    }

    /// Iterate over the shapes in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Shape> + ExactSizeIterator {
        self.shapes.values()
    }

    /// The canonical keys of this set, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &CanonicalKey> + ExactSizeIterator {
        self.shapes.keys()
    }

    /// The shapes of this set, ordered by canonical key.
    pub fn sorted(&self) -> Vec<&Shape> {
        let mut entries: Vec<_> = self.shapes.iter().collect();
        entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        entries.into_iter().map(|(_, shape)| shape).collect()
    }

    pub fn into_shapes(self) -> Vec<Shape> {
        self.shapes.into_values().collect()
    }
}

const SHARD_BITS: u32 = 6;

/// The deduplication store of the level being computed.
///
/// Keys are spread over `2^SHARD_BITS` independently locked maps by the
/// top bits of their hash, so the check-then-insert of one key always
/// happens under a single lock.
struct DedupStore {
    hasher: RandomState,
    shards: Vec<Mutex<HashMap<CanonicalKey, Shape>>>,
}

impl DedupStore {
    fn new() -> Self {
        Self {
            hasher: RandomState::new(),
            shards: (0..1 << SHARD_BITS)
                .map(|_| Mutex::new(HashMap::new()))
                .collect(),
        }
    }

    /// Insert `shape` under `key` unless the key is already present.
    ///
    /// Returns `true` if `shape` was inserted.
    fn insert(&self, key: CanonicalKey, shape: Shape) -> bool {
        let shard = (self.hasher.hash_one(&key) >> (u64::BITS - SHARD_BITS)) as usize;

        match self.shards[shard].lock().entry(key) {
            Entry::Vacant(v) => {
                v.insert(shape);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    fn into_map(self) -> HashMap<CanonicalKey, Shape> {
        self.shards
            .into_par_iter()
            .flat_map(|shard| shard.into_inner().into_par_iter())
            .collect()
    }
}

/// Computes [`ShapeSet`]s by growing every shape of `n - 1` cubes by one
/// cube in every possible position.
#[derive(Clone, Debug)]
pub struct Enumerator {
    symmetry: Symmetry,
    workers: usize,
    progress: Option<ProgressBar>,
}

impl Default for Enumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Enumerator {
    /// An enumerator that deduplicates by translation only and uses one
    /// worker per CPU.
    pub fn new() -> Self {
        Self {
            symmetry: Symmetry::Translation,
            workers: num_cpus::get(),
            progress: None,
        }
    }

    pub fn with_symmetry(mut self, symmetry: Symmetry) -> Self {
        self.symmetry = symmetry;
        self
    }

    /// Set the amount of worker threads. `0` is treated as `1`.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Report expansion progress to `bar`. The bar is reset at the start
    /// of every level and advanced once per base shape.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    pub fn symmetry(&self) -> Symmetry {
        self.symmetry
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// The hard-coded sets for `n <= 2`.
    fn seed(&self, n: usize) -> ShapeSet {
        let seed = match n {
            0 => return ShapeSet::empty(0, self.symmetry),
            1 => Shape::unit_cube(),
            2 => Shape::domino(),
            _ => unreachable!("only sizes up to 2 are seeded"),
        };

        ShapeSet::from_shapes(n, self.symmetry, [seed]).0
    }

    /// All unique shapes of `n` cubes.
    pub fn generate(&self, n: usize) -> ShapeSet {
        if n <= 2 {
            return self.seed(n);
        }

        let base = self.generate(n - 1);
        self.expand_level(&base)
    }

    /// All unique shapes of `1..=n` cubes, smallest first.
    pub fn generate_up_to(&self, n: usize) -> Vec<ShapeSet> {
        let mut levels: Vec<ShapeSet> = Vec::with_capacity(n);

        for i in 1..=n {
            let next = match levels.last() {
                Some(base) => self.expand_level(base),
                None => self.seed(i),
            };
            levels.push(next);
        }

        levels
    }

    /// Compute the set of size `base.n() + 1` from the complete set `base`.
    pub fn expand_level(&self, base: &ShapeSet) -> ShapeSet {
        let n = base.n() + 1;

        if n <= 2 {
            return self.seed(n);
        }

        if let Some(bar) = &self.progress {
            bar.reset();
            bar.set_length(base.len() as u64);
            bar.set_message(format!("Expanding base shapes of N = {}...", base.n()));
        }

        let store = DedupStore::new();
        let symmetry = self.symmetry;

        let process = |shape: &Shape| {
            let rejected = expand_into(&store, shape, symmetry);
            if let Some(bar) = &self.progress {
                bar.inc(1);
            }
            rejected
        };

        let rejected: usize = if self.workers == 1 {
            base.iter().map(process).sum()
        } else {
            let shapes: Vec<&Shape> = base.iter().collect();
            let work = || -> usize { shapes.par_iter().map(|s| process(*s)).sum() };

            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
            {
                Ok(pool) => pool.install(work),
                Err(e) => {
                    log::warn!(
                        "Failed to build a pool of {} workers ({e}), using the global pool",
                        self.workers
                    );
                    work()
                }
            }
        };

        if rejected > 0 {
            log::debug!("Rejected {rejected} disconnected expansions for N = {n}");
        }

        let shapes = store.into_map();
        log::info!("Found {} unique shapes for N = {n} ({symmetry})", shapes.len());

        ShapeSet {
            n,
            symmetry,
            shapes,
        }
    }
}

/// Expand `base` into every candidate position and store all resulting
/// shapes that have not been seen yet.
///
/// Returns the amount of expansions that were rejected for not being
/// face-connected.
fn expand_into(store: &DedupStore, base: &Shape, symmetry: Symmetry) -> usize {
    let mut rejected = 0;

    for candidate in base.expansion_candidates() {
        let expanded = base.expand(candidate);
        if !expanded.is_face_connected() {
            rejected += 1;
            continue;
        }

        let normalized = expanded.normalize();
        let key = normalized.canonical_key_with(symmetry);
        store.insert(key, normalized);
    }

    rejected
}

/// The number of free polycubes (unique under rotation) of size `n`, for
/// the sizes where it is known.
pub fn known_count(n: usize) -> Option<u64> {
    const KNOWN: [u64; 18] = [
        1,
        1,
        2,
        8,
        29,
        166,
        1023,
        6922,
        48311,
        346543,
        2522522,
        18598427,
        139333147,
        1056657611,
        8107839447,
        62709211271,
        489997729602,
        3847265309118,
    ];

    n.checked_sub(1).and_then(|i| KNOWN.get(i)).copied()
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    fn counts(enumerator: &Enumerator, max: usize) -> Vec<usize> {
        enumerator
            .generate_up_to(max)
            .iter()
            .map(ShapeSet::len)
            .collect()
    }

    #[test]
    fn zero_is_empty() {
        let set = Enumerator::new().generate(0);
        assert!(set.is_empty());
        assert_eq!(set.n(), 0);
        assert!(Enumerator::new().generate_up_to(0).is_empty());
    }

    #[test]
    fn seeds() {
        let enumerator = Enumerator::new();

        let ones = enumerator.generate(1);
        assert_eq!(ones.len(), 1);
        assert!(ones.contains(&Shape::from(vec![(7, 7, 7)])));

        let twos = enumerator.generate(2);
        assert_eq!(twos.len(), 1);
        assert!(twos.contains(&Shape::from(vec![(3, 0, 1), (4, 0, 1)])));
    }

    #[test]
    fn translation_counts() {
        let enumerator = Enumerator::new().with_symmetry(Symmetry::Translation);
        assert_eq!(counts(&enumerator, 6), vec![1, 1, 9, 67, 471, 3265]);
    }

    #[test]
    fn rotation_counts_match_known() {
        let enumerator = Enumerator::new().with_symmetry(Symmetry::Rotation);
        let found = counts(&enumerator, 7);

        for (i, len) in found.into_iter().enumerate() {
            assert_eq!(Some(len as u64), known_count(i + 1), "N = {}", i + 1);
        }
    }

    #[test]
    fn rotation_reflection_counts() {
        let enumerator = Enumerator::new().with_symmetry(Symmetry::RotationReflection);
        assert_eq!(counts(&enumerator, 6), vec![1, 1, 2, 7, 23, 112]);
    }

    #[test]
    fn recursive_and_levelled_agree() {
        let enumerator = Enumerator::new();
        let levels = enumerator.generate_up_to(5);
        assert_eq!(levels[4], enumerator.generate(5));
    }

    #[test]
    fn levels_cover_every_size_in_order() {
        let enumerator = Enumerator::new().with_symmetry(Symmetry::Rotation);
        let levels = enumerator.generate_up_to(5);

        let sizes: Vec<_> = levels.iter().map(ShapeSet::n).collect();
        assert_eq!(sizes, vec![1, 2, 3, 4, 5]);
        assert!(levels
            .iter()
            .all(|set| set.iter().all(|shape| shape.len() == set.n())));

        let total: usize = levels.iter().map(ShapeSet::len).sum();
        assert_eq!(total, 1 + 1 + 2 + 8 + 29);
    }

    #[test]
    fn all_shapes_are_valid() {
        let set = Enumerator::new().generate(5);

        for shape in set.iter() {
            assert_eq!(shape.len(), 5);
            assert!(shape.is_face_connected());
            assert!(shape.is_normalized());
            assert_eq!(shape.normalize(), *shape);
        }

        let keys: HashSet<_> = set.iter().map(Shape::canonical_key).collect();
        assert_eq!(keys.len(), set.len());
    }

    #[test]
    fn single_and_many_workers_agree() {
        for symmetry in [Symmetry::Translation, Symmetry::Rotation] {
            let single = Enumerator::new()
                .with_symmetry(symmetry)
                .with_workers(1)
                .generate(6);
            let many = Enumerator::new()
                .with_symmetry(symmetry)
                .with_workers(8)
                .generate(6);

            let single_keys: HashSet<_> = single.keys().collect();
            let many_keys: HashSet<_> = many.keys().collect();
            assert_eq!(single_keys, many_keys);
        }
    }

    #[test]
    fn zero_workers_means_one() {
        assert_eq!(Enumerator::new().with_workers(0).workers(), 1);
    }

    #[test]
    fn sorted_is_stable() {
        let a = Enumerator::new().with_workers(4).generate(4);
        let b = Enumerator::new().with_workers(1).generate(4);

        let a: Vec<_> = a.sorted().into_iter().map(Shape::canonical_key).collect();
        let b: Vec<_> = b.sorted().into_iter().map(Shape::canonical_key).collect();
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn progress_counts_base_shapes() {
        let bar = ProgressBar::hidden();
        let enumerator = Enumerator::new().with_progress(bar.clone());

        enumerator.generate(5);

        // The last level expanded the 67 shapes of N = 4.
        assert_eq!(bar.length(), Some(67));
        assert_eq!(bar.position(), 67);
    }

    #[test]
    fn from_shapes_drops_duplicates() {
        let shapes = vec![
            Shape::domino(),
            Shape::from(vec![(5, 5, 5), (6, 5, 5)]),
            Shape::from(vec![(0, 0, 0), (0, 0, 1)]),
        ];

        let (set, duplicates) = ShapeSet::from_shapes(2, Symmetry::Translation, shapes.clone());
        assert_eq!((set.len(), duplicates), (2, 1));

        let (set, duplicates) = ShapeSet::from_shapes(2, Symmetry::Rotation, shapes);
        assert_eq!((set.len(), duplicates), (1, 2));
    }

    #[test]
    fn from_shapes_stores_normalized_shapes() {
        let moved = Shape::from(vec![(5, -3, 9), (6, -3, 9)]);
        let (set, _) = ShapeSet::from_shapes(2, Symmetry::Translation, [moved]);

        assert!(set.iter().all(Shape::is_normalized));
        assert_eq!(set.into_shapes(), vec![Shape::domino()]);
    }

    #[test]
    fn known_counts() {
        assert_eq!(known_count(0), None);
        assert_eq!(known_count(1), Some(1));
        assert_eq!(known_count(8), Some(6922));
        assert_eq!(known_count(18), Some(3847265309118));
        assert_eq!(known_count(19), None);
    }
}
