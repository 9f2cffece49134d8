//! Shapes built out of unit cubes, and the operations needed to grow
//! and canonicalize them.

use std::collections::{HashSet, VecDeque};

mod rotations;
pub use rotations::{MatrixCol, Orientation, Symmetry, ROTATIONS, ROTATIONS_REFLECTIONS};

/// The position of a single unit cube.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord, Default)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate::new(0, 0, 0);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The 6 face-adjacent positions of this coordinate.
    #[inline]
    pub fn neighbours(self) -> [Coordinate; 6] {
        let Coordinate { x, y, z } = self;
        [
            Coordinate::new(x + 1, y, z),
            Coordinate::new(x - 1, y, z),
            Coordinate::new(x, y + 1, z),
            Coordinate::new(x, y - 1, z),
            Coordinate::new(x, y, z + 1),
            Coordinate::new(x, y, z - 1),
        ]
    }
}

impl From<(i32, i32, i32)> for Coordinate {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Coordinate> for (i32, i32, i32) {
    fn from(value: Coordinate) -> Self {
        (value.x, value.y, value.z)
    }
}

/// The deduplication key of a shape: its normalized coordinates in
/// ascending order.
#[derive(PartialEq, Eq, Hash, Clone, Debug, PartialOrd, Ord)]
pub struct CanonicalKey(Box<[Coordinate]>);

impl CanonicalKey {
    pub fn coordinates(&self) -> &[Coordinate] {
        &self.0
    }
}

/// A set of unit cubes.
///
/// Coordinates are unique, but the order in which they are stored is
/// whatever order they were added in. Equality ignores that order.
#[derive(Clone, Debug, Default)]
pub struct Shape {
    cubes: Vec<Coordinate>,
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.cubes.len() == other.cubes.len() && self.sorted_cubes() == other.sorted_cubes()
    }
}

impl Eq for Shape {}

impl std::hash::Hash for Shape {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.sorted_cubes().hash(state);
    }
}

/// Creating a shape from a list of tuples is convenient when writing
/// them out by hand.
///
/// Panics if the list contains the same coordinate twice.
impl From<Vec<(i32, i32, i32)>> for Shape {
    fn from(value: Vec<(i32, i32, i32)>) -> Self {
        let cubes = value.into_iter().map(Coordinate::from).collect();
        Shape::try_new(cubes).expect("shape contains duplicate coordinates")
    }
}

impl core::fmt::Display for Shape {
    // One block of rows per z layer, `1` where a cube is present.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let normalized = self.normalize();
        let occupied: HashSet<_> = normalized.cubes.iter().copied().collect();
        let (width, height, depth) = normalized.dimensions();

        let mut out = String::new();
        for z in 0..depth as i32 {
            for _ in 0..width {
                out.push('-');
            }
            out.push('\n');

            for y in 0..height as i32 {
                for x in 0..width as i32 {
                    if occupied.contains(&Coordinate::new(x, y, z)) {
                        out.push('1');
                    } else {
                        out.push('0');
                    }
                }
                out.push('\n');
            }
        }

        write!(f, "{}", out.trim_end())
    }
}

impl Shape {
    /// Create a shape from `cubes`, or `None` if a coordinate occurs
    /// more than once.
    pub fn try_new(cubes: Vec<Coordinate>) -> Option<Self> {
        let mut seen = HashSet::with_capacity(cubes.len());
        if cubes.iter().all(|c| seen.insert(*c)) {
            Some(Self { cubes })
        } else {
            None
        }
    }

    /// The single cube at the origin.
    pub fn unit_cube() -> Self {
        Self {
            cubes: vec![Coordinate::ORIGIN],
        }
    }

    /// Two cubes next to each other along the x axis.
    pub fn domino() -> Self {
        Self {
            cubes: vec![Coordinate::ORIGIN, Coordinate::new(1, 0, 0)],
        }
    }

    /// The amount of cubes in this shape.
    pub fn len(&self) -> usize {
        self.cubes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cubes.is_empty()
    }

    pub fn cubes(&self) -> &[Coordinate] {
        &self.cubes
    }

    pub fn into_cubes(self) -> Vec<Coordinate> {
        self.cubes
    }

    /// The coordinates of this shape as plain triples.
    pub fn to_triples(&self) -> Vec<(i32, i32, i32)> {
        self.cubes.iter().map(|&c| c.into()).collect()
    }

    fn sorted_cubes(&self) -> Vec<Coordinate> {
        let mut sorted = self.cubes.clone();
        sorted.sort_unstable();
        sorted
    }

    /// All unoccupied positions that share a face with a cube of this shape.
    pub fn expansion_candidates(&self) -> HashSet<Coordinate> {
        let occupied: HashSet<_> = self.cubes.iter().copied().collect();

        self.cubes
            .iter()
            .flat_map(|c| c.neighbours())
            .filter(|n| !occupied.contains(n))
            .collect()
    }

    /// Create a new shape consisting of `self` and a cube at `candidate`.
    ///
    /// Panics if `candidate` is already occupied.
    pub fn expand(&self, candidate: Coordinate) -> Shape {
        assert!(
            !self.cubes.contains(&candidate),
            "cannot expand into occupied position {candidate:?}"
        );

        let mut cubes = Vec::with_capacity(self.cubes.len() + 1);
        cubes.extend_from_slice(&self.cubes);
        cubes.push(candidate);
        Shape { cubes }
    }

    /// Check that every cube can be reached from the first one by
    /// stepping between face-adjacent cubes.
    pub fn is_face_connected(&self) -> bool {
        let Some(&first) = self.cubes.first() else {
            return true;
        };

        let occupied: HashSet<_> = self.cubes.iter().copied().collect();
        let mut visited = HashSet::with_capacity(self.cubes.len());
        let mut queue = VecDeque::new();

        visited.insert(first);
        queue.push_back(first);

        while let Some(current) = queue.pop_front() {
            for n in current.neighbours() {
                if occupied.contains(&n) && visited.insert(n) {
                    queue.push_back(n);
                }
            }
        }

        visited.len() == self.cubes.len()
    }

    fn min_corner(cubes: &[Coordinate]) -> Coordinate {
        cubes.iter().fold(
            Coordinate::new(i32::MAX, i32::MAX, i32::MAX),
            |min, c| Coordinate::new(min.x.min(c.x), min.y.min(c.y), min.z.min(c.z)),
        )
    }

    fn translated_to_origin(mut cubes: Vec<Coordinate>) -> Vec<Coordinate> {
        if cubes.is_empty() {
            return cubes;
        }

        let min = Self::min_corner(&cubes);
        cubes.iter_mut().for_each(|c| {
            c.x -= min.x;
            c.y -= min.y;
            c.z -= min.z;
        });
        cubes
    }

    /// Translate this shape so that the smallest coordinate on every axis is 0.
    pub fn normalize(&self) -> Shape {
        Shape {
            cubes: Self::translated_to_origin(self.cubes.clone()),
        }
    }

    /// `true` if the smallest coordinate on every axis is 0.
    pub fn is_normalized(&self) -> bool {
        self.cubes.is_empty() || Self::min_corner(&self.cubes) == Coordinate::ORIGIN
    }

    /// The translation-only canonical key of this shape.
    pub fn canonical_key(&self) -> CanonicalKey {
        self.canonical_key_with(Symmetry::Translation)
    }

    /// The canonical key of this shape under `symmetry`.
    ///
    /// This is the smallest sorted, normalized coordinate list among all
    /// orientations that `symmetry` allows.
    pub fn canonical_key_with(&self, symmetry: Symmetry) -> CanonicalKey {
        let best = symmetry
            .orientations()
            .iter()
            .map(|o| {
                let rotated = self.cubes.iter().map(|&c| o.apply(c)).collect();
                let mut rotated = Self::translated_to_origin(rotated);
                rotated.sort_unstable();
                rotated
            })
            .min()
            .unwrap_or_default();

        CanonicalKey(best.into_boxed_slice())
    }

    /// The shape described by the canonical key of `self` under `symmetry`.
    pub fn canonical_form(&self, symmetry: Symmetry) -> Shape {
        Shape {
            cubes: self.canonical_key_with(symmetry).0.into_vec(),
        }
    }

    /// `true` if `self` and `other` are the same shape under `symmetry`.
    pub fn is_equivalent(&self, other: &Shape, symmetry: Symmetry) -> bool {
        self.len() == other.len()
            && self.canonical_key_with(symmetry) == other.canonical_key_with(symmetry)
    }

    /// The extent of this shape along each axis, as `(width, height, depth)`.
    pub fn dimensions(&self) -> (usize, usize, usize) {
        if self.cubes.is_empty() {
            return (0, 0, 0);
        }

        let min = Self::min_corner(&self.cubes);
        let max = self.cubes.iter().fold(
            Coordinate::new(i32::MIN, i32::MIN, i32::MIN),
            |max, c| Coordinate::new(max.x.max(c.x), max.y.max(c.y), max.z.max(c.z)),
        );

        (
            (max.x - min.x) as usize + 1,
            (max.y - min.y) as usize + 1,
            (max.z - min.z) as usize + 1,
        )
    }

    /// `true` if all cubes lie on a single line.
    pub fn is_linear(&self) -> bool {
        let (w, h, d) = self.dimensions();
        (w == 1 && h == 1) || (w == 1 && d == 1) || (h == 1 && d == 1)
    }

    /// `true` if all cubes lie in a single plane.
    pub fn is_flat(&self) -> bool {
        let (w, h, d) = self.dimensions();
        w == 1 || h == 1 || d == 1
    }
}
