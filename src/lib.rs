//! Enumeration of polycubes: every distinct connected shape that can be
//! built out of `n` unit cubes joined face to face.
//!
//! [`Enumerator::generate`] produces the shapes of one size, growing each
//! shape of the previous size by one cube. The [`cache`] module stores
//! finished levels on disk so they don't have to be recomputed.


pub mod cache;
pub mod enumerate;
pub mod shape;

pub use enumerate::{known_count, Enumerator, ShapeSet};
pub use shape::{CanonicalKey, Coordinate, Shape, Symmetry};

/// All unique shapes of `n` cubes, deduplicated by translation only,
/// using one worker thread per CPU.
pub fn generate(n: usize) -> ShapeSet {
    Enumerator::new().generate(n)
}
