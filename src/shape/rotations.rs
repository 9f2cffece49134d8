//! The axis-aligned orientations of a shape, used when shapes that
//! differ only by a rotation (or a reflection) should be treated as one.

use super::Coordinate;

/// Which transformations two shapes may differ by while still being
/// considered the same shape.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Default)]
pub enum Symmetry {
    /// Shapes are equal if one is a translation of the other.
    #[default]
    Translation,
    /// Shapes are equal if one is a rotated translation of the other.
    Rotation,
    /// Shapes are equal if one is a rotated and/or mirrored translation of the other.
    RotationReflection,
}

impl Symmetry {
    /// The orientations that have to be checked to find the canonical
    /// form of a shape under this symmetry.
    pub fn orientations(&self) -> &'static [Orientation] {
        match self {
            Symmetry::Translation => &IDENTITY,
            Symmetry::Rotation => &ROTATIONS,
            Symmetry::RotationReflection => &ROTATIONS_REFLECTIONS,
        }
    }

    /// Short, stable name used in file names and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Symmetry::Translation => "translation",
            Symmetry::Rotation => "rotation",
            Symmetry::RotationReflection => "rotation-reflection",
        }
    }
}

impl From<Symmetry> for u8 {
    fn from(value: Symmetry) -> Self {
        match value {
            Symmetry::Translation => 0,
            Symmetry::Rotation => 1,
            Symmetry::RotationReflection => 2,
        }
    }
}

impl TryFrom<u8> for Symmetry {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let symmetry = match value {
            0 => Self::Translation,
            1 => Self::Rotation,
            2 => Self::RotationReflection,
            _ => return Err(()),
        };
        Ok(symmetry)
    }
}

impl core::fmt::Display for Symmetry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// The source of one output axis: an input axis, possibly negated.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum MatrixCol {
    XP,
    XN,
    YP,
    YN,
    ZP,
    ZN,
}

impl MatrixCol {
    const fn from_axis(axis: usize, negated: bool) -> Self {
        match (axis, negated) {
            (0, false) => MatrixCol::XP,
            (0, true) => MatrixCol::XN,
            (1, false) => MatrixCol::YP,
            (1, true) => MatrixCol::YN,
            (2, false) => MatrixCol::ZP,
            _ => MatrixCol::ZN,
        }
    }

    #[inline]
    fn map_coord(self, c: Coordinate) -> i32 {
        match self {
            MatrixCol::XP => c.x,
            MatrixCol::XN => -c.x,
            MatrixCol::YP => c.y,
            MatrixCol::YN => -c.y,
            MatrixCol::ZP => c.z,
            MatrixCol::ZN => -c.z,
        }
    }
}

/// A signed permutation matrix, stored column by column.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Orientation {
    pub x_col: MatrixCol,
    pub y_col: MatrixCol,
    pub z_col: MatrixCol,
}

impl Orientation {
    pub const IDENTITY: Orientation = Orientation {
        x_col: MatrixCol::XP,
        y_col: MatrixCol::YP,
        z_col: MatrixCol::ZP,
    };

    #[inline]
    pub fn apply(&self, c: Coordinate) -> Coordinate {
        Coordinate::new(
            self.x_col.map_coord(c),
            self.y_col.map_coord(c),
            self.z_col.map_coord(c),
        )
    }

    /// `true` if this orientation mirrors space.
    pub fn is_reflection(&self) -> bool {
        let e = |col| self.apply(col);
        let (a, b, c) = (
            e(Coordinate::new(1, 0, 0)),
            e(Coordinate::new(0, 1, 0)),
            e(Coordinate::new(0, 0, 1)),
        );
        let det = a.x * (b.y * c.z - b.z * c.y) - a.y * (b.x * c.z - b.z * c.x)
            + a.z * (b.x * c.y - b.y * c.x);
        det < 0
    }
}

// Even permutations first, then odd ones.
const PERMUTATIONS: [([usize; 3], bool); 6] = [
    ([0, 1, 2], true),
    ([1, 2, 0], true),
    ([2, 0, 1], true),
    ([0, 2, 1], false),
    ([2, 1, 0], false),
    ([1, 0, 2], false),
];

const fn build<const N: usize>(with_reflections: bool) -> [Orientation; N] {
    let mut out = [Orientation::IDENTITY; N];
    let mut written = 0;

    let mut p = 0;
    while p < PERMUTATIONS.len() {
        let (axes, even) = PERMUTATIONS[p];
        let mut signs = 0;
        while signs < 8 {
            let negations = (signs & 1) + ((signs >> 1) & 1) + ((signs >> 2) & 1);
            let proper = even == (negations % 2 == 0);

            if proper || with_reflections {
                out[written] = Orientation {
                    x_col: MatrixCol::from_axis(axes[0], signs & 1 != 0),
                    y_col: MatrixCol::from_axis(axes[1], signs & 2 != 0),
                    z_col: MatrixCol::from_axis(axes[2], signs & 4 != 0),
                };
                written += 1;
            }
            signs += 1;
        }
        p += 1;
    }

    assert!(written == N);
    out
}

const IDENTITY: [Orientation; 1] = [Orientation::IDENTITY];

/// The 24 proper rotations of the cube.
pub const ROTATIONS: [Orientation; 24] = build::<24>(false);

/// All 48 symmetries of the cube, rotations and reflections.
pub const ROTATIONS_REFLECTIONS: [Orientation; 48] = build::<48>(true);
