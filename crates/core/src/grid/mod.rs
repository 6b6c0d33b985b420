//! Basic types for the rectangular cell grid that maps are built on.
//!
//! ## Coordinate System
//!
//! Cells are addressed by integer `(x, y)` pairs. `x` grows to the east and `y`
//! grows to the north, and `(0, 0)` is the south-west corner of the map. Cells
//! are stored row-major, so the flat index of a cell is `y * width + x`.
//!
//! ```text
//!          +y (north)
//!           ^
//!           |
//! -x <----(0,0)----> +x (east)
//! ```
//!
//! ## Rotation
//!
//! A module can be placed in one of four cardinal orientations ([Rotation]).
//! Arbitrary angles are not supported. A module's footprint always extends from
//! its origin cell towards `+x` and `+y`; when rotated East or West, the width
//! and height of the footprint are swapped.

mod cell;
mod map;

pub use self::{cell::Cell, map::GridMap};
use derive_more::{Add, Display, Sub};
use fnv::FnvBuildHasher;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, iter};
use strum::{EnumIter, IntoEnumIterator};

pub type GridPointSet = HashSet<GridPoint, FnvBuildHasher>;

/// A position in the grid. Positions can lie outside the bounds of any
/// particular map, e.g. while scanning outward from a cell. Use
/// [GridMap::get] to check if a position actually exists.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    Add,
    Sub,
    Serialize,
    Deserialize,
)]
#[display(fmt = "({}, {})", x, y)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub const ORIGIN: Self = Self::new(0, 0);

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Shift this point by the given deltas
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Get the point `distance` steps away in the given direction. Diagonal
    /// steps move one unit along each axis. Returns `None` if the result
    /// can't be represented, which is always well outside any grid.
    pub fn step(self, direction: Direction, distance: u32) -> Option<Self> {
        let (dx, dy) = direction.vector();
        let distance = i64::from(distance);
        let x = i64::from(self.x) + i64::from(dx) * distance;
        let y = i64::from(self.y) + i64::from(dy) * distance;
        Some(Self::new(i32::try_from(x).ok()?, i32::try_from(y).ok()?))
    }

    /// Number of 8-directional steps needed to get from here to `other`
    pub fn distance_to(self, other: GridPoint) -> u32 {
        crate::util::chebyshev((self.x, self.y), (other.x, other.y))
    }
}

impl From<(i32, i32)> for GridPoint {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// One of the eight directions from a cell to its neighbors. The first four
/// variants are the cardinals.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
}

impl Direction {
    /// The four cardinal directions, in clockwise order starting at north
    pub const CARDINALS: [Direction; 4] =
        [Self::North, Self::East, Self::South, Self::West];

    /// Unit offset for one step in this direction
    pub fn vector(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::East => (1, 0),
            Self::South => (0, -1),
            Self::West => (-1, 0),
            Self::NorthEast => (1, 1),
            Self::SouthEast => (1, -1),
            Self::SouthWest => (-1, -1),
            Self::NorthWest => (-1, 1),
        }
    }

    pub fn is_cardinal(self) -> bool {
        matches!(self, Self::North | Self::East | Self::South | Self::West)
    }

    /// Iterate over all 8 directions
    pub fn all() -> impl Iterator<Item = Direction> {
        Self::iter()
    }
}

/// Orientation of a placed module. Modules can only be rotated in 90° steps,
/// clockwise when viewed from above. `North` is the module's authored
/// orientation, i.e. no rotation.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    North,
    East,
    South,
    West,
}

impl Rotation {
    /// Number of clockwise quarter turns this rotation represents
    pub fn quarter_turns(self) -> u8 {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    /// Inverse of [Self::quarter_turns]. Wraps around every four turns.
    pub fn from_quarter_turns(turns: u8) -> Self {
        match turns % 4 {
            0 => Self::North,
            1 => Self::East,
            2 => Self::South,
            _ => Self::West,
        }
    }

    /// Clockwise yaw of this rotation, in degrees
    pub fn yaw_degrees(self) -> f64 {
        self.quarter_turns() as f64 * 90.0
    }

    /// The rotation that undoes this one
    pub fn inverse(self) -> Self {
        Self::from_quarter_turns(4 - self.quarter_turns())
    }

    /// Does this rotation swap a footprint's width and height?
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::East | Self::West)
    }

    /// The grid direction this rotation faces
    pub fn direction(self) -> Direction {
        Direction::CARDINALS[self.quarter_turns() as usize]
    }

    /// Rotate an integer offset within an unrotated `width x height` box.
    /// The output is the same offset's position within the rotated box.
    ///
    /// - East: `(h-1-y, x)`
    /// - South: `(w-1-x, h-1-y)`
    /// - West: `(y, w-1-x)`
    pub fn rotate_offset(
        self,
        (x, y): (u32, u32),
        width: u32,
        height: u32,
    ) -> (u32, u32) {
        match self {
            Self::North => (x, y),
            Self::East => (height - 1 - y, x),
            Self::South => (width - 1 - x, height - 1 - y),
            Self::West => (y, width - 1 - x),
        }
    }

    /// All four rotations, starting at north
    pub fn all() -> impl Iterator<Item = Rotation> {
        Self::iter()
    }
}

/// Size of a module in cells, before rotation
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u16,
    pub height: u16,
}

impl Footprint {
    /// A single-cell footprint
    pub const UNIT: Self = Self::new(1, 1);

    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Width and height after applying a rotation
    pub fn rotated(self, rotation: Rotation) -> (u16, u16) {
        if rotation.swaps_axes() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Larger of the two dimensions
    pub fn max_dimension(self) -> u16 {
        self.width.max(self.height)
    }

    /// Number of cells this footprint covers
    pub fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Every position covered by this footprint when placed at `origin` with
    /// the given rotation. The origin is always yielded first.
    pub fn cells(
        self,
        origin: GridPoint,
        rotation: Rotation,
    ) -> impl Iterator<Item = GridPoint> {
        let (w, h) = self.rotated(rotation);
        (0..h as i32).flat_map(move |dy| {
            (0..w as i32).map(move |dx| origin.offset(dx, dy))
        })
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Positions from `start` (exclusive) stepping outward in one direction, up to
/// and including `max_distance` steps. Ends early if a step would leave the
/// `i32` coordinate space.
pub fn ray(
    start: GridPoint,
    direction: Direction,
    max_distance: u32,
) -> impl Iterator<Item = GridPoint> {
    let mut distance = 0;
    iter::from_fn(move || {
        if distance >= max_distance {
            return None;
        }
        distance += 1;
        start.step(direction, distance)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_inverse() {
        for rotation in Rotation::all() {
            let turns =
                rotation.quarter_turns() + rotation.inverse().quarter_turns();
            assert_eq!(turns % 4, 0, "{rotation:?}");
        }
        assert_eq!(Rotation::East.inverse(), Rotation::West);
        assert_eq!(Rotation::South.inverse(), Rotation::South);
    }

    #[test]
    fn test_rotate_offset() {
        // 3 wide, 2 tall
        assert_eq!(Rotation::North.rotate_offset((2, 1), 3, 2), (2, 1));
        assert_eq!(Rotation::East.rotate_offset((2, 1), 3, 2), (0, 2));
        assert_eq!(Rotation::South.rotate_offset((2, 1), 3, 2), (0, 0));
        assert_eq!(Rotation::West.rotate_offset((2, 1), 3, 2), (1, 0));

        // Every rotated offset has to land inside the rotated box
        let footprint = Footprint::new(3, 2);
        for rotation in Rotation::all() {
            let (w, h) = footprint.rotated(rotation);
            for x in 0..3 {
                for y in 0..2 {
                    let (rx, ry) = rotation.rotate_offset((x, y), 3, 2);
                    assert!(rx < w as u32 && ry < h as u32, "{rotation:?}");
                }
            }
        }
    }

    #[test]
    fn test_footprint_cells() {
        let footprint = Footprint::new(2, 1);
        let origin = GridPoint::new(4, 4);
        assert_eq!(
            footprint.cells(origin, Rotation::North).collect::<Vec<_>>(),
            vec![GridPoint::new(4, 4), GridPoint::new(5, 4)]
        );
        assert_eq!(
            footprint.cells(origin, Rotation::West).collect::<Vec<_>>(),
            vec![GridPoint::new(4, 4), GridPoint::new(4, 5)]
        );
    }

    #[test]
    fn test_ray() {
        let points: Vec<_> =
            ray(GridPoint::ORIGIN, Direction::SouthEast, 3).collect();
        assert_eq!(
            points,
            vec![
                GridPoint::new(1, -1),
                GridPoint::new(2, -2),
                GridPoint::new(3, -3)
            ]
        );
        assert_eq!(ray(GridPoint::ORIGIN, Direction::North, 0).count(), 0);
        // Stops at the edge of the coordinate space
        let edge = GridPoint::new(i32::MAX - 1, 0);
        assert_eq!(ray(edge, Direction::East, u32::MAX).count(), 1);
    }

    #[test]
    fn test_step_huge_distance() {
        let point = GridPoint::new(1, 1);
        assert_eq!(
            point.step(Direction::NorthEast, 2),
            Some(GridPoint::new(3, 3))
        );
        // Far, but still representable
        assert_eq!(
            point.step(Direction::West, i32::MAX as u32),
            Some(GridPoint::new(1 - i32::MAX, 1))
        );
        for direction in Direction::all() {
            assert_eq!(point.step(direction, u32::MAX), None, "{direction:?}");
        }
    }
}
