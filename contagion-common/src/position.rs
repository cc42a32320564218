use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one grid/world held by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct WorldId(pub u32);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world#{}", self.0)
    }
}

const NEIGHBOR_STEPS: [(i32, i32, i32); 6] = [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0), (0, 0, 1), (0, 0, -1)];

/// Integer cell coordinates within a world. Equality and hashing are structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub world: WorldId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    #[inline(always)]
    pub fn new(world: WorldId, x: i32, y: i32, z: i32) -> Self {
        Self { world, x, y, z }
    }

    /// The cell shifted by `(dx, dy, dz)`, or `None` past the coordinate range.
    #[inline(always)]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        Some(Self::new(
            self.world,
            self.x.checked_add(dx)?,
            self.y.checked_add(dy)?,
            self.z.checked_add(dz)?,
        ))
    }

    /// The axis-aligned neighbours in the order +x, -x, +y, -y, +z, -z.
    /// Neighbours past the coordinate range are left out.
    #[inline]
    pub fn neighbors6(self) -> impl Iterator<Item = Position> {
        NEIGHBOR_STEPS
            .into_iter()
            .filter_map(move |(dx, dy, dz)| self.offset(dx, dy, dz))
    }

    #[inline(always)]
    pub fn above(self) -> Option<Self> {
        self.offset(0, 1, 0)
    }

    #[inline(always)]
    pub fn below(self) -> Option<Self> {
        self.offset(0, -1, 0)
    }

    /// Squared Euclidean distance, saturating at `i64::MAX`; positions in different
    /// worlds are never close.
    pub fn distance_squared(self, other: Position) -> Option<i64> {
        if self.world != other.world {
            return None;
        }
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        let dz = self.z as i64 - other.z as i64;
        Some(dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy)).saturating_add(dz.saturating_mul(dz)))
    }

    /// Column chunk coordinates (16x16 columns), as used for region loading.
    #[inline(always)]
    pub fn chunk(self) -> (i32, i32) {
        (self.x >> 4, self.z >> 4)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:({}, {}, {})", self.world, self.x, self.y, self.z)
    }
}

/// Lazily enumerates the discrete sphere `dx² + dy² + dz² <= radius²` around `center`.
/// Cells past the coordinate range are skipped.
pub fn sphere(center: Position, radius: u32) -> impl Iterator<Item = Position> {
    let r = radius.min(i32::MAX as u32) as i32;
    let r2 = (r as i64) * (r as i64);
    (-r..=r).flat_map(move |dx| {
        (-r..=r).flat_map(move |dy| {
            (-r..=r).filter_map(move |dz| {
                let d2 = (dx as i64).pow(2) + (dy as i64).pow(2) + (dz as i64).pow(2);
                if d2 <= r2 { center.offset(dx, dy, dz) } else { None }
            })
        })
    })
}
