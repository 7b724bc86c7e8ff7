//! Grid coordinates of a chunk and their canonical `"x,z"` form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChunkIdParseError;

/// Offsets of the 8 surrounding chunks: the 4 edge neighbors, then the 4 corners.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

/// Identifies a square chunk on the horizontal world grid.
///
/// Serialized in its canonical string form, e.g. `"-1,4"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ChunkId {
    /// Grid X coordinate.
    pub x: i32,
    /// Grid Z coordinate.
    pub z: i32,
}

impl ChunkId {
    /// Creates a chunk id from grid coordinates.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Returns the chunk offset by `(dx, dz)` grid cells.
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// The 8 surrounding chunks in [`NEIGHBOR_OFFSETS`] order.
    pub fn neighbors(self) -> [ChunkId; 8] {
        NEIGHBOR_OFFSETS.map(|(dx, dz)| self.offset(dx, dz))
    }

    /// Whether `other` is one of the 8 surrounding chunks.
    pub fn is_adjacent(self, other: ChunkId) -> bool {
        let dx = (i64::from(self.x) - i64::from(other.x)).abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).abs();
        dx.max(dz) == 1
    }

    /// World-space `(x, z)` of the chunk's minimum corner.
    pub fn origin(self, chunk_size: f64) -> (f64, f64) {
        (f64::from(self.x) * chunk_size, f64::from(self.z) * chunk_size)
    }

    /// The chunk containing a world-space position (`[x, y, z]`, y is height).
    ///
    /// Uses floor division so negative coordinates land in negative chunks.
    pub fn from_world_position(position: &[f64; 3], chunk_size: f64) -> Self {
        Self {
            x: (position[0] / chunk_size).floor() as i32,
            z: (position[2] / chunk_size).floor() as i32,
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

impl FromStr for ChunkId {
    type Err = ChunkIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, z) = s
            .split_once(',')
            .ok_or_else(|| ChunkIdParseError::MissingSeparator(s.to_string()))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|_| ChunkIdParseError::InvalidCoordinate(s.to_string()))
        };
        Ok(Self::new(parse(x)?, parse(z)?))
    }
}

impl From<ChunkId> for String {
    fn from(id: ChunkId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ChunkId {
    type Error = ChunkIdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
