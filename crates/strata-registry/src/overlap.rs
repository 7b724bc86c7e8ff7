//! Border overlap geometry.
//!
//! An entity close to an edge of its owning chunk is also visible from the
//! chunk on the other side of that edge. Each of the 4 edges and 4 corners is
//! tested on its own, so an entity in a corner band overlaps into up to three
//! neighbors (two edges plus the diagonal).

use crate::chunk_id::ChunkId;

/// Which margin bands a chunk-local position falls into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BorderBands {
    /// Within the margin of the low-X edge.
    pub west: bool,
    /// Within the margin of the high-X edge.
    pub east: bool,
    /// Within the margin of the low-Z edge.
    pub north: bool,
    /// Within the margin of the high-Z edge.
    pub south: bool,
}

impl BorderBands {
    /// Classifies a chunk-local `(x, z)` position. Bounds are strict.
    pub fn classify(local_x: f64, local_z: f64, chunk_size: f64, margin: f64) -> Self {
        Self {
            west: local_x < margin,
            east: local_x > chunk_size - margin,
            north: local_z < margin,
            south: local_z > chunk_size - margin,
        }
    }

    /// Neighbor offsets selected by these bands: edges first, then corners.
    pub fn offsets(self) -> Vec<(i32, i32)> {
        let tests = [
            (self.west, (-1, 0)),
            (self.east, (1, 0)),
            (self.north, (0, -1)),
            (self.south, (0, 1)),
            (self.west && self.north, (-1, -1)),
            (self.east && self.north, (1, -1)),
            (self.west && self.south, (-1, 1)),
            (self.east && self.south, (1, 1)),
        ];
        tests
            .into_iter()
            .filter_map(|(hit, offset)| hit.then_some(offset))
            .collect()
    }
}

/// Neighbors of `owner` that should see an entity at world `position`.
pub fn border_neighbors(
    owner: ChunkId,
    position: &[f64; 3],
    chunk_size: f64,
    margin: f64,
) -> Vec<ChunkId> {
    let (origin_x, origin_z) = owner.origin(chunk_size);
    let bands = BorderBands::classify(
        position[0] - origin_x,
        position[2] - origin_z,
        chunk_size,
        margin,
    );
    bands
        .offsets()
        .into_iter()
        .map(|(dx, dz)| owner.offset(dx, dz))
        .collect()
}
