//! Rotation of terrain arrays and positions by one of the four cardinal
//! [Rotation]s. Sample `(x, y)` of a `w x h` array moves to:
//!
//! - North: `(x, y)`
//! - East: `(h-1-y, x)`
//! - South: `(w-1-x, h-1-y)`
//! - West: `(y, w-1-x)`
//!
//! This is the same mapping as [Rotation::rotate_offset], which means a
//! module's cells and the samples inside those cells always rotate together.

use crate::{config::ExecutionStrategy, grid::Rotation, terrain::Array2};
use rayon::prelude::*;

/// Rotate a 2D array. Every output element is computed independently from the
/// read-only input, so the parallel strategy just splits the output by rows.
pub fn rotate_array<T: Copy + Send + Sync>(
    source: &Array2<T>,
    rotation: Rotation,
    strategy: ExecutionStrategy,
) -> Array2<T> {
    let (w, h) = source.dimensions();
    if rotation == Rotation::North || w == 0 || h == 0 {
        return source.clone();
    }
    let (out_w, out_h) = if rotation.swaps_axes() { (h, w) } else { (w, h) };

    // Map an output position back to the input position it's copied from
    let source_index = move |dx: usize, dy: usize| -> usize {
        let (x, y) = match rotation {
            Rotation::North => (dx, dy),
            Rotation::East => (dy, h - 1 - dx),
            Rotation::South => (w - 1 - dx, h - 1 - dy),
            Rotation::West => (w - 1 - dy, dx),
        };
        y * w + x
    };

    let input = source.data();
    // Every slot gets overwritten below, the fill value is irrelevant
    let mut rotated = Array2::filled(out_w, out_h, input[0]);
    let output = rotated.data_mut();

    let fill_row = |(dy, row): (usize, &mut [T])| {
        for (dx, slot) in row.iter_mut().enumerate() {
            *slot = input[source_index(dx, dy)];
        }
    };
    match strategy {
        ExecutionStrategy::Parallel => {
            output.par_chunks_mut(out_w).enumerate().for_each(fill_row)
        }
        ExecutionStrategy::Sequential => {
            output.chunks_mut(out_w).enumerate().for_each(fill_row)
        }
    }
    rotated
}

/// Rotate a normalized position (both components in `[0, 1]`) within a unit
/// square. This is the continuous version of [rotate_array].
pub fn rotate_normalized(position: [f32; 2], rotation: Rotation) -> [f32; 2] {
    let [x, y] = position;
    match rotation {
        Rotation::North => [x, y],
        Rotation::East => [1.0 - y, x],
        Rotation::South => [1.0 - x, 1.0 - y],
        Rotation::West => [y, 1.0 - x],
    }
}
