use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// A dense, row-major 2D array. Row `y` of the array starts at index
/// `y * width` of the flat buffer. Used for every terrain layer (heights,
/// splat alphas, detail densities).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawArray2<T>")]
pub struct Array2<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

/// Unchecked serialized form of [Array2], validated on the way in
#[derive(Deserialize)]
struct RawArray2<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T> TryFrom<RawArray2<T>> for Array2<T> {
    type Error = anyhow::Error;

    fn try_from(raw: RawArray2<T>) -> Result<Self, Self::Error> {
        Self::from_vec(raw.width, raw.height, raw.data)
    }
}

impl<T: Clone> Array2<T> {
    /// Create an array with every element set to `value`
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Build an array from a list of rows. Every row must be the same length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> anyhow::Result<Self> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        ensure!(
            rows.iter().all(|row| row.len() == width),
            "all rows must have length {}",
            width
        );
        Ok(Self {
            width,
            height,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Copy all of `source` into this array, with the source's `(0, 0)`
    /// landing at `(x, y)`. Elements that would fall outside of this array are
    /// dropped. Elements of this array outside the destination rectangle are
    /// left untouched.
    pub fn blit(&mut self, source: &Array2<T>, x: usize, y: usize) {
        if x >= self.width || y >= self.height {
            return;
        }
        let copy_width = source.width.min(self.width - x);
        let copy_height = source.height.min(self.height - y);
        for row in 0..copy_height {
            let src_start = row * source.width;
            let dst_start = (y + row) * self.width + x;
            self.data[dst_start..dst_start + copy_width].clone_from_slice(
                &source.data[src_start..src_start + copy_width],
            );
        }
    }

    /// Copy of this array with the row order reversed, i.e. mirrored across
    /// the horizontal axis
    pub fn flip_rows(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.rows().rev().flatten().cloned().collect(),
        }
    }
}

impl<T> Array2<T> {
    /// Wrap a flat row-major buffer. Fails if the buffer length doesn't match
    /// the dimensions.
    pub fn from_vec(
        width: usize,
        height: usize,
        data: Vec<T>,
    ) -> anyhow::Result<Self> {
        ensure!(
            data.len() == width * height,
            "expected {}x{} = {} elements, got {}",
            width,
            height,
            width * height,
            data.len()
        );
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// The flat row-major buffer
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Flat index of `(x, y)`, or `None` if out of bounds
    pub fn index_of(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        self.index_of(x, y).map(|i| &self.data[i])
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        self.index_of(x, y).map(move |i| &mut self.data[i])
    }

    /// Iterate over rows, bottom (`y = 0`) first
    pub fn rows(&self) -> impl DoubleEndedIterator<Item = &[T]> {
        // chunks() panics on 0
        self.data.chunks(self.width.max(1))
    }
}
