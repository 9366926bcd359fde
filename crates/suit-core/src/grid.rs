use serde::{Deserialize, Serialize};

/// A 2D single-band grid of f32 cell values, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Row-major cell values, `rows * cols` long.
    pub data: Vec<f32>,
    pub rows: usize,
    pub cols: usize,
}

impl Grid {
    /// Create a new Grid filled with the given value.
    pub fn new(rows: usize, cols: usize, fill: f32) -> Self {
        Self {
            data: vec![fill; rows * cols],
            rows,
            cols,
        }
    }

    /// Create a zero-filled Grid.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(rows, cols, 0.0)
    }

    /// Wrap existing row-major data. Returns None if the length does not match.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Option<Self> {
        if data.len() != rows * cols {
            return None;
        }
        Some(Self { data, rows, cols })
    }

    /// Build a Grid from nested rows. Returns None for ragged input.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Option<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return None;
            }
            data.extend_from_slice(row);
        }
        Some(Self { data, rows: rows.len(), cols })
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.cols + col] = val;
    }

    /// Size of the cell buffer in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Smallest finite value, or None if no cell is finite.
    pub fn min_value(&self) -> Option<f32> {
        self.data.iter().copied().filter(|v| v.is_finite()).reduce(f32::min)
    }

    /// Largest finite value, or None if no cell is finite.
    pub fn max_value(&self) -> Option<f32> {
        self.data.iter().copied().filter(|v| v.is_finite()).reduce(f32::max)
    }
}
