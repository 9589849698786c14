//! D8 flow-direction kernel and directional walker.
//!
//! Codes 1..8 proceed clockwise from east (1=E, 2=SE, 3=S, 4=SW, 5=W, 6=NW,
//! 7=N, 8=NE); 0 is NoData. This is the opposite indexing convention from
//! `d8_flow_accum.rs`'s internal 0-7 scheme (see its `dx`/`dy` arrays) —
//! everything in this crate speaks the same 1-8 convention at every
//! boundary, with a single offset table rather than separate Whitebox/ESRI
//! pointer-remap tables.

use streamnet_common::{Array2D, Error, Result};
use streamnet_raster::Raster;

/// (Δrow, Δcol) for each D8 code, indexed by `code - 1`.
const ROW_OFFSET: [isize; 8] = [0, 1, 1, 1, 0, -1, -1, -1];
const COL_OFFSET: [isize; 8] = [1, 1, 0, -1, -1, -1, 0, 1];

/// Maps a D8 code (1..=8) to its (Δrow, Δcol) step. Returns `None` for 0
/// (NoData) or any code outside 0..=8.
pub fn offset(code: u8) -> Option<(isize, isize)> {
    if (1..=8).contains(&code) {
        let i = (code - 1) as usize;
        Some((ROW_OFFSET[i], COL_OFFSET[i]))
    } else {
        None
    }
}

/// True for diagonal codes (2, 4, 6, 8), which travel the pixel diagonal;
/// false for lateral codes (1, 3, 5, 7).
pub fn is_diagonal(code: u8) -> bool {
    code % 2 == 0
}

pub fn is_valid_code(code: u8) -> bool {
    code <= 8
}

/// Travel length for one step in `code`'s direction, given the raster's X
/// and Y resolutions. Lateral E/W codes use `res_x`, lateral N/S codes use
/// `res_y`, and diagonal codes use the pixel diagonal.
pub fn step_length(code: u8, res_x: f64, res_y: f64) -> Option<f64> {
    match code {
        1 | 5 => Some(res_x),
        3 | 7 => Some(res_y),
        2 | 4 | 6 | 8 => Some((res_x * res_x + res_y * res_y).sqrt()),
        _ => None,
    }
}

/// Wraps an arbitrary integer into the 1..=8 D8 code range.
fn wrap8(x: isize) -> u8 {
    (((x - 1).rem_euclid(8)) + 1) as u8
}

/// The two directions perpendicular to `code`: `(clockwise,
/// counterclockwise)`, per this crate's D8 convention.
pub fn perpendicular(code: u8) -> (u8, u8) {
    (wrap8(code as isize - 2), wrap8(code as isize + 2))
}

/// Reads a `Raster`'s values as D8 codes, failing with `InvalidFlowField`
/// if any pixel holds a value outside 0..=8. Every other component in this
/// crate operates on the plain `Array2D<u8>` grid this produces rather than
/// on `Raster` directly, matching the accumulator's and basin labeller's
/// grounding in `d8_flow_accum.rs`/`basins.rs`, which work off raw integer
/// grids rather than a georeferenced wrapper.
pub fn flow_grid(flow: &Raster) -> Result<Array2D<u8>> {
    let rows = flow.rows() as isize;
    let columns = flow.columns() as isize;
    let mut grid: Array2D<u8> = Array2D::new(rows, columns, 0, 0)?;
    for row in 0..rows {
        for col in 0..columns {
            let v = flow.get(row, col);
            if flow.is_nodata(v) {
                continue;
            }
            if v < 0.0 || v > 8.0 || v.fract() != 0.0 {
                return Err(Error::invalid_flow_field(format!(
                    "flow raster has a non-D8 value {v} at ({row}, {col})"
                )));
            }
            grid.set_value(row, col, v as u8);
        }
    }
    Ok(grid)
}

/// A focal-statistics helper that locates the raster pixels needed for
/// irregular, direction-dependent neighborhoods (used by confinement
/// angles). Grounded on `dfha/segments.py`'s `_Kernel`: a small immutable
/// value describing the raster bounds and neighborhood size, with no
/// notion of a "current cell" baked into the type (each call takes the
/// processing pixel explicitly, unlike the Python original's mutable
/// `update()` method).
#[derive(Clone, Copy, Debug)]
pub struct Kernel {
    pub neighborhood: isize,
    pub rows: isize,
    pub cols: isize,
}

impl Kernel {
    pub fn new(neighborhood: isize, rows: isize, cols: isize) -> Self {
        Kernel {
            neighborhood,
            rows,
            cols,
        }
    }

    fn axis_indices(&self, index: isize, max: isize, before: bool) -> Vec<isize> {
        if before {
            let start = (index - self.neighborhood).max(0);
            (start..index).collect()
        } else {
            let start = index + 1;
            let stop = (index + self.neighborhood + 1).min(max);
            if stop > start {
                (start..stop).collect()
            } else {
                Vec::new()
            }
        }
    }

    fn limit(n: usize, indices: &[isize], before: bool) -> Vec<isize> {
        if before {
            indices[indices.len().saturating_sub(n)..].to_vec()
        } else {
            indices[..n.min(indices.len())].to_vec()
        }
    }

    fn lateral_row(&self, row: isize, col: isize, before: bool) -> Vec<(isize, isize)> {
        self.axis_indices(row, self.rows, before)
            .into_iter()
            .map(|r| (r, col))
            .collect()
    }

    fn lateral_col(&self, row: isize, col: isize, before: bool) -> Vec<(isize, isize)> {
        self.axis_indices(col, self.cols, before)
            .into_iter()
            .map(|c| (row, c))
            .collect()
    }

    fn diagonal(
        &self,
        row: isize,
        col: isize,
        before_rows: bool,
        before_cols: bool,
    ) -> Vec<(isize, isize)> {
        let rows = self.axis_indices(row, self.rows, before_rows);
        let cols = self.axis_indices(col, self.cols, before_cols);
        let n = rows.len().min(cols.len());
        let rows = Self::limit(n, &rows, before_rows);
        let cols = Self::limit(n, &cols, before_cols);
        rows.into_iter().zip(cols).collect()
    }

    /// Returns up to `neighborhood` in-bounds pixel indices walking away
    /// from `(row, col)` along `code`, nearest-first.
    pub fn walk(&self, row: isize, col: isize, code: u8) -> Vec<(isize, isize)> {
        match code {
            1 => self.lateral_col(row, col, false),
            5 => self.lateral_col(row, col, true),
            3 => self.lateral_row(row, col, false),
            7 => self.lateral_row(row, col, true),
            2 => self.diagonal(row, col, false, false),
            4 => self.diagonal(row, col, false, true),
            6 => self.diagonal(row, col, true, true),
            8 => self.diagonal(row, col, true, false),
            _ => Vec::new(),
        }
    }
}
