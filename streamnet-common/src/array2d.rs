use crate::error::{Error, Result};
use std::ops::{AddAssign, Index, IndexMut, SubAssign};

/// A simple in-memory 2-D grid that is not connected to a file.
///
/// Pixel values can be any `Copy` type; `increment`/`decrement` additionally
/// require `AddAssign`/`SubAssign`. Out-of-bounds reads return the grid's
/// `nodata` sentinel rather than panicking, matching the raster's own edge
/// behavior.
#[derive(Clone, Debug)]
pub struct Array2D<T: Copy> {
    pub rows: isize,
    pub columns: isize,
    data: Vec<T>,
    nodata: T,
}

impl<T> Array2D<T>
where
    T: Copy,
{
    pub fn new(rows: isize, columns: isize, initial_value: T, nodata: T) -> Result<Array2D<T>> {
        if rows < 0 || columns < 0 {
            return Err(Error::shape(
                "Array2D rows and columns must be non-negative",
            ));
        }
        Ok(Array2D {
            rows,
            columns,
            nodata,
            data: vec![initial_value; (rows * columns) as usize],
        })
    }

    pub fn get_value(&self, row: isize, column: isize) -> T {
        if row < 0 || column < 0 || row >= self.rows || column >= self.columns {
            return self.nodata;
        }
        self.data[(row * self.columns + column) as usize]
    }

    pub fn set_value(&mut self, row: isize, column: isize, value: T) {
        if row >= 0 && column >= 0 && row < self.rows && column < self.columns {
            self.data[(row * self.columns + column) as usize] = value;
        }
    }

    pub fn set_row_data(&mut self, row: isize, values: &[T]) {
        if row < 0 || row >= self.rows {
            return;
        }
        let n = values.len().min(self.columns as usize);
        let base = (row * self.columns) as usize;
        self.data[base..base + n].copy_from_slice(&values[..n]);
    }

    pub fn reinitialize_values(&mut self, value: T) {
        self.data = vec![value; (self.rows * self.columns) as usize];
    }

    pub fn nodata(&self) -> T {
        self.nodata
    }

    pub fn rows(&self) -> isize {
        self.rows
    }

    pub fn columns(&self) -> isize {
        self.columns
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T> Array2D<T>
where
    T: Copy + AddAssign + SubAssign,
{
    pub fn increment(&mut self, row: isize, column: isize, value: T) {
        if row >= 0 && column >= 0 && row < self.rows && column < self.columns {
            self.data[(row * self.columns + column) as usize] += value;
        }
    }

    pub fn decrement(&mut self, row: isize, column: isize, value: T) {
        if row >= 0 && column >= 0 && row < self.rows && column < self.columns {
            self.data[(row * self.columns + column) as usize] -= value;
        }
    }
}

impl<T: Copy> Index<(isize, isize)> for Array2D<T> {
    type Output = T;

    fn index(&self, index: (isize, isize)) -> &T {
        let (row, column) = index;
        if row < 0 || column < 0 || row >= self.rows || column >= self.columns {
            return &self.nodata;
        }
        &self.data[(row * self.columns + column) as usize]
    }
}

impl<T: Copy> IndexMut<(isize, isize)> for Array2D<T> {
    fn index_mut(&mut self, index: (isize, isize)) -> &mut T {
        let (row, column) = index;
        assert!(
            row >= 0 && column >= 0 && row < self.rows && column < self.columns,
            "Array2D index out of bounds: ({row}, {column})"
        );
        &mut self.data[(row * self.columns + column) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_reads_return_nodata() {
        let grid: Array2D<f64> = Array2D::new(3, 3, 0.0, -1.0).unwrap();
        assert_eq!(grid.get_value(-1, 0), -1.0);
        assert_eq!(grid.get_value(0, 5), -1.0);
    }

    #[test]
    fn increment_and_decrement_round_trip() {
        let mut grid: Array2D<f64> = Array2D::new(2, 2, 0.0, -1.0).unwrap();
        grid.increment(0, 0, 3.0);
        grid.decrement(0, 0, 1.0);
        assert_eq!(grid.get_value(0, 0), 2.0);
    }

    #[test]
    fn negative_shape_is_rejected() {
        let result: Result<Array2D<f64>> = Array2D::new(-1, 3, 0.0, -1.0);
        assert!(result.is_err());
    }
}
