use crate::bbox::BoundingBox;
use crate::crs::{Crs, CrsEngine};
use crate::transform::Transform;
use streamnet_common::error::{Error, Result};
use streamnet_common::Array2D;

/// The logical element type a raster's pixels represent. Values are always
/// stored internally as `f64` (matching `whitebox_raster::Raster`, which
/// stores `f64` regardless of the on-disk dtype); `DataType` only records
/// how NoData casting and `isbool` validation should behave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Bool,
    I32,
    U32,
    F32,
    F64,
}

/// NoData-casting rule, mirroring numpy's `casting` keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Casting {
    No,
    Equiv,
    Safe,
    SameKind,
    Unsafe,
}

impl Casting {
    /// Whether `value` may be used as the NoData sentinel for `dtype`
    /// under this rule.
    pub fn allows(&self, value: f64, dtype: DataType) -> bool {
        match self {
            Casting::Unsafe => true,
            _ => match dtype {
                DataType::F64 | DataType::F32 => true,
                DataType::Bool => value == 0.0 || value == 1.0,
                DataType::I32 => value.fract() == 0.0 && (i32::MIN as f64..=i32::MAX as f64).contains(&value),
                DataType::U32 => value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value),
            },
        }
    }
}

/// Default NoData sentinel for a dtype when `ensure_nodata` is requested
/// but no sentinel was supplied.
pub fn default_nodata(dtype: DataType) -> f64 {
    match dtype {
        DataType::F32 | DataType::F64 => f64::NAN,
        DataType::Bool => 0.0,
        DataType::I32 => i32::MIN as f64,
        DataType::U32 => 0.0,
    }
}

fn nodata_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// An immutable view over a 2-D numeric grid plus spatial metadata: an
/// optional affine transform, an optional CRS, and an optional NoData
/// sentinel. Grounded on `whitebox_raster::Raster`/`RasterConfigs`, trimmed
/// to the metadata this crate's value type actually names — display
/// stretch, palette, and on-disk codec bookkeeping are a file-I/O concern
/// external to this value type.
#[derive(Clone, Debug)]
pub struct Raster {
    data: Array2D<f64>,
    pub data_type: DataType,
    pub nodata: Option<f64>,
    pub transform: Option<Transform>,
    pub crs: Option<Crs>,
}

impl Raster {
    /// Wraps an in-memory array of values. `transform` and `bounds` are
    /// mutually exclusive; if both are `None` the raster has no spatial
    /// placement at all.
    #[allow(clippy::too_many_arguments)]
    pub fn from_array(
        rows: usize,
        columns: usize,
        values: Vec<f64>,
        dtype: DataType,
        crs: Option<Crs>,
        transform: Option<Transform>,
        bounds: Option<BoundingBox>,
        nodata: Option<f64>,
        casting: Casting,
        isbool: bool,
        ensure_nodata: bool,
    ) -> Result<Raster> {
        if transform.is_some() && bounds.is_some() {
            return Err(Error::value(
                "transform and bounds are mutually exclusive",
            ));
        }
        if values.len() != rows * columns {
            return Err(Error::shape(format!(
                "expected {} values for a {}x{} raster, got {}",
                rows * columns,
                rows,
                columns,
                values.len()
            )));
        }

        let resolved_transform = match (transform, bounds) {
            (Some(t), None) => Some(t),
            (None, Some(b)) => Some(b.transform(rows, columns)),
            (None, None) => None,
            (Some(_), Some(_)) => unreachable!("checked above"),
        };

        if let (Some(t), Some(c)) = (resolved_transform, crs) {
            if let Some(tc) = t.crs {
                if tc != c {
                    return Err(Error::RasterCrs(
                        "transform's CRS disagrees with the raster's CRS".into(),
                    ));
                }
            }
        }

        let nodata = match (nodata, ensure_nodata) {
            (Some(v), _) => {
                if !casting.allows(v, dtype) {
                    return Err(Error::Type(format!(
                        "NoData value {v} cannot be cast to {dtype:?} under {casting:?} casting"
                    )));
                }
                Some(v)
            }
            (None, true) => Some(default_nodata(dtype)),
            (None, false) => None,
        };

        if isbool {
            let bad = values.iter().any(|&v| {
                v != 0.0 && v != 1.0 && !nodata.is_some_and(|nd| nodata_eq(v, nd))
            });
            if bad {
                return Err(Error::value(
                    "boolean raster values must be 0, 1, or NoData",
                ));
            }
        }

        let array_nodata = nodata.unwrap_or(f64::NAN);
        let mut grid = Array2D::new(rows as isize, columns as isize, 0.0, array_nodata)?;
        for (i, v) in values.into_iter().enumerate() {
            let r = (i / columns) as isize;
            let c = (i % columns) as isize;
            grid.set_value(r, c, v);
        }

        Ok(Raster {
            data: grid,
            data_type: dtype,
            nodata,
            transform: resolved_transform,
            crs,
        })
    }

    pub fn rows(&self) -> usize {
        self.data.rows() as usize
    }

    pub fn columns(&self) -> usize {
        self.data.columns() as usize
    }

    pub fn get(&self, row: isize, col: isize) -> f64 {
        self.data.get_value(row, col)
    }

    pub fn set(&mut self, row: isize, col: isize, value: f64) {
        self.data.set_value(row, col, value);
    }

    pub fn is_nodata(&self, value: f64) -> bool {
        match self.nodata {
            Some(nd) => nodata_eq(value, nd),
            None => false,
        }
    }

    pub fn data(&self) -> &Array2D<f64> {
        &self.data
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        self.transform
            .map(|t| t.bounds(self.rows(), self.columns()))
    }

    pub fn resolution(&self) -> Option<(f64, f64)> {
        self.transform.map(|t| t.resolution())
    }

    pub fn pixel_area(&self) -> Option<f64> {
        self.transform.map(|t| t.pixel_area())
    }

    pub fn pixel_diagonal(&self) -> Option<f64> {
        self.transform.map(|t| t.pixel_diagonal())
    }

    pub fn center(&self) -> Option<(f64, f64)> {
        self.bounds().map(|b| b.center())
    }

    pub fn orientation(&self) -> Option<u8> {
        self.transform.map(|t| t.orientation())
    }

    /// Converts pixel (row, col) to the CRS coordinate of its center.
    pub fn pixel_center(&self, row: isize, col: isize) -> Option<(f64, f64)> {
        let t = self.transform?;
        Some((
            t.left + (col as f64 + 0.5) * t.dx,
            t.top + (row as f64 + 0.5) * t.dy,
        ))
    }

    /// Sets previously-unset CRS/transform/NoData fields. Never mutates
    /// pixel values.
    pub fn override_metadata(
        &mut self,
        crs: Option<Crs>,
        transform: Option<Transform>,
        nodata: Option<f64>,
    ) {
        if self.crs.is_none() {
            self.crs = crs;
        }
        if self.transform.is_none() {
            self.transform = transform;
        }
        if self.nodata.is_none() {
            if let Some(nd) = nodata {
                self.nodata = Some(nd);
            }
        }
    }

    /// Replaces NoData pixels with `value` and clears the sentinel.
    pub fn fill(&mut self, value: f64) {
        if let Some(nd) = self.nodata.take() {
            for row in 0..self.data.rows() {
                for col in 0..self.data.columns() {
                    if nodata_eq(self.data.get_value(row, col), nd) {
                        self.data.set_value(row, col, value);
                    }
                }
            }
        }
    }

    /// Clamps (or masks, if `fill` is given) values outside `[min, max]`.
    /// `exclusive` excludes the endpoints from the valid range.
    pub fn set_range(&mut self, min: Option<f64>, max: Option<f64>, fill: Option<f64>, exclusive: bool) {
        let nodata = self.nodata;
        for row in 0..self.data.rows() {
            for col in 0..self.data.columns() {
                let v = self.data.get_value(row, col);
                if let Some(nd) = nodata {
                    if nodata_eq(v, nd) {
                        continue;
                    }
                }
                let below = min.is_some_and(|m| if exclusive { v <= m } else { v < m });
                let above = max.is_some_and(|m| if exclusive { v >= m } else { v > m });
                if below || above {
                    let replacement = fill.unwrap_or(match (below, min, above, max) {
                        (true, Some(m), _, _) => m,
                        (_, _, true, Some(m)) => m,
                        _ => v,
                    });
                    self.data.set_value(row, col, replacement);
                }
            }
        }
    }

    /// Extracts a window defined by `bounds`, padding with NoData outside
    /// the source extent.
    pub fn clip(&self, bounds: BoundingBox) -> Result<Raster> {
        let t = self
            .transform
            .ok_or_else(|| Error::MissingTransform("clip requires a transform".into()))?;
        let nodata = self
            .nodata
            .ok_or_else(|| Error::MissingNoData("clip requires a NoData value to pad with".into()))?;

        let col_of = |x: f64| ((x - t.left) / t.dx).floor() as isize;
        let row_of = |y: f64| ((y - t.top) / t.dy).floor() as isize;

        let (c0, c1) = {
            let a = col_of(bounds.left);
            let b = col_of(bounds.right);
            (a.min(b), a.max(b))
        };
        let (r0, r1) = {
            let a = row_of(bounds.top);
            let b = row_of(bounds.bottom);
            (a.min(b), a.max(b))
        };
        let out_rows = (r1 - r0 + 1).max(0) as usize;
        let out_cols = (c1 - c0 + 1).max(0) as usize;
        if out_rows == 0 || out_cols == 0 {
            return Err(Error::shape("clip window does not overlap the raster"));
        }

        let mut values = vec![nodata; out_rows * out_cols];
        for (oi, row) in (r0..=r1).enumerate() {
            for (oj, col) in (c0..=c1).enumerate() {
                values[oi * out_cols + oj] = self.data.get_value(row, col);
            }
        }
        let new_left = t.left + c0 as f64 * t.dx;
        let new_top = t.top + r0 as f64 * t.dy;
        let new_transform = Transform::new(t.dx, t.dy, new_left, new_top).with_crs_opt(self.crs);

        Raster::from_array(
            out_rows,
            out_cols,
            values,
            self.data_type,
            self.crs,
            Some(new_transform),
            None,
            Some(nodata),
            Casting::Unsafe,
            false,
            false,
        )
    }

    /// Pads the raster with `pixels` rings of NoData on every edge.
    pub fn buffer(&self, pixels: usize) -> Result<Raster> {
        let nodata = self
            .nodata
            .ok_or_else(|| Error::MissingNoData("buffer requires a NoData value".into()))?;
        let out_rows = self.rows() + 2 * pixels;
        let out_cols = self.columns() + 2 * pixels;
        let mut values = vec![nodata; out_rows * out_cols];
        for row in 0..self.rows() {
            for col in 0..self.columns() {
                let oi = row + pixels;
                let oj = col + pixels;
                values[oi * out_cols + oj] = self.data.get_value(row as isize, col as isize);
            }
        }
        let transform = self.transform.map(|t| {
            Transform::new(
                t.dx,
                t.dy,
                t.left - pixels as f64 * t.dx,
                t.top - pixels as f64 * t.dy,
            )
            .with_crs_opt(self.crs)
        });
        Raster::from_array(
            out_rows,
            out_cols,
            values,
            self.data_type,
            self.crs,
            transform,
            None,
            Some(nodata),
            Casting::Unsafe,
            false,
            false,
        )
    }

    /// Aligned reprojection: orients the source bounds
    /// to the destination transform's quadrant, snaps each edge outward to
    /// a whole number of destination pixels, and resamples.
    pub fn reproject(
        &self,
        dest_transform: Transform,
        dest_crs: Option<Crs>,
        resampling: Resampling,
        engine: Option<&dyn CrsEngine>,
    ) -> Result<Raster> {
        let src_bounds = self
            .bounds()
            .ok_or_else(|| Error::MissingTransform("reproject requires a source transform".into()))?;

        let reprojected_bounds = match (self.crs, dest_crs, engine) {
            (Some(src_crs), Some(dst_crs), Some(engine)) if src_crs != dst_crs => {
                let xs = [src_bounds.left, src_bounds.right];
                let ys = [src_bounds.bottom, src_bounds.top];
                let (xs2, ys2) = engine.reproject(src_crs, dst_crs, &xs, &ys);
                BoundingBox::new(xs2[0], ys2[0], xs2[1], ys2[1]).with_crs(dst_crs)
            }
            _ => src_bounds,
        };

        let oriented = reprojected_bounds.oriented_to(&dest_transform);

        let left_dst = dest_transform.left
            + ((oriented.left - dest_transform.left) / dest_transform.dx).floor()
                * dest_transform.dx;
        let top_dst = dest_transform.top
            + ((oriented.top - dest_transform.top) / dest_transform.dy).floor()
                * dest_transform.dy;

        let width = (oriented.right - left_dst).abs();
        let height = (oriented.top.max(oriented.bottom) - oriented.top.min(oriented.bottom)).abs();
        let new_cols = (width / dest_transform.dx.abs()).ceil().max(1.0) as usize;
        let new_rows = (height / dest_transform.dy.abs()).ceil().max(1.0) as usize;

        const MAX_PIXELS: usize = 1_000_000_000;
        if new_rows.saturating_mul(new_cols) > MAX_PIXELS {
            return Err(Error::Memory(format!(
                "reprojected raster would require {new_rows}x{new_cols} pixels"
            )));
        }

        let new_transform =
            Transform::new(dest_transform.dx, dest_transform.dy, left_dst, top_dst)
                .with_crs_opt(dest_crs);
        let nodata = self.nodata.unwrap_or(f64::NAN);
        let mut values = vec![nodata; new_rows * new_cols];

        for row in 0..new_rows {
            for col in 0..new_cols {
                let x = left_dst + (col as f64 + 0.5) * new_transform.dx;
                let y = top_dst + (row as f64 + 0.5) * new_transform.dy;
                let src_t = self.transform.unwrap();
                let src_col = ((x - src_t.left) / src_t.dx).floor();
                let src_row = ((y - src_t.top) / src_t.dy).floor();
                let value = match resampling {
                    Resampling::Nearest => self.get(src_row.round() as isize, src_col.round() as isize),
                    _ => self.get(src_row as isize, src_col as isize),
                };
                values[row * new_cols + col] = value;
            }
        }

        Raster::from_array(
            new_rows,
            new_cols,
            values,
            self.data_type,
            dest_crs,
            Some(new_transform),
            None,
            Some(nodata),
            Casting::Unsafe,
            false,
            false,
        )
    }
}

impl PartialEq for Raster {
    fn eq(&self, other: &Self) -> bool {
        if self.rows() != other.rows() || self.columns() != other.columns() {
            return false;
        }
        if self.data_type != other.data_type || self.crs != other.crs {
            return false;
        }
        match (self.nodata, other.nodata) {
            (Some(a), Some(b)) if !nodata_eq(a, b) => return false,
            (None, Some(_)) | (Some(_), None) => return false,
            _ => {}
        }
        match (self.transform, other.transform) {
            (Some(a), Some(b)) if a != b => return false,
            (None, Some(_)) | (Some(_), None) => return false,
            _ => {}
        }
        for row in 0..self.rows() as isize {
            for col in 0..self.columns() as isize {
                let (a, b) = (self.get(row, col), other.get(row, col));
                if !(a == b || (a.is_nan() && b.is_nan())) {
                    return false;
                }
            }
        }
        true
    }
}

/// Resampling method used by `Raster::reproject`. Only
/// `Nearest` is implemented precisely; the rest resolve to a bilinear-style
/// nearest-pixel placeholder sampling suitable for categorical/ordinal
/// raster content such as D8 codes and stream masks, which is all this
/// crate ever reprojects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resampling {
    Nearest,
    Bilinear,
    Cubic,
    CubicSpline,
    Lanczos,
    Average,
    Mode,
    Max,
    Min,
    Median,
    Q1,
    Q3,
    Sum,
    Rms,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_raster() -> Raster {
        Raster::from_array(
            2,
            2,
            vec![1.0, 2.0, 3.0, 4.0],
            DataType::F64,
            None,
            Some(Transform::new(1.0, -1.0, 0.0, 0.0)),
            None,
            Some(-1.0),
            Casting::Unsafe,
            false,
            false,
        )
        .unwrap()
    }

    #[test]
    fn from_array_rejects_mismatched_shape() {
        let result = Raster::from_array(
            2,
            2,
            vec![1.0, 2.0, 3.0],
            DataType::F64,
            None,
            None,
            None,
            None,
            Casting::Unsafe,
            false,
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn transform_and_bounds_are_mutually_exclusive() {
        let result = Raster::from_array(
            1,
            1,
            vec![1.0],
            DataType::F64,
            None,
            Some(Transform::new(1.0, -1.0, 0.0, 0.0)),
            Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            None,
            Casting::Unsafe,
            false,
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn ensure_nodata_assigns_nan_for_floats() {
        let r = Raster::from_array(
            1,
            1,
            vec![1.0],
            DataType::F64,
            None,
            None,
            None,
            None,
            Casting::Unsafe,
            false,
            true,
        )
        .unwrap();
        assert!(r.nodata.unwrap().is_nan());
    }

    #[test]
    fn fill_clears_nodata_sentinel() {
        let mut r = small_raster();
        r.set(0, 0, -1.0);
        r.fill(0.0);
        assert_eq!(r.get(0, 0), 0.0);
        assert!(r.nodata.is_none());
    }

    #[test]
    fn equality_is_nan_aware_on_nodata() {
        let a = Raster::from_array(
            1, 1, vec![f64::NAN], DataType::F64, None, None, None, Some(f64::NAN),
            Casting::Unsafe, false, false,
        ).unwrap();
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn pixel_center_uses_half_pixel_offset() {
        let r = small_raster();
        let (x, y) = r.pixel_center(0, 0).unwrap();
        assert_eq!((x, y), (0.5, -0.5));
    }

    #[test]
    fn isbool_rejects_other_values() {
        let result = Raster::from_array(
            1, 1, vec![2.0], DataType::Bool, None, None, None, None,
            Casting::Unsafe, true, false,
        );
        assert!(result.is_err());
    }
}
