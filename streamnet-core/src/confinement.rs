//! Confinement-angle computation.
//!
//! Grounded on `dfha/segments.py::confinement`'s two-perpendicular-slope
//! design, translated onto this crate's `d8::Kernel::walk`/`perpendicular`
//! primitives. The per-pixel arctangents are averaged across the
//! segment before the final `180 - mean(θ1) - mean(θ2)` subtraction, matching
//! the Python original rather than averaging the already-subtracted angle.

use streamnet_common::{Error, Result};
use streamnet_raster::Raster;

use crate::d8::{self, Kernel};
use crate::segments::Segments;

/// `confinement(i, dem, neighborhood, factor?, meters?)`: mean confinement
/// angle in degrees over segment `i`'s pixels, or `NaN` if the flow field or
/// DEM is NoData anywhere the computation touches.
pub fn confinement(
    segs: &Segments,
    i: usize,
    dem: &Raster,
    neighborhood: isize,
    factor: f64,
    meters: bool,
) -> Result<f64> {
    if neighborhood <= 0 {
        return Err(Error::value("neighborhood must be a positive integer"));
    }
    if dem.rows() != segs.flow.rows() || dem.columns() != segs.flow.columns() {
        return Err(Error::RasterShape(
            "DEM shape does not match the flow raster".into(),
        ));
    }

    let grid = d8::flow_grid(&segs.flow)?;
    let transform = segs
        .flow
        .transform
        .ok_or_else(|| Error::MissingTransform("confinement requires a flow transform".into()))?;
    let (res_x, res_y) = if meters {
        let y = segs.flow.center().map(|c| c.1);
        let (x_per_m, y_per_m) = transform.units_per_meter(None, y).ok_or_else(|| {
            Error::value("could not resolve meters-per-unit for this CRS")
        })?;
        (transform.xres() / x_per_m, transform.yres() / y_per_m)
    } else {
        transform.resolution()
    };

    let kernel = Kernel::new(neighborhood, segs.flow.rows() as isize, segs.flow.columns() as isize);

    let mut sum_cw = 0.0;
    let mut sum_ccw = 0.0;
    let mut count = 0usize;

    for &(row, col) in &segs.indices[i] {
        let code = grid.get_value(row, col);
        if code == 0 {
            return Ok(f64::NAN);
        }
        let center = dem.get(row, col);
        if dem.is_nodata(center) {
            return Ok(f64::NAN);
        }

        let (cw, ccw) = d8::perpendicular(code);
        let theta_cw = match perpendicular_angle(dem, &kernel, row, col, cw, center, factor, res_x, res_y) {
            Some(t) => t,
            None => return Ok(f64::NAN),
        };
        let theta_ccw = match perpendicular_angle(dem, &kernel, row, col, ccw, center, factor, res_x, res_y) {
            Some(t) => t,
            None => return Ok(f64::NAN),
        };

        sum_cw += theta_cw;
        sum_ccw += theta_ccw;
        count += 1;
    }

    if count == 0 {
        return Ok(f64::NAN);
    }
    let mean_cw = sum_cw / count as f64;
    let mean_ccw = sum_ccw / count as f64;
    Ok(180.0 - mean_cw - mean_ccw)
}

/// One perpendicular direction's contribution: `atan((max_height -
/// center) * factor / step_length)` in degrees, or `None` if any sampled
/// DEM value is NoData.
fn perpendicular_angle(
    dem: &Raster,
    kernel: &Kernel,
    row: isize,
    col: isize,
    direction: u8,
    center: f64,
    factor: f64,
    res_x: f64,
    res_y: f64,
) -> Option<f64> {
    let pixels = kernel.walk(row, col, direction);
    if pixels.is_empty() {
        return Some(0.0);
    }
    let mut max_height = f64::NEG_INFINITY;
    for (r, c) in pixels {
        let v = dem.get(r, c);
        if dem.is_nodata(v) {
            return None;
        }
        if v > max_height {
            max_height = v;
        }
    }
    let length = d8::step_length(direction, res_x, res_y)?;
    let rise = (max_height - center) * factor;
    Some((rise / length).atan().to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::extract::extract;
    use crate::segments::tests::flow_raster;
    use streamnet_common::units::LengthUnit;
    use streamnet_common::Array2D;
    use streamnet_raster::{Casting, DataType, Transform};

    fn mask_of(rows: isize, cols: isize, flags: &[bool]) -> Array2D<bool> {
        let mut m = Array2D::new(rows, cols, false, false).unwrap();
        for r in 0..rows {
            m.set_row_data(r, &flags[(r * cols) as usize..(r * cols + cols) as usize]);
        }
        m
    }

    fn dem_of(rows: usize, cols: usize, vals: &[f64]) -> Raster {
        Raster::from_array(
            rows,
            cols,
            vals.to_vec(),
            DataType::F64,
            None,
            Some(Transform::new(1.0, -1.0, 0.0, 0.0)),
            None,
            Some(f64::NAN),
            Casting::Unsafe,
            false,
            false,
        )
        .unwrap()
    }

    #[test]
    fn flat_terrain_yields_maximally_unconfined_angle() {
        let flow = flow_raster(1, 3, &[5.0, 5.0, 0.0]);
        let mask = mask_of(1, 3, &[true; 3]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        let dem = dem_of(1, 3, &[5.0, 5.0, 5.0]);
        let angle = confinement(&segs, 0, &dem, 2, 1.0, false).unwrap();
        assert_eq!(angle, 180.0);
    }

    #[test]
    fn nodata_flow_code_yields_nan() {
        let flow = flow_raster(1, 2, &[0.0, 0.0]);
        let mask = mask_of(1, 2, &[true, false]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        let dem = dem_of(1, 2, &[5.0, 5.0]);
        let angle = confinement(&segs, 0, &dem, 2, 1.0, false).unwrap();
        assert!(angle.is_nan());
    }
}
