//! Statistics engine.
//!
//! Grounded on `dfha/segments.py`'s statistic dispatch table (the closed
//! set of reduction names and their NaN-aware twins) and on
//! `d8_flow_accum.rs`'s `accumulate`-then-read pattern for catchment sums
//! (walk flow accumulation once and read individual cells rather than
//! re-summing per query).

use streamnet_common::units::LengthUnit;
use streamnet_common::{Array2D, Error, Result};

use crate::accumulate::accumulate;
use crate::d8;
use crate::segments::Segments;

/// The closed statistic vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Statistic {
    Outlet,
    Min,
    Max,
    Mean,
    Median,
    Sum,
    Std,
    Var,
    NanMin,
    NanMax,
    NanMean,
    NanMedian,
    NanSum,
    NanStd,
    NanVar,
}

impl Statistic {
    fn omits_nan(self) -> bool {
        matches!(
            self,
            Statistic::NanMin
                | Statistic::NanMax
                | Statistic::NanMean
                | Statistic::NanMedian
                | Statistic::NanSum
                | Statistic::NanStd
                | Statistic::NanVar
        )
    }

    /// Reduces `values` under this statistic. `Outlet` is not handled here
    /// since it isn't a reduction over a pixel set.
    pub fn reduce(self, values: &[f64]) -> f64 {
        let pool: Vec<f64> = if self.omits_nan() {
            values.iter().copied().filter(|v| !v.is_nan()).collect()
        } else {
            values.to_vec()
        };
        if !self.omits_nan() && pool.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        if pool.is_empty() {
            return f64::NAN;
        }
        match self {
            Statistic::Outlet => f64::NAN,
            Statistic::Min | Statistic::NanMin => pool.iter().cloned().fold(f64::INFINITY, f64::min),
            Statistic::Max | Statistic::NanMax => {
                pool.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
            }
            Statistic::Mean | Statistic::NanMean => mean(&pool),
            Statistic::Median | Statistic::NanMedian => median(&pool),
            Statistic::Sum | Statistic::NanSum => pool.iter().sum(),
            Statistic::Std | Statistic::NanStd => variance(&pool).sqrt(),
            Statistic::Var | Statistic::NanVar => variance(&pool),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("no NaN survives this far"));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn value_at(values: &Array2D<f64>, pixel: (isize, isize)) -> f64 {
    let v = values.get_value(pixel.0, pixel.1);
    if v.is_nan() || v == values.nodata() {
        f64::NAN
    } else {
        v
    }
}

fn check_shape(segs: &Segments, values: &Array2D<f64>) -> Result<()> {
    if values.rows() != segs.flow.rows() as isize || values.columns() != segs.flow.columns() as isize
    {
        return Err(Error::RasterShape(
            "values raster does not match the flow raster's shape".into(),
        ));
    }
    Ok(())
}

/// Reduction over segment `i`'s own pixels. NoData
/// pixels in `values` count as NaN.
pub fn summary(segs: &Segments, i: usize, stat: Statistic, values: &Array2D<f64>) -> Result<f64> {
    check_shape(segs, values)?;
    if stat == Statistic::Outlet {
        return Ok(value_at(values, segs.outlet_pixel(i)));
    }
    let pixels: Vec<f64> = segs.indices[i].iter().map(|&p| value_at(values, p)).collect();
    Ok(stat.reduce(&pixels))
}

/// Walks upstream from `outlet` along the raw (unmasked) D8 field,
/// collecting every pixel that drains to it. Shared with the basin
/// labeller's flood-fill, but kept local since this one gathers a plain
/// pixel list rather than writing labels into a raster.
fn catchment_pixels(grid: &Array2D<u8>, outlet: (isize, isize)) -> Vec<(isize, isize)> {
    let mut seen = std::collections::HashSet::new();
    let mut stack = vec![outlet];
    seen.insert(outlet);
    let mut out = Vec::new();
    while let Some((r, c)) = stack.pop() {
        out.push((r, c));
        for code in 1..=8u8 {
            let (dr, dc) = d8::offset(code).unwrap();
            let (nr, nc) = (r - dr, c - dc);
            if nr < 0 || nc < 0 || nr >= grid.rows() || nc >= grid.columns() {
                continue;
            }
            if grid.get_value(nr, nc) == code && seen.insert((nr, nc)) {
                stack.push((nr, nc));
            }
        }
    }
    out
}

/// Catchment reduction over everything draining to segment `i`'s outlet,
/// or its terminus's outlet when `terminal` is set.
/// `mask`, when given, restricts the reduction to pixels where the mask
/// is true.
pub fn basin_summary(
    segs: &Segments,
    i: usize,
    stat: Statistic,
    values: &Array2D<f64>,
    mask: Option<&Array2D<bool>>,
    terminal: bool,
) -> Result<f64> {
    check_shape(segs, values)?;
    let target = if terminal { segs.terminus(i) } else { i };
    let outlet = segs.outlet_pixel(target);

    if stat == Statistic::Outlet {
        return Ok(value_at(values, outlet));
    }

    if matches!(
        stat,
        Statistic::Sum | Statistic::NanSum | Statistic::Mean | Statistic::NanMean
    ) {
        let grid = d8::flow_grid(&segs.flow)?;
        let weights = value_weights(segs, values);
        let accumulated = accumulate(&grid, &weights, mask, stat.omits_nan())?;
        let total = accumulated.get_value(outlet.0, outlet.1);
        return Ok(match stat {
            Statistic::Sum | Statistic::NanSum => total,
            _ => {
                let counts = count_weights(segs, values);
                let count_acc = accumulate(&grid, &counts, mask, stat.omits_nan())?;
                let n = count_acc.get_value(outlet.0, outlet.1);
                if n <= 0.0 {
                    f64::NAN
                } else {
                    total / n
                }
            }
        });
    }

    let grid = d8::flow_grid(&segs.flow)?;
    let pixels: Vec<f64> = catchment_pixels(&grid, outlet)
        .into_iter()
        .filter(|&p| mask.is_none_or(|m| m.get_value(p.0, p.1)))
        .map(|p| value_at(values, p))
        .collect();
    Ok(stat.reduce(&pixels))
}

/// Converts `values` into a per-pixel weight grid (NoData mapped to NaN)
/// for [`accumulate`]; the catchment restriction itself is applied by
/// `accumulate`'s own `mask` argument, not here.
fn value_weights(segs: &Segments, values: &Array2D<f64>) -> Array2D<f64> {
    let rows = segs.flow.rows() as isize;
    let columns = segs.flow.columns() as isize;
    let mut out: Array2D<f64> = Array2D::new(rows, columns, 0.0, f64::NAN).expect("positive shape");
    for row in 0..rows {
        for col in 0..columns {
            out.set_value(row, col, value_at(values, (row, col)));
        }
    }
    out
}

/// Per-pixel mean denominator weights: 1.0 where `values` holds a real
/// (non-NoData, non-NaN) reading, 0.0 where it doesn't. Accumulating this
/// instead of an unconditional all-ones grid keeps `NanMean`'s count in
/// step with which pixels actually contributed to the numerator.
fn count_weights(segs: &Segments, values: &Array2D<f64>) -> Array2D<f64> {
    let rows = segs.flow.rows() as isize;
    let columns = segs.flow.columns() as isize;
    let mut out: Array2D<f64> = Array2D::new(rows, columns, 0.0, f64::NAN).expect("positive shape");
    for row in 0..rows {
        for col in 0..columns {
            let present = if value_at(values, (row, col)).is_nan() { 0.0 } else { 1.0 };
            out.set_value(row, col, present);
        }
    }
    out
}

/// `area(mask?)`: catchment area in the flow raster's base unit squared
/// (or of `mask`'s footprint when given), per-segment.
pub fn area(segs: &Segments, i: usize, mask: Option<&Array2D<bool>>, terminal: bool) -> Result<f64> {
    let pixel_area = segs
        .flow
        .pixel_area()
        .ok_or_else(|| Error::MissingTransform("area requires a flow transform".into()))?;
    let target = if terminal { segs.terminus(i) } else { i };
    let outlet = segs.outlet_pixel(target);
    let grid = d8::flow_grid(&segs.flow)?;
    let n = catchment_pixels(&grid, outlet)
        .into_iter()
        .filter(|&p| mask.is_none_or(|m| m.get_value(p.0, p.1)))
        .count();
    Ok(n as f64 * pixel_area)
}

/// `burn_ratio(mask)`: fraction of the catchment flagged by `mask`.
pub fn burn_ratio(segs: &Segments, i: usize, mask: &Array2D<bool>, terminal: bool) -> Result<f64> {
    upslope_ratio(segs, i, mask, terminal)
}

pub fn burned_area(segs: &Segments, i: usize, mask: &Array2D<bool>, terminal: bool) -> Result<f64> {
    area(segs, i, Some(mask), terminal)
}

pub fn developed_area(segs: &Segments, i: usize, mask: &Array2D<bool>, terminal: bool) -> Result<f64> {
    area(segs, i, Some(mask), terminal)
}

/// `kf_factor(values, mask?, omit_nan?)`: catchment mean of a soil
/// erodibility raster. Negative sentinel values are rejected.
pub fn kf_factor(
    segs: &Segments,
    i: usize,
    values: &Array2D<f64>,
    mask: Option<&Array2D<bool>>,
    omit_nan: bool,
    terminal: bool,
) -> Result<f64> {
    reject_negative(values, "kf_factor")?;
    let stat = if omit_nan {
        Statistic::NanMean
    } else {
        Statistic::Mean
    };
    basin_summary(segs, i, stat, values, mask, terminal)
}

pub fn scaled_dnbr(segs: &Segments, i: usize, values: &Array2D<f64>, terminal: bool) -> Result<f64> {
    Ok(basin_summary(segs, i, Statistic::Mean, values, None, terminal)? / 1000.0)
}

pub fn scaled_thickness(segs: &Segments, i: usize, values: &Array2D<f64>, terminal: bool) -> Result<f64> {
    reject_negative(values, "scaled_thickness")?;
    Ok(basin_summary(segs, i, Statistic::Mean, values, None, terminal)? / 100.0)
}

/// `sine_theta(values, ...)`: catchment mean of a slope-sine raster,
/// requiring every contributing pixel to lie in [0, 1].
pub fn sine_theta(segs: &Segments, i: usize, values: &Array2D<f64>, terminal: bool) -> Result<f64> {
    let grid = d8::flow_grid(&segs.flow)?;
    let target = if terminal { segs.terminus(i) } else { i };
    let outlet = segs.outlet_pixel(target);
    for p in catchment_pixels(&grid, outlet) {
        let v = value_at(values, p);
        if !v.is_nan() && !(0.0..=1.0).contains(&v) {
            return Err(Error::value("sine_theta values must lie in [0, 1]"));
        }
    }
    basin_summary(segs, i, Statistic::Mean, values, None, terminal)
}

/// `slope(values)`: outlet-weighted mean slope over the segment's own
/// pixels.
pub fn slope(segs: &Segments, i: usize, values: &Array2D<f64>) -> Result<f64> {
    summary(segs, i, Statistic::Mean, values)
}

/// `relief(values)`: the outlet value.
pub fn relief(segs: &Segments, i: usize, values: &Array2D<f64>) -> Result<f64> {
    summary(segs, i, Statistic::Outlet, values)
}

/// `ruggedness(values, relief_per_m?)`: relief divided by the square root
/// of catchment area.
pub fn ruggedness(
    segs: &Segments,
    i: usize,
    values: &Array2D<f64>,
    terminal: bool,
) -> Result<f64> {
    let r = relief(segs, i, values)?;
    let a = area(segs, i, None, terminal)?;
    if a <= 0.0 {
        return Ok(f64::NAN);
    }
    Ok(r / a.sqrt())
}

/// `upslope_ratio(mask)`: catchment mean of a boolean mask.
pub fn upslope_ratio(
    segs: &Segments,
    i: usize,
    mask: &Array2D<bool>,
    terminal: bool,
) -> Result<f64> {
    let grid = d8::flow_grid(&segs.flow)?;
    let target = if terminal { segs.terminus(i) } else { i };
    let outlet = segs.outlet_pixel(target);
    let pixels = catchment_pixels(&grid, outlet);
    if pixels.is_empty() {
        return Ok(f64::NAN);
    }
    let hits = pixels.iter().filter(|&&p| mask.get_value(p.0, p.1)).count();
    Ok(hits as f64 / pixels.len() as f64)
}

/// `length(units?)`: segment polyline length, summing consecutive vertex
/// distances in CRS coordinates and converting to `unit`.
pub fn length(segs: &Segments, i: usize, unit: LengthUnit) -> Result<f64> {
    let verts = &segs.segments[i];
    let mut total = 0.0;
    for pair in verts.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        total += ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
    }
    let transform = segs
        .flow
        .transform
        .ok_or_else(|| Error::MissingTransform("length requires a flow transform".into()))?;
    let y = segs.flow.center().map(|c| c.1);
    transform
        .convert_length(total, unit, None, y)
        .ok_or_else(|| Error::value("could not convert length to the requested unit"))
}

/// `in_mask(mask)`: true iff the segment's outlet pixel is flagged.
pub fn in_mask(segs: &Segments, i: usize, mask: &Array2D<bool>) -> bool {
    let p = segs.outlet_pixel(i);
    mask.get_value(p.0, p.1)
}

/// `in_perimeter(mask)`: true iff any pixel of the segment is flagged.
pub fn in_perimeter(segs: &Segments, i: usize, mask: &Array2D<bool>) -> bool {
    segs.indices[i].iter().any(|&p| mask.get_value(p.0, p.1))
}

fn reject_negative(values: &Array2D<f64>, name: &str) -> Result<()> {
    for v in values.iter() {
        if !v.is_nan() && *v < 0.0 {
            return Err(Error::value(format!("{name} does not accept negative values")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::extract::extract;
    use crate::segments::tests::flow_raster;

    fn mask_of(rows: isize, cols: isize, flags: &[bool]) -> Array2D<bool> {
        let mut m = Array2D::new(rows, cols, false, false).unwrap();
        for r in 0..rows {
            m.set_row_data(r, &flags[(r * cols) as usize..(r * cols + cols) as usize]);
        }
        m
    }

    fn values_of(rows: isize, cols: isize, vals: &[f64]) -> Array2D<f64> {
        let mut a = Array2D::new(rows, cols, 0.0, f64::NAN).unwrap();
        for r in 0..rows {
            a.set_row_data(r, &vals[(r * cols) as usize..(r * cols + cols) as usize]);
        }
        a
    }

    #[test]
    fn outlet_reads_last_pixel_value() {
        let flow = flow_raster(1, 5, &[5.0, 5.0, 5.0, 5.0, 0.0]);
        let mask = mask_of(1, 5, &[true; 5]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        let dem = values_of(1, 5, &[10.0, 9.0, 8.0, 7.0, 6.0]);
        assert_eq!(summary(&segs, 0, Statistic::Outlet, &dem).unwrap(), 10.0);
    }

    #[test]
    fn segment_mean_matches_plain_average() {
        let flow = flow_raster(1, 5, &[5.0, 5.0, 5.0, 5.0, 0.0]);
        let mask = mask_of(1, 5, &[true; 5]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        let dem = values_of(1, 5, &[10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(summary(&segs, 0, Statistic::Mean, &dem).unwrap(), 30.0);
    }

    #[test]
    fn nan_variant_ignores_nan_pixels() {
        let flow = flow_raster(1, 5, &[5.0, 5.0, 5.0, 5.0, 0.0]);
        let mask = mask_of(1, 5, &[true; 5]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        let dem = values_of(1, 5, &[f64::NAN, 20.0, 30.0, 40.0, 50.0]);
        assert!(summary(&segs, 0, Statistic::Mean, &dem).unwrap().is_nan());
        assert_eq!(summary(&segs, 0, Statistic::NanMean, &dem).unwrap(), 35.0);
    }

    #[test]
    fn basin_summary_sum_matches_accumulated_total() {
        let flow = flow_raster(1, 5, &[5.0, 5.0, 5.0, 5.0, 0.0]);
        let mask = mask_of(1, 5, &[true; 5]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        let weights = values_of(1, 5, &[1.0, 1.0, 1.0, 1.0, 1.0]);
        let total = basin_summary(&segs, 0, Statistic::Sum, &weights, None, false).unwrap();
        assert_eq!(total, 5.0);
    }

    #[test]
    fn basin_summary_nanmean_excludes_nan_pixels_from_the_denominator() {
        // All three pixels flow west off the grid edge, so the whole chain
        // is one segment draining to column 0: pixels reach the outlet in
        // the order column 2, column 1, column 0.
        let flow = flow_raster(1, 3, &[5.0, 5.0, 5.0]);
        let mask = mask_of(1, 3, &[true; 3]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        // column 2 = 10.0, column 1 = NaN, column 0 (outlet) = 20.0.
        let values = values_of(1, 3, &[20.0, f64::NAN, 10.0]);
        assert!(basin_summary(&segs, 0, Statistic::Mean, &values, None, false)
            .unwrap()
            .is_nan());
        assert_eq!(
            basin_summary(&segs, 0, Statistic::NanMean, &values, None, false).unwrap(),
            15.0
        );
    }

    #[test]
    fn variance_uses_population_not_sample_denominator() {
        // Same raster as `outlet_reads_last_pixel_value`: segment 0 covers
        // columns 3,2,1,0 (outlet-first order confirmed by that test).
        let flow = flow_raster(1, 5, &[5.0, 5.0, 5.0, 5.0, 0.0]);
        let mask = mask_of(1, 5, &[true; 5]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        let dem = values_of(1, 5, &[2.0, 4.0, 4.0, 4.0, 0.0]);
        // pool = {2.0, 4.0, 4.0, 4.0}; mean = 3.5; population variance
        // divides by n=4, not the sample-variance n-1=3.
        let expected = ((2.0_f64 - 3.5).powi(2) + (4.0_f64 - 3.5).powi(2) * 3.0) / 4.0;
        assert_eq!(summary(&segs, 0, Statistic::Var, &dem).unwrap(), expected);
    }

    #[test]
    fn kf_factor_rejects_negative_values() {
        let flow = flow_raster(1, 3, &[5.0, 5.0, 0.0]);
        let mask = mask_of(1, 3, &[true; 3]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        let values = values_of(1, 3, &[-1.0, 0.2, 0.3]);
        assert!(kf_factor(&segs, 0, &values, None, false, false).is_err());
    }
}
