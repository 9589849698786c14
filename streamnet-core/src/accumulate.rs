//! Flow accumulation over the D8 network.
//!
//! Grounded on `d8_flow_accum.rs`'s two-pass algorithm: count inflowing
//! neighbors per pixel, seed a stack with zero-inflow pixels, then pop and
//! push the running total downstream. That original always accumulates
//! "number of inflowing cells"; this version generalizes the per-pixel
//! contribution to an arbitrary (optionally masked, optionally
//! NaN-omitting) weight, which is what lets the same routine serve both
//! `npixels` (weights = mask) and the statistics engine's masked/weighted
//! catchment sums.

use rayon::prelude::*;
use streamnet_common::{Array2D, Error, Result};

/// Validates that every value in `flow` is a legal D8 code (0..=8),
/// failing with `InvalidFlowField` otherwise.
pub fn validate_flow_field(flow: &Array2D<u8>) -> Result<()> {
    let bad = flow.as_slice().iter().any(|&c| c > 8);
    if bad {
        return Err(Error::invalid_flow_field(
            "flow raster contains a code outside 0..=8",
        ));
    }
    Ok(())
}

/// Computes, for every pixel, the sum of `weights` over all pixels whose
/// deterministic D8 path reaches it (inclusive of itself).
///
/// `mask`, when given, zeroes out pixels excluded from the accumulation
/// (their own contribution is zero, but flow still passes through them).
/// `omit_nan` controls whether a NaN weight taints every downstream pixel
/// (`false`, the default "strict sum" behavior) or is treated as an absent
/// contribution (`true`, "nansum" behavior).
pub fn accumulate(
    flow: &Array2D<u8>,
    weights: &Array2D<f64>,
    mask: Option<&Array2D<bool>>,
    omit_nan: bool,
) -> Result<Array2D<f64>> {
    validate_flow_field(flow)?;

    let rows = flow.rows();
    let columns = flow.columns();
    if weights.rows() != rows || weights.columns() != columns {
        return Err(Error::RasterShape(
            "weights raster shape does not match the flow raster".into(),
        ));
    }
    if let Some(m) = mask {
        if m.rows() != rows || m.columns() != columns {
            return Err(Error::RasterShape(
                "mask raster shape does not match the flow raster".into(),
            ));
        }
    }

    let mut output: Array2D<f64> = Array2D::new(rows, columns, 0.0, f64::NAN)?;

    // Per-pixel self contribution: this is also the output's initial value,
    // matching `d8_flow_accum.rs`'s `output.reinitialize_values(1.0)` self-seed.
    let contributions: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|row| {
            (0..columns).map(move |col| {
                let in_mask = mask.map(|m| m.get_value(row, col)).unwrap_or(true);
                if !in_mask {
                    return 0.0;
                }
                let w = weights.get_value(row, col);
                if omit_nan && w.is_nan() {
                    0.0
                } else {
                    w
                }
            })
        })
        .collect();
    for row in 0..rows {
        let base = (row * columns) as usize;
        output.set_row_data(row, &contributions[base..base + columns as usize]);
    }

    // Count inflowing neighbors per pixel (parallel prepass, independent
    // per pixel) so the serial topological walk below knows which pixels
    // are safe to pop first.
    let inflow_counts: Vec<i32> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|row| {
            (0..columns).map(move |col| {
                let mut count = 0i32;
                for code in 1..=8u8 {
                    let (dr, dc) = crate::d8::offset(code).unwrap();
                    let (nr, nc) = (row - dr, col - dc);
                    if flow.get_value(nr, nc) == code {
                        count += 1;
                    }
                }
                count
            })
        })
        .collect();

    let mut inflow: Array2D<i32> = Array2D::new(rows, columns, 0, -1)?;
    let mut stack: Vec<(isize, isize)> = Vec::new();
    for row in 0..rows {
        let base = (row * columns) as usize;
        inflow.set_row_data(row, &inflow_counts[base..base + columns as usize]);
        for col in 0..columns {
            if inflow.get_value(row, col) == 0 {
                stack.push((row, col));
            }
        }
    }

    let mut visits: Array2D<u32> = Array2D::new(rows, columns, 0, 0)?;
    let visit_bound = (rows as u64 * columns as u64).max(1);
    while let Some((row, col)) = stack.pop() {
        let visited = visits.get_value(row, col) as u64;
        if visited as u64 > visit_bound {
            // Unexpected cycle in the D8 field; stop rather than loop forever.
            continue;
        }
        visits.increment(row, col, 1);

        let code = flow.get_value(row, col);
        if let Some((dr, dc)) = crate::d8::offset(code) {
            let (nr, nc) = (row + dr, col + dc);
            if nr >= 0 && nc >= 0 && nr < rows && nc < columns {
                let fa = output.get_value(row, col);
                output.increment(nr, nc, fa);
                inflow.decrement(nr, nc, 1);
                if inflow.get_value(nr, nc) == 0 {
                    stack.push((nr, nc));
                }
            }
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow_from(rows: isize, cols: isize, codes: &[u8]) -> Array2D<u8> {
        let mut grid = Array2D::new(rows, cols, 0u8, 0u8).unwrap();
        for r in 0..rows {
            grid.set_row_data(r, &codes[(r * cols) as usize..(r * cols + cols) as usize]);
        }
        grid
    }

    fn ones(rows: isize, cols: isize) -> Array2D<f64> {
        Array2D::new(rows, cols, 1.0, f64::NAN).unwrap()
    }

    #[test]
    fn invalid_flow_code_is_rejected() {
        let flow = flow_from(1, 1, &[9]);
        let w = ones(1, 1);
        let result = accumulate(&flow, &w, None, false);
        assert!(matches!(result, Err(Error::InvalidFlowField(_))));
    }

    #[test]
    fn single_chain_accumulates_monotonically() {
        // 1x5, all flowing west (code 5): [5,5,5,5,0]
        let flow = flow_from(1, 5, &[5, 5, 5, 5, 0]);
        let w = ones(1, 5);
        let acc = accumulate(&flow, &w, None, false).unwrap();
        assert_eq!(acc.get_value(0, 4), 1.0);
        assert_eq!(acc.get_value(0, 0), 5.0);
    }

    #[test]
    fn confluence_sums_both_parents() {
        // 3x3: (0,0) flows SE into (1,1); (0,2) flows SW into (1,1); (1,1) flows S.
        let mut codes = vec![0u8; 9];
        codes[0] = 2; // (0,0) -> SE
        codes[2] = 4; // (0,2) -> SW
        codes[4] = 3; // (1,1) -> S
        let flow = flow_from(3, 3, &codes);
        let w = ones(3, 3);
        let acc = accumulate(&flow, &w, None, false).unwrap();
        assert_eq!(acc.get_value(1, 1), 3.0);
        assert_eq!(acc.get_value(2, 1), 3.0);
    }

    #[test]
    fn nan_without_omit_taints_downstream() {
        let mut codes = vec![0u8; 4];
        codes[1] = 4; // (0,1) SW -> (1,0)
        let flow = flow_from(2, 2, &codes);
        let mut w = ones(2, 2);
        w.set_value(0, 1, f64::NAN);
        let acc_strict = accumulate(&flow, &w, None, false).unwrap();
        assert!(acc_strict.get_value(1, 0).is_nan());

        let acc_nan_omit = accumulate(&flow, &w, None, true).unwrap();
        assert_eq!(acc_nan_omit.get_value(1, 0), 1.0);
    }
}
