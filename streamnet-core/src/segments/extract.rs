//! Segment extraction from a stream mask.
//!
//! Grounded on `extract_streams.rs`'s "apply a predicate over a
//! flow-accumulation-derived mask" idiom for the overall shape of the
//! function, and on `dfha/segments.py`'s per-step odd/even lateral-vs-
//! diagonal length rule for the `max_length` splitting pass.

use std::collections::{HashMap, HashSet};

use streamnet_common::units::LengthUnit;
use streamnet_common::{Array2D, Error, Result};
use streamnet_raster::{CrsEngine, Raster};

use crate::accumulate::accumulate;
use crate::d8;

use super::{BasinCache, Segments};

type Pixel = (isize, isize);

struct RawChain {
    pixels: Vec<Pixel>,
    /// The junction pixel this chain's downstream walk ran into, if any.
    next_junction: Option<Pixel>,
}

/// One emitted segment prior to id assignment: a contiguous slice of a
/// raw chain's pixels, plus the polyline vertices covering it (including
/// any split points inserted at its ends).
struct FinalSegment {
    pixels: Vec<Pixel>,
    vertices: Vec<(f64, f64)>,
}

fn downstream_pixel(grid: &Array2D<u8>, row: isize, col: isize) -> Option<Pixel> {
    let code = grid.get_value(row, col);
    let (dr, dc) = d8::offset(code)?;
    let (nr, nc) = (row + dr, col + dc);
    if nr < 0 || nc < 0 || nr >= grid.rows() || nc >= grid.columns() {
        None
    } else {
        Some((nr, nc))
    }
}

/// Splits a raw pixel chain into sub-segments no longer than `max_length`
/// or returns the whole chain as one segment when
/// `max_length` is `None`. A chain of a single pixel is never split and is
/// given a degenerate two-vertex polyline (its center repeated) so every
/// emitted segment still satisfies the "at least two vertices" invariant.
fn split_chain(
    chain: &[Pixel],
    flow: &Raster,
    grid: &Array2D<u8>,
    max_length: Option<f64>,
) -> Vec<FinalSegment> {
    let centers: Vec<(f64, f64)> = chain
        .iter()
        .map(|&(r, c)| flow.pixel_center(r, c).expect("flow has a transform"))
        .collect();

    if chain.len() == 1 {
        return vec![FinalSegment {
            pixels: chain.to_vec(),
            vertices: vec![centers[0], centers[0]],
        }];
    }

    let Some(max_len) = max_length else {
        return vec![FinalSegment {
            pixels: chain.to_vec(),
            vertices: centers,
        }];
    };

    let (res_x, res_y) = flow.resolution().expect("flow has a transform");
    let mut segments = Vec::new();
    let mut cur_pixels = vec![chain[0]];
    let mut cur_verts = vec![centers[0]];
    let mut acc_len = 0.0;

    for k in 0..chain.len() - 1 {
        let code = grid.get_value(chain[k].0, chain[k].1);
        let step = d8::step_length(code, res_x, res_y).unwrap_or(0.0);
        if acc_len + step >= max_len {
            let mid = (
                (centers[k].0 + centers[k + 1].0) / 2.0,
                (centers[k].1 + centers[k + 1].1) / 2.0,
            );
            cur_verts.push(mid);
            segments.push(FinalSegment {
                pixels: std::mem::take(&mut cur_pixels),
                vertices: std::mem::take(&mut cur_verts),
            });
            cur_pixels = vec![chain[k + 1]];
            cur_verts = vec![mid, centers[k + 1]];
            acc_len = step / 2.0;
        } else {
            acc_len += step;
            cur_pixels.push(chain[k + 1]);
            cur_verts.push(centers[k + 1]);
        }
    }
    segments.push(FinalSegment {
        pixels: cur_pixels,
        vertices: cur_verts,
    });
    segments
}

/// Builds a segments network from a D8 flow raster and a stream-pixel
/// mask, optionally splitting chains longer than `max_length` (given in
/// `unit`, converted to the raster's base unit via `engine` when the CRS
/// is angular).
pub fn extract(
    flow: &Raster,
    mask: &Array2D<bool>,
    max_length: Option<f64>,
    unit: LengthUnit,
    engine: Option<&dyn CrsEngine>,
) -> Result<Segments> {
    let grid = d8::flow_grid(flow)?;
    let rows = grid.rows();
    let columns = grid.columns();
    if mask.rows() != rows || mask.columns() != columns {
        return Err(Error::RasterShape(
            "mask shape does not match the flow raster".into(),
        ));
    }

    let transform = flow
        .transform
        .ok_or_else(|| Error::MissingTransform("segment extraction requires a flow transform".into()))?;

    let max_length_base = match max_length {
        Some(value) => {
            let y = flow.center().map(|c| c.1);
            let converted = transform.convert_length(value, unit, engine, y).ok_or_else(|| {
                Error::value("could not convert max_length to the raster's base unit")
            })?;
            let diagonal = transform.pixel_diagonal();
            if converted < diagonal {
                return Err(Error::value(
                    "max_length must be at least the pixel diagonal",
                ));
            }
            Some(converted)
        }
        None => None,
    };

    let is_mask = |row: isize, col: isize| mask.get_value(row, col);

    let mut inbound: Array2D<u8> = Array2D::new(rows, columns, 0, 0)?;
    for row in 0..rows {
        for col in 0..columns {
            if !is_mask(row, col) {
                continue;
            }
            if let Some((nr, nc)) = downstream_pixel(&grid, row, col) {
                if is_mask(nr, nc) {
                    inbound.increment(nr, nc, 1);
                }
            }
        }
    }

    let mut junctions: Vec<Pixel> = Vec::new();
    for row in 0..rows {
        for col in 0..columns {
            if is_mask(row, col) {
                let n = inbound.get_value(row, col);
                if n == 0 || n >= 2 {
                    junctions.push((row, col));
                }
            }
        }
    }
    let junction_set: HashSet<Pixel> = junctions.iter().copied().collect();

    let mut raw_chains: Vec<RawChain> = Vec::new();
    let mut head_to_chain: HashMap<Pixel, usize> = HashMap::new();
    for &start in &junctions {
        head_to_chain.insert(start, raw_chains.len());
        let mut pixels = vec![start];
        let mut cur = start;
        let next_junction = loop {
            match downstream_pixel(&grid, cur.0, cur.1) {
                Some(nxt) if is_mask(nxt.0, nxt.1) => {
                    if junction_set.contains(&nxt) {
                        break Some(nxt);
                    }
                    pixels.push(nxt);
                    cur = nxt;
                }
                _ => break None,
            }
        };
        raw_chains.push(RawChain { pixels, next_junction });
    }

    let mut finals: Vec<FinalSegment> = Vec::new();
    let mut chain_final_range: Vec<(usize, usize)> = Vec::with_capacity(raw_chains.len());
    for chain in &raw_chains {
        let subsegments = split_chain(&chain.pixels, flow, &grid, max_length_base);
        let first = finals.len();
        finals.extend(subsegments);
        chain_final_range.push((first, finals.len() - 1));
    }

    let n = finals.len();
    let mut child: Vec<i64> = vec![-1; n];
    let mut parents: Vec<Vec<i64>> = vec![Vec::new(); n];

    for (ci, chain) in raw_chains.iter().enumerate() {
        let (first, last) = chain_final_range[ci];
        for k in first..last {
            child[k] = (k + 1) as i64;
            parents[k + 1].push(k as i64);
        }
        match chain.next_junction {
            Some(j) => {
                let target_ci = head_to_chain[&j];
                let target_first = chain_final_range[target_ci].0;
                child[last] = target_first as i64;
                parents[target_first].push(last as i64);
            }
            None => child[last] = -1,
        }
    }

    let mut mask_weights: Array2D<f64> = Array2D::new(rows, columns, 0.0, f64::NAN)?;
    for row in 0..rows {
        for col in 0..columns {
            mask_weights.set_value(row, col, if is_mask(row, col) { 1.0 } else { 0.0 });
        }
    }
    let accumulated = accumulate(&grid, &mask_weights, None, false)?;

    let mut ids = Vec::with_capacity(n);
    let mut indices = Vec::with_capacity(n);
    let mut segments = Vec::with_capacity(n);
    let mut npixels = Vec::with_capacity(n);
    for (i, seg) in finals.into_iter().enumerate() {
        ids.push((i + 1) as i64);
        let (outlet_row, outlet_col) = *seg.pixels.last().expect("segment has at least one pixel");
        npixels.push(accumulated.get_value(outlet_row, outlet_col).round() as i64);
        indices.push(seg.pixels);
        segments.push(seg.vertices);
    }

    Ok(Segments {
        flow: flow.clone(),
        segments,
        ids,
        indices,
        npixels,
        child,
        parents,
        basins: BasinCache::Invalid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::tests::flow_raster;

    fn mask_of(rows: isize, cols: isize, flags: &[bool]) -> Array2D<bool> {
        let mut m = Array2D::new(rows, cols, false, false).unwrap();
        for r in 0..rows {
            m.set_row_data(r, &flags[(r * cols) as usize..(r * cols + cols) as usize]);
        }
        m
    }

    #[test]
    fn confluence_scenario_produces_a_three_segment_network() {
        // 3x3: (0,0) and (0,2) flow diagonally into (1,1), which flows south.
        let mut codes = vec![0.0; 9];
        codes[0] = 2.0; // SE
        codes[2] = 4.0; // SW
        codes[4] = 3.0; // S
        let flow = flow_raster(3, 3, &codes);
        let mask = mask_of(3, 3, &[true, false, true, false, true, false, false, false, false]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs.child[0], 2);
        assert_eq!(segs.child[1], 2);
        assert_eq!(segs.child[2], -1);
        assert_eq!(segs.npixels, vec![1, 1, 3]);
    }

    #[test]
    fn splitting_respects_max_length() {
        // 1x6 all flowing west; pixel size 1, max_length=3 splits into two
        // three-pixel runs at the exact boundary (accumulated length hits
        // 3 after three pixel-to-pixel steps, not after four).
        let flow = flow_raster(1, 6, &[5.0, 5.0, 5.0, 5.0, 5.0, 5.0]);
        let mask = mask_of(1, 6, &[true; 6]);
        let segs = extract(&flow, &mask, Some(3.0), LengthUnit::Base, None).unwrap();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs.indices[0].len(), 3);
        assert_eq!(segs.indices[1].len(), 3);
        assert_eq!(segs.parents[1], vec![0]);

        let len0 = crate::stats::length(&segs, 0, LengthUnit::Base).unwrap();
        let len1 = crate::stats::length(&segs, 1, LengthUnit::Base).unwrap();
        assert!(len0 <= 3.0, "segment 0 length {len0} exceeds max_length");
        assert!(len1 <= 3.0, "segment 1 length {len1} exceeds max_length");
    }

    #[test]
    fn max_length_below_pixel_diagonal_is_rejected() {
        let flow = flow_raster(1, 3, &[5.0, 5.0, 0.0]);
        let mask = mask_of(1, 3, &[true; 3]);
        let result = extract(&flow, &mask, Some(0.1), LengthUnit::Base, None);
        assert!(matches!(result, Err(Error::Value(_))));
    }
}
