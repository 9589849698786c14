//! Basin labeller.
//!
//! Grounded on `basins.rs`'s two-pass "assign ids to zero-outflow cells,
//! then walk every other cell downstream until it hits an assigned id"
//! algorithm, generalized from "drains off the grid edge" (that file's
//! only outlet notion) to "drains to a terminal segment outlet". Its
//! sequential single pass becomes a per-unit worker partition using
//! `rayon`, mirroring the thread-fan-out idiom `d8_flow_accum.rs` uses for
//! its own embarrassingly-parallel prepass.
//!
//! A note on "local network" for this module specifically: nested basins
//! require two termini whose *raster*
//! drainage areas overlap, which can happen even when the termini belong
//! to different connected components of the segment parent/child graph
//! (`Segments::local_networks`) — nesting is a property of
//! the unmasked D8 field, not of the segment topology. This module
//! therefore computes its own drainage-overlap grouping (via
//! `drains_into`) rather than reusing `Segments::local_networks`, and
//! documents that distinction in DESIGN.md.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use streamnet_common::{Array2D, Config, Result};

use crate::d8;
use crate::segments::Segments;

fn inflow_neighbors(grid: &Array2D<u8>, row: isize, col: isize) -> Vec<(isize, isize)> {
    let mut out = Vec::new();
    for code in 1..=8u8 {
        let (dr, dc) = d8::offset(code).unwrap();
        let (nr, nc) = (row - dr, col - dc);
        if nr >= 0
            && nc >= 0
            && nr < grid.rows()
            && nc < grid.columns()
            && grid.get_value(nr, nc) == code
        {
            out.push((nr, nc));
        }
    }
    out
}

/// Walks downstream from `start` along the unmasked D8 field until it
/// reaches one of `targets`, or a sink. Bounded to one full raster sweep
/// so a malformed (cyclic) flow field cannot loop forever.
fn drains_to(
    grid: &Array2D<u8>,
    start: (isize, isize),
    targets: &HashMap<(isize, isize), usize>,
) -> Option<usize> {
    let mut cur = start;
    let bound = (grid.rows().max(1) as i64 * grid.columns().max(1) as i64) as usize;
    for _ in 0..bound {
        if let Some(&idx) = targets.get(&cur) {
            return Some(idx);
        }
        let code = grid.get_value(cur.0, cur.1);
        let (dr, dc) = d8::offset(code)?;
        let next = (cur.0 + dr, cur.1 + dc);
        if next.0 < 0 || next.1 < 0 || next.0 >= grid.rows() || next.1 >= grid.columns() {
            return None;
        }
        cur = next;
    }
    None
}

fn union_find(group_of: &mut [usize], x: usize) -> usize {
    if group_of[x] != x {
        group_of[x] = union_find(group_of, group_of[x]);
    }
    group_of[x]
}

/// A terminus's raster-drainage grouping: its index into `segs.termini()`,
/// its segment id, its outlet pixel, what it directly drains into (if
/// anything, excluding itself), and which union-find group it lands in.
struct DrainageUnits {
    termini: Vec<usize>,
    ids: Vec<i64>,
    outlets: Vec<(isize, isize)>,
    drains_into: Vec<Option<usize>>,
    group_of: Vec<usize>,
}

/// Groups termini whose raster drainage areas overlap: two termini land in
/// the same group iff one's outlet drains (through unmasked pixels) into
/// the other's. This is independent of `Segments::local_networks`, which
/// only sees the segment parent/child graph — nesting is a property of the
/// unmasked D8 field.
fn drainage_units(segs: &Segments, grid: &Array2D<u8>) -> Result<DrainageUnits> {
    let rows = segs.flow.rows() as isize;
    let columns = segs.flow.columns() as isize;

    let termini = segs.termini();
    let outlets: Vec<(isize, isize)> = termini.iter().map(|&i| segs.outlet(i)).collect();
    let ids: Vec<i64> = termini.iter().map(|&i| segs.ids[i]).collect();
    let outlet_index: HashMap<(isize, isize), usize> =
        outlets.iter().enumerate().map(|(k, &p)| (p, k)).collect();

    let drains_into: Vec<Option<usize>> = outlets
        .iter()
        .enumerate()
        .map(|(k, &outlet)| {
            let code = grid.get_value(outlet.0, outlet.1);
            let (dr, dc) = d8::offset(code)?;
            let next = (outlet.0 + dr, outlet.1 + dc);
            if next.0 < 0 || next.1 < 0 || next.0 >= rows || next.1 >= columns {
                return None;
            }
            drains_to(grid, next, &outlet_index).filter(|&j| j != k)
        })
        .collect();

    let mut group_of: Vec<usize> = (0..termini.len()).collect();
    for (k, target) in drains_into.iter().enumerate() {
        if let Some(j) = target {
            let rk = union_find(&mut group_of, k);
            let rj = union_find(&mut group_of, *j);
            if rk != rj {
                group_of[rk] = rj;
            }
        }
    }
    for k in 0..termini.len() {
        group_of[k] = union_find(&mut group_of, k);
    }

    Ok(DrainageUnits {
        termini,
        ids,
        outlets,
        drains_into,
        group_of,
    })
}

/// Ids of termini whose drainage-overlap group (see [`drainage_units`])
/// has more than one member — i.e. termini whose raster catchment
/// genuinely overlaps another terminus's, regardless of whether the two
/// belong to the same connected component of the segment graph.
pub(crate) fn nested_termini(segs: &Segments) -> Result<HashSet<i64>> {
    let grid = d8::flow_grid(&segs.flow)?;
    let units = drainage_units(segs, &grid)?;

    let mut counts: HashMap<usize, usize> = HashMap::new();
    for &root in &units.group_of {
        *counts.entry(root).or_insert(0) += 1;
    }

    Ok(units
        .group_of
        .iter()
        .zip(&units.ids)
        .filter(|(root, _)| counts[root] > 1)
        .map(|(_, &id)| id)
        .collect())
}

/// Labels every pixel draining to a terminal segment's outlet with that
/// segment's id. Pixels that drain to no retained terminus (including
/// NoData pixels) are labeled 0.
pub fn locate_basins(segs: &Segments, config: &Config) -> Result<Array2D<i64>> {
    let rows = segs.flow.rows() as isize;
    let columns = segs.flow.columns() as isize;
    let grid = d8::flow_grid(&segs.flow)?;

    let units = drainage_units(segs, &grid)?;
    let termini = units.termini;
    let outlets = units.outlets;
    let ids = units.ids;
    let drains_into = units.drains_into;
    let group_of = units.group_of;

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for (k, &root) in group_of.iter().enumerate() {
        groups.entry(root).or_default().push(k);
    }

    let worker_count = config.worker_count().max(1);
    let member_lists: Vec<&Vec<usize>> = groups.values().collect();
    let unit_results: Vec<Array2D<i64>> = if member_lists.len() > 1 && worker_count > 1 {
        member_lists
            .into_par_iter()
            .map(|members| label_unit(&grid, rows, columns, members, &outlets, &ids, &drains_into))
            .collect()
    } else {
        member_lists
            .into_iter()
            .map(|members| label_unit(&grid, rows, columns, members, &outlets, &ids, &drains_into))
            .collect()
    };

    let mut labels: Array2D<i64> = Array2D::new(rows, columns, 0, 0)?;
    for unit_labels in unit_results {
        for row in 0..rows {
            for col in 0..columns {
                let v = unit_labels.get_value(row, col);
                if v != 0 {
                    labels.set_value(row, col, v.max(labels.get_value(row, col)));
                }
            }
        }
    }
    Ok(labels)
}

/// Labels the pixels draining to the termini in `members`, processing
/// them in upstream-to-downstream order: a terminus nested inside another
/// claims its own reach first via first-touch, so the enclosing terminus
/// ends up with only the remainder — matching the nested-basin example's
/// literal nested-basin example (inner terminus keeps its own upstream
/// pixels; the outer terminus gets what's left outside the inner basin).
fn label_unit(
    grid: &Array2D<u8>,
    rows: isize,
    columns: isize,
    members: &[usize],
    outlets: &[(isize, isize)],
    ids: &[i64],
    drains_into: &[Option<usize>],
) -> Array2D<i64> {
    let mut labels: Array2D<i64> = Array2D::new(rows, columns, 0, 0).unwrap();

    // dependents[pos] lists the positions of members that drain directly
    // into member `pos`; a member is ready once everything draining into
    // it has already claimed its own pixels.
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); members.len()];
    for (mpos, &m) in members.iter().enumerate() {
        if let Some(target) = drains_into[m] {
            if let Some(tpos) = members.iter().position(|&x| x == target) {
                dependents[tpos].push(mpos);
            }
        }
    }

    let mut order = Vec::with_capacity(members.len());
    let mut done = vec![false; members.len()];
    while order.len() < members.len() {
        let mut progressed = false;
        for (pos, &k) in members.iter().enumerate() {
            if done[pos] {
                continue;
            }
            let ready = dependents[pos].iter().all(|&dp| done[dp]);
            if ready {
                order.push(k);
                done[pos] = true;
                progressed = true;
            }
        }
        if !progressed {
            for (pos, &k) in members.iter().enumerate() {
                if !done[pos] {
                    order.push(k);
                    done[pos] = true;
                }
            }
            break;
        }
    }

    for k in order {
        let id = ids[k];
        let outlet = outlets[k];
        if labels.get_value(outlet.0, outlet.1) == 0 {
            labels.set_value(outlet.0, outlet.1, id);
        }
        let mut stack = vec![outlet];
        while let Some((r, c)) = stack.pop() {
            for (nr, nc) in inflow_neighbors(grid, r, c) {
                if labels.get_value(nr, nc) == 0 {
                    labels.set_value(nr, nc, id);
                    stack.push((nr, nc));
                }
            }
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::extract::extract;
    use crate::segments::tests::flow_raster;
    use streamnet_common::units::LengthUnit;

    fn mask_of(rows: isize, cols: isize, flags: &[bool]) -> Array2D<bool> {
        let mut m = Array2D::new(rows, cols, false, false).unwrap();
        for r in 0..rows {
            m.set_row_data(r, &flags[(r * cols) as usize..(r * cols + cols) as usize]);
        }
        m
    }

    #[test]
    fn single_chain_basin_covers_every_pixel() {
        let flow = flow_raster(1, 5, &[5.0, 5.0, 5.0, 5.0, 0.0]);
        let mask = mask_of(1, 5, &[true; 5]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        let basins = locate_basins(&segs, &Config::default()).unwrap();
        for col in 0..5 {
            assert_eq!(basins.get_value(0, col), 1);
        }
    }

    #[test]
    fn basin_labelling_is_idempotent() {
        let flow = flow_raster(1, 5, &[5.0, 5.0, 5.0, 5.0, 0.0]);
        let mask = mask_of(1, 5, &[true; 5]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        let first = locate_basins(&segs, &Config::default()).unwrap();
        let second = locate_basins(&segs, &Config::default()).unwrap();
        assert_eq!(first.as_slice(), second.as_slice());
    }

    #[test]
    fn nested_basin_inner_terminus_wins_its_own_upstream_pixels() {
        // 1x7, flowing west except column 6 which has no outgoing flow (its
        // own sink). The mask gap at column 3 splits the raw D8 chain into
        // three segments: one reaching the grid edge (columns 0-2), one
        // stopping at the gap (columns 4-5), and an isolated single-pixel
        // chain at column 6 (it neither sends nor receives flow). Column
        // 2's raw drainage continues west through the unmasked gap at
        // column 3 into column 4's segment's reach, so that upstream
        // segment must claim its own pixels first, leaving the downstream
        // segment only the remainder; the isolated segment shares nothing
        // with either.
        let flow = flow_raster(1, 7, &[5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 0.0]);
        let mask = mask_of(1, 7, &[true, true, true, false, true, true, true]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        let basins = locate_basins(&segs, &Config::default()).unwrap();

        let inner_label = basins.get_value(0, 4);
        assert_eq!(basins.get_value(0, 5), inner_label);

        let outer_label = basins.get_value(0, 2);
        assert_eq!(basins.get_value(0, 0), outer_label);
        assert_eq!(basins.get_value(0, 1), outer_label);
        assert_ne!(outer_label, inner_label);

        // The gap pixel is never masked into either segment, but the
        // outer segment's raw-D8 flood-fill still reaches it, since the
        // inner segment's own flood-fill stops at column 4.
        assert_eq!(basins.get_value(0, 3), outer_label);

        let isolated_label = basins.get_value(0, 6);
        assert_ne!(isolated_label, outer_label);
        assert_ne!(isolated_label, inner_label);
    }
}
