//! Network filtering and pruning.
//!
//! Grounded on `dfha/segments.py::_removable`'s fixed-point continuity
//! contraction: a requested removal is walked back to a no-op whenever it
//! would sever a retained upstream chain from a retained downstream
//! segment, re-checking the whole requested set until nothing changes.

use streamnet_common::Error;

use super::Segments;

impl Segments {
    /// Removes the selected segments, contracting the selection to respect
    /// continuity unless `continuous` is false.
    ///
    /// `ids` is matched against `self.ids` (not array position); `indices`
    /// is a boolean mask aligned with the current array order. Either may
    /// be omitted (`None` selects nothing from that source).
    pub fn remove(
        &mut self,
        ids: Option<&[i64]>,
        indices: Option<&[bool]>,
        upstream: bool,
        downstream: bool,
        continuous: bool,
    ) {
        let n = self.len();
        let mut requested = vec![false; n];
        if let Some(ids) = ids {
            for &id in ids {
                if let Some(i) = self.index_of_id(id) {
                    requested[i] = true;
                }
            }
        }
        if let Some(mask) = indices {
            for (i, &flag) in mask.iter().enumerate().take(n) {
                if flag {
                    requested[i] = true;
                }
            }
        }

        if continuous {
            removable(&mut requested, &self.child, &self.parents, upstream, downstream);
        }

        self.delete(&requested);
    }

    /// `keep` is `remove` over the selection's complement.
    pub fn keep(
        &mut self,
        ids: Option<&[i64]>,
        indices: Option<&[bool]>,
        upstream: bool,
        downstream: bool,
        continuous: bool,
    ) {
        let n = self.len();
        let mut kept = vec![false; n];
        if let Some(ids) = ids {
            for &id in ids {
                if let Some(i) = self.index_of_id(id) {
                    kept[i] = true;
                }
            }
        }
        if let Some(mask) = indices {
            for (i, &flag) in mask.iter().enumerate().take(n) {
                if flag {
                    kept[i] = true;
                }
            }
        }
        let complement: Vec<bool> = kept.iter().map(|&k| !k).collect();
        self.remove(None, Some(&complement), upstream, downstream, continuous);
    }

    /// Removes leaf segments (no parents) whose `npixels` falls below
    /// `threshold`. When `threshold` is `None`, removes every current leaf
    /// regardless of size — i.e. prunes exactly one leaf layer.
    pub fn prune(&mut self, threshold: Option<i64>) -> Result<(), Error> {
        if let Some(t) = threshold {
            if t < 0 {
                return Err(Error::value("prune threshold must not be negative"));
            }
        }
        let requested: Vec<bool> = (0..self.len())
            .map(|i| {
                let is_leaf = self.parents[i].is_empty();
                is_leaf && threshold.is_none_or(|t| self.npixels[i] < t)
            })
            .collect();
        self.delete(&requested);
        Ok(())
    }

    /// Deletes exactly the segments flagged in `requested` (already
    /// continuity-contracted if needed), remapping every index-valued field.
    fn delete(&mut self, requested: &[bool]) {
        let n = self.len();
        if !requested.iter().any(|&r| r) {
            return;
        }

        // old index -> new index, or -1 if removed.
        let mut remap: Vec<i64> = vec![-1; n];
        let mut next = 0i64;
        for i in 0..n {
            if !requested[i] {
                remap[i] = next;
                next += 1;
            }
        }
        let remap_child = |c: i64| -> i64 {
            if c < 0 {
                -1
            } else {
                remap[c as usize]
            }
        };

        let mut any_terminus_changed = false;
        for i in 0..n {
            if requested[i] {
                continue;
            }
            let new_child = remap_child(self.child[i]);
            if new_child < 0 && self.child[i] >= 0 {
                // This segment's downstream link was removed: it is now a
                // terminus that wasn't one before.
                any_terminus_changed = true;
            }
        }

        let mut segments = Vec::with_capacity(next as usize);
        let mut ids = Vec::with_capacity(next as usize);
        let mut indices = Vec::with_capacity(next as usize);
        let mut npixels = Vec::with_capacity(next as usize);
        let mut child = Vec::with_capacity(next as usize);
        let mut parents = Vec::with_capacity(next as usize);

        for i in 0..n {
            if requested[i] {
                any_terminus_changed = true;
                continue;
            }
            segments.push(self.segments[i].clone());
            ids.push(self.ids[i]);
            indices.push(self.indices[i].clone());
            npixels.push(self.npixels[i]);
            child.push(remap_child(self.child[i]));
            let new_parents: Vec<i64> = self.parents[i]
                .iter()
                .filter(|&&p| p >= 0 && !requested[p as usize])
                .map(|&p| remap[p as usize])
                .collect();
            parents.push(new_parents);
        }

        self.segments = segments;
        self.ids = ids;
        self.indices = indices;
        self.npixels = npixels;
        self.child = child;
        self.parents = parents;

        if any_terminus_changed {
            self.invalidate_basins();
        }
    }
}

/// Contracts `requested` to a fixed point under the continuity rule: a
/// segment stays marked for removal only if removing it wouldn't disconnect
/// a retained upstream chain (`upstream`) from a retained downstream
/// segment (`downstream`).
fn removable(
    requested: &mut [bool],
    child: &[i64],
    parents: &[Vec<i64>],
    upstream: bool,
    downstream: bool,
) {
    loop {
        let mut changed = false;
        for i in 0..requested.len() {
            if !requested[i] {
                continue;
            }
            let has_retained_parent = parents[i]
                .iter()
                .any(|&p| p >= 0 && !requested[p as usize]);
            let has_retained_child = child[i] >= 0 && !requested[child[i] as usize];
            if (upstream && has_retained_parent) || (downstream && has_retained_child) {
                requested[i] = false;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::extract::extract;
    use super::super::tests::flow_raster;
    use streamnet_common::units::LengthUnit;
    use streamnet_common::Array2D;

    fn mask_of(rows: isize, cols: isize, flags: &[bool]) -> Array2D<bool> {
        let mut m = Array2D::new(rows, cols, false, false).unwrap();
        for r in 0..rows {
            m.set_row_data(r, &flags[(r * cols) as usize..(r * cols + cols) as usize]);
        }
        m
    }

    #[test]
    fn remove_interior_segment_is_blocked_by_continuity() {
        // Confluence: (0,0) and (0,2) flow into (1,1), which flows south.
        let mut codes = vec![0.0; 9];
        codes[0] = 2.0;
        codes[2] = 4.0;
        codes[4] = 3.0;
        let flow = flow_raster(3, 3, &codes);
        let mask = mask_of(3, 3, &[true, false, true, false, true, false, false, false, false]);
        let mut segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        let before = segs.len();
        // Segment 2 (the confluence outlet) has both a retained parent and
        // is itself a terminus (no child); removing it with upstream=true
        // continuity should be blocked, leaving the network unchanged.
        segs.remove(None, Some(&[false, false, true]), true, true, true);
        assert_eq!(segs.len(), before);
    }

    #[test]
    fn remove_terminal_leaf_without_continuity_succeeds() {
        let flow = flow_raster(1, 5, &[5.0, 5.0, 5.0, 5.0, 0.0]);
        let mask = mask_of(1, 5, &[true; 5]);
        let mut segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        segs.remove(Some(&[1]), None, true, true, false);
        assert!(segs.is_empty());
    }

    #[test]
    fn keep_is_complement_of_remove() {
        let mut codes = vec![0.0; 9];
        codes[0] = 2.0;
        codes[2] = 4.0;
        codes[4] = 3.0;
        let flow = flow_raster(3, 3, &codes);
        let mask = mask_of(3, 3, &[true, false, true, false, true, false, false, false, false]);

        let mut kept = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        kept.keep(Some(&[3]), None, true, true, false);
        assert_eq!(kept.ids, vec![3]);

        let mut removed = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        removed.remove(Some(&[1, 2]), None, true, true, false);
        assert_eq!(removed.ids, vec![3]);
    }

    #[test]
    fn prune_removes_small_leaves_and_invalidates_basins() {
        let mut codes = vec![0.0; 9];
        codes[0] = 2.0;
        codes[2] = 4.0;
        codes[4] = 3.0;
        let flow = flow_raster(3, 3, &codes);
        let mask = mask_of(3, 3, &[true, false, true, false, true, false, false, false, false]);
        let mut segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        assert_eq!(segs.npixels, vec![1, 1, 3]);

        segs.prune(Some(2)).unwrap();
        assert_eq!(segs.ids, vec![3]);
        assert_eq!(segs.parents, vec![Vec::<i64>::new()]);
    }

    #[test]
    fn prune_without_threshold_removes_one_leaf_layer() {
        let flow = flow_raster(1, 5, &[5.0, 5.0, 5.0, 5.0, 0.0]);
        let mask = mask_of(1, 5, &[true; 5]);
        let mut segs = extract(&flow, &mask, Some(1.0), LengthUnit::Base, None).unwrap();
        let before = segs.len();
        segs.prune(None).unwrap();
        assert!(segs.len() < before);
    }
}
