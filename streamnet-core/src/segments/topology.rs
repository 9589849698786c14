//! Derived topology queries over a built `Segments` network.
//!
//! Grounded on `dfha/segments.py`'s confluence/parent-child bookkeeping;
//! the traversals below walk the same `child`/`parents` arrays the Python
//! original keeps, just typed as fixed-width integer vectors instead of
//! Python lists of indices.

use std::collections::{HashSet, VecDeque};

use super::Segments;

impl Segments {
    /// `child[i]`'s ultimate destination: follows `child` pointers until
    /// `-1`, returning the last index reached.
    pub fn terminus(&self, i: usize) -> usize {
        let mut cur = i;
        loop {
            let next = self.child[cur];
            if next < 0 {
                return cur;
            }
            cur = next as usize;
        }
    }

    /// The unique set of terminal indices, in network (ids) order.
    pub fn termini(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for i in 0..self.len() {
            let t = self.terminus(i);
            if seen.insert(t) {
                out.push(t);
            }
        }
        out
    }

    /// `indices[i]`'s last pixel.
    pub fn outlet(&self, i: usize) -> (isize, isize) {
        self.outlet_pixel(i)
    }

    /// Outlets for every segment, or only for termini when `terminal` is
    /// set.
    pub fn outlets(&self, terminal: bool) -> Vec<(isize, isize)> {
        if terminal {
            self.termini().into_iter().map(|i| self.outlet(i)).collect()
        } else {
            (0..self.len()).map(|i| self.outlet(i)).collect()
        }
    }

    /// All segments upstream of `i` (its parents, and their parents,
    /// recursively), excluding `i` itself.
    pub fn ancestors(&self, i: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut queue: VecDeque<usize> = self.parents[i]
            .iter()
            .copied()
            .filter(|&p| p >= 0)
            .map(|p| p as usize)
            .collect();
        let mut seen: HashSet<usize> = HashSet::new();
        while let Some(p) = queue.pop_front() {
            if !seen.insert(p) {
                continue;
            }
            out.push(p);
            for &pp in &self.parents[p] {
                if pp >= 0 {
                    queue.push_back(pp as usize);
                }
            }
        }
        out
    }

    /// All segments downstream of `i` (its child, and its child's child,
    /// ...), excluding `i` itself.
    pub fn descendents(&self, i: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cur = self.child[i];
        while cur >= 0 {
            out.push(cur as usize);
            cur = self.child[cur as usize];
        }
        out
    }

    /// `i`, its ancestors, and its descendents: the full chain of segments
    /// connected to `i` through parent/child relations.
    pub fn family(&self, i: usize) -> Vec<usize> {
        let mut out = vec![i];
        out.extend(self.ancestors(i));
        out.extend(self.descendents(i));
        out
    }

    /// True iff `i`'s terminus shares a raster drainage-overlap group (see
    /// `crate::basins::nested_termini`) with at least one other terminus —
    /// i.e. its basin genuinely overlaps another terminus's catchment in
    /// the unmasked D8 field, regardless of whether the two belong to the
    /// same connected component of the segment parent/child graph.
    pub fn isnested(&self, i: usize) -> streamnet_common::Result<bool> {
        let nested = crate::basins::nested_termini(self)?;
        Ok(nested.contains(&self.ids[self.terminus(i)]))
    }

    /// Connected components of the undirected graph induced by
    /// `parents`/`child`: groups of segment indices belonging to the same
    /// local network.
    pub fn local_networks(&self) -> Vec<Vec<usize>> {
        let n = self.len();
        let mut visited = vec![false; n];
        let mut networks = Vec::new();
        for start in 0..n {
            if visited[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            visited[start] = true;
            while let Some(cur) = stack.pop() {
                component.push(cur);
                if self.child[cur] >= 0 {
                    let c = self.child[cur] as usize;
                    if !visited[c] {
                        visited[c] = true;
                        stack.push(c);
                    }
                }
                for &p in &self.parents[cur] {
                    if p >= 0 {
                        let p = p as usize;
                        if !visited[p] {
                            visited[p] = true;
                            stack.push(p);
                        }
                    }
                }
            }
            component.sort_unstable();
            networks.push(component);
        }
        networks
    }

    /// Number of local networks (`nlocal`).
    pub fn nlocal(&self) -> usize {
        self.local_networks().len()
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
    fn confluence_topology_matches_parent_child_consistency() {
        let mut codes = vec![0.0; 9];
        codes[0] = 2.0;
        codes[2] = 4.0;
        codes[4] = 3.0;
        let flow = flow_raster(3, 3, &codes);
        let mask = mask_of(3, 3, &[true, false, true, false, true, false, false, false, false]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();

        assert_eq!(segs.termini(), vec![2]);
        assert_eq!(segs.ancestors(2), vec![0, 1]);
        assert!(segs.descendents(2).is_empty());
        assert_eq!(segs.nlocal(), 1);
        assert!(!segs.isnested(0).unwrap());
    }

    #[test]
    fn disjoint_chains_form_separate_local_networks() {
        let flow = flow_raster(1, 5, &[5.0, 5.0, 0.0, 5.0, 0.0]);
        let mask = mask_of(1, 5, &[true, true, false, true, false]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        assert_eq!(segs.nlocal(), 2);
    }

    #[test]
    fn nested_terminus_is_detected_despite_separate_local_networks() {
        // Same 1x7 raster as basins.rs's nested-basin fixture. The mask gap
        // at column 3 splits the raw D8 chain into three segments: one
        // reaching the grid edge (columns 0-2), one stopping at the gap
        // (columns 4-5), and an isolated single-pixel chain at column 6
        // (its own flow code is a sink, so it neither sends nor receives
        // flow). The first two are disconnected in the segment graph, but
        // the columns-4-5 segment's raw drainage continues through the
        // unmasked gap into the columns-0-2 segment's reach, so the two
        // are nested; the isolated segment shares drainage with neither.
        let flow = flow_raster(1, 7, &[5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 0.0]);
        let mask = mask_of(1, 7, &[true, true, true, false, true, true, true]);
        let segs = extract(&flow, &mask, None, LengthUnit::Base, None).unwrap();
        assert_eq!(segs.nlocal(), 3);

        let reaches_edge = segs.index_of_id(1).unwrap();
        let stops_at_gap = segs.index_of_id(2).unwrap();
        let isolated = segs.index_of_id(3).unwrap();
        assert!(segs.isnested(reaches_edge).unwrap());
        assert!(segs.isnested(stops_at_gap).unwrap());
        assert!(!segs.isnested(isolated).unwrap());
    }
}
