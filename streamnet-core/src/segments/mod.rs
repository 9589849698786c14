//! The segments object: a stream network built once from `(flow, mask,
//! max_length?)` and thereafter mutated only by filtering.
//!
//! Grounded on the `_Kernel`/confluence bookkeeping in `dfha/segments.py`,
//! translated from Python list/dict bookkeeping into the fixed-width
//! `Vec`-of-`Vec` shape this object needs, and on `whitebox_raster::Raster`'s
//! aggregate-owns-its-arrays style (a value grid bundled with its metadata
//! rather than scattered across the caller).

pub mod extract;
pub mod filter;
pub mod topology;

pub use extract::extract;

use streamnet_common::Array2D;
use streamnet_raster::Raster;

/// Lazy cache of terminal-outlet labels.
/// Invalidated to `Invalid` by any filtering operation that changes the set
/// of termini.
#[derive(Clone, Debug)]
pub enum BasinCache {
    Fresh(Array2D<i64>),
    Invalid,
}

/// A directed network of stream segments traced over `flow`.
///
/// All fields besides `flow` grow or shrink together under `remove`/`keep`/
/// `prune`; nothing outside this module mutates them directly.
#[derive(Clone, Debug)]
pub struct Segments {
    pub flow: Raster,
    pub segments: Vec<Vec<(f64, f64)>>,
    pub ids: Vec<i64>,
    pub indices: Vec<Vec<(isize, isize)>>,
    pub npixels: Vec<i64>,
    pub child: Vec<i64>,
    pub parents: Vec<Vec<i64>>,
    pub(crate) basins: BasinCache,
}

impl Segments {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Position of segment `id` in every parallel array, or `None` if no
    /// such segment survives (it may have been filtered out).
    pub fn index_of_id(&self, id: i64) -> Option<usize> {
        self.ids.iter().position(|&x| x == id)
    }

    /// The segment's final pixel (`outlet(i)`).
    pub fn outlet_pixel(&self, i: usize) -> (isize, isize) {
        *self.indices[i]
            .last()
            .expect("every segment owns at least one pixel")
    }

    /// The segment's final vertex, in CRS coordinates.
    pub fn outlet_vertex(&self, i: usize) -> (f64, f64) {
        *self.segments[i]
            .last()
            .expect("every segment owns at least two vertices")
    }

    pub fn basins(&self) -> Option<&Array2D<i64>> {
        match &self.basins {
            BasinCache::Fresh(raster) => Some(raster),
            BasinCache::Invalid => None,
        }
    }

    pub(crate) fn invalidate_basins(&mut self) {
        self.basins = BasinCache::Invalid;
    }

    /// Returns the cached basin-label raster, computing and caching it
    /// first if nothing has invalidated the cache since the last call.
    pub fn basins_mut(&mut self, config: &streamnet_common::Config) -> streamnet_common::Result<&Array2D<i64>> {
        if matches!(self.basins, BasinCache::Invalid) {
            let raster = crate::basins::locate_basins(self, config)?;
            self.basins = BasinCache::Fresh(raster);
        }
        Ok(self.basins().expect("just computed"))
    }

    /// Width `K` of the conceptual `parents` matrix: the widest confluence
    /// currently in the network.
    pub fn parents_width(&self) -> usize {
        self.parents.iter().map(|p| p.len()).max().unwrap_or(0)
    }

    /// `parents` as an `N x K` matrix padded with -1, matching the
    /// documented shape (the field itself is stored ragged internally
    /// since most confluences have far fewer than `K` parents).
    pub fn parents_matrix(&self) -> Vec<Vec<i64>> {
        let k = self.parents_width();
        self.parents
            .iter()
            .map(|p| {
                let mut row = p.clone();
                row.resize(k, -1);
                row
            })
            .collect()
    }
}
