//! Stream-segment network builder and catchment-statistics engine.
//!
//! Thin re-export layer over the component modules; most callers only need
//! [`segments::Segments`], [`segments::extract`], and the free functions in
//! [`basins`], [`stats`], [`confinement`], and [`export`].

pub mod accumulate;
pub mod basins;
pub mod confinement;
pub mod d8;
pub mod export;
pub mod segments;
pub mod stats;

pub use segments::{extract, Segments};
