pub mod bbox;
pub mod crs;
pub mod raster;
pub mod transform;

pub use bbox::BoundingBox;
pub use crs::{Crs, CrsEngine};
pub use raster::{Casting, DataType, Raster, Resampling};
pub use transform::Transform;
