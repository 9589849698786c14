pub mod array2d;
pub mod config;
pub mod error;
pub mod progress;
pub mod units;

pub use array2d::Array2D;
pub use config::Config;
pub use error::{Error, Result};
