use std::io;

/// Error taxonomy shared by every crate in the workspace.
///
/// Variants correspond to the error *kinds* described by the catchment
/// toolkit's specification rather than to any particular upstream
/// exception hierarchy: callers match on kind, not on message text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("shape error: {0}")]
    Shape(String),

    #[error("dimension error: {0}")]
    Dimension(String),

    #[error("raster shape error: {0}")]
    RasterShape(String),

    #[error("raster CRS error: {0}")]
    RasterCrs(String),

    #[error("raster transform error: {0}")]
    RasterTransform(String),

    #[error("missing CRS: {0}")]
    MissingCrs(String),

    #[error("missing transform: {0}")]
    MissingTransform(String),

    #[error("missing NoData: {0}")]
    MissingNoData(String),

    #[error("CRS error: {0}")]
    Crs(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("invalid flow field: {0}")]
    InvalidFlowField(String),

    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("feature file error: {0}")]
    FeatureFile(String),

    #[error("no features: {0}")]
    NoFeatures(String),

    #[error("value error: {0}")]
    Value(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("memory error: {0} (consider coarsening resolution or the requested window)")]
    Memory(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn shape(msg: impl Into<String>) -> Self {
        Error::Shape(msg.into())
    }

    pub fn value(msg: impl Into<String>) -> Self {
        Error::Value(msg.into())
    }

    pub fn invalid_flow_field(msg: impl Into<String>) -> Self {
        Error::InvalidFlowField(msg.into())
    }
}
