use crate::crs::Crs;
use crate::transform::Transform;

/// An axis-aligned spatial extent with an optional CRS.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
    pub crs: Option<Crs>,
}

impl BoundingBox {
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        BoundingBox {
            left,
            bottom,
            right,
            top,
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    pub(crate) fn with_crs_opt(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    pub fn width(&self) -> f64 {
        (self.right - self.left).abs()
    }

    pub fn height(&self) -> f64 {
        (self.top - self.bottom).abs()
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.left + self.right) / 2.0,
            (self.bottom + self.top) / 2.0,
        )
    }

    /// Derives the Transform implied by laying `nrows` x `ncols` pixels
    /// over this box, top-left to bottom-right (`dy` negative).
    pub fn transform(&self, nrows: usize, ncols: usize) -> Transform {
        let dx = (self.right - self.left) / ncols as f64;
        let dy = (self.bottom - self.top) / nrows as f64;
        Transform::new(dx, dy, self.left, self.top).with_crs_opt(self.crs)
    }

    /// Re-expresses this box's corners in the orientation implied by
    /// `target`'s quadrant (sign of dx/dy), used by aligned reprojection
    /// before snapping to the destination grid.
    pub fn oriented_to(&self, target: &Transform) -> BoundingBox {
        let (min_x, max_x) = (self.left.min(self.right), self.left.max(self.right));
        let (min_y, max_y) = (self.bottom.min(self.top), self.bottom.max(self.top));
        match target.orientation() {
            1 => BoundingBox {
                left: min_x,
                right: max_x,
                bottom: min_y,
                top: max_y,
                crs: self.crs,
            },
            2 => BoundingBox {
                left: max_x,
                right: min_x,
                bottom: min_y,
                top: max_y,
                crs: self.crs,
            },
            3 => BoundingBox {
                left: max_x,
                right: min_x,
                bottom: max_y,
                top: min_y,
                crs: self.crs,
            },
            _ => BoundingBox {
                left: min_x,
                right: max_x,
                bottom: max_y,
                top: min_y,
                crs: self.crs,
            },
        }
    }
}
