use crate::bbox::BoundingBox;
use crate::crs::{Crs, CrsEngine};
use streamnet_common::units::LengthUnit;

/// An affine scale-and-translate transform locating pixel (0, 0)'s
/// top-left corner. Shear is disallowed — this models the axis-aligned
/// transforms every raster this crate's value type carries.
///
/// Grounded on `pfdf/projection/transform.py`'s `Transform`: `dx`/`dy` are
/// the per-pixel coordinate deltas (`dy` is typically negative, since row
/// increases downward while Y usually increases upward), and `orientation`
/// reports which Cartesian quadrant the raster occupies relative to its own
/// minimum-X/minimum-Y corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub dx: f64,
    pub dy: f64,
    pub left: f64,
    pub top: f64,
    pub crs: Option<Crs>,
}

impl Transform {
    pub fn new(dx: f64, dy: f64, left: f64, top: f64) -> Self {
        Transform {
            dx,
            dy,
            left,
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

    /// The bounding box this transform implies for a raster of the given
    /// shape — the inverse of `BoundingBox::transform`.
    pub fn bounds(&self, rows: usize, columns: usize) -> BoundingBox {
        let right = self.left + self.dx * columns as f64;
        let bottom = self.top + self.dy * rows as f64;
        BoundingBox::new(
            self.left.min(right),
            self.top.min(bottom),
            self.left.max(right),
            self.top.max(bottom),
        )
        .with_crs_opt(self.crs)
    }

    pub fn xres(&self) -> f64 {
        self.dx.abs()
    }

    pub fn yres(&self) -> f64 {
        self.dy.abs()
    }

    pub fn resolution(&self) -> (f64, f64) {
        (self.xres(), self.yres())
    }

    pub fn pixel_area(&self) -> f64 {
        self.xres() * self.yres()
    }

    pub fn pixel_diagonal(&self) -> f64 {
        (self.xres().powi(2) + self.yres().powi(2)).sqrt()
    }

    /// The Cartesian quadrant (1-4) containing the raster, taking the
    /// origin as the minimum-X, minimum-Y coordinate of the raster:
    /// 1: dx >= 0, dy <= 0; 2: dx < 0, dy <= 0; 3: dx < 0, dy > 0;
    /// 4: dx >= 0, dy > 0.
    pub fn orientation(&self) -> u8 {
        match (self.dx >= 0.0, self.dy <= 0.0) {
            (true, true) => 1,
            (false, true) => 2,
            (false, false) => 3,
            (true, false) => 4,
        }
    }

    /// Converts a length given in this transform's base (axis) units into
    /// meters. In a linear CRS this is just a unit-independent pass-through
    /// (CRS libraries in this pack all work in the axis's native linear
    /// unit); in an angular (geographic) CRS the conversion requires a
    /// `CrsEngine` and a reference latitude `y`, since degrees don't have a
    /// fixed meter length.
    pub fn units_per_meter(
        &self,
        engine: Option<&dyn CrsEngine>,
        y: Option<f64>,
    ) -> Option<(f64, f64)> {
        match self.crs {
            Some(crs) if crs.is_geographic() => {
                let engine = engine?;
                let y = y?;
                let one_degree_x = engine.haversine_meters(crs, self.left, y, self.left + 1.0, y);
                let one_degree_y =
                    engine.haversine_meters(crs, self.left, y, self.left, y + 1.0);
                if one_degree_x == 0.0 || one_degree_y == 0.0 {
                    None
                } else {
                    Some((1.0 / one_degree_x, 1.0 / one_degree_y))
                }
            }
            _ => Some((1.0, 1.0)),
        }
    }

    /// Resolves a length unit request down to the raster's base unit, the
    /// single place unit conversion happens so every caller agrees on it.
    pub fn convert_length(
        &self,
        value: f64,
        unit: LengthUnit,
        engine: Option<&dyn CrsEngine>,
        y: Option<f64>,
    ) -> Option<f64> {
        match unit {
            LengthUnit::Base => Some(value),
            LengthUnit::Pixels => Some(value * self.pixel_diagonal()),
            LengthUnit::Meters | LengthUnit::Kilometers | LengthUnit::Feet => {
                let meters = streamnet_common::units::to_meters(value, unit)?;
                let (x_per_m, _) = self.units_per_meter(engine, y)?;
                Some(meters * x_per_m)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_is_inverse_of_bbox_transform() {
        let bbox = BoundingBox::new(0.0, -10.0, 20.0, 0.0);
        let t = bbox.transform(10, 20);
        let back = t.bounds(10, 20);
        assert!((back.left - bbox.left).abs() < 1e-9);
        assert!((back.right - bbox.right).abs() < 1e-9);
        assert!((back.top - bbox.top).abs() < 1e-9);
        assert!((back.bottom - bbox.bottom).abs() < 1e-9);
    }

    #[test]
    fn orientation_quadrants() {
        assert_eq!(Transform::new(1.0, -1.0, 0.0, 0.0).orientation(), 1);
        assert_eq!(Transform::new(-1.0, -1.0, 0.0, 0.0).orientation(), 2);
        assert_eq!(Transform::new(-1.0, 1.0, 0.0, 0.0).orientation(), 3);
        assert_eq!(Transform::new(1.0, 1.0, 0.0, 0.0).orientation(), 4);
    }

    #[test]
    fn pixel_diagonal_matches_pythagorean_length() {
        let t = Transform::new(3.0, -4.0, 0.0, 0.0);
        assert!((t.pixel_diagonal() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn linear_crs_units_per_meter_is_identity() {
        let t = Transform::new(30.0, -30.0, 0.0, 0.0).with_crs(Crs::from_epsg(5070, false));
        assert_eq!(t.units_per_meter(None, None), Some((1.0, 1.0)));
    }
}
