/// An opaque coordinate reference system handle.
///
/// A full CRS/reprojection engine (PROJ-grade datum and projection math) is
/// treated as an external collaborator — this type only carries the
/// metadata the rest of the crate needs to reason
/// about units and equality: an EPSG code and whether the axes are angular
/// (geographic, degrees) or linear (projected, meters/feet/...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Crs {
    epsg: u32,
    geographic: bool,
}

impl Crs {
    pub fn from_epsg(epsg: u32, geographic: bool) -> Self {
        Crs { epsg, geographic }
    }

    /// WGS 84, EPSG:4326.
    pub fn wgs84() -> Self {
        Crs::from_epsg(4326, true)
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn is_geographic(&self) -> bool {
        self.geographic
    }

    /// The linear unit name for this CRS's axes: `"degree"` for geographic
    /// CRSs, `"metre"` otherwise. Projected CRSs in non-metric units (US
    /// survey feet, etc.) are out of scope for this opaque handle; a real
    /// `CrsEngine` implementation can report richer units if needed.
    pub fn units(&self) -> &'static str {
        if self.geographic {
            "degree"
        } else {
            "metre"
        }
    }
}

/// External collaborator: a CRS library capable of reprojecting
/// point coordinates between two coordinate systems, and of measuring
/// great-circle distance for unit conversions in angular CRSs.
pub trait CrsEngine {
    /// Reprojects `(xs, ys)` from `from` to `to`, returning the transformed
    /// coordinates in the same order.
    fn reproject(&self, from: Crs, to: Crs, xs: &[f64], ys: &[f64]) -> (Vec<f64>, Vec<f64>);

    /// Great-circle (haversine) distance in meters between two points given
    /// in `crs`'s native coordinates. Used to convert angular-CRS pixel
    /// sizes into physical lengths.
    fn haversine_meters(&self, crs: Crs, x1: f64, y1: f64, x2: f64, y2: f64) -> f64;
}

/// Haversine distance assuming `(x, y)` are `(longitude, latitude)` in
/// degrees. Shared by any `CrsEngine` implementation that needs the
/// standard spherical-earth approximation; not tied to a specific engine.
pub fn haversine_distance_meters(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_008.8;
    let (lat1_r, lat2_r) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wgs84_is_geographic_in_degrees() {
        let crs = Crs::wgs84();
        assert!(crs.is_geographic());
        assert_eq!(crs.units(), "degree");
    }

    #[test]
    fn haversine_zero_distance() {
        assert_eq!(haversine_distance_meters(-84.0, 43.0, -84.0, 43.0), 0.0);
    }

    #[test]
    fn haversine_one_degree_latitude_is_about_111km() {
        let d = haversine_distance_meters(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111_195.0).abs() < 500.0);
    }
}
