/// Length units a caller may request for lengths, resolutions, and
/// `max_length` splitting thresholds.
///
/// `Base` means "whatever unit the CRS's axes are in" and is resolved by
/// the raster crate, which has access to the CRS; this crate only owns the
/// CRS-independent conversions between `Meters`, `Kilometers`, and `Feet`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthUnit {
    Base,
    Meters,
    Kilometers,
    Feet,
    Pixels,
}

const METERS_PER_FOOT: f64 = 0.3048;
const METERS_PER_KILOMETER: f64 = 1000.0;

/// Converts a length already expressed in meters into `to`. Returns `None`
/// for `Base` and `Pixels`, which require raster-specific context
/// (CRS units-per-meter, or pixel resolution) that this crate doesn't have.
pub fn meters_to(value: f64, to: LengthUnit) -> Option<f64> {
    match to {
        LengthUnit::Meters => Some(value),
        LengthUnit::Kilometers => Some(value / METERS_PER_KILOMETER),
        LengthUnit::Feet => Some(value / METERS_PER_FOOT),
        LengthUnit::Base | LengthUnit::Pixels => None,
    }
}

/// Converts a length expressed in `from` into meters. See [`meters_to`].
pub fn to_meters(value: f64, from: LengthUnit) -> Option<f64> {
    match from {
        LengthUnit::Meters => Some(value),
        LengthUnit::Kilometers => Some(value * METERS_PER_KILOMETER),
        LengthUnit::Feet => Some(value * METERS_PER_FOOT),
        LengthUnit::Base | LengthUnit::Pixels => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feet_round_trip() {
        let meters = to_meters(10.0, LengthUnit::Feet).unwrap();
        let back = meters_to(meters, LengthUnit::Feet).unwrap();
        assert!((back - 10.0).abs() < 1e-9);
    }

    #[test]
    fn base_is_unresolved_here() {
        assert_eq!(meters_to(1.0, LengthUnit::Base), None);
    }
}
