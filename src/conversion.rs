//! ==============================================================================
//! conversion.rs - unit conversions applied at projection time
//! ==============================================================================
//!
//! purpose:
//!     sensors report metric (km/h, °C, hPa) and compass labels. the display and
//!     weather underground want imperial units and degrees. payload trees always
//!     carry the native value; conversion only happens when a sink reads it.
//!
//! relationships:
//!     - used by: projector.rs (ConversionSpec), sinks/display.rs, sensors.rs (CompassPoint)
//!     - raises: ConversionError::UnknownDirection
//!
//! ==============================================================================

use crate::error::ConversionError;
use std::fmt;
use std::str::FromStr;

pub const KMH_TO_MPH: f64 = 0.621371;
pub const HPA_PER_INHG: f64 = 33.863886666667;

/// km/h -> mph
pub fn speed_convert(kmh: f64) -> f64 {
    kmh * KMH_TO_MPH
}

/// mph -> km/h
pub fn speed_unconvert(mph: f64) -> f64 {
    mph / KMH_TO_MPH
}

/// °C -> °F
pub fn temperature_convert(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// °F -> °C
pub fn temperature_unconvert(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// hPa -> inHg
pub fn pressure_convert(hpa: f64) -> f64 {
    hpa / HPA_PER_INHG
}

/// inHg -> hPa
pub fn pressure_unconvert(inhg: f64) -> f64 {
    inhg * HPA_PER_INHG
}

/// Maps one of the 16 compass-point labels to degrees.
///
/// Anything else is an error; a wrong default here would end up as a wrong
/// wind direction on weather underground.
pub fn compass_to_degrees(label: &str) -> Result<f64, ConversionError> {
    label.parse::<CompassPoint>().map(CompassPoint::degrees)
}

/// the 16 points of the compass, clockwise from north
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompassPoint {
    N,
    Nne,
    Ne,
    Ene,
    E,
    Ese,
    Se,
    Sse,
    S,
    Ssw,
    Sw,
    Wsw,
    W,
    Wnw,
    Nw,
    Nnw,
}

impl CompassPoint {
    pub const ALL: [CompassPoint; 16] = [
        CompassPoint::N,
        CompassPoint::Nne,
        CompassPoint::Ne,
        CompassPoint::Ene,
        CompassPoint::E,
        CompassPoint::Ese,
        CompassPoint::Se,
        CompassPoint::Sse,
        CompassPoint::S,
        CompassPoint::Ssw,
        CompassPoint::Sw,
        CompassPoint::Wsw,
        CompassPoint::W,
        CompassPoint::Wnw,
        CompassPoint::Nw,
        CompassPoint::Nnw,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CompassPoint::N => "N",
            CompassPoint::Nne => "NNE",
            CompassPoint::Ne => "NE",
            CompassPoint::Ene => "ENE",
            CompassPoint::E => "E",
            CompassPoint::Ese => "ESE",
            CompassPoint::Se => "SE",
            CompassPoint::Sse => "SSE",
            CompassPoint::S => "S",
            CompassPoint::Ssw => "SSW",
            CompassPoint::Sw => "SW",
            CompassPoint::Wsw => "WSW",
            CompassPoint::W => "W",
            CompassPoint::Wnw => "WNW",
            CompassPoint::Nw => "NW",
            CompassPoint::Nnw => "NNW",
        }
    }

    /// 22.5° per point, N = 0
    pub fn degrees(self) -> f64 {
        self.index() as f64 * 22.5
    }

    /// nearest point for a bearing in degrees (any value, wraps)
    pub fn from_degrees(degrees: f64) -> Self {
        let step = (degrees.rem_euclid(360.0) / 22.5).round() as usize % 16;
        Self::ALL[step]
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|p| *p == self).unwrap_or(0)
    }
}

impl FromStr for CompassPoint {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.label() == s)
            .ok_or_else(|| ConversionError::UnknownDirection(s.to_string()))
    }
}

impl fmt::Display for CompassPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ==============================================================================
// conversion spec - the closed set of projection-time conversions
// ==============================================================================

/// a conversion applied to a leaf when it is projected out of a payload tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionSpec {
    Identity,
    CompassToDegrees,
    Speed,
    Temperature,
    Pressure,
}

impl ConversionSpec {
    /// true when the leaf must be read as text rather than a number
    pub fn takes_text(self) -> bool {
        matches!(self, ConversionSpec::CompassToDegrees)
    }

    pub fn apply_number(self, v: f64) -> Result<f64, ConversionError> {
        match self {
            ConversionSpec::Identity => Ok(v),
            ConversionSpec::Speed => Ok(speed_convert(v)),
            ConversionSpec::Temperature => Ok(temperature_convert(v)),
            ConversionSpec::Pressure => Ok(pressure_convert(v)),
            ConversionSpec::CompassToDegrees => {
                Err(ConversionError::UnknownDirection(v.to_string()))
            }
        }
    }

    /// text leaves are compass labels; only CompassToDegrees reads them
    pub fn apply_text(self, label: &str) -> Result<f64, ConversionError> {
        match self {
            ConversionSpec::CompassToDegrees => compass_to_degrees(label),
            _ => Err(ConversionError::UnknownDirection(label.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn compass_points_step_by_22_5() {
        for (i, point) in CompassPoint::ALL.iter().enumerate() {
            let deg = compass_to_degrees(point.label()).unwrap();
            assert_eq!(deg, i as f64 * 22.5);
            assert!((0.0..=337.5).contains(&deg));
        }
        assert_eq!(compass_to_degrees("N").unwrap(), 0.0);
        assert_eq!(compass_to_degrees("NNW").unwrap(), 337.5);
    }

    #[test]
    fn unknown_compass_label_fails() {
        for bad in ["", "n", "NORTH", "NNNE", " N", "360"] {
            assert_eq!(
                compass_to_degrees(bad),
                Err(ConversionError::UnknownDirection(bad.to_string()))
            );
        }
    }

    #[test]
    fn nearest_point_from_bearing() {
        assert_eq!(CompassPoint::from_degrees(0.0), CompassPoint::N);
        assert_eq!(CompassPoint::from_degrees(350.0), CompassPoint::N);
        assert_eq!(CompassPoint::from_degrees(-90.0), CompassPoint::W);
        assert_eq!(CompassPoint::from_degrees(100.0), CompassPoint::E);
        assert_eq!(CompassPoint::from_degrees(202.5), CompassPoint::Ssw);
    }

    #[test]
    fn temperature_fixed_points() {
        assert_eq!(temperature_convert(0.0), 32.0);
        assert_eq!(temperature_convert(100.0), 212.0);
        assert_eq!(temperature_convert(-40.0), -40.0);
    }

    #[test]
    fn conversions_invert() {
        for v in [-30.0, 0.0, 1.5, 17.25, 1013.25, 250.0] {
            assert!((speed_unconvert(speed_convert(v)) - v).abs() < EPS);
            assert!((temperature_unconvert(temperature_convert(v)) - v).abs() < EPS);
            assert!((pressure_unconvert(pressure_convert(v)) - v).abs() < EPS);
        }
    }

    #[test]
    fn speed_and_pressure_factors() {
        assert!((speed_convert(10.0) - 6.21371).abs() < EPS);
        assert!((pressure_convert(1013.25) - 29.921).abs() < 1e-3);
    }

    #[test]
    fn spec_dispatch() {
        assert_eq!(ConversionSpec::Identity.apply_number(4.2), Ok(4.2));
        assert_eq!(ConversionSpec::Temperature.apply_number(100.0), Ok(212.0));
        assert_eq!(ConversionSpec::CompassToDegrees.apply_text("SW"), Ok(225.0));
        assert!(ConversionSpec::CompassToDegrees.takes_text());
        assert!(!ConversionSpec::Speed.takes_text());
    }
}
