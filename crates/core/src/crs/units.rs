//! Linear units and distances such as `"0.5 Miles"`

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Units accepted in distance strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinearUnit {
    Meters,
    Kilometers,
    Centimeters,
    Millimeters,
    Decimeters,
    Feet,
    FeetUS,
    Inches,
    Yards,
    Miles,
    NauticalMiles,
    DecimalDegrees,
    /// Same units as the dataset coordinates
    Unknown,
}

impl LinearUnit {
    /// Size of one unit in metres, if it is a length at all
    pub fn meters(&self) -> Option<f64> {
        match self {
            LinearUnit::Meters => Some(1.0),
            LinearUnit::Kilometers => Some(1000.0),
            LinearUnit::Centimeters => Some(0.01),
            LinearUnit::Millimeters => Some(0.001),
            LinearUnit::Decimeters => Some(0.1),
            LinearUnit::Feet => Some(0.3048),
            LinearUnit::FeetUS => Some(1200.0 / 3937.0),
            LinearUnit::Inches => Some(0.0254),
            LinearUnit::Yards => Some(0.9144),
            LinearUnit::Miles => Some(1609.344),
            LinearUnit::NauticalMiles => Some(1852.0),
            LinearUnit::DecimalDegrees | LinearUnit::Unknown => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LinearUnit::Meters => "Meters",
            LinearUnit::Kilometers => "Kilometers",
            LinearUnit::Centimeters => "Centimeters",
            LinearUnit::Millimeters => "Millimeters",
            LinearUnit::Decimeters => "Decimeters",
            LinearUnit::Feet => "Feet",
            LinearUnit::FeetUS => "FeetUS",
            LinearUnit::Inches => "Inches",
            LinearUnit::Yards => "Yards",
            LinearUnit::Miles => "Miles",
            LinearUnit::NauticalMiles => "NauticalMiles",
            LinearUnit::DecimalDegrees => "DecimalDegrees",
            LinearUnit::Unknown => "Unknown",
        }
    }
}

impl FromStr for LinearUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        let unit = match key.as_str() {
            "m" | "meter" | "meters" | "metre" | "metres" => LinearUnit::Meters,
            "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => {
                LinearUnit::Kilometers
            }
            "cm" | "centimeter" | "centimeters" => LinearUnit::Centimeters,
            "mm" | "millimeter" | "millimeters" => LinearUnit::Millimeters,
            "dm" | "decimeter" | "decimeters" => LinearUnit::Decimeters,
            "ft" | "foot" | "feet" | "internationalfeet" => LinearUnit::Feet,
            "ftus" | "feetus" | "footus" | "ussurveyfeet" => LinearUnit::FeetUS,
            "in" | "inch" | "inches" => LinearUnit::Inches,
            "yd" | "yard" | "yards" => LinearUnit::Yards,
            "mi" | "mile" | "miles" | "statutemiles" => LinearUnit::Miles,
            "nmi" | "nauticalmile" | "nauticalmiles" => LinearUnit::NauticalMiles,
            "dd" | "degree" | "degrees" | "decimaldegrees" => LinearUnit::DecimalDegrees,
            "unknown" => LinearUnit::Unknown,
            _ => {
                return Err(Error::InvalidParameter {
                    name: "unit",
                    value: s.to_string(),
                    reason: "unrecognized linear unit".into(),
                })
            }
        };
        Ok(unit)
    }
}

impl fmt::Display for LinearUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A magnitude with its unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearDistance {
    pub value: f64,
    pub unit: LinearUnit,
}

impl LinearDistance {
    pub fn new(value: f64, unit: LinearUnit) -> Self {
        Self { value, unit }
    }

    /// The distance expressed in metres, when the unit is a length
    pub fn meters(&self) -> Option<f64> {
        self.unit.meters().map(|m| self.value * m)
    }
}

impl FromStr for LinearDistance {
    type Err = Error;

    /// Parse `"<value> [unit]"`; a bare number is in dataset units.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::InvalidParameter {
            name: "buffer_distance",
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| c.is_whitespace())
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);

        let value: f64 = number
            .parse()
            .map_err(|_| invalid("expected a number followed by an optional unit"))?;
        if !value.is_finite() {
            return Err(invalid("distance must be finite"));
        }

        let unit = match unit.trim() {
            "" => LinearUnit::Unknown,
            u => u.parse::<LinearUnit>()?,
        };

        Ok(Self { value, unit })
    }
}

impl fmt::Display for LinearDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}
