//! Coordinate Reference System handling
//!
//! Shapefiles carry their CRS as a WKT string in the `.prj` sidecar. Only the
//! pieces needed for distance conversion are extracted: whether the system is
//! projected or geographic, and the size of its linear unit.

mod units;

pub use units::{LinearDistance, LinearUnit};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Broad family of a coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrsKind {
    Projected,
    Geographic,
    Unknown,
}

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation as found in the `.prj` file
    wkt: String,
    /// Name of the outermost CRS node
    name: Option<String>,
    kind: CrsKind,
    /// Metres per linear unit, for projected systems
    meters_per_unit: Option<f64>,
}

impl CRS {
    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        let wkt = wkt.into();
        let head = wkt.trim_start().to_ascii_uppercase();
        let kind = if head.starts_with("PROJCS") || head.starts_with("PROJCRS") {
            CrsKind::Projected
        } else if head.starts_with("GEOGCS")
            || head.starts_with("GEOGCRS")
            || head.starts_with("GEODCRS")
        {
            CrsKind::Geographic
        } else {
            CrsKind::Unknown
        };

        let name = first_quoted(&wkt).map(str::to_string);
        let meters_per_unit = match kind {
            CrsKind::Projected => last_linear_unit(&wkt),
            _ => None,
        };

        Self {
            wkt,
            name,
            kind,
            meters_per_unit,
        }
    }

    /// Read the `.prj` sidecar next to a shapefile, if there is one
    pub fn read_prj(shp_path: &Path) -> Result<Option<Self>> {
        let prj = shp_path.with_extension("prj");
        if !prj.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&prj)?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::from_wkt(text)))
    }

    /// Write this CRS as the `.prj` sidecar of a shapefile
    pub fn write_prj(&self, shp_path: &Path) -> Result<()> {
        fs::write(shp_path.with_extension("prj"), &self.wkt)?;
        Ok(())
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> CrsKind {
        self.kind
    }

    pub fn is_geographic(&self) -> bool {
        self.kind == CrsKind::Geographic
    }

    /// Metres per linear unit for projected systems
    pub fn meters_per_unit(&self) -> Option<f64> {
        self.meters_per_unit
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let end = self.wkt.char_indices().nth(50).map_or(self.wkt.len(), |(i, _)| i);
        format!("WKT:{}", &self.wkt[..end])
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

fn first_quoted(wkt: &str) -> Option<&str> {
    let start = wkt.find('"')? + 1;
    let len = wkt[start..].find('"')?;
    Some(&wkt[start..start + len])
}

/// Conversion factor of the outermost linear unit.
///
/// In WKT1 the projected system's own `UNIT` is its last child, so the last
/// `UNIT[...]` (or WKT2 `LENGTHUNIT[...]`) in the string wins. Angular units
/// belong to the nested GEOGCS and come earlier.
fn last_linear_unit(wkt: &str) -> Option<f64> {
    let upper = wkt.to_ascii_uppercase();
    let pos = upper.rfind("LENGTHUNIT[").map(|p| p + "LENGTHUNIT[".len()).or_else(|| {
        upper.rfind("UNIT[").map(|p| p + "UNIT[".len())
    })?;
    let args = &wkt[pos..];
    let close = args.find(']')?;
    let mut parts = args[..close].splitn(3, ',');
    let _name = parts.next()?;
    parts.next()?.trim().parse::<f64>().ok().filter(|f| *f > 0.0)
}
