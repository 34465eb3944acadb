//! Vector data structures
//!
//! - `Feature`: geometry + attributes
//! - `FeatureCollection`: collection of features
//! - `VectorDataset`: features with their field schema and CRS, as stored on disk

use crate::crs::CRS;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Exact-match comparison against a literal given as text.
    ///
    /// Strings compare exactly once the trailing padding dBase stores is dropped;
    /// leading whitespace is significant. Numbers compare
    /// numerically; booleans accept the usual dBase spellings. Null never matches.
    pub fn matches_literal(&self, literal: &str) -> bool {
        match self {
            AttributeValue::Null => false,
            AttributeValue::String(s) => s.trim_end() == literal,
            AttributeValue::Int(_) | AttributeValue::Float(_) => {
                match (self.as_f64(), literal.trim().parse::<f64>()) {
                    (Some(a), Ok(b)) => a == b,
                    _ => false,
                }
            }
            AttributeValue::Bool(b) => {
                let lit = literal.trim().to_ascii_lowercase();
                match lit.as_str() {
                    "t" | "true" | "y" | "yes" | "1" => *b,
                    "f" | "false" | "n" | "no" | "0" => !*b,
                    _ => false,
                }
            }
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => f.write_str("<null>"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(s) => f.write_str(s),
        }
    }
}

/// Storage type of an attribute field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Character,
    Numeric,
    Float,
    Logical,
    Date,
    Other,
}

/// Schema entry for one attribute field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub length: u8,
    pub decimals: u8,
}

impl FieldDef {
    pub fn character(name: impl Into<String>, length: u8) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Character,
            length,
            decimals: 0,
        }
    }

    pub fn numeric(name: impl Into<String>, length: u8, decimals: u8) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Numeric,
            length,
            decimals,
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.set_property(key, value);
        self
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self { features: Vec::new() }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

/// A feature collection together with its attribute schema and CRS
#[derive(Debug, Clone, Default)]
pub struct VectorDataset {
    pub fields: Vec<FieldDef>,
    pub features: FeatureCollection,
    pub crs: Option<CRS>,
}

impl VectorDataset {
    pub fn new(fields: Vec<FieldDef>, features: FeatureCollection, crs: Option<CRS>) -> Self {
        Self { fields, features, crs }
    }

    /// Look up a field the way dBase does, ignoring case
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        let name = name.trim();
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Short type name of a geometry, for messages and summaries
pub fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
