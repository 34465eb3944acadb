//! # regionbuf core
//!
//! Core types and I/O for regionbuf.
//!
//! This crate provides:
//! - `VectorDataset`, `Feature`, `AttributeValue`: the vector data model
//! - `CRS`, `LinearDistance`: coordinate systems and unit-aware distances
//! - Shapefile reading and writing
//! - Mapping project documents

pub mod crs;
pub mod error;
pub mod io;
pub mod project;
pub mod vector;

pub use crs::{LinearDistance, LinearUnit, CRS};
pub use error::{Error, Result};
pub use vector::{AttributeValue, Feature, FeatureCollection, FieldDef, FieldKind, VectorDataset};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{LinearDistance, LinearUnit, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection, VectorDataset};
}
