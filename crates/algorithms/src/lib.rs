//! # regionbuf algorithms
//!
//! Vector algorithms and the geoprocessing workflow for regionbuf.
//!
//! ## Modules
//!
//! - **vector**: Buffer and dissolve, extent, area
//! - **filter**: Exact-match attribute filters and field delimiting
//! - **engine**: The `Geoprocessor` tool surface and its native implementation
//! - **workflow**: Select a named region, buffer it, write and publish the result

pub mod engine;
pub mod filter;
mod maybe_rayon;
pub mod vector;
pub mod workflow;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::engine::{
        BufferOptions, BufferSummary, DissolveOption, Geoprocessor, Layer, NativeGeoprocessor,
        SelectionType, Severity,
    };
    pub use crate::filter::{AttributeFilter, FieldDelimiter};
    pub use crate::vector::{buffer_dissolve, buffer_geometry, BufferParams};
    pub use crate::workflow::{
        buffer_named_region, BufferOutcome, PublishStatus, RegionBufferParams,
    };
    pub use regionbuf_core::prelude::*;
}
