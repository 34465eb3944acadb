//! Vector analysis algorithms
//!
//! Geometric operations on vector features:
//! - Buffer: expand or shrink geometries, optionally dissolving the result
//! - Bounding box / extent
//! - Area

mod buffer;
mod measurements;
mod spatial;

pub use buffer::{buffer_dissolve, buffer_geometry, buffer_points, BufferParams};
pub use measurements::area;
pub use spatial::{bounding_box, extent, BoundingBox};
