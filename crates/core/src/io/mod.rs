//! I/O for vector datasets
//!
//! Shapefiles are read and written natively through the `shapefile` crate;
//! attributes go through its bundled `dbase` support and the CRS through the
//! `.prj` sidecar.

mod native;

pub use native::{read_shapefile, shapefile_components, write_shapefile, WriteOptions};
