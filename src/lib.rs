//! Vector data I/O for Shapefile, GeoPackage and GeoJSON datasets.
//!
//! The functionality lives in the workspace crates, this crate re-exports them.
//! Enable the `gdal` feature for the GDAL backed formats and virtual file systems,
//! and the `http` feature to read GeoJSON over http without GDAL.

pub use inf;
pub use vector;

#[doc(inline)]
pub use vector::{
    BoundingBox, Crs, DriverDescriptor, Error, Feature, FeatureCollection, Field, FieldInfo, FieldType, Geometry, GeometryType,
    ReadOptions, Result, Schema, Shape, SpatialFilter, VectorFormat, VectorIo, VirtualPath, WriteOptions, list_layers, read,
    write,
};

#[cfg(feature = "gdal")]
#[doc(inline)]
pub use vector::RuntimeConfiguration;
