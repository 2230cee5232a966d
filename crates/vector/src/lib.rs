//! Vector data I/O: read Shapefile, GeoPackage and GeoJSON layers into one in-memory
//! representation, optionally filtered at load time, and write them back to any supported format.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(clippy::unwrap_used)]

pub type Result<T = ()> = std::result::Result<T, Error>;

pub mod backends;
pub mod crs;
mod error;
pub mod feature;
pub mod fieldtype;
pub mod filter;
pub mod format;
pub mod geometry;
pub mod io;
pub mod query;
#[cfg(feature = "gdal")]
#[cfg_attr(docsrs, doc(cfg(feature = "gdal")))]
mod runtimeconfiguration;
pub mod schema;
pub mod vfs;
pub mod vsi;

#[doc(inline)]
pub use crs::Crs;
#[doc(inline)]
pub use error::Error;
#[doc(inline)]
pub use feature::{Feature, FeatureCollection};
#[doc(inline)]
pub use filter::SpatialFilter;
#[doc(inline)]
pub use format::{DriverDescriptor, VectorFormat};
#[doc(inline)]
pub use geometry::{BoundingBox, Geometry, GeometryType, Shape};
#[doc(inline)]
pub use io::{ReadOptions, VectorIo, WriteOptions, list_layers, read, write};
#[cfg(feature = "gdal")]
pub use runtimeconfiguration::RuntimeConfiguration;
#[doc(inline)]
pub use schema::{Field, FieldInfo, FieldType, Schema};
#[doc(inline)]
pub use vsi::{Archive, Stage, Transport, VirtualPath};
