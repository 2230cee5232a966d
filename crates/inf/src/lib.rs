#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(clippy::unwrap_used)]

pub use error::Error;
pub type Result<T = ()> = std::result::Result<T, Error>;

mod error;
pub mod fs;
#[cfg(feature = "gdal")]
#[cfg_attr(docsrs, doc(cfg(feature = "gdal")))]
pub mod gdalinterop;
