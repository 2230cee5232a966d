//! Format implementations the façade dispatches to.
//!
//! A backend reads and writes the datasets of one or more [`VectorFormat`]s. The façade takes care of
//! driver resolution, layer selection, schema conversions and atomic placement of written files,
//! a backend only has to deal with a single resolved layer.

#[cfg(feature = "gdal")]
#[cfg_attr(docsrs, doc(cfg(feature = "gdal")))]
pub mod gdal;
pub mod geojson;
pub mod memory;

#[cfg(feature = "gdal")]
pub use self::gdal::GdalBackend;
pub use self::geojson::GeoJsonBackend;
pub use self::memory::MemoryBackend;

use crate::{DriverDescriptor, FeatureCollection, Result, VectorFormat, filter::LayerFilter};

pub trait VectorBackend: Send + Sync {
    /// Name used in log and error messages
    fn name(&self) -> &str;

    fn supports(&self, format: VectorFormat) -> bool;

    fn exists(&self, path: &str) -> Result<bool>;

    /// The names of the layers in the dataset, in dataset order
    fn layer_names(&self, path: &str, driver: &DriverDescriptor) -> Result<Vec<String>>;

    /// Reads the features of the layer that match the filter.
    /// The filter must be honored completely: either pushed down to the driver or evaluated in memory.
    fn read_layer(&self, path: &str, driver: &DriverDescriptor, layer: &str, filter: &LayerFilter) -> Result<FeatureCollection>;

    /// Writes the collection as layer `layer`, with `append` the layer is added to the existing dataset at `path`
    fn write_layer(
        &self,
        collection: &FeatureCollection,
        path: &str,
        driver: &DriverDescriptor,
        layer: &str,
        append: bool,
    ) -> Result;
}
