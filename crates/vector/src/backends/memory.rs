//! In-process datasets addressed by `memory://<name>` urls.

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock, Mutex, MutexGuard},
};

use super::VectorBackend;
use crate::{DriverDescriptor, Error, FeatureCollection, Result, VectorFormat, filter::LayerFilter};

type Datasets = HashMap<String, Vec<FeatureCollection>>;

static SHARED_DATASETS: LazyLock<Arc<Mutex<Datasets>>> = LazyLock::new(Arc::default);

/// Stores written layers in memory, a dataset can hold multiple layers
#[derive(Clone, Default)]
pub struct MemoryBackend {
    datasets: Arc<Mutex<Datasets>>,
}

impl MemoryBackend {
    /// A backend with its own private datasets
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend on the datasets that are shared by the whole process
    pub fn shared() -> Self {
        Self {
            datasets: Arc::clone(&SHARED_DATASETS),
        }
    }

    /// Adds a layer to the dataset, an existing layer with the same name is replaced
    pub fn insert(&self, path: &str, collection: FeatureCollection) -> Result {
        let mut datasets = self.lock()?;
        let layers = datasets.entry(path.to_string()).or_default();
        layers.retain(|layer| !layer.layer_name().eq_ignore_ascii_case(collection.layer_name()));
        layers.push(collection);
        Ok(())
    }

    /// Removes the dataset, returns the layers it contained
    pub fn remove(&self, path: &str) -> Result<Option<Vec<FeatureCollection>>> {
        Ok(self.lock()?.remove(path))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Datasets>> {
        self.datasets
            .lock()
            .map_err(|_| Error::Runtime("Memory datasets are poisoned".into()))
    }
}

impl VectorBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn supports(&self, format: VectorFormat) -> bool {
        format == VectorFormat::Memory
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(path))
    }

    fn layer_names(&self, path: &str, _driver: &DriverDescriptor) -> Result<Vec<String>> {
        let datasets = self.lock()?;
        let layers = datasets.get(path).ok_or_else(|| Error::FileNotFound(path.into()))?;
        Ok(layers.iter().map(|layer| layer.layer_name().to_string()).collect())
    }

    fn read_layer(&self, path: &str, _driver: &DriverDescriptor, layer: &str, filter: &LayerFilter) -> Result<FeatureCollection> {
        let collection = {
            let datasets = self.lock()?;
            let layers = datasets.get(path).ok_or_else(|| Error::FileNotFound(path.into()))?;
            layers
                .iter()
                .find(|candidate| candidate.layer_name() == layer)
                .or_else(|| layers.iter().find(|candidate| candidate.layer_name().eq_ignore_ascii_case(layer)))
                .cloned()
                .ok_or_else(|| Error::LayerNotFound {
                    path: path.to_string(),
                    layer: layer.to_string(),
                    available: layers.iter().map(|l| l.layer_name().to_string()).collect(),
                })?
        };

        filter.apply(collection)
    }

    fn write_layer(
        &self,
        collection: &FeatureCollection,
        path: &str,
        _driver: &DriverDescriptor,
        layer: &str,
        append: bool,
    ) -> Result {
        let collection = collection.clone().with_layer_name(layer);
        let mut datasets = self.lock()?;
        if append {
            let layers = datasets.entry(path.to_string()).or_default();
            if layers.iter().any(|existing| existing.layer_name().eq_ignore_ascii_case(layer)) {
                return Err(Error::TargetExists(format!("{path}/{layer}").into()));
            }
            layers.push(collection);
        } else {
            datasets.insert(path.to_string(), vec![collection]);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Crs, Schema, format};

    fn layer(name: &str) -> FeatureCollection {
        FeatureCollection::empty(name, Schema::default(), Some(Crs::wgs84()))
    }

    #[test]
    fn multi_layer_datasets() -> Result<()> {
        let backend = MemoryBackend::new();
        let driver = format::driver_by_name("memory")?;

        assert!(!backend.exists("memory://db")?);
        backend.write_layer(&layer("a"), "memory://db", driver, "roads", false)?;
        backend.write_layer(&layer("b"), "memory://db", driver, "rivers", true)?;
        assert!(backend.exists("memory://db")?);
        assert_eq!(backend.layer_names("memory://db", driver)?, vec!["roads", "rivers"]);

        assert!(matches!(
            backend.write_layer(&layer("c"), "memory://db", driver, "ROADS", true),
            Err(Error::TargetExists(_))
        ));

        let rivers = backend.read_layer("memory://db", driver, "Rivers", &LayerFilter::default())?;
        assert_eq!(rivers.layer_name(), "rivers");

        assert!(matches!(
            backend.read_layer("memory://db", driver, "lakes", &LayerFilter::default()),
            Err(Error::LayerNotFound { .. })
        ));
        assert!(matches!(
            backend.layer_names("memory://other", driver),
            Err(Error::FileNotFound(_))
        ));

        // Without append the dataset is replaced
        backend.write_layer(&layer("d"), "memory://db", driver, "lakes", false)?;
        assert_eq!(backend.layer_names("memory://db", driver)?, vec!["lakes"]);
        Ok(())
    }

    #[test]
    fn private_and_shared_datasets() -> Result<()> {
        let private = MemoryBackend::new();
        private.insert("memory://private-only", layer("a"))?;

        assert!(!MemoryBackend::shared().exists("memory://private-only")?);
        assert!(private.clone().exists("memory://private-only")?);
        assert_eq!(private.remove("memory://private-only")?.map(|layers| layers.len()), Some(1));
        Ok(())
    }
}
