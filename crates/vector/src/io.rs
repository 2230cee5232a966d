//! The read/write façade: driver resolution, layer selection, filters and atomic placement of written files.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use inf::fs::StagingDirectory;
use itertools::Itertools;

#[cfg(feature = "gdal")]
use crate::backends::GdalBackend;
use crate::{
    DriverDescriptor, Error, Feature, FeatureCollection, Field, FieldInfo, FieldType, GeometryType, Result, Schema, SpatialFilter,
    VectorFormat, VirtualPath,
    backends::{GeoJsonBackend, MemoryBackend, VectorBackend},
    filter::LayerFilter,
    format::{self, FieldSupport},
    query::Query,
    vfs::StandardFileSystem,
};

/// Options for [`read`]
#[derive(Clone, Debug, Default)]
pub struct ReadOptions {
    /// Explicit driver name, inferred from the path when not provided
    pub driver: Option<String>,
    /// The layer to read, required for datasets with multiple layers unless the attribute query names the layer.
    /// Ignored for single layer formats.
    pub layer: Option<String>,
    /// `SELECT <columns> FROM <layer> [WHERE <predicate>]`
    pub attribute_query: Option<String>,
    pub spatial_filter: Option<SpatialFilter>,
    /// Number of matching features to skip
    pub skip_features: usize,
    /// Maximum number of features to return
    pub max_features: Option<usize>,
}

/// Options for [`write`]
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// Explicit driver name, inferred from the path when not provided
    pub driver: Option<String>,
    /// Replace an existing target
    pub overwrite: bool,
    /// Name of the written layer, defaults to the file stem
    pub layer: Option<String>,
    /// Add the layer to an existing dataset (multi layer formats only)
    pub append_layer: bool,
}

/// Dispatches reads and writes to the first backend that supports the resolved format
pub struct VectorIo {
    backends: Vec<Box<dyn VectorBackend>>,
}

impl Default for VectorIo {
    /// The shared memory datasets, GDAL (when enabled) and the native GeoJSON backend
    fn default() -> Self {
        let io = VectorIo::new().with_backend(MemoryBackend::shared());
        #[cfg(feature = "gdal")]
        let io = io.with_backend(GdalBackend);
        io.with_backend(GeoJsonBackend::new(StandardFileSystem))
    }
}

impl VectorIo {
    /// A façade without backends, add them using [`VectorIo::with_backend`]
    pub fn new() -> Self {
        Self { backends: Vec::new() }
    }

    /// Appends a backend, backends added first take precedence
    pub fn with_backend(mut self, backend: impl VectorBackend + 'static) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    fn backend(&self, driver: &DriverDescriptor) -> Result<&dyn VectorBackend> {
        let backend = self
            .backends
            .iter()
            .find(|backend| backend.supports(driver.format))
            .ok_or_else(|| Error::UnsupportedDriver {
                driver: driver.name.to_string(),
                reason: "no backend available for this format (is the gdal feature enabled?)".into(),
            })?;

        log::debug!("Using the {} backend for {}", backend.name(), driver.name);
        Ok(backend.as_ref())
    }

    fn check_exists(backend: &dyn VectorBackend, path: &str) -> Result {
        if backend.exists(path)? {
            Ok(())
        } else {
            Err(Error::FileNotFound(PathBuf::from(path)))
        }
    }

    /// The names of the layers in the dataset
    pub fn list_layers(&self, path: &str) -> Result<Vec<String>> {
        let driver = format::resolve(path, None)?;
        let backend = self.backend(driver)?;
        Self::check_exists(backend, path)?;
        backend.layer_names(path, driver)
    }

    /// Reads a single layer, the attribute query and the spatial filter are both applied to the features
    pub fn read(&self, path: &str, options: &ReadOptions) -> Result<FeatureCollection> {
        let driver = format::resolve(path, options.driver.as_deref())?;
        if !driver.readable {
            return Err(Error::UnsupportedDriver {
                driver: driver.name.to_string(),
                reason: "the driver can not read".into(),
            });
        }

        let backend = self.backend(driver)?;
        Self::check_exists(backend, path)?;

        let query = options.attribute_query.as_deref().map(Query::parse).transpose()?;
        let layer = select_layer(backend, path, driver, options.layer.as_deref(), query.as_ref())?;
        log::debug!("Reading layer '{layer}' of '{path}'");

        let filter = LayerFilter::new(query, options.spatial_filter.clone()).with_range(options.skip_features, options.max_features);
        backend.read_layer(path, driver, &layer, &filter)
    }

    /// Writes the collection as a single layer dataset, or adds it as a layer with [`WriteOptions::append_layer`].
    /// Local targets are only replaced when the complete dataset was written successfully.
    ///
    /// Remote targets are not writable. Targets inside an archive (`/vsizip/`, `/vsigzip/`, ...) are written in place,
    /// a failed write can leave a partial archive behind, so existing archive targets are never overwritten.
    pub fn write(&self, collection: &FeatureCollection, path: &str, options: &WriteOptions) -> Result {
        let driver = format::resolve(path, options.driver.as_deref())?;
        if !driver.writable {
            return Err(Error::UnsupportedDriver {
                driver: driver.name.to_string(),
                reason: "the driver can not write".into(),
            });
        }

        if options.append_layer && !driver.multi_layer {
            return Err(Error::UnsupportedDriver {
                driver: driver.name.to_string(),
                reason: "appending layers requires a multi layer format".into(),
            });
        }

        let in_memory = driver.format == VectorFormat::Memory;
        let vpath = VirtualPath::parse(path)?;
        if !in_memory && vpath.is_remote() {
            return Err(Error::UnsupportedDriver {
                driver: driver.name.to_string(),
                reason: format!("remote targets can not be written: {path}"),
            });
        }

        let backend = self.backend(driver)?;
        let layer = options.layer.clone().unwrap_or_else(|| default_layer_name(path, driver));

        let exists = backend.exists(path)?;
        if exists && !in_memory && vpath.is_virtual() && (options.overwrite || options.append_layer) {
            return Err(Error::UnsupportedDriver {
                driver: driver.name.to_string(),
                reason: format!("an existing archive can not be replaced or extended safely: {path}"),
            });
        }

        if exists && options.append_layer {
            let layers = backend.layer_names(path, driver)?;
            if find_layer(&layers, &layer).is_some() {
                return Err(Error::TargetExists(PathBuf::from(format!("{path}/{layer}"))));
            }
        } else if exists && !options.overwrite {
            return Err(Error::TargetExists(PathBuf::from(path)));
        }

        let append = exists && options.append_layer;
        let collection = prepare_for_driver(collection, driver)?;

        if in_memory || vpath.is_virtual() {
            backend.write_layer(&collection, path, driver, &layer, append)?;
        } else {
            write_staged(backend, &collection, Path::new(path), driver, &layer, append, exists)?;
        }

        log::info!("Wrote {} features to layer '{layer}' of '{path}'", collection.len());
        Ok(())
    }
}

/// Writes to a temporary location next to the target, the output is moved in place when the backend succeeded
fn write_staged(
    backend: &dyn VectorBackend,
    collection: &FeatureCollection,
    target: &Path,
    driver: &DriverDescriptor,
    layer: &str,
    append: bool,
    exists: bool,
) -> Result {
    let staging = StagingDirectory::for_target(target)?;
    if append {
        staging.stage_existing(driver.sidecar_extensions)?;
    }

    let staged_path = staging.staged_path();
    backend.write_layer(collection, &staged_path.to_string_lossy(), driver, layer, append)?;

    let placed = staging.commit()?;
    if exists && !append {
        inf::fs::remove_stale_sidecars(target, driver.sidecar_extensions, &placed)?;
    }

    Ok(())
}

fn find_layer<'a>(layers: &'a [String], name: &str) -> Option<&'a String> {
    layers
        .iter()
        .find(|layer| *layer == name)
        .or_else(|| layers.iter().find(|layer| layer.eq_ignore_ascii_case(name)))
}

/// Determines the layer to read from the layer option, the FROM clause of the query and the layers in the dataset
fn select_layer(
    backend: &dyn VectorBackend,
    path: &str,
    driver: &DriverDescriptor,
    requested: Option<&str>,
    query: Option<&Query>,
) -> Result<String> {
    let layers = backend.layer_names(path, driver)?;
    let from = query.map(Query::layer);
    let not_found = |layer: &str| Error::LayerNotFound {
        path: path.to_string(),
        layer: layer.to_string(),
        available: layers.clone(),
    };

    if !driver.multi_layer {
        if let Some(layer) = requested {
            log::debug!("Layer option '{layer}' ignored, {} datasets contain a single layer", driver.name);
        }

        let single = layers.first().ok_or_else(|| not_found(from.unwrap_or_default()))?;
        return match from {
            Some(from) if !from.eq_ignore_ascii_case(single) => Err(not_found(from)),
            _ => Ok(single.clone()),
        };
    }

    let name = match (requested, from) {
        (Some(layer), Some(from)) if !layer.eq_ignore_ascii_case(from) => {
            return Err(Error::MalformedQuery(format!(
                "the query selects from '{from}' but layer '{layer}' was requested"
            )));
        }
        (Some(layer), _) => Some(layer),
        (None, from) => from,
    };

    match name {
        Some(name) => find_layer(&layers, name).cloned().ok_or_else(|| not_found(name)),
        None => match layers.as_slice() {
            [] => Err(not_found("")),
            [single] => Ok(single.clone()),
            _ => Err(Error::LayerAmbiguous {
                path: path.to_string(),
                layers: layers.clone(),
            }),
        },
    }
}

fn default_layer_name(path: &str, driver: &DriverDescriptor) -> String {
    const FALLBACK: &str = "layer";
    if driver.format == VectorFormat::Memory {
        return FALLBACK.to_string();
    }

    let file_name = VirtualPath::parse(path).map_or_else(|_| path.to_string(), |vpath| vpath.file_name().to_string());
    let file_name = file_name.strip_suffix(".gz").unwrap_or(&file_name);
    let stem = Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();

    match stem.strip_suffix(".shp").unwrap_or(&stem) {
        "" => FALLBACK.to_string(),
        stem => stem.to_string(),
    }
}

fn truncate_field_name(name: &str, max_len: usize) -> &str {
    let mut end = max_len.min(name.len());
    while !name.is_char_boundary(end) {
        end -= 1;
    }

    &name[..end]
}

fn convert_field(field: Field, field_type: FieldType) -> Field {
    match (field, field_type) {
        (Field::Boolean(val), FieldType::Integer) => Field::Integer(i64::from(val)),
        (field, _) => field,
    }
}

fn check_geometry_families(collection: &FeatureCollection, driver: &DriverDescriptor) -> Result {
    if driver.mixed_geometry_families {
        return Ok(());
    }

    let types = collection.geometry_types();
    if types.iter().map(GeometryType::family).unique().count() > 1 {
        return Err(Error::SchemaIncompatible {
            driver: driver.name.to_string(),
            field: "geometry".into(),
            reason: format!("geometry types {} can not be stored in one layer", types.iter().join(", ")),
        });
    }

    Ok(())
}

/// Applies the lossy conversions of the driver: field types stored as another type and truncated field names
fn prepare_for_driver<'a>(collection: &'a FeatureCollection, driver: &DriverDescriptor) -> Result<Cow<'a, FeatureCollection>> {
    check_geometry_families(collection, driver)?;

    let mut fields: Vec<FieldInfo> = Vec::with_capacity(collection.schema().len());
    for info in &collection.schema().fields {
        let field_type = match driver.field_support(info.field_type()) {
            FieldSupport::Native => info.field_type(),
            FieldSupport::Lossy(stored_type) => {
                log::warn!(
                    "Field '{}' of type {} is stored as {stored_type} by the {} driver",
                    info.name(),
                    info.field_type(),
                    driver.name
                );
                stored_type
            }
            FieldSupport::Unsupported => {
                return Err(Error::SchemaIncompatible {
                    driver: driver.name.to_string(),
                    field: info.name().to_string(),
                    reason: format!("{} fields are not supported", info.field_type()),
                });
            }
        };

        let name = match driver.max_field_name_len {
            Some(max_len) if info.name().len() > max_len => {
                let truncated = truncate_field_name(info.name(), max_len);
                log::warn!("Field name '{}' is truncated to '{truncated}' by the {} driver", info.name(), driver.name);
                truncated
            }
            _ => info.name(),
        };

        if fields.iter().any(|field| field.name().eq_ignore_ascii_case(name)) {
            return Err(Error::SchemaIncompatible {
                driver: driver.name.to_string(),
                field: info.name().to_string(),
                reason: format!("the stored field name '{name}' is not unique"),
            });
        }

        fields.push(FieldInfo::new(name, field_type));
    }

    let schema = Schema::new(fields);
    if &schema == collection.schema() {
        return Ok(Cow::Borrowed(collection));
    }

    let features = collection
        .features()
        .iter()
        .map(|feature| {
            let attributes = feature
                .attributes()
                .iter()
                .zip(&schema.fields)
                .map(|(val, info)| val.clone().map(|val| convert_field(val, info.field_type())))
                .collect();
            Feature::new(feature.geometry().cloned(), attributes)
        })
        .collect();

    Ok(Cow::Owned(FeatureCollection::new(
        collection.layer_name(),
        schema,
        collection.crs().cloned(),
        features,
    )?))
}

/// Reads a layer using the default backends
pub fn read(path: &str, options: &ReadOptions) -> Result<FeatureCollection> {
    VectorIo::default().read(path, options)
}

/// Writes a layer using the default backends
pub fn write(collection: &FeatureCollection, path: &str, options: &WriteOptions) -> Result {
    VectorIo::default().write(collection, path, options)
}

/// Lists the layers of a dataset using the default backends
pub fn list_layers(path: &str) -> Result<Vec<String>> {
    VectorIo::default().list_layers(path)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use geo_types::{line_string, point, polygon};

    use super::*;
    use crate::{Crs, Geometry, Shape};

    fn io() -> VectorIo {
        VectorIo::new().with_backend(MemoryBackend::new())
    }

    fn towns(layer: &str) -> FeatureCollection {
        let schema = Schema::new(vec![
            FieldInfo::new("name", FieldType::String),
            FieldInfo::new("population", FieldType::Integer),
        ]);

        let town = |name: &str, population: i64, x: f64, y: f64| {
            Feature::new(
                Some(Geometry::new(Shape::Point(point!(x: x, y: y)), None)),
                vec![Some(Field::String(name.into())), Some(Field::Integer(population))],
            )
        };

        FeatureCollection::new(
            layer,
            schema,
            Some(Crs::wgs84()),
            vec![town("Mol", 37_000, 5.11, 51.19), town("Geel", 41_000, 4.99, 51.16), town("Dessel", 9_700, 5.11, 51.24)],
        )
        .expect("valid collection")
    }

    fn append(layer: &str) -> WriteOptions {
        WriteOptions {
            layer: Some(layer.into()),
            append_layer: true,
            ..Default::default()
        }
    }

    #[test_log::test]
    fn layer_selection() -> Result<()> {
        let io = io();
        io.write(&towns("a"), "memory://kempen", &append("towns"))?;
        io.write(&towns("b"), "memory://kempen", &append("villages"))?;

        assert!(matches!(
            io.read("memory://kempen", &ReadOptions::default()),
            Err(Error::LayerAmbiguous { .. })
        ));

        let read = |layer: Option<&str>, query: Option<&str>| {
            io.read(
                "memory://kempen",
                &ReadOptions {
                    layer: layer.map(str::to_string),
                    attribute_query: query.map(str::to_string),
                    ..Default::default()
                },
            )
        };

        assert_eq!(read(Some("villages"), None)?.layer_name(), "villages");
        assert_eq!(read(None, Some("SELECT * FROM towns"))?.layer_name(), "towns");
        assert_eq!(read(Some("TOWNS"), Some("SELECT * FROM towns"))?.layer_name(), "towns");
        assert!(matches!(read(Some("villages"), Some("SELECT * FROM towns")), Err(Error::MalformedQuery(_))));
        assert!(matches!(read(Some("cities"), None), Err(Error::LayerNotFound { .. })));
        assert!(matches!(read(None, Some("SELECT * FROM towns WHERE")), Err(Error::MalformedQuery(_))));

        assert_eq!(io.list_layers("memory://kempen")?, vec!["towns", "villages"]);
        Ok(())
    }

    #[test_log::test]
    fn single_layer_dataset() -> Result<()> {
        let io = io();
        io.write(&towns("towns"), "memory://single", &WriteOptions::default())?;

        // A memory dataset is multi layer, a single layer is selected without a name
        let read = io.read("memory://single", &ReadOptions::default())?;
        assert_eq!(read.layer_name(), "layer");
        assert_eq!(read.len(), 3);
        Ok(())
    }

    #[test_log::test]
    fn read_with_filters_and_range() -> Result<()> {
        let io = io();
        io.write(&towns("towns"), "memory://filters", &WriteOptions::default())?;

        let read = io.read(
            "memory://filters",
            &ReadOptions {
                attribute_query: Some("SELECT name FROM layer WHERE population > 10000".into()),
                spatial_filter: Some(SpatialFilter::from_wkt(
                    "POLYGON ((5 51, 5.2 51, 5.2 51.3, 5 51.3, 5 51))",
                    Some(Crs::wgs84()),
                )?),
                ..Default::default()
            },
        )?;

        assert_eq!(read.schema().names().collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(read.iter().map(|f| f.get::<String>("name")).collect::<Result<Vec<_>>>()?, vec![Some("Mol".to_string())]);

        let ranged = io.read(
            "memory://filters",
            &ReadOptions {
                skip_features: 1,
                max_features: Some(1),
                ..Default::default()
            },
        )?;
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged.iter().next().and_then(|f| f.get::<String>("name").ok().flatten()).as_deref(), Some("Geel"));
        Ok(())
    }

    #[test_log::test]
    fn write_guards() -> Result<()> {
        let io = io();
        io.write(&towns("towns"), "memory://guard", &WriteOptions::default())?;

        assert!(matches!(
            io.write(&towns("towns"), "memory://guard", &WriteOptions::default()),
            Err(Error::TargetExists(_))
        ));
        assert!(matches!(
            io.write(&towns("towns"), "memory://guard", &append("layer")),
            Err(Error::TargetExists(_))
        ));

        io.write(
            &towns("towns").filter(|f| f.get::<i64>("population").ok().flatten() == Some(9_700)),
            "memory://guard",
            &WriteOptions {
                overwrite: true,
                ..Default::default()
            },
        )?;
        assert_eq!(io.read("memory://guard", &ReadOptions::default())?.len(), 1);
        Ok(())
    }

    #[test]
    fn missing_dataset_and_backend() {
        assert!(matches!(io().read("memory://missing", &ReadOptions::default()), Err(Error::FileNotFound(_))));
        assert!(matches!(
            io().read("/data/roads.gpkg", &ReadOptions::default()),
            Err(Error::UnsupportedDriver { .. })
        ));
        assert!(matches!(io().read("/data/roads.txt", &ReadOptions::default()), Err(Error::UnknownFormat(_))));
        assert!(matches!(
            VectorIo::new().with_backend(GeoJsonBackend::new(StandardFileSystem)).write(
                &towns("towns"),
                "memory://roads",
                &append("roads")
            ),
            Err(Error::UnsupportedDriver { .. })
        ));
    }

    #[test]
    fn append_requires_multi_layer_driver() {
        assert!(matches!(
            io().write(&towns("towns"), "/tmp/towns.geojson", &append("towns")),
            Err(Error::UnsupportedDriver { .. })
        ));
    }

    #[test]
    fn default_layer_names() -> Result<()> {
        let name = |path: &str| -> Result<String> { Ok(default_layer_name(path, format::resolve(path, None)?)) };

        assert_eq!(name("/data/roads.shp")?, "roads");
        assert_eq!(name("/data/roads.shp.zip")?, "roads");
        assert_eq!(name("/data/roads.shz")?, "roads");
        assert_eq!(name("/vsigzip//data/rivers.geojson.gz")?, "rivers");
        assert_eq!(name("memory://anything")?, "layer");
        Ok(())
    }

    #[test_log::test]
    fn shapefile_conversions() -> Result<()> {
        let shapefile = format::driver_by_name("ESRI Shapefile")?;
        let schema = Schema::new(vec![
            FieldInfo::new("is_capital", FieldType::Boolean),
            FieldInfo::new("population_2020", FieldType::Integer),
            FieldInfo::new("population_2021", FieldType::Integer),
        ]);
        let collection = FeatureCollection::new(
            "towns",
            schema,
            None,
            vec![Feature::new(
                None,
                vec![Some(Field::Boolean(true)), Some(Field::Integer(1)), Some(Field::Integer(2))],
            )],
        )?;

        // Truncation of both population fields results in the same name
        match prepare_for_driver(&collection, shapefile) {
            Err(Error::SchemaIncompatible { field, .. }) => assert_eq!(field, "population_2021"),
            other => panic!("Unexpected result: {other:?}"),
        }

        let collection = collection.select(&["is_capital", "population_2020"])?;
        let prepared = prepare_for_driver(&collection, shapefile)?;
        assert_eq!(
            prepared.schema(),
            &Schema::new(vec![
                FieldInfo::new("is_capital", FieldType::Integer),
                FieldInfo::new("population", FieldType::Integer),
            ])
        );
        assert_eq!(prepared.features()[0].attribute(0), Some(&Field::Integer(1)));
        Ok(())
    }

    #[test]
    fn shapefile_rejects_datetime_and_mixed_geometries() -> Result<()> {
        let shapefile = format::driver_by_name("shp")?;
        let surveyed = NaiveDate::from_ymd_opt(2020, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
        let dates = FeatureCollection::new(
            "dates",
            Schema::new(vec![FieldInfo::new("surveyed", FieldType::DateTime)]),
            None,
            vec![Feature::new(None, vec![surveyed.map(Field::DateTime)])],
        )?;
        assert!(matches!(
            prepare_for_driver(&dates, shapefile),
            Err(Error::SchemaIncompatible { field, .. }) if field == "surveyed"
        ));

        let geometries = FeatureCollection::new(
            "mixed",
            Schema::default(),
            None,
            vec![
                Feature::new(Some(Geometry::new(Shape::Point(point!(x: 0.0, y: 0.0)), None)), vec![]),
                Feature::new(
                    Some(Geometry::new(Shape::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]), None)),
                    vec![],
                ),
            ],
        )?;
        assert!(matches!(
            prepare_for_driver(&geometries, shapefile),
            Err(Error::SchemaIncompatible { field, .. }) if field == "geometry"
        ));

        // Single and multi polygons are one family
        let polygons = FeatureCollection::new(
            "polygons",
            Schema::default(),
            None,
            vec![
                Feature::new(
                    Some(Geometry::new(Shape::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]), None)),
                    vec![],
                ),
                Feature::new(
                    Some(Geometry::new(
                        Shape::MultiPolygon(geo_types::MultiPolygon::new(vec![polygon![(x: 2.0, y: 2.0), (x: 3.0, y: 2.0), (x: 3.0, y: 3.0)]])),
                        None,
                    )),
                    vec![],
                ),
            ],
        )?;
        assert!(matches!(prepare_for_driver(&polygons, shapefile)?, Cow::Borrowed(_)));
        Ok(())
    }

    #[test]
    fn geojson_keeps_datetime_columns() -> Result<()> {
        let geojson = format::driver_by_name("GeoJSON")?;
        let surveyed = NaiveDate::from_ymd_opt(2020, 5, 17).and_then(|d| d.and_hms_opt(8, 30, 0));
        let dates = FeatureCollection::new(
            "dates",
            Schema::new(vec![FieldInfo::new("surveyed", FieldType::DateTime)]),
            None,
            vec![Feature::new(None, vec![surveyed.map(Field::DateTime)])],
        )?;

        assert!(matches!(prepare_for_driver(&dates, geojson)?, Cow::Borrowed(_)));
        Ok(())
    }

    #[test]
    fn remote_and_archive_targets() -> Result<()> {
        let io = VectorIo::new().with_backend(GeoJsonBackend::new(StandardFileSystem));
        let overwrite = WriteOptions {
            overwrite: true,
            ..Default::default()
        };

        for url in ["https://example.com/towns.geojson", "/vsicurl/https://example.com/towns.geojson"] {
            assert!(matches!(
                io.write(&towns("towns"), url, &overwrite),
                Err(Error::UnsupportedDriver { reason, .. }) if reason.contains("remote")
            ));
        }

        let tmp = tempfile::tempdir()?;
        let archive = tmp.path().join("towns.geojson.gz");
        std::fs::write(&archive, b"not replaced")?;

        let target = format!("/vsigzip/{}", archive.to_string_lossy());
        assert!(matches!(
            io.write(&towns("towns"), &target, &overwrite),
            Err(Error::UnsupportedDriver { reason, .. }) if reason.contains("archive")
        ));
        assert!(matches!(io.write(&towns("towns"), &target, &WriteOptions::default()), Err(Error::TargetExists(_))));
        assert_eq!(std::fs::read(&archive)?, b"not replaced");
        Ok(())
    }
}
