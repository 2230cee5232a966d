//! Registry of the supported vector formats and their capabilities.

use phf::phf_map;

use crate::{Error, FieldType, Result, vsi::Archive, vsi::VirtualPath};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VectorFormat {
    Memory,
    ShapeFile,
    /// A shapefile with all of its sidecars stored in a single zip archive (`.shz`, `.shp.zip`)
    ArchivedShapeFile,
    GeoPackage,
    GeoJson,
    Unknown,
}

impl VectorFormat {
    /// Given a (virtual) path, guess the vector type based on the file extension
    pub fn guess_from_path(path: &str) -> VectorFormat {
        if path.starts_with(MEMORY_SCHEME) {
            return VectorFormat::Memory;
        }

        let (name, through_gzip, zip_without_member) = match VirtualPath::parse(path) {
            Ok(vpath) => {
                let through_gzip = vpath.archives().iter().any(|(archive, _)| *archive == Archive::Gzip);
                let zip_without_member = matches!(vpath.archives().first(), Some((Archive::Zip, None)));
                (vpath.file_name().to_lowercase(), through_gzip, zip_without_member)
            }
            Err(_) => (path.to_lowercase(), false, false),
        };

        let name = match name.strip_suffix(".gz") {
            Some(stripped) if through_gzip => stripped,
            _ => name.as_str(),
        };

        if name.ends_with(".shp.zip") {
            return VectorFormat::ArchivedShapeFile;
        }

        let ext = std::path::Path::new(name).extension().map(|ext| ext.to_string_lossy().to_string());
        match ext.as_deref() {
            Some("shp" | "dbf") => VectorFormat::ShapeFile,
            Some("shz") => VectorFormat::ArchivedShapeFile,
            // A zip archive opened as a directory is read by the shapefile driver
            Some("zip") if zip_without_member => VectorFormat::ArchivedShapeFile,
            Some("json" | "geojson") => VectorFormat::GeoJson,
            Some("gpkg") => VectorFormat::GeoPackage,
            _ => VectorFormat::Unknown,
        }
    }

    pub fn gdal_driver_name(&self) -> &str {
        match self {
            VectorFormat::Memory => "Memory",
            VectorFormat::ShapeFile | VectorFormat::ArchivedShapeFile => "ESRI Shapefile",
            VectorFormat::GeoJson => "GeoJSON",
            VectorFormat::GeoPackage => "GPKG",
            VectorFormat::Unknown => "Unknown",
        }
    }

    pub fn descriptor(&self) -> Option<&'static DriverDescriptor> {
        DRIVERS.iter().find(|driver| driver.format == *self)
    }
}

/// Url scheme of datasets that only live in memory (e.g. `memory://roads`)
pub const MEMORY_SCHEME: &str = "memory://";

/// How a field type is stored by a driver
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldSupport {
    Native,
    /// Stored as the given type, the value is converted on write
    Lossy(FieldType),
    Unsupported,
}

/// Static capabilities of a vector format
#[derive(Debug, PartialEq, Eq)]
pub struct DriverDescriptor {
    pub format: VectorFormat,
    pub name: &'static str,
    /// Lower case file extensions without leading dot
    pub extensions: &'static [&'static str],
    pub readable: bool,
    pub writable: bool,
    pub multi_layer: bool,
    pub multi_file: bool,
    /// The driver evaluates attribute filters while scanning the data
    pub attribute_pushdown: bool,
    /// The driver uses a spatial index to evaluate spatial filters
    pub spatial_pushdown: bool,
    /// Different geometry families (e.g. points and polygons) can be stored in one layer
    pub mixed_geometry_families: bool,
    /// A layer without features still has a schema when read back
    pub persists_empty_schema: bool,
    pub max_field_name_len: Option<usize>,
    /// Files that are part of the dataset next to the main file
    pub sidecar_extensions: &'static [&'static str],
    field_rules: &'static [(FieldType, FieldSupport)],
}

impl DriverDescriptor {
    pub fn field_support(&self, field_type: FieldType) -> FieldSupport {
        self.field_rules
            .iter()
            .find_map(|(ty, support)| (*ty == field_type).then_some(*support))
            .unwrap_or(FieldSupport::Native)
    }

    pub fn gdal_driver_name(&self) -> &str {
        self.format.gdal_driver_name()
    }
}

const SHAPEFILE_FIELD_RULES: &[(FieldType, FieldSupport)] = &[
    (FieldType::Boolean, FieldSupport::Lossy(FieldType::Integer)),
    (FieldType::DateTime, FieldSupport::Unsupported),
];

static DRIVERS: [DriverDescriptor; 5] = [
    DriverDescriptor {
        format: VectorFormat::ShapeFile,
        name: "ESRI Shapefile",
        extensions: &["shp", "dbf"],
        readable: true,
        writable: true,
        multi_layer: false,
        multi_file: true,
        attribute_pushdown: false,
        spatial_pushdown: true,
        mixed_geometry_families: false,
        persists_empty_schema: true,
        max_field_name_len: Some(10),
        sidecar_extensions: &["shx", "dbf", "prj", "cpg"],
        field_rules: SHAPEFILE_FIELD_RULES,
    },
    DriverDescriptor {
        format: VectorFormat::ArchivedShapeFile,
        name: "Archived ESRI Shapefile",
        extensions: &["shz", "shp.zip"],
        readable: true,
        writable: true,
        multi_layer: false,
        multi_file: false,
        attribute_pushdown: false,
        spatial_pushdown: false,
        mixed_geometry_families: false,
        persists_empty_schema: true,
        max_field_name_len: Some(10),
        sidecar_extensions: &[],
        field_rules: SHAPEFILE_FIELD_RULES,
    },
    DriverDescriptor {
        format: VectorFormat::GeoPackage,
        name: "GPKG",
        extensions: &["gpkg"],
        readable: true,
        writable: true,
        multi_layer: true,
        multi_file: false,
        attribute_pushdown: true,
        spatial_pushdown: true,
        mixed_geometry_families: true,
        persists_empty_schema: true,
        max_field_name_len: None,
        sidecar_extensions: &[],
        field_rules: &[],
    },
    DriverDescriptor {
        format: VectorFormat::GeoJson,
        name: "GeoJSON",
        extensions: &["geojson", "json"],
        readable: true,
        writable: true,
        multi_layer: false,
        multi_file: false,
        attribute_pushdown: false,
        spatial_pushdown: false,
        mixed_geometry_families: true,
        persists_empty_schema: false,
        max_field_name_len: None,
        sidecar_extensions: &[],
        field_rules: &[],
    },
    DriverDescriptor {
        format: VectorFormat::Memory,
        name: "Memory",
        extensions: &[],
        readable: true,
        writable: true,
        multi_layer: true,
        multi_file: false,
        attribute_pushdown: false,
        spatial_pushdown: false,
        mixed_geometry_families: true,
        persists_empty_schema: true,
        max_field_name_len: None,
        sidecar_extensions: &[],
        field_rules: &[],
    },
];

/// Lower case driver names accepted as explicit driver
static DRIVER_ALIASES: phf::Map<&'static str, VectorFormat> = phf_map! {
    "esri shapefile" => VectorFormat::ShapeFile,
    "shapefile" => VectorFormat::ShapeFile,
    "shp" => VectorFormat::ShapeFile,
    "archived esri shapefile" => VectorFormat::ArchivedShapeFile,
    "archived shapefile" => VectorFormat::ArchivedShapeFile,
    "shz" => VectorFormat::ArchivedShapeFile,
    "gpkg" => VectorFormat::GeoPackage,
    "geopackage" => VectorFormat::GeoPackage,
    "geojson" => VectorFormat::GeoJson,
    "json" => VectorFormat::GeoJson,
    "memory" => VectorFormat::Memory,
    "mem" => VectorFormat::Memory,
};

/// All registered drivers
pub fn drivers() -> &'static [DriverDescriptor] {
    &DRIVERS
}

/// Looks up a driver by its name or one of its aliases (case-insensitive)
pub fn driver_by_name(name: &str) -> Result<&'static DriverDescriptor> {
    DRIVER_ALIASES
        .get(name.trim().to_lowercase().as_str())
        .and_then(VectorFormat::descriptor)
        .ok_or_else(|| Error::UnknownFormat(name.to_string()))
}

/// Resolves the driver for a dataset, an explicit driver name takes precedence over the path extension
pub fn resolve(path: &str, driver: Option<&str>) -> Result<&'static DriverDescriptor> {
    let descriptor = match driver {
        Some(name) => driver_by_name(name)?,
        None => VectorFormat::guess_from_path(path)
            .descriptor()
            .ok_or_else(|| Error::UnknownFormat(path.to_string()))?,
    };

    log::debug!("Resolved driver '{}' for '{path}'", descriptor.name);
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_format_from_path() {
        assert_eq!(VectorFormat::guess_from_path("/data/roads.shp"), VectorFormat::ShapeFile);
        assert_eq!(VectorFormat::guess_from_path("/data/roads.SHP"), VectorFormat::ShapeFile);
        assert_eq!(VectorFormat::guess_from_path("/data/roads.dbf"), VectorFormat::ShapeFile);
        assert_eq!(VectorFormat::guess_from_path("/data/roads.shz"), VectorFormat::ArchivedShapeFile);
        assert_eq!(VectorFormat::guess_from_path("/data/roads.shp.zip"), VectorFormat::ArchivedShapeFile);
        assert_eq!(VectorFormat::guess_from_path("/data/parcels.gpkg"), VectorFormat::GeoPackage);
        assert_eq!(VectorFormat::guess_from_path("cities.geojson"), VectorFormat::GeoJson);
        assert_eq!(VectorFormat::guess_from_path("cities.json"), VectorFormat::GeoJson);
        assert_eq!(VectorFormat::guess_from_path("memory://cities"), VectorFormat::Memory);
        assert_eq!(VectorFormat::guess_from_path("/data/roads.csv"), VectorFormat::Unknown);
        assert_eq!(VectorFormat::guess_from_path("/data/roads"), VectorFormat::Unknown);
    }

    #[test]
    fn vector_format_from_virtual_path() {
        assert_eq!(
            VectorFormat::guess_from_path("/vsizip//vsicurl/https://example.com/roads.zip/roads.shp"),
            VectorFormat::ShapeFile
        );
        assert_eq!(
            VectorFormat::guess_from_path("/vsizip//vsicurl/https://example.com/roads.zip"),
            VectorFormat::ArchivedShapeFile
        );
        assert_eq!(
            VectorFormat::guess_from_path("/vsigzip//data/cities.geojson.gz"),
            VectorFormat::GeoJson
        );
        assert_eq!(VectorFormat::guess_from_path("/data/cities.geojson.gz"), VectorFormat::Unknown);
        assert_eq!(
            VectorFormat::guess_from_path("https://example.com/cities.geojson?token=abc"),
            VectorFormat::GeoJson
        );
        assert_eq!(VectorFormat::guess_from_path("/vsis3/bucket/parcels.gpkg"), VectorFormat::GeoPackage);
    }

    #[test]
    fn explicit_driver_takes_precedence() -> Result<()> {
        assert_eq!(resolve("/data/roads.dat", Some("ESRI Shapefile"))?.format, VectorFormat::ShapeFile);
        assert_eq!(resolve("/data/roads.geojson", Some("gpkg"))?.format, VectorFormat::GeoPackage);
        assert_eq!(resolve("/data/roads.geojson", None)?.format, VectorFormat::GeoJson);
        assert!(matches!(resolve("/data/roads.dat", None), Err(Error::UnknownFormat(_))));
        assert!(matches!(resolve("/data/roads.shp", Some("KML")), Err(Error::UnknownFormat(_))));
        Ok(())
    }

    #[test]
    fn every_format_has_a_descriptor() {
        for driver in drivers() {
            assert_eq!(driver.format.descriptor(), Some(driver));
            for ext in driver.extensions {
                assert_eq!(VectorFormat::guess_from_path(&format!("/data/file.{ext}")), driver.format);
            }
        }

        assert!(VectorFormat::Unknown.descriptor().is_none());
        for format in DRIVER_ALIASES.values() {
            assert!(format.descriptor().is_some());
        }
    }

    #[test]
    fn field_support() -> Result<()> {
        let shp = driver_by_name("shapefile")?;
        assert_eq!(shp.field_support(FieldType::String), FieldSupport::Native);
        assert_eq!(shp.field_support(FieldType::Boolean), FieldSupport::Lossy(FieldType::Integer));
        assert_eq!(shp.field_support(FieldType::DateTime), FieldSupport::Unsupported);
        assert_eq!(shp.max_field_name_len, Some(10));

        let gpkg = driver_by_name("GPKG")?;
        assert_eq!(gpkg.field_support(FieldType::DateTime), FieldSupport::Native);
        assert!(gpkg.multi_layer);

        let json = driver_by_name("GeoJSON")?;
        assert_eq!(json.field_support(FieldType::DateTime), FieldSupport::Native);
        assert!(!json.persists_empty_schema);
        Ok(())
    }
}
