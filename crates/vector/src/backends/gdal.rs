//! Shapefile, GeoPackage and GeoJSON access through GDAL/OGR.
//!
//! All GDAL virtual file systems (`/vsizip/`, `/vsicurl/`, `/vsis3/`, ...) are available to this backend.
//! Attribute and spatial filters are handed to OGR so drivers with indexes can skip non-matching rows,
//! the filter is evaluated again on the returned features so the result never depends on the driver.

use std::{ffi::CString, path::Path};

use ::gdal::{
    Dataset, DatasetOptions, DriverManager, GdalOpenFlags,
    errors::GdalError,
    spatial_ref::{AxisMappingStrategy, SpatialRef},
    vector::{Defn, FieldValue, LayerAccess, LayerOptions, OGRwkbGeometryType, ToGdal},
};
use gdal_sys::{OGRFieldSubType, OGRFieldType};
use inf::gdalinterop;

use super::VectorBackend;
use crate::{
    Crs, DriverDescriptor, Error, Feature, FeatureCollection, Field, FieldInfo, FieldType, Geometry, GeometryType, Result, Schema,
    VectorFormat, VirtualPath,
    feature::FeatureRef,
    filter::LayerFilter,
    geometry::GeometryFamily,
};

#[derive(Clone, Debug, Default)]
pub struct GdalBackend;

pub mod dataset {
    use super::*;

    fn open_with_options(path: &str, driver: &DriverDescriptor, open_flags: GdalOpenFlags) -> Result<Dataset> {
        let allowed_drivers = [driver.gdal_driver_name()];
        let options = DatasetOptions {
            open_flags,
            allowed_drivers: Some(&allowed_drivers),
            ..Default::default()
        };

        Dataset::open_ex(Path::new(path), options).map_err(|err| match err {
            // Give a cleaner error message when the file does not exist
            GdalError::NullPointer { .. } => {
                if DriverManager::get_driver_by_name(driver.gdal_driver_name()).is_err() {
                    return Error::UnsupportedDriver {
                        driver: driver.name.to_string(),
                        reason: "the driver is not available in this GDAL build".into(),
                    };
                }

                match VirtualPath::parse(path) {
                    Ok(vpath) if !vpath.is_virtual() && !vpath.is_remote() && !Path::new(path).exists() => {
                        Error::FileNotFound(path.into())
                    }
                    _ => Error::Runtime(format!("Failed to open vector dataset: {path} ({err})")),
                }
            }
            _ => Error::Runtime(format!("Failed to open vector dataset: {path} ({err})")),
        })
    }

    /// Open a GDAL vector dataset for reading
    pub fn open_read_only(path: &str, driver: &DriverDescriptor) -> Result<Dataset> {
        open_with_options(path, driver, GdalOpenFlags::GDAL_OF_READONLY | GdalOpenFlags::GDAL_OF_VECTOR)
    }

    /// Open a GDAL vector dataset to add layers to it
    pub fn open_for_update(path: &str, driver: &DriverDescriptor) -> Result<Dataset> {
        open_with_options(path, driver, GdalOpenFlags::GDAL_OF_UPDATE | GdalOpenFlags::GDAL_OF_VECTOR)
    }

    /// Create a new vector dataset, the file should not exist
    pub fn create(path: &str, driver: &DriverDescriptor) -> Result<Dataset> {
        let gdal_driver = DriverManager::get_driver_by_name(driver.gdal_driver_name()).map_err(|_| Error::UnsupportedDriver {
            driver: driver.name.to_string(),
            reason: "the driver is not available in this GDAL build".into(),
        })?;

        Ok(gdal_driver.create_vector_only(path)?)
    }

    pub fn layer_names(dataset: &Dataset) -> Vec<String> {
        (0..dataset.layer_count())
            .filter_map(|idx| dataset.layer(idx).ok())
            .map(|layer| layer.name())
            .collect()
    }
}

/// [`gdal::vector::LayerAccess`] extension trait that implements missing functionality
trait LayerAccessExtension
where
    Self: LayerAccess,
{
    /// Adds a field to the layer, booleans are created as integer fields with the boolean subtype
    fn create_typed_field(&self, name: &str, field_type: FieldType) -> Result {
        let name_c_str = CString::new(name).map_err(|_| Error::InvalidArgument(format!("Invalid field name: '{name}'")))?;
        let (ogr_type, ogr_subtype) = ogr_field_type(field_type);

        unsafe {
            let field_defn = gdalinterop::check_gdal_pointer(gdal_sys::OGR_Fld_Create(name_c_str.as_ptr(), ogr_type), "OGR_Fld_Create")?;
            gdal_sys::OGR_Fld_SetSubType(field_defn, ogr_subtype);
            let rc = gdal_sys::OGR_L_CreateField(self.c_layer(), field_defn, 1);
            gdal_sys::OGR_Fld_Destroy(field_defn);
            gdalinterop::check_ogr_rc(rc, "OGR_L_CreateField")?;
        }

        Ok(())
    }
}

impl LayerAccessExtension for ::gdal::vector::Layer<'_> {}

/// [`gdal::vector::Defn`] extension trait that implements missing functionality
trait FeatureDefinitionExtension {
    fn field_subtype(&self, field_index: usize) -> OGRFieldSubType::Type;
}

impl FeatureDefinitionExtension for Defn {
    fn field_subtype(&self, field_index: usize) -> OGRFieldSubType::Type {
        unsafe {
            let field_defn = gdal_sys::OGR_FD_GetFieldDefn(self.c_defn(), field_index as i32);
            if field_defn.is_null() {
                return OGRFieldSubType::OFSTNone;
            }

            gdal_sys::OGR_Fld_GetSubType(field_defn)
        }
    }
}

/// [`gdal::vector::Feature`] extension trait that implements missing functionality
trait FeatureExtension {
    /// The field at the index is set and not null
    fn field_is_valid(&self, field_index: usize) -> bool;
}

impl FeatureExtension for ::gdal::vector::Feature<'_> {
    fn field_is_valid(&self, field_index: usize) -> bool {
        unsafe { gdal_sys::OGR_F_IsFieldSetAndNotNull(self.c_feature(), field_index as i32) == 1 }
    }
}

fn ogr_field_type(field_type: FieldType) -> (OGRFieldType::Type, OGRFieldSubType::Type) {
    match field_type {
        FieldType::String => (OGRFieldType::OFTString, OGRFieldSubType::OFSTNone),
        FieldType::Integer => (OGRFieldType::OFTInteger64, OGRFieldSubType::OFSTNone),
        FieldType::Float => (OGRFieldType::OFTReal, OGRFieldSubType::OFSTNone),
        FieldType::Boolean => (OGRFieldType::OFTInteger, OGRFieldSubType::OFSTBoolean),
        FieldType::DateTime => (OGRFieldType::OFTDateTime, OGRFieldSubType::OFSTNone),
    }
}

fn map_ogr_field_type_to_field_type(ogr_type: OGRFieldType::Type, subtype: OGRFieldSubType::Type) -> FieldType {
    match ogr_type {
        OGRFieldType::OFTInteger if subtype == OGRFieldSubType::OFSTBoolean => FieldType::Boolean,
        OGRFieldType::OFTInteger | OGRFieldType::OFTInteger64 => FieldType::Integer,
        OGRFieldType::OFTReal => FieldType::Float,
        OGRFieldType::OFTDateTime | OGRFieldType::OFTDate => FieldType::DateTime,
        _ => FieldType::String,
    }
}

fn convert_field_value_to_field(field_value: FieldValue, field_type: FieldType) -> Field {
    match field_value {
        FieldValue::StringValue(val) => Field::String(val),
        FieldValue::IntegerValue(val) if field_type == FieldType::Boolean => Field::Boolean(val != 0),
        FieldValue::IntegerValue(val) => Field::Integer(val as i64),
        FieldValue::Integer64Value(val) => Field::Integer(val),
        FieldValue::RealValue(val) => Field::Float(val),
        FieldValue::DateTimeValue(val) => Field::DateTime(val.naive_local()),
        FieldValue::DateValue(val) => Field::DateTime(val.and_hms_opt(0, 0, 0).unwrap_or_default()),
        // List values are stored as their text representation
        FieldValue::IntegerListValue(vals) => Field::String(vals.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")),
        FieldValue::Integer64ListValue(vals) => Field::String(vals.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")),
        FieldValue::StringListValue(vals) => Field::String(vals.join(",")),
        FieldValue::RealListValue(vals) => Field::String(vals.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")),
    }
}

fn field_value(field: &Field) -> FieldValue {
    match field {
        Field::String(val) => FieldValue::StringValue(val.clone()),
        Field::Integer(val) => FieldValue::Integer64Value(*val),
        Field::Float(val) => FieldValue::RealValue(*val),
        Field::Boolean(val) => FieldValue::IntegerValue(i32::from(*val)),
        Field::DateTime(val) => FieldValue::DateTimeValue(val.and_utc().fixed_offset()),
    }
}

fn read_schema(defn: &Defn) -> Schema {
    Schema::new(
        defn.fields()
            .enumerate()
            .map(|(idx, field)| {
                FieldInfo::new(
                    field.name(),
                    map_ogr_field_type_to_field_type(field.field_type(), defn.field_subtype(idx)),
                )
            })
            .collect(),
    )
}

fn crs_from_spatial_ref(mut srs: SpatialRef) -> Result<Crs> {
    // Shapefile projection files usually lack the authority code
    if srs.auth_code().is_err() && srs.auto_identify_epsg().is_err() {
        log::debug!("No EPSG code found for layer projection");
    }

    if srs.auth_name().ok().is_some_and(|name| name.eq_ignore_ascii_case("EPSG"))
        && let Ok(code) = srs.auth_code()
    {
        return Ok(Crs::from_epsg(code as u32));
    }

    Ok(Crs::from_wkt(srs.to_wkt()?))
}

fn spatial_ref_from_crs(crs: &Crs) -> Result<SpatialRef> {
    let mut srs = match (crs.epsg(), crs.wkt()) {
        (Some(epsg), _) => SpatialRef::from_epsg(epsg.code())?,
        (None, Some(wkt)) => SpatialRef::from_wkt(wkt)?,
        (None, None) => return Err(Error::InvalidArgument(format!("Unsupported CRS: {crs}"))),
    };

    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

fn wkb_geometry_type(geometry_type: GeometryType) -> OGRwkbGeometryType::Type {
    match geometry_type {
        GeometryType::Point => OGRwkbGeometryType::wkbPoint,
        GeometryType::LineString => OGRwkbGeometryType::wkbLineString,
        GeometryType::Polygon => OGRwkbGeometryType::wkbPolygon,
        GeometryType::MultiPoint => OGRwkbGeometryType::wkbMultiPoint,
        GeometryType::MultiLineString => OGRwkbGeometryType::wkbMultiLineString,
        GeometryType::MultiPolygon => OGRwkbGeometryType::wkbMultiPolygon,
    }
}

/// The layer geometry type: the single type of all geometries, the multi type when single and multi geometries
/// of the same family are mixed, unknown otherwise
fn layer_geometry_type(collection: &FeatureCollection) -> OGRwkbGeometryType::Type {
    let types = collection.geometry_types();
    match types.as_slice() {
        [] => OGRwkbGeometryType::wkbUnknown,
        [single] => wkb_geometry_type(*single),
        [first, rest @ ..] if rest.iter().all(|ty| ty.family() == first.family()) => match first.family() {
            GeometryFamily::Line => OGRwkbGeometryType::wkbMultiLineString,
            GeometryFamily::Polygon => OGRwkbGeometryType::wkbMultiPolygon,
            GeometryFamily::Point | GeometryFamily::MultiPoint => OGRwkbGeometryType::wkbUnknown,
        },
        _ => OGRwkbGeometryType::wkbUnknown,
    }
}

fn layer_creation_options(driver: &DriverDescriptor) -> &'static [&'static str] {
    match driver.format {
        VectorFormat::ShapeFile | VectorFormat::ArchivedShapeFile => &["ENCODING=UTF-8"],
        _ => &[],
    }
}

fn convert_feature(feature: &::gdal::vector::Feature, schema: &Schema, crs: Option<&Crs>) -> Result<Feature> {
    let geometry = match feature.geometry() {
        Some(geom) if !geom.is_empty() => Some(Geometry::from_geo(geom.to_geo()?, crs.cloned())?),
        _ => None,
    };

    let mut attributes = Vec::with_capacity(schema.len());
    for (idx, info) in schema.fields.iter().enumerate() {
        attributes.push(if feature.field_is_valid(idx) {
            feature.field(idx)?.map(|val| convert_field_value_to_field(val, info.field_type()))
        } else {
            None
        });
    }

    Ok(Feature::new(geometry, attributes))
}

fn write_features(dataset: &mut Dataset, options: LayerOptions<'_>, collection: &FeatureCollection) -> Result {
    let layer = dataset.create_layer(options)?;
    for field in &collection.schema().fields {
        layer.create_typed_field(field.name(), field.field_type())?;
    }

    let defn = layer.defn();
    for feature in collection.features() {
        let mut ogr_feature = ::gdal::vector::Feature::new(defn)?;
        for (idx, value) in feature.attributes().iter().enumerate() {
            match value {
                Some(value) => ogr_feature.set_field(idx, &field_value(value))?,
                None => ogr_feature.set_field_null(idx)?,
            }
        }

        if let Some(geometry) = feature.geometry() {
            ogr_feature.set_geometry(geometry.to_geo().to_gdal()?)?;
        }

        ogr_feature.create(&layer)?;
    }

    Ok(())
}

impl VectorBackend for GdalBackend {
    fn name(&self) -> &str {
        "gdal"
    }

    fn supports(&self, format: VectorFormat) -> bool {
        matches!(
            format,
            VectorFormat::ShapeFile | VectorFormat::ArchivedShapeFile | VectorFormat::GeoPackage | VectorFormat::GeoJson
        )
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let vpath = VirtualPath::parse(path)?;
        if !vpath.is_virtual() && !vpath.is_remote() {
            return Ok(Path::new(path).exists());
        }

        let options = DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_READONLY | GdalOpenFlags::GDAL_OF_VECTOR,
            ..Default::default()
        };
        Ok(Dataset::open_ex(Path::new(path), options).is_ok())
    }

    fn layer_names(&self, path: &str, driver: &DriverDescriptor) -> Result<Vec<String>> {
        Ok(dataset::layer_names(&dataset::open_read_only(path, driver)?))
    }

    fn read_layer(&self, path: &str, driver: &DriverDescriptor, layer_name: &str, filter: &LayerFilter) -> Result<FeatureCollection> {
        let ds = dataset::open_read_only(path, driver)?;
        let mut layer = match ds.layer_by_name(layer_name) {
            Ok(layer) => layer,
            Err(err) => {
                log::debug!("{err}");
                return Err(Error::LayerNotFound {
                    path: path.to_string(),
                    layer: layer_name.to_string(),
                    available: dataset::layer_names(&ds),
                });
            }
        };

        let crs = layer.spatial_ref().map(crs_from_spatial_ref).transpose()?;
        let schema = read_schema(layer.defn());
        filter.validate(&schema, crs.as_ref())?;

        if let Some(predicate) = filter.predicate() {
            let sql = predicate.to_string();
            match layer.set_attribute_filter(&sql) {
                Ok(()) => log::debug!("Attribute filter pushed down to {}: {sql}", driver.name),
                Err(err) => log::debug!("Attribute filter '{sql}' rejected by {} ({err}), evaluating in memory", driver.name),
            }
        }

        if let Some(spatial) = filter.spatial() {
            log::debug!("Spatial filter pushed down to {}", driver.name);
            layer.set_spatial_filter(&spatial.geometry().to_geo().to_gdal()?);
        }

        let mut features = Vec::new();
        let mut skipped = 0;
        for ogr_feature in layer.features() {
            let feature = convert_feature(&ogr_feature, &schema, crs.as_ref())?;
            if !filter.matches(&FeatureRef::new(&schema, &feature)) {
                continue;
            }

            if skipped < filter.skip() {
                skipped += 1;
                continue;
            }

            features.push(feature);
            if filter.max().is_some_and(|max| features.len() >= max) {
                break;
            }
        }

        log::debug!("Read {} features from layer '{}' of '{path}'", features.len(), layer.name());
        filter.project(FeatureCollection::new(layer.name(), schema, crs, features)?)
    }

    fn write_layer(
        &self,
        collection: &FeatureCollection,
        path: &str,
        driver: &DriverDescriptor,
        layer: &str,
        append: bool,
    ) -> Result {
        let mut ds = if append {
            dataset::open_for_update(path, driver)?
        } else {
            dataset::create(path, driver)?
        };

        let srs = collection.crs().map(spatial_ref_from_crs).transpose()?;
        let layer_options = LayerOptions {
            name: layer,
            srs: srs.as_ref(),
            ty: layer_geometry_type(collection),
            options: Some(layer_creation_options(driver)),
        };

        if driver.format == VectorFormat::GeoPackage {
            // Inserting every feature in its own transaction is very slow
            let mut txn = ds.start_transaction()?;
            write_features(&mut txn, layer_options, collection)?;
            txn.commit()?;
        } else {
            write_features(&mut ds, layer_options, collection)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use geo_types::{point, polygon};

    use super::*;
    use crate::{Shape, format};

    fn parcels() -> FeatureCollection {
        let schema = Schema::new(vec![
            FieldInfo::new("name", FieldType::String),
            FieldInfo::new("area", FieldType::Float),
            FieldInfo::new("owners", FieldType::Integer),
            FieldInfo::new("public", FieldType::Boolean),
            FieldInfo::new("surveyed", FieldType::DateTime),
        ]);

        let surveyed = NaiveDate::from_ymd_opt(2021, 3, 4).and_then(|d| d.and_hms_opt(12, 0, 0));
        FeatureCollection::new(
            "parcels",
            schema,
            Some(Crs::from_epsg(31370)),
            vec![
                Feature::new(
                    Some(Geometry::new(
                        Shape::Polygon(polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)]),
                        None,
                    )),
                    vec![
                        Some(Field::String("park".into())),
                        Some(Field::Float(100.0)),
                        Some(Field::Integer(1)),
                        Some(Field::Boolean(true)),
                        surveyed.map(Field::DateTime),
                    ],
                ),
                Feature::new(
                    Some(Geometry::new(Shape::Point(point!(x: 50.0, y: 50.0)), None)),
                    vec![Some(Field::String("well".into())), None, Some(Field::Integer(2)), Some(Field::Boolean(false)), None],
                ),
            ],
        )
        .expect("valid collection")
    }

    #[test_log::test]
    fn geopackage_roundtrip_is_lossless() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("parcels.gpkg").to_string_lossy().to_string();
        let driver = format::driver_by_name("GPKG")?;
        let backend = GdalBackend;

        backend.write_layer(&parcels(), &path, driver, "parcels", false)?;
        assert_eq!(backend.layer_names(&path, driver)?, vec!["parcels"]);

        let read = backend.read_layer(&path, driver, "parcels", &LayerFilter::default())?;
        assert_eq!(read.schema(), parcels().schema());
        assert_eq!(read.crs(), Some(&Crs::from_epsg(31370)));
        assert_eq!(read.features(), parcels().features());
        Ok(())
    }

    #[test_log::test]
    fn missing_layer() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("parcels.gpkg").to_string_lossy().to_string();
        let driver = format::driver_by_name("GPKG")?;
        GdalBackend.write_layer(&parcels(), &path, driver, "parcels", false)?;

        match GdalBackend.read_layer(&path, driver, "roads", &LayerFilter::default()) {
            Err(Error::LayerNotFound { available, .. }) => assert_eq!(available, vec!["parcels"]),
            other => panic!("Unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn geometry_type_of_layer() {
        assert_eq!(layer_geometry_type(&parcels()), OGRwkbGeometryType::wkbUnknown);
        assert_eq!(
            layer_geometry_type(&parcels().filter(|f| f.geometry().is_some_and(|g| g.geometry_type() == GeometryType::Point))),
            OGRwkbGeometryType::wkbPoint
        );
    }
}
