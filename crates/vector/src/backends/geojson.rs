//! GeoJSON reading and writing without GDAL.
//!
//! Files written by this backend record the column types in a `fields` member next to the `name` member,
//! the schema is read back from it as written. For other files the schema is inferred from the feature
//! properties: every property name becomes a column, the column type is the narrowest type that fits every
//! non-null value. Text columns of which every value is a timestamp are inferred as `DateTime` columns and
//! columns without any value as `String` columns.

use std::io::{BufWriter, Write};

use geojson::{GeoJson, JsonObject, JsonValue};
use itertools::Itertools;

use super::VectorBackend;
use crate::{
    Crs, DriverDescriptor, Error, Feature, FeatureCollection, Field, FieldInfo, FieldType, Geometry, Result, Schema, Shape,
    VectorFormat, VirtualPath,
    filter::LayerFilter,
    schema::parse_datetime,
    vfs::{StandardFileSystem, VirtualFileSystem},
};

#[derive(Clone, Default)]
pub struct GeoJsonBackend<V: VirtualFileSystem = StandardFileSystem> {
    vfs: V,
}

impl<V: VirtualFileSystem> GeoJsonBackend<V> {
    pub fn new(vfs: V) -> Self {
        Self { vfs }
    }

    fn parse(&self, path: &str) -> Result<GeoJson> {
        let data = self.vfs.read(path)?;
        let text = String::from_utf8(data).map_err(|err| Error::Runtime(format!("'{path}' is not valid UTF-8 ({err})")))?;
        Ok(text.parse::<GeoJson>()?)
    }
}

impl<V: VirtualFileSystem> VectorBackend for GeoJsonBackend<V> {
    fn name(&self) -> &str {
        "geojson"
    }

    fn supports(&self, format: VectorFormat) -> bool {
        format == VectorFormat::GeoJson
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.vfs.exists(path)
    }

    fn layer_names(&self, path: &str, _driver: &DriverDescriptor) -> Result<Vec<String>> {
        Ok(vec![layer_name(path, &self.parse(path)?)])
    }

    fn read_layer(&self, path: &str, _driver: &DriverDescriptor, layer: &str, filter: &LayerFilter) -> Result<FeatureCollection> {
        let geojson = self.parse(path)?;
        let name = layer_name(path, &geojson);
        if !name.eq_ignore_ascii_case(layer) {
            return Err(Error::LayerNotFound {
                path: path.to_string(),
                layer: layer.to_string(),
                available: vec![name],
            });
        }

        let crs = Some(read_crs(path, &geojson).unwrap_or_else(Crs::wgs84));
        let declared_schema = declared_schema(path, &geojson);
        let features = match geojson {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(geometry) => vec![geojson::Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: None,
                foreign_members: None,
            }],
        };

        let schema = declared_schema.unwrap_or_else(|| infer_schema(&features));
        filter.validate(&schema, crs.as_ref())?;

        let features = features
            .into_iter()
            .map(|feature| convert_feature(feature, &schema))
            .collect::<Result<Vec<Feature>>>()?;

        let features = filter.select_features(&schema, features);
        log::debug!("Read {} features from '{path}'", features.len());
        filter.project(FeatureCollection::new(name, schema, crs, features)?)
    }

    fn write_layer(
        &self,
        collection: &FeatureCollection,
        path: &str,
        driver: &DriverDescriptor,
        layer: &str,
        append: bool,
    ) -> Result {
        let vpath = VirtualPath::parse(path)?;
        if append || vpath.is_virtual() || vpath.is_remote() {
            return Err(Error::UnsupportedDriver {
                driver: driver.name.to_string(),
                reason: "the native GeoJSON writer only creates new local files".into(),
            });
        }

        let mut foreign_members = JsonObject::new();
        foreign_members.insert("name".into(), JsonValue::from(layer));
        foreign_members.insert(FIELDS_MEMBER.into(), field_types(collection.schema()));
        if let Some(crs) = collection.crs() {
            match crs.to_ogc_urn() {
                Some(_) if crs == &Crs::wgs84() => {}
                Some(urn) => {
                    foreign_members.insert(
                        "crs".into(),
                        serde_json::json!({ "type": "name", "properties": { "name": urn } }),
                    );
                }
                None => log::warn!("CRS without EPSG code is not stored in GeoJSON output '{path}'"),
            }
        }

        let features = collection
            .features()
            .iter()
            .map(|feature| geojson::Feature {
                bbox: None,
                geometry: feature
                    .geometry()
                    .map(|geom| geojson::Geometry::new(geojson::Value::from(&geo_types::Geometry::from(geom.shape().clone())))),
                id: None,
                properties: Some(properties(collection.schema(), feature)),
                foreign_members: None,
            })
            .collect();

        let output = GeoJson::FeatureCollection(geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        });

        let mut writer = BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer(&mut writer, &output)?;
        writer.flush()?;
        Ok(())
    }
}

/// Foreign member of the feature collection with the column names and types (`{"name": "String", "population": "Integer"}`)
const FIELDS_MEMBER: &str = "fields";

fn field_types(schema: &Schema) -> JsonValue {
    JsonValue::Object(
        schema
            .fields
            .iter()
            .map(|field| (field.name().to_string(), JsonValue::from(field.field_type().to_string())))
            .collect(),
    )
}

/// The schema stored in the `fields` member, `None` when the member is absent or invalid
fn declared_schema(path: &str, geojson: &GeoJson) -> Option<Schema> {
    let GeoJson::FeatureCollection(collection) = geojson else {
        return None;
    };

    let fields = collection.foreign_members.as_ref()?.get(FIELDS_MEMBER)?.as_object()?;
    let schema = fields
        .iter()
        .map(|(name, field_type)| {
            let field_type = field_type
                .as_str()
                .ok_or_else(|| Error::InvalidArgument(format!("Field type of '{name}' is not a string")))?
                .parse::<FieldType>()?;
            Ok(FieldInfo::new(name.as_str(), field_type))
        })
        .collect::<Result<Vec<FieldInfo>>>();

    match schema {
        Ok(fields) => Some(Schema::new(fields)),
        Err(err) => {
            log::warn!("Ignoring the '{FIELDS_MEMBER}' member of '{path}', the schema is inferred ({err})");
            None
        }
    }
}

/// The `name` member of the feature collection, or else the file name without extensions
fn layer_name(path: &str, geojson: &GeoJson) -> String {
    if let GeoJson::FeatureCollection(collection) = geojson
        && let Some(JsonValue::String(name)) = collection.foreign_members.as_ref().and_then(|members| members.get("name"))
    {
        return name.clone();
    }

    let file_name = VirtualPath::parse(path)
        .map(|vpath| vpath.file_name().to_string())
        .unwrap_or_else(|_| path.to_string());
    let file_name = file_name.strip_suffix(".gz").unwrap_or(&file_name);
    std::path::Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string())
}

/// The legacy `crs` member (`{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::31370"}}`),
/// an unrecognized name is ignored
fn read_crs(path: &str, geojson: &GeoJson) -> Option<Crs> {
    let members = match geojson {
        GeoJson::FeatureCollection(collection) => collection.foreign_members.as_ref(),
        GeoJson::Feature(feature) => feature.foreign_members.as_ref(),
        GeoJson::Geometry(geometry) => geometry.foreign_members.as_ref(),
    };

    let name = members
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.pointer("/properties/name"))
        .and_then(JsonValue::as_str)?;

    match name.parse() {
        Ok(crs) => Some(crs),
        Err(err) => {
            log::warn!("Unrecognized crs member '{name}' in '{path}', assuming WGS84 ({err})");
            None
        }
    }
}

fn infer_schema(features: &[geojson::Feature]) -> Schema {
    let names: Vec<&String> = features
        .iter()
        .filter_map(|feature| feature.properties.as_ref())
        .flat_map(|properties| properties.keys())
        .unique()
        .collect();

    let fields = names
        .into_iter()
        .map(|name| {
            let values = features
                .iter()
                .filter_map(|feature| feature.property(name))
                .filter(|value| !value.is_null());
            FieldInfo::new(name.as_str(), infer_field_type(values))
        })
        .collect();

    Schema::new(fields)
}

fn infer_field_type<'a>(values: impl Iterator<Item = &'a JsonValue>) -> FieldType {
    let mut field_type: Option<FieldType> = None;
    for value in values {
        let value_type = match value {
            JsonValue::Bool(_) => FieldType::Boolean,
            JsonValue::Number(num) if num.is_i64() => FieldType::Integer,
            JsonValue::Number(_) => FieldType::Float,
            JsonValue::String(val) if parse_datetime(val).is_some() => FieldType::DateTime,
            _ => FieldType::String,
        };

        field_type = Some(match (field_type, value_type) {
            (None, ty) => ty,
            (Some(current), ty) if current == ty => current,
            (Some(FieldType::Integer), FieldType::Float) | (Some(FieldType::Float), FieldType::Integer) => FieldType::Float,
            _ => FieldType::String,
        });
    }

    field_type.unwrap_or(FieldType::String)
}

fn convert_feature(feature: geojson::Feature, schema: &Schema) -> Result<Feature> {
    let geometry = feature
        .geometry
        .as_ref()
        .map(|geom| -> Result<Geometry> {
            let geom = geo_types::Geometry::<f64>::try_from(&geom.value)?;
            Ok(Geometry::new(Shape::try_from(geom)?, None))
        })
        .transpose()?;

    let attributes = schema
        .fields
        .iter()
        .map(|field| convert_value(feature.property(field.name()), field.field_type()))
        .collect();

    Ok(Feature::new(geometry, attributes))
}

fn convert_value(value: Option<&JsonValue>, field_type: FieldType) -> Option<Field> {
    let value = value.filter(|val| !val.is_null())?;
    match field_type {
        FieldType::Boolean => value.as_bool().map(Field::Boolean),
        FieldType::Integer => value.as_i64().map(Field::Integer),
        FieldType::Float => value.as_f64().map(Field::Float),
        FieldType::DateTime => value.as_str().and_then(parse_datetime).map(Field::DateTime),
        FieldType::String => Some(Field::String(match value {
            JsonValue::String(val) => val.clone(),
            other => other.to_string(),
        })),
    }
}

fn properties(schema: &Schema, feature: &Feature) -> JsonObject {
    schema
        .fields
        .iter()
        .zip(feature.attributes())
        .map(|(info, value)| {
            let json = match value {
                None => JsonValue::Null,
                Some(Field::String(val)) => JsonValue::from(val.as_str()),
                Some(Field::Integer(val)) => JsonValue::from(*val),
                Some(Field::Float(val)) => serde_json::Number::from_f64(*val).map_or(JsonValue::Null, JsonValue::Number),
                Some(Field::Boolean(val)) => JsonValue::from(*val),
                Some(dt @ Field::DateTime(_)) => JsonValue::from(dt.to_string()),
            };

            (info.name().to_string(), json)
        })
        .collect()
}
