//! In-memory feature collections produced by the reader and consumed by the writer.

use crate::{
    BoundingBox, Crs, Error, Geometry, GeometryType, Result,
    fieldtype::{VectorFieldType, read_field},
    schema::{Field, FieldType, Schema},
};

/// One record: an optional geometry and the attribute values in schema order
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    geometry: Option<Geometry>,
    attributes: Vec<Option<Field>>,
}

impl Feature {
    pub fn new(geometry: Option<Geometry>, attributes: Vec<Option<Field>>) -> Self {
        Self { geometry, attributes }
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn attributes(&self) -> &[Option<Field>] {
        &self.attributes
    }

    pub fn attribute(&self, index: usize) -> Option<&Field> {
        self.attributes.get(index).and_then(Option::as_ref)
    }

    /// Typed access to an attribute, the schema is the schema of the collection containing the feature
    pub fn get<T: VectorFieldType>(&self, schema: &Schema, name: &str) -> Result<Option<T>> {
        FeatureRef::new(schema, self).get(name)
    }

    pub fn into_parts(self) -> (Option<Geometry>, Vec<Option<Field>>) {
        (self.geometry, self.attributes)
    }
}

/// Borrowed view on a feature together with the schema of its collection,
/// gives access to the attributes by name
#[derive(Clone, Copy, Debug)]
pub struct FeatureRef<'a> {
    schema: &'a Schema,
    feature: &'a Feature,
}

impl<'a> FeatureRef<'a> {
    pub fn new(schema: &'a Schema, feature: &'a Feature) -> Self {
        Self { schema, feature }
    }

    pub fn feature(&self) -> &'a Feature {
        self.feature
    }

    pub fn geometry(&self) -> Option<&'a Geometry> {
        self.feature.geometry()
    }

    /// The value of the named attribute, `None` for unknown fields and null values
    pub fn attribute(&self, name: &str) -> Option<&'a Field> {
        self.schema.index_of(name).and_then(|idx| self.feature.attribute(idx))
    }

    /// The attribute values as an ordered mapping of field name to value
    pub fn attributes(self) -> impl Iterator<Item = (&'a str, Option<&'a Field>)> {
        self.schema
            .fields
            .iter()
            .zip(self.feature.attributes.iter())
            .map(|(info, val)| (info.name(), val.as_ref()))
    }

    /// Typed access to an attribute value
    pub fn get<T: VectorFieldType>(&self, name: &str) -> Result<Option<T>> {
        if self.schema.index_of(name).is_none() {
            return Err(Error::InvalidArgument(format!("Field '{name}' not found")));
        }

        read_field(self.attribute(name))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeatureCollection {
    layer_name: String,
    schema: Schema,
    crs: Option<Crs>,
    features: Vec<Feature>,
}

impl FeatureCollection {
    /// Creates a collection, every feature is validated against the schema.
    /// Integer values in float columns are widened, geometries without CRS take the collection CRS.
    pub fn new(layer_name: impl Into<String>, schema: Schema, crs: Option<Crs>, features: Vec<Feature>) -> Result<Self> {
        let features = features
            .into_iter()
            .enumerate()
            .map(|(index, feature)| conform_feature(index, feature, &schema, crs.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            layer_name: layer_name.into(),
            schema,
            crs,
            features,
        })
    }

    pub fn empty(layer_name: impl Into<String>, schema: Schema, crs: Option<Crs>) -> Self {
        Self {
            layer_name: layer_name.into(),
            schema,
            crs,
            features: Vec::new(),
        }
    }

    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    pub fn with_layer_name(self, layer_name: impl Into<String>) -> Self {
        Self {
            layer_name: layer_name.into(),
            ..self
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    pub fn feature(&self, index: usize) -> Option<FeatureRef<'_>> {
        self.features.get(index).map(|f| FeatureRef::new(&self.schema, f))
    }

    pub fn iter(&self) -> impl Iterator<Item = FeatureRef<'_>> {
        self.features.iter().map(|f| FeatureRef::new(&self.schema, f))
    }

    /// The distinct geometry types in order of appearance
    pub fn geometry_types(&self) -> Vec<GeometryType> {
        let mut types = Vec::new();
        for geom_type in self.features.iter().filter_map(|f| f.geometry()).map(Geometry::geometry_type) {
            if !types.contains(&geom_type) {
                types.push(geom_type);
            }
        }

        types
    }

    /// The geometry type shared by all geometries, `None` when empty or mixed
    pub fn geometry_type(&self) -> Option<GeometryType> {
        match self.geometry_types().as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }

    /// The bounds of all geometries in the collection
    pub fn total_bounds(&self) -> Option<BoundingBox> {
        self.features
            .iter()
            .filter_map(|f| f.geometry().and_then(Geometry::bounds))
            .reduce(|acc, bounds| acc.union(&bounds))
    }

    /// Values of a single column, `None` if the column does not exist
    pub fn column(&self, name: &str) -> Option<Vec<Option<&Field>>> {
        let index = self.schema.index_of(name)?;
        Some(self.features.iter().map(|f| f.attribute(index)).collect())
    }

    /// New collection with the features matching the predicate
    pub fn filter(&self, predicate: impl Fn(&FeatureRef) -> bool) -> FeatureCollection {
        FeatureCollection {
            layer_name: self.layer_name.clone(),
            schema: self.schema.clone(),
            crs: self.crs.clone(),
            features: self
                .features
                .iter()
                .filter(|f| predicate(&FeatureRef::new(&self.schema, f)))
                .cloned()
                .collect(),
        }
    }

    /// New collection with only the requested columns, in the requested order
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Result<FeatureCollection> {
        let indexes = columns
            .iter()
            .map(|name| {
                self.schema.index_of(name.as_ref()).ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "Field '{}' not found in layer '{}'",
                        name.as_ref(),
                        self.layer_name
                    ))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        Ok(self.project(&indexes))
    }

    pub(crate) fn project(&self, indexes: &[usize]) -> FeatureCollection {
        FeatureCollection {
            layer_name: self.layer_name.clone(),
            schema: Schema::new(indexes.iter().map(|idx| self.schema.fields[*idx].clone()).collect()),
            crs: self.crs.clone(),
            features: self
                .features
                .iter()
                .map(|f| {
                    Feature::new(
                        f.geometry.clone(),
                        indexes.iter().map(|idx| f.attributes[*idx].clone()).collect(),
                    )
                })
                .collect(),
        }
    }

    pub fn into_parts(self) -> (String, Schema, Option<Crs>, Vec<Feature>) {
        (self.layer_name, self.schema, self.crs, self.features)
    }
}

fn conform_feature(index: usize, feature: Feature, schema: &Schema, crs: Option<&Crs>) -> Result<Feature> {
    let (geometry, attributes) = feature.into_parts();
    if attributes.len() != schema.len() {
        return Err(Error::SchemaMismatch {
            index,
            reason: format!("{} attribute values for {} fields", attributes.len(), schema.len()),
        });
    }

    let attributes = attributes
        .into_iter()
        .zip(schema.fields.iter())
        .map(|(val, info)| match val {
            Some(Field::Integer(val)) if info.field_type() == FieldType::Float => Ok(Some(Field::Float(val as f64))),
            Some(val) if !val.fits(info.field_type()) => Err(Error::SchemaMismatch {
                index,
                reason: format!(
                    "field '{}' has type {} but the value '{}' is of type {}",
                    info.name(),
                    info.field_type(),
                    val,
                    val.field_type()
                ),
            }),
            val => Ok(val),
        })
        .collect::<Result<Vec<_>>>()?;

    let geometry = match geometry {
        Some(geom) => match (geom.crs(), crs) {
            (None, Some(crs)) => Some(geom.with_crs(Some(crs.clone()))),
            (Some(geom_crs), Some(crs)) if geom_crs != crs => {
                return Err(Error::SchemaMismatch {
                    index,
                    reason: format!("geometry CRS {geom_crs} differs from the collection CRS {crs}"),
                });
            }
            _ => Some(geom),
        },
        None => None,
    };

    Ok(Feature::new(geometry, attributes))
}
