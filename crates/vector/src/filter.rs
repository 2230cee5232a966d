//! Row and column filters that are evaluated while a layer is read.

use crate::{
    BoundingBox, Crs, Error, Feature, FeatureCollection, Geometry, Result, Schema,
    feature::FeatureRef,
    query::{Predicate, Query},
};

/// Selects the features whose geometry intersects the filter geometry
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialFilter {
    geometry: Geometry,
    bounds: Option<BoundingBox>,
}

impl SpatialFilter {
    pub fn new(geometry: Geometry) -> Self {
        let bounds = geometry.bounds();
        Self { geometry, bounds }
    }

    /// Filter geometry in well-known text (e.g. `POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))`)
    pub fn from_wkt(wkt: &str, crs: Option<Crs>) -> Result<Self> {
        Ok(Self::new(Geometry::from_wkt(wkt, crs)?))
    }

    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        Self::new(bbox.to_geometry())
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.geometry.crs()
    }

    pub fn bounds(&self) -> Option<&BoundingBox> {
        self.bounds.as_ref()
    }

    /// Features without geometry never match
    pub fn matches(&self, geometry: Option<&Geometry>) -> bool {
        let Some(geometry) = geometry else {
            return false;
        };

        if let (Some(filter_bounds), Some(geom_bounds)) = (&self.bounds, geometry.bounds())
            && !filter_bounds.intersects(&geom_bounds)
        {
            return false;
        }

        self.geometry.intersects(geometry)
    }

    /// Filter geometries are not reprojected, the filter must be expressed in the CRS of the layer
    pub fn check_crs(&self, layer_crs: Option<&Crs>) -> Result {
        match (self.crs(), layer_crs) {
            (Some(filter_crs), Some(layer_crs)) if filter_crs != layer_crs => Err(Error::InvalidArgument(format!(
                "Spatial filter CRS ({filter_crs}) differs from the layer CRS ({layer_crs})"
            ))),
            _ => Ok(()),
        }
    }
}

impl From<BoundingBox> for SpatialFilter {
    fn from(bbox: BoundingBox) -> Self {
        SpatialFilter::from_bbox(&bbox)
    }
}

/// The combination of all filters of a read request.
/// The attribute query and the spatial filter are combined with AND, the feature range is applied to the matching features.
#[derive(Clone, Debug, Default)]
pub struct LayerFilter {
    query: Option<Query>,
    spatial: Option<SpatialFilter>,
    skip: usize,
    max: Option<usize>,
}

impl LayerFilter {
    pub fn new(query: Option<Query>, spatial: Option<SpatialFilter>) -> Self {
        Self {
            query,
            spatial,
            skip: 0,
            max: None,
        }
    }

    pub fn with_range(self, skip: usize, max: Option<usize>) -> Self {
        Self { skip, max, ..self }
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.query.as_ref().and_then(Query::predicate)
    }

    pub fn spatial(&self) -> Option<&SpatialFilter> {
        self.spatial.as_ref()
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }

    /// No rows are removed, only the feature range or the columns can still be restricted
    pub fn selects_all_rows(&self) -> bool {
        self.predicate().is_none() && self.spatial.is_none()
    }

    /// Checks the filter against the layer it will be applied to
    pub fn validate(&self, schema: &Schema, crs: Option<&Crs>) -> Result {
        if let Some(query) = &self.query {
            query.validate(schema)?;
        }

        if let Some(spatial) = &self.spatial {
            spatial.check_crs(crs)?;
        }

        Ok(())
    }

    pub fn matches(&self, feature: &FeatureRef) -> bool {
        if let Some(predicate) = self.predicate()
            && !predicate.matches(feature)
        {
            return false;
        }

        match &self.spatial {
            Some(spatial) => spatial.matches(feature.geometry()),
            None => true,
        }
    }

    /// The matching features within the feature range
    pub fn select_features(&self, schema: &Schema, features: impl IntoIterator<Item = Feature>) -> Vec<Feature> {
        features
            .into_iter()
            .filter(|feature| self.matches(&FeatureRef::new(schema, feature)))
            .skip(self.skip)
            .take(self.max.unwrap_or(usize::MAX))
            .collect()
    }

    /// Restricts the collection to the selected columns
    pub fn project(&self, collection: FeatureCollection) -> Result<FeatureCollection> {
        match &self.query {
            Some(query) => match query.column_indexes(collection.schema())? {
                Some(indexes) => Ok(collection.project(&indexes)),
                None => Ok(collection),
            },
            None => Ok(collection),
        }
    }

    /// Applies the complete filter to a fully materialized layer
    pub fn apply(&self, collection: FeatureCollection) -> Result<FeatureCollection> {
        self.validate(collection.schema(), collection.crs())?;

        let (layer_name, schema, crs, features) = collection.into_parts();
        let features = self.select_features(&schema, features);
        self.project(FeatureCollection::new(layer_name, schema, crs, features)?)
    }
}
