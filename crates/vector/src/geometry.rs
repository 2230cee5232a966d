//! Geometry representation shared by all formats.
//!
//! Geometries are a tagged variant so a single layer can hold different geometry types
//! (e.g. GeoJSON files mixing points and polygons).

use std::fmt;

use geo::{BoundingRect, Intersects};
use wkt::{ToWkt, TryFromWkt};

use crate::{Crs, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

/// Groups of geometry types that can be stored in the same layer of a single geometry type format (e.g. Shapefile)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryFamily {
    Point,
    MultiPoint,
    Line,
    Polygon,
}

impl GeometryType {
    pub fn name(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
        }
    }

    pub fn family(&self) -> GeometryFamily {
        match self {
            GeometryType::Point => GeometryFamily::Point,
            GeometryType::MultiPoint => GeometryFamily::MultiPoint,
            GeometryType::LineString | GeometryType::MultiLineString => GeometryFamily::Line,
            GeometryType::Polygon | GeometryType::MultiPolygon => GeometryFamily::Polygon,
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Point(geo_types::Point<f64>),
    LineString(geo_types::LineString<f64>),
    Polygon(geo_types::Polygon<f64>),
    MultiPoint(geo_types::MultiPoint<f64>),
    MultiLineString(geo_types::MultiLineString<f64>),
    MultiPolygon(geo_types::MultiPolygon<f64>),
}

impl Shape {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Shape::Point(_) => GeometryType::Point,
            Shape::LineString(_) => GeometryType::LineString,
            Shape::Polygon(_) => GeometryType::Polygon,
            Shape::MultiPoint(_) => GeometryType::MultiPoint,
            Shape::MultiLineString(_) => GeometryType::MultiLineString,
            Shape::MultiPolygon(_) => GeometryType::MultiPolygon,
        }
    }

    pub fn to_geo(&self) -> geo_types::Geometry<f64> {
        self.clone().into()
    }
}

impl From<Shape> for geo_types::Geometry<f64> {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Point(g) => g.into(),
            Shape::LineString(g) => g.into(),
            Shape::Polygon(g) => g.into(),
            Shape::MultiPoint(g) => g.into(),
            Shape::MultiLineString(g) => g.into(),
            Shape::MultiPolygon(g) => g.into(),
        }
    }
}

impl TryFrom<geo_types::Geometry<f64>> for Shape {
    type Error = Error;

    fn try_from(geom: geo_types::Geometry<f64>) -> Result<Self> {
        Ok(match geom {
            geo_types::Geometry::Point(g) => Shape::Point(g),
            geo_types::Geometry::Line(g) => Shape::LineString(g.into()),
            geo_types::Geometry::LineString(g) => Shape::LineString(g),
            geo_types::Geometry::Polygon(g) => Shape::Polygon(g),
            geo_types::Geometry::MultiPoint(g) => Shape::MultiPoint(g),
            geo_types::Geometry::MultiLineString(g) => Shape::MultiLineString(g),
            geo_types::Geometry::MultiPolygon(g) => Shape::MultiPolygon(g),
            geo_types::Geometry::Rect(g) => Shape::Polygon(g.to_polygon()),
            geo_types::Geometry::Triangle(g) => Shape::Polygon(g.to_polygon()),
            geo_types::Geometry::GeometryCollection(_) => {
                return Err(Error::UnsupportedGeometry("GeometryCollection".into()));
            }
        })
    }
}

/// A shape together with the coordinate reference system of its coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    shape: Shape,
    crs: Option<Crs>,
}

impl Geometry {
    pub fn new(shape: Shape, crs: Option<Crs>) -> Self {
        Self { shape, crs }
    }

    pub fn from_geo(geom: geo_types::Geometry<f64>, crs: Option<Crs>) -> Result<Self> {
        Ok(Self::new(Shape::try_from(geom)?, crs))
    }

    /// Parse a well-known text geometry (e.g. `POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))`)
    pub fn from_wkt(wkt: &str, crs: Option<Crs>) -> Result<Self> {
        let geom = geo_types::Geometry::<f64>::try_from_wkt_str(wkt)
            .map_err(|err| Error::InvalidArgument(format!("Invalid WKT geometry '{wkt}': {err}")))?;
        Self::from_geo(geom, crs)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn into_shape(self) -> Shape {
        self.shape
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn with_crs(self, crs: Option<Crs>) -> Self {
        Self { crs, ..self }
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.shape.geometry_type()
    }

    pub fn to_geo(&self) -> geo_types::Geometry<f64> {
        self.shape.to_geo()
    }

    pub fn to_wkt(&self) -> String {
        self.to_geo().wkt_string()
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        self.to_geo()
            .bounding_rect()
            .map(|rect| BoundingBox::from_rect(rect, self.crs.clone()))
    }

    /// Spatial intersection test, both geometries are expected to be in the same CRS
    pub fn intersects(&self, other: &Geometry) -> bool {
        self.to_geo().intersects(&other.to_geo())
    }
}

/// Axis aligned rectangle, used as spatial filter input
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub crs: Option<Crs>,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64, crs: Option<Crs>) -> Self {
        Self {
            xmin: xmin.min(xmax),
            ymin: ymin.min(ymax),
            xmax: xmin.max(xmax),
            ymax: ymin.max(ymax),
            crs,
        }
    }

    pub fn from_rect(rect: geo_types::Rect<f64>, crs: Option<Crs>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y, crs)
    }

    /// The envelope of the geometry, `None` for geometries without coordinates
    pub fn from_geometry(geometry: &Geometry) -> Option<Self> {
        geometry.bounds()
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn to_rect(&self) -> geo_types::Rect<f64> {
        geo_types::Rect::new(
            geo_types::coord! { x: self.xmin, y: self.ymin },
            geo_types::coord! { x: self.xmax, y: self.ymax },
        )
    }

    pub fn to_polygon(&self) -> geo_types::Polygon<f64> {
        self.to_rect().to_polygon()
    }

    pub fn to_geometry(&self) -> Geometry {
        Geometry::new(Shape::Polygon(self.to_polygon()), self.crs.clone())
    }

    pub fn to_wkt(&self) -> String {
        self.to_geometry().to_wkt()
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.xmin <= other.xmax && other.xmin <= self.xmax && self.ymin <= other.ymax && other.ymin <= self.ymax
    }

    /// The smallest box containing both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.xmin.min(other.xmin),
            self.ymin.min(other.ymin),
            self.xmax.max(other.xmax),
            self.ymax.max(other.ymax),
            self.crs.clone().or_else(|| other.crs.clone()),
        )
    }
}
