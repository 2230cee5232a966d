//! Coordinate reference system identifiers.
//!
//! A [`Crs`] is an immutable handle that is shared between a collection and all of its geometries,
//! cloning it only bumps a reference count.

use std::{fmt, str::FromStr, sync::Arc};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epsg(u32);

impl Epsg {
    pub const fn new(code: u32) -> Self {
        Epsg(code)
    }

    pub const fn code(&self) -> u32 {
        self.0
    }
}

impl From<u32> for Epsg {
    fn from(code: u32) -> Self {
        Epsg(code)
    }
}

impl fmt::Display for Epsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

pub mod epsg {
    use super::Epsg;

    pub const WGS84: Epsg = Epsg::new(4326);
    pub const WGS84_WEB_MERCATOR: Epsg = Epsg::new(3857);
    pub const BELGIAN_LAMBERT72: Epsg = Epsg::new(31370);
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum Definition {
    Epsg(Epsg),
    Wkt(String),
}

#[derive(Clone, Debug)]
pub struct Crs(Arc<Definition>);

impl Crs {
    pub fn from_epsg(epsg: impl Into<Epsg>) -> Self {
        Crs(Arc::new(Definition::Epsg(epsg.into())))
    }

    /// Creates a CRS from a WKT definition, the definition is not validated
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Crs(Arc::new(Definition::Wkt(wkt.into())))
    }

    pub fn wgs84() -> Self {
        Crs::from_epsg(epsg::WGS84)
    }

    /// The EPSG code of the CRS, for WKT definitions this is the authority code of the outermost object
    pub fn epsg(&self) -> Option<Epsg> {
        match self.0.as_ref() {
            Definition::Epsg(epsg) => Some(*epsg),
            Definition::Wkt(wkt) => epsg_from_wkt(wkt),
        }
    }

    pub fn wkt(&self) -> Option<&str> {
        match self.0.as_ref() {
            Definition::Epsg(_) => None,
            Definition::Wkt(wkt) => Some(wkt),
        }
    }

    /// The OGC URN notation used by GeoJSON `crs` members (e.g. `urn:ogc:def:crs:EPSG::31370`)
    pub fn to_ogc_urn(&self) -> Option<String> {
        self.epsg().map(|epsg| format!("urn:ogc:def:crs:EPSG::{}", epsg.code()))
    }

    /// Both handles point to the same definition object
    pub fn shares_definition(&self, other: &Crs) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        if self.shares_definition(other) {
            return true;
        }

        match (self.epsg(), other.epsg()) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => self.0 == other.0,
        }
    }
}

impl Eq for Crs {}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            Definition::Epsg(epsg) => write!(f, "{epsg}"),
            Definition::Wkt(wkt) => write!(f, "{wkt}"),
        }
    }
}

impl FromStr for Crs {
    type Err = Error;

    fn from_str(definition: &str) -> Result<Self> {
        let def = definition.trim();
        if def.is_empty() {
            return Err(Error::InvalidArgument("Empty CRS definition".into()));
        }

        let upper = def.to_ascii_uppercase();
        if upper == "OGC:CRS84" || upper == "URN:OGC:DEF:CRS:OGC:1.3:CRS84" || upper == "URN:OGC:DEF:CRS:OGC::CRS84" {
            return Ok(Crs::wgs84());
        }

        if let Some(code) = upper.strip_prefix("EPSG:") {
            return Ok(Crs::from_epsg(code.trim().parse::<u32>()?));
        }

        if let Some(code) = upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:") {
            // Optional version between the double colons
            let code = code.rsplit(':').next().unwrap_or_default();
            return Ok(Crs::from_epsg(code.parse::<u32>()?));
        }

        if def.ends_with(']') {
            return Ok(Crs::from_wkt(def));
        }

        Err(Error::InvalidArgument(format!("Unsupported CRS definition: {def}")))
    }
}

/// Finds the authority code of the outermost object of a WKT1 (`AUTHORITY["EPSG","31370"]`)
/// or WKT2 (`ID["EPSG",31370]`) definition, which is the last one in the string.
fn epsg_from_wkt(wkt: &str) -> Option<Epsg> {
    let upper = wkt.to_ascii_uppercase();
    let start = ["AUTHORITY[", "ID["]
        .iter()
        .flat_map(|tag| {
            upper
                .match_indices(tag)
                // skip tags that are the tail of another keyword (e.g. SPHEROID[)
                .filter(|(pos, _)| *pos == 0 || !upper.as_bytes()[*pos - 1].is_ascii_alphabetic())
                .map(|(pos, _)| pos + tag.len())
        })
        .max()?;

    let rest = &upper[start..];
    let end = rest.find(']')?;
    let mut parts = rest[..end].split(',').map(|p| p.trim().trim_matches('"'));
    if parts.next()? != "EPSG" {
        return None;
    }

    parts.next()?.parse::<u32>().ok().map(Epsg::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAMBERT72_WKT: &str = r#"PROJCS["Belge 1972 / Belgian Lambert 72",GEOGCS["Belge 1972",DATUM["Reseau_National_Belge_1972",SPHEROID["International 1924",6378388,297,AUTHORITY["EPSG","7022"]],AUTHORITY["EPSG","6313"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4313"]],PROJECTION["Lambert_Conformal_Conic_2SP"],UNIT["metre",1],AUTHORITY["EPSG","31370"]]"#;

    #[test]
    fn parse_definitions() -> Result<()> {
        assert_eq!("EPSG:4326".parse::<Crs>()?.epsg(), Some(epsg::WGS84));
        assert_eq!("epsg:31370".parse::<Crs>()?.epsg(), Some(epsg::BELGIAN_LAMBERT72));
        assert_eq!("urn:ogc:def:crs:EPSG::3857".parse::<Crs>()?.epsg(), Some(epsg::WGS84_WEB_MERCATOR));
        assert_eq!("urn:ogc:def:crs:EPSG:9.8:3857".parse::<Crs>()?.epsg(), Some(epsg::WGS84_WEB_MERCATOR));
        assert_eq!("OGC:CRS84".parse::<Crs>()?, Crs::wgs84());
        assert!("".parse::<Crs>().is_err());
        assert!("EPSG:abc".parse::<Crs>().is_err());
        assert!("+proj=longlat".parse::<Crs>().is_err());
        Ok(())
    }

    #[test]
    fn wkt_authority_is_taken_from_outermost_object() {
        let crs = Crs::from_wkt(LAMBERT72_WKT);
        assert_eq!(crs.epsg(), Some(epsg::BELGIAN_LAMBERT72));
        assert_eq!(crs.to_ogc_urn().as_deref(), Some("urn:ogc:def:crs:EPSG::31370"));

        let wkt2 = r#"GEOGCRS["WGS 84",DATUM["World Geodetic System 1984",ELLIPSOID["WGS 84",6378137,298.257223563]],ID["EPSG",4326]]"#;
        assert_eq!(Crs::from_wkt(wkt2).epsg(), Some(epsg::WGS84));

        assert_eq!(Crs::from_wkt(r#"LOCAL_CS["arbitrary"]"#).epsg(), None);
    }

    #[test]
    fn compare_by_value() {
        assert_eq!(Crs::from_epsg(31370), Crs::from_wkt(LAMBERT72_WKT));
        assert_ne!(Crs::from_epsg(4326), Crs::from_wkt(LAMBERT72_WKT));
        assert_eq!(Crs::from_wkt(r#"LOCAL_CS["a"]"#), Crs::from_wkt(r#"LOCAL_CS["a"]"#));
        assert_ne!(Crs::from_wkt(r#"LOCAL_CS["a"]"#), Crs::from_wkt(r#"LOCAL_CS["b"]"#));

        let crs = Crs::wgs84();
        let shared = crs.clone();
        assert!(crs.shares_definition(&shared));
        assert!(!crs.shares_definition(&Crs::wgs84()));
    }
}
