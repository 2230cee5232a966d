//! Attribute values and the field schema of a layer.

use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "String",
            FieldType::Integer => "Integer",
            FieldType::Float => "Float",
            FieldType::Boolean => "Boolean",
            FieldType::DateTime => "DateTime",
        };
        f.write_str(name)
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(FieldType::String),
            "integer" => Ok(FieldType::Integer),
            "float" => Ok(FieldType::Float),
            "boolean" => Ok(FieldType::Boolean),
            "datetime" => Ok(FieldType::DateTime),
            _ => Err(Error::InvalidArgument(format!("Unknown field type: '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::String(_) => FieldType::String,
            Field::Integer(_) => FieldType::Integer,
            Field::Float(_) => FieldType::Float,
            Field::Boolean(_) => FieldType::Boolean,
            Field::DateTime(_) => FieldType::DateTime,
        }
    }

    /// A value can be stored in a column of the given type without conversion
    /// (integers are accepted in float columns)
    pub fn fits(&self, field_type: FieldType) -> bool {
        self.field_type() == field_type || (field_type == FieldType::Float && matches!(self, Field::Integer(_)))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Field::Integer(val) => Some(*val as f64),
            Field::Float(val) => Some(*val),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::String(val) => write!(f, "{val}"),
            Field::Integer(val) => write!(f, "{val}"),
            Field::Float(val) => write!(f, "{val}"),
            Field::Boolean(val) => write!(f, "{val}"),
            Field::DateTime(val) => write!(f, "{}", val.format(DATETIME_FORMAT)),
        }
    }
}

/// ISO 8601 notation used when timestamps are stored as text
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parses the timestamp notations that are commonly found in text based formats
pub fn parse_datetime(val: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y/%m/%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.fZ"];

    let val = val.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(val, fmt).ok())
        .or_else(|| chrono::DateTime::parse_from_rfc3339(val).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(val, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    name: String,
    field_type: FieldType,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Schema {
    pub fields: Vec<FieldInfo>,
}

impl Schema {
    pub fn new(fields: Vec<FieldInfo>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(FieldInfo::name)
    }

    /// Index of the field with the given name, an exact match takes precedence over a case-insensitive match
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .or_else(|| self.fields.iter().position(|f| f.name.eq_ignore_ascii_case(name)))
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.index_of(name).map(|idx| &self.fields[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_names() {
        for field_type in [FieldType::String, FieldType::Integer, FieldType::Float, FieldType::Boolean, FieldType::DateTime] {
            assert_eq!(field_type.to_string().parse::<FieldType>().ok(), Some(field_type));
        }

        assert_eq!("datetime".parse::<FieldType>().ok(), Some(FieldType::DateTime));
        assert!("Date".parse::<FieldType>().is_err());
    }

    #[test]
    fn field_lookup() {
        let schema = Schema::new(vec![
            FieldInfo::new("Name", FieldType::String),
            FieldInfo::new("name", FieldType::Integer),
            FieldInfo::new("Population", FieldType::Integer),
        ]);

        assert_eq!(schema.index_of("name"), Some(1));
        assert_eq!(schema.index_of("Name"), Some(0));
        assert_eq!(schema.index_of("POPULATION"), Some(2));
        assert_eq!(schema.index_of("area"), None);
        assert_eq!(schema.names().collect::<Vec<_>>(), vec!["Name", "name", "Population"]);
    }

    #[test]
    fn datetime_notations() {
        let expected = chrono::NaiveDate::from_ymd_opt(2023, 5, 17)
            .and_then(|d| d.and_hms_opt(10, 30, 0))
            .expect("valid date");

        assert_eq!(parse_datetime("2023-05-17T10:30:00"), Some(expected));
        assert_eq!(parse_datetime("2023-05-17 10:30:00"), Some(expected));
        assert_eq!(parse_datetime("2023/05/17 10:30:00"), Some(expected));
        assert_eq!(parse_datetime("2023-05-17T10:30:00Z"), Some(expected));
        assert_eq!(parse_datetime("2023-05-17T12:30:00+02:00"), Some(expected));
        assert_eq!(
            parse_datetime("2023-05-17"),
            chrono::NaiveDate::from_ymd_opt(2023, 5, 17).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(parse_datetime("Alice"), None);
        assert_eq!(parse_datetime("12"), None);
    }

    #[test]
    fn datetime_text_roundtrip() {
        let value = Field::DateTime(parse_datetime("2023-05-17T10:30:00.250").expect("valid timestamp"));
        assert_eq!(value.to_string(), "2023-05-17T10:30:00.250");
        assert_eq!(parse_datetime(&value.to_string()).map(Field::DateTime), Some(value));
    }
}
