//! Typed access to attribute values with lenient conversions between the scalar types.

use std::ops::RangeInclusive;

use chrono::NaiveDateTime;

use crate::{Error, Result, schema::Field, schema::parse_datetime};

fn parse_value_range(value_range: &str) -> Result<RangeInclusive<i32>> {
    let values: Vec<&str> = value_range.split('-').map(str::trim).collect();
    if values.len() == 1 {
        let value = values[0].parse::<i32>()?;
        Ok(RangeInclusive::new(value, value))
    } else if values.len() == 2 {
        let start = values[0].parse::<i32>()?;
        let end = values[1].parse::<i32>()?;
        Ok(RangeInclusive::new(start, end))
    } else {
        Err(Error::InvalidArgument(format!("Invalid value range: {value_range}")))
    }
}

fn parse_bool_str(val: &str) -> Option<bool> {
    match val.to_lowercase().trim() {
        "true" | "yes" | "y" | "t" | "1" => Some(true),
        "false" | "no" | "n" | "f" | "0" => Some(false),
        _ => None,
    }
}

pub trait VectorFieldType: Sized {
    /// An empty string is a valid value for this type rather than a missing value
    const EMPTY_FIELD_IS_VALID: bool;

    fn read_from_field(field: &Field) -> Result<Option<Self>>;
}

/// Converts an attribute value to the requested type, `None` values and
/// empty strings (for non-string types) are returned as `None`
pub fn read_field<T: VectorFieldType>(field: Option<&Field>) -> Result<Option<T>> {
    match field {
        Some(field) => {
            if !T::EMPTY_FIELD_IS_VALID
                && let Field::String(val) = field
                && val.trim().is_empty()
            {
                return Ok(None);
            }

            T::read_from_field(field)
        }
        None => Ok(None),
    }
}

impl VectorFieldType for f64 {
    const EMPTY_FIELD_IS_VALID: bool = false;

    fn read_from_field(field: &Field) -> Result<Option<Self>> {
        match field {
            Field::Float(val) => Ok(Some(*val)),
            Field::Integer(val) => Ok(Some(*val as f64)),
            Field::String(val) => Ok(Some(val.trim().parse()?)),
            Field::Boolean(val) => Ok(Some(if *val { 1.0 } else { 0.0 })),
            Field::DateTime(_) => Ok(None),
        }
    }
}

impl VectorFieldType for i64 {
    const EMPTY_FIELD_IS_VALID: bool = false;

    fn read_from_field(field: &Field) -> Result<Option<Self>> {
        match field {
            Field::Float(val) if val.fract() == 0.0 => Ok(Some(*val as i64)),
            Field::Float(val) => Err(Error::InvalidArgument(format!("{val} is not an integer value"))),
            Field::Integer(val) => Ok(Some(*val)),
            Field::String(val) => Ok(Some(val.trim().parse()?)),
            Field::Boolean(val) => Ok(Some(i64::from(*val))),
            Field::DateTime(_) => Ok(None),
        }
    }
}

impl VectorFieldType for i32 {
    const EMPTY_FIELD_IS_VALID: bool = false;

    fn read_from_field(field: &Field) -> Result<Option<Self>> {
        match i64::read_from_field(field)? {
            Some(val) => i32::try_from(val)
                .map(Some)
                .map_err(|_| Error::InvalidArgument(format!("{val} does not fit in a 32 bit integer"))),
            None => Ok(None),
        }
    }
}

impl VectorFieldType for bool {
    const EMPTY_FIELD_IS_VALID: bool = false;

    fn read_from_field(field: &Field) -> Result<Option<Self>> {
        match field {
            Field::Boolean(val) => Ok(Some(*val)),
            Field::Integer(val) => Ok(Some(*val != 0)),
            Field::String(val) => Ok(parse_bool_str(val)),
            _ => Ok(None),
        }
    }
}

impl VectorFieldType for String {
    const EMPTY_FIELD_IS_VALID: bool = true;

    fn read_from_field(field: &Field) -> Result<Option<Self>> {
        Ok(Some(field.to_string()))
    }
}

impl VectorFieldType for NaiveDateTime {
    const EMPTY_FIELD_IS_VALID: bool = false;

    fn read_from_field(field: &Field) -> Result<Option<Self>> {
        match field {
            Field::DateTime(val) => Ok(Some(*val)),
            Field::String(val) => parse_datetime(val)
                .map(Some)
                .ok_or_else(|| Error::InvalidArgument(format!("'{val}' is not a valid timestamp"))),
            _ => Ok(None),
        }
    }
}

impl VectorFieldType for RangeInclusive<i32> {
    const EMPTY_FIELD_IS_VALID: bool = false;

    fn read_from_field(field: &Field) -> Result<Option<Self>> {
        match field {
            Field::Float(val) => Ok(Some(RangeInclusive::new(*val as i32, *val as i32))),
            Field::Integer(val) => Ok(Some(RangeInclusive::new(*val as i32, *val as i32))),
            Field::String(val) => Ok(Some(parse_value_range(val)?)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_conversions() -> Result<()> {
        assert_eq!(read_field::<f64>(Some(&Field::Integer(4)))?, Some(4.0));
        assert_eq!(read_field::<f64>(Some(&Field::String(" 2.5 ".into())))?, Some(2.5));
        assert_eq!(read_field::<i64>(Some(&Field::Float(3.0)))?, Some(3));
        assert!(read_field::<i64>(Some(&Field::Float(3.5))).is_err());
        assert!(read_field::<i32>(Some(&Field::Integer(i64::MAX))).is_err());
        assert!(read_field::<f64>(Some(&Field::String("abc".into()))).is_err());
        Ok(())
    }

    #[test]
    fn empty_strings_are_missing_values() -> Result<()> {
        assert_eq!(read_field::<f64>(Some(&Field::String(String::new())))?, None);
        assert_eq!(read_field::<bool>(Some(&Field::String("  ".into())))?, None);
        assert_eq!(read_field::<String>(Some(&Field::String(String::new())))?, Some(String::new()));
        assert_eq!(read_field::<f64>(None)?, None);
        Ok(())
    }

    #[test]
    fn bool_and_ranges() -> Result<()> {
        assert_eq!(read_field::<bool>(Some(&Field::String("Yes".into())))?, Some(true));
        assert_eq!(read_field::<bool>(Some(&Field::Integer(0)))?, Some(false));
        assert_eq!(read_field::<bool>(Some(&Field::String("maybe".into())))?, None);
        assert_eq!(
            read_field::<RangeInclusive<i32>>(Some(&Field::String("2020 - 2025".into())))?,
            Some(2020..=2025)
        );
        assert_eq!(read_field::<RangeInclusive<i32>>(Some(&Field::Integer(2021)))?, Some(2021..=2021));
        assert!(read_field::<RangeInclusive<i32>>(Some(&Field::String("1-2-3".into()))).is_err());
        Ok(())
    }
}
