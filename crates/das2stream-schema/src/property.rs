//! Typed `<properties>` attributes.
//!
//! Attribute names carry their type as a prefix (`double:fillValue`,
//! `DatumRange:xRange`); an unprefixed name is a string.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::units::Units;

/// One property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum PropertyValue {
    String(String),
    Double(f64),
    Int(i64),
    Boolean(bool),
    DoubleArray(Vec<f64>),
    Datum { value: f64, units: Units },
    DatumRange { min: f64, max: f64, units: Units },
    /// Time text, left for the time library to interpret.
    Time(String),
    /// Time range text, left for the time library to interpret.
    TimeRange(String),
}

impl PropertyValue {
    /// Parse `text` as the type named by an attribute prefix.
    pub fn parse(type_name: &str, text: &str, attribute: &str) -> Result<Self> {
        let bad = || SchemaError::bad_attribute(attribute, text);
        let value = match type_name {
            "String" | "string" => Self::String(text.to_string()),
            "double" => Self::Double(parse_number(text).ok_or_else(bad)?),
            "int" => Self::Int(text.trim().parse().map_err(|_| bad())?),
            "boolean" => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Self::Boolean(true),
                "false" => Self::Boolean(false),
                _ => return Err(bad()),
            },
            "doubleArray" => Self::DoubleArray(parse_number_list(text).ok_or_else(bad)?),
            "Datum" => {
                let (value, units) = split_datum(text).ok_or_else(bad)?;
                Self::Datum { value, units }
            }
            "DatumRange" => {
                let mut tokens = text.split_whitespace();
                let min = tokens.next().and_then(parse_number).ok_or_else(bad)?;
                if tokens.next() != Some("to") {
                    return Err(bad());
                }
                let max = tokens.next().and_then(parse_number).ok_or_else(bad)?;
                let units = tokens.collect::<Vec<_>>().join(" ");
                Self::DatumRange {
                    min,
                    max,
                    units: Units::new(units),
                }
            }
            "Time" => Self::Time(text.trim().to_string()),
            "TimeRange" => Self::TimeRange(text.trim().to_string()),
            other => {
                debug!(attribute, type_name = other, "unknown property type kept as string");
                Self::String(text.to_string())
            }
        };
        Ok(value)
    }

    /// Type prefix written on the wire; `None` for plain strings.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            Self::String(_) => None,
            Self::Double(_) => Some("double"),
            Self::Int(_) => Some("int"),
            Self::Boolean(_) => Some("boolean"),
            Self::DoubleArray(_) => Some("doubleArray"),
            Self::Datum { .. } => Some("Datum"),
            Self::DatumRange { .. } => Some("DatumRange"),
            Self::Time(_) => Some("Time"),
            Self::TimeRange(_) => Some("TimeRange"),
        }
    }

    /// Attribute value text.
    pub fn to_wire(&self) -> String {
        match self {
            Self::String(s) | Self::Time(s) | Self::TimeRange(s) => s.clone(),
            Self::Double(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Boolean(v) => v.to_string(),
            Self::DoubleArray(values) => join_numbers(values),
            Self::Datum { value, units } if units.is_dimensionless() => value.to_string(),
            Self::Datum { value, units } => format!("{value} {units}"),
            Self::DatumRange { min, max, units } if units.is_dimensionless() => {
                format!("{min} to {max}")
            }
            Self::DatumRange { min, max, units } => format!("{min} to {max} {units}"),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Datum { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Time(s) | Self::TimeRange(s) => Some(s),
            _ => None,
        }
    }
}

/// Name-ordered property map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropertyValue>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw `<properties>` attributes.
    pub fn from_attributes<'a>(
        attributes: impl IntoIterator<Item = &'a (String, String)>,
    ) -> Result<Self> {
        let mut properties = Self::new();
        properties.extend_from_attributes(attributes)?;
        Ok(properties)
    }

    /// Merge raw `<properties>` attributes; later names win.
    pub fn extend_from_attributes<'a>(
        &mut self,
        attributes: impl IntoIterator<Item = &'a (String, String)>,
    ) -> Result<()> {
        for (raw_name, text) in attributes {
            let (type_name, name) = raw_name.split_once(':').unwrap_or(("String", raw_name));
            let value = PropertyValue::parse(type_name, text, raw_name)?;
            self.0.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Raw attributes in name order, with type prefixes.
    pub fn to_attributes(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(name, value)| {
                let key = match value.type_name() {
                    Some(prefix) => format!("{prefix}:{name}"),
                    None => name.clone(),
                };
                (key, value.to_wire())
            })
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) -> Option<PropertyValue> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }
}

pub(crate) fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse().ok()
}

pub(crate) fn parse_number_list(text: &str) -> Option<Vec<f64>> {
    if text.trim().is_empty() {
        return Some(Vec::new());
    }
    text.split(',').map(parse_number).collect()
}

pub(crate) fn join_numbers(values: &[f64]) -> String {
    values
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn split_datum(text: &str) -> Option<(f64, Units)> {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((number, units)) => Some((parse_number(number)?, Units::new(units.trim()))),
        None => Some((parse_number(text)?, Units::dimensionless())),
    }
}
