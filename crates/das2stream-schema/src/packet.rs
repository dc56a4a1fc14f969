//! Packet descriptors: the field layout behind one `:NN:` packet id.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::codec::Codec;
use crate::error::{Result, SchemaError};
use crate::property::{join_numbers, parse_number, parse_number_list, Properties};
use crate::units::Units;
use crate::xml::{push_attr, push_properties, Element};

/// Largest data packet body a descriptor may declare: 64 MiB.
pub const MAX_PACKET_LEN: usize = 64 * 1024 * 1024;

/// Packet id, `01` through `99` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PacketId(u8);

impl PacketId {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 99;

    /// The first id a writer hands out.
    pub const FIRST: PacketId = PacketId(Self::MIN);

    pub fn new(id: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&id).then_some(Self(id))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Parse the two digits between the marker delimiters.
    pub fn from_ascii(digits: [u8; 2]) -> Option<Self> {
        if !digits.iter().all(u8::is_ascii_digit) {
            return None;
        }
        Self::new((digits[0] - b'0') * 10 + (digits[1] - b'0'))
    }

    pub fn to_ascii(self) -> [u8; 2] {
        [b'0' + self.0 / 10, b'0' + self.0 % 10]
    }

    /// The id after this one, wrapping from 99 back to 1.
    pub fn next_cyclic(self) -> Self {
        if self.0 >= Self::MAX {
            Self(Self::MIN)
        } else {
            Self(self.0 + 1)
        }
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// Coordinates of the items in a `yscan` plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum YTags {
    /// One explicit tag per item.
    List(Vec<f64>),
    /// `min + i * interval` for item `i`.
    Interval { min: f64, interval: f64 },
}

impl Default for YTags {
    fn default() -> Self {
        Self::Interval {
            min: 0.0,
            interval: 1.0,
        }
    }
}

impl YTags {
    /// Expand to one tag per item.
    pub fn values(&self, nitems: usize) -> Vec<f64> {
        match self {
            Self::List(values) => values.clone(),
            Self::Interval { min, interval } => {
                (0..nitems).map(|i| min + i as f64 * interval).collect()
            }
        }
    }
}

/// Plane kind without role parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneKind {
    X,
    Y,
    YScan,
    Z,
}

impl PlaneKind {
    /// Current-dialect element name.
    pub fn element_name(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::YScan => "yscan",
            Self::Z => "z",
        }
    }
}

impl fmt::Display for PlaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

/// What a field means within its packet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum FieldRole {
    /// The independent coordinate, usually time.
    X,
    /// A scalar dependent value.
    Y,
    /// `nitems` values sharing one codec, tagged along a second axis.
    YScan {
        nitems: usize,
        tags: YTags,
        tag_units: Units,
    },
    /// A value on an (x, y) scatter point.
    Z,
}

impl FieldRole {
    pub fn kind(&self) -> PlaneKind {
        match self {
            Self::X => PlaneKind::X,
            Self::Y => PlaneKind::Y,
            Self::YScan { .. } => PlaneKind::YScan,
            Self::Z => PlaneKind::Z,
        }
    }
}

/// One field (plane) of a packet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub role: FieldRole,
    pub codec: Codec,
    pub units: Units,
    pub name: Option<String>,
    pub properties: Properties,
}

impl FieldSpec {
    fn with_role(role: FieldRole, codec: Codec, units: Units) -> Self {
        Self {
            role,
            codec,
            units,
            name: None,
            properties: Properties::new(),
        }
    }

    pub fn x(codec: Codec, units: impl Into<Units>) -> Self {
        Self::with_role(FieldRole::X, codec, units.into())
    }

    pub fn y(codec: Codec, units: impl Into<Units>) -> Self {
        Self::with_role(FieldRole::Y, codec, units.into())
    }

    pub fn z(codec: Codec, units: impl Into<Units>) -> Self {
        Self::with_role(FieldRole::Z, codec, units.into())
    }

    pub fn yscan(
        codec: Codec,
        units: impl Into<Units>,
        nitems: usize,
        tags: YTags,
        tag_units: impl Into<Units>,
    ) -> Self {
        let role = FieldRole::YScan {
            nitems,
            tags,
            tag_units: tag_units.into(),
        };
        Self::with_role(role, codec, units.into())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn kind(&self) -> PlaneKind {
        self.role.kind()
    }

    /// Number of values the field carries.
    pub fn item_count(&self) -> usize {
        match &self.role {
            FieldRole::YScan { nitems, .. } => *nitems,
            _ => 1,
        }
    }

    /// Saturates instead of overflowing; [`PacketSchema::new`] rejects
    /// anything above [`MAX_PACKET_LEN`].
    pub fn byte_len(&self) -> usize {
        self.item_count().saturating_mul(self.codec.size_bytes())
    }

    fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("(unnamed {})", self.kind()))
    }

    fn write_xml(&self, out: &mut String) {
        let element = self.kind().element_name();
        out.push_str("  <");
        out.push_str(element);
        push_attr(out, "type", &self.codec.type_name());
        if let Some(name) = &self.name {
            push_attr(out, "name", name);
        }
        match &self.role {
            FieldRole::YScan {
                nitems,
                tags,
                tag_units,
            } => {
                push_attr(out, "nitems", &nitems.to_string());
                match tags {
                    YTags::List(values) => push_attr(out, "yTags", &join_numbers(values)),
                    YTags::Interval { min, interval } => {
                        push_attr(out, "yTagMin", &min.to_string());
                        push_attr(out, "yTagInterval", &interval.to_string());
                    }
                }
                push_attr(out, "yUnits", tag_units.as_str());
                push_attr(out, "zUnits", self.units.as_str());
            }
            _ => push_attr(out, "units", self.units.as_str()),
        }

        let properties = self.properties.to_attributes();
        if properties.is_empty() {
            out.push_str("/>\n");
        } else {
            out.push_str(">\n");
            push_properties(out, "    ", &properties);
            out.push_str("  </");
            out.push_str(element);
            out.push_str(">\n");
        }
    }

    fn from_element(element: &Element) -> Result<Self> {
        let (kind, legacy) = match element.name.as_str() {
            "x" => (PlaneKind::X, false),
            "y" => (PlaneKind::Y, false),
            "z" => (PlaneKind::Z, false),
            "yscan" => (PlaneKind::YScan, false),
            "X" => (PlaneKind::X, true),
            "Y" | "MultiY" => (PlaneKind::Y, true),
            "YScan" => (PlaneKind::YScan, true),
            other => {
                return Err(SchemaError::UnexpectedElement {
                    parent: "packet".to_string(),
                    child: other.to_string(),
                })
            }
        };

        let type_name = element.required_attr("type")?;
        let units = match kind {
            PlaneKind::YScan => element
                .attr("zUnits")
                .or_else(|| element.attr("units"))
                .unwrap_or_default(),
            _ if legacy => element.attr("units").unwrap_or_default(),
            _ => element.required_attr("units")?,
        };
        let units = Units::new(units.trim());
        let codec = Codec::from_type_name(type_name.trim(), &units)?;

        let role = match kind {
            PlaneKind::X => FieldRole::X,
            PlaneKind::Y => FieldRole::Y,
            PlaneKind::Z => FieldRole::Z,
            PlaneKind::YScan => yscan_role(element)?,
        };

        let mut field = Self::with_role(role, codec, units);
        field.name = element
            .attr("name")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        for child in &element.children {
            if child.name.eq_ignore_ascii_case("properties") {
                field.properties.extend_from_attributes(&child.attributes)?;
            } else {
                return Err(SchemaError::UnexpectedElement {
                    parent: element.name.clone(),
                    child: child.name.clone(),
                });
            }
        }
        Ok(field)
    }
}

fn yscan_role(element: &Element) -> Result<FieldRole> {
    let nitems_text = element.required_attr("nitems")?;
    let nitems = nitems_text
        .trim()
        .parse::<usize>()
        .map_err(|_| SchemaError::bad_attribute("nitems", nitems_text))?;

    let tags = match element.attr("yTags") {
        Some(text) => {
            YTags::List(parse_number_list(text).ok_or_else(|| SchemaError::bad_attribute("yTags", text))?)
        }
        None => {
            let number = |attribute: &str, default: f64| match element.attr(attribute) {
                Some(text) => {
                    parse_number(text).ok_or_else(|| SchemaError::bad_attribute(attribute, text))
                }
                None => Ok(default),
            };
            YTags::Interval {
                min: number("yTagMin", 0.0)?,
                interval: number("yTagInterval", 1.0)?,
            }
        }
    };

    Ok(FieldRole::YScan {
        nitems,
        tags,
        tag_units: Units::new(element.attr("yUnits").unwrap_or_default().trim()),
    })
}

/// The validated layout of one packet id.
///
/// Construction checks every structural rule, so a `PacketSchema` in hand
/// always has exactly one x plane, unique field names and a fixed byte length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketSchema {
    fields: Vec<FieldSpec>,
    properties: Properties,
    byte_len: usize,
    value_count: usize,
}

impl PacketSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self> {
        let mut x_count = 0;
        let mut seen_y = false;
        let mut names = HashSet::new();

        for field in &fields {
            match &field.role {
                FieldRole::X => x_count += 1,
                FieldRole::Y => seen_y = true,
                FieldRole::Z if !seen_y => return Err(SchemaError::OrphanZ(field.label())),
                FieldRole::Z => {}
                FieldRole::YScan { nitems, tags, .. } => {
                    if *nitems == 0 {
                        return Err(SchemaError::bad_attribute("nitems", "0"));
                    }
                    if let YTags::List(values) = tags {
                        if values.len() != *nitems {
                            return Err(SchemaError::bad_attribute(
                                "yTags",
                                &join_numbers(values),
                            ));
                        }
                    }
                }
            }
            if let Some(name) = &field.name {
                if !names.insert(name.as_str()) {
                    return Err(SchemaError::DuplicateName(name.clone()));
                }
            }
        }
        match x_count {
            0 => return Err(SchemaError::MissingX),
            1 => {}
            _ => return Err(SchemaError::DuplicateX),
        }

        let mut byte_len = 0usize;
        for field in &fields {
            byte_len = byte_len
                .checked_add(field.byte_len())
                .filter(|len| *len <= MAX_PACKET_LEN)
                .ok_or_else(|| {
                    SchemaError::bad_attribute("nitems", &field.item_count().to_string())
                })?;
        }
        let value_count = fields.iter().map(FieldSpec::item_count).sum();
        Ok(Self {
            fields,
            properties: Properties::new(),
            byte_len,
            value_count,
        })
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Bytes in one `:NN:` packet body.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Values in one packet, counting every `yscan` item.
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn x_field(&self) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.kind() == PlaneKind::X)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name.as_deref() == Some(name))
    }

    /// True when the packet ends in a text field, so its last byte is a
    /// record separator.
    pub fn last_field_is_ascii(&self) -> bool {
        self.fields.last().is_some_and(|f| f.codec.is_ascii())
    }

    /// Serialize as a current-dialect `<packet>` element.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<packet>\n");
        push_properties(&mut out, "  ", &self.properties.to_attributes());
        for field in &self.fields {
            field.write_xml(&mut out);
        }
        out.push_str("</packet>\n");
        out
    }

    /// Interpret a `<packet>` element of either dialect.
    pub fn from_element(element: &Element) -> Result<Self> {
        let mut properties = Properties::new();
        let mut fields = Vec::with_capacity(element.children.len());
        for child in &element.children {
            if child.name.eq_ignore_ascii_case("properties") {
                properties.extend_from_attributes(&child.attributes)?;
            } else {
                fields.push(FieldSpec::from_element(child)?);
            }
        }
        Ok(Self::new(fields)?.with_properties(properties))
    }
}
