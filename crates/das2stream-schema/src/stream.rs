use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::property::Properties;
use crate::xml::{push_attr, push_properties, Element};

/// Transport compression announced by the stream header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    /// zlib over every byte after the stream header frame.
    Deflate,
}

impl Compression {
    /// Interpret a `compression` attribute value.
    pub fn from_attr(value: &str) -> Result<Self> {
        match value.trim() {
            "" | "none" => Ok(Self::None),
            "deflate" => Ok(Self::Deflate),
            other => Err(SchemaError::UnsupportedCompression(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Deflate => "deflate",
        }
    }
}

/// The `<stream>` header: global properties and transport options.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamSchema {
    pub version: Option<String>,
    pub compression: Compression,
    pub properties: Properties,
}

impl StreamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Serialize as a current-dialect `<stream>` element.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<stream");
        if let Some(version) = &self.version {
            push_attr(&mut out, "version", version);
        }
        if self.compression != Compression::None {
            push_attr(&mut out, "compression", self.compression.as_str());
        }
        let properties = self.properties.to_attributes();
        if properties.is_empty() {
            out.push_str("/>\n");
            return out;
        }
        out.push_str(">\n");
        push_properties(&mut out, "  ", &properties);
        out.push_str("</stream>\n");
        out
    }

    /// Interpret a `<stream>` element of either dialect.
    pub fn from_element(element: &Element) -> Result<Self> {
        let mut schema = Self {
            version: element.attr("version").map(str::to_string),
            compression: Compression::from_attr(element.attr("compression").unwrap_or(""))?,
            properties: Properties::new(),
        };
        for child in &element.children {
            if child.name.eq_ignore_ascii_case("properties") {
                schema
                    .properties
                    .extend_from_attributes(&child.attributes)?;
            } else {
                debug!(element = %child.name, "ignoring unknown stream child");
            }
        }
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyValue;
    use crate::xml::parse_element;

    #[test]
    fn reads_compression_and_properties() {
        let root = parse_element(
            r#"<stream version="2.2" compression="deflate">
  <properties title="Survey" double:fill="-1e31"/>
</stream>"#,
        )
        .unwrap();
        let schema = StreamSchema::from_element(&root).unwrap();
        assert_eq!(schema.version.as_deref(), Some("2.2"));
        assert_eq!(schema.compression, Compression::Deflate);
        assert_eq!(
            schema.properties.get("fill"),
            Some(&PropertyValue::Double(-1e31))
        );
    }

    #[test]
    fn unknown_compression_is_rejected() {
        let root = parse_element(r#"<stream compression="lzma"/>"#).unwrap();
        assert_eq!(
            StreamSchema::from_element(&root).unwrap_err(),
            SchemaError::UnsupportedCompression("lzma".to_string())
        );
    }

    #[test]
    fn serializes_and_reparses() {
        let mut properties = Properties::new();
        properties.insert("title", PropertyValue::String("a \"quoted\" title".into()));
        let schema = StreamSchema::new()
            .with_version("2.2")
            .with_compression(Compression::Deflate)
            .with_properties(properties);

        let xml = schema.to_xml();
        assert!(xml.starts_with(r#"<stream version="2.2" compression="deflate">"#));
        let again = StreamSchema::from_element(&parse_element(&xml).unwrap()).unwrap();
        assert_eq!(again, schema);
    }

    #[test]
    fn bare_stream_is_self_closing() {
        assert_eq!(StreamSchema::new().to_xml(), "<stream/>\n");
    }
}
