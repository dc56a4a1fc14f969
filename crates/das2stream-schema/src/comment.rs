use serde::Serialize;

use crate::error::Result;
use crate::xml::{push_attr, Element};

/// Out-of-band `<comment>` message: progress, log lines and the like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamComment {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl StreamComment {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from("<comment");
        push_attr(&mut out, "type", &self.kind);
        push_attr(&mut out, "value", &self.value);
        if let Some(source) = &self.source {
            push_attr(&mut out, "source", source);
        }
        out.push_str("/>\n");
        out
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        Ok(Self {
            kind: element.required_attr("type")?.to_string(),
            value: element.attr("value").unwrap_or_default().to_string(),
            source: element.attr("source").map(str::to_string),
        })
    }
}

/// In-band `<exception>`: the producer gave up, or had nothing to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamException {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl StreamException {
    pub const NO_DATA_IN_INTERVAL: &'static str = "NoDataInInterval";
    pub const ILLEGAL_ARGUMENT: &'static str = "IllegalArgument";
    pub const SERVER_ERROR: &'static str = "ServerError";

    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// True for the "query matched nothing" exception, which is not a failure.
    pub fn is_no_data(&self) -> bool {
        self.kind == Self::NO_DATA_IN_INTERVAL
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from("<exception");
        push_attr(&mut out, "type", &self.kind);
        push_attr(&mut out, "message", &self.message);
        out.push_str("/>\n");
        out
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        Ok(Self {
            kind: element.required_attr("type")?.to_string(),
            message: element.attr("message").unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::xml::parse_element;

    #[test]
    fn comment_roundtrip() {
        let comment = StreamComment::new("taskProgress", "42").with_source("reader");
        let parsed = StreamComment::from_element(&parse_element(&comment.to_xml()).unwrap());
        assert_eq!(parsed.unwrap(), comment);
    }

    #[test]
    fn comment_requires_type() {
        let err = StreamComment::from_element(&parse_element(r#"<comment value="x"/>"#).unwrap())
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingAttribute { .. }));
    }

    #[test]
    fn exception_kinds() {
        let element = parse_element(
            r#"<exception type="NoDataInInterval" message="nothing &lt;here&gt;"/>"#,
        )
        .unwrap();
        let exception = StreamException::from_element(&element).unwrap();
        assert!(exception.is_no_data());
        assert_eq!(exception.message, "nothing <here>");
        assert!(!StreamException::new(StreamException::SERVER_ERROR, "boom").is_no_data());
    }
}
