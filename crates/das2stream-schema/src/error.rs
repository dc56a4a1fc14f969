/// Errors raised while parsing or validating schema descriptors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// The XML text is not well formed.
    #[error("malformed XML at line {line}, column {column}: {message}")]
    Xml {
        /// Byte position within the XML text.
        position: usize,
        line: usize,
        column: usize,
        message: String,
    },

    /// Non-whitespace content follows the root element.
    #[error("unexpected content after root element at line {line}, column {column}")]
    TrailingContent {
        /// Byte position of the first trailing byte within the XML text.
        position: usize,
        line: usize,
        column: usize,
    },

    /// The root element is not one the frame allows.
    #[error("unexpected root element <{0}>")]
    UnexpectedRoot(String),

    /// A child element is not recognized in this position.
    #[error("unexpected element <{child}> inside <{parent}>")]
    UnexpectedElement { parent: String, child: String },

    /// The field's `type` attribute names no known codec.
    #[error("unsupported codec type \"{0}\"")]
    UnsupportedCodec(String),

    /// The stream header names an unknown compression mode.
    #[error("unsupported compression \"{0}\"")]
    UnsupportedCompression(String),

    /// Two fields of one packet share a name.
    #[error("duplicate field name \"{0}\" in packet descriptor")]
    DuplicateName(String),

    /// An attribute value could not be interpreted.
    #[error("invalid value for attribute {attribute}: \"{value}\"")]
    BadAttribute { attribute: String, value: String },

    /// A required attribute is absent.
    #[error("missing attribute {attribute} on <{element}>")]
    MissingAttribute { element: String, attribute: String },

    /// The packet has no x plane.
    #[error("packet descriptor has no x plane")]
    MissingX,

    /// The packet has more than one x plane.
    #[error("packet descriptor has more than one x plane")]
    DuplicateX,

    /// A z plane appears before any y plane.
    #[error("z plane {0} has no preceding y plane")]
    OrphanZ(String),
}

impl SchemaError {
    pub(crate) fn bad_attribute(attribute: &str, value: &str) -> Self {
        Self::BadAttribute {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn missing_attribute(element: &str, attribute: &str) -> Self {
        Self::MissingAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

/// Errors raised by a field codec.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// The field's bytes do not parse under its codec.
    #[error("cannot decode \"{text}\" as {codec}")]
    Decode { codec: String, text: String },

    /// The value cannot be represented in the field.
    #[error("value {value} does not fit in {codec}")]
    Encode { codec: String, value: f64 },

    /// The slice handed to the codec has the wrong length.
    #[error("{codec} expects {expected} bytes, got {actual}")]
    Length {
        codec: String,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
