use crate::comment::{StreamComment, StreamException};
use crate::error::{Result, SchemaError};
use crate::packet::PacketSchema;
use crate::stream::StreamSchema;
use crate::xml::parse_element;

/// Any XML payload a header frame can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Stream(StreamSchema),
    Packet(PacketSchema),
    Comment(StreamComment),
    Exception(StreamException),
}

impl Descriptor {
    /// Root element name as written in the current dialect.
    pub fn root_name(&self) -> &'static str {
        match self {
            Self::Stream(_) => "stream",
            Self::Packet(_) => "packet",
            Self::Comment(_) => "comment",
            Self::Exception(_) => "exception",
        }
    }

    /// Serialize in the current dialect.
    pub fn to_xml(&self) -> String {
        match self {
            Self::Stream(schema) => schema.to_xml(),
            Self::Packet(schema) => schema.to_xml(),
            Self::Comment(comment) => comment.to_xml(),
            Self::Exception(exception) => exception.to_xml(),
        }
    }
}

/// Parse one header payload. Root names match case-insensitively so legacy
/// producers' `<STREAM>`/`<PACKET>` are accepted.
pub fn parse_descriptor(text: &str) -> Result<Descriptor> {
    let root = parse_element(text)?;
    let descriptor = match root.name.to_ascii_lowercase().as_str() {
        "stream" => Descriptor::Stream(StreamSchema::from_element(&root)?),
        "packet" => Descriptor::Packet(PacketSchema::from_element(&root)?),
        "comment" => Descriptor::Comment(StreamComment::from_element(&root)?),
        "exception" => Descriptor::Exception(StreamException::from_element(&root)?),
        _ => return Err(SchemaError::UnexpectedRoot(root.name)),
    };
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_root() {
        let cases = [
            ("<stream/>", "stream"),
            ("<Stream version=\"1.0\"/>", "stream"),
            (
                "<packet><x type=\"sun_real8\" units=\"t2000\"/></packet>",
                "packet",
            ),
            ("<comment type=\"log:info\" value=\"hi\"/>", "comment"),
            ("<exception type=\"ServerError\" message=\"x\"/>", "exception"),
        ];
        for (text, root) in cases {
            assert_eq!(parse_descriptor(text).unwrap().root_name(), root, "{text}");
        }
    }

    #[test]
    fn unknown_root() {
        assert_eq!(
            parse_descriptor("<html><body/></html>").unwrap_err(),
            SchemaError::UnexpectedRoot("html".to_string())
        );
    }

    #[test]
    fn reserializes_current_dialect() {
        let descriptor = parse_descriptor(
            "<PACKET><X type=\"sun_real8\"/><Y type=\"sun_real4\" name=\"b\"/></PACKET>",
        )
        .unwrap();
        let xml = descriptor.to_xml();
        assert!(xml.contains("<x type=\"sun_real8\" units=\"\"/>"), "{xml}");
        assert_eq!(parse_descriptor(&xml).unwrap(), descriptor);
    }
}
