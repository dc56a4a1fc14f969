//! Minimal element tree over quick-xml.
//!
//! Descriptors are small and attribute-heavy, so they are read into an owned
//! [`Element`] tree first and interpreted afterwards. Text content is ignored.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, SchemaError};

/// One parsed element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    /// Attributes in document order, values unescaped.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Value of the first attribute called `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Like [`attr`](Self::attr), but an absent attribute is an error.
    pub fn required_attr(&self, name: &str) -> Result<&str> {
        self.attr(name)
            .ok_or_else(|| SchemaError::missing_attribute(&self.name, name))
    }

    fn from_start(start: &BytesStart<'_>) -> std::result::Result<Self, quick_xml::Error> {
        let mut element = Self::new(String::from_utf8_lossy(start.name().as_ref()));
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }
}

/// Parse `text` as exactly one root element.
///
/// Declarations, comments and processing instructions before the root are
/// skipped. Anything other than whitespace or NUL padding after it is a
/// [`SchemaError::TrailingContent`].
pub fn parse_element(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_error(text, reader.error_position() as usize, e.to_string()))?;
        let finished = match event {
            Event::Start(start) => {
                let element = Element::from_start(&start)
                    .map_err(|e| xml_error(text, reader.buffer_position() as usize, e.to_string()))?;
                stack.push(element);
                None
            }
            Event::Empty(start) => {
                let element = Element::from_start(&start)
                    .map_err(|e| xml_error(text, reader.buffer_position() as usize, e.to_string()))?;
                attach(&mut stack, element)
            }
            Event::End(_) => match stack.pop() {
                Some(element) => attach(&mut stack, element),
                None => {
                    return Err(xml_error(
                        text,
                        reader.buffer_position() as usize,
                        "closing tag without an open element".to_string(),
                    ))
                }
            },
            Event::Text(content) if stack.is_empty() => {
                if content.iter().any(|b| !is_padding(*b)) {
                    return Err(xml_error(
                        text,
                        reader.buffer_position() as usize,
                        "text outside the root element".to_string(),
                    ));
                }
                None
            }
            Event::Eof => {
                let message = match stack.last() {
                    Some(open) => format!("element <{}> is never closed", open.name),
                    None => "no root element".to_string(),
                };
                return Err(xml_error(text, text.len(), message));
            }
            _ => None,
        };

        if let Some(root) = finished {
            let end = reader.buffer_position() as usize;
            return match text.as_bytes()[end..].iter().position(|b| !is_padding(*b)) {
                None => Ok(root),
                Some(offset) => {
                    let position = end + offset;
                    let (line, column) = line_column(text, position);
                    Err(SchemaError::TrailingContent {
                        position,
                        line,
                        column,
                    })
                }
            };
        }
    }
}

/// Attach a closed element to its parent; returns it when it is the root.
fn attach(stack: &mut [Element], element: Element) -> Option<Element> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            None
        }
        None => Some(element),
    }
}

fn is_padding(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == 0
}

fn xml_error(text: &str, position: usize, message: String) -> SchemaError {
    let position = position.min(text.len());
    let (line, column) = line_column(text, position);
    SchemaError::Xml {
        position,
        line,
        column,
        message,
    }
}

/// 1-based line and column of a byte position.
pub fn line_column(text: &str, position: usize) -> (usize, usize) {
    let before = &text.as_bytes()[..position.min(text.len())];
    let line = before.iter().filter(|b| **b == b'\n').count() + 1;
    let column = match before.iter().rposition(|b| *b == b'\n') {
        Some(newline) => position - newline,
        None => position + 1,
    };
    (line, column)
}

/// Append ` name="value"` with the value escaped.
pub(crate) fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&quick_xml::escape::escape(value));
    out.push('"');
}

/// Append a `<properties .../>` line, or nothing when there are none.
pub(crate) fn push_properties(out: &mut String, indent: &str, attributes: &[(String, String)]) {
    if attributes.is_empty() {
        return;
    }
    out.push_str(indent);
    out.push_str("<properties");
    for (name, value) in attributes {
        push_attr(out, name, value);
    }
    out.push_str("/>\n");
}
