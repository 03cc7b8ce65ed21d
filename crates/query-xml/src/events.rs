//! Streaming XML event protocol.
//!
//! Every response parser in the workspace, generic or purpose-built, consumes
//! the same three events: a tag opens (with its attributes), text arrives, a
//! tag closes. [`parse`] drives any [`XmlHandler`] from a document using
//! quick-xml; events a handler has no interest in fall through to the default
//! no-op hooks.

use std::collections::BTreeMap;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, ErrorKind, Result};

/// Attribute name to (unescaped) value.
pub type Attributes = BTreeMap<String, String>;

/// Receiver of XML parse events.
///
/// Only the element and text hooks matter for response parsing. The rest
/// exist so a handler can observe them if it wants to.
pub trait XmlHandler {
    /// An element opened. `name` is the literal tag name, prefix included.
    fn tag_start(&mut self, _name: &str, _attributes: &Attributes) {}

    /// Character data inside the innermost open element. May be delivered in
    /// several chunks for one element.
    fn text(&mut self, _text: &str) {}

    /// An element closed.
    fn tag_end(&mut self, _name: &str) {}

    /// A CDATA section. Treated as ordinary text unless overridden.
    fn cdata(&mut self, data: &str) {
        self.text(data);
    }

    fn comment(&mut self, _comment: &str) {}

    fn processing_instruction(&mut self, _content: &str) {}

    fn declaration(&mut self, _declaration: &str) {}

    fn doctype(&mut self, _doctype: &str) {}
}

/// A handler that produces a value once the document has been consumed.
pub trait ResponseParser: XmlHandler {
    type Output;

    /// Consume the parser after the last event and return its result.
    fn finish(self) -> Result<Self::Output>;
}

/// Feed every event in `xml` to `handler`.
pub fn parse<H: XmlHandler + ?Sized>(xml: &str, handler: &mut H) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    let mut open: Vec<String> = Vec::new();

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader.read_event().map_err(|e| {
            Error::with_source(
                ErrorKind::Syntax {
                    position,
                    message: e.to_string(),
                },
                e,
            )
        })?;

        match event {
            Event::Start(ref e) => {
                let name = tag_name(e)?;
                let attributes = collect_attributes(e)?;
                handler.tag_start(&name, &attributes);
                open.push(name);
            }
            Event::Empty(ref e) => {
                let name = tag_name(e)?;
                let attributes = collect_attributes(e)?;
                handler.tag_start(&name, &attributes);
                handler.tag_end(&name);
            }
            Event::End(ref e) => {
                let name = str::from_utf8(e.name().as_ref())?.to_string();
                match open.pop() {
                    Some(expected) if expected == name => handler.tag_end(&name),
                    Some(expected) => {
                        return Err(Error::new(ErrorKind::MismatchedTag {
                            expected,
                            found: name,
                        }))
                    }
                    None => {
                        return Err(Error::new(ErrorKind::Syntax {
                            position,
                            message: format!("closing tag </{}> without an open element", name),
                        }))
                    }
                }
            }
            Event::Text(ref e) => {
                let text = e.unescape()?;
                handler.text(&text);
            }
            Event::CData(ref e) => {
                let data = str::from_utf8(e)?;
                handler.cdata(data);
            }
            Event::Comment(ref e) => handler.comment(str::from_utf8(e)?),
            Event::PI(ref e) => handler.processing_instruction(str::from_utf8(e)?),
            Event::Decl(ref e) => handler.declaration(str::from_utf8(e)?),
            Event::DocType(ref e) => handler.doctype(str::from_utf8(e)?),
            Event::Eof => break,
        }
    }

    if let Some(unclosed) = open.pop() {
        return Err(Error::new(ErrorKind::UnexpectedEof(unclosed)));
    }

    Ok(())
}

/// Run `parser` over `xml` and return its result.
pub fn parse_response<P: ResponseParser>(xml: &str, mut parser: P) -> Result<P::Output> {
    parse(xml, &mut parser)?;
    parser.finish()
}

/// Drop a `prefix:` namespace qualifier from a tag name.
pub fn strip_namespace(name: &str) -> &str {
    match name.rfind(':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

fn tag_name(e: &BytesStart<'_>) -> Result<String> {
    Ok(str::from_utf8(e.name().as_ref())?.to_string())
}

fn collect_attributes(e: &BytesStart<'_>) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

/// Slash-joined path of the currently open elements, namespace prefixes
/// stripped. Typed parsers use it to know where they are in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlPath {
    segments: Vec<String>,
}

impl XmlPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str) {
        self.segments.push(strip_namespace(name).to_string());
    }

    /// Close the innermost element. Closing a tag that is not innermost pops
    /// back to it, which keeps the path usable on sloppy input.
    pub fn pop(&mut self, name: &str) {
        let name = strip_namespace(name);
        if let Some(idx) = self.segments.iter().rposition(|s| s == name) {
            self.segments.truncate(idx);
        }
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn current(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// True if the path ends with the given slash-separated suffix.
    pub fn ends_with(&self, suffix: &str) -> bool {
        let parts: Vec<&str> = suffix.split('/').filter(|p| !p.is_empty()).collect();
        parts.len() <= self.segments.len()
            && self.segments[self.segments.len() - parts.len()..]
                .iter()
                .zip(&parts)
                .all(|(a, b)| a == b)
    }
}

impl std::fmt::Display for XmlPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
