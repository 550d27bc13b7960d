//! RSS document decoding.
//!
//! Raw bytes are first decoded into an [`XmlNode`] tree, then the `rss > channel`
//! structure is extracted from that tree with explicit presence checks.
//!
//! Channel-level problems fail the whole document. Item-level problems only
//! drop the offending item.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth accepted while building the tree.
const MAX_XML_DEPTH: usize = 64;

/// Errors produced while decoding an RSS document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The document is not well-formed XML or has no usable `rss > channel` element.
    #[error("Invalid RSS feed format: {0}")]
    Format(String),
    /// The channel exists but its required metadata is missing or not text.
    #[error("Invalid RSS feed: {0}")]
    Validation(String),
}

/// A decoded XML element.
///
/// Elements that contain child elements keep them as an ordered list of
/// `(name, node)` pairs, so repeated names stay in document order. Elements
/// with no child elements collapse to their trimmed text content. Attributes
/// are not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Text(String),
    Element(Vec<(String, XmlNode)>),
}

impl XmlNode {
    fn entries(&self) -> &[(String, XmlNode)] {
        match self {
            XmlNode::Element(children) => children,
            XmlNode::Text(_) => &[],
        }
    }

    /// All direct children with the given name, in document order.
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.entries()
            .iter()
            .filter(move |(child_name, _)| child_name == name)
            .map(|(_, node)| node)
    }

    /// The child with the given name, if it occurs exactly once.
    ///
    /// A repeated child is a sequence, not a single value, and yields `None`.
    /// The result borrows from `self` only, not from `name`.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        let mut matches = self
            .entries()
            .iter()
            .filter(|(child_name, _)| child_name == name)
            .map(|(_, node)| node);
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    /// Text of the child with the given name, if it occurs exactly once as a scalar.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.child(name)? {
            XmlNode::Text(text) => Some(text),
            XmlNode::Element(_) => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, XmlNode::Element(_))
    }
}

/// A fetched RSS document. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    pub channel: FeedChannel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedChannel {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Items that carried all required fields, in document order.
    pub items: Vec<ParsedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

/// In-progress element while the tree is being built.
struct Frame {
    name: String,
    children: Vec<(String, XmlNode)>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Vec::new(),
            text: String::new(),
        }
    }

    fn finish(self) -> (String, XmlNode) {
        let node = if self.children.is_empty() {
            XmlNode::Text(self.text.trim().to_string())
        } else {
            XmlNode::Element(self.children)
        };
        (self.name, node)
    }
}

/// Decodes an XML document into a tree rooted at a synthetic document node.
///
/// The returned node is always an [`XmlNode::Element`] whose children are the
/// document's top-level elements.
///
/// # Errors
///
/// Returns [`ParseError::Format`] when the input is not UTF-8, is not
/// well-formed XML, nests deeper than the safety limit, leaves an element
/// unclosed, or contains no root element.
pub fn parse_document(bytes: &[u8]) -> Result<XmlNode, ParseError> {
    let content = std::str::from_utf8(bytes)
        .map_err(|e| ParseError::Format(format!("document is not valid UTF-8: {}", e)))?;

    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations; unknown
    // entities surface as unescape errors below.
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<Frame> = vec![Frame::new(String::new())];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if stack.len() > MAX_XML_DEPTH {
                    return Err(ParseError::Format(format!(
                        "nesting depth exceeds maximum of {} levels",
                        MAX_XML_DEPTH
                    )));
                }
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push(Frame::new(name));
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push((name, XmlNode::Text(String::new())));
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() <= 1 {
                    return Err(ParseError::Format("unexpected closing tag".to_string()));
                }
                if let Some(frame) = stack.pop() {
                    let finished = frame.finish();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(finished);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| ParseError::Format(format!("invalid text content: {}", e)))?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseError::Format(format!(
                    "malformed XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    if stack.len() > 1 {
        let open = stack.last().map(|f| f.name.as_str()).unwrap_or_default();
        return Err(ParseError::Format(format!("unclosed element <{}>", open)));
    }

    let document = stack
        .pop()
        .ok_or_else(|| ParseError::Format("empty document".to_string()))?;
    if document.children.is_empty() {
        return Err(ParseError::Format("document has no root element".to_string()));
    }

    Ok(XmlNode::Element(document.children))
}

/// Decodes an RSS document into a [`ParsedFeed`].
///
/// # Errors
///
/// - [`ParseError::Format`] if the XML is malformed or `rss > channel` is
///   missing, repeated, or has no child elements
/// - [`ParseError::Validation`] if the channel's `title`, `link` or
///   `description` is missing or not plain text
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
    let document = parse_document(bytes)?;

    let channel = document
        .child("rss")
        .and_then(|rss| rss.child("channel"))
        .filter(|channel| channel.is_element())
        .ok_or_else(|| {
            ParseError::Format("\"channel\" element missing or malformed".to_string())
        })?;

    let (title, link, description) = match (
        channel.text("title"),
        channel.text("link"),
        channel.text("description"),
    ) {
        (Some(title), Some(link), Some(description)) => (title, link, description),
        (title, link, description) => {
            let missing: Vec<&str> = [
                ("title", title.is_none()),
                ("link", link.is_none()),
                ("description", description.is_none()),
            ]
            .into_iter()
            .filter_map(|(field, absent)| absent.then_some(field))
            .collect();
            return Err(ParseError::Validation(format!(
                "missing or invalid channel metadata ({})",
                missing.join(", ")
            )));
        }
    };

    let candidates = channel.children("item").count();
    let items: Vec<ParsedItem> = channel.children("item").filter_map(parse_item).collect();

    let skipped = candidates - items.len();
    if skipped > 0 {
        tracing::debug!(
            channel = %title,
            kept = items.len(),
            skipped = skipped,
            "Dropped items missing title, link, description or pubDate"
        );
    }

    Ok(ParsedFeed {
        channel: FeedChannel {
            title: title.to_string(),
            link: link.to_string(),
            description: description.to_string(),
            items,
        },
    })
}

fn parse_item(node: &XmlNode) -> Option<ParsedItem> {
    Some(ParsedItem {
        title: node.text("title")?.to_string(),
        link: node.text("link")?.to_string(),
        description: node.text("description")?.to_string(),
        pub_date: node.text("pubDate")?.to_string(),
    })
}
