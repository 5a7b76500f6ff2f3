//! Conversion between [`Tree`] values and XML documents.
//!
//! # Design
//! The lifecycle only depends on the [`XmlCodec`] trait, so a caller can swap
//! in another grammar. [`QuickXmlCodec`] is the default and follows these
//! conventions:
//!
//! - `@attributes` holds the element's attributes (scalar values only).
//! - `@value` holds the text of an element that also has attributes.
//! - A `List` renders as repeated sibling elements with the same name.
//! - On decode, repeated siblings collapse into a `List` at the position of
//!   the first occurrence, and a leaf element without attributes becomes
//!   `Text`. Key order within an element is attributes, value, children.
//!
//! `decode` returns a tree with a single entry keyed by the root element.

use std::fmt;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::CodecError;
use crate::tree::{Node, Tree, ATTRIBUTES_KEY, VALUE_KEY};

/// Bidirectional tree/XML converter consumed by the request lifecycle.
pub trait XmlCodec: fmt::Debug + Send + Sync {
    /// Render `tree` as the content of a root element named `root`.
    fn encode(&self, root: &str, tree: &Tree) -> Result<String, CodecError>;

    /// Parse `xml` into `{ root_name: content }`.
    fn decode(&self, xml: &str) -> Result<Tree, CodecError>;
}

/// Default codec backed by `quick-xml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuickXmlCodec;

impl XmlCodec for QuickXmlCodec {
    fn encode(&self, root: &str, tree: &Tree) -> Result<String, CodecError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(encode_err)?;
        write_map(&mut writer, root, tree)?;
        String::from_utf8(writer.into_inner()).map_err(encode_err)
    }

    fn decode(&self, xml: &str) -> Result<Tree, CodecError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Frame> = Vec::new();
        let mut root: Option<(String, Node)> = None;

        loop {
            match reader.read_event().map_err(decode_err)? {
                Event::Start(start) => {
                    if root.is_some() {
                        return Err(CodecError::Decode("multiple root elements".into()));
                    }
                    stack.push(Frame::open(&start)?);
                }
                Event::Empty(start) => {
                    if root.is_some() {
                        return Err(CodecError::Decode("multiple root elements".into()));
                    }
                    let frame = Frame::open(&start)?;
                    close(frame, &mut stack, &mut root);
                }
                Event::End(_) => {
                    let frame = stack
                        .pop()
                        .ok_or_else(|| CodecError::Decode("unmatched end tag".into()))?;
                    close(frame, &mut stack, &mut root);
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(decode_err)?;
                    match stack.last_mut() {
                        Some(frame) => frame.text.push_str(&text),
                        None => {
                            return Err(CodecError::Decode("text outside the root element".into()))
                        }
                    }
                }
                Event::CData(data) => {
                    let data = data.into_inner();
                    if let Some(frame) = stack.last_mut() {
                        frame.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(CodecError::Decode("unexpected end of document".into()));
        }
        let (name, node) = root.ok_or_else(|| CodecError::Decode("empty document".into()))?;
        Ok(Tree::new().with(name, node))
    }
}

/// Encode with the default codec.
pub fn encode(root: &str, tree: &Tree) -> Result<String, CodecError> {
    QuickXmlCodec.encode(root, tree)
}

/// Decode with the default codec.
pub fn decode(xml: &str) -> Result<Tree, CodecError> {
    QuickXmlCodec.decode(xml)
}

fn encode_err(e: impl fmt::Display) -> CodecError {
    CodecError::Encode(e.to_string())
}

fn decode_err(e: impl fmt::Display) -> CodecError {
    CodecError::Decode(e.to_string())
}

fn write_node(writer: &mut Writer<Vec<u8>>, name: &str, node: &Node) -> Result<(), CodecError> {
    match node {
        Node::Text(text) if text.is_empty() => writer
            .write_event(Event::Empty(BytesStart::new(name)))
            .map_err(encode_err),
        Node::Text(text) => {
            writer
                .write_event(Event::Start(BytesStart::new(name)))
                .map_err(encode_err)?;
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(encode_err)?;
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(encode_err)
        }
        Node::Map(tree) => write_map(writer, name, tree),
        Node::List(items) => items
            .iter()
            .try_for_each(|item| write_node(writer, name, item)),
    }
}

fn write_map(writer: &mut Writer<Vec<u8>>, name: &str, tree: &Tree) -> Result<(), CodecError> {
    let mut start = BytesStart::new(name);
    if let Some(attrs) = tree.get(ATTRIBUTES_KEY) {
        let attrs = attrs.as_map().ok_or_else(|| {
            CodecError::Encode(format!("{ATTRIBUTES_KEY} of <{name}> must be a map"))
        })?;
        for (key, value) in attrs.iter() {
            let value = value.as_text().ok_or_else(|| {
                CodecError::Encode(format!("attribute {key} of <{name}> must be a scalar"))
            })?;
            start.push_attribute((key, value));
        }
    }

    let text = match tree.get(VALUE_KEY) {
        Some(node) => Some(node.as_text().ok_or_else(|| {
            CodecError::Encode(format!("{VALUE_KEY} of <{name}> must be a scalar"))
        })?),
        None => None,
    };
    let mut children = tree
        .iter()
        .filter(|(key, _)| *key != ATTRIBUTES_KEY && *key != VALUE_KEY)
        .peekable();

    if children.peek().is_none() && text.map_or(true, str::is_empty) {
        return writer.write_event(Event::Empty(start)).map_err(encode_err);
    }

    writer.write_event(Event::Start(start)).map_err(encode_err)?;
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(encode_err)?;
    }
    for (key, child) in children {
        write_node(writer, key, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(encode_err)
}

/// An element being decoded.
struct Frame {
    name: String,
    attributes: Option<Tree>,
    text: String,
    children: Tree,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, CodecError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Tree::new();
        for attr in start.attributes() {
            let attr = attr.map_err(decode_err)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(decode_err)?.into_owned();
            attributes.insert(key, value);
        }
        Ok(Self {
            name,
            attributes: (!attributes.is_empty()).then_some(attributes),
            text: String::new(),
            children: Tree::new(),
        })
    }

    fn into_node(self) -> (String, Node) {
        if self.attributes.is_none() && self.children.is_empty() {
            return (self.name, Node::Text(self.text));
        }
        let mut tree = Tree::new();
        if let Some(attributes) = self.attributes {
            tree.insert(ATTRIBUTES_KEY, attributes);
        }
        if !self.text.is_empty() {
            tree.insert(VALUE_KEY, self.text);
        }
        tree.extend(self.children);
        (self.name, Node::Map(tree))
    }
}

fn close(frame: Frame, stack: &mut [Frame], root: &mut Option<(String, Node)>) {
    let (name, node) = frame.into_node();
    match stack.last_mut() {
        Some(parent) if parent.children.contains_key(&name) => {
            parent.children.push_repeated(name, node)
        }
        Some(parent) => {
            parent.children.insert(name, node);
        }
        None => *root = Some((name, node)),
    }
}
