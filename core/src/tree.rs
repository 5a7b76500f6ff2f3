//! Nested key-value tree mirroring an XML document.
//!
//! # Design
//! A `Tree` is an ordered list of `(key, Node)` pairs rather than a hash map:
//! the vendor's schemas are order-sensitive, so the order in which fields are
//! inserted is the order in which elements are written. Keys are unique;
//! inserting an existing key replaces its value in place.
//!
//! Two keys are reserved and never name child elements:
//! - [`ATTRIBUTES_KEY`] holds the XML attributes of the enclosing element.
//! - [`VALUE_KEY`] holds the text of an element that also carries attributes.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Reserved key for the attributes sub-node.
pub const ATTRIBUTES_KEY: &str = "@attributes";

/// Reserved key for element text when the element also has attributes.
pub const VALUE_KEY: &str = "@value";

/// A single value in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Map(Tree),
    /// Repeated sibling elements sharing one name.
    List(Vec<Node>),
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Tree> {
        match self {
            Node::Map(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    /// Empty text, an empty map and an empty list all count as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Text(s) => s.is_empty(),
            Node::Map(t) => t.is_empty(),
            Node::List(items) => items.is_empty(),
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Text(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Text(value)
    }
}

impl From<u32> for Node {
    fn from(value: u32) -> Self {
        Node::Text(value.to_string())
    }
}

impl From<Tree> for Node {
    fn from(value: Tree) -> Self {
        Node::Map(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Node::List(value)
    }
}

/// Ordered map from element names to nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<(String, Node)>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key`, returning the previous value if the key
    /// was already present. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Node>) -> Option<Node> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Builder-style `insert`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Node>) -> Self {
        self.insert(key, value);
        self
    }

    /// Append `value` to the repeated element `key`.
    ///
    /// An absent key becomes a one-item list; an existing scalar or map is
    /// promoted to a list holding the old value followed by the new one.
    pub fn push_repeated(&mut self, key: impl Into<String>, value: impl Into<Node>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, Node::List(items))) => items.push(value),
            Some((_, slot)) => {
                let previous = std::mem::replace(slot, Node::List(Vec::new()));
                *slot = Node::List(vec![previous, value]);
            }
            None => self.entries.push((key, Node::List(vec![value]))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Text of a direct child, if that child is a scalar.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Node::as_text)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Merge `other` into `self`; keys already present are overwritten.
    pub fn extend(&mut self, other: Tree) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<Node>> FromIterator<(K, V)> for Tree {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tree = Tree::new();
        for (k, v) in iter {
            tree.insert(k, v);
        }
        tree
    }
}

impl IntoIterator for Tree {
    type Item = (String, Node);
    type IntoIter = std::vec::IntoIter<(String, Node)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Text(s) => serializer.serialize_str(s),
            Node::Map(tree) => tree.serialize(serializer),
            Node::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut tree = Tree::new().with("A", "1").with("B", "2");
        let old = tree.insert("A", "3");
        assert_eq!(old, Some(Node::text("1")));
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(tree.text("A"), Some("3"));
    }

    #[test]
    fn push_repeated_promotes_scalar_to_list() {
        let mut tree = Tree::new().with("Address", "first");
        tree.push_repeated("Address", "second");
        tree.push_repeated("Address", "third");
        let items = tree.get("Address").and_then(Node::as_list).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], Node::text("first"));
    }

    #[test]
    fn push_repeated_on_absent_key_creates_list() {
        let mut tree = Tree::new();
        tree.push_repeated("Address", Tree::new().with("City", "X"));
        assert_eq!(tree.get("Address").and_then(Node::as_list).map(|l| l.len()), Some(1));
    }

    #[test]
    fn empty_nodes() {
        assert!(Node::text("").is_empty());
        assert!(Node::Map(Tree::new()).is_empty());
        assert!(Node::List(Vec::new()).is_empty());
        assert!(!Node::text("x").is_empty());
    }

    #[test]
    fn serializes_to_json_in_order() {
        let tree = Tree::new()
            .with("Zip5", "20500")
            .with("Address", Node::List(vec![Node::text("a"), Node::text("b")]));
        let json = serde_json::to_string(&tree).unwrap();
        assert_eq!(json, r#"{"Zip5":"20500","Address":["a","b"]}"#);
    }
}
