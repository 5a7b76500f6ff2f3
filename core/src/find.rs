//! Recursive key lookup over a decoded response tree.
//!
//! The vendor nests `Error` elements at varying depths (document root, inside
//! a response wrapper, inside one `Address` of many), so classification
//! searches the whole tree instead of a fixed path.

use crate::tree::{Node, Tree};

/// Depth-first, pre-order search for `key`.
///
/// At each level a direct child named `key` is returned immediately, even if
/// empty. Otherwise each nested map or list is searched in order and the
/// first non-empty match wins. Returns `None` when nothing matches.
pub fn find_first<'a>(tree: &'a Tree, key: &str) -> Option<&'a Node> {
    if let Some(hit) = tree.get(key) {
        return Some(hit);
    }
    tree.iter().find_map(|(_, child)| find_in_node(child, key))
}

fn find_in_node<'a>(node: &'a Node, key: &str) -> Option<&'a Node> {
    let found = match node {
        Node::Text(_) => None,
        Node::Map(tree) => find_first(tree, key),
        Node::List(items) => items.iter().find_map(|item| find_in_node(item, key)),
    };
    found.filter(|n| !n.is_empty())
}

/// True if `key` names an entry anywhere in `tree`, empty or not.
///
/// Unlike [`find_first`] this never skips empty matches, so a self-closing
/// `<Error/>` counts.
pub fn contains_key_deep(tree: &Tree, key: &str) -> bool {
    tree.iter()
        .any(|(name, child)| name == key || node_contains_key(child, key))
}

fn node_contains_key(node: &Node, key: &str) -> bool {
    match node {
        Node::Text(_) => false,
        Node::Map(tree) => contains_key_deep(tree, key),
        Node::List(items) => items.iter().any(|item| node_contains_key(item, key)),
    }
}
