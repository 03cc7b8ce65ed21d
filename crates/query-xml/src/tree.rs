//! Schema-free tree parser.
//!
//! Builds a [`Node`] tree from parse events without knowing anything about
//! the response shape. Repeated sibling tags are detected as they close: the
//! first occurrence occupies a [`Field::Single`] slot, and the moment a
//! second sibling with the same tag is finalized under the same parent the
//! slot becomes a [`Field::Many`] holding both, in document order.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::events::{strip_namespace, Attributes, ResponseParser, XmlHandler, XmlPath};
use crate::naming::underscore;

/// One element of a parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Text content. Always set for leaf elements (possibly empty); set for
    /// elements with children only when they also carry non-blank text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, Field>,
}

/// A child slot: one element, or every sibling sharing the tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Field {
    Single(Node),
    Many(Vec<Node>),
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn text(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.children.get(key)
    }

    /// The child under `key`; the first one if the tag repeats.
    pub fn child(&self, key: &str) -> Option<&Node> {
        self.get(key).and_then(|f| f.as_slice().first())
    }

    /// Text of the child under `key`.
    pub fn child_text(&self, key: &str) -> Option<&str> {
        self.child(key).and_then(Node::text)
    }

    /// Every child under `key`, whatever its cardinality.
    pub fn all(&self, key: &str) -> &[Node] {
        self.get(key).map(Field::as_slice).unwrap_or(&[])
    }

    /// Resolve a slash-separated path of keys. Intermediate repeated fields
    /// resolve through their first element.
    pub fn at(&self, path: &str) -> Option<&Field> {
        let mut keys = path.split('/').filter(|k| !k.is_empty()).peekable();
        let mut node = self;
        while let Some(key) = keys.next() {
            let field = node.get(key)?;
            if keys.peek().is_none() {
                return Some(field);
            }
            node = field.as_slice().first()?;
        }
        None
    }
}

impl Field {
    pub fn is_many(&self) -> bool {
        matches!(self, Field::Many(_))
    }

    pub fn as_single(&self) -> Option<&Node> {
        match self {
            Field::Single(node) => Some(node),
            Field::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&[Node]> {
        match self {
            Field::Single(_) => None,
            Field::Many(nodes) => Some(nodes),
        }
    }

    /// View the field as a slice regardless of cardinality.
    pub fn as_slice(&self) -> &[Node] {
        match self {
            Field::Single(node) => std::slice::from_ref(node),
            Field::Many(nodes) => nodes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_nodes(self) -> Vec<Node> {
        match self {
            Field::Single(node) => vec![node],
            Field::Many(nodes) => nodes,
        }
    }

    /// Append a finalized sibling, promoting a single slot to a sequence.
    fn push(&mut self, node: Node) {
        match self {
            Field::Many(nodes) => nodes.push(node),
            Field::Single(_) => {
                let previous = std::mem::replace(self, Field::Many(Vec::with_capacity(2)));
                if let Field::Many(nodes) = self {
                    nodes.extend(previous.into_nodes());
                    nodes.push(node);
                }
            }
        }
    }
}

#[derive(Debug)]
struct OpenElement {
    key: String,
    node: Node,
    text: String,
}

/// Event handler producing a [`Node`] tree.
///
/// The returned root is a synthetic document node; the document element is
/// its only child.
///
/// ```
/// use aws_query_xml::{parse_response, TreeParser};
///
/// let xml = "<ListResponse><Item><Id>1</Id></Item><Item><Id>2</Id></Item></ListResponse>";
/// let root = parse_response(xml, TreeParser::new()).unwrap();
/// let items = root.at("list_response/item").unwrap();
/// assert_eq!(items.len(), 2);
/// ```
#[derive(Debug)]
pub struct TreeParser {
    path: XmlPath,
    open: Vec<OpenElement>,
    root: Node,
    normalize: bool,
}

impl Default for TreeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeParser {
    /// Parser that normalizes tag names with [`underscore`].
    pub fn new() -> Self {
        Self {
            path: XmlPath::new(),
            open: Vec::new(),
            root: Node::default(),
            normalize: true,
        }
    }

    /// Parser that keys children by their literal tag names (namespace
    /// prefixes are still stripped).
    pub fn wire_names() -> Self {
        Self {
            normalize: false,
            ..Self::new()
        }
    }

    /// Path of the currently open elements.
    pub fn path(&self) -> &XmlPath {
        &self.path
    }

    fn key_for(&self, name: &str) -> String {
        let local = strip_namespace(name);
        if self.normalize {
            underscore(local)
        } else {
            local.to_string()
        }
    }
}

/// Namespace declarations carry no data.
pub(crate) fn is_noise_attribute(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

impl XmlHandler for TreeParser {
    fn tag_start(&mut self, name: &str, attributes: &Attributes) {
        let node = Node {
            attributes: attributes
                .iter()
                .filter(|(k, _)| !is_noise_attribute(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            ..Node::default()
        };
        self.open.push(OpenElement {
            key: self.key_for(name),
            node,
            text: String::new(),
        });
        self.path.push(name);
    }

    fn text(&mut self, text: &str) {
        if let Some(element) = self.open.last_mut() {
            element.text.push_str(text);
        }
    }

    fn tag_end(&mut self, name: &str) {
        let Some(OpenElement { key, mut node, text }) = self.open.pop() else {
            return;
        };
        self.path.pop(name);

        if node.children.is_empty() {
            node.value = Some(text);
        } else if !text.trim().is_empty() {
            node.value = Some(text.trim().to_string());
        }

        let parent = match self.open.last_mut() {
            Some(element) => &mut element.node,
            None => &mut self.root,
        };
        match parent.children.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(Field::Single(node));
            }
            Entry::Occupied(mut slot) => slot.get_mut().push(node),
        }
    }
}

impl ResponseParser for TreeParser {
    type Output = Node;

    fn finish(self) -> Result<Node> {
        Ok(self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::parse_response;

    fn tree(xml: &str) -> Node {
        parse_response(xml, TreeParser::new()).unwrap()
    }

    #[test]
    fn test_single_item_stays_single() {
        let root = tree("<R><Items><Item><Id>1</Id></Item></Items></R>");
        let item = root.at("r/items/item").unwrap();
        assert!(!item.is_many());
        assert_eq!(item.as_single().unwrap().child_text("id"), Some("1"));
    }

    #[test]
    fn test_two_siblings_become_sequence() {
        let root = tree("<R><Items><Item><Id>1</Id></Item><Item><Id>2</Id></Item></Items></R>");
        let items = root.at("r/items/item").unwrap().as_many().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].child_text("id"), Some("1"));
        assert_eq!(items[1].child_text("id"), Some("2"));
    }

    #[test]
    fn test_three_siblings_keep_document_order() {
        let root = tree("<R><V>a</V><V>b</V><V>c</V></R>");
        let values: Vec<_> = root
            .at("r/v")
            .unwrap()
            .as_slice()
            .iter()
            .map(|n| n.text().unwrap())
            .collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_repeated_parent_promotes_parent_not_child() {
        let root = tree("<R><Set><Name>x</Name></Set><Set><Name>y</Name></Set></R>");
        let sets = root.get("r").unwrap().as_single().unwrap().all("set");
        assert_eq!(sets.len(), 2);
        assert!(!sets[0].get("name").unwrap().is_many());
        assert_eq!(sets[1].child_text("name"), Some("y"));
    }

    #[test]
    fn test_same_tag_under_different_parents_is_independent() {
        let root = tree("<R><A><Id>1</Id></A><B><Id>2</Id></B></R>");
        assert!(!root.at("r/a/id").unwrap().is_many());
        assert!(!root.at("r/b/id").unwrap().is_many());
    }

    #[test]
    fn test_attributes_and_namespaces() {
        let root = tree(
            r#"<ns:R xmlns:ns="urn:x" xmlns="urn:y"><ns:Key type="string" lang="en">v</ns:Key></ns:R>"#,
        );
        let r = root.child("r").unwrap();
        assert!(r.attributes.is_empty());
        let key = r.child("key").unwrap();
        assert_eq!(key.text(), Some("v"));
        assert_eq!(key.attribute("type"), Some("string"));
        assert_eq!(key.attribute("lang"), Some("en"));
    }

    #[test]
    fn test_empty_leaf_has_empty_value() {
        let root = tree("<R><Marker/><Next></Next></R>");
        let r = root.child("r").unwrap();
        assert_eq!(r.child_text("marker"), Some(""));
        assert_eq!(r.child_text("next"), Some(""));
        assert_eq!(r.value, None);
    }

    #[test]
    fn test_wire_names() {
        let xml = "<DescribeResult><RequestId>abc</RequestId></DescribeResult>";
        let root = parse_response(xml, TreeParser::wire_names()).unwrap();
        let request_id = root.at("DescribeResult/RequestId").unwrap().as_single().unwrap();
        assert_eq!(request_id.text(), Some("abc"));
    }

    #[test]
    fn test_serializes_as_nested_json() {
        let root = tree("<R><V>a</V><V>b</V></R>");
        let json = serde_json::to_value(&root).unwrap();
        let values = serde_json::json!([{"value": "a"}, {"value": "b"}]);
        assert_eq!(
            json,
            serde_json::json!({"children": {"r": {"children": {"v": values}}}})
        );
    }
}
