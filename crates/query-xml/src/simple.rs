//! Directive-driven transform for regular, list-of-record responses.
//!
//! The document is first collected into a plain element tree, then folded
//! into a [`serde_json::Value`] the way a caller describes:
//!
//! - `force_array`: wire tag names whose value is always a sequence, even
//!   when the response carries only one record.
//! - `group_tags`: wrapper tag → child tag pairs; the wrapper's value becomes
//!   its children's values directly (`<Groups><Group/>..</Groups>` → list).
//! - `pull_out`: a path of normalized keys to descend into, so the caller
//!   gets the result payload rather than the whole envelope.
//!
//! Without directives the transform is schema-free. The document element
//! itself is dropped; its `ResponseMetadata` block is returned alongside the
//! payload.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind, Result};
use crate::events::{strip_namespace, Attributes, ResponseParser, XmlHandler};
use crate::naming::underscore;
use crate::tree::is_noise_attribute;

/// Where to find the result payload inside the transformed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOut {
    /// Descend the path and always return a sequence.
    Array(Vec<String>),
    /// Descend the path and return one record.
    Single(Vec<String>),
}

/// Caller-supplied shape directives.
#[derive(Debug, Clone, Default)]
pub struct SimpleOptions {
    pub force_array: BTreeSet<String>,
    pub group_tags: BTreeMap<String, String>,
    pub pull_out: Option<PullOut>,
}

impl SimpleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always treat these wire tags as sequences.
    pub fn force_array<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.force_array.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Collapse `wrapper` to the values of its `child` elements.
    pub fn group_tag(mut self, wrapper: impl Into<String>, child: impl Into<String>) -> Self {
        self.group_tags.insert(wrapper.into(), child.into());
        self
    }

    pub fn pull_out_array<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pull_out = Some(PullOut::Array(path.into_iter().map(Into::into).collect()));
        self
    }

    pub fn pull_out_single<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pull_out = Some(PullOut::Single(path.into_iter().map(Into::into).collect()));
        self
    }
}

/// Transformed response.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleResult {
    pub payload: Value,
    pub response_metadata: Option<Value>,
}

impl SimpleResult {
    pub fn request_id(&self) -> Option<&str> {
        self.response_metadata
            .as_ref()
            .and_then(|m| m.get("request_id"))
            .and_then(Value::as_str)
    }

    /// Deserialize the payload into a typed value.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.payload).map_err(Into::into)
    }
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

/// Event handler applying [`SimpleOptions`] to a response.
#[derive(Debug, Default)]
pub struct SimpleParser {
    options: SimpleOptions,
    open: Vec<Element>,
    root: Option<Element>,
}

impl SimpleParser {
    pub fn new(options: SimpleOptions) -> Self {
        Self {
            options,
            open: Vec::new(),
            root: None,
        }
    }
}

impl XmlHandler for SimpleParser {
    fn tag_start(&mut self, name: &str, attributes: &Attributes) {
        self.open.push(Element {
            name: strip_namespace(name).to_string(),
            attributes: attributes
                .iter()
                .filter(|(k, _)| !is_noise_attribute(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            ..Element::default()
        });
    }

    fn text(&mut self, text: &str) {
        if let Some(element) = self.open.last_mut() {
            element.text.push_str(text);
        }
    }

    fn tag_end(&mut self, _name: &str) {
        let Some(element) = self.open.pop() else {
            return;
        };
        match self.open.last_mut() {
            Some(parent) => parent.children.push(element),
            None => self.root = Some(element),
        }
    }
}

impl ResponseParser for SimpleParser {
    type Output = SimpleResult;

    fn finish(self) -> Result<SimpleResult> {
        let root = self
            .root
            .ok_or_else(|| Error::new(ErrorKind::Other("empty document".to_string())))?;
        let document = element_value(&root, &self.options);
        let response_metadata = document.get("response_metadata").cloned();

        let payload = match &self.options.pull_out {
            None => document,
            Some(PullOut::Array(path)) => match descend(&document, path)? {
                Value::Null => Value::Array(Vec::new()),
                Value::Array(items) => Value::Array(items.clone()),
                other => Value::Array(vec![other.clone()]),
            },
            Some(PullOut::Single(path)) => match descend(&document, path)? {
                Value::Null => Value::Object(Map::new()),
                record @ Value::Object(_) => record.clone(),
                other => {
                    return Err(Error::new(ErrorKind::UnexpectedShape {
                        path: path.join("/"),
                        message: format!("expected a single record, found {}", kind_of(other)),
                    }))
                }
            },
        };

        Ok(SimpleResult {
            payload,
            response_metadata,
        })
    }
}

fn descend<'a>(document: &'a Value, path: &[String]) -> Result<&'a Value> {
    let mut level = document;
    for (depth, key) in path.iter().enumerate() {
        level = level.get(key).ok_or_else(|| {
            Error::new(ErrorKind::MissingPath(path[..=depth].join("/")))
        })?;
    }
    Ok(level)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a record",
    }
}

fn element_value(element: &Element, options: &SimpleOptions) -> Value {
    if let Some(child_tag) = options.group_tags.get(&element.name) {
        if element.attributes.is_empty() && element.children.iter().all(|c| &c.name == child_tag) {
            let mut values: Vec<Value> = element
                .children
                .iter()
                .map(|c| element_value(c, options))
                .collect();
            return match values.len() {
                1 => values.remove(0),
                _ => Value::Array(values),
            };
        }
    }

    if element.attributes.is_empty() && element.children.is_empty() {
        return if element.text.trim().is_empty() {
            Value::Null
        } else {
            Value::String(element.text.clone())
        };
    }

    let mut map = Map::new();
    for (name, value) in &element.attributes {
        map.insert(underscore(name), Value::String(value.clone()));
    }

    // Group children by tag in order of first appearance.
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for child in &element.children {
        let values = grouped.entry(child.name.as_str()).or_default();
        if values.is_empty() {
            order.push(child.name.as_str());
        }
        values.push(element_value(child, options));
    }
    for tag in order {
        let mut values = grouped.remove(tag).unwrap_or_default();
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        };
        map.insert(underscore(tag), force(tag, value, options));
    }

    let text = element.text.trim();
    if !text.is_empty() {
        map.insert("content".to_string(), Value::String(text.to_string()));
    }

    Value::Object(map)
}

fn force(tag: &str, value: Value, options: &SimpleOptions) -> Value {
    if options.force_array.contains(tag) && value.is_object() {
        Value::Array(vec![value])
    } else {
        value
    }
}
