//! Spec Tree Model
//!
//! Plain data for page and component layouts. Every field except `sections`
//! is optional; fields this model does not name are kept in `extra` so they
//! survive normalization and take part in the model hash.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::actions::RawAction;

/// Keys that carry an action tag on a node.
const ACTION_KEYS: [&str; 2] = ["action", "data-action"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Pages,
    Components,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pages => "Pages",
            Category::Components => "Components",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pages" | "page" | "pages" => Ok(Category::Pages),
            "Components" | "component" | "components" => Ok(Category::Components),
            other => Err(format!("unknown category '{other}' (expected Pages or Components)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecTree {
    #[serde(
        default,
        alias = "contractVersion",
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub contract_version: Option<String>,

    #[serde(
        default,
        alias = "schemaVersion",
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_version: Option<String>,

    pub sections: Vec<Section>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,

    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        rename = "data-page-section",
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub semantic_key: Option<String>,

    #[serde(
        rename = "data-page-section-location",
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<String>,

    #[serde(default, alias = "elements", alias = "subsections", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A nested sub-section or element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, alias = "text", deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, alias = "data-action", skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(
        default,
        alias = "data-target",
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub target: Option<String>,

    #[serde(default, alias = "elements", alias = "subsections", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Node {
    pub fn raw_action(&self) -> Option<RawAction<'_>> {
        self.action.as_deref().map(|tag| RawAction {
            tag,
            target: self.target.as_deref(),
        })
    }
}

/// 1-based position of a node below its section, e.g. `2.1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn child(&self, position: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(position);
        Self(steps)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// A node together with where it sits in the tree.
#[derive(Debug, Clone, Copy)]
pub struct LocatedNode<'a> {
    /// 1-based section position.
    pub section: usize,
    pub section_id: &'a str,
    pub node: &'a Node,
}

impl SpecTree {
    /// Read a raw JSON tree.
    ///
    /// Fails when `sections` is missing, a section or node is not a record, an
    /// identifier is not a scalar, or an action tag sits anywhere other than
    /// on a node under `children` / `elements` / `subsections`. Such a tag
    /// would never reach the contract gates.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let tree: SpecTree = serde_json::from_value(value)?;
        if let Some(place) = tree.stray_action() {
            return Err(serde_json::Error::custom(format!(
                "action outside a node container at {place}"
            )));
        }
        Ok(tree)
    }

    /// First action tag held in an unmodelled field, as a readable place.
    fn stray_action(&self) -> Option<String> {
        if let Some(key) = action_key_in(&self.extra) {
            return Some(format!("tree > {key}"));
        }
        for (idx, section) in self.sections.iter().enumerate() {
            if let Some(key) = action_key_in(&section.extra) {
                return Some(format!("section {} > {key}", idx + 1));
            }
        }
        self.nodes().into_iter().find_map(|(located, path)| {
            action_key_in(&located.node.extra)
                .map(|key| format!("section {} > {path} > {key}", located.section))
        })
    }

    /// Depth-first, document-order walk over every nested node.
    pub fn nodes(&self) -> Vec<(LocatedNode<'_>, NodePath)> {
        let mut out = Vec::new();
        for (idx, section) in self.sections.iter().enumerate() {
            let section_id = section.section_id.as_deref().unwrap_or_default();
            collect(&section.children, &NodePath::default(), idx + 1, section_id, &mut out);
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.sections.iter().map(|s| count_nodes(&s.children)).sum()
    }

    pub fn action_count(&self) -> usize {
        self.nodes().iter().filter(|(n, _)| n.node.action.is_some()).count()
    }
}

fn collect<'a>(
    nodes: &'a [Node],
    parent: &NodePath,
    section: usize,
    section_id: &'a str,
    out: &mut Vec<(LocatedNode<'a>, NodePath)>,
) {
    for (idx, node) in nodes.iter().enumerate() {
        let path = parent.child(idx + 1);
        out.push((LocatedNode { section, section_id, node }, path.clone()));
        collect(&node.children, &path, section, section_id, out);
    }
}

fn count_nodes(nodes: &[Node]) -> usize {
    nodes.iter().map(|n| 1 + count_nodes(&n.children)).sum()
}

fn action_key_in(extra: &BTreeMap<String, Value>) -> Option<&str> {
    extra
        .iter()
        .find(|(key, value)| ACTION_KEYS.contains(&key.as_str()) || holds_action(value))
        .map(|(key, _)| key.as_str())
}

fn holds_action(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(key, v)| ACTION_KEYS.contains(&key.as_str()) || holds_action(v)),
        Value::Array(items) => items.iter().any(holds_action),
        _ => false,
    }
}

/// Legacy layouts store identifiers as strings or bare numbers.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(Value::Array(_)) => Err(D::Error::custom("expected a scalar, found an array")),
        Some(Value::Object(_)) => Err(D::Error::custom("expected a scalar, found an object")),
    }
}
