//! Serializable document snapshots
//!
//! Used to load captured host markup and to compare whole-tree states.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::document::{Document, NodeId};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::style::StyleValue;

/// One element and its subtree. Style values use CSS text, e.g. `"100% !important"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NodeSnapshot {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    pub fn new(tag: &str, classes: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_children(mut self, children: Vec<NodeSnapshot>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    #[serde(default)]
    pub location: String,
    pub root: NodeSnapshot,
}

impl Document {
    /// Build a document from a snapshot. The snapshot root becomes the document root.
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> DomainResult<Self> {
        let mut document = Document::new(&snapshot.root.tag);
        document.set_location(snapshot.location.clone());
        let root = document.root();
        document.fill(root, &snapshot.root)?;
        for child in &snapshot.root.children {
            document.build(root, child)?;
        }
        // Loading is not a host mutation
        document.take_records();
        Ok(document)
    }

    fn build(&mut self, parent: NodeId, node: &NodeSnapshot) -> DomainResult<()> {
        let id = self.append(parent, &node.tag, &[])?;
        self.fill(id, node)?;
        for child in &node.children {
            self.build(id, child)?;
        }
        Ok(())
    }

    fn fill(&mut self, id: NodeId, node: &NodeSnapshot) -> DomainResult<()> {
        for class in &node.classes {
            self.add_class(id, class);
        }
        for (name, text) in &node.style {
            let value = StyleValue::parse(text).ok_or_else(|| {
                DomainError::InvalidSnapshot(format!("empty style value for `{name}`"))
            })?;
            self.set_style_property(id, name, &value.value, value.priority);
        }
        for (name, value) in &node.attributes {
            self.set_attribute(id, name, value);
        }
        Ok(())
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            location: self.location().to_string(),
            root: self.snapshot_node(self.root()).unwrap_or_default(),
        }
    }

    pub fn snapshot_node(&self, id: NodeId) -> Option<NodeSnapshot> {
        let element = self.element(id)?;
        Some(NodeSnapshot {
            tag: element.tag().to_string(),
            classes: element.classes().to_vec(),
            style: element
                .style()
                .iter()
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect(),
            attributes: element.attributes().clone(),
            children: element
                .children()
                .iter()
                .filter_map(|&child| self.snapshot_node(child))
                .collect(),
        })
    }
}
