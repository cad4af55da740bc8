use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::style::{Priority, StyleMap, StyleValue};

/// Handle to an element in a [`Document`].
///
/// Handles are generational: once the host removes an element its handle
/// resolves to nothing, even if the arena slot is reused later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Index);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (slot, generation) = self.0.into_raw_parts();
        write!(f, "#{}.{}", slot, generation)
    }
}

/// Element payload stored in the arena.
#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    classes: Vec<String>,
    style: StyleMap,
    attributes: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str, classes: &[&str]) -> Self {
        let mut element = Self {
            tag: tag.to_ascii_lowercase(),
            classes: Vec::new(),
            style: StyleMap::new(),
            attributes: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        };
        for class in classes {
            if !element.classes.iter().any(|c| c == class) {
                element.classes.push((*class).to_string());
            }
        }
        element
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Space-joined class list, the DOM `className`.
    pub fn class_name(&self) -> String {
        self.classes.join(" ")
    }

    pub fn style(&self) -> &StyleMap {
        &self.style
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// What changed in a single mutation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        name: String,
    },
}

/// A single observed change, delivered to observers in batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

impl MutationRecord {
    pub fn is_child_list(&self) -> bool {
        matches!(self.kind, MutationKind::ChildList { .. })
    }
}

/// Arena-backed host document.
///
/// The root element is the topmost node the overlay may touch. Structural
/// changes and effective attribute writes are queued as mutation records
/// until drained with [`Document::take_records`].
#[derive(Debug)]
pub struct Document {
    arena: Arena<Element>,
    root: NodeId,
    location: String,
    records: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new("body")
    }
}

impl Document {
    pub fn new(root_tag: &str) -> Self {
        let mut arena = Arena::new();
        let root = NodeId(arena.insert(Element::new(root_tag, &[])));
        Self {
            arena,
            root,
            location: String::new(),
            records: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Change the current location identifier.
    ///
    /// Like a history push in the host, this produces no mutation record.
    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.arena.get(id.0)
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.arena.get_mut(id.0)
    }

    /// Number of live elements, detached ones included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// True if `id` is alive and reachable from the root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.element(id).and_then(Element::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map(Element::children).unwrap_or(&[])
    }

    /// Inclusive containment: a node contains itself.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if self.element(ancestor).is_none() {
            return false;
        }
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Pre-order (document order) traversal of `id` and its descendants.
    #[instrument(level = "trace", skip(self))]
    pub fn subtree(&self, id: NodeId) -> Subtree<'_> {
        Subtree::new(self, id)
    }

    /// Create a detached element.
    #[instrument(level = "trace", skip(self))]
    pub fn create_element(&mut self, tag: &str, classes: &[&str]) -> NodeId {
        NodeId(self.arena.insert(Element::new(tag, classes)))
    }

    /// Create an element and append it to `parent`.
    pub fn append(&mut self, parent: NodeId, tag: &str, classes: &[&str]) -> DomainResult<NodeId> {
        let child = self.create_element(tag, classes);
        self.append_child(parent, child)?;
        Ok(child)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomainResult<()> {
        self.insert_child(parent, child, None)
    }

    /// Insert `child` before `reference`, which must be a child of `parent`.
    #[instrument(level = "trace", skip(self))]
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> DomainResult<()> {
        if self.parent(reference) != Some(parent) {
            return Err(DomainError::DetachedNode(reference.to_string()));
        }
        self.insert_child(parent, child, Some(reference))
    }

    fn insert_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomainResult<()> {
        if self.element(parent).is_none() {
            return Err(DomainError::DetachedNode(parent.to_string()));
        }
        if self.element(child).is_none() {
            return Err(DomainError::DetachedNode(child.to_string()));
        }
        if child == self.root || self.contains(child, parent) {
            return Err(DomainError::HierarchyRequest(child.to_string()));
        }
        self.detach(child);

        if let Some(element) = self.element_mut(child) {
            element.parent = Some(parent);
        }
        if let Some(element) = self.element_mut(parent) {
            let position = reference
                .and_then(|r| element.children.iter().position(|&c| c == r))
                .unwrap_or(element.children.len());
            element.children.insert(position, child);
        }
        self.records.push(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: vec![child],
                removed: Vec::new(),
            },
        });
        Ok(())
    }

    /// Unlink `child` from its parent, recording the removal. Keeps it alive.
    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        if let Some(element) = self.element_mut(parent) {
            element.children.retain(|&c| c != child);
        }
        if let Some(element) = self.element_mut(child) {
            element.parent = None;
        }
        self.records.push(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: Vec::new(),
                removed: vec![child],
            },
        });
    }

    /// Remove `id` and free its whole subtree.
    #[instrument(level = "trace", skip(self))]
    pub fn remove(&mut self, id: NodeId) -> DomainResult<()> {
        if id == self.root || self.element(id).is_none() {
            return Err(DomainError::DetachedNode(id.to_string()));
        }
        self.detach(id);
        self.free(id);
        Ok(())
    }

    /// Drop every child of `parent` and append `replacements` in order,
    /// the way a host framework re-renders a container.
    #[instrument(level = "trace", skip(self))]
    pub fn replace_children(&mut self, parent: NodeId, replacements: &[NodeId]) -> DomainResult<()> {
        let old = self
            .element(parent)
            .map(|e| e.children.clone())
            .ok_or_else(|| DomainError::DetachedNode(parent.to_string()))?;
        for child in old {
            self.remove(child)?;
        }
        for &child in replacements {
            self.append_child(parent, child)?;
        }
        Ok(())
    }

    fn free(&mut self, id: NodeId) {
        let doomed: Vec<NodeId> = self.subtree(id).collect();
        for node in doomed {
            self.arena.remove(node.0);
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id)
            .map(|e| e.classes.iter().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Returns true if the class list changed. Unknown nodes are ignored.
    pub fn add_class(&mut self, id: NodeId, class: &str) -> bool {
        let changed = match self.element_mut(id) {
            Some(element) if !element.classes.iter().any(|c| c == class) => {
                element.classes.push(class.to_string());
                true
            }
            _ => false,
        };
        if changed {
            self.record_attribute(id, "class");
        }
        changed
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> bool {
        let changed = match self.element_mut(id) {
            Some(element) => {
                let before = element.classes.len();
                element.classes.retain(|c| c != class);
                element.classes.len() != before
            }
            None => false,
        };
        if changed {
            self.record_attribute(id, "class");
        }
        changed
    }

    pub fn class_name(&self, id: NodeId) -> String {
        self.element(id).map(Element::class_name).unwrap_or_default()
    }

    pub fn style_property(&self, id: NodeId, name: &str) -> Option<&StyleValue> {
        self.element(id).and_then(|e| e.style.get(name))
    }

    /// Returns true if the declaration changed.
    pub fn set_style_property(
        &mut self,
        id: NodeId,
        name: &str,
        value: &str,
        priority: Priority,
    ) -> bool {
        let wanted = StyleValue::new(value, priority);
        let changed = match self.element_mut(id) {
            Some(element) if element.style.get(name) != Some(&wanted) => {
                element.style.insert(name.to_string(), wanted);
                true
            }
            _ => false,
        };
        if changed {
            self.record_attribute(id, "style");
        }
        changed
    }

    pub fn remove_style_property(&mut self, id: NodeId, name: &str) -> Option<StyleValue> {
        let removed = self.element_mut(id).and_then(|e| e.style.remove(name));
        if removed.is_some() {
            self.record_attribute(id, "style");
        }
        removed
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|e| e.attributes.get(name))
            .map(String::as_str)
    }

    /// Attribute value as selectors see it; `class` resolves to the class list.
    pub fn attribute_value(&self, id: NodeId, name: &str) -> Option<Cow<'_, str>> {
        let element = self.element(id)?;
        if name == "class" {
            if element.classes.is_empty() {
                None
            } else {
                Some(Cow::Owned(element.class_name()))
            }
        } else {
            element.attributes.get(name).map(|v| Cow::Borrowed(v.as_str()))
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        let changed = match self.element_mut(id) {
            Some(element) if element.attributes.get(name).map(String::as_str) != Some(value) => {
                element.attributes.insert(name.to_string(), value.to_string());
                true
            }
            _ => false,
        };
        if changed {
            self.record_attribute(id, name);
        }
        changed
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let removed = self.element_mut(id).and_then(|e| e.attributes.remove(name));
        if removed.is_some() {
            self.record_attribute(id, name);
        }
        removed
    }

    fn record_attribute(&mut self, target: NodeId, name: &str) {
        self.records.push(MutationRecord {
            target,
            kind: MutationKind::Attributes {
                name: name.to_string(),
            },
        });
    }

    /// Drain queued mutation records.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn has_pending_records(&self) -> bool {
        !self.records.is_empty()
    }
}

/// Pre-order iterator over a subtree.
pub struct Subtree<'a> {
    document: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> Subtree<'a> {
    fn new(document: &'a Document, start: NodeId) -> Self {
        let mut stack = Vec::new();
        if document.element(start).is_some() {
            stack.push(start);
        }
        Self { document, stack }
    }
}

impl<'a> Iterator for Subtree<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        if let Some(element) = self.document.element(current) {
            // Reverse push keeps left-to-right order
            for &child in element.children.iter().rev() {
                self.stack.push(child);
            }
        }
        Some(current)
    }
}
