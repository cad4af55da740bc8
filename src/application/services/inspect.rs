//! Read-only layout inspection

use std::fmt;

use termtree::Tree;
use tracing::info;

use crate::domain::{Document, Locator, NodeId};

const MAX_CHAIN_DEPTH: usize = 10;
const CLASS_PREVIEW: usize = 60;

/// Tag and shortened class list of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub tag: String,
    pub class_name: String,
}

impl NodeSummary {
    fn of(document: &Document, node: NodeId) -> Self {
        Self {
            tag: document
                .element(node)
                .map(|e| e.tag().to_ascii_uppercase())
                .unwrap_or_default(),
            class_name: document.class_name(node).chars().take(CLASS_PREVIEW).collect(),
        }
    }
}

impl fmt::Display for NodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.tag, self.class_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchRole {
    Video,
    Chat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSummary {
    pub node: NodeSummary,
    pub role: Option<BranchRole>,
}

/// What the locator currently sees.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutReport {
    pub primary_marker: bool,
    pub secondary_marker: bool,
    pub ancestor: Option<NodeSummary>,
    /// Children of the ancestor, in order
    pub children: Vec<ChildSummary>,
    /// Parent chain of the primary marker, filled only when no ancestor resolved
    pub parent_chain: Vec<NodeSummary>,
}

impl LayoutReport {
    /// True if an ancestor resolves right now.
    pub fn elements(&self) -> bool {
        self.ancestor.is_some()
    }
}

impl fmt::Display for LayoutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Video player: {}", self.primary_marker)?;
        writeln!(f, "Chat: {}", self.secondary_marker)?;
        match &self.ancestor {
            Some(ancestor) => {
                let leaves = self.children.iter().enumerate().map(|(i, child)| {
                    let role = match child.role {
                        Some(BranchRole::Video) => " [VIDEO]",
                        Some(BranchRole::Chat) => " [CHAT]",
                        None => "",
                    };
                    Tree::new(format!("Child {i}{role}: {}", child.node))
                });
                write!(f, "{}", Tree::new(ancestor.to_string()).with_leaves(leaves))
            }
            None => {
                writeln!(f, "Could not find common parent!")?;
                for (depth, node) in self.parent_chain.iter().enumerate() {
                    writeln!(f, "  {depth}: {node}")?;
                }
                Ok(())
            }
        }
    }
}

/// Describe the current layout. Never mutates the document.
pub fn inspect(document: &Document, locator: &Locator) -> LayoutReport {
    let layout = locator.locate(document);
    let mut report = LayoutReport {
        primary_marker: layout.primary_marker.is_some(),
        secondary_marker: layout.secondary_marker.is_some(),
        ..LayoutReport::default()
    };

    if let Some(junction) = layout.junction {
        report.ancestor = Some(NodeSummary::of(document, junction.ancestor));
        report.children = document
            .children(junction.ancestor)
            .iter()
            .map(|&child| ChildSummary {
                node: NodeSummary::of(document, child),
                role: if child == junction.primary_branch {
                    Some(BranchRole::Video)
                } else if child == junction.secondary_branch {
                    Some(BranchRole::Chat)
                } else {
                    None
                },
            })
            .collect();
    } else if let Some(primary) = layout.primary_marker {
        let root = document.root();
        let mut current = document.parent(primary);
        while let Some(node) = current {
            if node == root || report.parent_chain.len() >= MAX_CHAIN_DEPTH {
                break;
            }
            report.parent_chain.push(NodeSummary::of(document, node));
            current = document.parent(node);
        }
    }

    info!(
        primary = report.primary_marker,
        secondary = report.secondary_marker,
        ancestor = report.elements(),
        "debug layout"
    );
    report
}
