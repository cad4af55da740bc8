//! Marker lookup and branch-separating ancestor search

use tracing::{debug, instrument, trace};

use crate::domain::document::{Document, NodeId};
use crate::domain::selector::SelectorList;

/// The ancestor under which both markers live in distinct direct children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Junction {
    pub ancestor: NodeId,
    /// Direct child of `ancestor` containing the primary marker.
    pub primary_branch: NodeId,
    /// Direct child of `ancestor` containing the secondary marker.
    /// Never equal to `primary_branch`.
    pub secondary_branch: NodeId,
}

/// Result of one locator run.
///
/// `junction` is None whenever a marker is missing or the markers never
/// separate below the document root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layout {
    pub primary_marker: Option<NodeId>,
    pub secondary_marker: Option<NodeId>,
    pub junction: Option<Junction>,
}

impl Layout {
    pub fn ancestor(&self) -> Option<NodeId> {
        self.junction.map(|j| j.ancestor)
    }

    pub fn primary_branch(&self) -> Option<NodeId> {
        self.junction.map(|j| j.primary_branch)
    }

    pub fn secondary_branch(&self) -> Option<NodeId> {
        self.junction.map(|j| j.secondary_branch)
    }
}

/// Finds the two markers and the minimal ancestor that separates them.
#[derive(Debug, Clone)]
pub struct Locator {
    primary: SelectorList,
    secondary: Vec<SelectorList>,
}

impl Locator {
    /// `secondary` is tried in order; the first selector matching anything wins.
    pub fn new(primary: SelectorList, secondary: Vec<SelectorList>) -> Self {
        Self { primary, secondary }
    }

    #[instrument(level = "debug", skip_all)]
    pub fn locate(&self, document: &Document) -> Layout {
        let primary_marker = document.query_selector(&self.primary);
        let secondary_marker = self
            .secondary
            .iter()
            .find_map(|selector| document.query_selector(selector));

        let junction = match (primary_marker, secondary_marker) {
            (Some(primary), Some(secondary)) => find_junction(document, primary, secondary),
            _ => None,
        };
        debug!(
            primary = primary_marker.is_some(),
            secondary = secondary_marker.is_some(),
            ancestor = junction.is_some(),
            "located layout"
        );

        Layout {
            primary_marker,
            secondary_marker,
            junction,
        }
    }
}

/// Walk up from the primary marker's parent until an ancestor holds the two
/// markers in different direct children. The document root is never a candidate.
pub fn find_junction(document: &Document, primary: NodeId, secondary: NodeId) -> Option<Junction> {
    let root = document.root();
    let mut candidate = document.parent(primary);

    while let Some(ancestor) = candidate {
        if ancestor == root {
            break;
        }
        if document.contains(ancestor, secondary) {
            let children = document.children(ancestor);
            let primary_branch = children
                .iter()
                .copied()
                .find(|&c| document.contains(c, primary));
            let secondary_branch = children
                .iter()
                .copied()
                .find(|&c| document.contains(c, secondary));

            match (primary_branch, secondary_branch) {
                (Some(primary_branch), Some(secondary_branch))
                    if primary_branch != secondary_branch =>
                {
                    return Some(Junction {
                        ancestor,
                        primary_branch,
                        secondary_branch,
                    });
                }
                _ => trace!(%ancestor, "markers not separated, climbing"),
            }
        }
        candidate = document.parent(ancestor);
    }
    None
}
