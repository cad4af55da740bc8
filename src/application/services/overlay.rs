//! Overlay applier
//!
//! Writes marker classes and forced inline styles onto host nodes, and takes
//! them off again. All state lives on the host nodes themselves: the prior
//! inline value of every forced property is parked in a
//! `data-tcp-prev-<property>` attribute on the same node, so `remove` can put
//! back exactly what was there.

use tracing::{debug, info, instrument};

use crate::application::ApplicationResult;
use crate::config::{ClassConfig, Settings};
use crate::domain::{Document, Layout, Locator, NodeId, Priority, SelectorList, StyleValue};

/// Attribute prefix holding the pre-overlay declaration of a forced property.
pub const SAVED_STYLE_PREFIX: &str = "data-tcp-prev-";

const FULL_WIDTH: &[(&str, &str)] = &[
    ("width", "100%"),
    ("max-width", "none"),
    ("min-width", "0"),
    ("flex-grow", "1"),
];

const BRANCH_WIDTH: &[(&str, &str)] = &[("width", "100%"), ("max-width", "none"), ("flex-grow", "1")];

const NO_SLIDE: &[(&str, &str)] = &[("transform", "none"), ("transition", "none")];

const HIDDEN: &[(&str, &str)] = &[("display", "none")];

/// Compiled selector table and marker classes.
#[derive(Debug, Clone)]
pub struct OverlayRules {
    locator: Locator,
    force_full_width: Vec<SelectorList>,
    force_exclude: SelectorList,
    sliding_panel: SelectorList,
    visibility_toggle: SelectorList,
    classes: ClassConfig,
}

impl OverlayRules {
    /// Parse every configured selector; the first bad one fails construction.
    pub fn from_settings(settings: &Settings) -> ApplicationResult<Self> {
        let selectors = &settings.selectors;
        let secondary = selectors
            .secondary
            .iter()
            .map(|s| SelectorList::parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        let force_full_width = selectors
            .force_full_width
            .iter()
            .map(|s| SelectorList::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            locator: Locator::new(SelectorList::parse(&selectors.primary)?, secondary),
            force_full_width,
            force_exclude: SelectorList::parse(&selectors.force_exclude)?,
            sliding_panel: SelectorList::parse(&selectors.sliding_panel)?,
            visibility_toggle: SelectorList::parse(&selectors.visibility_toggle)?,
            classes: settings.classes.clone(),
        })
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn classes(&self) -> &ClassConfig {
        &self.classes
    }
}

/// Applies and removes the panorama overlay on a document.
#[derive(Debug, Clone)]
pub struct OverlayService {
    rules: OverlayRules,
}

impl OverlayService {
    pub fn new(rules: OverlayRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &OverlayRules {
        &self.rules
    }

    pub fn locate(&self, document: &Document) -> Layout {
        self.rules.locator.locate(document)
    }

    /// Place the overlay. Returns false, touching nothing, when the page has no
    /// primary marker or the markers do not separate yet.
    #[instrument(level = "debug", skip_all)]
    pub fn apply(&self, document: &mut Document) -> bool {
        let layout = self.locate(document);

        if layout.primary_marker.is_none() {
            debug!("no video player found, not a stream page");
            return false;
        }
        let Some(junction) = layout.junction else {
            debug!("could not find parent container");
            return false;
        };

        let classes = &self.rules.classes;
        document.add_class(junction.ancestor, &classes.ancestor);
        document.add_class(junction.primary_branch, &classes.primary_branch);
        document.add_class(junction.secondary_branch, &classes.secondary_branch);
        force_all(document, junction.secondary_branch, BRANCH_WIDTH);

        self.force_styles(document);

        info!(
            ancestor = %junction.ancestor,
            tag = document.element(junction.ancestor).map(|e| e.tag()).unwrap_or_default(),
            class = %document.class_name(junction.ancestor),
            "layout classes applied"
        );
        true
    }

    /// Sweep the always-force selectors. Safe to call any number of times.
    #[instrument(level = "trace", skip_all)]
    pub fn force_styles(&self, document: &mut Document) {
        for selector in &self.rules.force_full_width {
            for node in document.query_selector_all(selector) {
                if self.rules.force_exclude.matches(document, node) {
                    continue;
                }
                force_all(document, node, FULL_WIDTH);
            }
        }

        for node in document.query_selector_all(&self.rules.sliding_panel) {
            force_all(document, node, NO_SLIDE);
        }

        // The toggle is excluded from resizing above but hidden here
        for node in document.query_selector_all(&self.rules.visibility_toggle) {
            force_all(document, node, HIDDEN);
        }
    }

    /// Take the overlay off every node that currently carries it.
    ///
    /// Queries the live tree rather than a previous layout, so nodes the host
    /// swapped in meanwhile are handled too. A no-op when nothing is applied.
    #[instrument(level = "debug", skip_all)]
    pub fn remove(&self, document: &mut Document) {
        let classes = &self.rules.classes;
        let root = document.root();

        for class in [
            &classes.ancestor,
            &classes.primary_branch,
            &classes.secondary_branch,
        ] {
            let carriers: Vec<NodeId> = document
                .subtree(root)
                .filter(|&node| document.has_class(node, class))
                .collect();
            for node in carriers {
                document.remove_class(node, class);
            }
        }

        let forced: Vec<NodeId> = document
            .subtree(root)
            .filter(|&node| !saved_properties(document, node).is_empty())
            .collect();
        let restored = forced.len();
        for node in forced {
            restore_all(document, node);
        }

        if restored > 0 {
            info!(restored, "panorama layout removed");
        }
    }
}

fn saved_attribute(property: &str) -> String {
    format!("{SAVED_STYLE_PREFIX}{property}")
}

fn saved_properties(document: &Document, node: NodeId) -> Vec<String> {
    document
        .element(node)
        .map(|e| {
            e.attributes()
                .keys()
                .filter_map(|name| name.strip_prefix(SAVED_STYLE_PREFIX))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Force `property` with important priority, remembering the first value it replaced.
fn force(document: &mut Document, node: NodeId, property: &str, value: &str) {
    let saved = saved_attribute(property);
    if document.attribute(node, &saved).is_none() {
        let previous = document
            .style_property(node, property)
            .map(ToString::to_string)
            .unwrap_or_default();
        document.set_attribute(node, &saved, &previous);
    }
    document.set_style_property(node, property, value, Priority::Important);
}

fn force_all(document: &mut Document, node: NodeId, declarations: &[(&str, &str)]) {
    for (property, value) in declarations {
        force(document, node, property, value);
    }
}

fn restore_all(document: &mut Document, node: NodeId) {
    for property in saved_properties(document, node) {
        let previous = document
            .remove_attribute(node, &saved_attribute(&property))
            .and_then(|text| StyleValue::parse(&text));
        match previous {
            Some(value) => {
                document.set_style_property(node, &property, &value.value, value.priority);
            }
            None => {
                document.remove_style_property(node, &property);
            }
        }
    }
}
