//! Domain layer: host document model, selectors and the layout locator
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod document;
pub mod error;
pub mod locator;
pub mod selector;
pub mod snapshot;
pub mod style;

pub use document::{Document, Element, MutationKind, MutationRecord, NodeId};
pub use error::{DomainError, DomainResult};
pub use locator::{find_junction, Junction, Layout, Locator};
pub use selector::SelectorList;
pub use snapshot::{DocumentSnapshot, NodeSnapshot};
pub use style::{Priority, StyleMap, StyleValue};
