//! Application services

pub mod inspect;
pub mod overlay;
pub mod session;

pub use inspect::{inspect, BranchRole, ChildSummary, LayoutReport, NodeSummary};
pub use overlay::{OverlayRules, OverlayService, SAVED_STYLE_PREFIX};
pub use session::{PanoramaSession, PanoramaState, ReconcileStats};
