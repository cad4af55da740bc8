//! Service container for dependency injection
//!
//! Chooses the preference backend once, at start-up, and wires sessions.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::services::PanoramaSession;
use crate::config::Settings;
use crate::domain::{Document, DocumentSnapshot};
use crate::infrastructure::traits::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
use crate::infrastructure::{InfraError, InfraResult};

/// Container holding the shared dependencies of a session.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Preference backend
    pub store: Arc<dyn PreferenceStore>,
}

impl ServiceContainer {
    /// Create a container with the file-backed store, or the same-session
    /// memory store when no data directory can be resolved.
    pub fn new(settings: Settings) -> Self {
        let store: Arc<dyn PreferenceStore> = match settings.preferences_path() {
            Some(path) => {
                debug!("preference store: {}", path.display());
                Arc::new(FilePreferenceStore::new(path))
            }
            None => {
                warn!("no preference location available, using session-local store");
                Arc::new(MemoryPreferenceStore::new())
            }
        };
        Self::with_deps(settings, store)
    }

    /// Create a container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
        }
    }

    /// Build a session over `document`.
    pub fn session(&self, document: Document) -> InfraResult<PanoramaSession> {
        Ok(PanoramaSession::new(
            document,
            &self.settings,
            Arc::clone(&self.store),
        )?)
    }

    /// Read a JSON document snapshot from disk.
    pub fn load_snapshot(&self, path: &Path) -> InfraResult<Document> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| InfraError::io(format!("read snapshot {}", path.display()), e))?;
        let snapshot: DocumentSnapshot =
            serde_json::from_str(&content).map_err(|e| InfraError::Snapshot {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Document::from_snapshot(&snapshot).map_err(|e| InfraError::Snapshot {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}
