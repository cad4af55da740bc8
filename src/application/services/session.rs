//! Reconciliation loop
//!
//! A `PanoramaSession` owns the enabled flag and keeps the overlay asserted
//! while the host keeps rebuilding its document. It is single-threaded and
//! event driven: the host mutates the document through [`PanoramaSession::mutate_host`],
//! mutation batches feed the watchers, and every delay is a task in a virtual
//! [`TimerQueue`] that only runs when [`PanoramaSession::advance`] moves time.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::application::control::{ControlRequest, ControlResponse, ToggleEvent};
use crate::application::scheduler::{RetryPolicy, TimerId, TimerQueue};
use crate::application::services::inspect::{inspect, LayoutReport};
use crate::application::services::overlay::{OverlayRules, OverlayService};
use crate::application::ApplicationResult;
use crate::config::{Settings, TimingConfig};
use crate::domain::{Document, Layout};
use crate::infrastructure::traits::PreferenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Startup,
    Apply { attempt: usize },
    Reconcile,
    NavigationApply,
}

/// Explicit session state. Only toggles and start-up change `enabled`.
#[derive(Debug, Default)]
pub struct PanoramaState {
    enabled: bool,
    watching: bool,
    watching_navigation: bool,
    last_location: Option<String>,
    debounce: Option<TimerId>,
}

impl PanoramaState {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn watching(&self) -> bool {
        self.watching
    }

    pub fn watching_navigation(&self) -> bool {
        self.watching_navigation
    }

    pub fn last_location(&self) -> Option<&str> {
        self.last_location.as_deref()
    }

    /// True while a reconciliation pass is waiting out the debounce window.
    pub fn reconcile_pending(&self) -> bool {
        self.debounce.is_some()
    }
}

/// Diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Debounced reconciliation passes that ran
    pub passes: u64,
    /// Passes that found the ancestor marker missing and re-applied
    pub reapplied: u64,
    /// Location changes observed
    pub navigations: u64,
    /// Scheduled applies skipped because the session was disabled meanwhile
    pub stale_skipped: u64,
}

type Listener = Box<dyn FnMut(&ToggleEvent)>;

pub struct PanoramaSession {
    document: Document,
    overlay: OverlayService,
    retry: RetryPolicy,
    timing: TimingConfig,
    storage_key: String,
    store: Arc<dyn PreferenceStore>,
    timers: TimerQueue<Task>,
    state: PanoramaState,
    stats: ReconcileStats,
    listeners: Vec<Listener>,
}

impl fmt::Debug for PanoramaSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanoramaSession")
            .field("state", &self.state)
            .field("stats", &self.stats)
            .field("now_ms", &self.timers.now_ms())
            .field("pending_timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

impl PanoramaSession {
    /// Compile the configured selectors and build an idle, disabled session.
    pub fn new(
        document: Document,
        settings: &Settings,
        store: Arc<dyn PreferenceStore>,
    ) -> ApplicationResult<Self> {
        let rules = OverlayRules::from_settings(settings)?;
        Ok(Self {
            document,
            overlay: OverlayService::new(rules),
            retry: RetryPolicy::new(settings.timing.retry_delays_ms.clone()),
            timing: settings.timing.clone(),
            storage_key: settings.storage.key.clone(),
            store,
            timers: TimerQueue::new(),
            state: PanoramaState::default(),
            stats: ReconcileStats::default(),
            listeners: Vec::new(),
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn state(&self) -> &PanoramaState {
        &self.state
    }

    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn now_ms(&self) -> u64 {
        self.timers.now_ms()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Register an observer for enable/disable transitions.
    pub fn subscribe(&mut self, listener: impl FnMut(&ToggleEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Schedule initialization after the start-up delay.
    pub fn start(&mut self) {
        self.timers.schedule(self.timing.startup_delay_ms, Task::Startup);
    }

    /// Read the preference, apply it and start both watchers.
    #[instrument(level = "debug", skip(self))]
    pub fn initialize(&mut self) {
        let saved = self.load_preference();
        self.set_enabled(saved);
        self.watch();
        self.watch_navigation();
        info!(enabled = saved, "extension initialized");
    }

    fn load_preference(&self) -> bool {
        match self.store.get(&self.storage_key) {
            Ok(value) => value.unwrap_or(false),
            Err(e) => {
                warn!("cannot read preference {}: {}", self.storage_key, e);
                false
            }
        }
    }

    fn save_preference(&self, enabled: bool) {
        if let Err(e) = self.store.set(&self.storage_key, enabled) {
            warn!("cannot save preference {}: {}", self.storage_key, e);
        }
    }

    /// Switch panorama mode on or off.
    ///
    /// Enabling marks the root and schedules the retry attempts; disabling
    /// unmarks the root and removes the overlay at once. Both notify listeners.
    #[instrument(level = "debug", skip(self))]
    pub fn set_enabled(&mut self, enabled: bool) {
        self.state.enabled = enabled;
        let root = self.document.root();
        let root_mode = self.overlay.rules().classes().root_mode.clone();

        if enabled {
            self.document.add_class(root, &root_mode);
            for (i, &delay) in self.retry.delays().iter().enumerate() {
                self.timers.schedule(delay, Task::Apply { attempt: i + 1 });
            }
        } else {
            self.document.remove_class(root, &root_mode);
            self.overlay.remove(&mut self.document);
        }

        let event = ToggleEvent { enabled };
        for listener in &mut self.listeners {
            listener(&event);
        }
        info!(enabled, "panorama mode set");
        self.deliver_mutations();
    }

    /// Flip, persist and apply the flag. Returns the new value.
    #[instrument(level = "debug", skip(self))]
    pub fn toggle(&mut self) -> bool {
        let enabled = !self.state.enabled;
        self.save_preference(enabled);
        self.set_enabled(enabled);
        enabled
    }

    /// Apply the overlay right now, regardless of the flag.
    pub fn apply(&mut self) -> bool {
        let applied = self.overlay.apply(&mut self.document);
        self.deliver_mutations();
        applied
    }

    /// Remove the overlay right now, regardless of the flag.
    pub fn remove(&mut self) {
        self.overlay.remove(&mut self.document);
        self.deliver_mutations();
    }

    pub fn locate(&self) -> Layout {
        self.overlay.locate(&self.document)
    }

    pub fn inspect(&self) -> LayoutReport {
        inspect(&self.document, self.overlay.rules().locator())
    }

    /// Subscribe to child-list changes over the whole document.
    ///
    /// Calling it again replaces the previous subscription and drops any
    /// pending pass.
    pub fn watch(&mut self) {
        if let Some(id) = self.state.debounce.take() {
            self.timers.cancel(id);
        }
        self.state.watching = true;
        debug!("watching for layout changes");
    }

    /// Track the location identifier on every mutation batch.
    pub fn watch_navigation(&mut self) {
        self.state.watching_navigation = true;
        self.state.last_location = Some(self.document.location().to_string());
        debug!(location = self.document.location(), "watching for navigation");
    }

    /// Let the host mutate the document; the resulting batch reaches the
    /// watchers once `change` returns.
    pub fn mutate_host<R>(&mut self, change: impl FnOnce(&mut Document) -> R) -> R {
        let result = change(&mut self.document);
        self.deliver_mutations();
        result
    }

    /// Move virtual time forward, running due tasks in order.
    pub fn advance(&mut self, ms: u64) {
        let until = self.timers.now_ms().saturating_add(ms);
        while let Some((_, task)) = self.timers.pop_due(until) {
            self.run(task);
            self.deliver_mutations();
        }
        self.timers.set_now(until);
    }

    /// Answer a control-surface request.
    pub fn handle(&mut self, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::Toggle => ControlResponse::State {
                enabled: self.toggle(),
            },
            ControlRequest::GetState => ControlResponse::State {
                enabled: self.state.enabled,
            },
            ControlRequest::Debug => ControlResponse::Debug {
                elements: self.inspect().elements(),
            },
        }
    }

    /// Answer a raw JSON control message.
    pub fn handle_json(&mut self, message: &str) -> ApplicationResult<String> {
        let request = ControlRequest::from_json(message)?;
        Ok(self.handle(request).to_json())
    }

    fn run(&mut self, task: Task) {
        match task {
            Task::Startup => self.initialize(),
            Task::Apply { attempt } => {
                if !self.state.enabled {
                    self.stats.stale_skipped += 1;
                    debug!(attempt, "disabled meanwhile, skipping apply");
                    return;
                }
                let applied = self.overlay.apply(&mut self.document);
                debug!(attempt, applied, "scheduled apply");
            }
            Task::Reconcile => {
                self.state.debounce = None;
                self.reconcile();
            }
            Task::NavigationApply => {
                if !self.state.enabled {
                    self.stats.stale_skipped += 1;
                    return;
                }
                let applied = self.overlay.apply(&mut self.document);
                debug!(applied, "re-applied after navigation");
            }
        }
    }

    /// One debounced pass: re-apply if the host dropped the ancestor marker,
    /// then always re-force styles the host may have reset.
    fn reconcile(&mut self) {
        if !self.state.enabled {
            self.stats.stale_skipped += 1;
            return;
        }
        self.stats.passes += 1;

        let layout = self.overlay.locate(&self.document);
        if let Some(junction) = layout.junction {
            let marker = &self.overlay.rules().classes().ancestor;
            if !self.document.has_class(junction.ancestor, marker) {
                info!("re-applying layout after DOM change");
                self.stats.reapplied += 1;
                self.overlay.apply(&mut self.document);
            }
        }
        self.overlay.force_styles(&mut self.document);
    }

    /// Deliver queued records as one batch. Observers only see child-list
    /// changes, so the overlay's own class and style writes never re-trigger them.
    fn deliver_mutations(&mut self) {
        let records = self.document.take_records();
        if !records.iter().any(|r| r.is_child_list()) {
            return;
        }
        self.on_layout_batch();
        self.on_navigation_batch();
    }

    fn on_layout_batch(&mut self) {
        if !self.state.watching || !self.state.enabled {
            return;
        }
        if let Some(id) = self.state.debounce.take() {
            self.timers.cancel(id);
        }
        let id = self.timers.schedule(self.timing.debounce_ms, Task::Reconcile);
        self.state.debounce = Some(id);
    }

    fn on_navigation_batch(&mut self) {
        if !self.state.watching_navigation {
            return;
        }
        let current = self.document.location();
        if self.state.last_location.as_deref() == Some(current) {
            return;
        }
        debug!(location = current, "navigation detected");
        self.state.last_location = Some(current.to_string());
        self.stats.navigations += 1;
        if self.state.enabled {
            self.timers
                .schedule(self.timing.navigation_settle_ms, Task::NavigationApply);
        }
    }
}
