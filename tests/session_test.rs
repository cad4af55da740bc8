//! Tests for the reconciliation loop
//!
//! All timing runs on the session's virtual clock, so every delay is exact:
//! - enable schedules the retry attempts, disable removes at once
//! - layout batches are debounced into one pass
//! - location changes re-apply after the settle delay

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::Arc;

use panorama::application::services::PanoramaSession;
use panorama::application::{ApplicationError, ControlRequest, ControlResponse};
use panorama::config::Settings;
use panorama::domain::{Document, NodeId, Priority, StyleValue};
use panorama::infrastructure::traits::{MemoryPreferenceStore, PreferenceStore};
use panorama::util::testing;

const ANCESTOR: &str = "tcp-panorama-container";
const ROOT_MODE: &str = "twitch-chat-panorama-enabled";
const KEY: &str = "twitchChatPanorama_enabled";

/// Append a channel view to `parent`; returns (channel-root, chat branch).
fn channel_view(doc: &mut Document, parent: NodeId) -> (NodeId, NodeId) {
    let channel = doc.append(parent, "div", &["channel-root"]).unwrap();
    let player = doc.append(channel, "div", &["channel-root__player"]).unwrap();
    doc.append(player, "div", &["persistent-player"]).unwrap();
    let right = doc
        .append(channel, "div", &["channel-root__right-column"])
        .unwrap();
    let column = doc.append(right, "div", &["right-column"]).unwrap();
    doc.append(column, "section", &["chat-shell"]).unwrap();
    (channel, right)
}

fn host_page() -> (Document, NodeId) {
    let mut doc = Document::default();
    doc.set_location("https://host/channel-a");
    let root = doc.root();
    let (channel, _) = channel_view(&mut doc, root);
    doc.take_records();
    (doc, channel)
}

fn session_with(
    settings: &Settings,
    store: Arc<dyn PreferenceStore>,
) -> (PanoramaSession, NodeId) {
    testing::init_test_setup();
    let (doc, channel) = host_page();
    let mut session = PanoramaSession::new(doc, settings, store).unwrap();
    session.watch();
    session.watch_navigation();
    (session, channel)
}

fn session() -> (PanoramaSession, NodeId) {
    session_with(&Settings::default(), Arc::new(MemoryPreferenceStore::new()))
}

/// Enable and let every retry attempt run.
fn enabled_session() -> (PanoramaSession, NodeId) {
    let (mut session, channel) = session();
    session.set_enabled(true);
    session.advance(1000);
    assert!(session.document().has_class(channel, ANCESTOR));
    (session, channel)
}

fn ancestor_marked(session: &PanoramaSession) -> bool {
    let doc = session.document();
    doc.subtree(doc.root()).any(|n| doc.has_class(n, ANCESTOR))
}

struct FailingStore;

impl PreferenceStore for FailingStore {
    fn get(&self, _key: &str) -> io::Result<Option<bool>> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no backend"))
    }

    fn set(&self, _key: &str, _value: bool) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no backend"))
    }
}

// ============================================================
// set_enabled() / retry schedule tests
// ============================================================

#[test]
fn given_enable_when_first_retry_fires_then_overlay_applied() {
    // Arrange
    let (mut session, channel) = session();

    // Act
    session.set_enabled(true);

    // Assert
    let root = session.document().root();
    assert!(session.document().has_class(root, ROOT_MODE));
    assert!(!session.document().has_class(channel, ANCESTOR));
    assert_eq!(session.pending_timers(), 3);

    session.advance(99);
    assert!(!session.document().has_class(channel, ANCESTOR));
    session.advance(1);
    assert!(session.document().has_class(channel, ANCESTOR));
}

#[test]
fn given_player_renders_late_when_retries_run_then_later_attempt_applies() {
    // Arrange: the host has not rendered the player yet
    testing::init_test_setup();
    let mut doc = Document::default();
    let root = doc.root();
    let shell = doc.append(root, "div", &["shell"]).unwrap();
    let mut session = PanoramaSession::new(
        doc,
        &Settings::default(),
        Arc::new(MemoryPreferenceStore::new()),
    )
    .unwrap();
    session.set_enabled(true);
    session.advance(100);
    assert!(!ancestor_marked(&session));

    // Act: the view appears between the first and second attempt
    session.mutate_host(|doc| channel_view(doc, shell));
    session.advance(400);

    // Assert
    assert!(ancestor_marked(&session));
}

#[test]
fn given_enable_then_disable_before_retries_when_time_passes_then_overlay_never_applied() {
    // Arrange
    let (mut session, channel) = session();

    // Act
    session.set_enabled(true);
    session.set_enabled(false);
    session.advance(5000);

    // Assert
    assert!(!ancestor_marked(&session));
    assert!(!session.document().has_class(channel, ANCESTOR));
    let root = session.document().root();
    assert!(!session.document().has_class(root, ROOT_MODE));
    assert_eq!(session.stats().stale_skipped, 3);
}

#[test]
fn given_enabled_session_when_disabled_then_overlay_removed_synchronously() {
    // Arrange
    let (mut session, channel) = enabled_session();

    // Act
    session.set_enabled(false);

    // Assert
    assert!(!session.document().has_class(channel, ANCESTOR));
    assert!(session
        .document()
        .subtree(channel)
        .all(|n| session.document().element(n).unwrap().style().is_empty()));
}

// ============================================================
// toggle() tests
// ============================================================

#[test]
fn given_fresh_session_when_toggled_twice_then_true_then_false_and_persisted() {
    // Arrange
    let store = Arc::new(MemoryPreferenceStore::new());
    let (mut session, _) = session_with(&Settings::default(), store.clone());

    // Act
    let first = session.toggle();
    let second = session.toggle();

    // Assert
    assert!(first);
    assert!(!second);
    assert_eq!(store.get(KEY).unwrap(), Some(false));
    assert!(!session.is_enabled());
}

#[test]
fn given_listener_when_toggling_then_every_transition_broadcast() {
    // Arrange
    let (mut session, _) = session();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    session.subscribe(move |event| sink.borrow_mut().push(event.enabled));

    // Act
    session.toggle();
    session.toggle();
    session.set_enabled(true);

    // Assert
    assert_eq!(*seen.borrow(), vec![true, false, true]);
}

#[test]
fn given_unreachable_store_when_starting_and_toggling_then_defaults_apply() {
    // Arrange
    let (mut session, _) = session_with(&Settings::default(), Arc::new(FailingStore));

    // Act
    session.initialize();
    let toggled = session.toggle();

    // Assert
    assert!(toggled);
    assert!(session.is_enabled());
}

// ============================================================
// start() / initialize() tests
// ============================================================

#[test]
fn given_stored_preference_when_started_then_enabled_after_startup_delay() {
    // Arrange
    testing::init_test_setup();
    let store = Arc::new(MemoryPreferenceStore::new());
    store.set(KEY, true).unwrap();
    let (doc, channel) = host_page();
    let mut session = PanoramaSession::new(doc, &Settings::default(), store).unwrap();

    // Act
    session.start();
    session.advance(999);
    assert!(!session.is_enabled());
    session.advance(1);

    // Assert
    assert!(session.is_enabled());
    assert!(session.state().watching());
    assert!(session.state().watching_navigation());
    session.advance(100);
    assert!(session.document().has_class(channel, ANCESTOR));
}

#[test]
fn given_no_stored_preference_when_initialized_then_disabled() {
    // Arrange
    let (mut session, channel) = session();

    // Act
    session.initialize();
    session.advance(2000);

    // Assert
    assert!(!session.is_enabled());
    assert!(!session.document().has_class(channel, ANCESTOR));
}

// ============================================================
// watch() debounce tests
// ============================================================

#[test]
fn given_burst_of_batches_when_window_elapses_from_last_then_exactly_one_pass() {
    // Arrange
    let (mut session, _) = enabled_session();
    let root = session.document().root();

    // Act: five batches 50ms apart, all inside the 200ms window
    for _ in 0..5 {
        session.mutate_host(|doc| doc.append(root, "div", &["noise"]).unwrap());
        session.advance(50);
    }
    assert_eq!(session.stats().passes, 0);
    assert!(session.state().reconcile_pending());

    // Assert: the last batch was 50ms ago
    session.advance(149);
    assert_eq!(session.stats().passes, 0);
    session.advance(1);
    assert_eq!(session.stats().passes, 1);
    session.advance(5000);
    assert_eq!(session.stats().passes, 1);
    assert!(!session.state().reconcile_pending());
}

#[test]
fn given_disabled_session_when_host_mutates_then_no_pass_scheduled() {
    // Arrange
    let (mut session, _) = session();
    let root = session.document().root();

    // Act
    session.mutate_host(|doc| doc.append(root, "div", &[]).unwrap());
    session.advance(1000);

    // Assert
    assert_eq!(session.pending_timers(), 0);
    assert_eq!(session.stats().passes, 0);
}

#[test]
fn given_overlay_writes_when_applied_then_watcher_not_retriggered() {
    // Arrange
    let (mut session, _) = enabled_session();

    // Act
    session.apply();
    session.remove();
    session.apply();

    // Assert
    assert!(!session.state().reconcile_pending());
    assert_eq!(session.pending_timers(), 0);
}

#[test]
fn given_host_rebuilds_container_when_debounce_elapses_then_marker_on_new_ancestor() {
    // Arrange
    let (mut session, old) = enabled_session();
    let root = session.document().root();

    // Act: same structure, fresh nodes, no overlay marker
    let fresh = session.mutate_host(|doc| {
        let holder = doc.create_element("div", &[]);
        let (channel, _) = channel_view(doc, holder);
        doc.replace_children(root, &[channel]).unwrap();
        doc.remove(holder).unwrap();
        channel
    });
    assert!(!session.document().has_class(fresh, ANCESTOR));
    session.advance(200);

    // Assert
    assert!(session.document().element(old).is_none());
    assert!(session.document().has_class(fresh, ANCESTOR));
    assert_eq!(session.stats().reapplied, 1);
}

#[test]
fn given_host_resets_inline_width_when_reconciled_then_style_forced_again() {
    // Arrange
    let (mut session, channel) = enabled_session();
    let right = session.document().children(channel)[1];

    // Act
    session.mutate_host(|doc| {
        doc.set_style_property(right, "width", "340px", Priority::Normal);
        doc.append(right, "div", &["toast"]).unwrap();
    });
    session.advance(200);

    // Assert
    assert_eq!(
        session.document().style_property(right, "width"),
        Some(&StyleValue::important("100%"))
    );
    assert_eq!(session.stats().reapplied, 0);
    assert_eq!(session.stats().passes, 1);
}

#[test]
fn given_pending_pass_when_disabled_then_pass_is_a_no_op() {
    // Arrange
    let (mut session, _) = enabled_session();
    let root = session.document().root();
    session.mutate_host(|doc| doc.append(root, "div", &[]).unwrap());

    // Act
    session.set_enabled(false);
    session.advance(200);

    // Assert
    assert_eq!(session.stats().passes, 0);
    assert!(!ancestor_marked(&session));
}

// ============================================================
// watch_navigation() tests
// ============================================================

#[test]
fn given_location_change_when_settle_delay_elapses_then_new_page_applied() {
    // Arrange: a long debounce keeps the layout watcher out of the way
    let mut settings = Settings::default();
    settings.timing.debounce_ms = 10_000;
    let (mut session, _) = session_with(&settings, Arc::new(MemoryPreferenceStore::new()));
    session.set_enabled(true);
    session.advance(1000);
    let root = session.document().root();

    // Act
    let fresh = session.mutate_host(|doc| {
        doc.set_location("https://host/channel-b");
        let holder = doc.create_element("div", &[]);
        let (channel, _) = channel_view(doc, holder);
        doc.replace_children(root, &[channel]).unwrap();
        doc.remove(holder).unwrap();
        channel
    });
    session.advance(999);
    assert!(!session.document().has_class(fresh, ANCESTOR));
    session.advance(1);

    // Assert
    assert!(session.document().has_class(fresh, ANCESTOR));
    assert_eq!(session.stats().navigations, 1);
    assert_eq!(
        session.state().last_location(),
        Some("https://host/channel-b")
    );
}

#[test]
fn given_disabled_session_when_location_changes_then_tracked_but_not_applied() {
    // Arrange
    let (mut session, channel) = session();
    let root = session.document().root();

    // Act
    session.mutate_host(|doc| {
        doc.set_location("https://host/channel-b");
        doc.append(root, "div", &[]).unwrap();
    });
    session.advance(2000);

    // Assert
    assert_eq!(session.stats().navigations, 1);
    assert!(!session.document().has_class(channel, ANCESTOR));
    assert_eq!(session.pending_timers(), 0);
}

#[test]
fn given_same_location_when_host_mutates_then_no_navigation() {
    // Arrange
    let (mut session, _) = enabled_session();
    let root = session.document().root();

    // Act
    session.mutate_host(|doc| doc.append(root, "div", &[]).unwrap());
    session.advance(2000);

    // Assert
    assert_eq!(session.stats().navigations, 0);
}

// ============================================================
// Control surface
// ============================================================

#[test]
fn given_control_requests_when_handled_then_state_and_debug_reported() {
    // Arrange
    let (mut session, _) = session();

    // Act / Assert
    assert_eq!(
        session.handle(ControlRequest::GetState),
        ControlResponse::State { enabled: false }
    );
    assert_eq!(
        session.handle_json(r#"{"action":"toggle"}"#).unwrap(),
        r#"{"enabled":true}"#
    );
    assert_eq!(
        session.handle_json(r#"{"action":"debug"}"#).unwrap(),
        r#"{"elements":true}"#
    );
    assert!(session.is_enabled());
}

#[test]
fn given_debug_request_when_handled_then_document_not_mutated() {
    // Arrange
    let (mut session, _) = session();
    let before = session.document().snapshot();

    // Act
    let response = session.handle(ControlRequest::Debug);

    // Assert
    assert_eq!(response, ControlResponse::Debug { elements: true });
    assert_eq!(session.document().snapshot(), before);
}

#[test]
fn given_unknown_action_when_handling_json_then_invalid_request() {
    // Arrange
    let (mut session, _) = session();

    // Act
    let result = session.handle_json(r#"{"action":"explode"}"#);

    // Assert
    assert!(matches!(result, Err(ApplicationError::InvalidRequest(_))));
    assert!(!session.is_enabled());
}
