//! Session lifecycle tests on a paused clock

mod common;

use brandconnect_client::session::ActivityOutcome;
use brandconnect_client::{
    IdentityResolver, LoadingContext, SessionEvent, SessionManager, SessionPhase, UserRole,
};
use brandconnect_core::{ActivityKind, AuthProvider, SessionConfig};
use common::{session, settle, FakeAuth, FakeQuery};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

const MINUTE: Duration = Duration::from_secs(60);

async fn started(config: SessionConfig) -> (Arc<FakeAuth>, SessionManager) {
    let auth = FakeAuth::new(Some(session("u-1", json!({ "user_type": "client" }))));
    let manager = SessionManager::new(auth.clone(), config).unwrap();
    manager.start().await.unwrap();
    (auth, manager)
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return out,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_warning_then_expiry_signs_out() {
    let auth = FakeAuth::new(Some(session("u-1", json!({ "user_type": "client" }))));
    let manager = SessionManager::new(auth.clone(), SessionConfig::standard()).unwrap();
    let mut events = manager.subscribe();
    manager.start().await.unwrap();

    assert_eq!(manager.phase(), SessionPhase::Active);
    assert!(manager.state().is_active);
    assert!(matches!(
        drain(&mut events).as_slice(),
        [SessionEvent::Started { role: UserRole::Client, .. }]
    ));

    sleep(54 * MINUTE).await;
    assert_eq!(manager.phase(), SessionPhase::Active);
    assert!(!manager.is_session_expiring_soon());

    sleep(MINUTE + Duration::from_secs(1)).await;
    assert_eq!(manager.phase(), SessionPhase::Warning);
    assert!(manager.state().warning_shown);
    assert!(manager.is_session_expiring_soon());
    assert_eq!(manager.formatted_time_until_expiry(), "4m 59s");
    match drain(&mut events).as_slice() {
        [SessionEvent::WarningIssued { remaining }] => {
            assert!(*remaining <= 5 * MINUTE && *remaining > 4 * MINUTE)
        }
        other => panic!("expected a single warning, got {other:?}"),
    }

    sleep(5 * MINUTE).await;
    assert_eq!(manager.phase(), SessionPhase::Inactive);
    assert!(!manager.state().is_active);
    assert_eq!(manager.time_until_expiry(), Duration::ZERO);
    assert_eq!(auth.sign_outs(), 1);
    assert!(!auth.has_session());

    let events = drain(&mut events);
    assert!(events.contains(&SessionEvent::Expired {
        redirect_to: "/login?reason=session_expired".to_string()
    }));
    assert!(!events.contains(&SessionEvent::SignedOut));
}

#[tokio::test(start_paused = true)]
async fn test_activity_after_warning_extends_and_cancels_expiry() {
    let (auth, manager) = started(SessionConfig::standard()).await;
    let mut events = manager.subscribe();

    sleep(56 * MINUTE).await;
    assert_eq!(manager.phase(), SessionPhase::Warning);

    let outcome = manager.record_activity(ActivityKind::Click).await;
    assert_eq!(outcome, ActivityOutcome::Extended);
    assert_eq!(auth.refreshes(), 1);
    assert_eq!(manager.phase(), SessionPhase::Active);
    assert!(!manager.state().warning_shown);

    // Past the original deadline
    sleep(4 * MINUTE + Duration::from_secs(1)).await;
    assert_eq!(manager.phase(), SessionPhase::Active);
    assert_eq!(auth.sign_outs(), 0);
    assert_eq!(manager.time_until_expiry(), 56 * MINUTE - Duration::from_secs(1));

    let events = drain(&mut events);
    assert!(matches!(
        events.as_slice(),
        [SessionEvent::WarningIssued { .. }, SessionEvent::Extended { .. }]
    ));

    sleep(56 * MINUTE).await;
    assert_eq!(manager.phase(), SessionPhase::Inactive);
    assert_eq!(auth.sign_outs(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_extension_keeps_original_deadline() {
    let (auth, manager) = started(SessionConfig::standard()).await;
    auth.fail_refresh.store(true, std::sync::atomic::Ordering::SeqCst);
    let mut events = manager.subscribe();

    sleep(56 * MINUTE).await;
    let outcome = manager.record_activity(ActivityKind::KeyPress).await;
    assert_eq!(outcome, ActivityOutcome::ExtensionFailed);

    // No forced logout on a refresh error
    assert_eq!(manager.phase(), SessionPhase::Warning);
    assert_eq!(auth.sign_outs(), 0);
    assert!(drain(&mut events).iter().any(|event| matches!(
        event,
        SessionEvent::ExtensionFailed { recoverable: true, .. }
    )));

    assert_err!(manager.extend_session().await);
    assert_eq!(auth.refreshes(), 2);

    sleep(4 * MINUTE + Duration::from_secs(1)).await;
    assert_eq!(manager.phase(), SessionPhase::Inactive);
    assert_eq!(auth.sign_outs(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_activity_is_throttled_and_filtered() {
    let mut config = SessionConfig::standard();
    config.activity_events = vec![ActivityKind::KeyPress, ActivityKind::Click];
    let (auth, manager) = started(config).await;

    sleep(10 * MINUTE).await;
    assert_eq!(manager.record_activity(ActivityKind::Click).await, ActivityOutcome::Recorded);
    assert_eq!(manager.record_activity(ActivityKind::Click).await, ActivityOutcome::Throttled);
    assert_eq!(manager.record_activity(ActivityKind::Scroll).await, ActivityOutcome::Ignored);

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(manager.record_activity(ActivityKind::KeyPress).await, ActivityOutcome::Recorded);

    // Early in the window activity is only recorded
    assert_eq!(auth.refreshes(), 0);

    sleep(30 * MINUTE).await;
    assert_eq!(manager.record_activity(ActivityKind::Click).await, ActivityOutcome::Extended);
    assert_eq!(auth.refreshes(), 1);
    assert_eq!(manager.time_until_expiry(), 60 * MINUTE);
}

#[tokio::test(start_paused = true)]
async fn test_sensitive_preset_requires_explicit_extension() {
    let (auth, manager) = started(SessionConfig::sensitive()).await;

    sleep(13 * MINUTE + Duration::from_secs(30)).await;
    assert_eq!(manager.phase(), SessionPhase::Warning);
    assert_eq!(manager.record_activity(ActivityKind::Click).await, ActivityOutcome::Ignored);
    assert_eq!(auth.refreshes(), 0);

    assert_ok!(manager.extend_session().await);
    assert_eq!(auth.refreshes(), 1);
    assert_eq!(manager.phase(), SessionPhase::Active);
    assert_eq!(manager.time_until_expiry(), 15 * MINUTE);
}

#[tokio::test(start_paused = true)]
async fn test_force_logout_cancels_timers() {
    let (auth, manager) = started(SessionConfig::standard()).await;
    let mut events = manager.subscribe();

    sleep(10 * MINUTE).await;
    manager.force_logout().await.unwrap();
    assert_eq!(manager.phase(), SessionPhase::Inactive);
    assert!(manager.identity().is_none());
    assert_eq!(auth.sign_outs(), 1);

    sleep(60 * MINUTE).await;
    assert_eq!(auth.sign_outs(), 1);
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::LoggedOut { clean: true }]
    );

    assert!(manager.extend_session().await.is_err());
    assert_eq!(manager.record_activity(ActivityKind::Click).await, ActivityOutcome::Ignored);
}

#[tokio::test(start_paused = true)]
async fn test_warnings_can_be_disabled() {
    let mut config = SessionConfig::standard();
    config.show_warnings = false;
    let (auth, manager) = started(config).await;
    let mut events = manager.subscribe();

    sleep(59 * MINUTE).await;
    assert_eq!(manager.phase(), SessionPhase::Active);

    sleep(MINUTE + Duration::from_secs(1)).await;
    assert_eq!(manager.phase(), SessionPhase::Inactive);
    assert_eq!(auth.sign_outs(), 1);
    assert!(matches!(drain(&mut events).as_slice(), [SessionEvent::Expired { .. }]));
}

#[tokio::test(start_paused = true)]
async fn test_provider_sign_in_and_sign_out_events() {
    let auth = FakeAuth::new(None);
    let manager = SessionManager::new(auth.clone(), SessionConfig::standard()).unwrap();
    let mut events = manager.subscribe();
    manager.start().await.unwrap();
    assert_eq!(manager.phase(), SessionPhase::Inactive);

    auth.sign_in(session("u-9", json!({ "user_type": "creative", "full_name": "Ada" })));
    settle().await;
    assert_eq!(manager.phase(), SessionPhase::Active);
    let identity = manager.identity().unwrap();
    assert_eq!(identity.role, UserRole::Creative);
    assert_eq!(identity.display_name, "Ada");

    auth.sign_out().await.unwrap();
    settle().await;
    assert_eq!(manager.phase(), SessionPhase::Inactive);

    let events = drain(&mut events);
    assert!(matches!(events.first(), Some(SessionEvent::Started { .. })));
    assert_eq!(events.last(), Some(&SessionEvent::SignedOut));

    // Timers from the signed-out session never fire
    sleep(61 * MINUTE).await;
    assert_eq!(auth.sign_outs(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_role_resolved_from_profile_tables() {
    let query = FakeQuery::new();
    query.set_rows(
        "creative_profiles",
        vec![json!({ "user_id": "u-2", "title": "Photographer", "approval_status": "pending" })],
    );

    let auth = FakeAuth::new(Some(session("u-2", json!({}))));
    let manager = SessionManager::new(auth.clone(), SessionConfig::standard())
        .unwrap()
        .with_identity_resolver(IdentityResolver::new(query.clone()));
    manager.start().await.unwrap();

    let identity = manager.snapshot().identity.unwrap();
    assert_eq!(identity.role, UserRole::Creative);
    assert_eq!(identity.display_name, "Photographer");
    assert!(!identity.approved);
    assert_eq!(identity.role.home_path(), "/dashboard/creative");

    let tables: Vec<_> = query.queries().into_iter().map(|q| q.table).collect();
    assert_eq!(tables, vec!["client_profiles", "creative_profiles"]);
}

#[tokio::test(start_paused = true)]
async fn test_admin_metadata_skips_profile_lookup() {
    let query = FakeQuery::new();
    let auth = FakeAuth::new(Some(session("root", json!({ "role": "admin" }))));
    let manager = SessionManager::new(auth, SessionConfig::standard())
        .unwrap()
        .with_identity_resolver(IdentityResolver::new(query.clone()));
    manager.start().await.unwrap();

    assert_eq!(manager.identity().unwrap().role, UserRole::Admin);
    assert!(query.queries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unusable_stored_session_is_cleared() {
    let auth = FakeAuth::new(Some(session("u-1", json!({}))));
    auth.fail_current_session
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let loading = LoadingContext::new();
    let manager = SessionManager::new(auth.clone(), SessionConfig::standard())
        .unwrap()
        .with_loading(loading.clone());

    assert!(manager.start().await.is_err());
    assert_eq!(manager.phase(), SessionPhase::Inactive);
    assert_eq!(auth.sign_outs(), 1);
    assert!(!loading.snapshot().is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_force_logout_discards_extension_in_flight() {
    let (auth, manager) = started(SessionConfig::standard()).await;
    let manager = Arc::new(manager);
    let mut events = manager.subscribe();

    sleep(56 * MINUTE).await;
    auth.refresh_gate.hold();
    let extension = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.extend_session().await }
    });
    settle().await;
    assert_eq!(auth.refreshes(), 1);

    manager.force_logout().await.unwrap();
    auth.refresh_gate.release();
    assert_err!(extension.await.unwrap());

    assert_eq!(manager.phase(), SessionPhase::Inactive);
    assert!(!drain(&mut events)
        .iter()
        .any(|event| matches!(event, SessionEvent::Extended { .. })));

    sleep(61 * MINUTE).await;
    assert_eq!(auth.sign_outs(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_session_can_extend_after_stale_refresh() {
    let (auth, manager) = started(SessionConfig::standard()).await;
    let manager = Arc::new(manager);

    sleep(56 * MINUTE).await;
    auth.refresh_gate.hold();
    let extension = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.extend_session().await }
    });
    settle().await;

    manager.force_logout().await.unwrap();
    auth.sign_in(session("u-1", json!({ "user_type": "client" })));
    settle().await;
    assert_eq!(manager.phase(), SessionPhase::Active);

    auth.refresh_gate.release();
    assert_err!(extension.await.unwrap());
    assert_eq!(manager.phase(), SessionPhase::Active);

    assert_ok!(manager.extend_session().await);
    assert_eq!(auth.refreshes(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_start_awaits_provider() {
    let auth = FakeAuth::new(Some(session("u-1", json!({ "user_type": "client" }))));
    let manager = Arc::new(SessionManager::new(auth.clone(), SessionConfig::standard()).unwrap());
    let mut events = manager.subscribe();

    auth.session_gate.hold();
    let start = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.start().await }
    });
    settle().await;

    manager.shutdown();
    auth.session_gate.release();
    assert_ok!(start.await.unwrap());

    assert_eq!(manager.phase(), SessionPhase::Inactive);
    assert!(manager.identity().is_none());
    assert!(drain(&mut events).is_empty());

    sleep(61 * MINUTE).await;
    assert_eq!(auth.sign_outs(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_logout_while_resolving_identity_discards_activation() {
    let query = FakeQuery::new();
    let auth = FakeAuth::new(Some(session("u-1", json!({}))));
    let manager = Arc::new(
        SessionManager::new(auth.clone(), SessionConfig::standard())
            .unwrap()
            .with_identity_resolver(IdentityResolver::new(query.clone())),
    );

    query.gate.hold();
    let start = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.start().await }
    });
    settle().await;
    assert_eq!(query.queries().len(), 1);

    manager.force_logout().await.unwrap();
    query.gate.release();
    assert_ok!(start.await.unwrap());
    settle().await;

    assert_eq!(manager.phase(), SessionPhase::Inactive);
    assert!(manager.identity().is_none());
    sleep(61 * MINUTE).await;
    assert_eq!(auth.sign_outs(), 1);
}

#[tokio::test]
async fn test_inconsistent_config_rejected() {
    let auth = FakeAuth::new(None);
    let mut config = SessionConfig::standard();
    config.warning_minutes = 60;
    assert!(SessionManager::new(auth, config).is_err());
}
