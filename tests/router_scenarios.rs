//! End-to-end scenarios through the command router
//!
//! Each test walks one of the full request flows: contention, ownership
//! enforcement, forced release, vanished clients, lockout, and ordered
//! delivery. The router is wired with the in-memory store and the real
//! Argon2 hasher and HS256 signer.

use std::sync::Arc;
use std::thread;

use scribelock::audit::AuditAction;
use scribelock::bus::{Event, WriterTransition};
use scribelock::config::ServiceConfig;
use scribelock::router::{CommandRouter, ErrorKind};

fn build_router(config: ServiceConfig) -> Arc<CommandRouter> {
    CommandRouter::build(&config).unwrap()
}

fn default_router() -> Arc<CommandRouter> {
    build_router(ServiceConfig {
        seed_admin_password: Some("adminpass1".to_string()),
        ..ServiceConfig::default()
    })
}

fn register(router: &CommandRouter, username: &str, role: &str) -> String {
    let envelope = router.handle(&format!(
        r#"{{"command":"register","username":"{}","password":"password1","role":"{}"}}"#,
        username, role
    ));
    assert!(envelope.ok, "register {} failed: {:?}", username, envelope.error);
    envelope.data.unwrap()["token"].as_str().unwrap().to_string()
}

fn login(router: &CommandRouter, username: &str, password: &str) -> String {
    let envelope = router.handle(&format!(
        r#"{{"command":"login","username":"{}","password":"{}"}}"#,
        username, password
    ));
    assert!(envelope.ok, "login {} failed: {:?}", username, envelope.error);
    envelope.data.unwrap()["token"].as_str().unwrap().to_string()
}

// =========================================================================
// S1: Contention - exactly one concurrent acquirer wins
// =========================================================================

#[test]
fn s1_concurrent_acquire_has_exactly_one_winner() {
    let router = default_router();
    let token1 = register(&router, "writer1", "writer");
    let token2 = register(&router, "writer2", "writer");

    let results: Vec<_> = [token1, token2]
        .into_iter()
        .map(|token| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                router.handle(&format!(
                    r#"{{"command":"acquire_writer","token":"{}"}}"#,
                    token
                ))
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter(|e| e.ok).collect();
    let losers: Vec<_> = results.iter().filter(|e| !e.ok).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(losers.len(), 1);

    let winner = winners[0].data.as_ref().unwrap()["owner"].as_str().unwrap().to_string();
    let error = losers[0].error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::SemaphoreUnavailable);
    assert!(error.message.contains(&winner), "loser must learn the winner");

    // Exactly one ACQUIRE entry landed in the audit log.
    let acquires = router
        .audit_log()
        .list(1, 100)
        .unwrap()
        .items
        .iter()
        .filter(|e| e.action == AuditAction::Acquire)
        .count();
    assert_eq!(acquires, 1);
}

// =========================================================================
// S2: Ownership enforcement - non-holders cannot mutate
// =========================================================================

#[test]
fn s2_non_holder_mutation_rejected_without_audit_entry() {
    let router = default_router();
    let token1 = register(&router, "writer1", "writer");
    let token2 = register(&router, "writer2", "writer");

    assert!(router
        .handle(&format!(
            r#"{{"command":"acquire_writer","token":"{}"}}"#,
            token1
        ))
        .ok);

    let envelope = router.handle(&format!(
        r#"{{"command":"create_message","token":"{}","body":"hi"}}"#,
        token2
    ));
    assert!(!envelope.ok);
    assert_eq!(envelope.error.unwrap().kind, ErrorKind::SemaphoreNotHeld);

    // The rejected call wrote no CREATE entry.
    let creates = router
        .audit_log()
        .list(1, 100)
        .unwrap()
        .items
        .iter()
        .filter(|e| e.action == AuditAction::Create)
        .count();
    assert_eq!(creates, 0);
}

// =========================================================================
// S3: Forced release by admin toggle
// =========================================================================

#[test]
fn s3_disable_force_releases_holder_in_order() {
    let router = default_router();
    let writer_token = register(&router, "writer1", "writer");
    let admin_token = login(&router, "admin", "adminpass1");

    let subscription = router.subscribe(&writer_token).unwrap();
    subscription.poll(); // initial snapshot

    assert!(router
        .handle(&format!(
            r#"{{"command":"acquire_writer","token":"{}"}}"#,
            writer_token
        ))
        .ok);

    let envelope = router.handle(&format!(
        r#"{{"command":"set_writer_enabled","token":"{}","enabled":false}}"#,
        admin_token
    ));
    assert!(envelope.ok);
    assert_eq!(envelope.data.unwrap()["writer_enabled"], false);

    let status = router.writer_lock().status();
    assert_eq!(status.lock_value, 1);
    assert!(status.holder.is_none());
    assert!(!status.writer_enabled);

    // Audit order: ADMIN_FORCE_RELEASE(writer1) then ADMIN_TOGGLE(admin).
    let mut entries = router.audit_log().list(1, 100).unwrap().items;
    entries.reverse();
    let tail: Vec<_> = entries
        .iter()
        .filter(|e| {
            matches!(
                e.action,
                AuditAction::AdminForceRelease | AuditAction::AdminToggle
            )
        })
        .collect();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].action, AuditAction::AdminForceRelease);
    assert_eq!(tail[0].principal.as_deref(), Some("writer1"));
    assert_eq!(tail[1].action, AuditAction::AdminToggle);
    assert_eq!(tail[1].principal.as_deref(), Some("admin"));

    // Event order: acquired, forced(writer1), admin_toggle(disabled).
    let events = subscription.poll().events;
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[1],
        Event::WriterChanged {
            event: WriterTransition::Forced,
            principal,
            ..
        } if principal == "writer1"
    ));
    assert!(matches!(
        events[2],
        Event::AdminToggle { enabled: false, .. }
    ));
}

// =========================================================================
// S4: Client vanished - grace expiry releases the lock
// =========================================================================

#[test]
fn s4_vanished_client_releases_lock() {
    // Zero grace so the sweep can fire without waiting 30 seconds.
    let router = build_router(ServiceConfig {
        grace_secs: 0,
        ..ServiceConfig::default()
    });
    let writer_token = register(&router, "writer1", "writer");
    let observer_token = register(&router, "observer", "reader");

    let writer_sub = router.subscribe(&writer_token).unwrap();
    let observer_sub = router.subscribe(&observer_token).unwrap();
    observer_sub.poll();

    assert!(router
        .handle(&format!(
            r#"{{"command":"acquire_writer","token":"{}"}}"#,
            writer_token
        ))
        .ok);

    // The writer's only subscription closes, then the grace window passes
    // with no further requests.
    router.unsubscribe(&writer_sub);
    thread::sleep(std::time::Duration::from_millis(20));
    let vanished = router.sweep_presence();
    assert!(vanished.contains(&"writer1".to_string()));

    let status = router.writer_lock().status();
    assert_eq!(status.lock_value, 1);
    assert!(status.holder.is_none());

    // Audit records the reason.
    let entries = router.audit_log().list(1, 100).unwrap().items;
    let release = entries
        .iter()
        .find(|e| e.action == AuditAction::Release)
        .unwrap();
    assert!(release.content.contains("reason=client-gone"));
    assert_eq!(release.principal.as_deref(), Some("writer1"));

    // Other subscribers observe the release.
    let events = observer_sub.poll().events;
    assert!(events.iter().any(|e| matches!(
        e,
        Event::WriterChanged {
            event: WriterTransition::Released,
            principal,
            ..
        } if principal == "writer1"
    )));
}

// =========================================================================
// S5: Lockout after repeated failures
// =========================================================================

#[test]
fn s5_lockout_after_five_failures() {
    let router = default_router();
    register(&router, "reader1", "reader");

    for attempt in 1..=5 {
        let envelope = router
            .handle(r#"{"command":"login","username":"reader1","password":"wrongpass0"}"#);
        assert!(!envelope.ok);
        assert_eq!(
            envelope.error.unwrap().kind,
            ErrorKind::InvalidCredentials,
            "attempt {} should report invalid credentials",
            attempt
        );
    }

    // Sixth attempt with the CORRECT password: still locked.
    let envelope =
        router.handle(r#"{"command":"login","username":"reader1","password":"password1"}"#);
    assert!(!envelope.ok);
    let error = envelope.error.unwrap();
    assert_eq!(error.kind, ErrorKind::AccountLocked);
    let retry_after = error.retry_after.unwrap();
    assert!((890..=900).contains(&retry_after), "retry_after was {}", retry_after);

    // The history shows the failures and the lockout transition.
    let entries = router.audit_log().list(1, 100).unwrap().items;
    let failed = entries
        .iter()
        .filter(|e| e.action == AuditAction::LoginFailed)
        .count();
    assert!(failed >= 5);
    assert!(entries.iter().any(|e| e.action == AuditAction::Lockout));
}

// =========================================================================
// S6: Ordered delivery to multiple subscribers
// =========================================================================

#[test]
fn s6_subscribers_see_identical_commit_order() {
    let router = default_router();
    let writer_token = register(&router, "writer1", "writer");
    let reader_token = register(&router, "reader1", "reader");

    let sub_a = router.subscribe(&writer_token).unwrap();
    let sub_b = router.subscribe(&reader_token).unwrap();

    for request in [
        format!(r#"{{"command":"acquire_writer","token":"{}"}}"#, writer_token),
        format!(
            r#"{{"command":"create_message","token":"{}","body":"a"}}"#,
            writer_token
        ),
        format!(
            r#"{{"command":"create_message","token":"{}","body":"b"}}"#,
            writer_token
        ),
        format!(r#"{{"command":"release_writer","token":"{}"}}"#, writer_token),
    ] {
        assert!(router.handle(&request).ok);
    }

    for sub in [&sub_a, &sub_b] {
        let events = sub.poll().events;
        assert_eq!(events.len(), 5, "initial snapshot plus four commits");
        assert!(matches!(events[0], Event::LockState { .. }));
        assert!(matches!(
            events[1],
            Event::WriterChanged {
                event: WriterTransition::Acquired,
                ..
            }
        ));
        assert!(matches!(&events[2], Event::MessageCreated { body, .. } if body == "a"));
        assert!(matches!(&events[3], Event::MessageCreated { body, .. } if body == "b"));
        assert!(matches!(
            events[4],
            Event::WriterChanged {
                event: WriterTransition::Released,
                ..
            }
        ));
    }
}

// =========================================================================
// Wire-level boundary checks
// =========================================================================

#[test]
fn pagination_boundaries_rejected_at_the_router() {
    let router = default_router();
    let token = register(&router, "reader1", "reader");

    let envelope = router.handle(&format!(
        r#"{{"command":"list_messages","token":"{}","page":0}}"#,
        token
    ));
    assert_eq!(envelope.error.unwrap().kind, ErrorKind::InvalidInput);

    let envelope = router.handle(&format!(
        r#"{{"command":"list_messages","token":"{}","limit":101}}"#,
        token
    ));
    assert_eq!(envelope.error.unwrap().kind, ErrorKind::InvalidInput);
}

#[test]
fn username_boundaries_rejected_at_the_router() {
    let router = default_router();

    let too_long = "x".repeat(51);
    for bad in ["ab", too_long.as_str()] {
        let envelope = router.handle(&format!(
            r#"{{"command":"register","username":"{}","password":"password1"}}"#,
            bad
        ));
        assert!(!envelope.ok);
        assert_eq!(envelope.error.unwrap().kind, ErrorKind::InvalidInput);
    }

    let max_len = "x".repeat(50);
    for good in ["abc", max_len.as_str()] {
        let envelope = router.handle(&format!(
            r#"{{"command":"register","username":"{}","password":"password1"}}"#,
            good
        ));
        assert!(envelope.ok, "username of length {} should register", good.len());
    }
}

#[test]
fn body_boundaries_rejected_at_the_router() {
    let router = default_router();
    let token = register(&router, "writer1", "writer");
    assert!(router
        .handle(&format!(
            r#"{{"command":"acquire_writer","token":"{}"}}"#,
            token
        ))
        .ok);

    let too_long = "x".repeat(2001);
    let envelope = router.handle(&format!(
        r#"{{"command":"create_message","token":"{}","body":"{}"}}"#,
        token, too_long
    ));
    assert_eq!(envelope.error.unwrap().kind, ErrorKind::InvalidInput);

    let exactly = "x".repeat(2000);
    let envelope = router.handle(&format!(
        r#"{{"command":"create_message","token":"{}","body":"{}"}}"#,
        token, exactly
    ));
    assert!(envelope.ok);
}
