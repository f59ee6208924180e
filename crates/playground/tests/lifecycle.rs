mod support;

use std::sync::{Arc, Mutex};

use playground::SessionLifecycle;
use support::{lock_unpoisoned, FakeSessionService};

#[tokio::test]
async fn bootstrap_failure_is_recorded_not_fatal() {
    let service = Arc::new(FakeSessionService {
        fail_bootstrap: true,
        ..FakeSessionService::default()
    });
    let mut lifecycle = SessionLifecycle::<()>::new(service.clone());

    assert!(!lifecycle.bootstrap().await);
    assert_eq!(lifecycle.session_error(), Some("bootstrap refused"));
    assert_eq!(*lock_unpoisoned(&service.bootstraps), 1);
}

#[tokio::test]
async fn cleanup_runs_teardowns_once_in_order() {
    let service = Arc::new(FakeSessionService::default());
    let mut lifecycle = SessionLifecycle::<Vec<&'static str>>::new(service.clone());
    assert!(lifecycle.bootstrap().await);
    assert_eq!(lifecycle.session_error(), None);

    lifecycle.register_teardown(|log: &mut Vec<&'static str>| log.push("stop session"));
    lifecycle.register_teardown(|log: &mut Vec<&'static str>| log.push("restore terminal"));

    let mut log = Vec::new();
    assert!(lifecycle.cleanup(&mut log).await);
    assert!(!lifecycle.cleanup(&mut log).await);

    assert_eq!(log, vec!["stop session", "restore terminal"]);
    assert_eq!(*lock_unpoisoned(&service.cleanups), 1);
    assert!(lifecycle.is_cleaned_up());
}

#[tokio::test]
async fn panicking_teardown_does_not_block_the_rest() {
    let service = Arc::new(FakeSessionService::default());
    let ran = Arc::new(Mutex::new(Vec::new()));
    let mut lifecycle = SessionLifecycle::<()>::new(service.clone());

    lifecycle.register_teardown(|_: &mut ()| panic!("teardown blew up"));
    let after = Arc::clone(&ran);
    lifecycle.register_teardown(move |_: &mut ()| lock_unpoisoned(&after).push("after"));

    lifecycle.cleanup(&mut ()).await;

    assert_eq!(*lock_unpoisoned(&ran), vec!["after"]);
    assert_eq!(*lock_unpoisoned(&service.cleanups), 1);
}

#[tokio::test]
async fn cleanup_request_failure_is_ignored() {
    let service = Arc::new(FakeSessionService {
        fail_cleanup: true,
        ..FakeSessionService::default()
    });
    let mut lifecycle = SessionLifecycle::<()>::new(service.clone());

    assert!(lifecycle.cleanup(&mut ()).await);
    assert_eq!(*lock_unpoisoned(&service.cleanups), 1);
}

#[tokio::test]
async fn finish_cleans_up_and_returns_a_failed_outcome() {
    let service = Arc::new(FakeSessionService::default());
    let mut lifecycle = SessionLifecycle::<Vec<&'static str>>::new(service.clone());
    lifecycle.register_teardown(|log: &mut Vec<&'static str>| log.push("stop session"));

    let mut log = Vec::new();
    let outcome: Result<(), &str> = lifecycle.finish(&mut log, Err("cat failed")).await;

    assert_eq!(outcome, Err("cat failed"));
    assert_eq!(log, vec!["stop session"]);
    assert_eq!(*lock_unpoisoned(&service.cleanups), 1);
    assert!(lifecycle.is_cleaned_up());
}
