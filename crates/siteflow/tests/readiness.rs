use std::sync::Arc;
use std::time::Duration;

use siteflow::error::ProvisionError;
use siteflow::poller::{ReadinessConfig, ReadinessPoller};
use siteflow::testing::FakeSourceHost;

fn config(max_attempts: u32) -> ReadinessConfig {
    ReadinessConfig {
        max_attempts,
        delay: Duration::from_millis(2),
        call_timeout: Duration::from_millis(200),
        ..ReadinessConfig::default()
    }
}

#[tokio::test]
async fn succeeds_within_k_plus_one_attempts() {
    for k in 1..5u32 {
        let host = Arc::new(FakeSourceHost::ready_after(k));
        let poller = ReadinessPoller::new(host.clone(), config(10));

        let ready = poller.wait_until_ready("sites/acme").await.unwrap();
        assert!(ready.attempts <= k + 1, "k={k} took {} attempts", ready.attempts);
        assert_eq!(ready.branch, "main");
        assert!(host.attempts() <= k + 1);
    }
}

#[tokio::test]
async fn falls_back_to_secondary_branch() {
    let host = Arc::new(FakeSourceHost::ready_after(2).ready_on_branch("master"));
    let poller = ReadinessPoller::new(host, config(10));

    let ready = poller.wait_until_ready("sites/acme").await.unwrap();
    assert_eq!(ready.branch, "master");
    assert_eq!(ready.attempts, 2);
}

#[tokio::test]
async fn gives_up_after_exactly_n_attempts() {
    let host = Arc::new(FakeSourceHost::never_ready());
    let poller = ReadinessPoller::new(host.clone(), config(4));

    let err = poller.wait_until_ready("sites/empty").await.unwrap_err();
    match err {
        ProvisionError::RepositoryNotReady {
            repository,
            branches,
            attempts,
        } => {
            assert_eq!(repository, "sites/empty");
            assert_eq!(branches, vec!["main".to_string(), "master".to_string()]);
            assert_eq!(attempts, 4);
        }
        other => panic!("expected RepositoryNotReady, got {other:?}"),
    }
    assert_eq!(host.attempts(), 4);
}

#[tokio::test]
async fn zero_attempts_still_tries_once() {
    let host = Arc::new(FakeSourceHost::never_ready());
    let poller = ReadinessPoller::new(host.clone(), config(0));

    assert!(poller.wait_until_ready("sites/empty").await.is_err());
    assert_eq!(host.attempts(), 1);
}

#[tokio::test]
async fn wait_is_bounded_by_attempts_times_delay() {
    let host = Arc::new(FakeSourceHost::never_ready());
    let poller = ReadinessPoller::new(
        host,
        ReadinessConfig {
            max_attempts: 3,
            delay: Duration::from_millis(20),
            ..config(3)
        },
    );

    let started = std::time::Instant::now();
    let _ = poller.wait_until_ready("sites/empty").await;
    let elapsed = started.elapsed();

    // Two sleeps between three attempts, none after the last.
    assert!(elapsed >= Duration::from_millis(40));
    assert!(elapsed < Duration::from_secs(2));
}
