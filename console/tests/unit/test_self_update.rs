//! SelfUpdateWorkflow tests

use std::time::Duration;

use serde_json::json;

use updater_console::cache::config::MSG_LOADED;
use updater_console::errors::ConsoleError;
use updater_console::models::forms::SelfUpdateForm;
use updater_console::view::memory::ViewOp;
use updater_console::view::Panel;
use updater_console::workflow::fsm::TransferState;
use updater_console::workflow::recovery::RecoveryOptions;
use updater_console::workflow::self_update::SelfUpdateOutcome;
use updater_console::workflow::upload::MSG_NO_PACKAGE;

use crate::support::{config_body, fast_options, package_file, wait_until, Harness, Op, Reply};

fn accepted(id: &str) -> Reply {
    Reply::ok(json!({"id": id, "version": "0.4.0"}).to_string())
}

async fn harness(max_attempts: u32) -> Harness {
    let h = Harness::new(fast_options(max_attempts));
    h.api.always(
        Op::FetchConfig,
        200,
        config_body(&[("web", "Website", Some("1.2.3"))], "web"),
    );
    h.state.store.load(None, false).await.unwrap();
    h
}

fn form(path: std::path::PathBuf) -> SelfUpdateForm {
    SelfUpdateForm {
        package: Some(path),
        target_version: "0.4.0".to_string(),
        note: "agent upgrade".to_string(),
    }
}

#[tokio::test]
async fn test_recovers_after_failed_checks() {
    let h = harness(5).await;
    h.api.push(Op::SelfUpdate, accepted("su-1"));
    h.api.push(Op::FetchConfig, Reply::Network);
    h.api.push(Op::FetchConfig, Reply::status(502, "bad gateway"));
    h.api.always(Op::Fragment, 200, "<ul></ul>");
    let (_dir, path) = package_file("updater", 64);
    let mut form = form(path);

    let outcome = h.state.self_update.submit(&mut form).await.unwrap();
    assert_eq!(
        outcome,
        SelfUpdateOutcome::Recovered {
            deployment_id: "su-1".to_string(),
            attempts: 3,
        }
    );

    let call = &h.api.calls_to(Op::SelfUpdate)[0];
    assert_eq!(call.field("target_version"), Some("0.4.0"));
    assert_eq!(call.field("note"), Some("agent upgrade"));
    assert!(form.package.is_none());

    // Resync: everything cleared, then a visible reload
    let ops = h.view.ops();
    let cleared = ops.iter().position(|op| *op == ViewOp::ClearConsole).unwrap();
    assert!(ops[cleared..].contains(&ViewOp::Message(Panel::Config, MSG_LOADED.to_string())));
    assert!(ops[cleared..].contains(&ViewOp::RenderDeployments));
    assert!(ops[..cleared].contains(&ViewOp::Message(
        Panel::SelfUpdate,
        "waiting for the service to restart (attempt 3/5)".to_string()
    )));

    assert_eq!(
        h.view.message(Panel::SelfUpdate).as_deref(),
        Some("self-update complete, service restarted")
    );
    assert_eq!(h.state.logs.current(), None);
    assert_eq!(h.state.store.active_project_id().as_deref(), Some("web"));
    assert_eq!(h.state.self_update.state(), Some(TransferState::Completed));
}

#[tokio::test]
async fn test_unauthorized_check_counts_as_recovered() {
    let h = harness(5).await;
    h.api.push(Op::SelfUpdate, accepted("su-2"));
    h.api.push(Op::FetchConfig, Reply::status(401, "session expired"));
    let (_dir, path) = package_file("updater", 64);

    let outcome = h.state.self_update.submit(&mut form(path)).await.unwrap();
    assert!(matches!(
        outcome,
        SelfUpdateOutcome::Recovered { attempts: 1, .. }
    ));
}

#[tokio::test]
async fn test_exhausted_poll_is_unconfirmed() {
    let h = harness(5).await;
    h.api.push(Op::SelfUpdate, accepted("su-3"));
    h.api.always(Op::FetchConfig, 503, "");
    let before = h.api.count(Op::FetchConfig);
    let (_dir, path) = package_file("updater", 64);

    let outcome = h.state.self_update.submit(&mut form(path)).await.unwrap();
    assert_eq!(
        outcome,
        SelfUpdateOutcome::Unconfirmed {
            deployment_id: "su-3".to_string(),
            attempts: 5,
        }
    );
    assert_eq!(h.api.count(Op::FetchConfig) - before, 5);
    assert_eq!(h.state.self_update.state(), Some(TransferState::Idle));
    // The log stream stays on the update so the operator can keep reading
    assert_eq!(h.state.logs.current().as_deref(), Some("su-3"));
}

#[tokio::test]
async fn test_recovery_within_ceiling() {
    let h = harness(60).await;
    h.api.push(Op::SelfUpdate, accepted("su-4"));
    for _ in 0..4 {
        h.api.push(Op::FetchConfig, Reply::status(503, ""));
    }
    let (_dir, path) = package_file("updater", 64);

    let outcome = h.state.self_update.submit(&mut form(path)).await.unwrap();
    assert!(matches!(
        outcome,
        SelfUpdateOutcome::Recovered { attempts: 5, .. }
    ));
}

#[tokio::test]
async fn test_full_ceiling_is_sixty_checks() {
    let h = harness(60).await;
    h.api.push(Op::SelfUpdate, accepted("su-6"));
    h.api.always(Op::FetchConfig, 502, "");
    let before = h.api.count(Op::FetchConfig);
    let (_dir, path) = package_file("updater", 64);

    let outcome = h.state.self_update.submit(&mut form(path)).await.unwrap();
    assert!(matches!(
        outcome,
        SelfUpdateOutcome::Unconfirmed { attempts: 60, .. }
    ));
    assert_eq!(h.api.count(Op::FetchConfig) - before, 60);
}

#[tokio::test]
async fn test_rejected_package_sends_no_checks() {
    let h = harness(5).await;
    h.api.push(
        Op::SelfUpdate,
        Reply::status(400, json!({"error": "not an executable"}).to_string()),
    );
    let before = h.api.count(Op::FetchConfig);
    let (_dir, path) = package_file("updater", 64);
    let mut form = form(path);

    let result = h.state.self_update.submit(&mut form).await;
    assert!(matches!(result, Err(ConsoleError::ServerError { status: 400, .. })));
    assert_eq!(
        h.view.message(Panel::SelfUpdate).as_deref(),
        Some("not an executable")
    );
    assert_eq!(h.api.count(Op::FetchConfig), before);
    assert!(form.package.is_some());
    assert_eq!(h.state.self_update.state(), Some(TransferState::Idle));

    h.api.push(Op::SelfUpdate, Reply::Network);
    let _ = h.state.self_update.submit(&mut form).await;
    assert_eq!(
        h.view.message(Panel::SelfUpdate).as_deref(),
        Some("network error, self-update failed")
    );

    let result = h.state.self_update.submit(&mut SelfUpdateForm::default()).await;
    assert!(matches!(result, Err(ConsoleError::ValidationError(_))));
    assert_eq!(
        h.view.message(Panel::SelfUpdate).as_deref(),
        Some(MSG_NO_PACKAGE)
    );
}

#[tokio::test]
async fn test_shutdown_cancels_poll() {
    let mut options = fast_options(1000);
    options.recovery = RecoveryOptions {
        interval: Duration::from_millis(20),
        max_attempts: 1000,
    };
    let h = Harness::new(options);
    h.api.push(Op::SelfUpdate, accepted("su-5"));
    h.api.always(Op::FetchConfig, 503, "");
    let (_dir, path) = package_file("updater", 64);
    let mut form = form(path);

    let running = h.state.self_update.submit(&mut form);
    let canceller = async {
        wait_until(|| {
            h.view
                .message(Panel::SelfUpdate)
                .map(|m| m.starts_with("waiting for the service to restart (attempt"))
                .unwrap_or(false)
        })
        .await;
        h.shutdown_tx.send(()).unwrap();
    };
    let (outcome, ()) = tokio::join!(running, canceller);

    match outcome.unwrap() {
        SelfUpdateOutcome::Cancelled {
            deployment_id,
            attempts,
        } => {
            assert_eq!(deployment_id, "su-5");
            assert!(attempts >= 1 && attempts < 1000);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}
