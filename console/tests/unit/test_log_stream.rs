//! LogStreamClient tests

use std::time::Duration;

use updater_console::logstream::streamer::StreamItem;
use updater_console::view::memory::ViewOp;
use updater_console::view::LineLevel;

use crate::support::{fast_options, wait_until, Harness};

fn texts(h: &Harness) -> Vec<String> {
    h.view.log_lines().into_iter().map(|l| l.text).collect()
}

#[tokio::test]
async fn test_attach_renders_events() {
    let h = Harness::new(fast_options(1));
    h.state.logs.attach("dep-1");

    assert_eq!(h.view.log_target().as_deref(), Some("dep-1"));
    let lines = h.view.log_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].text.ends_with("connecting to log stream..."));

    assert!(h
        .streamer
        .message("dep-1", r#"{"time":"12:00:00","level":"warn","text":"disk almost full"}"#));
    assert!(h.streamer.message("dep-1", "raw line"));
    wait_until(|| h.view.log_lines().len() == 3).await;

    let lines = h.view.log_lines();
    assert_eq!(lines[1].level, LineLevel::Warn);
    assert_eq!(lines[1].text, "[12:00:00] [warn] disk almost full");
    assert_eq!(lines[2].level, LineLevel::Plain);
    assert_eq!(lines[2].text, "raw line");
}

#[tokio::test]
async fn test_switching_deployment_drops_old_stream() {
    let h = Harness::new(fast_options(1));
    h.state.logs.attach("a");
    h.streamer.message("a", "from a");
    wait_until(|| texts(&h).contains(&"from a".to_string())).await;

    h.state.logs.attach("b");
    assert_eq!(h.state.logs.current().as_deref(), Some("b"));
    assert_eq!(h.streamer.opened(), vec!["a".to_string(), "b".to_string()]);

    // Late events of the old stream never reach the panel
    h.streamer.message("a", "late from a");
    h.streamer.message("b", "from b");
    wait_until(|| texts(&h).contains(&"from b".to_string())).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let lines = texts(&h);
    assert!(!lines.iter().any(|l| l.contains("from a")));
    assert_eq!(lines.len(), 2);

    // The panel was reset before the new stream's first line
    let ops = h.view.ops();
    let reset = ops
        .iter()
        .position(|op| *op == ViewOp::ResetLog(Some("b".to_string())))
        .unwrap();
    let first_b = ops
        .iter()
        .position(|op| *op == ViewOp::AppendLog("from b".to_string()))
        .unwrap();
    assert!(reset < first_b);
}

#[tokio::test]
async fn test_transport_error_keeps_stream_open() {
    let h = Harness::new(fast_options(1));
    h.state.logs.attach("dep-2");

    h.streamer
        .send("dep-2", StreamItem::Error("connection reset".to_string()));
    h.streamer.message("dep-2", "after reconnect");
    wait_until(|| h.view.log_lines().len() == 3).await;

    let lines = h.view.log_lines();
    assert_eq!(lines[1].level, LineLevel::Warn);
    assert!(lines[1].text.contains("log connection interrupted"));
    assert_eq!(lines[2].text, "after reconnect");
    assert_eq!(h.state.logs.current().as_deref(), Some("dep-2"));
}

#[tokio::test]
async fn test_blank_id_is_ignored() {
    let h = Harness::new(fast_options(1));
    h.state.logs.attach("dep-3");
    h.state.logs.attach("   ");

    assert_eq!(h.state.logs.current().as_deref(), Some("dep-3"));
    assert_eq!(h.streamer.opened(), vec!["dep-3".to_string()]);
}

#[tokio::test]
async fn test_detach_keeps_rendered_lines() {
    let h = Harness::new(fast_options(1));
    h.state.logs.attach("dep-4");
    h.streamer.message("dep-4", "one");
    wait_until(|| h.view.log_lines().len() == 2).await;

    h.state.logs.detach();
    assert_eq!(h.state.logs.current(), None);
    h.streamer.message("dep-4", "two");
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(texts(&h).len(), 2);
    // Nothing attached: returns at once
    h.state.logs.wait().await;
}

#[tokio::test]
async fn test_wait_resolves_when_stream_ends() {
    let h = Harness::new(fast_options(1));
    h.state.logs.attach("dep-5");

    let waiter = async {
        h.state.logs.wait().await;
        h.view.log_lines().len()
    };
    let closer = async {
        h.streamer.message("dep-5", "last words");
        wait_until(|| h.view.log_lines().len() == 2).await;
        h.streamer.close("dep-5");
    };
    let (rendered, ()) = tokio::time::timeout(Duration::from_secs(2), async {
        tokio::join!(waiter, closer)
    })
    .await
    .unwrap();
    assert_eq!(rendered, 2);
}
