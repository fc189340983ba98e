//! ChangesViewer tests

use serde_json::json;

use updater_console::deployments::changes::{MSG_LOADING, NO_FILE_CHANGES};
use updater_console::errors::ConsoleError;
use updater_console::models::forms::PreviewForm;
use updater_console::view::memory::ViewOp;
use updater_console::view::{Listing, Panel};
use updater_console::workflow::upload::MSG_NO_PACKAGE;

use crate::support::{package_file, Harness, Op, Reply};

fn rules(listing: &Listing<String>) -> Vec<String> {
    match listing {
        Listing::Items(items) => items.clone(),
        Listing::Placeholder(text) => vec![format!("<{}>", text)],
    }
}

#[tokio::test]
async fn test_show_renders_record() {
    let h = Harness::loaded().await;
    h.api.push(
        Op::FetchDeployment,
        Reply::ok(
            json!({
                "id": "dep-9",
                "type": "upload",
                "version": "1.2.4",
                "project_id": "web",
                "project_name": "Website",
                "status": "success",
                "replace_mode": "partial",
                "replace_ignore": ["config/", " "],
                "changed": [
                    {"path": "index.html", "action": "updated", "size": 2048},
                    {"path": "old.js", "action": "deleted", "size": 99},
                    {"path": "", "action": "added"},
                ],
            })
            .to_string(),
        ),
    );

    let changes = h.state.changes.show(" dep-9 ").await.unwrap().unwrap();
    assert_eq!(
        h.api.calls_to(Op::FetchDeployment)[0].target.as_deref(),
        Some("dep-9")
    );

    let ops = h.view.ops();
    let opened = ops
        .iter()
        .position(|op| *op == ViewOp::OpenChanges("changes - dep-9".to_string()))
        .unwrap();
    assert_eq!(ops[opened + 1], ViewOp::ChangesSubtitle(MSG_LOADING.to_string()));
    assert_eq!(ops[opened + 2], ViewOp::RenderChanges);

    assert_eq!(
        changes.header,
        "project: Website | type: upload | version: 1.2.4 | status: success | mode: partial"
    );
    assert_eq!(rules(&changes.ignore_rules), vec!["config/"]);

    let Listing::Items(rows) = &changes.files else {
        panic!("expected file rows");
    };
    assert_eq!(rows[0].size.as_deref(), Some("2.0 KiB"));
    assert_eq!(rows[1].size, None);
    assert_eq!(rows[2].path, "-");
    assert_eq!(rows[2].size.as_deref(), Some("0 B"));
    assert_eq!(changes.summary, None);
    assert_eq!(h.view.changes(), Some(changes));
}

#[tokio::test]
async fn test_show_falls_back_to_project_rules() {
    let h = Harness::loaded().await;

    // Record of a cached project without its own snapshot
    h.api.push(
        Op::FetchDeployment,
        Reply::ok(json!({"id": "d1", "project_id": "api", "replace_ignore": []}).to_string()),
    );
    let changes = h.state.changes.show("d1").await.unwrap().unwrap();
    assert_eq!(rules(&changes.ignore_rules), vec!["api.env"]);

    // Unknown project: the active one stands in
    h.api.push(
        Op::FetchDeployment,
        Reply::ok(json!({"id": "d2", "project_id": "gone"}).to_string()),
    );
    let changes = h.state.changes.show("d2").await.unwrap().unwrap();
    assert_eq!(rules(&changes.ignore_rules), vec!["web.env"]);
    assert_eq!(
        changes.header,
        "project: gone | type: - | version: - | status: - | mode: -"
    );
    assert_eq!(
        changes.files,
        Listing::Placeholder(NO_FILE_CHANGES.to_string())
    );
}

#[tokio::test]
async fn test_show_failures_only_touch_subtitle() {
    let h = Harness::loaded().await;

    h.api.push(Op::FetchDeployment, Reply::status(404, "not found"));
    let result = h.state.changes.show("missing").await;
    assert!(matches!(result, Err(ConsoleError::ServerError { status: 404, .. })));
    assert_eq!(h.view.changes_subtitle().as_deref(), Some("failed to load (404)"));
    assert_eq!(h.view.changes(), None);

    h.api.push(Op::FetchDeployment, Reply::ok("{not json"));
    let result = h.state.changes.show("broken").await;
    assert!(matches!(result, Err(ConsoleError::ParseError(_))));
    assert_eq!(h.view.changes_subtitle().as_deref(), Some("failed to load"));

    h.api.push(Op::FetchDeployment, Reply::Network);
    let _ = h.state.changes.show("offline").await;
    assert_eq!(h.view.changes_subtitle().as_deref(), Some("failed to load"));
}

#[tokio::test]
async fn test_show_blank_id_does_nothing() {
    let h = Harness::loaded().await;
    assert_eq!(h.state.changes.show("  ").await.unwrap(), None);
    assert_eq!(h.api.count(Op::FetchDeployment), 0);
    assert_eq!(h.view.changes_title(), None);
}

#[tokio::test]
async fn test_preview_renders_summary() {
    let h = Harness::loaded().await;
    h.api.push(
        Op::Preview,
        Reply::ok(
            json!({
                "project_id": "web",
                "project_name": "Website",
                "replace_mode": "full",
                "changed": [{"path": "app.js", "action": "added", "size": 10}],
                "replace_ignore": [],
                "summary": {"total": 3, "added": 1, "updated": 0, "deleted": 0, "ignored_paths": 2},
            })
            .to_string(),
        ),
    );
    let (_dir, path) = package_file("site.zip", 128);

    let form = PreviewForm {
        package: Some(path),
        project_id: None,
        replace_mode: Some("PARTIAL".to_string()),
    };
    let changes = h.state.changes.preview(&form).await.unwrap();

    let call = &h.api.calls_to(Op::Preview)[0];
    assert_eq!(call.field("project_id"), Some("web"));
    assert_eq!(call.field("replace_mode"), Some("partial"));

    assert_eq!(h.view.changes_title().as_deref(), Some("preview - web"));
    assert_eq!(
        changes.header,
        "project: Website | type: preview | version: - | status: preview | mode: full"
    );
    assert_eq!(rules(&changes.ignore_rules), vec!["web.env"]);
    assert_eq!(
        changes.summary.as_deref(),
        Some("total 3 | added 1 | updated 0 | deleted 0 | ignored 2")
    );
    assert_eq!(h.view.message(Panel::Preview).as_deref(), Some("preview ready"));
    assert_eq!(h.view.progress(Panel::Preview).last(), Some(&100));
}

#[tokio::test]
async fn test_preview_failures() {
    let h = Harness::loaded().await;

    let result = h.state.changes.preview(&PreviewForm::default()).await;
    assert!(matches!(result, Err(ConsoleError::ValidationError(_))));
    assert_eq!(h.view.message(Panel::Preview).as_deref(), Some(MSG_NO_PACKAGE));
    assert_eq!(h.api.count(Op::Preview), 0);

    let (_dir, path) = package_file("site.zip", 128);
    let form = PreviewForm {
        package: Some(path),
        ..Default::default()
    };

    h.api.push(Op::Preview, Reply::status(422, ""));
    let _ = h.state.changes.preview(&form).await;
    assert_eq!(h.view.message(Panel::Preview).as_deref(), Some("preview failed (422)"));

    h.api.push(Op::Preview, Reply::Network);
    let result = h.state.changes.preview(&form).await;
    assert!(matches!(result, Err(ConsoleError::NetworkError(_))));
    assert_eq!(
        h.view.message(Panel::Preview).as_deref(),
        Some("network error, preview failed")
    );
    assert_eq!(h.view.changes_title(), None);
}
