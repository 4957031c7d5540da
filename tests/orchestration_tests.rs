mod common;

use serde_json::json;

use common::{app, scan_body, StubTransport};
use droidscan::scanner::{SCAN_PATH, UNINSTALL_PATH};
use droidscan::{bulk_uninstall, BatchError, ScanController, ScanError, Selection};

fn uninstalled_packages(stub: &StubTransport) -> Vec<String> {
    stub.calls()
        .into_iter()
        .filter(|r| r.path == UNINSTALL_PATH)
        .map(|r| r.body.unwrap()["package"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_bulk_uninstall_stops_at_first_failure() {
    let c = ScanController::new(StubTransport::new());
    let stub = c.transport();
    stub.push_json(UNINSTALL_PATH, json!({"success": true}));
    stub.push_json(SCAN_PATH, scan_body("Pixel", vec![app("b", &[]), app("c", &[])]));
    stub.push_error(UNINSTALL_PATH, 400, "pm uninstall failed");

    let mut selection: Selection = ["a", "b", "c"].into_iter().collect();
    let err = bulk_uninstall(&c, &mut selection).await.unwrap_err();

    match err {
        BatchError::Failed {
            package,
            completed,
            source,
        } => {
            assert_eq!(package, "b");
            assert_eq!(completed, vec!["a"]);
            assert!(matches!(source, ScanError::Transport(_)));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(uninstalled_packages(stub), vec!["a", "b"], "c must never be attempted");
    assert_eq!(selection.packages(), ["b", "c"]);
    assert_eq!(c.snapshot().error.as_deref(), Some("pm uninstall failed"));
}

#[tokio::test]
async fn test_bulk_uninstall_is_sequential_with_refresh_between() {
    let c = ScanController::new(StubTransport::new());
    let stub = c.transport();
    stub.push_json(UNINSTALL_PATH, json!({"success": true}));
    stub.push_json(SCAN_PATH, scan_body("Pixel", vec![app("com.two", &[]), app("com.three", &[])]));
    stub.push_json(UNINSTALL_PATH, json!({"success": false, "response": "Failure"}));
    stub.push_json(SCAN_PATH, scan_body("Pixel", vec![app("com.two", &[]), app("com.three", &[])]));
    stub.push_json(UNINSTALL_PATH, json!({"success": true}));
    stub.push_json(SCAN_PATH, scan_body("Pixel", vec![app("com.two", &[])]));

    let mut selection = Selection::new();
    selection.toggle("com.one");
    selection.toggle("com.two");
    selection.toggle("com.three");

    let report = bulk_uninstall(&c, &mut selection).await.unwrap();
    assert_eq!(report.uninstalled, vec!["com.one", "com.two", "com.three"]);
    assert_eq!(report.rejected_by_device, vec!["com.two"]);
    assert!(selection.is_empty());

    assert_eq!(
        stub.paths(),
        vec![UNINSTALL_PATH, SCAN_PATH, UNINSTALL_PATH, SCAN_PATH, UNINSTALL_PATH, SCAN_PATH]
    );
    assert_eq!(uninstalled_packages(stub), vec!["com.one", "com.two", "com.three"]);

    let state = c.snapshot();
    assert_eq!(state.apps.len(), 1);
    assert!(!state.loading);
}

#[tokio::test]
async fn test_bulk_uninstall_refresh_failure_keeps_package_selected() {
    let c = ScanController::new(StubTransport::new());
    let stub = c.transport();
    stub.push_json(UNINSTALL_PATH, json!({"success": true}));
    stub.push_error(SCAN_PATH, 500, "scan crashed");

    let mut selection: Selection = ["com.a", "com.b"].into_iter().collect();
    let err = bulk_uninstall(&c, &mut selection).await.unwrap_err();

    assert!(matches!(
        err,
        BatchError::Failed { source: ScanError::Refresh { .. }, .. }
    ));
    assert_eq!(selection.packages(), ["com.a", "com.b"]);
}

#[tokio::test]
async fn test_bulk_uninstall_empty_selection_is_rejected() {
    let c = ScanController::new(StubTransport::new());
    let mut selection = Selection::new();

    let err = bulk_uninstall(&c, &mut selection).await.unwrap_err();
    assert!(matches!(err, BatchError::EmptySelection));
    assert!(c.transport().calls().is_empty());
    assert!(c.snapshot().error.is_none());
}

#[tokio::test]
async fn test_stale_selection_entries_are_inert() {
    let c = ScanController::new(StubTransport::new());
    let stub = c.transport();
    stub.push_json(SCAN_PATH, scan_body("Pixel", vec![app("com.keep", &[])]));
    c.scan().await.unwrap();

    let mut selection: Selection = ["com.gone"].into_iter().collect();
    let state = c.snapshot();
    assert!(state.find_app("com.gone").is_none());
    assert!(selection.is_selected("com.gone"));

    // toggling a stale entry still behaves as a plain set toggle
    assert!(!selection.toggle("com.gone"));
    assert!(selection.is_empty());
}
