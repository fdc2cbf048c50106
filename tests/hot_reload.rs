// Hot-reload behavior against a real filter directory: edits and additions
// take effect after a scan, broken edits keep the previous filter serving.

use std::{sync::Arc, time::Duration};

use http::Method;
use pylon::{
    core::{FilterKind, FilterLoader, FilterProcessor, FilterRegistry, HttpRequest,
        PipelineRunner, RequestContext},
    metrics::BasicFilterUsageNotifier,
    FileManagerConfig, FilterFileManager, RhaiFilterCompiler,
};
use tempfile::TempDir;

fn assemble(dir: &TempDir, poll: Duration) -> (Arc<FilterFileManager>, PipelineRunner) {
    let loader = Arc::new(FilterLoader::new(
        Arc::new(FilterRegistry::new()),
        Arc::new(RhaiFilterCompiler::new()),
    ));
    let manager = Arc::new(FilterFileManager::new(
        FileManagerConfig {
            directories: vec![dir.path().to_path_buf()],
            poll_interval: poll,
            suffix: ".rhai".to_string(),
        },
        Arc::clone(&loader),
    ));
    let pipeline = PipelineRunner::new(Arc::new(FilterProcessor::new(
        loader,
        Arc::new(BasicFilterUsageNotifier),
    )));
    (manager, pipeline)
}

fn pre_script(order: i32) -> String {
    format!(
        r#"
        const FILTER_KIND = "pre";
        const FILTER_ORDER = {order};
        fn run(ctx) {{ #{{}} }}
        "#
    )
}

fn executed_names(pipeline: &PipelineRunner) -> Vec<String> {
    let mut ctx = RequestContext::new(HttpRequest::new(Method::GET, "/"));
    pipeline.execute(&mut ctx);
    let names = ctx
        .filter_summary()
        .iter()
        .map(|e| e.name.clone())
        .collect();
    ctx.unset();
    names
}

#[tokio::test]
async fn test_edit_and_addition_reorder_the_chain() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.rhai"), pre_script(1)).unwrap();

    let (manager, pipeline) = assemble(&dir, Duration::from_secs(5));
    manager.scan_once().await;
    assert_eq!(executed_names(&pipeline), vec!["a"]);

    let loader = Arc::clone(pipeline.processor().loader());
    let old_a = loader.registry().get("a").unwrap();

    // Edit a to order 3 and add b at order 2.
    std::fs::write(dir.path().join("a.rhai"), pre_script(3)).unwrap();
    std::fs::write(dir.path().join("b.rhai"), pre_script(2)).unwrap();
    manager.scan_once().await;

    assert_eq!(executed_names(&pipeline), vec!["b", "a"]);

    let new_a = loader.registry().get("a").unwrap();
    assert!(
        !Arc::ptr_eq(&old_a, &new_a),
        "edited filter must be a fresh instance"
    );
    let sequence = loader.filters_by_kind(&FilterKind::Pre);
    assert!(sequence.iter().all(|f| !Arc::ptr_eq(f, &old_a)));
}

#[tokio::test]
async fn test_background_poller_applies_changes_within_two_intervals() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.rhai"), pre_script(1)).unwrap();

    let (manager, pipeline) = assemble(&dir, Duration::from_millis(100));
    let handle = manager.start().unwrap();

    std::fs::write(dir.path().join("b.rhai"), pre_script(0)).unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(executed_names(&pipeline), vec!["b", "a"]);

    manager.shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_broken_edit_keeps_previous_filter_serving() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("good.rhai");
    std::fs::write(
        &path,
        r#"
        const FILTER_KIND = "pre";
        const FILTER_ORDER = 1;
        fn run(ctx) { #{ state: #{ compiled: "v1" } } }
        "#,
    )
    .unwrap();

    let (manager, pipeline) = assemble(&dir, Duration::from_secs(5));
    manager.scan_once().await;

    let loader = Arc::clone(pipeline.processor().loader());
    let original = loader.registry().get("good").unwrap();

    // Overwrite with syntactically invalid content.
    std::fs::write(&path, "const FILTER_KIND = ").unwrap();
    manager.scan_once().await;

    let retained = loader.registry().get("good").unwrap();
    assert!(Arc::ptr_eq(&original, &retained));

    // The retained instance still runs.
    let mut ctx = RequestContext::new(HttpRequest::new(Method::GET, "/"));
    pipeline.execute(&mut ctx);
    assert_eq!(ctx.get("compiled"), Some(&serde_json::json!("v1")));
    ctx.unset();
}

#[tokio::test]
async fn test_deleted_file_drops_the_filter_on_next_scan() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.rhai");
    std::fs::write(&path, pre_script(1)).unwrap();

    let (manager, pipeline) = assemble(&dir, Duration::from_secs(5));
    manager.scan_once().await;
    assert_eq!(executed_names(&pipeline), vec!["a"]);

    std::fs::remove_file(&path).unwrap();
    manager.scan_once().await;
    assert!(executed_names(&pipeline).is_empty());
}

#[tokio::test]
async fn test_unchanged_files_are_not_recompiled() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.rhai"), pre_script(1)).unwrap();

    let (manager, pipeline) = assemble(&dir, Duration::from_secs(5));
    manager.scan_once().await;
    let loader = Arc::clone(pipeline.processor().loader());
    let first = loader.registry().get("a").unwrap();

    manager.scan_once().await;
    manager.scan_once().await;
    let later = loader.registry().get("a").unwrap();
    assert!(
        Arc::ptr_eq(&first, &later),
        "unchanged source must keep the same compiled instance"
    );
}
