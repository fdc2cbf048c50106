// End-to-end pipeline scenarios: scripts on disk, through the loader, driven
// by the pipeline, observed at the response.

use http::{Method, StatusCode};
use pylon::{
    config::models::{FilterScanConfig, GatewayConfig},
    core::{ExecutionStatus, HttpRequest, RequestContext},
    Gateway,
};
use tempfile::TempDir;

async fn gateway_with(scripts: &[(&str, &str)]) -> (TempDir, Gateway) {
    let dir = TempDir::new().unwrap();
    for (file, body) in scripts {
        std::fs::write(dir.path().join(file), body).unwrap();
    }
    let config = GatewayConfig {
        filter_scan: FilterScanConfig {
            directories: vec![dir.path().display().to_string()],
            poll_interval_secs: 5,
            script_suffix: ".rhai".into(),
        },
        ..GatewayConfig::default()
    };
    let gateway = Gateway::from_config(&config);
    gateway.rescan().await;
    (dir, gateway)
}

fn execute(gateway: &Gateway, request: HttpRequest) -> RequestContext {
    let mut ctx = RequestContext::new(request);
    gateway.pipeline().execute(&mut ctx);
    ctx
}

const PRE_DECORATE: &str = r#"
    const FILTER_KIND = "pre";
    const FILTER_ORDER = 1;
    fn run(ctx) { #{ route_vip: "api" } }
"#;

const ROUTE_OK: &str = r#"
    const FILTER_KIND = "route";
    const FILTER_ORDER = 1;
    fn should_run(ctx) { ctx.route_vip == "api" }
    fn run(ctx) {
        #{ response_status_code: 200, response_body: "ok" }
    }
"#;

const POST_STAMP: &str = r#"
    const FILTER_KIND = "post";
    const FILTER_ORDER = 1;
    fn run(ctx) { #{ headers: #{ "X-R": "1" } } }
"#;

#[tokio::test]
async fn test_happy_pre_route_post() {
    let (_dir, gateway) = gateway_with(&[
        ("pre_decorate.rhai", PRE_DECORATE),
        ("route_ok.rhai", ROUTE_OK),
        ("post_stamp.rhai", POST_STAMP),
    ])
    .await;

    let mut ctx = execute(&gateway, HttpRequest::new(Method::GET, "/foo"));

    assert_eq!(ctx.response.status, StatusCode::OK);
    assert_eq!(ctx.response.body_string(), "ok");
    assert_eq!(ctx.response.header("X-R"), Some("1"));
    assert_eq!(ctx.filter_summary().len(), 3);
    assert!(ctx
        .filter_summary()
        .iter()
        .all(|e| e.status == ExecutionStatus::Success));
    ctx.unset();
}

#[tokio::test]
async fn test_error_in_pre_renders_501_and_still_runs_post() {
    let pre_fail = r#"
        const FILTER_KIND = "pre";
        const FILTER_ORDER = 1;
        fn run(ctx) {
            throw #{
                status: 501,
                error_cause: "zuul.niws.defaultClient or zuul.default.host not defined",
                message: "default VIP or host not defined. Define: zuul.niws.defaultClient or zuul.default.host",
            };
        }
    "#;
    let post_mark = r#"
        const FILTER_KIND = "post";
        const FILTER_ORDER = 1;
        fn run(ctx) { #{ state: #{ post_ran: true } } }
    "#;
    let (_dir, gateway) =
        gateway_with(&[("pre_fail.rhai", pre_fail), ("post_mark.rhai", post_mark)]).await;

    let mut ctx = execute(&gateway, HttpRequest::new(Method::GET, "/"));

    assert_eq!(ctx.response.status, StatusCode::NOT_IMPLEMENTED);
    let body = ctx.response.body_string();
    assert!(body.contains("<status_code>501</status_code><message>default VIP or host not defined"));
    assert_eq!(
        ctx.response.header("X-Netflix-Error-Cause"),
        Some("Zuul Error: zuul.niws.defaultClient or zuul.default.host not defined")
    );
    // POST still ran after the failure.
    assert_eq!(ctx.get("post_ran"), Some(&serde_json::json!(true)));
    assert!(ctx.error_handled());
    ctx.unset();
}

#[tokio::test]
async fn test_error_body_v2_json_with_callback() {
    let route_fail = r#"
        const FILTER_KIND = "route";
        const FILTER_ORDER = 1;
        fn run(ctx) {
            throw #{ status: 500, error_cause: "X", message: "test" };
        }
    "#;
    let (_dir, gateway) = gateway_with(&[("route_fail.rhai", route_fail)]).await;

    let response = gateway.handle(HttpRequest::new(
        Method::GET,
        "/svc?v=2.0&output=json&callback=cb",
    ));

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body_string(),
        r#"cb({"status": {"message": "test", "status_code": 500}});"#
    );
}

#[tokio::test]
async fn test_post_error_triggers_error_stage_exactly_once() {
    let post_fail = r#"
        const FILTER_KIND = "post";
        const FILTER_ORDER = 1;
        fn run(ctx) {
            throw #{ status: 500, error_cause: "X", message: "post exploded" };
        }
    "#;
    let (_dir, gateway) = gateway_with(&[
        ("route_ok.rhai", ROUTE_OK),
        ("pre_decorate.rhai", PRE_DECORATE),
        ("post_fail.rhai", post_fail),
    ])
    .await;

    let mut ctx = execute(&gateway, HttpRequest::new(Method::GET, "/"));

    assert!(ctx.error_handled());
    assert_eq!(
        ctx.response.header("X-Netflix-Error-Cause"),
        Some("Zuul Error: X")
    );
    // Exactly one pass through POST and one through ERROR.
    let post_runs = ctx
        .filter_summary()
        .iter()
        .filter(|e| e.name == "post_fail")
        .count();
    let error_runs = ctx
        .filter_summary()
        .iter()
        .filter(|e| e.name == "SendErrorFilter")
        .count();
    assert_eq!(post_runs, 1);
    assert_eq!(error_runs, 1);
    ctx.unset();
}

#[tokio::test]
async fn test_filters_execute_in_order_regardless_of_discovery_order() {
    let make = |order: i32, marker: &str| {
        format!(
            r#"
            const FILTER_KIND = "pre";
            const FILTER_ORDER = {order};
            fn run(ctx) {{ #{{ headers: #{{ "X-Mark-{marker}": "{order}" }} }} }}
            "#
        )
    };
    // File names chosen so lexical discovery order differs from execution order.
    let third = make(30, "third");
    let first = make(10, "first");
    let second = make(20, "second");
    let (_dir, gateway) = gateway_with(&[
        ("aaa_runs_third.rhai", third.as_str()),
        ("mmm_runs_first.rhai", first.as_str()),
        ("zzz_runs_second.rhai", second.as_str()),
    ])
    .await;

    let mut ctx = execute(&gateway, HttpRequest::new(Method::GET, "/"));
    let names: Vec<&str> = ctx.filter_summary().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["mmm_runs_first", "zzz_runs_second", "aaa_runs_third"]
    );
    ctx.unset();
}

#[tokio::test]
async fn test_skipped_guard_is_recorded_but_harmless() {
    let guarded = r#"
        const FILTER_KIND = "route";
        const FILTER_ORDER = 5;
        fn should_run(ctx) { ctx.path == "/nowhere" }
        fn run(ctx) { #{ response_status_code: 500 } }
    "#;
    let (_dir, gateway) = gateway_with(&[
        ("guarded.rhai", guarded),
        ("route_ok.rhai", ROUTE_OK),
        ("pre_decorate.rhai", PRE_DECORATE),
    ])
    .await;

    let mut ctx = execute(&gateway, HttpRequest::new(Method::GET, "/foo"));
    assert_eq!(ctx.response.status, StatusCode::OK);
    let guarded_entry = ctx
        .filter_summary()
        .iter()
        .find(|e| e.name == "guarded")
        .unwrap();
    assert_eq!(guarded_entry.status, ExecutionStatus::Skipped);
    ctx.unset();
}
