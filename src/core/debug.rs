//! Routing-debug trail helpers.
//!
//! When a request opts in via `debug_routing`, the processor records which
//! filters ran and how each one changed the context. The trail lives in the
//! context itself and is cleared with it.

use std::collections::BTreeMap;

use crate::core::context::RequestContext;

/// Append a trail line if routing debug is enabled for this request.
pub fn add_routing_debug(ctx: &mut RequestContext, line: impl Into<String>) {
    if ctx.debug_routing {
        ctx.add_routing_debug(line);
    }
}

/// Diff the context against a snapshot taken before `filter_name` ran and
/// append one trail line per added or changed key.
pub fn compare_context_state(
    ctx: &mut RequestContext,
    filter_name: &str,
    before: &BTreeMap<String, String>,
) {
    if !ctx.debug_routing {
        return;
    }
    let after = ctx.debug_snapshot();
    let mut lines = Vec::new();
    for (key, value) in &after {
        match before.get(key) {
            None => lines.push(format!("{filter_name} added {key}={value}")),
            Some(prior) if prior != value => {
                lines.push(format!("{filter_name} changed {key}: {prior} -> {value}"));
            }
            Some(_) => {}
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            lines.push(format!("{filter_name} removed {key}"));
        }
    }
    for line in lines {
        ctx.add_routing_debug(line);
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use serde_json::json;

    use super::*;
    use crate::core::http::HttpRequest;

    #[test]
    fn test_disabled_debug_records_nothing() {
        let mut ctx = RequestContext::new(HttpRequest::new(Method::GET, "/"));
        let before = ctx.debug_snapshot();
        ctx.route_vip = Some("api".into());
        compare_context_state(&mut ctx, "f", &before);
        assert!(ctx.routing_debug().is_empty());
    }

    #[test]
    fn test_diff_reports_added_and_changed_keys() {
        let mut ctx = RequestContext::new(HttpRequest::new(Method::GET, "/"));
        ctx.debug_routing = true;
        ctx.route_vip = Some("api".into());
        let before = ctx.debug_snapshot();

        ctx.route_vip = Some("billing".into());
        ctx.set("flagged", json!(true));
        compare_context_state(&mut ctx, "audit", &before);

        let trail = ctx.routing_debug();
        assert!(trail.iter().any(|l| l == "audit added attachment:flagged=true"));
        assert!(trail
            .iter()
            .any(|l| l == "audit changed route_vip: api -> billing"));
    }

    #[test]
    fn test_diff_reports_removed_keys() {
        let mut ctx = RequestContext::new(HttpRequest::new(Method::GET, "/"));
        ctx.debug_routing = true;
        ctx.set("transient", json!(1));
        let before = ctx.debug_snapshot();
        ctx.remove("transient");
        compare_context_state(&mut ctx, "cleanup", &before);
        assert!(ctx
            .routing_debug()
            .iter()
            .any(|l| l == "cleanup removed attachment:transient"));
    }
}
