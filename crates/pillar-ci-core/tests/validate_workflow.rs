//! End-to-end validation runs against the in-memory renderer.

use std::sync::Arc;
use std::time::Duration;

use pillar_ci_core::fakes::MemoryRenderer;
use pillar_ci_core::{
    flatten, AggregatorOptions, ChangeGate, DiffError, DiffOptions, EnvironmentAggregator,
    EnvironmentSnapshot, GatePolicy, MismatchPolicy, RenderError, ValidationError,
    ValidationRequest,
};
use serde_json::json;

fn request(nodes: &[&str]) -> ValidationRequest {
    ValidationRequest::new(nodes.iter().copied(), "base", "incoming").expect("valid request")
}

fn aggregator(renderer: Arc<MemoryRenderer>) -> EnvironmentAggregator {
    EnvironmentAggregator::new(renderer, AggregatorOptions::default())
}

#[tokio::test]
async fn end_to_end_single_modification() {
    let renderer = Arc::new(
        MemoryRenderer::new()
            .with_tree("base", "n1", json!({"x": 1}))
            .with_tree("base", "n2", json!({"x": 1}))
            .with_tree("incoming", "n1", json!({"x": 2}))
            .with_tree("incoming", "n2", json!({"x": 1})),
    );

    let changes = aggregator(renderer.clone())
        .validate(&request(&["n1", "n2"]))
        .await
        .expect("validate failed");

    assert_eq!(flatten(&changes), vec!["n1:x;modified"]);
    assert_eq!(renderer.call_count(), 4, "one render per node per environment");
}

#[tokio::test]
async fn renderer_failure_aborts_without_report() {
    let renderer = Arc::new(
        MemoryRenderer::new()
            .with_tree("base", "n1", json!({"x": 1}))
            .with_tree("base", "n2", json!({"x": 1}))
            .with_tree("incoming", "n1", json!({"x": 2}))
            .with_failure(
                "incoming",
                "n2",
                RenderError::Unreachable {
                    node: "n2".to_string(),
                    environment: "incoming".to_string(),
                    message: "connection refused".to_string(),
                },
            ),
    );

    let err = aggregator(renderer)
        .validate_report(&request(&["n1", "n2"]))
        .await
        .unwrap_err();

    match err {
        ValidationError::Render(render) => {
            assert_eq!(render.node(), "n2");
            assert_eq!(render.environment(), "incoming");
        }
        other => panic!("expected render error, got {other:?}"),
    }
}

#[tokio::test]
async fn whole_node_changes_stay_out_of_the_change_list() {
    let target = EnvironmentSnapshot::from_json_str(
        "base",
        &json!({"n1": {"x": 1}, "retired": {"x": 1}}).to_string(),
    )
    .unwrap();
    let incoming = EnvironmentSnapshot::from_json_str(
        "incoming",
        &json!({"n1": {"x": 1, "y": 2}, "fresh": {"x": 1}}).to_string(),
    )
    .unwrap();

    let aggregator = aggregator(Arc::new(MemoryRenderer::new()));
    let changes = aggregator.compare_snapshots(&target, &incoming).unwrap();
    assert_eq!(flatten(&changes), vec!["n1:y;added"]);

    let delta = target.node_delta(&incoming);
    assert_eq!(delta.added, vec!["fresh"]);
    assert_eq!(delta.removed, vec!["retired"]);
}

#[tokio::test]
async fn report_carries_digests_and_summary() {
    let renderer = Arc::new(
        MemoryRenderer::new()
            .with_tree("base", "web01", json!({"app": {"version": "1.0", "port": 80}}))
            .with_tree("incoming", "web01", json!({"app": {"version": "1.1", "port": 80}})),
    );

    let report = aggregator(renderer)
        .validate_report(&request(&["web01"]))
        .await
        .unwrap();

    assert_eq!(report.flat_changes(), vec!["web01:app:version;modified"]);
    assert_eq!(report.nodes, vec!["web01"]);
    assert_eq!(report.target_environment, "base");
    assert_eq!(report.incoming_environment, "incoming");
    assert_ne!(report.target_digest, report.incoming_digest);
    assert!(report.node_delta.is_empty());
    assert_eq!(report.summary().modified, 1);

    let policy = GatePolicy::default()
        .with_allow_patterns([r":app:version;modified$"])
        .unwrap();
    assert!(ChangeGate::evaluate(&report.changes, &policy).passed);
}

#[tokio::test]
async fn empty_node_list_renders_nothing() {
    let renderer = Arc::new(MemoryRenderer::new());
    let changes = aggregator(renderer.clone())
        .validate(&request(&[]))
        .await
        .unwrap();
    assert!(changes.is_empty());
    assert_eq!(renderer.call_count(), 0);
}

#[tokio::test]
async fn structural_mismatch_surfaces_as_validation_error() {
    let renderer = Arc::new(
        MemoryRenderer::new()
            .with_tree("base", "n1", json!({"users": {"alice": {}}}))
            .with_tree("incoming", "n1", json!({"users": []})),
    );

    let err = aggregator(renderer.clone())
        .validate(&request(&["n1"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::Diff(DiffError::StructuralMismatch { .. })
    ));

    let lenient = EnvironmentAggregator::new(
        renderer,
        AggregatorOptions::default()
            .with_diff(DiffOptions::default().with_mismatch(MismatchPolicy::Modified)),
    );
    let changes = lenient.validate(&request(&["n1"])).await.unwrap();
    assert_eq!(flatten(&changes), vec!["n1:users;modified"]);
}

#[tokio::test(start_paused = true)]
async fn slow_render_times_out() {
    let renderer = Arc::new(
        MemoryRenderer::new()
            .with_tree("base", "n1", json!({}))
            .with_tree("incoming", "n1", json!({}))
            .with_delay("incoming", "n1", Duration::from_secs(600)),
    );
    let aggregator = EnvironmentAggregator::new(
        renderer,
        AggregatorOptions::default().with_render_timeout(Some(Duration::from_secs(5))),
    );

    let err = aggregator.validate(&request(&["n1"])).await.unwrap_err();
    match err {
        ValidationError::Render(RenderError::Timeout {
            node,
            environment,
            timeout,
        }) => {
            assert_eq!(node, "n1");
            assert_eq!(environment, "incoming");
            assert_eq!(timeout, Duration::from_secs(5));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn first_failure_does_not_wait_for_slow_renders() {
    let renderer = Arc::new(
        MemoryRenderer::new()
            .with_tree("base", "n1", json!({}))
            .with_tree("base", "n2", json!({}))
            .with_tree("incoming", "n2", json!({}))
            .with_delay("base", "n2", Duration::from_secs(60))
            .with_failure("incoming", "n1", RenderError::failed("n1", "incoming", "bad sls")),
    );
    let aggregator = EnvironmentAggregator::new(
        renderer,
        AggregatorOptions::default().with_render_timeout(None),
    );

    let start = tokio::time::Instant::now();
    let err = aggregator.validate(&request(&["n1", "n2"])).await.unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(60));
    assert!(matches!(
        err,
        ValidationError::Render(RenderError::Failed { ref node, .. }) if node == "n1"
    ));
}
