//! Integration tests for scan orchestration: enumerate, refresh and list.

mod common;

use common::{resources, ConcurrencyProbe, MockEnumerator, MockFetcher};
use driftscan::domain::models::ScanConfig;
use driftscan::{
    DiagnosticCode, EnumerateInput, EnumerationError, EnumeratorRegistry, Provider, RefreshInput,
    RemoteError, ResourceType, ScanError, ScanOrchestrator,
};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn orchestrator(registry: EnumeratorRegistry) -> ScanOrchestrator {
    ScanOrchestrator::new(Arc::new(registry), ScanConfig::default())
}

fn orchestrator_with(registry: EnumeratorRegistry, config: ScanConfig) -> ScanOrchestrator {
    ScanOrchestrator::new(Arc::new(registry), config)
}

#[tokio::test]
async fn test_partial_failure_keeps_other_types() {
    common::setup_test_logging();
    let mut registry = EnumeratorRegistry::new();
    registry
        .add_enumerator(MockEnumerator::returning("type_a", &["a1", "a2"]))
        .unwrap();
    registry
        .add_enumerator(MockEnumerator::failing("type_b", || {
            EnumerationError::Other("backend unavailable".to_string())
        }))
        .unwrap();
    registry
        .add_enumerator(MockEnumerator::returning("type_c", &["c1"]))
        .unwrap();

    let output = orchestrator(registry)
        .enumerate(EnumerateInput::new(["type_a", "type_b", "type_c"]))
        .await
        .unwrap();

    assert_eq!(output.resources_of("type_a").len(), 2);
    assert!(output.resources_of("type_b").is_empty());
    assert_eq!(output.resources_of("type_c").len(), 1);

    assert_eq!(output.diagnostics.len(), 1);
    let diagnostic = output.diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.resource_type(), "type_b");
    assert_eq!(diagnostic.kind(), DiagnosticCode::EnumerationFailed);

    for resource_type in ["type_a", "type_b", "type_c"] {
        assert!(output.timings.contains_key(resource_type));
    }
}

#[tokio::test]
async fn test_every_requested_type_has_entries() {
    let mut registry = EnumeratorRegistry::new();
    registry
        .add_enumerator(MockEnumerator::returning("aws_vpc", &[]))
        .unwrap();
    registry
        .add_enumerator(MockEnumerator::returning("aws_subnet", &["subnet-1"]))
        .unwrap();

    let output = orchestrator(registry)
        .enumerate(EnumerateInput::new(["aws_vpc", "aws_subnet"]))
        .await
        .unwrap();

    let keys: Vec<_> = output.resources.keys().map(ResourceType::as_str).collect();
    assert_eq!(keys, vec!["aws_subnet", "aws_vpc"]);
    assert_eq!(output.timings.len(), 2);
    assert!(output.resources_of("aws_vpc").is_empty());
    assert!(!output.has_diagnostics());
}

#[tokio::test]
async fn test_vpc_and_denied_subnet_scenario() {
    let mut registry = EnumeratorRegistry::new();
    registry
        .add_enumerator(MockEnumerator::returning("vpc", &["vpc-1", "vpc-2"]))
        .unwrap();
    registry
        .add_enumerator(MockEnumerator::failing("subnet", || {
            EnumerationError::listing(
                "subnet",
                RemoteError::new(Provider::Aws, "AccessDenied").with_code("AccessDenied"),
            )
        }))
        .unwrap();

    let output = orchestrator(registry)
        .enumerate(EnumerateInput::new(["vpc", "subnet"]))
        .await
        .unwrap();

    assert_eq!(output.resources_of("vpc").len(), 2);
    assert!(output.resources_of("subnet").is_empty());
    assert_eq!(output.diagnostics.len(), 1);

    let diagnostic = output.diagnostics_for("subnet").next().unwrap();
    assert_eq!(diagnostic.resource_type(), "subnet");
    assert_eq!(diagnostic.code(), "access_denied");
    assert_eq!(
        diagnostic.message(),
        "Ignoring subnet from drift calculation: Listing subnet is forbidden: AccessDenied: AccessDenied"
    );
}

#[tokio::test]
async fn test_unknown_type_fails_before_any_enumerator_runs() {
    let known = MockEnumerator::returning("aws_vpc", &["vpc-1"]);
    let calls = known.calls();
    let mut registry = EnumeratorRegistry::new();
    registry.add_enumerator(known).unwrap();

    let result = orchestrator(registry)
        .enumerate(EnumerateInput::new(["aws_vpc", "aws_unicorn"]))
        .await;

    assert!(matches!(result, Err(ScanError::UnknownResourceType(t)) if t == "aws_unicorn"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut registry = EnumeratorRegistry::new();
    registry
        .add_enumerator(MockEnumerator::returning("aws_vpc", &[]))
        .unwrap();

    let err = registry
        .add_enumerator(MockEnumerator::returning("aws_vpc", &["vpc-1"]))
        .unwrap_err();
    assert!(matches!(err, ScanError::DuplicateEnumerator(_)));
}

#[tokio::test]
async fn test_only_requested_types_run() {
    let requested = MockEnumerator::returning("aws_vpc", &["vpc-1"]);
    let ignored = MockEnumerator::returning("aws_eip", &["eip-1"]);
    let ignored_calls = ignored.calls();
    let mut registry = EnumeratorRegistry::new();
    registry.add_enumerator(requested).unwrap();
    registry.add_enumerator(ignored).unwrap();

    let output = orchestrator(registry)
        .enumerate(EnumerateInput::new(["aws_vpc"]))
        .await
        .unwrap();

    assert_eq!(output.resources.len(), 1);
    assert_eq!(ignored_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_panicking_enumerator_becomes_diagnostic() {
    let mut registry = EnumeratorRegistry::new();
    registry
        .add_enumerator(MockEnumerator::panicking("aws_lambda_function", "nil pointer"))
        .unwrap();
    registry
        .add_enumerator(MockEnumerator::returning("aws_vpc", &["vpc-1"]))
        .unwrap();

    let output = orchestrator(registry)
        .enumerate(EnumerateInput::new(["aws_lambda_function", "aws_vpc"]))
        .await
        .unwrap();

    assert_eq!(output.resources_of("aws_vpc").len(), 1);
    assert!(output.resources.contains_key("aws_lambda_function"));
    assert!(output.timings.contains_key("aws_lambda_function"));

    let diagnostic = output.diagnostics_for("aws_lambda_function").next().unwrap();
    assert_eq!(diagnostic.kind(), DiagnosticCode::Panicked);
    assert!(diagnostic.message().contains("nil pointer"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_never_exceeds_limit() {
    let probe = ConcurrencyProbe::default();
    let mut registry = EnumeratorRegistry::new();
    let types: Vec<String> = (0..12).map(|i| format!("type_{i}")).collect();
    for resource_type in &types {
        registry
            .add_enumerator(
                MockEnumerator::returning(resource_type, &["x"])
                    .with_delay(Duration::from_millis(20))
                    .with_probe(probe.clone()),
            )
            .unwrap();
    }

    let config = ScanConfig {
        max_concurrency: 3,
        ..ScanConfig::default()
    };
    let output = orchestrator_with(registry, config)
        .enumerate(EnumerateInput::new(types.clone()))
        .await
        .unwrap();

    assert_eq!(output.resource_count(), 12);
    assert!(probe.peak() <= 3, "peak concurrency was {}", probe.peak());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_yields_cancelled_diagnostics() {
    let mut registry = EnumeratorRegistry::new();
    registry
        .add_enumerator(MockEnumerator::returning("fast", &["f1"]))
        .unwrap();
    registry
        .add_enumerator(
            MockEnumerator::returning("slow", &["s1"]).with_delay(Duration::from_secs(3600)),
        )
        .unwrap();

    let config = ScanConfig {
        max_concurrency: 10,
        timeout_secs: Some(30),
    };
    let output = orchestrator_with(registry, config)
        .enumerate(EnumerateInput::new(["fast", "slow"]))
        .await
        .unwrap();

    assert_eq!(output.resources_of("fast").len(), 1);
    assert!(output.resources.contains_key("slow"));
    assert!(output.resources_of("slow").is_empty());
    assert_eq!(output.timings.len(), 2);

    let diagnostic = output.diagnostics_for("slow").next().unwrap();
    assert_eq!(diagnostic.kind(), DiagnosticCode::Cancelled);
    assert!(diagnostic.message().contains("timed out"));
}

#[tokio::test]
async fn test_cancellation_still_completes_output() {
    let token = CancellationToken::new();
    let mut registry = EnumeratorRegistry::new();
    for resource_type in ["aws_vpc", "aws_subnet", "aws_eip"] {
        registry
            .add_enumerator(
                MockEnumerator::returning(resource_type, &["x"])
                    .with_delay(Duration::from_secs(3600)),
            )
            .unwrap();
    }
    let orchestrator = orchestrator(registry).with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let output = orchestrator
        .enumerate(EnumerateInput::new(["aws_vpc", "aws_subnet", "aws_eip"]))
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(output.resources.len(), 3);
    assert_eq!(output.timings.len(), 3);
    assert_eq!(output.diagnostics.len(), 3);
    assert!(output
        .diagnostics
        .iter()
        .all(|d| d.kind() == DiagnosticCode::Cancelled));
}

#[tokio::test]
async fn test_refresh_reads_details_and_keeps_order() {
    let fetcher = MockFetcher::new("aws_vpc").failing_for("vpc-2");
    let fetcher_calls = fetcher.calls();
    let mut registry = EnumeratorRegistry::new();
    registry.add_details_fetcher(fetcher).unwrap();

    let mut input = BTreeMap::new();
    input.insert(
        ResourceType::from("aws_vpc"),
        resources("aws_vpc", &["vpc-1", "vpc-2", "vpc-3", "vpc-4"]),
    );
    input.insert(
        ResourceType::from("aws_subnet"),
        resources("aws_subnet", &["subnet-1"]),
    );
    input.insert(ResourceType::from("aws_eip"), Vec::new());

    let output = orchestrator(registry)
        .refresh(RefreshInput::new(input))
        .await
        .unwrap();

    let vpc_ids: Vec<_> = output.resources[&ResourceType::from("aws_vpc")]
        .iter()
        .map(|r| r.id().to_string())
        .collect();
    assert_eq!(vpc_ids, vec!["vpc-1", "vpc-3", "vpc-4"]);
    assert!(output.resources[&ResourceType::from("aws_vpc")]
        .iter()
        .all(|r| r.attribute("refreshed").is_some()));
    assert_eq!(fetcher_calls.load(Ordering::SeqCst), 4);

    // No fetcher: passed through untouched.
    let subnets = &output.resources[&ResourceType::from("aws_subnet")];
    assert_eq!(subnets.len(), 1);
    assert!(subnets[0].attribute("refreshed").is_none());
    assert!(output.resources.contains_key("aws_eip"));

    assert_eq!(output.diagnostics.len(), 1);
    let diagnostic = output.diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.kind(), DiagnosticCode::DetailsFetchFailed);
    assert_eq!(diagnostic.resource().map(|r| r.id()), Some("vpc-2"));
}

#[tokio::test]
async fn test_list_chains_enumerate_and_refresh() {
    let mut registry = EnumeratorRegistry::new();
    registry
        .add_enumerator(MockEnumerator::returning("github_repository", &["terraform-modules", "infra"]))
        .unwrap();
    registry
        .add_details_fetcher(MockFetcher::new("github_repository").failing_for("infra"))
        .unwrap();

    let output = orchestrator(registry).list("github_repository").await.unwrap();

    assert_eq!(output.resources.len(), 1);
    assert_eq!(output.resources[0].id(), "terraform-modules");
    assert_eq!(output.resources[0].attribute("refreshed"), Some(&serde_json::json!(true)));
    assert_eq!(output.diagnostics.len(), 1);
}

#[tokio::test]
async fn test_list_collects_diagnostics_of_both_phases() {
    let mut registry = EnumeratorRegistry::new();
    registry
        .add_enumerator(MockEnumerator::failing("google_storage_bucket", || {
            EnumerationError::listing(
                "google_storage_bucket",
                RemoteError::new(Provider::Google, "googleapi: Error 403: forbidden"),
            )
        }))
        .unwrap();

    let output = orchestrator(registry)
        .list("google_storage_bucket")
        .await
        .unwrap();

    assert!(output.resources.is_empty());
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(
        output.diagnostics.iter().next().map(|d| d.kind()),
        Some(DiagnosticCode::AccessDenied)
    );
}

#[tokio::test(start_paused = true)]
async fn test_list_phases_share_one_timeout() {
    let mut registry = EnumeratorRegistry::new();
    registry
        .add_enumerator(
            MockEnumerator::returning("aws_vpc", &["vpc-1"]).with_delay(Duration::from_secs(20)),
        )
        .unwrap();
    registry
        .add_details_fetcher(MockFetcher::new("aws_vpc").with_delay(Duration::from_secs(20)))
        .unwrap();

    let config = ScanConfig {
        max_concurrency: 10,
        timeout_secs: Some(30),
    };
    let output = orchestrator_with(registry, config)
        .list("aws_vpc")
        .await
        .unwrap();

    // Each phase fits in 30s on its own, together they do not.
    assert!(output.resources.is_empty());
    assert_eq!(output.diagnostics.len(), 1);
    let diagnostic = output.diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.kind(), DiagnosticCode::Cancelled);
    assert!(diagnostic.message().contains("timed out after 30s"));
}

#[tokio::test]
async fn test_list_unknown_type_is_fatal() {
    let result = orchestrator(EnumeratorRegistry::new()).list("aws_unicorn").await;
    assert!(matches!(result, Err(ScanError::UnknownResourceType(_))));
}
