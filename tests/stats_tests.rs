//! 计数器统计集成测试

use fleet_deploy::{dispatcher::Action, error::DeployError, models::StatKey};

mod common;
use common::{hosts, Call, Harness};

const PROCESSOR_PAYLOAD: &str = r#""{\"built\":1}""#;
const NOTIFIER_PAYLOAD: &str = r#""{\"sent\":5,\"failed\":0}""#;

fn queries(harness: &Harness) -> Vec<String> {
    harness
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Run { host, command } => {
                assert_eq!(host, "localhost");
                Some(command)
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_stats_prints_rows_in_order() {
    let harness = Harness::new();
    harness.executor.respond("processor", PROCESSOR_PAYLOAD);
    harness.executor.respond("notifier", NOTIFIER_PAYLOAD);
    let dispatcher = harness.dispatcher("");

    let mut out = Vec::new();
    dispatcher
        .run(&[Action::Stats], &hosts(&[]), &mut out)
        .await
        .unwrap();

    let expected = format!(
        "{:>30}{:>10}\n{:>30}{:>10}\n{:>30}{:>10}\n",
        "built", "1", "sent", "5", "failed", "0"
    );
    assert_eq!(String::from_utf8(out).unwrap(), expected);
    assert_eq!(
        queries(&harness),
        vec!["redis-cli get processor", "redis-cli get notifier"]
    );
    assert_eq!(harness.builds(), 0);
}

#[tokio::test]
async fn test_stats_key_prefix() {
    let harness = Harness::new();
    harness.executor.respond("processor", PROCESSOR_PAYLOAD);
    harness.executor.respond("notifier", NOTIFIER_PAYLOAD);
    let dispatcher = harness.dispatcher("downloader:");

    let mut out = Vec::new();
    dispatcher
        .run(&[Action::Stats], &hosts(&[]), &mut out)
        .await
        .unwrap();

    assert_eq!(
        queries(&harness),
        vec![
            "redis-cli get downloader:processor",
            "redis-cli get downloader:notifier"
        ]
    );
}

#[tokio::test]
async fn test_malformed_payload_prints_nothing() {
    let harness = Harness::new();
    harness.executor.respond("processor", PROCESSOR_PAYLOAD);
    harness.executor.respond("notifier", r#"{"sent":5}"#);
    let dispatcher = harness.dispatcher("");

    let mut out = Vec::new();
    let err = dispatcher
        .run(&[Action::Stats], &hosts(&[]), &mut out)
        .await
        .unwrap_err();

    match err {
        DeployError::StatsDecodeError { key, .. } => assert_eq!(key, "notifier"),
        other => panic!("Expected StatsDecodeError, got {:?}", other),
    }
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_missing_key_is_decode_error() {
    let harness = Harness::new();
    let dispatcher = harness.dispatcher("");

    let mut out = Vec::new();
    let err = dispatcher
        .run(&[Action::Stats], &hosts(&[]), &mut out)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::StatsDecodeError { ref key, .. } if key == "processor"));
    assert_eq!(queries(&harness).len(), 1);
}

#[tokio::test]
async fn test_store_query_failure_propagates() {
    let harness = Harness::new();
    harness.executor.fail_command("localhost", "redis-cli");
    let dispatcher = harness.dispatcher("");

    let mut out = Vec::new();
    let err = dispatcher
        .run(&[Action::Stats], &hosts(&[]), &mut out)
        .await
        .unwrap_err();

    assert!(err.is_remote());
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_collect_report_groups() {
    let harness = Harness::new();
    harness.executor.respond("processor", PROCESSOR_PAYLOAD);
    harness.executor.respond("notifier", NOTIFIER_PAYLOAD);

    let collector = fleet_deploy::services::StatsCollector::new(
        harness.executor.clone(),
        fleet_deploy::models::Host::new("localhost"),
        "redis-cli get",
        "",
    );
    let report = collector.collect(&StatKey::ALL).await.unwrap();

    let groups: Vec<(StatKey, usize)> = report
        .groups()
        .iter()
        .map(|(key, rows)| (*key, rows.len()))
        .collect();
    assert_eq!(groups, vec![(StatKey::Processor, 1), (StatKey::Notifier, 2)]);
}

#[tokio::test]
async fn test_failed_stats_does_not_block_deploy() {
    let harness = Harness::new();
    let dispatcher = harness.dispatcher("");

    let mut out = Vec::new();
    let err = dispatcher
        .run(&[Action::Stats, Action::Deploy], &hosts(&["dl1"]), &mut out)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::StatsDecodeError { ref key, .. } if key == "processor"));
    assert!(out.is_empty());
    assert_eq!(harness.builds(), 1);
    assert_eq!(harness.calls_for("dl1"), common::deployed("dl1"));
}
