// Tests d'intégration de la session Sparkplug contre le transport simulé

use sparkplug_devkit::payload_helpers::decode;
use sparkplug_devkit::{CommandBuilder, MockCall, PayloadExt, TestHarness};
use sparkplug_node::proto::metric::Value;
use sparkplug_node::schema::{ALIAS_CPU_PERCENT, ALIAS_DISK_USAGE};
use sparkplug_node::session::publish_loop;
use sparkplug_node::{Backoff, ConnectionState, Identifier, NodeError, RetryPolicy, SessionOptions};
use std::time::Duration;

fn harness_with_retry(retry: RetryPolicy) -> TestHarness {
    TestHarness::with_options(
        Identifier::new("G", "N"),
        SessionOptions {
            retry,
            ..Default::default()
        },
    )
}

#[test]
fn test_seq_is_contiguous_across_all_payloads() {
    let harness = TestHarness::new();
    harness.connect().unwrap();
    for _ in 0..300 {
        assert!(harness.session.publish_data().unwrap());
    }
    harness.send_command(&CommandBuilder::new().rebirth().to_bytes()).unwrap();

    let payloads = harness.built_payloads().unwrap();
    // will + birth + 300 data + rebirth
    assert_eq!(payloads.len(), 303);
    for (i, payload) in payloads.iter().enumerate() {
        assert_eq!(payload.seq_u8(), Some((i % 256) as u8), "payload #{i}");
    }
}

#[test]
fn test_death_and_birth_share_bd_seq() {
    let harness = TestHarness::new();
    harness.connect().unwrap();

    let wills = harness.last_wills().unwrap();
    let births = harness.births().unwrap();
    assert_eq!(wills[0].bd_seq(), Some(0));
    assert_eq!(births[0].bd_seq(), Some(0));

    // death payload carries bdSeq only
    assert_eq!(wills[0].metrics.len(), 1);
    assert_eq!(harness.transport.last_wills()[0].topic, "spBv1.0/G/NDEATH/N");
}

#[test]
fn test_birth_defines_every_metric() {
    let harness = TestHarness::new();
    harness.metrics.push_cpu(&[12.5]);
    harness.metrics.push_disk(&[42.0]);
    harness.connect().unwrap();

    let birth = &harness.births().unwrap()[0];
    let names: Vec<_> = birth
        .metrics
        .iter()
        .map(|m| m.name.as_deref().unwrap_or(""))
        .collect();
    assert_eq!(
        names,
        vec![
            "bdSeq",
            "System/CpuPercent",
            "System/DiskUsage",
            "Node Control/Rebirth",
            "Properties/OS",
            "Properties/OS Version",
        ]
    );
    assert_eq!(birth.cpu_percent(), Some(12.5));
    assert_eq!(birth.disk_usage(), Some(42.0));

    let rebirth = birth.metric_named("Node Control/Rebirth").unwrap();
    assert_eq!(rebirth.alias, None);
    assert_eq!(rebirth.value, Some(Value::BooleanValue(false)));
    assert!(birth.metrics.iter().all(|m| m.timestamp == birth.timestamp));
}

#[test]
fn test_data_omits_unchanged_disk_usage() {
    let harness = TestHarness::new();
    harness.metrics.push_disk(&[42.0, 42.0, 42.0, 55.0]);
    harness.connect().unwrap();
    for _ in 0..3 {
        harness.session.publish_data().unwrap();
    }

    let data = harness.data().unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(data[0].disk_usage(), None);
    assert_eq!(data[1].disk_usage(), None);
    assert_eq!(data[2].disk_usage(), Some(55.0));

    for payload in &data {
        assert!(!payload.has_names());
        assert_eq!(payload.metrics[0].alias, Some(ALIAS_CPU_PERCENT));
    }
    assert_eq!(data[2].metrics[1].alias, Some(ALIAS_DISK_USAGE));
}

#[test]
fn test_first_data_after_fresh_start_follows_birth_value() {
    let harness = TestHarness::new();
    harness.metrics.push_disk(&[10.0, 11.0]);
    harness.connect().unwrap();
    harness.session.publish_data().unwrap();

    assert_eq!(harness.data().unwrap()[0].disk_usage(), Some(11.0));
}

#[test]
fn test_rebirth_command_republishes_birth() {
    let harness = TestHarness::new();
    harness.connect().unwrap();
    harness.session.publish_data().unwrap();

    assert!(harness.send_command(&CommandBuilder::new().rebirth().to_bytes()).unwrap());
    assert!(harness
        .send_command(&CommandBuilder::new().rebirth_by_alias().to_bytes())
        .unwrap());

    let births = harness.births().unwrap();
    assert_eq!(births.len(), 3);
    assert!(births[1].seq > births[0].seq);
    assert!(births[2].seq > births[1].seq);
    for birth in &births {
        assert_eq!(birth.bd_seq(), Some(0));
        assert_eq!(birth.metrics.len(), 6);
    }
}

#[test]
fn test_one_rebirth_per_command_payload() {
    let harness = TestHarness::new();
    harness.connect().unwrap();

    let bytes = CommandBuilder::new()
        .rebirth()
        .rebirth_by_alias()
        .boolean("Node Control/Reboot", true)
        .to_bytes();
    assert!(harness.send_command(&bytes).unwrap());
    assert_eq!(harness.births().unwrap().len(), 2);
}

#[test]
fn test_other_commands_are_ignored() {
    let harness = TestHarness::new();
    harness.connect().unwrap();
    let before = harness.session.snapshot();

    let bytes = CommandBuilder::new().boolean("Node Control/Reboot", true).to_bytes();
    assert!(!harness.send_command(&bytes).unwrap());

    let after = harness.session.snapshot();
    assert_eq!(after.sequence, before.sequence);
    assert_eq!(harness.births().unwrap().len(), 1);
}

#[test]
fn test_malformed_command_leaves_state_untouched() {
    let harness = TestHarness::new();
    harness.connect().unwrap();
    let before = harness.session.snapshot();
    let calls = harness.transport.calls().len();

    let err = harness.send_command(&[0xff, 0xff, 0xff, 0x01]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NodeError>(),
        Some(NodeError::Decode(_))
    ));

    assert_eq!(harness.session.snapshot().sequence, before.sequence);
    assert_eq!(harness.transport.calls().len(), calls);
    assert!(harness.session.is_connected());
}

#[test]
fn test_commands_ignored_on_foreign_topic_or_when_disconnected() {
    let harness = TestHarness::new();
    let bytes = CommandBuilder::new().rebirth().to_bytes();

    // not connected yet
    assert!(!harness.send_command(&bytes).unwrap());
    assert!(harness.births().unwrap().is_empty());

    harness.connect().unwrap();
    assert!(!harness
        .session
        .on_message("spBv1.0/G/NCMD/Other", &bytes)
        .unwrap());
    assert!(!harness.session.on_message("spBv1.0/G/NDATA/N", &bytes).unwrap());
    assert_eq!(harness.births().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reconnect_after_failures_births_once_with_will_bd_seq() {
    let harness = TestHarness::new();
    harness.connect().unwrap();
    harness.session.publish_data().unwrap();

    harness.transport.fail_next_reconnects(3);
    harness.session.on_disconnected("keep alive timeout").await.unwrap();
    assert_eq!(
        harness.transport.reconnect_attempts(),
        vec![false, false, false, true]
    );
    assert_eq!(harness.session.snapshot().connection, ConnectionState::Connecting);
    assert!(!harness.session.publish_data().unwrap());

    harness.session.on_connected().unwrap();

    let births = harness.births().unwrap();
    assert_eq!(births.len(), 2);
    let wills = harness.last_wills().unwrap();
    assert_eq!(wills.len(), 5);
    // every will of the outage announced the pending bdSeq
    for will in &wills[1..] {
        assert_eq!(will.bd_seq(), Some(1));
    }
    assert_eq!(births[1].bd_seq(), wills.last().unwrap().bd_seq());
}

#[tokio::test]
async fn test_disk_cache_survives_reconnect() {
    let harness = TestHarness::new();
    harness.metrics.push_disk(&[42.0, 42.0, 42.0, 42.0]);
    harness.connect().unwrap();
    harness.session.on_disconnected("broker restart").await.unwrap();
    harness.session.on_connected().unwrap();
    harness.session.publish_data().unwrap();

    let births = harness.births().unwrap();
    assert_eq!(births[1].disk_usage(), Some(42.0));
    assert_eq!(harness.data().unwrap()[0].disk_usage(), None);
}

#[tokio::test]
async fn test_bounded_retry_gives_up() {
    let harness = harness_with_retry(RetryPolicy {
        max_attempts: Some(3),
        backoff: Backoff::None,
    });
    harness.connect().unwrap();
    harness.transport.fail_next_reconnects(10);

    let err = harness.session.on_disconnected("network down").await.unwrap_err();
    assert!(matches!(err, NodeError::ReconnectExhausted { attempts: 3, .. }));
    assert_eq!(harness.transport.reconnect_attempts().len(), 3);
    assert_eq!(
        harness.session.snapshot().connection,
        ConnectionState::Disconnected
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_backoff_waits_without_blocking() {
    let harness = harness_with_retry(RetryPolicy {
        max_attempts: None,
        backoff: Backoff::Fixed(Duration::from_secs(10)),
    });
    harness.connect().unwrap();
    harness.transport.fail_next_reconnects(2);

    let started = tokio::time::Instant::now();
    harness.session.on_disconnected("network down").await.unwrap();

    assert_eq!(harness.transport.reconnect_attempts(), vec![false, false, true]);
    assert!(started.elapsed() >= Duration::from_secs(20));
}

#[test]
fn test_refused_data_keeps_disk_usage_pending() {
    let harness = TestHarness::new();
    harness.metrics.push_disk(&[42.0, 60.0, 60.0]);
    harness.connect().unwrap();

    harness.transport.fail_publishes(true);
    assert!(matches!(
        harness.session.publish_data(),
        Err(NodeError::Transport(_))
    ));
    assert_eq!(harness.session.snapshot().last_disk_usage_percent, Some(42.0));

    harness.transport.fail_publishes(false);
    assert!(harness.session.publish_data().unwrap());
    let data = harness.data().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].disk_usage(), Some(60.0));
    assert_eq!(harness.session.snapshot().last_disk_usage_percent, Some(60.0));
}

#[test]
fn test_refused_rebirth_leaves_disk_cache() {
    let harness = TestHarness::new();
    harness.metrics.push_disk(&[42.0, 70.0, 70.0]);
    harness.connect().unwrap();

    harness.transport.fail_publishes(true);
    assert!(harness.session.rebirth().is_err());
    assert_eq!(harness.session.snapshot().last_disk_usage_percent, Some(42.0));

    harness.transport.fail_publishes(false);
    harness.session.publish_data().unwrap();
    assert_eq!(harness.data().unwrap()[0].disk_usage(), Some(70.0));
}

#[test]
fn test_provider_failure_skips_cycle_without_consuming_seq() {
    let harness = TestHarness::new();
    harness.metrics.push_disk(&[42.0]);
    harness.connect().unwrap();
    let before = harness.session.snapshot();

    harness.metrics.set_disk_failure(Some("unmounted"));
    assert!(matches!(
        harness.session.publish_data(),
        Err(NodeError::Provider(_))
    ));
    let after = harness.session.snapshot();
    assert_eq!(after.sequence, before.sequence);
    assert_eq!(after.last_disk_usage_percent, Some(42.0));
    assert!(harness.data().unwrap().is_empty());

    harness.metrics.set_disk_failure(None);
    assert!(harness.session.publish_data().unwrap());
    assert_eq!(
        harness.data().unwrap()[0].seq_u8(),
        Some(before.sequence.peek_payload_seq())
    );
}

#[test]
fn test_shutdown_sends_death_and_disconnects() {
    let harness = TestHarness::new();
    harness.connect().unwrap();
    harness.session.shutdown().unwrap();

    let deaths = harness.transport.find_messages_by_topic("spBv1.0/G/NDEATH/N");
    assert_eq!(deaths.len(), 1);
    assert_eq!(decode(&deaths[0].payload).unwrap().bd_seq(), Some(0));
    assert_eq!(harness.transport.calls().last(), Some(&MockCall::Disconnect));
}

#[tokio::test]
async fn test_publish_loop_stops_after_repeated_provider_failures() {
    let harness = TestHarness::new();
    harness.connect().unwrap();
    harness.metrics.set_disk_failure(Some("unreadable"));

    let res = tokio::time::timeout(
        Duration::from_secs(5),
        publish_loop(&harness.session, Duration::from_millis(10), 3),
    )
    .await
    .expect("publish loop should give up");

    assert!(matches!(res, Err(NodeError::Provider(_))));
    assert!(harness.data().unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_loop_sends_data_while_connected() {
    let harness = TestHarness::new();
    harness.connect().unwrap();

    let _ = tokio::time::timeout(
        Duration::from_millis(100),
        publish_loop(&harness.session, Duration::from_millis(10), 3),
    )
    .await;

    let data = harness.data().unwrap();
    assert!(!data.is_empty());
    assert!(data.iter().all(|p| p.cpu_percent().is_some()));
}
