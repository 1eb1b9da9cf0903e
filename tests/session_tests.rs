//! Tests for the edge node session state machine

mod common;

use common::{command_message, init_logging, metric_names, state_message, FakeTransport, TestNode};
use sparkplug_edge::node::{BD_SEQ_METRIC, REBIRTH_METRIC};
use sparkplug_edge::{
    DataType, EdgeNode, EdgeNodeConfig, Error, HostState, MemoryBdSeqStore, Message, Metric,
    MetricValue, QoS, SessionState,
};
use std::sync::{Arc, Mutex};

fn node_with_host() -> TestNode {
    init_logging();
    let config = EdgeNodeConfig::new("G", "N").with_primary_host("H");
    EdgeNode::new(config, FakeTransport::new(), MemoryBdSeqStore::new())
}

fn node_without_host() -> TestNode {
    init_logging();
    EdgeNode::new(
        EdgeNodeConfig::new("G", "N"),
        FakeTransport::new(),
        MemoryBdSeqStore::new(),
    )
}

fn established() -> TestNode {
    let mut node = node_without_host();
    node.add_metric("Temperature", DataType::Double, MetricValue::Double(20.0))
        .unwrap();
    node.connect().unwrap();
    node
}

fn host_state(timestamp: u64, online: bool) -> HostState {
    HostState { timestamp, online }
}

fn bd_seq_of(payload: &sparkplug_edge::Payload) -> MetricValue {
    payload
        .metrics()
        .map(|m| m.unwrap())
        .find(|m| m.name.as_deref() == Some(BD_SEQ_METRIC))
        .map(|m| m.value)
        .unwrap()
}

#[test]
fn test_connect_without_host_publishes_birth() {
    let node = established();
    assert_eq!(node.state(), SessionState::Established);

    let t = node.transport();
    assert_eq!(t.subscriptions, vec![("spBv1.0/G/NCMD/N".to_string(), QoS::AtLeastOnce)]);
    let births = t.on("NBIRTH");
    assert_eq!(births.len(), 1);
    assert_eq!(births[0].qos, QoS::AtMostOnce);
    assert!(!births[0].retain);

    let birth = births[0].parse();
    assert_eq!(birth.seq(), Some(0));
    assert!(birth.timestamp().is_some());
    assert_eq!(
        metric_names(&birth),
        vec![BD_SEQ_METRIC, REBIRTH_METRIC, "Temperature"]
    );
    assert_eq!(bd_seq_of(&birth), MetricValue::Int64(1));
    assert_eq!(node.seq(), 1);
}

#[test]
fn test_last_will_registered_before_connect() {
    let node = established();
    let t = node.transport();
    assert_eq!(&t.calls[..2], &["set_last_will", "connect"]);

    let will = t.last_will.as_ref().unwrap();
    assert_eq!(will.topic, "spBv1.0/G/NDEATH/N");
    assert_eq!(will.qos, QoS::AtLeastOnce);
    assert!(!will.retain);

    let death = will.parse();
    assert_eq!(death.seq(), None);
    assert_eq!(death.timestamp(), None);
    assert_eq!(metric_names(&death), vec![BD_SEQ_METRIC]);
    // Death and following birth carry the same bdSeq.
    assert_eq!(bd_seq_of(&death), bd_seq_of(&t.births()[0]));
}

#[test]
fn test_connect_with_host_waits_for_state() {
    let mut node = node_with_host();
    node.connect().unwrap();
    assert_eq!(node.state(), SessionState::AwaitingHost);
    assert!(node.is_connected());
    assert!(node.transport().published.is_empty());
    assert_eq!(
        node.transport().subscriptions,
        vec![
            ("spBv1.0/G/NCMD/N".to_string(), QoS::AtLeastOnce),
            ("spBv1.0/STATE/H".to_string(), QoS::AtLeastOnce),
        ]
    );
}

#[test]
fn test_connect_failure_surfaces_and_is_not_persisted() {
    init_logging();
    let store = MemoryBdSeqStore::with_value(5);
    let mut transport = FakeTransport::new();
    transport.fail_connect = true;
    let mut node = EdgeNode::new(EdgeNodeConfig::new("G", "N"), transport, store.clone());

    assert!(matches!(node.connect(), Err(Error::ConnectionFailed(_))));
    assert_eq!(node.state(), SessionState::Disconnected);
    assert_eq!(store.value(), Some(5));
    // The will was still registered with the about-to-be-used bdSeq.
    let will = node.transport().last_will.as_ref().unwrap().parse();
    assert_eq!(bd_seq_of(&will), MetricValue::Int64(6));
}

#[test]
fn test_host_arbitration_sequence() {
    let mut node = node_with_host();
    node.connect().unwrap();

    node.handle_host_state(host_state(100, true)).unwrap();
    assert_eq!(node.state(), SessionState::Established);

    node.handle_host_state(host_state(50, false)).unwrap();
    assert_eq!(node.state(), SessionState::Established);
    assert_eq!(node.last_host_state(), Some(host_state(100, true)));

    node.handle_host_state(host_state(200, false)).unwrap();
    assert_eq!(node.state(), SessionState::AwaitingHost);

    let t = node.transport();
    assert_eq!(t.births().len(), 1);
    assert_eq!(t.deaths().len(), 1);
    assert_eq!(t.on("NDEATH")[0].qos, QoS::AtLeastOnce);
    // A death does not advance seq.
    assert_eq!(node.seq(), 1);
}

#[test]
fn test_tied_timestamp_same_flag_is_idempotent() {
    let mut node = node_with_host();
    node.connect().unwrap();
    node.handle_host_state(host_state(100, true)).unwrap();
    node.handle_host_state(host_state(100, true)).unwrap();
    assert_eq!(node.transport().births().len(), 1);
}

#[test]
fn test_tied_timestamp_with_flip_is_accepted() {
    let mut node = node_with_host();
    node.connect().unwrap();
    node.handle_host_state(host_state(100, true)).unwrap();
    node.handle_host_state(host_state(100, false)).unwrap();
    assert_eq!(node.state(), SessionState::AwaitingHost);
    assert_eq!(node.transport().deaths().len(), 1);
}

#[test]
fn test_host_returning_reestablishes_with_same_bd_seq() {
    let mut node = node_with_host();
    node.connect().unwrap();
    node.handle_host_state(host_state(1, true)).unwrap();
    node.handle_host_state(host_state(2, false)).unwrap();
    node.handle_host_state(host_state(3, true)).unwrap();

    let births = node.transport().births();
    assert_eq!(births.len(), 2);
    assert_eq!(bd_seq_of(&births[0]), bd_seq_of(&births[1]));
    assert_eq!(births[1].seq(), Some(1));
}

#[test]
fn test_state_messages_via_handle_message() {
    let mut node = node_with_host();
    node.connect().unwrap();
    node.handle_message(&state_message("H", 10, true)).unwrap();
    assert!(node.is_established());

    // Another host's state is not ours.
    node.handle_message(&state_message("Other", 20, false)).unwrap();
    assert!(node.is_established());

    let bad = Message::new("spBv1.0/STATE/H", "not json");
    assert!(matches!(node.handle_message(&bad), Err(Error::StatePayload(_))));
    assert!(node.is_established());
}

#[test]
fn test_unrecognized_topic_ignored() {
    let mut node = established();
    let before = node.transport().published.len();
    node.handle_message(&Message::new("some/other/topic", vec![1, 2, 3]))
        .unwrap();
    assert_eq!(node.transport().published.len(), before);
}

#[test]
fn test_report_by_exception() {
    let mut node = established();

    node.set_metric_value("Temperature", MetricValue::Double(20.0))
        .unwrap();
    node.set_metric_value("Temperature", MetricValue::Double(20.000001))
        .unwrap();
    assert!(node.transport().data().is_empty());

    node.set_metric_value("Temperature", MetricValue::Double(25.0))
        .unwrap();
    let data = node.transport().data();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].seq(), Some(1));
    assert_eq!(metric_names(&data[0]), vec!["Temperature"]);
    assert_eq!(
        data[0].metric_at(0).unwrap().value,
        MetricValue::Double(25.0)
    );
    assert_eq!(node.seq(), 2);
}

#[test]
fn test_batch_update_single_data_message() {
    let mut node = established();
    node.add_metric("Count", DataType::UInt32, MetricValue::UInt32(0))
        .unwrap();
    node.add_metric("Label", DataType::String, MetricValue::from("a"))
        .unwrap();

    node.set_metric_values([
        ("Count", MetricValue::UInt32(1)),
        ("Label", MetricValue::from("a")),
        ("Temperature", MetricValue::Double(30.0)),
    ])
    .unwrap();

    let data = node.transport().data();
    assert_eq!(data.len(), 1);
    assert_eq!(metric_names(&data[0]), vec!["Count", "Temperature"]);
}

#[test]
fn test_invalid_updates_reported_valid_ones_published() {
    let mut node = established();
    let result = node.set_metric_values([
        ("Missing", MetricValue::Int32(1)),
        ("Temperature", MetricValue::Double(1.0)),
        ("Temperature", MetricValue::Int32(1)),
    ]);
    assert!(matches!(result, Err(Error::UnknownMetric(n)) if n == "Missing"));

    let data = node.transport().data();
    assert_eq!(data.len(), 1);
    assert_eq!(
        node.metrics().get("Temperature").unwrap().value,
        MetricValue::Double(1.0)
    );
}

#[test]
fn test_value_stored_while_not_established() {
    let mut node = node_with_host();
    node.add_metric("Level", DataType::Int32, MetricValue::Int32(1))
        .unwrap();
    node.connect().unwrap();

    node.set_metric_value("Level", MetricValue::Int32(2)).unwrap();
    assert!(node.transport().published.is_empty());

    node.handle_host_state(host_state(1, true)).unwrap();
    let birth = &node.transport().births()[0];
    let level = birth
        .metrics()
        .map(|m| m.unwrap())
        .find(|m| m.name.as_deref() == Some("Level"))
        .unwrap();
    assert_eq!(level.value, MetricValue::Int32(2));
}

#[test]
fn test_adding_metric_while_established_rebirths() {
    let mut node = established();
    node.add_metric("Pressure", DataType::Float, MetricValue::Float(1.0))
        .unwrap();

    let t = node.transport();
    let births = t.births();
    assert_eq!(births.len(), 2);
    assert_eq!(
        metric_names(&births[1]),
        vec![BD_SEQ_METRIC, REBIRTH_METRIC, "Temperature", "Pressure"]
    );
    assert_eq!(births[1].seq(), Some(1));
    assert_eq!(bd_seq_of(&births[0]), bd_seq_of(&births[1]));
    assert_eq!(node.seq(), 2);
}

#[test]
fn test_duplicate_add_is_rejected_without_publish() {
    let mut node = established();
    let result = node.add_metric("Temperature", DataType::Int32, MetricValue::Int32(1));
    assert!(matches!(result, Err(Error::DuplicateMetric(_))));
    assert_eq!(node.transport().births().len(), 1);
}

#[test]
fn test_removing_metric_while_established_rebirths() {
    let mut node = established();
    node.remove_metric("Temperature").unwrap();
    let births = node.transport().births();
    assert_eq!(births.len(), 2);
    assert_eq!(metric_names(&births[1]), vec![BD_SEQ_METRIC, REBIRTH_METRIC]);

    // Unknown names are a no-op.
    node.remove_metric("Temperature").unwrap();
    assert_eq!(node.transport().births().len(), 2);
}

#[test]
fn test_alias_announced_in_birth() {
    let mut node = established();
    node.set_metric_alias("Temperature", 7).unwrap();
    let births = node.transport().births();
    let temp = births[1]
        .metrics()
        .map(|m| m.unwrap())
        .find(|m| m.name.as_deref() == Some("Temperature"))
        .unwrap();
    assert_eq!(temp.alias, Some(7));
}

#[test]
fn test_command_dispatch() {
    let mut node = established();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    node.add_command_metric(
        "Setpoint",
        DataType::Int16,
        MetricValue::Int16(0),
        move |v| sink.lock().unwrap().push(v.clone()),
    )
    .unwrap();

    // The datatype is omitted on the wire: the node's known type decides.
    let mut wire = Metric::new("Setpoint", MetricValue::Int16(-5));
    let cmd = {
        let mut builder = sparkplug_edge::PayloadBuilder::new();
        builder.add_metric(&wire).unwrap();
        let payload = sparkplug_edge::Payload::parse(&builder.serialize()).unwrap();
        let mut raw = payload.raw_metrics()[0].clone();
        raw.datatype = None;
        let mut p = sparkplug_edge::proto::Payload::default();
        p.metrics.push(raw);
        Message::new("spBv1.0/G/NCMD/N", prost::Message::encode_to_vec(&p))
    };
    node.handle_message(&cmd).unwrap();

    wire.value = MetricValue::Int16(3);
    node.handle_message(&command_message("G", "N", &[wire])).unwrap();

    assert_eq!(
        *received.lock().unwrap(),
        vec![MetricValue::Int16(-5), MetricValue::Int16(3)]
    );
}

#[test]
fn test_bad_command_metric_does_not_abort_siblings() {
    let mut node = established();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    node.add_command_metric("Go", DataType::Boolean, MetricValue::Boolean(false), move |v| {
        sink.lock().unwrap().push(v.clone())
    })
    .unwrap();

    let mut p = sparkplug_edge::proto::Payload::default();
    p.metrics.push(sparkplug_edge::proto::Metric {
        name: Some("Go".to_string()),
        datatype: Some(DataType::Int32Array.code()),
        value: Some(sparkplug_edge::proto::metric::Value::BytesValue(vec![1])),
        ..Default::default()
    });
    p.metrics.push(
        sparkplug_edge::payload::encode_metric(&Metric::new("Unknown", 1)).unwrap(),
    );
    p.metrics.push(
        sparkplug_edge::payload::encode_metric(&Metric::new("Go", true)).unwrap(),
    );
    let msg = Message::new("spBv1.0/G/NCMD/N", prost::Message::encode_to_vec(&p));
    node.handle_message(&msg).unwrap();

    assert_eq!(*received.lock().unwrap(), vec![MetricValue::Boolean(true)]);
}

#[test]
fn test_execute_unknown_command() {
    let mut node = established();
    assert!(matches!(
        node.execute_command("Nope", MetricValue::Boolean(true)),
        Err(Error::UnknownCommand(_))
    ));
}

#[test]
fn test_rebirth_command() {
    let mut node = established();
    node.handle_message(&command_message(
        "G",
        "N",
        &[Metric::new(REBIRTH_METRIC, false)],
    ))
    .unwrap();
    assert_eq!(node.transport().births().len(), 1);

    node.handle_message(&command_message(
        "G",
        "N",
        &[Metric::new(REBIRTH_METRIC, true)],
    ))
    .unwrap();
    assert_eq!(node.transport().births().len(), 2);
}

#[test]
fn test_rebirth_ignored_when_not_established() {
    let mut node = node_with_host();
    node.connect().unwrap();
    node.execute_command(REBIRTH_METRIC, MetricValue::Boolean(true))
        .unwrap();
    assert!(node.transport().births().is_empty());
}

#[test]
fn test_removed_command_no_longer_dispatched() {
    let mut node = established();
    node.add_command_metric("Reset", DataType::Boolean, MetricValue::Boolean(false), |_| {})
        .unwrap();
    node.remove_metric("Reset").unwrap();
    assert!(matches!(
        node.execute_command("Reset", MetricValue::Boolean(true)),
        Err(Error::UnknownCommand(_))
    ));
}

#[test]
fn test_disconnect_publishes_death_first() {
    let mut node = established();
    node.disconnect().unwrap();
    assert_eq!(node.state(), SessionState::Disconnected);

    let t = node.transport();
    assert_eq!(&t.calls[t.calls.len() - 2..], &["publish", "disconnect"]);
    assert_eq!(t.deaths().len(), 1);
    assert!(!t.connected);

    // Idempotent.
    node.disconnect().unwrap();
    assert_eq!(node.transport().deaths().len(), 1);
}

#[test]
fn test_disconnect_while_awaiting_host_sends_no_death() {
    let mut node = node_with_host();
    node.disconnect().unwrap();
    node.connect().unwrap();
    node.disconnect().unwrap();
    assert!(node.transport().deaths().is_empty());
    assert_eq!(node.transport().calls.last(), Some(&"disconnect"));
}

#[test]
fn test_seq_wraps() {
    let mut node = established();
    node.add_metric("N", DataType::Int32, MetricValue::Int32(0))
        .unwrap();
    let start = node.seq();
    for i in 1..=256 {
        node.set_metric_value("N", MetricValue::Int32(i)).unwrap();
    }
    assert_eq!(node.seq(), start);

    let data = node.transport().data();
    assert_eq!(data[0].seq(), Some(2));
    assert_eq!(data[253].seq(), Some(255));
    assert_eq!(data[254].seq(), Some(0));
}

#[test]
fn test_process_pending_drains_queue() {
    let mut node = node_with_host();
    node.connect().unwrap();
    node.transport_mut()
        .push_inbound(state_message("H", 1, true));
    node.transport_mut()
        .push_inbound(command_message("G", "N", &[Metric::new(REBIRTH_METRIC, true)]));
    node.transport_mut()
        .push_inbound(Message::new("spBv1.0/STATE/H", "garbage"));

    assert_eq!(node.process_pending(), 3);
    assert!(node.transport().inbound.is_empty());
    assert_eq!(node.transport().births().len(), 2);
}

#[test]
fn test_process_pending_idle_when_disconnected() {
    let mut node = node_with_host();
    node.transport_mut()
        .push_inbound(state_message("H", 1, true));
    assert_eq!(node.process_pending(), 0);
    assert_eq!(node.transport().inbound.len(), 1);
}

#[test]
fn test_keep_alive_tick_gated_on_connection() {
    let mut node = node_with_host();
    assert!(!node.keep_alive_tick().unwrap());
    node.connect().unwrap();
    assert!(node.keep_alive_tick().unwrap());
    assert_eq!(node.transport().pings, 1);
}
