//! In-memory transport shared by the integration tests.
#![allow(dead_code)]

use sparkplug_edge::{
    Error, MemoryBdSeqStore, Message, Metric, Payload, PayloadBuilder, QoS, Result, Transport,
};
use std::collections::VecDeque;
use std::time::Duration;

/// A message handed to the transport for publishing (or as last will).
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl Published {
    pub fn parse(&self) -> Payload {
        Payload::parse(&self.payload).unwrap()
    }
}

/// Records every call; inbound messages are queued by the test.
#[derive(Debug, Default)]
pub struct FakeTransport {
    pub connected: bool,
    pub fail_connect: bool,
    pub keep_alive: Duration,
    pub published: Vec<Published>,
    pub subscriptions: Vec<(String, QoS)>,
    pub last_will: Option<Published>,
    pub pings: usize,
    pub inbound: VecDeque<Message>,
    pub calls: Vec<&'static str>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keep_alive(keep_alive: Duration) -> Self {
        Self {
            keep_alive,
            ..Self::default()
        }
    }

    pub fn on(&self, kind: &str) -> Vec<&Published> {
        self.published
            .iter()
            .filter(|p| p.topic.split('/').nth(2) == Some(kind))
            .collect()
    }

    pub fn births(&self) -> Vec<Payload> {
        self.on("NBIRTH").iter().map(|p| p.parse()).collect()
    }

    pub fn deaths(&self) -> Vec<Payload> {
        self.on("NDEATH").iter().map(|p| p.parse()).collect()
    }

    pub fn data(&self) -> Vec<Payload> {
        self.on("NDATA").iter().map(|p| p.parse()).collect()
    }

    pub fn push_inbound(&mut self, message: Message) {
        self.inbound.push_back(message);
    }
}

impl Transport for FakeTransport {
    fn connect(&mut self) -> Result<()> {
        self.calls.push("connect");
        if self.fail_connect {
            return Err(Error::ConnectionFailed("refused".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.calls.push("disconnect");
        self.connected = false;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<()> {
        self.calls.push("publish");
        self.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain,
        });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<()> {
        self.calls.push("subscribe");
        self.subscriptions.push((topic.to_string(), qos));
        Ok(())
    }

    fn set_last_will(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<()> {
        self.calls.push("set_last_will");
        self.last_will = Some(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain,
        });
        Ok(())
    }

    fn ping(&mut self) -> Result<()> {
        self.pings += 1;
        Ok(())
    }

    fn poll_message(&mut self) -> Option<Message> {
        self.inbound.pop_front()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn keep_alive(&self) -> Duration {
        self.keep_alive
    }
}

pub type TestNode = sparkplug_edge::EdgeNode<FakeTransport, MemoryBdSeqStore>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn state_message(host_id: &str, timestamp: u64, online: bool) -> Message {
    Message::new(
        format!("spBv1.0/STATE/{}", host_id),
        format!(r#"{{"timestamp":{},"online":{}}}"#, timestamp, online),
    )
}

pub fn command_message(group_id: &str, edge_node_id: &str, metrics: &[Metric]) -> Message {
    let mut builder = PayloadBuilder::new();
    builder.add_metrics(metrics);
    Message::new(
        format!("spBv1.0/{}/NCMD/{}", group_id, edge_node_id),
        builder.serialize(),
    )
}

/// Names of the metrics in a payload, in order.
pub fn metric_names(payload: &Payload) -> Vec<String> {
    payload
        .raw_metrics()
        .iter()
        .map(|m| m.name.clone().unwrap_or_default())
        .collect()
}
