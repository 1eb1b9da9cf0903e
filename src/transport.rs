//! The MQTT capability surface an edge node drives.
//!
//! The edge node never talks to a broker directly. Anything implementing
//! [`Transport`] (an MQTT client wrapper, or an in-memory fake in tests) can
//! carry a Sparkplug session.

use crate::error::Result;
use crate::payload::Payload;
use std::time::Duration;

/// MQTT delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QoS {
    /// QoS 0
    AtMostOnce,
    /// QoS 1
    AtLeastOnce,
    /// QoS 2
    ExactlyOnce,
}

impl QoS {
    /// Numeric MQTT QoS level.
    pub fn level(self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// Message received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// MQTT topic string.
    pub topic: String,
    /// Raw payload data.
    pub payload_data: Vec<u8>,
}

impl Message {
    /// Creates a message.
    pub fn new(topic: impl Into<String>, payload_data: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload_data: payload_data.into(),
        }
    }

    /// Parses the payload into a structured Payload object.
    pub fn parse_payload(&self) -> Result<Payload> {
        Payload::parse(&self.payload_data)
    }
}

/// Publish/subscribe primitives required by [`EdgeNode`](crate::EdgeNode).
///
/// Calls are made from a single owner at a time. Publishing is
/// fire-and-forget: an `Ok` only means the transport accepted the message.
pub trait Transport {
    /// Opens the connection, sending any registered last will.
    fn connect(&mut self) -> Result<()>;

    /// Closes the connection.
    fn disconnect(&mut self) -> Result<()>;

    /// Publishes a message.
    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<()>;

    /// Subscribes to a topic.
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<()>;

    /// Registers the last will to be sent with the next connect.
    fn set_last_will(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<()>;

    /// Sends a keep-alive ping.
    fn ping(&mut self) -> Result<()>;

    /// Returns the next buffered inbound message without blocking.
    fn poll_message(&mut self) -> Option<Message>;

    /// Returns true while the connection is up.
    fn is_connected(&self) -> bool;

    /// The negotiated keep-alive interval; zero disables pings.
    fn keep_alive(&self) -> Duration;
}
