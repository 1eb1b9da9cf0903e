//! Topic names for a single edge node.
//!
//! Only two shapes matter here:
//! - `spBv1.0/{group_id}/{message_type}/{edge_node_id}` for node messages
//! - `spBv1.0/STATE/{host_id}` for the primary host's online flag
//!
//! Device-level topics are rejected.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Topic namespace prefix.
pub const NAMESPACE: &str = "spBv1.0";

/// Message types an edge node publishes or listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Birth certificate carrying every metric.
    NBirth,
    /// Death certificate, normally delivered as the last will.
    NDeath,
    /// Changed metric values.
    NData,
    /// Command written to the node.
    NCmd,
    /// Primary host online flag.
    State,
}

impl MessageType {
    const ALL: [MessageType; 5] = [
        MessageType::NBirth,
        MessageType::NDeath,
        MessageType::NData,
        MessageType::NCmd,
        MessageType::State,
    ];

    /// The topic token, e.g. `NBIRTH`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NBirth => "NBIRTH",
            Self::NDeath => "NDEATH",
            Self::NData => "NDATA",
            Self::NCmd => "NCMD",
            Self::State => "STATE",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == token)
            .ok_or_else(|| Error::InvalidTopic(format!("unknown message type: {}", token)))
    }
}

/// A topic split into its Sparkplug parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTopic {
    /// `spBv1.0/{group_id}/{message_type}/{edge_node_id}`
    Node {
        /// NBIRTH, NDEATH, NDATA or NCMD.
        message_type: MessageType,
        /// Group the node belongs to.
        group_id: String,
        /// Node identifier within the group.
        edge_node_id: String,
    },
    /// `spBv1.0/STATE/{host_id}`
    State {
        /// Primary host identifier.
        host_id: String,
    },
}

impl ParsedTopic {
    /// Splits a topic string.
    ///
    /// ```
    /// use sparkplug_edge::ParsedTopic;
    ///
    /// let topic = ParsedTopic::parse("spBv1.0/Energy/NCMD/Gateway01")?;
    /// assert_eq!(topic.edge_node_id(), Some("Gateway01"));
    ///
    /// let topic = ParsedTopic::parse("spBv1.0/STATE/ScadaHost01")?;
    /// assert_eq!(topic.host_id(), Some("ScadaHost01"));
    /// # Ok::<(), sparkplug_edge::Error>(())
    /// ```
    pub fn parse(topic: &str) -> Result<Self> {
        let parts: Vec<&str> = topic.split('/').collect();
        match parts.as_slice() {
            [ns, "STATE", host_id] if *ns == NAMESPACE => Ok(ParsedTopic::State {
                host_id: host_id.to_string(),
            }),
            [ns, group_id, token, edge_node_id] if *ns == NAMESPACE => {
                match token.parse::<MessageType>()? {
                    MessageType::State => Err(Error::InvalidTopic(format!(
                        "STATE is not a node message type: {}",
                        topic
                    ))),
                    message_type => Ok(ParsedTopic::Node {
                        message_type,
                        group_id: group_id.to_string(),
                        edge_node_id: edge_node_id.to_string(),
                    }),
                }
            }
            [ns, ..] if *ns == NAMESPACE => Err(Error::InvalidTopic(format!(
                "unexpected topic shape ({} levels): {}",
                parts.len(),
                topic
            ))),
            _ => Err(Error::InvalidTopic(format!(
                "missing '{}' namespace: {}",
                NAMESPACE, topic
            ))),
        }
    }

    /// Message type; STATE topics report [`MessageType::State`].
    pub fn message_type(&self) -> MessageType {
        match self {
            ParsedTopic::Node { message_type, .. } => *message_type,
            ParsedTopic::State { .. } => MessageType::State,
        }
    }

    /// Group ID of a node topic.
    pub fn group_id(&self) -> Option<&str> {
        if let ParsedTopic::Node { group_id, .. } = self {
            Some(group_id)
        } else {
            None
        }
    }

    /// Edge node ID of a node topic.
    pub fn edge_node_id(&self) -> Option<&str> {
        if let ParsedTopic::Node { edge_node_id, .. } = self {
            Some(edge_node_id)
        } else {
            None
        }
    }

    /// Host ID of a STATE topic.
    pub fn host_id(&self) -> Option<&str> {
        if let ParsedTopic::State { host_id } = self {
            Some(host_id)
        } else {
            None
        }
    }

    /// Joins the parts back into a topic string.
    pub fn to_topic_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ParsedTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedTopic::Node {
                message_type,
                group_id,
                edge_node_id,
            } => write!(f, "{NAMESPACE}/{group_id}/{message_type}/{edge_node_id}"),
            ParsedTopic::State { host_id } => write!(f, "{NAMESPACE}/STATE/{host_id}"),
        }
    }
}

/// What an inbound topic means to a particular edge node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// A command addressed to this node.
    Command,
    /// A state update from the configured primary host.
    HostState,
}

/// The topic strings one edge node publishes and subscribes to.
///
/// Built by plain substitution of the configured identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTopics {
    /// NBIRTH topic.
    pub birth: String,
    /// NDEATH topic.
    pub death: String,
    /// NDATA topic.
    pub data: String,
    /// NCMD topic.
    pub command: String,
    /// Primary host STATE topic, if a host is configured.
    pub host_state: Option<String>,
}

impl NodeTopics {
    /// Builds the topic set for a node.
    pub fn new(group_id: &str, edge_node_id: &str, primary_host_id: Option<&str>) -> Self {
        let node = |message_type| {
            ParsedTopic::Node {
                message_type,
                group_id: group_id.to_string(),
                edge_node_id: edge_node_id.to_string(),
            }
            .to_topic_string()
        };
        Self {
            birth: node(MessageType::NBirth),
            death: node(MessageType::NDeath),
            data: node(MessageType::NData),
            command: node(MessageType::NCmd),
            host_state: primary_host_id.map(|host_id| {
                ParsedTopic::State {
                    host_id: host_id.to_string(),
                }
                .to_topic_string()
            }),
        }
    }

    /// Classifies an inbound topic; anything not addressed to this node is `None`.
    pub fn classify(&self, topic: &str) -> Option<Inbound> {
        if topic == self.command {
            Some(Inbound::Command)
        } else if self.host_state.as_deref() == Some(topic) {
            Some(Inbound::HostState)
        } else {
            None
        }
    }
}
