//! Sparkplug B edge node client.
//!
//! This crate implements the edge node side of Sparkplug B 3.0 over any MQTT
//! client that implements [`Transport`]:
//!
//! - the session state machine: NBIRTH/NDEATH certificates, the wrapping
//!   `seq` and persisted `bdSeq` counters, report-by-exception NDATA and
//!   primary host STATE arbitration,
//! - the binary payload codec, including DataSets and packed array types.
//!
//! # Architecture
//!
//! - [`EdgeNode`]: owns the transport, the [`MetricStore`] and the counters
//! - [`PayloadBuilder`] / [`Payload`]: encode and decode Sparkplug payloads
//! - [`BdSeqStore`]: durable slot for `bdSeq` ([`FileBdSeqStore`], [`MemoryBdSeqStore`])
//! - [`NodeTasks`]: background inbound pump and keep-alive threads
//!
//! # Example
//!
//! ```no_run
//! use sparkplug_edge::{
//!     DataType, EdgeNode, EdgeNodeConfig, FileBdSeqStore, MetricValue, NodeTasks, TaskConfig,
//!     Transport,
//! };
//! use std::sync::{Arc, Mutex};
//!
//! # fn run<T: Transport + Send + 'static>(transport: T) -> sparkplug_edge::Result<()> {
//! let config = EdgeNodeConfig::new("Energy", "Gateway01").with_primary_host("Scada");
//! let mut node = EdgeNode::new(config, transport, FileBdSeqStore::new("bdSeq"));
//!
//! node.add_metric("Temperature", DataType::Double, MetricValue::Double(20.5))?;
//! node.add_command_metric("Setpoint", DataType::Double, MetricValue::Double(20.0), |v| {
//!     println!("new setpoint: {:?}", v);
//! })?;
//! node.connect()?;
//!
//! let node = Arc::new(Mutex::new(node));
//! let tasks = NodeTasks::spawn(Arc::clone(&node), TaskConfig::default());
//!
//! node.lock().unwrap().set_metric_value("Temperature", MetricValue::Double(21.0))?;
//!
//! tasks.stop();
//! node.lock().unwrap().disconnect()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod dataset;
pub mod error;
pub mod metrics;
pub mod node;
pub mod payload;
pub mod persistence;
pub mod proto;
pub mod runtime;
pub mod topic;
pub mod transport;
pub mod types;

pub use dataset::DataSet;
pub use error::{Error, Result};
pub use metrics::{values_equivalent, MetricEntry, MetricStore};
pub use node::{EdgeNode, EdgeNodeConfig, HostState, SessionState};
pub use payload::{extract_value, Payload, PayloadBuilder};
pub use persistence::{BdSeqStore, FileBdSeqStore, MemoryBdSeqStore};
pub use runtime::{NodeTasks, SharedNode, TaskConfig};
pub use topic::{MessageType, NodeTopics, ParsedTopic};
pub use transport::{Message, QoS, Transport};
pub use types::{DataType, Metric, MetricValue};
