//! Sparkplug edge node session management.

use crate::error::{Error, Result};
use crate::metrics::MetricStore;
use crate::payload::{extract_value, Payload, PayloadBuilder};
use crate::persistence::BdSeqStore;
use crate::topic::{Inbound, NodeTopics};
use crate::transport::{Message, QoS, Transport};
use crate::types::{now_millis, DataType, Metric, MetricValue};
use indexmap::IndexMap;
use serde::Deserialize;

/// Name of the built-in rebirth command metric.
pub const REBIRTH_METRIC: &str = "Node Control/Rebirth";

/// Name of the bdSeq metric carried in birth and death certificates.
pub const BD_SEQ_METRIC: &str = "bdSeq";

/// Callback invoked with the value of a received command.
pub type CommandCallback = Box<dyn FnMut(&MetricValue) + Send + 'static>;

/// Configuration for an edge node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeNodeConfig {
    /// Sparkplug group ID.
    pub group_id: String,
    /// Edge node identifier.
    pub edge_node_id: String,
    /// Primary host application whose STATE gates the session, if any.
    pub primary_host_id: Option<String>,
}

impl EdgeNodeConfig {
    /// Creates a configuration without a primary host.
    pub fn new(group_id: impl Into<String>, edge_node_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            edge_node_id: edge_node_id.into(),
            primary_host_id: None,
        }
    }

    /// Waits for this primary host to be online before publishing a birth.
    pub fn with_primary_host(mut self, host_id: impl Into<String>) -> Self {
        self.primary_host_id = Some(host_id.into());
        self
    }
}

/// Session state of an edge node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport connection.
    Disconnected,
    /// Connected, but the primary host has not been seen online (or went
    /// offline after the session was established).
    AwaitingHost,
    /// Birth published; data and commands flow.
    Established,
}

/// A primary host application STATE message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HostState {
    /// Host timestamp in milliseconds since Unix epoch.
    pub timestamp: u64,
    /// Whether the host is online.
    pub online: bool,
}

impl HostState {
    /// Parses a JSON STATE payload; unknown fields are ignored.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

enum Command {
    Rebirth,
    Callback(CommandCallback),
}

/// A Sparkplug B edge node.
///
/// The node owns the transport, the metric table and the session counters.
/// It publishes NBIRTH, NDATA and NDEATH, registers NDEATH as the MQTT last
/// will, and follows the primary host's STATE when one is configured.
///
/// All methods expect a single caller at a time; share a node between
/// threads behind a `Mutex` (see [`NodeTasks`](crate::NodeTasks)).
///
/// # Example
///
/// ```no_run
/// # use sparkplug_edge::{EdgeNode, EdgeNodeConfig, FileBdSeqStore, DataType, MetricValue, Transport};
/// # fn run<T: Transport>(transport: T) -> sparkplug_edge::Result<()> {
/// let config = EdgeNodeConfig::new("Energy", "Gateway01").with_primary_host("Scada");
/// let mut node = EdgeNode::new(config, transport, FileBdSeqStore::new("bdSeq"));
///
/// node.add_metric("Temperature", DataType::Double, MetricValue::Double(20.5))?;
/// node.connect()?;
///
/// // Published as NDATA once the host is online.
/// node.set_metric_value("Temperature", MetricValue::Double(21.0))?;
///
/// node.disconnect()?;
/// # Ok(())
/// # }
/// ```
pub struct EdgeNode<T: Transport, S: BdSeqStore> {
    config: EdgeNodeConfig,
    topics: NodeTopics,
    transport: T,
    store: S,
    state: SessionState,
    seq: u8,
    bd_seq: u8,
    metrics: MetricStore,
    commands: IndexMap<String, Command>,
    last_host_state: Option<HostState>,
}

impl<T: Transport, S: BdSeqStore> EdgeNode<T, S> {
    /// Creates a disconnected node, loading bdSeq from `store`.
    ///
    /// An unreadable store is logged and treated as bdSeq 0.
    pub fn new(config: EdgeNodeConfig, transport: T, store: S) -> Self {
        let bd_seq = match store.load() {
            Ok(v) => {
                log::debug!("Loaded bdSeq {}", v);
                v
            }
            Err(e) => {
                log::warn!("Could not load bdSeq ({}), starting at 0", e);
                0
            }
        };

        let topics = NodeTopics::new(
            &config.group_id,
            &config.edge_node_id,
            config.primary_host_id.as_deref(),
        );

        let mut metrics = MetricStore::new();
        let mut commands = IndexMap::new();
        // A fresh store cannot already contain this name.
        let _ = metrics.insert(REBIRTH_METRIC, DataType::Boolean, MetricValue::Boolean(false));
        commands.insert(REBIRTH_METRIC.to_string(), Command::Rebirth);

        Self {
            config,
            topics,
            transport,
            store,
            state: SessionState::Disconnected,
            seq: 0,
            bd_seq,
            metrics,
            commands,
            last_host_state: None,
        }
    }

    /// Gets the node configuration.
    pub fn config(&self) -> &EdgeNodeConfig {
        &self.config
    }

    /// Gets the topics this node uses.
    pub fn topics(&self) -> &NodeTopics {
        &self.topics
    }

    /// Gets the current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true while the transport connection is open.
    pub fn is_connected(&self) -> bool {
        self.state != SessionState::Disconnected
    }

    /// Returns true once a birth has been published for the current session.
    pub fn is_established(&self) -> bool {
        self.state == SessionState::Established
    }

    /// Gets the next message sequence number (0-255).
    pub fn seq(&self) -> u8 {
        self.seq
    }

    /// Gets the current birth/death sequence number (0-255).
    pub fn bd_seq(&self) -> u8 {
        self.bd_seq
    }

    /// Gets the metric table.
    pub fn metrics(&self) -> &MetricStore {
        &self.metrics
    }

    /// Gets the last accepted primary host state.
    pub fn last_host_state(&self) -> Option<HostState> {
        self.last_host_state
    }

    /// Gets the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Gets the transport mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Connects to the broker.
    ///
    /// bdSeq is incremented first so the NDEATH last will carries the value
    /// of the session being opened. It is persisted once the transport
    /// reports success; a failed save is returned to the caller. Without a
    /// primary host the birth is published immediately.
    pub fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            log::warn!("connect() called while already connected");
            return Ok(());
        }

        self.bd_seq = self.bd_seq.wrapping_add(1);
        let death = self.death_payload();
        self.transport
            .set_last_will(&self.topics.death, &death, QoS::AtLeastOnce, false)?;
        log::debug!("Last will set for {}", self.topics.death);

        self.transport.connect()?;
        self.state = SessionState::AwaitingHost;
        self.store.save(self.bd_seq)?;
        log::debug!("Connected with bdSeq {}", self.bd_seq);

        self.transport
            .subscribe(&self.topics.command, QoS::AtLeastOnce)?;
        log::debug!("Subscribed to {}", self.topics.command);

        match self.topics.host_state.clone() {
            Some(topic) => {
                self.transport.subscribe(&topic, QoS::AtLeastOnce)?;
                log::debug!("Subscribed to {}", topic);
                Ok(())
            }
            None => self.establish(),
        }
    }

    /// Disconnects from the broker.
    ///
    /// An established session publishes NDEATH first. Calling this while
    /// already disconnected does nothing.
    pub fn disconnect(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }
        if self.is_established() {
            if let Err(e) = self.terminate() {
                log::error!("Failed to publish NDEATH before disconnect: {}", e);
            }
        }
        self.state = SessionState::Disconnected;
        self.transport.disconnect()?;
        log::debug!("Disconnected");
        Ok(())
    }

    /// Registers a data metric.
    ///
    /// An established session republishes its birth so the host learns the
    /// new metric.
    pub fn add_metric(
        &mut self,
        name: impl Into<String>,
        datatype: DataType,
        value: MetricValue,
    ) -> Result<()> {
        let name = name.into();
        if let Err(e) = self.metrics.insert(name.clone(), datatype, value) {
            log::warn!("Not adding metric {}: {}", name, e);
            return Err(e);
        }
        if self.is_established() {
            log::debug!("Publishing rebirth because metric {} was added", name);
            self.publish_birth()?;
        }
        Ok(())
    }

    /// Registers a metric that also accepts commands.
    ///
    /// `callback` runs with the value of every NCMD addressed to `name`.
    pub fn add_command_metric<F>(
        &mut self,
        name: impl Into<String>,
        datatype: DataType,
        value: MetricValue,
        callback: F,
    ) -> Result<()>
    where
        F: FnMut(&MetricValue) + Send + 'static,
    {
        let name = name.into();
        if self.metrics.contains(&name) {
            log::warn!("Not adding command metric {}: already exists", name);
            return Err(Error::DuplicateMetric(name));
        }
        self.commands
            .insert(name.clone(), Command::Callback(Box::new(callback)));
        let added = self.add_metric(name.clone(), datatype, value);
        if added.is_err() && !self.metrics.contains(&name) {
            self.commands.shift_remove(&name);
        }
        added
    }

    /// Removes a metric and any command of the same name.
    ///
    /// Unknown names are ignored. An established session republishes its
    /// birth.
    pub fn remove_metric(&mut self, name: &str) -> Result<()> {
        if self.metrics.remove(name).is_none() {
            log::warn!("Metric {} does not exist, not removing", name);
            return Ok(());
        }
        self.commands.shift_remove(name);
        if self.is_established() {
            log::debug!("Publishing rebirth because metric {} was removed", name);
            self.publish_birth()?;
        }
        Ok(())
    }

    /// Sets the alias announced for a metric in the birth certificate.
    pub fn set_metric_alias(&mut self, name: &str, alias: u64) -> Result<()> {
        self.metrics.set_alias(name, alias)?;
        if self.is_established() {
            self.publish_birth()?;
        }
        Ok(())
    }

    /// Updates a metric value (report by exception).
    ///
    /// An unchanged value publishes nothing. A changed value is stored and,
    /// if the session is established, published as NDATA containing only
    /// this metric.
    pub fn set_metric_value(&mut self, name: &str, value: MetricValue) -> Result<()> {
        self.set_metric_values([(name, value)])
    }

    /// Updates several metric values and publishes the changed ones in a
    /// single NDATA.
    ///
    /// Invalid updates are skipped; the first error is returned after the
    /// valid updates have been applied and published.
    pub fn set_metric_values<'a, I>(&mut self, updates: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, MetricValue)>,
    {
        let mut changed = Vec::new();
        let mut first_err = None;
        for (name, value) in updates {
            match self.metrics.update(name, value) {
                Ok(true) => changed.push(name.to_string()),
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Not setting metric {}: {}", name, e);
                    first_err.get_or_insert(e);
                }
            }
        }

        if !changed.is_empty() && self.is_established() {
            self.publish_data(&changed)?;
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Runs the command registered under `name` with `value`.
    pub fn execute_command(&mut self, name: &str, value: MetricValue) -> Result<()> {
        log::debug!("Executing command {} with value {:?}", name, value);
        match self.commands.get_mut(name) {
            Some(Command::Callback(callback)) => {
                callback(&value);
                return Ok(());
            }
            Some(Command::Rebirth) => {}
            None => return Err(Error::UnknownCommand(name.to_string())),
        }

        if value == MetricValue::Boolean(true) && self.is_established() {
            self.publish_birth()?;
        }
        Ok(())
    }

    /// Handles one inbound message.
    ///
    /// Topics not addressed to this node are ignored.
    pub fn handle_message(&mut self, message: &Message) -> Result<()> {
        log::debug!("Received message on {}", message.topic);
        match self.topics.classify(&message.topic) {
            Some(Inbound::Command) => self.handle_command(&message.payload_data),
            Some(Inbound::HostState) => {
                let state = HostState::parse(&message.payload_data)?;
                self.handle_host_state(state)
            }
            None => Ok(()),
        }
    }

    /// Drains every message the transport has buffered.
    ///
    /// Returns how many were taken. Per-message failures are logged.
    pub fn process_pending(&mut self) -> usize {
        if !self.is_connected() {
            return 0;
        }
        let mut count = 0;
        while let Some(message) = self.transport.poll_message() {
            if let Err(e) = self.handle_message(&message) {
                log::warn!("Error while handling message on {}: {}", message.topic, e);
            }
            count += 1;
        }
        count
    }

    /// Pings the transport if connected; returns whether a ping was sent.
    pub fn keep_alive_tick(&mut self) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        self.transport.ping()?;
        Ok(true)
    }

    /// Applies a primary host STATE update.
    ///
    /// Updates older than the last accepted one are ignored. Only a change of
    /// the online flag relative to the session establishes or terminates it.
    pub fn handle_host_state(&mut self, update: HostState) -> Result<()> {
        log::debug!(
            "Primary host state: online={}, timestamp={}",
            update.online,
            update.timestamp
        );
        if let Some(last) = self.last_host_state {
            if update.timestamp < last.timestamp {
                log::debug!(
                    "Ignoring stale host state {} < {}",
                    update.timestamp,
                    last.timestamp
                );
                return Ok(());
            }
        }
        self.last_host_state = Some(update);

        match (update.online, self.state) {
            (true, SessionState::AwaitingHost) => self.establish(),
            (false, SessionState::Established) => self.terminate(),
            _ => Ok(()),
        }
    }

    fn handle_command(&mut self, data: &[u8]) -> Result<()> {
        let payload = Payload::parse(data)?;
        for raw in payload.raw_metrics() {
            let Some(name) = raw.name.as_deref() else {
                log::warn!("Skipping command metric without a name");
                continue;
            };
            let value = match extract_value(raw, self.metrics.datatype(name)) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("Skipping command {}: {}", name, e);
                    continue;
                }
            };
            match self.execute_command(name, value) {
                Err(Error::UnknownCommand(_)) => {
                    log::warn!("Command {} does not exist, not executing", name);
                }
                Err(e) => log::warn!("Command {} failed: {}", name, e),
                Ok(()) => {}
            }
        }
        Ok(())
    }

    fn establish(&mut self) -> Result<()> {
        log::debug!("Establishing Sparkplug session");
        self.state = SessionState::Established;
        self.publish_birth()
    }

    fn terminate(&mut self) -> Result<()> {
        log::debug!("Terminating Sparkplug session");
        self.state = SessionState::AwaitingHost;
        let death = self.death_payload();
        self.transport
            .publish(&self.topics.death, &death, QoS::AtLeastOnce, false)
    }

    fn publish_birth(&mut self) -> Result<()> {
        let now = now_millis();
        let mut builder = PayloadBuilder::new();
        builder
            .set_timestamp(now)
            .set_seq(u64::from(self.seq))
            .add_metric(&self.bd_seq_metric(now))?;
        builder.add_metrics(&self.metrics.snapshot_all(now));

        self.transport
            .publish(&self.topics.birth, &builder.serialize(), QoS::AtMostOnce, false)?;
        log::debug!("Published NBIRTH seq={} bdSeq={}", self.seq, self.bd_seq);
        self.seq = self.seq.wrapping_add(1);
        Ok(())
    }

    fn publish_data(&mut self, names: &[String]) -> Result<()> {
        let now = now_millis();
        let metrics: Vec<Metric> = names
            .iter()
            .filter_map(|name| self.metrics.snapshot(name, now))
            .collect();
        let mut builder = PayloadBuilder::new();
        builder
            .set_timestamp(now)
            .set_seq(u64::from(self.seq))
            .add_metrics(&metrics);

        self.transport
            .publish(&self.topics.data, &builder.serialize(), QoS::AtMostOnce, false)?;
        log::debug!("Published NDATA seq={} ({} metrics)", self.seq, metrics.len());
        self.seq = self.seq.wrapping_add(1);
        Ok(())
    }

    fn death_payload(&self) -> Vec<u8> {
        let mut builder = PayloadBuilder::new();
        builder.add_metrics([&self.bd_seq_metric(now_millis())]);
        builder.serialize()
    }

    fn bd_seq_metric(&self, timestamp: u64) -> Metric {
        Metric::new(BD_SEQ_METRIC, MetricValue::Int64(i64::from(self.bd_seq)))
            .with_timestamp(timestamp)
    }
}

impl<T: Transport, S: BdSeqStore> Drop for EdgeNode<T, S> {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            log::error!("Error while disconnecting on drop: {}", e);
        }
    }
}
