//! Background threads that keep a connected node serviced.
//!
//! Two threads share the node through a mutex: an inbound pump that drains
//! every buffered message and then sleeps for a short interval, and a
//! keep-alive ticker that pings the transport every half keep-alive period
//! while connected. Both stop when the [`NodeTasks`] handle is stopped or
//! dropped.

use crate::node::EdgeNode;
use crate::persistence::BdSeqStore;
use crate::transport::Transport;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default pause between inbound drains.
pub const DEFAULT_PUMP_INTERVAL: Duration = Duration::from_millis(200);

/// An edge node shared between the application and its background threads.
pub type SharedNode<T, S> = Arc<Mutex<EdgeNode<T, S>>>;

/// Tuning for [`NodeTasks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskConfig {
    /// Pause between inbound drains.
    pub pump_interval: Duration,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            pump_interval: DEFAULT_PUMP_INTERVAL,
        }
    }
}

/// Handle to a node's background threads.
pub struct NodeTasks {
    stop: Vec<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl NodeTasks {
    /// Starts the inbound pump and, if the transport has a non-zero
    /// keep-alive, the keep-alive ticker.
    pub fn spawn<T, S>(node: SharedNode<T, S>, config: TaskConfig) -> Self
    where
        T: Transport + Send + 'static,
        S: BdSeqStore + Send + 'static,
    {
        let mut tasks = Self {
            stop: Vec::new(),
            handles: Vec::new(),
        };

        let pump_node = Arc::clone(&node);
        tasks.every(config.pump_interval, move || {
            let taken = lock(&pump_node).process_pending();
            if taken > 0 {
                log::debug!("Processed {} inbound messages", taken);
            }
        });

        let keep_alive = lock(&node).transport().keep_alive();
        if keep_alive.is_zero() {
            log::debug!("Keep-alive disabled");
        } else {
            tasks.every(keep_alive / 2, move || {
                if let Err(e) = lock(&node).keep_alive_tick() {
                    log::error!("Keep-alive ping failed: {}", e);
                }
            });
        }
        tasks
    }

    /// Number of running background threads.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no threads were started.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stops the threads and waits for them to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn every<F>(&mut self, period: Duration, mut tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || loop {
            match rx.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => tick(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        self.stop.push(tx);
        self.handles.push(handle);
    }

    fn shutdown(&mut self) {
        for tx in self.stop.drain(..) {
            let _ = tx.send(());
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("Background task panicked");
            }
        }
    }
}

impl Drop for NodeTasks {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
