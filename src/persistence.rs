//! Durable storage for the birth/death sequence number.
//!
//! bdSeq is the only counter that outlives a process. It is read once when
//! an [`EdgeNode`](crate::EdgeNode) is created and written after every
//! successful connect.

use crate::error::Result;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A durable slot holding one bdSeq value.
pub trait BdSeqStore {
    /// Reads the stored value.
    fn load(&self) -> Result<u8>;

    /// Writes the value; must be durable when this returns `Ok`.
    fn save(&mut self, bd_seq: u8) -> Result<()>;
}

/// Stores bdSeq as a decimal number in a text file.
#[derive(Debug, Clone)]
pub struct FileBdSeqStore {
    path: PathBuf,
}

impl FileBdSeqStore {
    /// Uses the file at `path`, which need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BdSeqStore for FileBdSeqStore {
    fn load(&self) -> Result<u8> {
        let text = std::fs::read_to_string(&self.path)?;
        let value = text
            .trim()
            .parse::<u8>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(value)
    }

    fn save(&mut self, bd_seq: u8) -> Result<()> {
        std::fs::write(&self.path, bd_seq.to_string())?;
        Ok(())
    }
}

/// In-memory store; clones share the same slot, so a clone kept by a test
/// survives the node that owned the other half.
#[derive(Debug, Clone, Default)]
pub struct MemoryBdSeqStore {
    slot: Arc<Mutex<Option<u8>>>,
}

impl MemoryBdSeqStore {
    /// Creates an empty store; loading fails until something is saved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `bd_seq`.
    pub fn with_value(bd_seq: u8) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(bd_seq))),
        }
    }

    /// The stored value, if any.
    pub fn value(&self) -> Option<u8> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BdSeqStore for MemoryBdSeqStore {
    fn load(&self) -> Result<u8> {
        self.value()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no bdSeq stored").into())
    }

    fn save(&mut self, bd_seq: u8) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(bd_seq);
        Ok(())
    }
}
