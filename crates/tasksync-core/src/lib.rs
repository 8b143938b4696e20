//! tasksync-core - Core library for tasksync
//!
//! This crate contains the task model, the snapshot codec, the last-writer-wins
//! reconciliation engine, remote transports, the SQLite-backed local store, and
//! the sync orchestrator that ties them together.

pub mod codec;
pub mod db;
pub mod error;
pub mod export;
pub mod merge;
pub mod models;
pub mod services;
pub mod sync;
pub mod transport;
pub mod util;

pub use codec::{decode_snapshot, encode_snapshot, DecodeError};
pub use error::{Error, Result};
pub use merge::{merge, reconcile, MergeOutcome};
pub use models::{Priority, Snapshot, SyncConflict, SyncSettings, TaskId, TaskRecord};
