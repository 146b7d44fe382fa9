//! State-store abstractions for conductor workflows
//!
//! This crate defines the durable-storage seam between the graph engine and
//! its backing store. The engine persists a [`StateSnapshot`] after every node
//! it executes; a paused workflow is nothing more than the latest snapshot for
//! its thread with a non-empty `interrupts` list. Any backend that can save
//! and reload snapshots can resume a workflow, including after a process
//! restart.
//!
//! # Core Types
//!
//! - [`StateStore`] - trait implemented by storage backends
//! - [`StateSnapshot`] - one persisted step of a workflow's history
//! - [`StoreError`] - storage failures
//! - [`InMemoryStateStore`] - reference implementation for tests and
//!   non-durable callers
//!
//! The SQLite-backed implementation lives in the `orchestrator` crate, which
//! owns the database pool.

pub mod memory;
pub mod snapshot;
pub mod traits;

pub use memory::InMemoryStateStore;
pub use snapshot::StateSnapshot;
pub use traits::{StateStore, StoreError};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
