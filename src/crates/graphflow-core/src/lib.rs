//! Core graph execution engine for conductor workflows
//!
//! graphflow-core runs directed graphs of named async nodes over a shared,
//! checkpointed JSON state. It exists for workflows that must pause for human
//! input mid-run and survive process restarts while paused.
//!
//! # Model
//!
//! - **Nodes** are async functions `(state, context) -> NodeOutput`.
//! - **Edges** are direct or conditional; conditional edges use a pure router
//!   function over the merged state.
//! - **State** is a JSON object merged field-by-field under a
//!   [`StateSchema`]: last-write-wins by default, append-only where
//!   registered.
//! - **Suspension** is a tagged node output, not an error. A suspended run
//!   returns its payload to the caller; [`CompiledGraph::resume`] re-enters
//!   the node from the top with the resolution available as a one-shot value.
//! - **Persistence**: a [`StateSnapshot`](graphflow_checkpoint::StateSnapshot)
//!   is written after every node, so any non-terminal thread can be reloaded
//!   and resumed by a fresh process.
//!
//! # Example
//!
//! ```rust
//! use graphflow_core::{Command, CompiledGraph, GraphBuilder, Invocation, NodeOutput, END};
//! use graphflow_checkpoint::InMemoryStateStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = GraphBuilder::new()
//!     .add_node("approve", |_state, mut ctx: graphflow_core::NodeContext| async move {
//!         match ctx.take_resume() {
//!             Some(input) => Ok(NodeOutput::advance(json!({"approved": input["ok"]}))),
//!             None => Ok(NodeOutput::suspend(json!({"question": "ship it?"}))),
//!         }
//!     })
//!     .add_edge("approve", END)
//!     .set_entry("approve")
//!     .build()?;
//!
//! let compiled = CompiledGraph::new(graph, Arc::new(InMemoryStateStore::new()));
//! let run = Invocation::new("thread-1");
//!
//! let paused = compiled.invoke(json!({}), &run).await?;
//! assert!(paused.interrupt().is_some());
//!
//! let done = compiled.resume(Command::resume(json!({"ok": true})), &run).await?;
//! assert_eq!(done.state().unwrap()["approved"], true);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod state;

pub use command::Command;
pub use engine::{CompiledGraph, Invocation, RunOutcome};
pub use error::{GraphError, Result};
pub use graph::{Edge, Graph, GraphBuilder, NodeId, END};
pub use node::{NodeContext, NodeError, NodeFn, NodeOutput, NodeResult};
pub use state::{Reducer, StateSchema};
