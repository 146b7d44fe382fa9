//! Graph execution: the invoke/resume driver loop
//!
//! [`CompiledGraph`] binds a validated [`Graph`] to a [`StateStore`] and runs
//! it. Execution is a sequential loop: run the current node, merge its
//! update, persist a snapshot, route to the next node. The loop ends when a
//! node suspends or routing reaches [`END`].
//!
//! The engine never spawns tasks; nodes that need concurrency (the reviewer
//! fan-out) await their own subtasks. All snapshot writes for a thread happen
//! from this single loop, so per-thread history is strictly ordered.

use std::sync::Arc;

use graphflow_checkpoint::{StateSnapshot, StateStore};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::error::{GraphError, Result};
use crate::graph::{Edge, Graph, END};
use crate::node::{NodeContext, NodeOutput};

/// Run configuration identifying the workflow thread.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub thread_id: String,
}

impl Invocation {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Routing reached [`END`]; carries the final state.
    Complete(Value),

    /// A node suspended; carries the suspension payload.
    Interrupted(Value),
}

impl RunOutcome {
    /// The suspension payload, if the run paused.
    pub fn interrupt(&self) -> Option<&Value> {
        match self {
            RunOutcome::Interrupted(payload) => Some(payload),
            RunOutcome::Complete(_) => None,
        }
    }

    /// The final state, if the run completed.
    pub fn state(&self) -> Option<&Value> {
        match self {
            RunOutcome::Complete(state) => Some(state),
            RunOutcome::Interrupted(_) => None,
        }
    }
}

/// An executable graph bound to its state store.
#[derive(Clone)]
pub struct CompiledGraph {
    graph: Arc<Graph>,
    store: Arc<dyn StateStore>,
}

impl CompiledGraph {
    pub fn new(graph: Graph, store: Arc<dyn StateStore>) -> Self {
        Self {
            graph: Arc::new(graph),
            store,
        }
    }

    /// Start a fresh run at the entry node.
    pub async fn invoke(&self, initial: Value, invocation: &Invocation) -> Result<RunOutcome> {
        let mut state = json!({});
        self.graph.schema.apply(&mut state, &initial);
        info!(thread_id = %invocation.thread_id, entry = %self.graph.entry, "starting graph run");
        self.run_from(state, self.graph.entry.clone(), None, invocation)
            .await
    }

    /// Resume a suspended run with a human resolution.
    ///
    /// Loads the latest snapshot for the thread and re-enters the suspended
    /// node from the top with the command's resume value available through
    /// the node context.
    pub async fn resume(&self, command: Command, invocation: &Invocation) -> Result<RunOutcome> {
        let snapshot = self
            .store
            .latest(&invocation.thread_id)
            .await?
            .ok_or_else(|| GraphError::NoPendingInterrupt(invocation.thread_id.clone()))?;

        if snapshot.next.is_empty() || snapshot.interrupts.is_empty() {
            return Err(GraphError::NoPendingInterrupt(invocation.thread_id.clone()));
        }

        let node = snapshot.next[0].clone();
        info!(thread_id = %invocation.thread_id, node = %node, "resuming graph run");
        self.run_from(snapshot.values, node, Some(command.resume), invocation)
            .await
    }

    async fn run_from(
        &self,
        mut state: Value,
        mut current: String,
        mut resume: Option<Value>,
        invocation: &Invocation,
    ) -> Result<RunOutcome> {
        loop {
            let node_fn = self
                .graph
                .nodes
                .get(&current)
                .ok_or_else(|| GraphError::UnknownNode(current.clone()))?;

            debug!(thread_id = %invocation.thread_id, node = %current, "executing node");
            let ctx = NodeContext::new(&invocation.thread_id, resume.take());
            let output = node_fn(state.clone(), ctx).await.map_err(|e| {
                warn!(thread_id = %invocation.thread_id, node = %current, error = %e, "node failed");
                GraphError::Node {
                    node: current.clone(),
                    message: e.to_string(),
                }
            })?;

            match output {
                NodeOutput::Advance(update) => {
                    self.graph.schema.apply(&mut state, &update);
                    let next = self.route(&current, &state)?;
                    let next_nodes = if next == END {
                        Vec::new()
                    } else {
                        vec![next.clone()]
                    };
                    self.persist(invocation, state.clone(), next_nodes, None)
                        .await?;

                    if next == END {
                        info!(thread_id = %invocation.thread_id, "graph run complete");
                        return Ok(RunOutcome::Complete(state));
                    }
                    current = next;
                }
                NodeOutput::Suspend { payload, update } => {
                    self.graph.schema.apply(&mut state, &update);
                    self.persist(
                        invocation,
                        state.clone(),
                        vec![current.clone()],
                        Some(payload.clone()),
                    )
                    .await?;
                    info!(thread_id = %invocation.thread_id, node = %current, "graph run suspended");
                    return Ok(RunOutcome::Interrupted(payload));
                }
            }
        }
    }

    fn route(&self, from: &str, state: &Value) -> Result<String> {
        let edge = self
            .graph
            .edges
            .get(from)
            .ok_or_else(|| GraphError::InvalidGraph(format!("node '{from}' has no outgoing edge")))?;

        match edge {
            Edge::Direct(to) => Ok(to.clone()),
            Edge::Conditional { router, branches } => {
                let label = router(state);
                branches
                    .get(&label)
                    .cloned()
                    .ok_or_else(|| GraphError::UnknownBranch {
                        node: from.to_string(),
                        label,
                    })
            }
        }
    }

    async fn persist(
        &self,
        invocation: &Invocation,
        values: Value,
        next: Vec<String>,
        interrupt: Option<Value>,
    ) -> Result<()> {
        let mut snapshot = StateSnapshot::new(invocation.thread_id.clone(), values, next);
        if let Some(payload) = interrupt {
            snapshot = snapshot.with_interrupt(payload);
        }
        self.store.save(snapshot).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::state::StateSchema;
    use graphflow_checkpoint::InMemoryStateStore;
    use std::collections::HashMap;

    fn compile(builder: GraphBuilder, store: Arc<InMemoryStateStore>) -> CompiledGraph {
        CompiledGraph::new(builder.build().unwrap(), store)
    }

    #[tokio::test]
    async fn test_linear_run_reaches_end() {
        let store = Arc::new(InMemoryStateStore::new());
        let graph = compile(
            GraphBuilder::new()
                .add_node("double", |state: Value, _ctx| async move {
                    let n = state["n"].as_i64().unwrap_or(0);
                    Ok(NodeOutput::advance(json!({"n": n * 2})))
                })
                .add_edge("double", END)
                .set_entry("double"),
            Arc::clone(&store),
        );

        let outcome = graph
            .invoke(json!({"n": 21}), &Invocation::new("t1"))
            .await
            .unwrap();

        assert_eq!(outcome.state().unwrap()["n"], 42);
        let latest = store.latest("t1").await.unwrap().unwrap();
        assert!(latest.is_terminal());
    }

    #[tokio::test]
    async fn test_conditional_routing() {
        let store = Arc::new(InMemoryStateStore::new());
        let branches = HashMap::from([
            ("big".to_string(), "big_node".to_string()),
            ("small".to_string(), END.to_string()),
        ]);
        let graph = compile(
            GraphBuilder::new()
                .add_node("check", |_state, _ctx| async move {
                    Ok(NodeOutput::advance(json!({"n": 100})))
                })
                .add_node("big_node", |_state, _ctx| async move {
                    Ok(NodeOutput::advance(json!({"routed": "big"})))
                })
                .add_conditional_edge(
                    "check",
                    |state: &Value| {
                        if state["n"].as_i64().unwrap_or(0) > 10 {
                            "big".to_string()
                        } else {
                            "small".to_string()
                        }
                    },
                    branches,
                )
                .add_edge("big_node", END)
                .set_entry("check"),
            store,
        );

        let outcome = graph.invoke(json!({}), &Invocation::new("t1")).await.unwrap();
        assert_eq!(outcome.state().unwrap()["routed"], "big");
    }

    #[tokio::test]
    async fn test_suspend_and_resume_re_enters_node() {
        let store = Arc::new(InMemoryStateStore::new());
        let graph = compile(
            GraphBuilder::new()
                .add_node("gate", |_state, mut ctx: NodeContext| async move {
                    match ctx.take_resume() {
                        Some(input) => Ok(NodeOutput::advance(json!({"answer": input["value"]}))),
                        None => Ok(NodeOutput::suspend_with(
                            json!({"question": "proceed?"}),
                            json!({"asked": true}),
                        )),
                    }
                })
                .add_edge("gate", END)
                .set_entry("gate"),
            Arc::clone(&store),
        );

        let invocation = Invocation::new("t1");
        let paused = graph.invoke(json!({}), &invocation).await.unwrap();
        assert_eq!(paused.interrupt().unwrap()["question"], "proceed?");

        // suspend update was merged and persisted
        let snapshot = store.latest("t1").await.unwrap().unwrap();
        assert_eq!(snapshot.values["asked"], true);
        assert_eq!(snapshot.next, vec!["gate".to_string()]);

        let done = graph
            .resume(Command::resume(json!({"value": "yes"})), &invocation)
            .await
            .unwrap();
        assert_eq!(done.state().unwrap()["answer"], "yes");
    }

    #[tokio::test]
    async fn test_resume_without_pending_interrupt_fails() {
        let store = Arc::new(InMemoryStateStore::new());
        let graph = compile(
            GraphBuilder::new()
                .add_node("noop", |_state, _ctx| async move {
                    Ok(NodeOutput::advance(json!({})))
                })
                .add_edge("noop", END)
                .set_entry("noop"),
            store,
        );

        let invocation = Invocation::new("t1");
        graph.invoke(json!({}), &invocation).await.unwrap();

        let err = graph
            .resume(Command::resume(json!({})), &invocation)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NoPendingInterrupt(_)));
    }

    #[tokio::test]
    async fn test_node_error_aborts_run() {
        let store = Arc::new(InMemoryStateStore::new());
        let graph = compile(
            GraphBuilder::new()
                .add_node("boom", |_state, _ctx| async move {
                    Err("subprocess exploded".into())
                })
                .add_edge("boom", END)
                .set_entry("boom"),
            store,
        );

        let err = graph
            .invoke(json!({}), &Invocation::new("t1"))
            .await
            .unwrap_err();
        match err {
            GraphError::Node { node, message } => {
                assert_eq!(node, "boom");
                assert!(message.contains("subprocess exploded"));
            }
            other => panic!("expected node error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_append_schema_accumulates_across_nodes() {
        let store = Arc::new(InMemoryStateStore::new());
        let graph = compile(
            GraphBuilder::new()
                .with_schema(StateSchema::new().append("messages"))
                .add_node("first", |_state, _ctx| async move {
                    Ok(NodeOutput::advance(json!({"messages": ["one"]})))
                })
                .add_node("second", |_state, _ctx| async move {
                    Ok(NodeOutput::advance(json!({"messages": ["two"]})))
                })
                .add_edge("first", "second")
                .add_edge("second", END)
                .set_entry("first"),
            store,
        );

        let outcome = graph
            .invoke(json!({"messages": ["zero"]}), &Invocation::new("t1"))
            .await
            .unwrap();
        assert_eq!(
            outcome.state().unwrap()["messages"],
            json!(["zero", "one", "two"])
        );
    }
}
