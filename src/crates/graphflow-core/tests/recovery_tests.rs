//! Crash-recovery behavior: a suspended run must be resumable from a fresh
//! engine instance sharing only the state store, as if the original process
//! had never died.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use graphflow_checkpoint::{InMemoryStateStore, StateStore};
use graphflow_core::{
    Command, CompiledGraph, Graph, GraphBuilder, Invocation, NodeContext, NodeOutput, StateSchema,
    END,
};
use serde_json::{json, Value};

/// Two-node graph: a worker that counts its executions, then a human gate.
fn build_graph(worker_runs: Arc<AtomicUsize>) -> Graph {
    let branches = HashMap::from([
        ("done".to_string(), END.to_string()),
        ("again".to_string(), "worker".to_string()),
    ]);

    GraphBuilder::new()
        .with_schema(StateSchema::new().append("messages"))
        .add_node("worker", move |_state: Value, _ctx| {
            let runs = Arc::clone(&worker_runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(NodeOutput::advance(json!({
                    "messages": ["worker output"],
                    "produced": true,
                })))
            }
        })
        .add_node("gate", |_state: Value, mut ctx: NodeContext| async move {
            match ctx.take_resume() {
                Some(input) => {
                    let again = input["action"] == "again";
                    Ok(NodeOutput::advance(json!({
                        "decision": input["action"],
                        "next_step": if again { "again" } else { "done" },
                    })))
                }
                None => Ok(NodeOutput::suspend(json!({"step_name": "gate"}))),
            }
        })
        .add_edge("worker", "gate")
        .add_conditional_edge(
            "gate",
            |state: &Value| {
                state["next_step"]
                    .as_str()
                    .unwrap_or("done")
                    .to_string()
            },
            branches,
        )
        .set_entry("worker")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_resume_from_fresh_engine_does_not_replay_worker() {
    let store = Arc::new(InMemoryStateStore::new());
    let worker_runs = Arc::new(AtomicUsize::new(0));
    let invocation = Invocation::new("wf-1");

    // First process: run to the gate suspension, then "crash".
    {
        let engine = CompiledGraph::new(build_graph(Arc::clone(&worker_runs)), store.clone());
        let outcome = engine.invoke(json!({}), &invocation).await.unwrap();
        assert_eq!(outcome.interrupt().unwrap()["step_name"], "gate");
        assert_eq!(worker_runs.load(Ordering::SeqCst), 1);
    }

    // Second process: a new engine over the same store resumes the gate.
    let engine = CompiledGraph::new(build_graph(Arc::clone(&worker_runs)), store.clone());
    let outcome = engine
        .resume(Command::resume(json!({"action": "done"})), &invocation)
        .await
        .unwrap();

    let state = outcome.state().unwrap();
    assert_eq!(state["decision"], "done");
    assert_eq!(state["produced"], true);
    // The worker was not re-executed on resume.
    assert_eq!(worker_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_resume_loop_re_executes_worker() {
    let store = Arc::new(InMemoryStateStore::new());
    let worker_runs = Arc::new(AtomicUsize::new(0));
    let invocation = Invocation::new("wf-2");

    let engine = CompiledGraph::new(build_graph(Arc::clone(&worker_runs)), store.clone());
    engine.invoke(json!({}), &invocation).await.unwrap();

    // Route back through the worker once, then finish.
    let paused = engine
        .resume(Command::resume(json!({"action": "again"})), &invocation)
        .await
        .unwrap();
    assert!(paused.interrupt().is_some());
    assert_eq!(worker_runs.load(Ordering::SeqCst), 2);

    let done = engine
        .resume(Command::resume(json!({"action": "done"})), &invocation)
        .await
        .unwrap();
    let messages = done.state().unwrap()["messages"].as_array().unwrap().clone();
    assert_eq!(messages.len(), 2, "both worker rounds kept in history");
}

#[tokio::test]
async fn test_history_orders_snapshots_newest_first() {
    let store = Arc::new(InMemoryStateStore::new());
    let worker_runs = Arc::new(AtomicUsize::new(0));
    let invocation = Invocation::new("wf-3");

    let engine = CompiledGraph::new(build_graph(worker_runs), store.clone());
    engine.invoke(json!({}), &invocation).await.unwrap();
    engine
        .resume(Command::resume(json!({"action": "done"})), &invocation)
        .await
        .unwrap();

    let history = store.history("wf-3").await.unwrap();
    assert!(history.len() >= 3);
    assert!(history[0].is_terminal());
    assert!(history
        .last()
        .unwrap()
        .created_at
        .le(&history[0].created_at));
}
