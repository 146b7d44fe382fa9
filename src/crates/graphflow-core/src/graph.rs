//! Graph construction: nodes, edges, and validation
//!
//! A graph is a set of named async nodes connected by edges. Edges are either
//! direct (unconditional) or conditional: a pure router function reads the
//! merged state and returns a branch label, which a branch map translates
//! into the next node. The sentinel [`END`] terminates execution.
//!
//! Graphs are built with [`GraphBuilder`], validated structurally, and
//! compiled into a [`CompiledGraph`](crate::engine::CompiledGraph) bound to a
//! state store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::node::{NodeContext, NodeFn, NodeResult};
use crate::state::StateSchema;

/// Node identifier - unique name for each node in the graph
pub type NodeId = String;

/// Sentinel target marking workflow termination
pub const END: &str = "__end__";

/// Router function for conditional edges: state in, branch label out.
pub type RouterFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Edge from a node to its successor(s).
#[derive(Clone)]
pub enum Edge {
    /// Unconditional transition to a node (or [`END`])
    Direct(NodeId),

    /// Route by branch label chosen from the current state.
    ///
    /// The branch map is the complete set of labels the router may return;
    /// a label outside the map is an execution error.
    Conditional {
        router: RouterFn,
        branches: HashMap<String, NodeId>,
    },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(to) => f.debug_tuple("Direct").field(to).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("branches", branches)
                .finish(),
        }
    }
}

/// An immutable, validated graph definition.
#[derive(Clone)]
pub struct Graph {
    pub(crate) nodes: HashMap<NodeId, NodeFn>,
    pub(crate) edges: HashMap<NodeId, Edge>,
    pub(crate) entry: NodeId,
    pub(crate) schema: StateSchema,
}

impl Graph {
    /// Names of all nodes, for diagnostics.
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    /// The entry node.
    pub fn entry(&self) -> &str {
        &self.entry
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .finish()
    }
}

/// Builder for [`Graph`].
#[derive(Default)]
pub struct GraphBuilder {
    nodes: HashMap<NodeId, NodeFn>,
    edges: HashMap<NodeId, Edge>,
    entry: Option<NodeId>,
    schema: StateSchema,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-field merge rules for the shared state.
    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Add a named node.
    pub fn add_node<F, Fut>(mut self, name: impl Into<String>, node: F) -> Self
    where
        F: Fn(Value, NodeContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeResult> + Send + 'static,
    {
        let node = Arc::new(node);
        let node_fn: NodeFn = Arc::new(move |state, ctx| {
            let node = Arc::clone(&node);
            Box::pin(async move { node(state, ctx).await })
        });
        self.nodes.insert(name.into(), node_fn);
        self
    }

    /// Add a direct edge. `to` may be [`END`].
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.insert(from.into(), Edge::Direct(to.into()));
        self
    }

    /// Add a conditional edge with a router and its branch map.
    pub fn add_conditional_edge<R>(
        mut self,
        from: impl Into<String>,
        router: R,
        branches: HashMap<String, NodeId>,
    ) -> Self
    where
        R: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.edges.insert(
            from.into(),
            Edge::Conditional {
                router: Arc::new(router),
                branches,
            },
        );
        self
    }

    /// Set the entry node.
    pub fn set_entry(mut self, node: impl Into<String>) -> Self {
        self.entry = Some(node.into());
        self
    }

    /// Validate the structure and produce an immutable [`Graph`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidGraph`] when the entry is missing, an
    /// edge references an unknown node, or a node has no outgoing edge.
    pub fn build(self) -> Result<Graph> {
        let entry = self
            .entry
            .ok_or_else(|| GraphError::InvalidGraph("no entry point set".to_string()))?;

        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::InvalidGraph(format!(
                "entry point '{entry}' does not exist"
            )));
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::InvalidGraph(format!(
                    "edge source '{from}' does not exist"
                )));
            }
            match edge {
                Edge::Direct(to) => {
                    if to != END && !self.nodes.contains_key(to) {
                        return Err(GraphError::InvalidGraph(format!(
                            "edge target '{to}' does not exist"
                        )));
                    }
                }
                Edge::Conditional { branches, .. } => {
                    for to in branches.values() {
                        if to != END && !self.nodes.contains_key(to) {
                            return Err(GraphError::InvalidGraph(format!(
                                "branch target '{to}' does not exist"
                            )));
                        }
                    }
                }
            }
        }

        for node in self.nodes.keys() {
            if !self.edges.contains_key(node) {
                return Err(GraphError::InvalidGraph(format!(
                    "node '{node}' has no outgoing edge"
                )));
            }
        }

        Ok(Graph {
            nodes: self.nodes,
            edges: self.edges,
            entry,
            schema: self.schema,
        })
    }
}
