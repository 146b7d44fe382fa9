//! CLI agent invocation: parsing, subprocess running, adapters, registry

pub mod adapters;
pub mod mock;
pub mod parser;
pub mod registry;
pub mod runner;

pub use adapters::{AgentConfig, AgentKind, AgentRole};
pub use registry::AgentRegistry;
pub use runner::{AgentInvoker, CliRunner};
