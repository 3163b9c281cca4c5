// Adapters layer: concrete implementations for external systems (processes, LLM HTTP APIs, remote store).

pub mod command;
pub mod llm;
pub mod remote;

pub use command::SystemCommandRunner;
