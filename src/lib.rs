pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod processing;
pub mod retrieval;
pub mod synthesis;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::{cli::LocalStorage, CopilotConfig};
pub use core::{
    bootstrap::Bootstrap,
    copilot::{Copilot, CopilotAnswer},
    engine::IngestEngine,
    pipeline::DocumentPipeline,
};
pub use retrieval::VectorStore;
pub use utils::error::{CopilotError, Result};
