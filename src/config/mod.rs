pub mod cli;
pub mod constants;
pub mod toml_config;

pub use toml_config::CopilotConfig;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use clap::Args;
#[cfg(feature = "cli")]
use std::path::PathBuf;

/// 各個執行檔共用的命令列選項
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct CliConfig {
    /// Project root (directories and relative paths resolve against it)
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Path to a TOML configuration file (defaults to <root>/safety-copilot.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn load_config(&self) -> Result<CopilotConfig> {
        CopilotConfig::load(self.config.as_deref(), Some(&self.root))
    }
}
