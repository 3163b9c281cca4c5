use crate::config::constants::DATA_SUBDIRECTORIES;
use crate::config::CopilotConfig;
use crate::domain::model::CommandOutput;
use crate::domain::ports::{CommandRunner, ConfigProvider};
use crate::utils::error::{CopilotError, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// 部署目錄：資料目錄下的七個法規分類，加上向量庫與日誌目錄。相對路徑以 root 為基準
pub fn scaffold_directories(config: &CopilotConfig) -> Vec<PathBuf> {
    let root = config.root();
    let data_dir = root.join(config.data_dir());
    let mut directories: Vec<PathBuf> = DATA_SUBDIRECTORIES
        .iter()
        .map(|d| data_dir.join(d))
        .collect();
    directories.push(root.join(config.vector_store_dir()));
    directories.push(root.join(config.logs_dir()));
    directories
}

/// 部署啟動流程要做的事：建立目錄、安裝依賴、必要時執行初始化程式
#[derive(Debug, Clone)]
pub struct BootstrapPlan {
    pub root: PathBuf,
    pub directories: Vec<PathBuf>,
    pub installer: String,
    pub installer_args: Vec<String>,
    pub initializer: String,
    pub sentinel_dir: PathBuf,
}

impl BootstrapPlan {
    pub fn from_config(config: &CopilotConfig) -> Self {
        let root = config.root().to_path_buf();
        let mut installer_args = config.bootstrap.installer_args.clone();
        installer_args.push(config.bootstrap.manifest.clone());

        Self {
            directories: scaffold_directories(config),
            installer: config.bootstrap.installer.clone(),
            installer_args,
            initializer: config.bootstrap.initializer.clone(),
            sentinel_dir: config.bootstrap.sentinel_dir.clone(),
            root,
        }
    }

    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for dir in &self.directories {
            lines.push(format!("mkdir -p {}", dir.display()));
        }
        lines.push(format!(
            "{} {}",
            self.installer,
            self.installer_args.join(" ")
        ));
        lines.push(format!(
            "{}  (only if {} is not empty)",
            self.initializer,
            self.sentinel_dir.display()
        ));
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: &'static str,
    pub status: StepStatus,
    /// 子程序的標準輸出
    pub output: String,
}

impl StepReport {
    pub fn new(name: &'static str, status: StepStatus) -> Self {
        Self {
            name,
            status,
            output: String::new(),
        }
    }

    /// 依子程序結果決定狀態，並保留輸出
    fn from_command(name: &'static str, program: &str, result: Result<CommandOutput>) -> Self {
        match result {
            Ok(output) => {
                for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
                    tracing::info!("[{}] {}", program, line);
                }
                for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
                    tracing::warn!("[{}] {}", program, line);
                }
                let status = if output.success() {
                    StepStatus::Done
                } else {
                    tracing::warn!("⚠️  {} exited with {:?}", program, output.status_code);
                    StepStatus::Failed(format!("exit status {:?}", output.status_code))
                };
                Self {
                    name,
                    status,
                    output: output.stdout,
                }
            }
            Err(e) => {
                tracing::warn!("⚠️  {}", e);
                Self::new(name, StepStatus::Failed(e.to_string()))
            }
        }
    }
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            StepStatus::Done => write!(f, "✅ {}", self.name),
            StepStatus::Skipped(reason) => write!(f, "⏭️  {} (skipped: {})", self.name, reason),
            StepStatus::Failed(reason) => write!(f, "⚠️  {} (failed: {})", self.name, reason),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    pub steps: Vec<StepReport>,
    pub created_directories: Vec<PathBuf>,
    pub initializer_invoked: bool,
}

impl BootstrapReport {
    pub fn has_failures(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.status, StepStatus::Failed(_)))
    }
}

/// 建立目錄；已存在不算錯誤。回傳這次新建立的目錄
pub fn ensure_directories(directories: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for dir in directories {
        if dir.is_dir() {
            continue;
        }
        fs::create_dir_all(dir).map_err(|e| CopilotError::ProcessingError {
            message: format!("cannot create {}: {}", dir.display(), e),
        })?;
        created.push(dir.clone());
    }
    Ok(created)
}

/// 目錄存在且至少有一個項目
pub fn is_populated(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

pub struct Bootstrap<R: CommandRunner> {
    runner: R,
    plan: BootstrapPlan,
    skip_install: bool,
}

impl<R: CommandRunner> Bootstrap<R> {
    pub fn new(runner: R, plan: BootstrapPlan) -> Self {
        Self {
            runner,
            plan,
            skip_install: false,
        }
    }

    pub fn with_skip_install(mut self, skip: bool) -> Self {
        self.skip_install = skip;
        self
    }

    pub fn plan(&self) -> &BootstrapPlan {
        &self.plan
    }

    /// 三個步驟依序執行，任何一步失敗都不會中斷後續步驟
    pub fn run(&self) -> BootstrapReport {
        let mut report = BootstrapReport::default();

        tracing::info!("📁 Ensuring {} directories", self.plan.directories.len());
        match ensure_directories(&self.plan.directories) {
            Ok(created) => {
                for dir in &created {
                    tracing::debug!("Created {}", dir.display());
                }
                report.created_directories = created;
                report
                    .steps
                    .push(StepReport::new("directories", StepStatus::Done));
            }
            Err(e) => {
                tracing::warn!("⚠️  Directory setup incomplete: {}", e);
                report.steps.push(StepReport::new(
                    "directories",
                    StepStatus::Failed(e.to_string()),
                ));
            }
        }

        if self.skip_install {
            report.steps.push(StepReport::new(
                "install",
                StepStatus::Skipped("--skip-install".to_string()),
            ));
        } else {
            report.steps.push(self.install_dependencies());
        }

        report.steps.push(self.run_initializer_if_populated(&mut report.initializer_invoked));
        report
    }

    fn install_dependencies(&self) -> StepReport {
        tracing::info!(
            "📦 Installing dependencies: {} {}",
            self.plan.installer,
            self.plan.installer_args.join(" ")
        );

        let result = self
            .runner
            .run(&self.plan.installer, &self.plan.installer_args, &self.plan.root);
        StepReport::from_command("install", &self.plan.installer, result)
    }

    fn run_initializer_if_populated(&self, invoked: &mut bool) -> StepReport {
        if !is_populated(&self.plan.sentinel_dir) {
            tracing::info!(
                "📭 {} is empty, skipping {}",
                self.plan.sentinel_dir.display(),
                self.plan.initializer
            );
            return StepReport::new(
                "initialize",
                StepStatus::Skipped(format!("{} is empty", self.plan.sentinel_dir.display())),
            );
        }

        tracing::info!("🔄 Running initializer: {}", self.plan.initializer);
        *invoked = true;
        let result = self.runner.run(&self.plan.initializer, &[], &self.plan.root);
        StepReport::from_command("initialize", &self.plan.initializer, result)
    }
}
