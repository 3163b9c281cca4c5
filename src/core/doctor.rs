use crate::config::CopilotConfig;
use crate::core::bootstrap::scaffold_directories;
use crate::core::pipeline::{default_extractor, discover_sources};
use crate::core::{ConfigProvider, Storage};
use crate::domain::ports::TextExtractor;
use crate::retrieval::embedding::embedder_for;
use crate::retrieval::vector_store::VectorStore;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Check,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
    pub hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Pass,
            detail: detail.into(),
            hint: None,
        }
    }

    fn check(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Check,
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.status {
            CheckStatus::Pass => "✅ PASS ",
            CheckStatus::Check => "⚠️  CHECK",
        };
        write!(f, "{} {}: {}", label, self.name, self.detail)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n         💡 {}", hint)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub checks: Vec<CheckResult>,
}

impl DoctorReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(CheckResult::passed)
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed()).count()
    }
}

/// 九個部署目錄加上舊版 documents 目錄
pub fn check_directories(config: &CopilotConfig) -> CheckResult {
    let mut expected = scaffold_directories(config);
    expected.push(config.root().join(config.documents_dir()));

    let missing: Vec<String> = expected
        .iter()
        .filter(|d| !d.is_dir())
        .map(|d| d.display().to_string())
        .collect();

    if missing.is_empty() {
        CheckResult::pass("directories", format!("{} directories present", expected.len()))
    } else {
        CheckResult::check(
            "directories",
            format!("missing: {}", missing.join(", ")),
            "Run safety-copilot to create the directory layout",
        )
    }
}

pub fn check_documents(config: &CopilotConfig, extractor: &dyn TextExtractor) -> CheckResult {
    match discover_sources(config, extractor) {
        Ok(files) if !files.is_empty() => {
            CheckResult::pass("documents", format!("{} document(s) found", files.len()))
        }
        Ok(_) => CheckResult::check(
            "documents",
            format!("no PDF or text files under {}", config.data_dir().display()),
            "Add regulation and standard documents under data/",
        ),
        Err(e) => CheckResult::check(
            "documents",
            e.to_string(),
            "Check permissions on the data directory",
        ),
    }
}

pub fn check_environment(config: &CopilotConfig) -> CheckResult {
    if config.llm.provider == "local" {
        return CheckResult::pass("environment", "local mode, answers are extracted from sources");
    }
    if config.active_api_key().is_some() {
        return CheckResult::pass(
            "environment",
            format!("{} API key configured", config.llm.provider),
        );
    }

    let variable = match config.llm.provider.as_str() {
        "openai" => "OPENAI_API_KEY",
        _ => "ANTHROPIC_API_KEY",
    };
    CheckResult::check(
        "environment",
        format!("no API key for provider '{}'", config.llm.provider),
        format!("Set {} or use provider = \"local\"", variable),
    )
}

pub async fn check_vector_store<S: Storage>(storage: &S, config: &CopilotConfig) -> CheckResult {
    let location = config.vector_store_dir().display().to_string();
    let store = match VectorStore::load(storage, &location).await {
        Ok(store) => store,
        Err(e) => {
            return CheckResult::check(
                "vector store",
                e.to_string(),
                "Run safety-copilot-init to build it",
            )
        }
    };

    if store.is_empty() {
        return CheckResult::check(
            "vector store",
            format!("{} holds no chunks", location),
            "Run safety-copilot-init after adding documents",
        );
    }

    let compatible = embedder_for(&config.rag.embedding_model, config.rag.embedding_dim)
        .and_then(|embedder| store.ensure_compatible(&embedder));
    match compatible {
        Ok(()) => {
            let stats = store.stats();
            CheckResult::pass(
                "vector store",
                format!(
                    "{} chunks from {} documents ({})",
                    stats.num_chunks, stats.num_documents, stats.embedding_model
                ),
            )
        }
        Err(e) => CheckResult::check(
            "vector store",
            e.to_string(),
            "Rebuild with safety-copilot-init using the configured embedding model",
        ),
    }
}

pub async fn run_checks<S: Storage>(storage: &S, config: &CopilotConfig) -> DoctorReport {
    let extractor = default_extractor();
    DoctorReport {
        checks: vec![
            check_directories(config),
            check_documents(config, &extractor),
            check_environment(config),
            check_vector_store(storage, config).await,
        ],
    }
}
