use crate::config::constants::SUPPORTED_EMBEDDING_MODELS;
use crate::core::ConfigProvider;
use crate::utils::error::{CopilotError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "safety-copilot.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CopilotConfig {
    pub paths: PathsConfig,
    pub bootstrap: BootstrapConfig,
    pub rag: RagConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    pub remote: Option<RemoteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub documents_dir: PathBuf,
    pub vector_store_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            data_dir: PathBuf::from("data"),
            documents_dir: PathBuf::from("documents"),
            vector_store_dir: PathBuf::from("vector_store"),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub installer: String,
    pub installer_args: Vec<String>,
    pub manifest: String,
    pub initializer: String,
    pub sentinel_dir: PathBuf,
    pub strict: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            installer: "pip".to_string(),
            installer_args: vec!["install".to_string(), "-r".to_string()],
            manifest: "requirements.txt".to_string(),
            initializer: "safety-copilot-init".to_string(),
            sentinel_dir: PathBuf::from("documents"),
            strict: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub write_bundle: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 600,
            chunk_overlap: 100,
            top_k: 8,
            similarity_threshold: 0.1,
            embedding_model: "feature-hash-v1".to_string(),
            embedding_dim: 384,
            write_bundle: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub anthropic_api_key: String,
    pub openai_api_key: String,
    pub anthropic_base_url: String,
    pub openai_base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            anthropic_api_key: String::new(),
            openai_api_key: String::new(),
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            openai_base_url: "https://api.openai.com".to_string(),
            max_tokens: 3000,
            temperature: 0.3,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
        }
    }
}

/// 預先建好的向量庫（Google Drive 分享連結或檔案 ID）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_drive_base_url")]
    pub base_url: String,
    pub chunks: String,
    pub config: String,
    pub index: String,
}

fn default_drive_base_url() -> String {
    "https://drive.google.com".to_string()
}

impl CopilotConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CopilotError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| CopilotError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 載入順序：設定檔（若存在）→ 環境變數覆蓋 → 以 root 解析相對路徑
    pub fn load(config_path: Option<&Path>, root: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let base = root.unwrap_or_else(|| Path::new("."));
                let default_path = base.join(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    tracing::debug!("Loading configuration from {}", default_path.display());
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(root) = root {
            config.paths.root = root.to_path_buf();
        }
        config.apply_env_overrides();
        config.resolve_paths();
        Ok(config)
    }

    /// 替換環境變數 (例如 ${ANTHROPIC_API_KEY})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| CopilotError::ProcessingError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn apply_env_overrides(&mut self) {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(provider) = read("LLM_PROVIDER") {
            self.llm.provider = provider.to_lowercase();
        }
        if let Some(model) = read("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(key) = read("ANTHROPIC_API_KEY") {
            self.llm.anthropic_api_key = key;
        }
        if let Some(key) = read("OPENAI_API_KEY") {
            self.llm.openai_api_key = key;
        }
        if let Some(model) = read("EMBEDDING_MODEL") {
            self.rag.embedding_model = model;
        }
        if let Some(level) = read("LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn resolve_paths(&mut self) {
        let root = self.paths.root.clone();
        for path in [
            &mut self.paths.data_dir,
            &mut self.paths.documents_dir,
            &mut self.paths.vector_store_dir,
            &mut self.paths.logs_dir,
            &mut self.bootstrap.sentinel_dir,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub fn logs_dir(&self) -> &Path {
        &self.paths.logs_dir
    }

    /// 依 provider 取出對應的 API key
    pub fn active_api_key(&self) -> Option<&str> {
        let key = match self.llm.provider.as_str() {
            "anthropic" => self.llm.anthropic_api_key.as_str(),
            "openai" => self.llm.openai_api_key.as_str(),
            _ => return None,
        };
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_positive_number("rag.chunk_size", self.rag.chunk_size, 50)?;
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(CopilotError::InvalidConfigValueError {
                field: "rag.chunk_overlap".to_string(),
                value: self.rag.chunk_overlap.to_string(),
                reason: "Overlap must be smaller than rag.chunk_size".to_string(),
            });
        }
        validation::validate_positive_number("rag.top_k", self.rag.top_k, 1)?;
        validation::validate_range(
            "rag.similarity_threshold",
            self.rag.similarity_threshold,
            0.0,
            1.0,
        )?;
        validation::validate_positive_number("rag.embedding_dim", self.rag.embedding_dim, 16)?;
        validation::validate_one_of(
            "rag.embedding_model",
            &self.rag.embedding_model,
            &SUPPORTED_EMBEDDING_MODELS,
        )?;

        validation::validate_one_of(
            "llm.provider",
            &self.llm.provider,
            &["anthropic", "openai", "local"],
        )?;
        validation::validate_url("llm.anthropic_base_url", &self.llm.anthropic_base_url)?;
        validation::validate_url("llm.openai_base_url", &self.llm.openai_base_url)?;
        validation::validate_range("llm.temperature", self.llm.temperature, 0.0, 1.0)?;

        validation::validate_non_empty_string("bootstrap.installer", &self.bootstrap.installer)?;
        validation::validate_non_empty_string("bootstrap.manifest", &self.bootstrap.manifest)?;
        validation::validate_non_empty_string(
            "bootstrap.initializer",
            &self.bootstrap.initializer,
        )?;

        for (field, path) in [
            ("paths.data_dir", &self.paths.data_dir),
            ("paths.documents_dir", &self.paths.documents_dir),
            ("paths.vector_store_dir", &self.paths.vector_store_dir),
        ] {
            validation::validate_path(field, &path.to_string_lossy())?;
        }

        if let Some(remote) = &self.remote {
            validation::validate_url("remote.base_url", &remote.base_url)?;
            validation::validate_non_empty_string("remote.chunks", &remote.chunks)?;
            validation::validate_non_empty_string("remote.config", &remote.config)?;
            validation::validate_non_empty_string("remote.index", &remote.index)?;
        }

        Ok(())
    }
}

impl ConfigProvider for CopilotConfig {
    fn data_dir(&self) -> &Path {
        &self.paths.data_dir
    }

    fn documents_dir(&self) -> &Path {
        &self.paths.documents_dir
    }

    fn vector_store_dir(&self) -> &Path {
        &self.paths.vector_store_dir
    }

    fn chunk_size(&self) -> usize {
        self.rag.chunk_size
    }

    fn chunk_overlap(&self) -> usize {
        self.rag.chunk_overlap
    }

    fn embedding_model(&self) -> &str {
        &self.rag.embedding_model
    }

    fn embedding_dim(&self) -> usize {
        self.rag.embedding_dim
    }

    fn write_bundle(&self) -> bool {
        self.rag.write_bundle
    }
}

impl Validate for CopilotConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_rag_settings() {
        let config = CopilotConfig::default();

        assert_eq!(config.rag.chunk_size, 600);
        assert_eq!(config.rag.chunk_overlap, 100);
        assert_eq!(config.rag.top_k, 8);
        assert!((config.rag.similarity_threshold - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.bootstrap.installer, "pip");
        assert_eq!(config.bootstrap.manifest, "requirements.txt");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
[rag]
chunk_size = 800
top_k = 4

[llm]
provider = "openai"
model = "gpt-4"
"#;

        let config = CopilotConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.rag.chunk_size, 800);
        assert_eq!(config.rag.chunk_overlap, 100);
        assert_eq!(config.rag.top_k, 4);
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.bootstrap.initializer, "safety-copilot-init");
        assert!(config.remote.is_none());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SC_TEST_DRIVE_CHUNKS", "1aBcD_chunks");

        let toml_content = r#"
[remote]
chunks = "${SC_TEST_DRIVE_CHUNKS}"
config = "cfg-id"
index = "idx-id"
"#;

        let config = CopilotConfig::from_toml_str(toml_content).unwrap();
        let remote = config.remote.unwrap();
        assert_eq!(remote.chunks, "1aBcD_chunks");
        assert_eq!(remote.base_url, "https://drive.google.com");

        std::env::remove_var("SC_TEST_DRIVE_CHUNKS");
    }

    #[test]
    fn test_config_validation_rejects_bad_values() {
        let config = CopilotConfig::from_toml_str(
            r#"
[rag]
chunk_size = 100
chunk_overlap = 200
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = CopilotConfig::from_toml_str(
            r#"
[llm]
provider = "cohere"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_resolves_paths_against_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = NamedTempFile::new_in(dir.path()).unwrap();
        file.write_all(b"[paths]\nvector_store_dir = \"store\"\n").unwrap();

        let config = CopilotConfig::load(Some(file.path()), Some(dir.path())).unwrap();

        assert_eq!(config.vector_store_dir(), dir.path().join("store").as_path());
        assert_eq!(config.data_dir(), dir.path().join("data").as_path());
        assert_eq!(
            config.bootstrap.sentinel_dir,
            dir.path().join("documents")
        );
    }

    #[test]
    fn test_active_api_key_follows_provider() {
        let mut config = CopilotConfig::default();
        config.llm.anthropic_api_key = "sk-ant".to_string();
        assert_eq!(config.active_api_key(), Some("sk-ant"));

        config.llm.provider = "openai".to_string();
        assert_eq!(config.active_api_key(), None);

        config.llm.provider = "local".to_string();
        assert_eq!(config.active_api_key(), None);
    }
}
