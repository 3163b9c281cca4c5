use crate::config::toml_config::RemoteConfig;
use crate::domain::ports::Storage;
use crate::retrieval::vector_store::{CHUNKS_FILE, CONFIG_FILE, INDEX_FILE};
use crate::utils::error::{CopilotError, Result};
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;

static FILE_PATH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/file/d/([a-zA-Z0-9_-]+)").expect("valid regex"));
static QUERY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=([a-zA-Z0-9_-]+)").expect("valid regex"));
static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid regex"));

/// 從 Google Drive 分享連結取出檔案 ID；本身就是 ID 時原樣回傳
pub fn extract_drive_file_id(input: &str) -> Option<String> {
    let input = input.trim();
    if let Some(caps) = FILE_PATH_ID.captures(input) {
        return Some(caps[1].to_string());
    }
    if let Some(caps) = QUERY_ID.captures(input) {
        return Some(caps[1].to_string());
    }
    BARE_ID.is_match(input).then(|| input.to_string())
}

/// 下載預先建好的向量庫檔案並透過 Storage 寫入
pub struct RemoteStoreFetcher<S: Storage> {
    client: Client,
    base_url: String,
    storage: S,
}

impl<S: Storage> RemoteStoreFetcher<S> {
    pub fn new(base_url: impl Into<String>, storage: S) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            storage,
        }
    }

    pub fn from_config(remote: &RemoteConfig, storage: S) -> Self {
        Self::new(&remote.base_url, storage)
    }

    pub fn download_url(&self, file_id: &str) -> String {
        format!("{}/uc?export=download&id={}", self.base_url, file_id)
    }

    async fn download(&self, name: &str, reference: &str) -> Result<Vec<u8>> {
        let file_id =
            extract_drive_file_id(reference).ok_or_else(|| CopilotError::InvalidConfigValueError {
                field: format!("remote.{}", name.trim_end_matches(".json")),
                value: reference.to_string(),
                reason: "Not a Google Drive file id or share link".to_string(),
            })?;

        tracing::info!("📥 Downloading {}...", name);
        let response = self
            .client
            .get(self.download_url(&file_id))
            .send()
            .await?
            .error_for_status()?;

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/html"));
        let bytes = response.bytes().await?;

        // 未公開分享的檔案會回傳登入頁面
        if is_html {
            return Err(CopilotError::VectorStoreError {
                message: format!(
                    "{} download returned an HTML page; make sure the file is shared with 'Anyone with the link'",
                    name
                ),
            });
        }
        serde_json::from_slice::<serde_json::Value>(&bytes).map_err(|e| {
            CopilotError::VectorStoreError {
                message: format!("{} is not valid JSON: {}", name, e),
            }
        })?;

        tracing::info!("✅ Downloaded {} ({} bytes)", name, bytes.len());
        Ok(bytes.to_vec())
    }

    /// 三個檔案都下載並驗證後才寫入。回傳已寫入的檔名
    pub async fn fetch(&self, remote: &RemoteConfig) -> Result<Vec<String>> {
        let files = [
            (CHUNKS_FILE, remote.chunks.as_str()),
            (CONFIG_FILE, remote.config.as_str()),
            (INDEX_FILE, remote.index.as_str()),
        ];

        let mut downloaded = Vec::with_capacity(files.len());
        for (name, reference) in files {
            downloaded.push((name, self.download(name, reference).await?));
        }

        let mut written = Vec::with_capacity(downloaded.len());
        for (name, data) in downloaded {
            self.storage.write_file(name, &data).await?;
            written.push(name.to_string());
        }
        Ok(written)
    }
}
