use crate::domain::model::{CommandOutput, IngestResult, PageRecord, PageText};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn data_dir(&self) -> &Path;
    fn documents_dir(&self) -> &Path;
    fn vector_store_dir(&self) -> &Path;
    fn chunk_size(&self) -> usize;
    fn chunk_overlap(&self) -> usize;
    fn embedding_model(&self) -> &str;
    fn embedding_dim(&self) -> usize;
    fn write_bundle(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<PageRecord>>;
    async fn transform(&self, pages: Vec<PageRecord>) -> Result<IngestResult>;
    async fn load(&self, result: IngestResult) -> Result<String>;
}

/// 外部程式呼叫的接縫，測試時以 mock 觀察呼叫次數
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput>;
}

pub trait TextExtractor: Send + Sync {
    fn supports(&self, path: &Path) -> bool;
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>>;
}

pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;
    fn dimension(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String>;
}
