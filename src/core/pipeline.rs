use crate::adapters::SystemCommandRunner;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{DocumentChunk, DocumentMetadata, IngestResult, PageRecord};
use crate::domain::ports::{Embedder, TextExtractor};
use crate::processing::document_processor::{extract_metadata_from_path, DocumentProcessor};
use crate::processing::extractor::{
    discover_documents, CompositeExtractor, PdfToTextExtractor, PlainTextExtractor,
};
use crate::retrieval::embedding::embedder_for;
use crate::retrieval::vector_store::VectorStore;
use crate::utils::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::{FileOptions, ZipWriter};

pub const MANIFEST_FILE: &str = "chunks.csv";
pub const BUNDLE_FILE: &str = "vector_store_bundle.zip";

/// 文件名稱為不含副檔名的檔名
pub fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// 預設抽取器：純文字與 PDF（pdftotext）
pub fn default_extractor() -> CompositeExtractor {
    CompositeExtractor::new()
        .with(PlainTextExtractor)
        .with(PdfToTextExtractor::new(SystemCommandRunner::new()))
}

/// data 目錄遞迴搜尋，舊版 documents 目錄只看第一層
pub fn discover_sources<C: ConfigProvider>(
    config: &C,
    extractor: &dyn TextExtractor,
) -> Result<Vec<PathBuf>> {
    let mut files = discover_documents(config.data_dir(), true, extractor)?;
    for path in discover_documents(config.documents_dir(), false, extractor)? {
        if !files.contains(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

pub struct DocumentPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    extractor: Box<dyn TextExtractor>,
    embedder: Box<dyn Embedder>,
}

impl<S: Storage, C: ConfigProvider> DocumentPipeline<S, C> {
    pub fn new(
        storage: S,
        config: C,
        extractor: Box<dyn TextExtractor>,
        embedder: Box<dyn Embedder>,
    ) -> Self {
        Self {
            storage,
            config,
            extractor,
            embedder,
        }
    }

    /// 依設定建立 embedder，並使用預設抽取器
    pub fn from_config(storage: S, config: C) -> Result<Self> {
        let embedder = embedder_for(config.embedding_model(), config.embedding_dim())?;
        Ok(Self::new(
            storage,
            config,
            Box::new(default_extractor()),
            Box::new(embedder),
        ))
    }

    pub fn sources(&self) -> Result<Vec<PathBuf>> {
        discover_sources(&self.config, self.extractor.as_ref())
    }

    fn manifest_csv(chunks: &[DocumentChunk]) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "chunk_id",
            "document_name",
            "page_number",
            "section_number",
            "origin",
            "domain",
            "method",
            "year",
            "characters",
        ])?;
        for chunk in chunks {
            writer.write_record([
                chunk.chunk_id.clone(),
                chunk.document_name.clone(),
                chunk.page_number.to_string(),
                chunk.section_number.clone().unwrap_or_default(),
                chunk.metadata.origin.clone().unwrap_or_default(),
                chunk.metadata.domain.clone().unwrap_or_default(),
                chunk.metadata.method.clone().unwrap_or_default(),
                chunk.metadata.year.map(|y| y.to_string()).unwrap_or_default(),
                chunk.text.chars().count().to_string(),
            ])?;
        }
        writer.into_inner().map_err(|e| e.into_error().into())
    }

    fn bundle_zip(files: &[(&str, Vec<u8>)]) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in files {
            zip.start_file::<_, ()>(*name, FileOptions::default())?;
            zip.write_all(data)?;
        }
        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for DocumentPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<PageRecord>> {
        let files = self.sources()?;
        tracing::info!("📚 Found {} document(s) to process", files.len());

        let mut pages = Vec::new();
        for path in files {
            let name = document_name(&path);
            match self.extractor.extract_pages(&path) {
                Ok(extracted) => {
                    tracing::debug!("{}: {} pages", name, extracted.len());
                    pages.extend(extracted.into_iter().map(|page| PageRecord {
                        document_name: name.clone(),
                        path: path.clone(),
                        page_number: page.page_number,
                        text: page.text,
                    }));
                }
                Err(e) => tracing::warn!("⚠️  Skipping {}: {}", path.display(), e),
            }
        }
        Ok(pages)
    }

    async fn transform(&self, pages: Vec<PageRecord>) -> Result<IngestResult> {
        let processor = DocumentProcessor::new(self.config.chunk_size(), self.config.chunk_overlap());
        let mut result = IngestResult {
            pages: pages.len(),
            ..Default::default()
        };

        let mut last_path: Option<&Path> = None;
        let mut metadata = DocumentMetadata::default();
        for page in &pages {
            if last_path != Some(page.path.as_path()) {
                metadata = extract_metadata_from_path(&page.path);
                tracing::info!("📄 {} | {}", page.document_name, metadata.tags().join(", "));
                result.documents.push(page.document_name.clone());
                last_path = Some(page.path.as_path());
            }
            result.chunks.extend(processor.chunk_text(
                &page.text,
                page.page_number,
                &page.document_name,
                &metadata,
            ));
        }

        result.vectors = result
            .chunks
            .iter()
            .map(|chunk| self.embedder.embed(&chunk.text))
            .collect();

        tracing::info!(
            "✅ {} documents, {} pages, {} chunks",
            result.documents.len(),
            result.pages,
            result.chunks.len()
        );
        Ok(result)
    }

    async fn load(&self, result: IngestResult) -> Result<String> {
        let location = self.config.vector_store_dir().display().to_string();
        if result.chunks.is_empty() {
            tracing::warn!("⚠️  No chunks produced; vector store not written");
            return Ok(location);
        }

        let manifest = Self::manifest_csv(&result.chunks)?;
        let store = VectorStore::assemble(
            result.chunks,
            result.vectors,
            self.embedder.as_ref(),
            self.config.chunk_size(),
            self.config.chunk_overlap(),
        );

        let files = store.files()?;
        for (name, data) in &files {
            tracing::debug!("Writing {} ({} bytes)", name, data.len());
            self.storage.write_file(name, data).await?;
        }
        self.storage.write_file(MANIFEST_FILE, &manifest).await?;

        if self.config.write_bundle() {
            let bundle = Self::bundle_zip(&files)?;
            tracing::debug!("Writing {} ({} bytes)", BUNDLE_FILE, bundle.len());
            self.storage.write_file(BUNDLE_FILE, &bundle).await?;
        }

        Ok(location)
    }
}
