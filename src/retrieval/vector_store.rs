use crate::domain::model::{DocumentChunk, ScoredChunk};
use crate::domain::ports::{Embedder, Storage};
use crate::retrieval::embedding::cosine;
use crate::utils::error::{CopilotError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const CHUNKS_FILE: &str = "chunks.json";
pub const CONFIG_FILE: &str = "config.json";
pub const INDEX_FILE: &str = "index.json";

/// config.json 的內容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreManifest {
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub num_documents: usize,
    pub num_chunks: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub num_documents: usize,
    pub num_chunks: usize,
    pub embedding_model: String,
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    manifest: StoreManifest,
    chunks: Vec<DocumentChunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorStore {
    pub fn build(
        chunks: Vec<DocumentChunk>,
        embedder: &dyn Embedder,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        let vectors = chunks.iter().map(|c| embedder.embed(&c.text)).collect();
        Self::assemble(chunks, vectors, embedder, chunk_size, chunk_overlap)
    }

    /// 已有向量時直接組裝（ingest 的 transform 階段先算好向量）
    pub fn assemble(
        chunks: Vec<DocumentChunk>,
        vectors: Vec<Vec<f32>>,
        embedder: &dyn Embedder,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        let num_documents = chunks
            .iter()
            .map(|c| c.document_name.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        Self {
            manifest: StoreManifest {
                embedding_model: embedder.model_name().to_string(),
                embedding_dim: embedder.dimension(),
                chunk_size,
                chunk_overlap,
                num_documents,
                num_chunks: chunks.len(),
                created_at: Utc::now(),
            },
            chunks,
            vectors,
        }
    }

    pub fn from_parts(
        manifest: StoreManifest,
        chunks: Vec<DocumentChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(CopilotError::VectorStoreError {
                message: format!(
                    "{} chunks but {} vectors in index",
                    chunks.len(),
                    vectors.len()
                ),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != manifest.embedding_dim) {
            return Err(CopilotError::VectorStoreError {
                message: format!(
                    "vector of dimension {} does not match manifest dimension {}",
                    bad.len(),
                    manifest.embedding_dim
                ),
            });
        }

        Ok(Self {
            manifest,
            chunks,
            vectors,
        })
    }

    pub fn manifest(&self) -> &StoreManifest {
        &self.manifest
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            num_documents: self.manifest.num_documents,
            num_chunks: self.chunks.len(),
            embedding_model: self.manifest.embedding_model.clone(),
        }
    }

    /// 檢查查詢用的 embedder 與建庫時一致
    pub fn ensure_compatible(&self, embedder: &dyn Embedder) -> Result<()> {
        if self.manifest.embedding_model != embedder.model_name()
            || self.manifest.embedding_dim != embedder.dimension()
        {
            return Err(CopilotError::VectorStoreError {
                message: format!(
                    "store was built with {} ({} dims), query embedder is {} ({} dims)",
                    self.manifest.embedding_model,
                    self.manifest.embedding_dim,
                    embedder.model_name(),
                    embedder.dimension()
                ),
            });
        }
        Ok(())
    }

    /// 相似度由高到低，同分依建立順序；低於門檻者剔除
    pub fn search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        top_k: usize,
        threshold: f32,
        domain: Option<&str>,
    ) -> Vec<ScoredChunk> {
        let query_vector = embedder.embed(query);
        if query_vector.iter().all(|v| *v == 0.0) {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .filter(|(i, _)| match domain {
                Some(domain) => self.chunks[*i].metadata.domain.as_deref() == Some(domain),
                None => true,
            })
            .map(|(i, v)| (i, cosine(&query_vector, v)))
            .filter(|(_, score)| *score >= threshold)
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(i, similarity)| ScoredChunk {
                chunk: self.chunks[i].clone(),
                similarity,
            })
            .collect()
    }

    /// 序列化後的三個檔案 (檔名, 內容)
    pub fn files(&self) -> Result<Vec<(&'static str, Vec<u8>)>> {
        Ok(vec![
            (CHUNKS_FILE, serde_json::to_vec_pretty(&self.chunks)?),
            (CONFIG_FILE, serde_json::to_vec_pretty(&self.manifest)?),
            (INDEX_FILE, serde_json::to_vec(&self.vectors)?),
        ])
    }

    pub async fn save<S: Storage>(&self, storage: &S) -> Result<()> {
        for (name, data) in self.files()? {
            storage.write_file(name, &data).await?;
        }
        Ok(())
    }

    /// `location` 只用於錯誤訊息
    pub async fn load<S: Storage>(storage: &S, location: &str) -> Result<Self> {
        let read = |name: &'static str| async move {
            storage.read_file(name).await.map_err(|e| match e {
                CopilotError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    CopilotError::NotInitialized {
                        path: location.to_string(),
                    }
                }
                other => other,
            })
        };

        let chunks: Vec<DocumentChunk> = serde_json::from_slice(&read(CHUNKS_FILE).await?)?;
        let manifest: StoreManifest = serde_json::from_slice(&read(CONFIG_FILE).await?)?;
        let vectors: Vec<Vec<f32>> = serde_json::from_slice(&read(INDEX_FILE).await?)?;

        Self::from_parts(manifest, chunks, vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::LocalStorage;
    use crate::domain::model::DocumentMetadata;
    use crate::retrieval::embedding::HashingEmbedder;

    fn chunk(doc: &str, page: u32, domain: &str, text: &str) -> DocumentChunk {
        DocumentChunk {
            text: text.to_string(),
            document_name: doc.to_string(),
            page_number: page,
            section_number: None,
            chunk_id: format!("{}_p{}_c0", doc, page),
            table: None,
            metadata: DocumentMetadata {
                domain: Some(domain.to_string()),
                ..Default::default()
            },
        }
    }

    fn sample_store(embedder: &HashingEmbedder) -> VectorStore {
        VectorStore::build(
            vec![
                chunk("r94", 12, "Passive Safety", "HIC value shall not exceed 1000 in the frontal impact test"),
                chunk("r155", 4, "Cybersecurity", "The manufacturer shall operate a cyber security management system"),
                chunk("euro_ncap", 30, "Passive Safety", "Euro NCAP frontal offset test scoring uses HIC and chest deflection"),
            ],
            embedder,
            600,
            100,
        )
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let embedder = HashingEmbedder::default();
        let store = sample_store(&embedder);

        let results = store.search(&embedder, "HIC frontal impact", 2, 0.05, None);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.document_name, "r94");
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[test]
    fn test_search_domain_filter_and_threshold() {
        let embedder = HashingEmbedder::default();
        let store = sample_store(&embedder);

        let results = store.search(&embedder, "cyber security management", 5, 0.05, Some("Cybersecurity"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_name, "r155");

        let none = store.search(&embedder, "cyber security management", 5, 0.99, None);
        assert!(none.is_empty());
    }

    #[test]
    fn test_stats_counts_documents() {
        let embedder = HashingEmbedder::default();
        let store = sample_store(&embedder);

        let stats = store.stats();
        assert_eq!(stats.num_documents, 3);
        assert_eq!(stats.num_chunks, 3);
        assert_eq!(stats.embedding_model, "feature-hash-v1");
    }

    #[test]
    fn test_from_parts_rejects_mismatched_index() {
        let embedder = HashingEmbedder::new(8);
        let store = VectorStore::build(vec![chunk("a", 1, "ADAS", "lane keeping")], &embedder, 600, 100);

        let err = VectorStore::from_parts(store.manifest().clone(), store.chunks().to_vec(), vec![]);
        assert!(err.is_err());

        let err = VectorStore::from_parts(
            store.manifest().clone(),
            store.chunks().to_vec(),
            vec![vec![0.0; 4]],
        );
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_save_and_load_through_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let embedder = HashingEmbedder::default();
        let store = sample_store(&embedder);

        store.save(&storage).await.unwrap();
        assert!(dir.path().join(CHUNKS_FILE).exists());
        assert!(dir.path().join(CONFIG_FILE).exists());
        assert!(dir.path().join(INDEX_FILE).exists());

        let loaded = VectorStore::load(&storage, "vector_store").await.unwrap();
        assert_eq!(loaded.chunks(), store.chunks());
        assert_eq!(loaded.manifest(), store.manifest());
        assert!(loaded.ensure_compatible(&embedder).is_ok());
        assert!(loaded.ensure_compatible(&HashingEmbedder::new(32)).is_err());
    }

    #[tokio::test]
    async fn test_load_missing_store_is_not_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let err = VectorStore::load(&storage, "vector_store").await.unwrap_err();
        assert!(matches!(err, CopilotError::NotInitialized { .. }));
    }
}
