use crate::adapters::llm::build_llm;
use crate::config::constants::{
    CONFIDENCE_HIGH, CONFIDENCE_LOW, CONFIDENCE_MEDIUM, GENERAL_SAFETY, REFUSE_KEYWORDS,
};
use crate::config::CopilotConfig;
use crate::core::{ConfigProvider, Storage};
use crate::domain::model::{ChatTurn, ScoredChunk};
use crate::domain::ports::{Embedder, LlmClient};
use crate::processing::classifier::DomainClassifier;
use crate::retrieval::citations::extract_cited_sources;
use crate::retrieval::embedding::{embedder_for, term_coverage};
use crate::retrieval::linker::{document_link, find_document_path};
use crate::retrieval::vector_store::VectorStore;
use crate::synthesis::agent::synthesize;
use crate::utils::error::Result;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

pub const REFUSAL_MESSAGE: &str = "I can't provide legal interpretations, approvals or certification decisions. \
Please consult a qualified safety assessor or legal counsel for that. \
I can still explain what the regulations and standards in the library say.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    #[serde(rename = "Very Low")]
    VeryLow,
}

impl ConfidenceLevel {
    pub fn from_score(score: f32) -> Self {
        if score >= CONFIDENCE_HIGH {
            ConfidenceLevel::High
        } else if score >= CONFIDENCE_MEDIUM {
            ConfidenceLevel::Medium
        } else if score >= CONFIDENCE_LOW {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
            ConfidenceLevel::VeryLow => "Very Low",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub document_name: String,
    pub page_number: u32,
    pub section_number: Option<String>,
    pub similarity: f32,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CopilotAnswer {
    pub question: String,
    pub answer: String,
    pub refused: bool,
    pub domains: Vec<String>,
    pub primary_domain: String,
    pub needs_synthesis: bool,
    pub needs_scenario_reasoning: bool,
    pub confidence: ConfidenceLevel,
    pub confidence_score: f32,
    pub citations: Vec<Citation>,
    pub num_sources: usize,
    pub conflicts: usize,
    pub used_llm: bool,
}

/// 問題包含法律解釋、核准、認證等字眼時拒答
pub fn is_refused(question: &str) -> bool {
    let question = question.to_lowercase();
    REFUSE_KEYWORDS.iter().any(|k| question.contains(k))
}

/// 最佳片段的問題詞彙覆蓋率與相似度取大者
pub fn confidence_score(question: &str, retrieved: &[ScoredChunk]) -> f32 {
    retrieved
        .first()
        .map(|best| term_coverage(question, &best.chunk.text).max(best.similarity))
        .unwrap_or(0.0)
}

pub struct Copilot {
    store: VectorStore,
    embedder: Box<dyn Embedder>,
    llm: Option<Box<dyn LlmClient>>,
    top_k: usize,
    threshold: f32,
    document_roots: Vec<PathBuf>,
}

impl Copilot {
    pub fn new(
        store: VectorStore,
        embedder: Box<dyn Embedder>,
        llm: Option<Box<dyn LlmClient>>,
    ) -> Result<Self> {
        store.ensure_compatible(embedder.as_ref())?;
        Ok(Self {
            store,
            embedder,
            llm,
            top_k: 8,
            threshold: 0.1,
            document_roots: Vec::new(),
        })
    }

    pub fn with_retrieval(mut self, top_k: usize, threshold: f32) -> Self {
        self.top_k = top_k;
        self.threshold = threshold;
        self
    }

    /// 用來產生文件連結的搜尋目錄
    pub fn with_document_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.document_roots = roots;
        self
    }

    /// 從 storage 載入向量庫，依設定建立 embedder 與 LLM
    pub async fn load<S: Storage>(storage: &S, config: &CopilotConfig) -> Result<Self> {
        let location = config.vector_store_dir().display().to_string();
        let store = VectorStore::load(storage, &location).await?;
        let embedder = embedder_for(&config.rag.embedding_model, config.rag.embedding_dim)?;

        Ok(Self::new(store, Box::new(embedder), build_llm(config))?
            .with_retrieval(config.rag.top_k, config.rag.similarity_threshold)
            .with_document_roots(vec![
                config.data_dir().to_path_buf(),
                config.documents_dir().to_path_buf(),
            ]))
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// 有明確領域時先在該領域內檢索，沒有結果再不分領域
    pub fn retrieve(&self, question: &str, domain: Option<&str>) -> Vec<ScoredChunk> {
        let search = |filter: Option<&str>| {
            self.store
                .search(self.embedder.as_ref(), question, self.top_k, self.threshold, filter)
        };

        if let Some(domain) = domain.filter(|d| *d != GENERAL_SAFETY) {
            let filtered = search(Some(domain));
            if !filtered.is_empty() {
                return filtered;
            }
            tracing::debug!("No {} chunks above threshold, searching all domains", domain);
        }
        search(None)
    }

    fn link_for(&self, scored: &ScoredChunk) -> Option<String> {
        let chunk = &scored.chunk;
        self.document_roots.iter().find_map(|root| {
            let path = find_document_path(root, &chunk.document_name)?;
            document_link(&path, root, chunk.page_number, chunk.section_number.as_deref()).ok()
        })
    }

    pub async fn answer(&self, question: &str, history: &[ChatTurn]) -> CopilotAnswer {
        let domains: Vec<String> = DomainClassifier::classify_domain(question)
            .into_iter()
            .map(str::to_string)
            .collect();
        let primary_domain = DomainClassifier::primary_domain(question);
        let needs_synthesis = DomainClassifier::needs_synthesis(question);
        let needs_scenario_reasoning = DomainClassifier::needs_scenario_reasoning(question);

        if is_refused(question) {
            tracing::info!("🛑 Question refused by guardrail");
            return CopilotAnswer {
                question: question.to_string(),
                answer: REFUSAL_MESSAGE.to_string(),
                refused: true,
                domains,
                primary_domain: primary_domain.to_string(),
                needs_synthesis,
                needs_scenario_reasoning,
                confidence: ConfidenceLevel::VeryLow,
                confidence_score: 0.0,
                citations: Vec::new(),
                num_sources: 0,
                conflicts: 0,
                used_llm: false,
            };
        }

        tracing::info!(
            "🔍 Question classified as {} (synthesis: {}, scenario: {})",
            primary_domain,
            needs_synthesis,
            needs_scenario_reasoning
        );
        let retrieved = self.retrieve(question, Some(primary_domain));
        tracing::info!("Retrieved {} chunks", retrieved.len());

        let synthesis = synthesize(question, &retrieved, history, self.llm.as_deref()).await;

        let citations = extract_cited_sources(&synthesis.raw_answer, &retrieved)
            .iter()
            .map(|scored| Citation {
                document_name: scored.chunk.document_name.clone(),
                page_number: scored.chunk.page_number,
                section_number: scored.chunk.section_number.clone(),
                similarity: scored.similarity,
                link: self.link_for(scored),
            })
            .collect();

        let score = confidence_score(question, &retrieved);

        CopilotAnswer {
            question: question.to_string(),
            answer: synthesis.synthesis,
            refused: false,
            domains,
            primary_domain: primary_domain.to_string(),
            needs_synthesis,
            needs_scenario_reasoning,
            confidence: ConfidenceLevel::from_score(score),
            confidence_score: score,
            citations,
            num_sources: synthesis.num_sources,
            conflicts: synthesis.conflicts.len(),
            used_llm: synthesis.used_llm,
        }
    }
}
