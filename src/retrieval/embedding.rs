//! Deterministic feature-hashing embedder.
//!
//! Lowercased word unigrams (weight 1.0) and bigrams (weight 0.5) are hashed
//! with FNV-1a into `dim` signed buckets and the vector is L2-normalized, so
//! cosine similarity is a plain dot product. The hash is fixed so persisted
//! indexes stay valid across builds.

use crate::domain::ports::Embedder;
use crate::utils::error::{CopilotError, Result};
use std::collections::HashSet;

pub const FEATURE_HASH_MODEL: &str = "feature-hash-v1";

const BIGRAM_WEIGHT: f32 = 0.5;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it",
    "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "what", "which",
    "with", "how", "does", "do", "can", "shall", "should", "there", "their", "these",
];

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// 小寫、以非英數字元切詞、去除停用詞
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter(|t| t.len() > 1 || t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// 問題詞彙在文本中出現的比例（0..=1）
pub fn term_coverage(query: &str, text: &str) -> f32 {
    let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
    if query_terms.is_empty() {
        return 0.0;
    }
    let text_terms: HashSet<String> = tokenize(text).into_iter().collect();
    let hits = query_terms.iter().filter(|t| text_terms.contains(*t)).count();
    hits as f32 / query_terms.len() as f32
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dim as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        FEATURE_HASH_MODEL
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dim];
        let tokens = tokenize(text);

        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

/// 依設定的模型名稱建立 embedder
pub fn embedder_for(model: &str, dim: usize) -> Result<HashingEmbedder> {
    match model {
        FEATURE_HASH_MODEL => Ok(HashingEmbedder::new(dim)),
        other => Err(CopilotError::InvalidConfigValueError {
            field: "rag.embedding_model".to_string(),
            value: other.to_string(),
            reason: format!("Supported models: {}", FEATURE_HASH_MODEL),
        }),
    }
}
