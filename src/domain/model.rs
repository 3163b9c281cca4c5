use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 單頁抽取結果，頁碼從 1 開始
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

/// extract 階段的輸出：一份文件的一頁
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub document_name: String,
    pub path: PathBuf,
    pub page_number: u32,
    pub text: String,
}

/// 由檔案路徑推斷的標籤
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub origin: Option<String>,
    pub domain: Option<String>,
    pub strictness: Option<String>,
    pub method: Option<String>,
    pub year: Option<i32>,
    pub source_type: Option<String>,
    pub test_type: Option<String>,
    pub metric: Option<String>,
    pub dummy_type: Option<String>,
}

impl DocumentMetadata {
    /// "Origin=UNECE, Domain=Cybersecurity, ..." 形式的摘要
    pub fn tags(&self) -> Vec<String> {
        let mut tags = vec![
            format!("Origin={}", self.origin.as_deref().unwrap_or("None")),
            format!("Domain={}", self.domain.as_deref().unwrap_or("None")),
            format!("Strictness={}", self.strictness.as_deref().unwrap_or("None")),
        ];
        if let Some(method) = &self.method {
            tags.push(format!("Method={}", method));
        }
        if let Some(test_type) = &self.test_type {
            tags.push(format!("Test_Type={}", test_type));
        }
        if let Some(metric) = &self.metric {
            tags.push(format!("Metric={}", metric));
        }
        if let Some(dummy_type) = &self.dummy_type {
            tags.push(format!("Dummy_Type={}", dummy_type));
        }
        tags
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Markdown,
    SpaceSeparated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub kind: TableKind,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub document_name: String,
    pub page_number: u32,
    pub section_number: Option<String>,
    pub chunk_id: String,
    /// 清理文字前從原始頁面偵測到的表格
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableData>,
    #[serde(flatten)]
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub similarity: f32,
}

/// transform 階段的輸出
#[derive(Debug, Clone, Default)]
pub struct IngestResult {
    pub documents: Vec<String>,
    pub pages: usize,
    pub chunks: Vec<DocumentChunk>,
    pub vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// 外部指令執行結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }
}
