pub use crate::domain::model::{TableData, TableKind};

use crate::domain::model::{DocumentChunk, ScoredChunk};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

const TABLE_CONTEXT_CHARS: usize = 500;

static TABLE_INDICATORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\|\s*[^|]+\s*\|",
        r"\s{3,}\S+\s{3,}",
        r"\t+[^\t]+",
        r"(?m)^\s*\d+\.\d+\s+[A-Z]",
        r"ASIL\s+[A-D]",
        r"HIC\s+\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static COLUMN_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{3,}|\t+").expect("valid regex"));

/// 在某份文件某頁找到的表格
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedTable {
    pub document: String,
    pub page: u32,
    pub section: Option<String>,
    pub table: TableData,
    pub context: String,
}

pub struct TableExtractor;

impl TableExtractor {
    pub fn detect_table(text: &str) -> bool {
        TABLE_INDICATORS.iter().any(|re| re.is_match(text))
    }

    /// 先找 markdown 表格，再找以多個空白或 tab 分欄的表格
    pub fn extract_table_data(text: &str) -> Option<TableData> {
        Self::markdown_table(text).or_else(|| Self::column_table(text))
    }

    fn markdown_table(text: &str) -> Option<TableData> {
        let mut headers: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        for line in text.lines().filter(|l| l.contains('|')) {
            let cells: Vec<String> = line
                .split('|')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            if cells.is_empty() {
                continue;
            }
            // |---|:---:| 分隔列
            if cells.iter().all(|c| c.chars().all(|ch| ch == '-' || ch == ':')) {
                continue;
            }
            if headers.is_none() {
                headers = Some(cells);
            } else {
                rows.push(cells);
            }
        }

        match headers {
            Some(headers) if !rows.is_empty() => Some(TableData {
                kind: TableKind::Markdown,
                headers,
                rows,
            }),
            _ => None,
        }
    }

    fn column_table(text: &str) -> Option<TableData> {
        let mut lines: Vec<Vec<String>> = text
            .lines()
            .filter(|line| COLUMN_GAP.is_match(line))
            .map(|line| {
                COLUMN_GAP
                    .split(line.trim())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|parts| parts.len() >= 2)
            .collect();

        if lines.len() < 2 {
            return None;
        }
        let headers = lines.remove(0);
        Some(TableData {
            kind: TableKind::SpaceSeparated,
            headers,
            rows: lines,
        })
    }

    /// 在原始頁面文字上偵測並解析表格
    pub fn from_raw_text(text: &str) -> Option<TableData> {
        if !Self::detect_table(text) {
            return None;
        }
        Self::extract_table_data(text)
    }

    /// 優先使用切塊時保留的表格；沒有時才對 chunk 文字重新偵測
    pub fn from_chunk(chunk: &DocumentChunk) -> Option<ExtractedTable> {
        let table = match &chunk.table {
            Some(table) => table.clone(),
            None => Self::from_raw_text(&chunk.text)?,
        };
        Some(ExtractedTable {
            document: chunk.document_name.clone(),
            page: chunk.page_number,
            section: chunk.section_number.clone(),
            table,
            context: chunk.text.chars().take(TABLE_CONTEXT_CHARS).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardInfo {
    pub document: String,
    pub origin: Option<String>,
    pub method: Option<String>,
    pub domain: Option<String>,
    pub strictness: Option<String>,
    pub year: Option<i32>,
    pub text: String,
    pub page: u32,
    pub section: Option<String>,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub standard: String,
    pub sources: Vec<StandardInfo>,
    pub conflict_type: String,
}

pub struct StandardComparator;

impl StandardComparator {
    pub fn extract_standard_info(retrieved: &[ScoredChunk]) -> Vec<StandardInfo> {
        retrieved
            .iter()
            .map(|scored| {
                let chunk = &scored.chunk;
                StandardInfo {
                    document: chunk.document_name.clone(),
                    origin: chunk.metadata.origin.clone(),
                    method: chunk.metadata.method.clone(),
                    domain: chunk.metadata.domain.clone(),
                    strictness: chunk.metadata.strictness.clone(),
                    year: chunk.metadata.year,
                    text: chunk.text.clone(),
                    page: chunk.page_number,
                    section: chunk.section_number.clone(),
                    similarity: scored.similarity,
                }
            })
            .collect()
    }

    /// 同一 domain/method 有多個來源，且 origin 或 strictness 不一致
    pub fn detect_conflicts(standards: &[StandardInfo]) -> Vec<Conflict> {
        let mut groups: Vec<(String, Vec<&StandardInfo>)> = Vec::new();
        for info in standards {
            let key = format!(
                "{}_{}",
                info.domain.as_deref().unwrap_or("Unknown"),
                info.method.as_deref().unwrap_or("Unknown")
            );
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(info),
                None => groups.push((key, vec![info])),
            }
        }

        groups
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .filter(|(_, members)| {
                let origins: HashSet<_> = members.iter().map(|m| m.origin.as_deref()).collect();
                let strictness: HashSet<_> =
                    members.iter().map(|m| m.strictness.as_deref()).collect();
                origins.len() > 1 || strictness.len() > 1
            })
            .map(|(standard, members)| Conflict {
                standard,
                sources: members.into_iter().cloned().collect(),
                conflict_type: "multiple_interpretations".to_string(),
            })
            .collect()
    }
}
