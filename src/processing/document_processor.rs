//! Turns extracted page text into tagged, overlapping chunks.

use crate::config::constants::{DUMMY_TYPES, METRICS, TEST_TYPES};
use crate::domain::model::{DocumentChunk, DocumentMetadata, PageText, TableData};
use crate::domain::ports::TextExtractor;
use crate::processing::extractor::discover_documents;
use crate::synthesis::tables::TableExtractor;
use crate::utils::error::Result;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Section|Clause|Part)\s+(\d+\.\d+(?:\.\d+)*)").expect("valid regex")
});
static LEADING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+(?:\.\d+)*").expect("valid regex"));
static CONTROL_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F-\x{9F}]").expect("valid regex")
});
static MERGED_WORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Symbols that survive cleaning even when repeated.
pub const ALLOWED_SYMBOLS: &str = "-.,;:()[]{}%°±×÷≤≥≠≈∞∑∏∫√αβγδεθλμπστφω";

pub fn is_allowed_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c.is_whitespace() || ALLOWED_SYMBOLS.contains(c)
}

/// 連續三個以上相同字元且符合 predicate 時，整段換成 replacement
pub fn collapse_runs(text: &str, predicate: impl Fn(char) -> bool, replacement: RunReplacement) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let mut j = i + 1;
        while j < chars.len() && chars[j] == c {
            j += 1;
        }
        let run = j - i;
        if run >= 3 && predicate(c) {
            match replacement {
                RunReplacement::Space => out.push(' '),
                RunReplacement::Single => out.push(c),
            }
        } else {
            out.extend(std::iter::repeat(c).take(run));
        }
        i = j;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReplacement {
    Space,
    Single,
}

/// 可讀字元（英數或空白）比例
pub fn readable_ratio(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let readable = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .count();
    readable as f32 / total as f32
}

/// 清除 PDF 抽取常見的雜訊
pub fn clean_text(text: &str) -> String {
    let cleaned = CONTROL_CHARS_RE.replace_all(text, " ");
    let cleaned = MERGED_WORDS_RE.replace_all(&cleaned, "$1 $2");
    let cleaned = WHITESPACE_RE.replace_all(&cleaned, " ");
    collapse_runs(&cleaned, |c| !is_allowed_char(c), RunReplacement::Space)
}

pub fn extract_section_number(text: &str) -> Option<String> {
    if let Some(caps) = SECTION_RE.captures(text) {
        return Some(caps[1].to_string());
    }

    text.lines()
        .take(3)
        .find_map(|line| LEADING_NUMBER_RE.find(line.trim()))
        .map(|m| m.as_str().to_string())
}

fn tokens(stem: &str) -> Vec<String> {
    stem.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// 與 TEST_TYPES / METRICS / DUMMY_TYPES 同序的檔名關鍵字
const TEST_TYPE_ALIASES: [&[&str]; 5] =
    [&["frontal"], &["side"], &["pole"], &["pedestrian"], &["post_crash"]];
const METRIC_ALIASES: [&[&str]; 4] = [&["hic"], &["chest_deflection"], &["tibia"], &["intrusion"]];
const DUMMY_ALIASES: [&[&str]; 3] = [&["hybrid_iii", "hybrid3"], &["worldsid"], &["thor", "thor_m"]];

/// 由上層資料夾與檔名推斷 origin / domain / strictness / method / year
pub fn extract_metadata_from_path(path: &Path) -> DocumentMetadata {
    let parent_folder = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let file_name = path
        .file_stem()
        .map(|n| n.to_string_lossy().to_lowercase().replace(['-', ' '], "_"))
        .unwrap_or_default();
    let in_passive_safety = path
        .ancestors()
        .skip(1)
        .filter_map(|p| p.file_name())
        .any(|n| n.to_string_lossy().to_lowercase().contains("passive_safety"));
    let name_tokens = tokens(&file_name);
    let has_token = |t: &str| name_tokens.iter().any(|n| n == t);

    let mut metadata = DocumentMetadata::default();
    let set_source = |m: &mut DocumentMetadata, origin: &str, strictness: &str, source: &str| {
        m.origin = Some(origin.to_string());
        m.strictness = Some(strictness.to_string());
        m.source_type = Some(source.to_string());
    };

    if parent_folder.contains("unece") {
        set_source(&mut metadata, "UNECE", "Regulatory", "Regulation");
    } else if parent_folder.contains("nhtsa") {
        set_source(&mut metadata, "NHTSA", "Guideline", "Guideline");
    } else if parent_folder.contains("functional_safety")
        || file_name.contains("tuv")
        || file_name.contains("dekra")
    {
        set_source(&mut metadata, "Industry", "Standard", "Standard");
    } else if parent_folder.contains("validation") {
        set_source(&mut metadata, "Industry", "Best Practice", "Whitepaper");
    } else if in_passive_safety && parent_folder.contains("regulations") {
        let origin = if file_name.contains("fmvss") {
            "NHTSA"
        } else if file_name.contains("r94") || file_name.contains("r137") {
            "UNECE"
        } else {
            "Industry"
        };
        set_source(&mut metadata, origin, "Regulatory", "Regulation");
    } else if in_passive_safety && parent_folder.contains("ncap") {
        let origin = if file_name.contains("euro") {
            "Euro NCAP"
        } else {
            "NCAP"
        };
        set_source(&mut metadata, origin, "Best Practice", "Protocol");
    } else if in_passive_safety && parent_folder.contains("fundamentals") {
        set_source(&mut metadata, "Industry", "Best Practice", "Training");
    } else {
        set_source(&mut metadata, "Industry", "Standard", "Document");
    }

    let domain = if parent_folder.contains("cybersecurity") || file_name.contains("r155") {
        "Cybersecurity"
    } else if parent_folder.contains("software_update") || file_name.contains("r156") {
        "Software Update"
    } else if parent_folder.contains("functional_safety")
        || file_name.contains("asil")
        || file_name.contains("iso_26262")
    {
        "Functional Safety"
    } else if parent_folder.contains("adas") || file_name.contains("adas") {
        "ADAS"
    } else if file_name.contains("driver_monitoring") || file_name.contains("dms") {
        "Driver Monitoring"
    } else if parent_folder.contains("validation") {
        "Validation"
    } else if in_passive_safety
        || file_name.contains("r94")
        || file_name.contains("r137")
        || file_name.contains("ncap")
        || file_name.contains("fmvss")
    {
        "Passive Safety"
    } else {
        "General Safety"
    };
    metadata.domain = Some(domain.to_string());

    metadata.method = if file_name.contains("r155") {
        Some("UNECE R155")
    } else if file_name.contains("r156") {
        Some("UNECE R156")
    } else if file_name.contains("iso_26262") || file_name.contains("iso26262") {
        Some("ISO 26262")
    } else if file_name.contains("asil") {
        Some("ISO 26262 ASIL")
    } else if file_name.contains("hara") {
        Some("HARA (ISO 26262)")
    } else if file_name.contains("r94") {
        Some("UNECE R94")
    } else if file_name.contains("r137") {
        Some("UNECE R137")
    } else if file_name.contains("fmvss_208") || file_name.contains("fmvss208") {
        Some("FMVSS 208")
    } else {
        None
    }
    .map(str::to_string);

    metadata.year = name_tokens.iter().find_map(|t| {
        let is_year = t.len() == 4 && (t.starts_with("19") || t.starts_with("20"));
        if is_year {
            t.parse().ok()
        } else {
            None
        }
    });

    if domain == "Passive Safety" {
        let tag = |vocabulary: &[&str], aliases: &[&[&str]]| {
            vocabulary
                .iter()
                .zip(aliases)
                .find(|(_, keys)| {
                    keys.iter().any(|k| {
                        // 含底線的關鍵字跨越多個詞，直接比對檔名
                        if k.contains('_') {
                            file_name.contains(k)
                        } else {
                            has_token(k)
                        }
                    })
                })
                .map(|(tag, _)| tag.to_string())
        };
        metadata.test_type = tag(&TEST_TYPES, &TEST_TYPE_ALIASES);
        metadata.metric = tag(&METRICS, &METRIC_ALIASES);
        metadata.dummy_type = tag(&DUMMY_TYPES, &DUMMY_ALIASES);
    }

    metadata
}

#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(600, 100)
    }
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    fn build_chunk(
        &self,
        words: &[&str],
        page_number: u32,
        document_name: &str,
        index: usize,
        metadata: &DocumentMetadata,
        table: &Option<TableData>,
    ) -> DocumentChunk {
        let text = words.join(" ");
        DocumentChunk {
            section_number: extract_section_number(&text),
            text,
            document_name: document_name.to_string(),
            page_number,
            chunk_id: format!("{}_p{}_c{}", document_name, page_number, index),
            table: table.clone(),
            metadata: metadata.clone(),
        }
    }

    /// 取尾端不超過 chunk_overlap 字元的詞作為下一段的開頭，至少一個詞
    fn overlap_start(&self, words: &[&str]) -> usize {
        let mut length = 0;
        let mut start = words.len();
        while start > 0 {
            let next = length + words[start - 1].chars().count() + 1;
            if next > self.chunk_overlap && start < words.len() {
                break;
            }
            length = next;
            start -= 1;
        }
        start
    }

    pub fn chunk_text(
        &self,
        text: &str,
        page_number: u32,
        document_name: &str,
        metadata: &DocumentMetadata,
    ) -> Vec<DocumentChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // 清理會破壞欄位對齊，表格要在原始文字上找
        let table = TableExtractor::from_raw_text(text);
        let cleaned = clean_text(text);
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_length = 0;
        let mut fresh_words = 0;

        for word in cleaned.split_whitespace() {
            current.push(word);
            current_length += word.chars().count() + 1;
            fresh_words += 1;

            if current_length >= self.chunk_size {
                chunks.push(self.build_chunk(
                    &current,
                    page_number,
                    document_name,
                    chunks.len(),
                    metadata,
                    &table,
                ));

                let start = self.overlap_start(&current);
                current.drain(..start);
                current_length = current.iter().map(|w| w.chars().count() + 1).sum();
                fresh_words = 0;
            }
        }

        // 尾段必須有新內容且可讀
        if fresh_words > 0 && !current.is_empty() {
            let chunk = self.build_chunk(
                &current,
                page_number,
                document_name,
                chunks.len(),
                metadata,
                &table,
            );
            if readable_ratio(&chunk.text) >= 0.6 {
                chunks.push(chunk);
            }
        }

        chunks
    }

    pub fn chunk_pages(
        &self,
        pages: &[PageText],
        document_name: &str,
        metadata: &DocumentMetadata,
    ) -> Vec<DocumentChunk> {
        pages
            .iter()
            .flat_map(|page| self.chunk_text(&page.text, page.page_number, document_name, metadata))
            .collect()
    }

    /// 回傳 (chunks, 頁數)
    pub fn process_document(
        &self,
        path: &Path,
        extractor: &dyn TextExtractor,
    ) -> Result<(Vec<DocumentChunk>, usize)> {
        let document_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        tracing::info!("📄 Processing {}...", document_name);

        let metadata = extract_metadata_from_path(path);
        tracing::info!("   Tags: {}", metadata.tags().join(", "));

        let pages = extractor.extract_pages(path)?;
        let chunks = self.chunk_pages(&pages, &document_name, &metadata);

        tracing::info!(
            "✅ Processed {}: {} pages, {} chunks",
            document_name,
            pages.len(),
            chunks.len()
        );
        Ok((chunks, pages.len()))
    }

    /// 單一文件失敗只記錄警告，不中斷整個目錄
    pub fn process_directory(
        &self,
        dir: &Path,
        recursive: bool,
        extractor: &dyn TextExtractor,
    ) -> Result<Vec<DocumentChunk>> {
        let files = discover_documents(dir, recursive, extractor)?;
        if files.is_empty() {
            tracing::warn!("⚠️  No documents found in {}", dir.display());
            return Ok(Vec::new());
        }

        tracing::info!("📚 Found {} document(s) to process", files.len());
        let mut all_chunks = Vec::new();
        for path in files {
            match self.process_document(&path, extractor) {
                Ok((chunks, _)) => all_chunks.extend(chunks),
                Err(e) => tracing::warn!("⚠️  Skipping {}: {}", path.display(), e),
            }
        }
        Ok(all_chunks)
    }
}
