use crate::domain::model::ScoredChunk;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

const CITED_SIMILARITY: f32 = 0.6;
const FALLBACK_SOURCES: usize = 3;

static REFERENCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)document[:\s]+([^,]+?)[,\s]+page[:\s]+(\d+)",
        r"(?i)([^,]+?)[,\s]+page[:\s]+(\d+)",
        r"(?i)([^(]+?)\s*\([^)]*page[:\s]*(\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

fn matches_any(patterns: &[String], haystack: &str) -> bool {
    patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .any(|re| re.is_match(haystack))
}

fn document_mentioned(document_name: &str, answer: &str) -> bool {
    if document_name.is_empty() {
        return false;
    }
    let name = document_name.to_lowercase();
    let stem = name.trim_end_matches(".pdf");
    if answer.contains(&name) || answer.contains(stem) {
        return true;
    }
    // 長檔名只比對前三個關鍵字
    stem.split_whitespace()
        .filter(|w| w.len() > 3)
        .take(3)
        .any(|w| answer.contains(w))
}

fn page_mentioned(page: u32, answer: &str) -> bool {
    if page == 0 {
        return false;
    }
    let patterns = [
        format!(r"page\s+{}\b", page),
        format!(r"p\.\s*{}\b", page),
        format!(r"pg\.?\s*{}\b", page),
        format!(r"p\s+{}\b", page),
    ];
    matches_any(&patterns, answer)
}

fn section_mentioned(section: Option<&str>, answer: &str) -> bool {
    let Some(section) = section.filter(|s| !s.is_empty()) else {
        return false;
    };
    let escaped = regex::escape(&section.to_lowercase());
    let patterns = [
        format!(r"section\s+{}\b", escaped),
        format!(r"sec\.?\s+{}\b", escaped),
    ];
    matches_any(&patterns, answer)
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .trim_end_matches(".pdf")
        .replace(['_', '-'], " ")
}

fn referenced(references: &BTreeSet<(String, u32)>, document_name: &str, page: u32) -> bool {
    let name = normalize_name(document_name);
    !name.is_empty()
        && references
            .iter()
            .any(|(doc, p)| *p == page && normalize_name(doc).contains(&name))
}

/// 只留下答案中實際引用到的來源；都沒有時取相似度前三名。
/// 答案帶有明確的 (文件, 頁碼) 時，頁碼必須與該文件一起出現才算
pub fn extract_cited_sources(answer: &str, sources: &[ScoredChunk]) -> Vec<ScoredChunk> {
    if answer.is_empty() || sources.is_empty() {
        return Vec::new();
    }

    let references = extract_source_references(answer);
    let answer = answer.to_lowercase();
    let mut seen: HashSet<(&str, u32)> = HashSet::new();
    let mut cited = Vec::new();

    for source in sources {
        let chunk = &source.chunk;
        let page_cited = if references.is_empty() {
            page_mentioned(chunk.page_number, &answer)
        } else {
            referenced(&references, &chunk.document_name, chunk.page_number)
        };
        let mentioned = document_mentioned(&chunk.document_name, &answer)
            || page_cited
            || section_mentioned(chunk.section_number.as_deref(), &answer)
            || source.similarity >= CITED_SIMILARITY;

        if mentioned && seen.insert((chunk.document_name.as_str(), chunk.page_number)) {
            cited.push(source.clone());
        }
    }

    if cited.is_empty() {
        let mut ranked = sources.to_vec();
        ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        ranked.truncate(FALLBACK_SOURCES);
        return ranked;
    }

    cited
}

/// 找出答案中 "X, Page N" / "X (Page N)" 之類的 (文件, 頁碼)
pub fn extract_source_references(answer: &str) -> BTreeSet<(String, u32)> {
    let mut references = BTreeSet::new();
    for re in REFERENCE_PATTERNS.iter() {
        for caps in re.captures_iter(answer) {
            let document = caps[1].trim();
            if let Ok(page) = caps[2].trim().parse::<u32>() {
                if !document.is_empty() {
                    references.insert((document.to_lowercase(), page));
                }
            }
        }
    }
    references
}
