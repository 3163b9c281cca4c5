//! Cross-document answer synthesis.
//!
//! Builds a grounded prompt from the retrieved chunks (plus any tables and
//! standard conflicts found in them), asks the language model, and falls back
//! to an extractive summary of the best chunk when no model answers. Every
//! answer goes through the same cleanup so PDF extraction noise and inline
//! citations never reach the user.

use crate::domain::model::{ChatTurn, DocumentChunk, ScoredChunk};
use crate::domain::ports::LlmClient;
use crate::processing::document_processor::{
    collapse_runs, is_allowed_char, readable_ratio, RunReplacement,
};
use crate::synthesis::tables::{
    Conflict, ExtractedTable, StandardComparator, StandardInfo, TableExtractor,
};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

const HISTORY_WINDOW: usize = 5;
const EXTRACTIVE_SENTENCES: usize = 5;

pub const EXTRACTIVE_PREFIX: &str =
    "I found relevant information in the available documents. Here is what I can tell you:";
pub const EXTRACTIVE_NOTE: &str = "Note: This is extracted directly from the documents. For a more complete answer, please ensure the LLM service is available.";
pub const GARBLED_MESSAGE: &str = "I found some information in the documents, but it appears to be unclear or garbled. Please try rephrasing your question or check if the documents contain clear information about this topic.";

static CITATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\[Document[^\]]+\]",
        r"\(Document[^)]+\)",
        r"Page \d+",
        r"Section \S+",
        r"\([^)]*Origin[^)]*\)",
        r"\([^)]*Method[^)]*\)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([.,;:])").expect("valid regex"));
static UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_{2,}|\s+_\s+|_\d+").expect("valid regex")
});
static MERGED_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("valid regex"));

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisResult {
    pub synthesis: String,
    /// 清理前的回答，保留 (Document, Page) 引用
    #[serde(skip)]
    pub raw_answer: String,
    pub tables: Vec<ExtractedTable>,
    pub comparisons: Vec<StandardInfo>,
    pub conflicts: Vec<Conflict>,
    pub num_sources: usize,
    pub used_llm: bool,
}

pub fn no_results_message(question: &str) -> String {
    format!(
        "I couldn't find relevant information in the available safety documents for your question: '{}'. \
         The documents I have access to don't appear to contain this information. \
         Please try rephrasing your question or check if the specific document you're looking for is available in the library.",
        question
    )
}

fn is_symbol(c: char) -> bool {
    !c.is_alphanumeric() && c != '_' && !c.is_whitespace()
}

fn replace_disallowed(text: &str) -> String {
    text.chars()
        .map(|c| if is_allowed_char(c) { c } else { ' ' })
        .collect()
}

fn single_letter_ratio(sentence: &str) -> f32 {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    if words.is_empty() {
        return 1.0;
    }
    let singles = words
        .iter()
        .filter(|w| w.chars().count() == 1 && w.chars().all(char::is_alphabetic))
        .count();
    singles as f32 / words.len() as f32
}

/// 大寫單字母（ASIL D 之類）與 "a" 保留，其餘單字母視為亂碼
fn keep_word(word: &str) -> bool {
    let mut chars = word.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_alphabetic() {
            return c.is_uppercase() || c == 'a';
        }
    }
    let total = word.chars().count();
    let symbols = word.chars().filter(|c| !c.is_alphanumeric()).count();
    symbols * 2 <= total
}

/// 去除引用標記與亂碼，只留下可讀的句子
pub fn clean_answer(text: &str) -> String {
    let mut cleaned = text.to_string();
    for re in CITATION_PATTERNS.iter() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    cleaned = SPACE_BEFORE_PUNCT.replace_all(&cleaned, "$1").into_owned();

    cleaned = collapse_runs(&cleaned, |c| c.is_ascii_alphabetic(), RunReplacement::Single);
    cleaned = collapse_runs(&cleaned, is_symbol, RunReplacement::Space);
    cleaned = UNDERSCORES.replace_all(&cleaned, " ").into_owned();
    cleaned = MERGED_WORDS.replace_all(&cleaned, "$1 $2").into_owned();

    cleaned = cleaned
        .split_whitespace()
        .filter(|w| keep_word(w))
        .collect::<Vec<_>>()
        .join(" ");
    cleaned = replace_disallowed(&cleaned);
    cleaned = WHITESPACE.replace_all(&cleaned, " ").into_owned();

    let sentences: Vec<&str> = SENTENCE_BREAK
        .split(&cleaned)
        .map(|s| s.trim().trim_end_matches(['.', '!', '?']))
        .filter(|s| s.chars().count() >= 10)
        .filter(|s| single_letter_ratio(s) <= 0.3)
        .filter(|s| readable_ratio(s) >= 0.6)
        .collect();

    let result = if !sentences.is_empty() {
        format!("{}.", sentences.join(". "))
    } else {
        let words: Vec<&str> = cleaned.split_whitespace().collect();
        let phrases: Vec<String> = words
            .windows(3)
            .map(|w| w.join(" "))
            .filter(|p| {
                let alnum = p.chars().filter(|c| c.is_alphanumeric()).count();
                alnum as f32 / p.chars().count() as f32 >= 0.6
            })
            .take(3)
            .collect();
        if phrases.is_empty() {
            GARBLED_MESSAGE.to_string()
        } else {
            format!("{}.", phrases.join(". "))
        }
    };

    WHITESPACE.replace_all(&result, " ").trim().to_string()
}

/// 沒有 LLM 時，從最相關的片段擷取最多五句可讀句子
pub fn extractive_answer(best: &DocumentChunk) -> String {
    let text = replace_disallowed(&best.text);
    let text = MERGED_WORDS.replace_all(&text, "$1 $2");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = collapse_runs(&text, |c| c.is_ascii_alphabetic(), RunReplacement::Single);
    let text = collapse_runs(&text, is_symbol, RunReplacement::Space);
    let text = text.trim();

    let sentences: Vec<&str> = if readable_ratio(text) >= 0.7 {
        SENTENCE_BREAK
            .split(text)
            .map(|s| s.trim().trim_end_matches(['.', '!', '?']))
            .filter(|s| s.chars().count() >= 15)
            .filter(|s| single_letter_ratio(s) <= 0.2)
            .filter(|s| readable_ratio(s) >= 0.6)
            .take(EXTRACTIVE_SENTENCES)
            .collect()
    } else {
        Vec::new()
    };

    let body = if sentences.is_empty() {
        GARBLED_MESSAGE.to_string()
    } else {
        format!("{}.", sentences.join(". "))
    };

    format!("{}\n\n{}\n\n{}", EXTRACTIVE_PREFIX, body, EXTRACTIVE_NOTE)
}

fn source_label(chunk: &DocumentChunk) -> String {
    let mut label = format!("[{}", chunk.document_name);
    if let Some(origin) = &chunk.metadata.origin {
        label.push_str(&format!(", {}", origin));
    }
    if let Some(method) = &chunk.metadata.method {
        label.push_str(&format!(", {}", method));
    }
    label.push_str(&format!(", Page {}", chunk.page_number));
    if let Some(section) = &chunk.section_number {
        label.push_str(&format!(", Section {}", section));
    }
    label.push(']');
    label
}

pub fn build_prompt(
    question: &str,
    retrieved: &[ScoredChunk],
    tables: &[ExtractedTable],
    conflicts: &[Conflict],
    history: &[ChatTurn],
) -> String {
    let context = retrieved
        .iter()
        .map(|s| format!("{}\n{}", source_label(&s.chunk), s.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let mut table_context = String::new();
    if !tables.is_empty() {
        table_context.push_str("\n\n**Technical Tables Found:**\n");
        for (i, table) in tables.iter().enumerate() {
            table_context.push_str(&format!(
                "\nTable {} from {} (Page {}):\n",
                i + 1,
                table.document,
                table.page
            ));
            if !table.table.headers.is_empty() {
                table_context.push_str(&format!("Headers: {}\n", table.table.headers.join(", ")));
            }
            if !table.table.rows.is_empty() {
                table_context.push_str(&format!("Rows: {} data rows\n", table.table.rows.len()));
            }
        }
    }

    let mut conflict_context = String::new();
    if !conflicts.is_empty() {
        conflict_context.push_str("\n\n**Potential Standard Conflicts Detected:**\n");
        for conflict in conflicts {
            conflict_context.push_str(&format!(
                "\n- {}: Multiple sources with different interpretations\n",
                conflict.standard
            ));
        }
    }

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let recent: Vec<String> = history[start..]
        .iter()
        .filter(|turn| turn.role == "user")
        .map(|turn| format!("- {}", turn.content))
        .collect();
    let history_context = if recent.is_empty() {
        String::new()
    } else {
        format!("\n\n**Recent Conversation Context:**\n{}", recent.join("\n"))
    };

    format!(
        r#"You are a safety engineering assistant. Answer by synthesizing the document excerpts below.

**User Question:** {question}
{history_context}

**Relevant Information from Multiple Documents:**
{context}
{table_context}
{conflict_context}

**Rules:**
1. Use only information present in the excerpts. Do not rely on prior knowledge.
2. Combine the sources when more than one is relevant and explain how they relate.
3. Say where the answer comes from in plain words (for example "the test procedure states...").
4. When comparing standards, explain each difference and why it exists.
5. When citing table values, explain what the table measures.
6. If the excerpts do not answer the question, say so explicitly and name what is missing.
7. Never invent numbers, limits or requirements.
8. Skip garbled or unreadable text.
9. Do not mention document names, page numbers or file paths in the answer.
10. Keep the answer short and in simple language.

**Answer:**"#
    )
}

pub async fn synthesize(
    question: &str,
    retrieved: &[ScoredChunk],
    history: &[ChatTurn],
    llm: Option<&dyn LlmClient>,
) -> SynthesisResult {
    if retrieved.is_empty() {
        let message = no_results_message(question);
        return SynthesisResult {
            synthesis: message.clone(),
            raw_answer: message,
            tables: Vec::new(),
            comparisons: Vec::new(),
            conflicts: Vec::new(),
            num_sources: 0,
            used_llm: false,
        };
    }

    // 同一頁的多個 chunk 共用同一張表格
    let mut table_pages = HashSet::new();
    let tables: Vec<ExtractedTable> = retrieved
        .iter()
        .filter_map(|s| TableExtractor::from_chunk(&s.chunk))
        .filter(|t| table_pages.insert((t.document.clone(), t.page)))
        .collect();
    let comparisons = StandardComparator::extract_standard_info(retrieved);
    let conflicts = StandardComparator::detect_conflicts(&comparisons);
    tracing::debug!(
        "Synthesis over {} chunks: {} tables, {} conflicts",
        retrieved.len(),
        tables.len(),
        conflicts.len()
    );

    let mut answer = None;
    if let Some(llm) = llm {
        let prompt = build_prompt(question, retrieved, &tables, &conflicts, history);
        match llm.complete(&prompt).await {
            Ok(text) => answer = Some(text),
            Err(e) => tracing::warn!("⚠️  {}; using extracted text instead", e),
        }
    }

    let used_llm = answer.is_some();
    let raw = answer.unwrap_or_else(|| extractive_answer(&retrieved[0].chunk));

    SynthesisResult {
        synthesis: clean_answer(&raw),
        raw_answer: raw,
        tables,
        comparisons,
        conflicts,
        num_sources: retrieved.len(),
        used_llm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::DocumentMetadata;
    use crate::utils::error::{CopilotError, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedLlm {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn answering(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().ok_or_else(|| CopilotError::LlmError {
                provider: "scripted".to_string(),
                message: "HTTP 500".to_string(),
            })
        }
    }

    fn retrieved(text: &str) -> Vec<ScoredChunk> {
        vec![ScoredChunk {
            chunk: DocumentChunk {
                text: text.to_string(),
                document_name: "UNECE_R94".to_string(),
                page_number: 12,
                section_number: Some("5.2.1".to_string()),
                chunk_id: "UNECE_R94_p12_c0".to_string(),
                table: None,
                metadata: DocumentMetadata {
                    origin: Some("UNECE".to_string()),
                    method: Some("UNECE R94".to_string()),
                    ..Default::default()
                },
            },
            similarity: 0.42,
        }]
    }

    #[test]
    fn test_clean_answer_strips_citations_and_noise() {
        let raw = "The HIC limit is 1000 [Document: UNECE_R94, Page 12]. Euro NCAP uses a stricter target of 700 (Origin: Industry)!!! ____";

        let cleaned = clean_answer(raw);

        assert_eq!(
            cleaned,
            "The HIC limit is 1000. Euro NCAP uses a stricter target of 700."
        );
    }

    #[test]
    fn test_clean_answer_keeps_asil_letters() {
        let cleaned = clean_answer("The item is rated ASIL D after decomposition.");
        assert_eq!(cleaned, "The item is rated ASIL D after decomposition.");
    }

    #[test]
    fn test_clean_answer_reports_garbled_text() {
        assert_eq!(clean_answer("@@ ## x"), GARBLED_MESSAGE);
    }

    #[test]
    fn test_extractive_answer_uses_readable_sentences() {
        let chunk = &retrieved(
            "The head injury criterion shall not exceed 1000. Chest compression shall not exceed 42 mm. ok.",
        )[0]
        .chunk;

        let answer = extractive_answer(chunk);

        assert!(answer.starts_with(EXTRACTIVE_PREFIX));
        assert!(answer.contains(
            "The head injury criterion shall not exceed 1000. Chest compression shall not exceed 42 mm."
        ));
        assert!(answer.ends_with(EXTRACTIVE_NOTE));
    }

    #[test]
    fn test_prompt_contains_sources_and_recent_user_turns() {
        let chunks = retrieved("HIC 1000");
        let history = vec![
            ChatTurn::user("Which dummy is used?"),
            ChatTurn::assistant("Hybrid-III."),
        ];

        let prompt = build_prompt("What is the HIC limit?", &chunks, &[], &[], &history);

        assert!(prompt.contains("**User Question:** What is the HIC limit?"));
        assert!(prompt.contains("[UNECE_R94, UNECE, UNECE R94, Page 12, Section 5.2.1]"));
        assert!(prompt.contains("- Which dummy is used?"));
        assert!(!prompt.contains("Hybrid-III."));
    }

    #[tokio::test]
    async fn test_synthesize_without_sources_refuses() {
        let result = synthesize("What about IIHS 2025?", &[], &[], None).await;

        assert_eq!(result.num_sources, 0);
        assert!(result.synthesis.contains("'What about IIHS 2025?'"));
        assert!(!result.used_llm);
    }

    #[tokio::test]
    async fn test_synthesize_uses_llm_answer() {
        let llm = ScriptedLlm::answering("The maximum HIC value is 1000 according to the regulation.");
        let chunks = retrieved("HIC 1000 for the 50th percentile dummy");

        let result = synthesize("HIC limit?", &chunks, &[], Some(&llm)).await;

        assert!(result.used_llm);
        assert_eq!(result.synthesis, "The maximum HIC value is 1000 according to the regulation.");
        assert_eq!(result.num_sources, 1);
        assert_eq!(result.tables.len(), 0);
        assert_eq!(llm.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_synthesize_falls_back_when_llm_fails() {
        let llm = ScriptedLlm::failing();
        let chunks = retrieved("The head injury criterion shall not exceed 1000 in the full width test.");

        let result = synthesize("HIC limit?", &chunks, &[], Some(&llm)).await;

        assert!(!result.used_llm);
        assert!(result.synthesis.contains("head injury criterion shall not exceed 1000"));
        assert!(result.synthesis.contains("extracted directly from the documents"));
    }

    #[tokio::test]
    async fn test_page_table_is_listed_once_and_raw_answer_kept() {
        use crate::domain::model::{TableData, TableKind};

        let table = TableData {
            kind: TableKind::Markdown,
            headers: vec!["Metric".to_string(), "Limit".to_string()],
            rows: vec![vec!["HIC15".to_string(), "700".to_string()]],
        };
        let mut chunks = retrieved("Injury criteria Metric Limit HIC15 700");
        chunks.push(chunks[0].clone());
        chunks[1].chunk.chunk_id = "UNECE_R94_p12_c1".to_string();
        for scored in &mut chunks {
            scored.chunk.table = Some(table.clone());
        }
        let llm = ScriptedLlm::answering(
            "HIC15 must stay below 700 for this test (Document: UNECE_R94, Page 12).",
        );

        let result = synthesize("HIC limit?", &chunks, &[], Some(&llm)).await;

        assert_eq!(result.tables.len(), 1);
        assert_eq!(result.tables[0].table, table);
        assert!(llm.prompts.lock().unwrap()[0].contains("HIC15"));
        assert!(result.raw_answer.contains("(Document: UNECE_R94, Page 12)"));
        assert!(!result.synthesis.contains("Page 12"));
    }
}
