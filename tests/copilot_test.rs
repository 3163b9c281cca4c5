use httpmock::prelude::*;
use safety_copilot::domain::model::{ChatTurn, DocumentChunk, DocumentMetadata};
use safety_copilot::retrieval::HashingEmbedder;
use safety_copilot::{Copilot, CopilotConfig, LocalStorage, VectorStore};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn chunk(doc: &str, page: u32, domain: &str, method: &str, text: &str) -> DocumentChunk {
    DocumentChunk {
        text: text.to_string(),
        document_name: doc.to_string(),
        page_number: page,
        section_number: None,
        chunk_id: format!("{}_p{}_c0", doc, page),
        table: None,
        metadata: DocumentMetadata {
            origin: Some("UNECE".to_string()),
            domain: Some(domain.to_string()),
            strictness: Some("Regulatory".to_string()),
            method: Some(method.to_string()),
            ..Default::default()
        },
    }
}

async fn seed_store(config: &CopilotConfig) -> LocalStorage {
    let storage = LocalStorage::new(&config.paths.vector_store_dir);
    let embedder = HashingEmbedder::new(config.rag.embedding_dim);
    let store = VectorStore::build(
        vec![
            chunk(
                "UNECE_R155",
                4,
                "Cybersecurity",
                "UNECE R155",
                "The manufacturer shall operate a Cyber Security Management System covering the full vehicle lifecycle.",
            ),
            chunk(
                "UNECE_R156",
                2,
                "Software Update",
                "UNECE R156",
                "A Software Update Management System shall record the software version of each vehicle type.",
            ),
        ],
        &embedder,
        config.rag.chunk_size,
        config.rag.chunk_overlap,
    );
    store.save(&storage).await.unwrap();
    storage
}

fn anthropic_config(root: &Path, base_url: String) -> CopilotConfig {
    let mut config = CopilotConfig::load(None, Some(root)).unwrap();
    config.llm.provider = "anthropic".to_string();
    config.llm.anthropic_api_key = "sk-ant-test".to_string();
    config.llm.openai_api_key = String::new();
    config.llm.anthropic_base_url = base_url;
    config
}

#[tokio::test]
async fn test_answer_uses_llm_and_cites_mentioned_document() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let config = anthropic_config(temp_dir.path(), server.base_url());
    let storage = seed_store(&config).await;

    let messages = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/messages")
            .header("x-api-key", "sk-ant-test")
            .header("anthropic-version", "2023-06-01")
            .body_contains("cyber security management system");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "content": [{
                    "type": "text",
                    "text": "UNECE_R155 requires the manufacturer to operate a Cyber Security Management System for the whole vehicle lifecycle (Document: UNECE_R155, Page 4)."
                }]
            }));
    });

    let copilot = Copilot::load(&storage, &config).await.unwrap();
    let history = vec![ChatTurn::user("We are preparing an R155 audit.")];
    let answer = copilot
        .answer(
            "What does R155 require for a cyber security management system?",
            &history,
        )
        .await;

    messages.assert_hits(1);
    assert!(answer.used_llm);
    assert_eq!(answer.primary_domain, "Cybersecurity");
    assert!(answer.answer.contains("Cyber Security Management System"));
    assert!(!answer.answer.contains("(Document"));
    assert_eq!(answer.citations.len(), 1);
    assert_eq!(answer.citations[0].document_name, "UNECE_R155");
    assert_eq!(answer.citations[0].page_number, 4);
}

#[tokio::test]
async fn test_rejected_key_falls_back_to_extracted_text() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let config = anthropic_config(temp_dir.path(), server.base_url());
    let storage = seed_store(&config).await;

    let unauthorized = server.mock(|when, then| {
        when.method(POST).path("/v1/messages");
        then.status(401).body("invalid x-api-key");
    });

    let copilot = Copilot::load(&storage, &config).await.unwrap();
    let answer = copilot
        .answer("How is the software version recorded by the update management system?", &[])
        .await;

    // 401 不再嘗試其他模型
    unauthorized.assert_hits(1);
    assert!(!answer.used_llm);
    assert_eq!(answer.primary_domain, "Software Update");
    assert!(answer.answer.contains("software version of each vehicle type"));
}

#[tokio::test]
async fn test_refused_question_never_calls_llm() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let config = anthropic_config(temp_dir.path(), server.base_url());
    let storage = seed_store(&config).await;

    let messages = server.mock(|when, then| {
        when.method(POST).path("/v1/messages");
        then.status(200);
    });

    let copilot = Copilot::load(&storage, &config).await.unwrap();
    let answer = copilot
        .answer("Can you certify our CSMS for type approval?", &[])
        .await;

    messages.assert_hits(0);
    assert!(answer.refused);
    assert!(answer.citations.is_empty());

    let json = serde_json::to_value(&answer).unwrap();
    assert_eq!(json["refused"], true);
    assert_eq!(json["confidence"], "Very Low");
}
