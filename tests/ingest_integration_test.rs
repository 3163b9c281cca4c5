use safety_copilot::core::copilot::ConfidenceLevel;
use safety_copilot::core::pipeline::{BUNDLE_FILE, MANIFEST_FILE};
use safety_copilot::processing::extractor::PlainTextExtractor;
use safety_copilot::retrieval::vector_store::{CHUNKS_FILE, CONFIG_FILE, INDEX_FILE};
use safety_copilot::retrieval::HashingEmbedder;
use safety_copilot::{
    Copilot, CopilotConfig, CopilotError, DocumentPipeline, IngestEngine, LocalStorage,
    VectorStore,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const R155_TEXT: &str = "Section 7.2 The manufacturer shall demonstrate a Cyber Security \
Management System covering the development, production and post-production phases.\x0c\
Section 7.3 The vehicle manufacturer shall identify and manage supplier related risks \
and shall perform a risk assessment for the vehicle type.";

const R94_TEXT: &str = "The head injury criterion HIC36 shall not exceed 1000 for the \
frontal offset deformable barrier test at 56 km/h.";

fn write_document(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn local_config(root: &Path) -> CopilotConfig {
    let mut config = CopilotConfig::load(None, Some(root)).unwrap();
    config.llm.provider = "local".to_string();
    config.rag.write_bundle = true;
    config
}

fn pipeline_for(config: &CopilotConfig) -> DocumentPipeline<LocalStorage, CopilotConfig> {
    DocumentPipeline::new(
        LocalStorage::new(&config.paths.vector_store_dir),
        config.clone(),
        Box::new(PlainTextExtractor),
        Box::new(HashingEmbedder::new(config.rag.embedding_dim)),
    )
}

#[tokio::test]
async fn test_ingest_writes_store_manifest_and_bundle() {
    let temp_dir = TempDir::new().unwrap();
    write_document(temp_dir.path(), "data/unece_regulations/UNECE_R155.txt", R155_TEXT);
    write_document(temp_dir.path(), "data/passive_safety/regulations/UNECE_R94.md", R94_TEXT);
    let config = local_config(temp_dir.path());

    let engine = IngestEngine::new(pipeline_for(&config));
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.documents, vec!["UNECE_R94", "UNECE_R155"]);
    assert_eq!(summary.pages, 3);
    assert!(summary.chunks >= 3);

    let store_dir = &config.paths.vector_store_dir;
    for file in [CHUNKS_FILE, CONFIG_FILE, INDEX_FILE, MANIFEST_FILE, BUNDLE_FILE] {
        assert!(store_dir.join(file).exists(), "{} not written", file);
    }

    let manifest = fs::read_to_string(store_dir.join(MANIFEST_FILE)).unwrap();
    assert!(manifest.starts_with("chunk_id,document_name,page_number"));
    assert!(manifest.contains("UNECE_R155_p2_c0"));

    let bundle = fs::read(store_dir.join(BUNDLE_FILE)).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bundle)).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec![CHUNKS_FILE, CONFIG_FILE, INDEX_FILE]);

    let store = VectorStore::load(&LocalStorage::new(store_dir), "vector_store")
        .await
        .unwrap();
    let r155 = store
        .chunks()
        .iter()
        .find(|c| c.document_name == "UNECE_R155")
        .unwrap();
    assert_eq!(r155.metadata.origin.as_deref(), Some("UNECE"));
    assert_eq!(r155.metadata.domain.as_deref(), Some("Cybersecurity"));
    assert_eq!(store.manifest().num_documents, 2);
}

#[tokio::test]
async fn test_empty_data_dir_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let config = local_config(temp_dir.path());

    let summary = IngestEngine::new(pipeline_for(&config)).run().await.unwrap();

    assert!(summary.is_empty());
    assert!(!config.paths.vector_store_dir.join(CHUNKS_FILE).exists());
}

#[tokio::test]
async fn test_copilot_answers_from_ingested_documents() {
    let temp_dir = TempDir::new().unwrap();
    write_document(temp_dir.path(), "data/unece_regulations/UNECE_R155.txt", R155_TEXT);
    write_document(temp_dir.path(), "data/passive_safety/regulations/UNECE_R94.md", R94_TEXT);
    let config = local_config(temp_dir.path());
    IngestEngine::new(pipeline_for(&config)).run().await.unwrap();

    let storage = LocalStorage::new(&config.paths.vector_store_dir);
    let copilot = Copilot::load(&storage, &config).await.unwrap();
    assert!(!copilot.has_llm());

    let answer = copilot
        .answer("Which HIC36 value shall not exceed 1000 in the frontal offset test?", &[])
        .await;

    assert!(!answer.refused);
    assert_eq!(answer.primary_domain, "Passive Safety");
    assert!(answer.answer.contains("HIC36"));
    assert!(matches!(
        answer.confidence,
        ConfidenceLevel::High | ConfidenceLevel::Medium
    ));

    let citation = &answer.citations[0];
    assert_eq!(citation.document_name, "UNECE_R94");
    let link = citation.link.as_deref().unwrap();
    assert!(link.contains("passive_safety/regulations/UNECE_R94.md - Page 1"));
    assert!(link.contains("#page=1"));
}

#[tokio::test]
async fn test_copilot_load_without_store_is_not_initialized() {
    let temp_dir = TempDir::new().unwrap();
    let config = local_config(temp_dir.path());

    let result = Copilot::load(&LocalStorage::new(&config.paths.vector_store_dir), &config).await;

    assert!(matches!(result, Err(CopilotError::NotInitialized { .. })));
}
