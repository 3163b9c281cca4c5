use clap::Parser;
use safety_copilot::adapters::remote::RemoteStoreFetcher;
use safety_copilot::core::ConfigProvider;
use safety_copilot::utils::error::CopilotError;
use safety_copilot::utils::{logger, validation::Validate};
use safety_copilot::{CliConfig, DocumentPipeline, IngestEngine, LocalStorage, VectorStore};

/// 從 data 目錄的文件建立向量庫；沒有文件但設定了 remote 時改為下載
#[derive(Debug, Parser)]
#[command(name = "safety-copilot-init", version)]
struct Args {
    #[command(flatten)]
    cli: CliConfig,

    /// Log CPU and memory usage per ingest phase
    #[arg(short, long)]
    monitor: bool,
}

fn fail(e: &CopilotError) -> ! {
    tracing::error!(
        "❌ Initialization failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    // 初始化失敗一律非零退出
    std::process::exit(e.severity().exit_code().max(1));
}

async fn print_store_stats(storage: &LocalStorage, location: &str) {
    match VectorStore::load(storage, location).await {
        Ok(store) => {
            let stats = store.stats();
            println!("📊 Vector store statistics:");
            println!("  - Documents: {}", stats.num_documents);
            println!("  - Chunks: {}", stats.num_chunks);
            println!("  - Embedding model: {}", stats.embedding_model);
        }
        Err(e) => tracing::warn!("⚠️  Could not read back the vector store: {}", e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match args.cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            logger::init(args.cli.verbose, args.cli.json_logs, None);
            fail(&e);
        }
    };
    logger::init(args.cli.verbose, args.cli.json_logs, Some(&config.logging.level));

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let location = config.vector_store_dir().display().to_string();
    let storage = LocalStorage::new(config.vector_store_dir());
    let pipeline = match DocumentPipeline::from_config(storage.clone(), config.clone()) {
        Ok(pipeline) => pipeline,
        Err(e) => fail(&e),
    };

    let sources = pipeline.sources().unwrap_or_else(|e| fail(&e));
    if sources.is_empty() {
        println!("📭 No documents found in {}", config.data_dir().display());

        let Some(remote) = &config.remote else {
            tracing::warn!("⚠️  Nothing to index and no remote store configured");
            println!("💡 Add PDF or text files under data/ and run safety-copilot-init again");
            return Ok(());
        };

        println!("☁️  Downloading the prebuilt vector store instead...");
        let fetcher = RemoteStoreFetcher::from_config(remote, storage.clone());
        match fetcher.fetch(remote).await {
            Ok(files) => println!("✅ Downloaded {} into {}", files.join(", "), location),
            Err(e) => fail(&e),
        }
        print_store_stats(&storage, &location).await;
        return Ok(());
    }

    println!("📚 Documents to index:");
    for path in &sources {
        println!("  - {}", path.display());
    }

    let engine = IngestEngine::new_with_monitoring(pipeline, args.monitor);
    match engine.run().await {
        Ok(summary) if summary.is_empty() => {
            println!("⚠️  No text could be extracted; the vector store was not written");
        }
        Ok(summary) => {
            println!("✅ Vector store initialized successfully!");
            println!(
                "📁 {} documents, {} pages, {} chunks saved to {}",
                summary.documents.len(),
                summary.pages,
                summary.chunks,
                summary.location
            );
            print_store_stats(&storage, &location).await;
        }
        Err(e) => fail(&e),
    }

    Ok(())
}
