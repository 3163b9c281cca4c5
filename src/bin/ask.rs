use clap::Parser;
use safety_copilot::core::copilot::CopilotAnswer;
use safety_copilot::core::ConfigProvider;
use safety_copilot::utils::{logger, validation::Validate};
use safety_copilot::{CliConfig, Copilot, LocalStorage};

/// 對已建立的向量庫提問
#[derive(Debug, Parser)]
#[command(name = "safety-copilot-ask", version)]
struct Args {
    #[command(flatten)]
    cli: CliConfig,

    /// The question to answer
    question: String,

    /// Print the full answer as JSON
    #[arg(long)]
    json: bool,

    /// Number of chunks to retrieve (overrides rag.top_k)
    #[arg(long)]
    top_k: Option<usize>,
}

fn print_answer(answer: &CopilotAnswer) {
    println!("{}", answer.answer);
    if answer.refused {
        return;
    }

    println!();
    println!(
        "🧭 Domain: {} | Confidence: {} ({:.2})",
        answer.primary_domain, answer.confidence, answer.confidence_score
    );
    if answer.conflicts > 0 {
        println!("⚖️  {} potential conflict(s) between standards", answer.conflicts);
    }
    if !answer.citations.is_empty() {
        println!("📚 Sources:");
        for citation in &answer.citations {
            match &citation.link {
                Some(link) => println!("  - {}", link),
                None => println!(
                    "  - {} - Page {} (similarity {:.2})",
                    citation.document_name, citation.page_number, citation.similarity
                ),
            }
        }
    }
    if !answer.used_llm {
        println!("💡 No LLM configured; showing text extracted from the best match");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = args.cli.load_config()?;
    logger::init(args.cli.verbose, args.cli.json_logs, Some(&config.logging.level));

    if let Some(top_k) = args.top_k {
        config.rag.top_k = top_k;
    }
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let storage = LocalStorage::new(config.vector_store_dir());
    let copilot = match Copilot::load(&storage, &config).await {
        Ok(copilot) => copilot,
        Err(e) => {
            tracing::error!("❌ {} (Severity: {:?})", e, e.severity());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code().max(1));
        }
    };

    let answer = copilot.answer(&args.question, &[]).await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }

    Ok(())
}
