use clap::Parser;
use safety_copilot::core::doctor::run_checks;
use safety_copilot::core::ConfigProvider;
use safety_copilot::utils::logger;
use safety_copilot::{CliConfig, LocalStorage};

/// 檢查部署狀態：目錄、文件、API key、向量庫
#[derive(Debug, Parser)]
#[command(name = "safety-copilot-doctor", version)]
struct Args {
    #[command(flatten)]
    cli: CliConfig,

    /// Exit with status 1 when any check needs attention
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = args.cli.load_config()?;
    logger::init(args.cli.verbose, args.cli.json_logs, Some(&config.logging.level));

    println!("🩺 Safety Copilot setup check ({})", config.root().display());
    let storage = LocalStorage::new(config.vector_store_dir());
    let report = run_checks(&storage, &config).await;

    for check in &report.checks {
        println!("{}", check);
    }
    println!(
        "\n{}/{} checks passed",
        report.passed_count(),
        report.checks.len()
    );

    if !report.all_passed() && args.strict {
        std::process::exit(1);
    }
    Ok(())
}
