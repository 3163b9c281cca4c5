use clap::Parser;
use safety_copilot::adapters::SystemCommandRunner;
use safety_copilot::core::bootstrap::{Bootstrap, BootstrapPlan};
use safety_copilot::utils::{logger, validation::Validate};
use safety_copilot::CliConfig;

/// 部署啟動：建立目錄、安裝依賴，data 目錄有文件時建立向量庫
#[derive(Debug, Parser)]
#[command(name = "safety-copilot", version, about)]
struct Args {
    #[command(flatten)]
    cli: CliConfig,

    /// Do not run the package installer
    #[arg(long)]
    skip_install: bool,

    /// Print the plan without touching anything
    #[arg(long)]
    dry_run: bool,

    /// Exit non-zero when any step failed
    #[arg(long)]
    strict: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match args.cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            logger::init(args.cli.verbose, args.cli.json_logs, None);
            tracing::error!("❌ Failed to load configuration: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code().max(1));
        }
    };

    // 初始化日誌
    logger::init(args.cli.verbose, args.cli.json_logs, Some(&config.logging.level));
    tracing::info!("Starting safety-copilot bootstrap in {}", config.root().display());

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let plan = BootstrapPlan::from_config(&config);
    if args.dry_run {
        println!("📝 Bootstrap plan (dry run):");
        for line in plan.describe() {
            println!("  {}", line);
        }
        return Ok(());
    }

    let bootstrap =
        Bootstrap::new(SystemCommandRunner::new(), plan).with_skip_install(args.skip_install);
    let report = bootstrap.run();

    for step in &report.steps {
        println!("{}", step);
        for line in step.output.lines().filter(|l| !l.trim().is_empty()) {
            println!("    {}", line);
        }
    }
    if !report.created_directories.is_empty() {
        println!("📁 Created {} directories", report.created_directories.len());
    }

    let strict = args.strict || config.bootstrap.strict;
    if report.has_failures() {
        tracing::warn!("⚠️  Bootstrap finished with failed steps");
        if strict {
            std::process::exit(1);
        }
    } else {
        tracing::info!("✅ Bootstrap completed");
    }

    Ok(())
}
