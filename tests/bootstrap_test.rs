use safety_copilot::config::constants::DATA_SUBDIRECTORIES;
use safety_copilot::core::bootstrap::{Bootstrap, BootstrapPlan, StepStatus};
use safety_copilot::domain::model::CommandOutput;
use safety_copilot::domain::ports::CommandRunner;
use safety_copilot::utils::error::Result;
use safety_copilot::CopilotConfig;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct FakeRunner {
    calls: Arc<Mutex<Vec<String>>>,
    installer_exit: i32,
}

impl FakeRunner {
    fn failing_installer() -> Self {
        Self {
            installer_exit: 1,
            ..Default::default()
        }
    }

    fn calls_to(&self, program: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == program)
            .count()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, program: &str, _args: &[String], _cwd: &Path) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(program.to_string());
        let status = if program == "pip" { self.installer_exit } else { 0 };
        Ok(CommandOutput {
            status_code: Some(status),
            ..Default::default()
        })
    }
}

fn plan_for(root: &Path) -> BootstrapPlan {
    let config = CopilotConfig::load(None, Some(root)).unwrap();
    BootstrapPlan::from_config(&config)
}

#[test]
fn test_all_nine_directories_exist_after_every_run() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join("data/nhtsa_guidelines")).unwrap();

    let runner = FakeRunner::default();
    let bootstrap = Bootstrap::new(runner.clone(), plan_for(temp_dir.path()));

    let first = bootstrap.run();
    assert_eq!(first.created_directories.len(), 8);

    let second = bootstrap.run();
    assert!(second.created_directories.is_empty());
    assert!(!second.has_failures());

    for dir in DATA_SUBDIRECTORIES {
        assert!(temp_dir.path().join("data").join(dir).is_dir(), "{} missing", dir);
    }
    for dir in ["vector_store", "logs"] {
        assert!(temp_dir.path().join(dir).is_dir(), "{} missing", dir);
    }
}

#[test]
fn test_missing_sentinel_skips_initializer() {
    let temp_dir = TempDir::new().unwrap();
    let runner = FakeRunner::default();

    let report = Bootstrap::new(runner.clone(), plan_for(temp_dir.path())).run();

    assert!(!report.initializer_invoked);
    assert_eq!(runner.calls_to("safety-copilot-init"), 0);
    assert_eq!(runner.calls_to("pip"), 1);
    assert!(matches!(report.steps[2].status, StepStatus::Skipped(_)));
}

#[test]
fn test_empty_sentinel_runs_installer_only() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join("documents")).unwrap();
    let runner = FakeRunner::default();

    let report = Bootstrap::new(runner.clone(), plan_for(temp_dir.path())).run();

    assert_eq!(*runner.calls.lock().unwrap(), vec!["pip".to_string()]);
    assert!(!report.initializer_invoked);
    assert_eq!(report.steps[1].status, StepStatus::Done);
    assert!(matches!(report.steps[2].status, StepStatus::Skipped(_)));
    assert!(!report.has_failures());
}

#[test]
fn test_custom_paths_from_config_file_are_scaffolded() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("copilot.toml");
    std::fs::write(
        &config_path,
        "[paths]\ndata_dir = \"corpus\"\nvector_store_dir = \"store\"\n",
    )
    .unwrap();
    let config = CopilotConfig::load(Some(&config_path), Some(temp_dir.path())).unwrap();

    let report = Bootstrap::new(FakeRunner::default(), BootstrapPlan::from_config(&config)).run();

    assert_eq!(report.created_directories.len(), 9);
    assert!(temp_dir.path().join("corpus/passive_safety/regulations").is_dir());
    assert!(temp_dir.path().join("store").is_dir());
    assert!(!temp_dir.path().join("vector_store").exists());
    assert!(!temp_dir.path().join("data").exists());
}

#[test]
fn test_populated_sentinel_runs_initializer_once_even_if_install_fails() {
    let temp_dir = TempDir::new().unwrap();
    let documents = temp_dir.path().join("documents");
    std::fs::create_dir_all(&documents).unwrap();
    std::fs::write(documents.join("UNECE_R155.txt"), "CSMS requirements").unwrap();

    let runner = FakeRunner::failing_installer();
    let report = Bootstrap::new(runner.clone(), plan_for(temp_dir.path())).run();

    assert!(report.initializer_invoked);
    assert_eq!(runner.calls_to("safety-copilot-init"), 1);
    assert!(matches!(report.steps[1].status, StepStatus::Failed(_)));
    assert_eq!(report.steps[2].status, StepStatus::Done);
    assert!(report.has_failures());
}

#[test]
fn test_skip_install_records_skipped_step() {
    let temp_dir = TempDir::new().unwrap();
    let runner = FakeRunner::default();

    let report = Bootstrap::new(runner.clone(), plan_for(temp_dir.path()))
        .with_skip_install(true)
        .run();

    assert_eq!(runner.calls_to("pip"), 0);
    assert_eq!(report.steps[1].name, "install");
    assert!(matches!(report.steps[1].status, StepStatus::Skipped(_)));
}
