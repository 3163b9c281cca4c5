use crate::domain::model::CommandOutput;
use crate::domain::ports::CommandRunner;
use crate::utils::error::{CopilotError, Result};
use std::path::Path;
use std::process::Command;

/// 以 std::process 執行外部程式；非零退出碼不視為錯誤，交由呼叫端判斷
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

fn display_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput> {
        tracing::debug!("Running `{}` in {}", display_command(program, args), cwd.display());

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|e| CopilotError::CommandError {
                command: display_command(program, args),
                details: e.to_string(),
            })?;

        Ok(CommandOutput {
            status_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_command_error() {
        let runner = SystemCommandRunner::new();
        let err = runner
            .run(
                "safety-copilot-definitely-missing-binary",
                &[],
                Path::new("."),
            )
            .unwrap_err();

        match err {
            CopilotError::CommandError { command, .. } => {
                assert_eq!(command, "safety-copilot-definitely-missing-binary")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_reported_not_raised() {
        let runner = SystemCommandRunner::new();
        let output = runner
            .run("sh", &["-c".to_string(), "exit 3".to_string()], Path::new("."))
            .unwrap();

        assert_eq!(output.status_code, Some(3));
        assert!(!output.success());
    }
}
