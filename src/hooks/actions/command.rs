use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::hooks::action::{Action, CommandAction};
use crate::hooks::actions::{expand_env, expand_path, ActionExecutor};
use crate::hooks::WorkflowEvent;

/// Runs a user command with the event exported as `OCTAP_*` variables.
pub struct CommandExecutor;

impl CommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionExecutor for CommandExecutor {
    fn kind(&self) -> &'static str {
        "command"
    }

    async fn execute(&self, action: &Action, event: &WorkflowEvent) -> Result<()> {
        let Action::Command(cmd) = action else {
            return Err(AppError::Internal(format!(
                "command executor cannot run a {} action",
                action.kind()
            )));
        };

        run(cmd, event).await
    }
}

/// Variables describing the event, exported to every command.
pub fn event_env(event: &WorkflowEvent) -> Vec<(&'static str, String)> {
    vec![
        ("OCTAP_EVENT_TYPE", event.kind.as_str().to_string()),
        ("OCTAP_REPOSITORY", event.repository.clone()),
        ("OCTAP_WORKFLOW", event.workflow.clone()),
        ("OCTAP_RUN_ID", event.run_id.to_string()),
        ("OCTAP_RUN_URL", event.url.clone()),
    ]
}

fn build_command(cmd: &CommandAction, event: &WorkflowEvent) -> (String, Command) {
    let program = expand_path(&cmd.command);
    let args: Vec<String> = cmd.args.iter().map(|a| expand_env(a)).collect();

    let mut command = if cfg!(windows) && program.to_lowercase().ends_with(".ps1") {
        let mut ps = Command::new("powershell");
        ps.args(["-ExecutionPolicy", "Bypass", "-File", program.as_str()]);
        ps
    } else {
        Command::new(&program)
    };

    // The child inherits the host environment; event vars and then user vars
    // are layered on top, so users can override the injected ones.
    command
        .args(&args)
        .envs(event_env(event))
        .envs(cmd.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    (program, command)
}

async fn run(cmd: &CommandAction, event: &WorkflowEvent) -> Result<()> {
    let (program, mut command) = build_command(cmd, event);

    tracing::debug!(
        command = %program,
        args = ?cmd.args,
        timeout = ?cmd.timeout,
        "Executing command"
    );

    let child = command
        .spawn()
        .map_err(|e| AppError::Action(format!("failed to start `{program}`: {e}")))?;

    // Dropping the in-flight future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(cmd.timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(AppError::ActionTimeout {
                command: program,
                timeout: cmd.timeout,
            })
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.is_empty() {
        tracing::debug!(command = %program, stdout = %stdout.trim_end(), "Command stdout");
    }
    if !stderr.is_empty() {
        tracing::debug!(command = %program, stderr = %stderr.trim_end(), "Command stderr");
    }

    if output.status.success() {
        return Ok(());
    }

    let mut message = format!("`{program}` exited with {}", output.status);
    if !stderr.trim().is_empty() {
        message.push_str(&format!(", stderr: {}", stderr.trim()));
    }
    Err(AppError::Action(message))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::hooks::HookEvent;
    use std::time::{Duration, Instant};

    fn event() -> WorkflowEvent {
        WorkflowEvent::new(
            HookEvent::CheckFailure,
            "owner/repo-name",
            "CI Pipeline",
            987654321,
            "https://github.com/owner/repo-name/actions/runs/987654321",
        )
    }

    fn command(program: &str, args: &[&str]) -> CommandAction {
        CommandAction {
            command: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout: Duration::from_secs(5),
            env: vec![],
        }
    }

    #[tokio::test]
    async fn test_simple_command() {
        assert!(run(&command("echo", &["test"]), &event()).await.is_ok());
    }

    #[tokio::test]
    async fn test_event_variables_are_exported() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("env.txt");
        let script = format!(
            "echo \"$OCTAP_EVENT_TYPE|$OCTAP_REPOSITORY|$OCTAP_WORKFLOW|$OCTAP_RUN_ID|$OCTAP_RUN_URL\" > {}",
            out.display()
        );

        run(&command("sh", &["-c", &script]), &event()).await.unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            content.trim(),
            "check_failure|owner/repo-name|CI Pipeline|987654321|https://github.com/owner/repo-name/actions/runs/987654321"
        );
    }

    #[tokio::test]
    async fn test_custom_env() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("custom.txt");
        let mut cmd = command("sh", &["-c", &format!("echo $CUSTOM_VAR > {}", out.display())]);
        cmd.env = vec![("CUSTOM_VAR".into(), "custom_value".into())];

        run(&cmd, &event()).await.unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap().trim(), "custom_value");
    }

    #[tokio::test]
    async fn test_host_env_expanded_in_args() {
        std::env::set_var("OCTAP_TEST_ARG_VAR", "expanded_value");
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("arg.txt");
        let cmd = command(
            "sh",
            &["-c", &format!("printf %s \"$1\" > {}", out.display()), "sh", "$OCTAP_TEST_ARG_VAR"],
        );

        run(&cmd, &event()).await.unwrap();
        std::env::remove_var("OCTAP_TEST_ARG_VAR");

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "expanded_value");
    }

    #[tokio::test]
    async fn test_timeout_is_classified() {
        let mut cmd = command("sleep", &["10"]);
        cmd.timeout = Duration::from_millis(100);

        let start = Instant::now();
        let err = run(&cmd, &event()).await.unwrap_err();

        assert!(err.is_timeout(), "unexpected error: {err}");
        assert!(start.elapsed() < Duration::from_millis(500), "took {:?}", start.elapsed());
    }

    #[tokio::test]
    async fn test_non_zero_exit_includes_stderr() {
        let err = run(&command("sh", &["-c", "echo boom >&2; exit 3"]), &event())
            .await
            .unwrap_err();

        assert!(!err.is_timeout());
        let message = err.to_string();
        assert!(message.contains("boom"), "{message}");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = run(&command("/non/existent/command", &[]), &event()).await.unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
