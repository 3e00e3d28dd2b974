use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::hooks::action::{Action, NotifyAction};
use crate::hooks::actions::ActionExecutor;
use crate::hooks::WorkflowEvent;

/// Shows a desktop notification through the OS notification service.
pub struct NotifyExecutor;

impl NotifyExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NotifyExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionExecutor for NotifyExecutor {
    fn kind(&self) -> &'static str {
        "notify"
    }

    async fn execute(&self, action: &Action, event: &WorkflowEvent) -> Result<()> {
        let Action::Notify(notify) = action else {
            return Err(AppError::Internal(format!(
                "notify executor cannot run a {} action",
                action.kind()
            )));
        };

        let title = notify.title.render(event);
        let message = notify.message.render(event);

        match platform_command(notify, &title, &message) {
            Some((program, args)) => run_notifier(program, &args).await,
            None => {
                tracing::warn!(os = std::env::consts::OS, "Desktop notifications not supported on this OS");
                Ok(())
            }
        }
    }
}

fn platform_command(notify: &NotifyAction, title: &str, message: &str) -> Option<(&'static str, Vec<String>)> {
    if cfg!(target_os = "macos") {
        Some(("osascript", vec!["-e".into(), apple_script(title, message, notify.sound.unwrap_or(true))]))
    } else if cfg!(target_os = "linux") {
        Some(("notify-send", vec![title.to_string(), message.to_string()]))
    } else if cfg!(target_os = "windows") {
        Some((
            "powershell",
            vec!["-NoProfile".into(), "-Command".into(), powershell_balloon(title, message)],
        ))
    } else {
        None
    }
}

/// `display notification` script; the sound name is only added when enabled.
pub fn apple_script(title: &str, message: &str, sound: bool) -> String {
    let mut script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape_apple_script(message),
        escape_apple_script(title)
    );
    if sound {
        script.push_str(" sound name \"Glass\"");
    }
    script
}

fn escape_apple_script(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

pub fn powershell_balloon(title: &str, message: &str) -> String {
    format!(
        "Add-Type -AssemblyName System.Windows.Forms; \
         $n = New-Object System.Windows.Forms.NotifyIcon; \
         $n.Icon = [System.Drawing.SystemIcons]::Information; \
         $n.BalloonTipTitle = '{}'; \
         $n.BalloonTipText = '{}'; \
         $n.Visible = $true; \
         $n.ShowBalloonTip(5000); \
         Start-Sleep -Seconds 5; \
         $n.Dispose()",
        escape_powershell(title),
        escape_powershell(message)
    )
}

fn escape_powershell(value: &str) -> String {
    value.replace('\'', "''")
}

async fn run_notifier(program: &str, args: &[String]) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| AppError::Action(format!("failed to start {program}: {e}")))?;

    if output.status.success() {
        tracing::debug!(program, "Notification shown");
        Ok(())
    } else {
        Err(AppError::Action(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::action::ActionConfig;
    use crate::hooks::HookEvent;
    use serde_json::json;

    #[test]
    fn test_apple_script_escapes_quotes() {
        let script = apple_script("octap", "Run \"CI\" failed", true);
        assert_eq!(
            script,
            "display notification \"Run \\\"CI\\\" failed\" with title \"octap\" sound name \"Glass\""
        );
    }

    #[test]
    fn test_apple_script_without_sound() {
        let script = apple_script("t", "m", false);
        assert!(!script.contains("sound name"));
    }

    #[test]
    fn test_powershell_escapes_single_quotes() {
        let script = powershell_balloon("octap", "it's done");
        assert!(script.contains("BalloonTipText = 'it''s done'"));
    }

    #[test]
    fn test_platform_command_renders_templates() {
        let action = Action::from_config(&ActionConfig::new(
            "notify",
            json!({ "title": "{{.Repository}}", "message": "{{.Workflow}} finished" }),
        ))
        .unwrap();
        let Action::Notify(notify) = &action else {
            panic!("expected notify action");
        };
        let event = WorkflowEvent::new(HookEvent::CheckSuccess, "octo/repo", "Build", 7, "");

        let title = notify.title.render(&event);
        let message = notify.message.render(&event);
        assert_eq!(title, "octo/repo");
        assert_eq!(message, "Build finished");

        if cfg!(target_os = "linux") {
            let (program, args) = platform_command(notify, &title, &message).unwrap();
            assert_eq!(program, "notify-send");
            assert_eq!(args, vec!["octo/repo".to_string(), "Build finished".to_string()]);
        }
    }
}
