use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::hooks::action::Action;
use crate::hooks::actions::{expand_path, ActionExecutor};
use crate::hooks::WorkflowEvent;

/// Plays an audio file with the platform's command-line player.
pub struct SoundExecutor;

impl SoundExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SoundExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionExecutor for SoundExecutor {
    fn kind(&self) -> &'static str {
        "sound"
    }

    async fn execute(&self, action: &Action, _event: &WorkflowEvent) -> Result<()> {
        let Action::Sound(sound) = action else {
            return Err(AppError::Internal(format!(
                "sound executor cannot run a {} action",
                action.kind()
            )));
        };

        play(&expand_path(&sound.path)).await
    }
}

/// Play `path` to completion. No timeout is applied.
pub async fn play(path: &str) -> Result<()> {
    if cfg!(target_os = "macos") {
        run_player("afplay", &[path]).await
    } else if cfg!(target_os = "windows") {
        let script = format!(
            "(New-Object Media.SoundPlayer '{}').PlaySync()",
            path.replace('\'', "''")
        );
        run_player("powershell", &["-NoProfile", "-Command", &script]).await
    } else if cfg!(target_os = "linux") {
        // PulseAudio first, then plain ALSA.
        match run_player("paplay", &[path]).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!(path, error = %e, "paplay failed, trying aplay");
                run_player("aplay", &[path]).await
            }
        }
    } else {
        tracing::warn!(os = std::env::consts::OS, "Sound playback not supported on this OS");
        Ok(())
    }
}

async fn run_player(program: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| AppError::Action(format!("failed to start {program}: {e}")))?;

    if output.status.success() {
        tracing::debug!(program, "Sound played");
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(AppError::Action(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::action::CommandAction;
    use crate::hooks::HookEvent;

    fn event() -> WorkflowEvent {
        WorkflowEvent::new(HookEvent::CheckSuccess, "octo/repo", "CI", 1, "")
    }

    #[tokio::test]
    async fn test_rejects_other_action_kinds() {
        let action = Action::Command(CommandAction {
            command: "echo".into(),
            args: vec![],
            timeout: std::time::Duration::from_secs(1),
            env: vec![],
        });
        assert!(SoundExecutor::new().execute(&action, &event()).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_player_is_an_error() {
        let err = run_player("/nonexistent/octap-player", &["x.wav"]).await.unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
