use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::hooks::action::ActionConfig;
use crate::hooks::HookEvent;

/// File names looked up in the working directory, in order.
const LOCAL_CONFIG_FILES: [&str; 3] = [".octap.yml", ".octap.yaml", ".octap.toml"];
/// File names looked up in `~/.config/octap`, in order.
const USER_CONFIG_FILES: [&str; 3] = ["config.yml", "config.yaml", "config.toml"];

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
}

#[derive(Deserialize, Serialize, Clone, Default)]
pub struct GitHubConfig {
    /// Personal access token; `GITHUB_TOKEN` / `GH_TOKEN` are used when unset.
    #[serde(default)]
    pub token: Option<String>,
    /// GitHub Enterprise API root, e.g. `https://github.example.com/api/v3`.
    #[serde(default)]
    pub api_url: Option<String>,
}

// Manual Debug impl to avoid leaking the token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Raw action records per event, validated later by `hooks::build_hook_table`.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct HooksConfig {
    #[serde(default)]
    pub check_success: Vec<ActionConfig>,
    #[serde(default)]
    pub check_failure: Vec<ActionConfig>,
    #[serde(default)]
    pub complete_success: Vec<ActionConfig>,
    #[serde(default)]
    pub complete_failure: Vec<ActionConfig>,
}

impl HooksConfig {
    pub fn actions(&self, event: HookEvent) -> &[ActionConfig] {
        match event {
            HookEvent::CheckSuccess => &self.check_success,
            HookEvent::CheckFailure => &self.check_failure,
            HookEvent::CompleteSuccess => &self.complete_success,
            HookEvent::CompleteFailure => &self.complete_failure,
        }
    }

    pub fn is_empty(&self) -> bool {
        HookEvent::ALL.iter().all(|e| self.actions(*e).is_empty())
    }
}

impl AppConfig {
    /// Load configuration the way the monitor does.
    ///
    /// A file that is missing or fails to parse is reported and replaced by
    /// the defaults. Returns the file that was used, if any.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let cwd = std::env::current_dir()?;
        let Some(path) = explicit
            .map(Path::to_path_buf)
            .or_else(|| discover(&cwd, default_config_dir().as_deref()))
        else {
            tracing::debug!("No config file found, using defaults");
            return Ok((Self::from_env_or_default(), None));
        };

        match Self::load_file(&path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded config file");
                Ok((config, Some(path)))
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load config file, using defaults");
                Ok((Self::from_env_or_default(), None))
            }
        }
    }

    /// Load the first config file found directly in `dir`.
    #[cfg(test)]
    fn load_from_directory(dir: &Path) -> Result<(Self, Option<PathBuf>)> {
        match find_in_directory(dir, &LOCAL_CONFIG_FILES) {
            Some(path) => Ok((Self::load_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Strict load of one file plus `OCTAP__*` environment overrides.
    pub fn load_file(path: &Path) -> Result<Self> {
        Self::build(Some(path))
    }

    fn from_env_or_default() -> Self {
        Self::build(None).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring invalid OCTAP__ environment overrides");
            Self::default()
        })
    }

    fn build(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        // Environment variable overrides with OCTAP__ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("OCTAP")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }
}

/// `~/.config/octap`
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("octap"))
}

pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|dir| dir.join("config.yml"))
}

/// First config file in `cwd`, then in the user config directory.
pub fn discover(cwd: &Path, user_dir: Option<&Path>) -> Option<PathBuf> {
    find_in_directory(cwd, &LOCAL_CONFIG_FILES)
        .or_else(|| user_dir.and_then(|dir| find_in_directory(dir, &USER_CONFIG_FILES)))
}

fn find_in_directory(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names.iter().map(|name| dir.join(name)).find(|path| path.is_file())
}

/// Write the starter configuration to `path`.
pub fn save_template(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(AppError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, generate_template())?;
    tracing::info!(path = %path.display(), "Wrote config template");
    Ok(())
}

/// Starter configuration with this platform's system sounds.
pub fn generate_template() -> String {
    let (success, failure) = if cfg!(target_os = "macos") {
        ("/System/Library/Sounds/Glass.aiff", "/System/Library/Sounds/Basso.aiff")
    } else if cfg!(target_os = "windows") {
        ("C:\\Windows\\Media\\tada.wav", "C:\\Windows\\Media\\Windows Critical Stop.wav")
    } else {
        (
            "/usr/share/sounds/freedesktop/stereo/complete.oga",
            "/usr/share/sounds/freedesktop/stereo/dialog-error.oga",
        )
    };

    format!(
        r#"# octap configuration
#
# Each hook lists actions run when the event fires:
#   check_success / check_failure       one workflow run finished
#   complete_success / complete_failure every run for the commit finished
#
# Action types: sound, command, slack, notify.
# Templates may use {{{{.Repository}}}}, {{{{.Workflow}}}}, {{{{.RunID}}}},
# {{{{.EventType}}}}, {{{{.RunURL}}}} and {{{{.Timestamp}}}}.

# github:
#   token: ghp_xxx   # defaults to GITHUB_TOKEN or GH_TOKEN

hooks:
  check_success:
    - type: sound
      path: "{success}"

  check_failure:
    - type: sound
      path: "{failure}"
    # - type: notify
    #   title: "{{{{.Repository}}}}"
    #   message: "{{{{.Workflow}}}} failed"

  complete_success:
    - type: sound
      path: "{success}"
    # - type: command
    #   command: ~/bin/on-ci-done.sh
    #   args: ["$OCTAP_REPOSITORY"]
    #   timeout: 30s
    #   env: ["DEPLOY_ENV=staging"]

  complete_failure:
    - type: sound
      path: "{failure}"
    # - type: slack
    #   webhook_url: ${{SLACK_WEBHOOK_URL}}
    #   message: "CI failed for {{{{.Repository}}}}"
    #   color: danger
"#,
        success = yaml_escape(success),
        failure = yaml_escape(failure),
    )
}

fn yaml_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::build_hook_table;

    #[test]
    fn test_template_contains_all_hooks() {
        let template = generate_template();
        for key in ["hooks:", "check_success:", "check_failure:", "complete_success:", "complete_failure:"] {
            assert!(template.contains(key), "missing {key}");
        }
        assert!(template.contains("- type: sound"));
        assert!(template.contains("{{.Repository}}"));
    }

    #[test]
    fn test_template_is_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        save_template(&path, false).unwrap();

        let config = AppConfig::load_file(&path).unwrap();
        let (table, invalid) = build_hook_table(&config.hooks);

        assert!(invalid.is_empty(), "{invalid:?}");
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_save_template_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yml");

        save_template(&path, false).unwrap();
        assert!(save_template(&path, false).is_err());
        assert!(save_template(&path, true).is_ok());
    }

    #[test]
    fn test_environment_overrides_file_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "github:\n  token: ghp_from_file\n").unwrap();

        std::env::set_var("OCTAP__GITHUB__TOKEN", "ghp_from_env");
        let loaded = AppConfig::load_file(&path);
        std::env::remove_var("OCTAP__GITHUB__TOKEN");

        assert_eq!(loaded.unwrap().github.token.as_deref(), Some("ghp_from_env"));
    }

    #[test]
    fn test_load_from_directory_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let (config, path) = AppConfig::load_from_directory(dir.path()).unwrap();
        assert!(path.is_none());
        assert!(config.hooks.is_empty());
    }

    #[test]
    fn test_load_from_directory_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".octap.yml");
        std::fs::write(
            &path,
            r#"hooks:
  check_success:
    - type: sound
      path: /test/success.wav
  check_failure:
    - type: command
      command: echo
      args: ["failed", "$OCTAP_WORKFLOW"]
      timeout: 100ms
      env: ["MODE=ci"]
"#,
        )
        .unwrap();

        let (config, loaded) = AppConfig::load_from_directory(dir.path()).unwrap();

        assert_eq!(loaded.as_deref(), Some(path.as_path()));
        assert_eq!(config.hooks.check_success.len(), 1);
        assert_eq!(config.hooks.check_success[0].kind, "sound");
        assert_eq!(config.hooks.check_failure[0].kind, "command");

        let (table, invalid) = build_hook_table(&config.hooks);
        assert!(invalid.is_empty());
        assert_eq!(table[&HookEvent::CheckFailure][0].kind(), "command");
    }

    #[test]
    fn test_load_from_directory_prefers_yml_over_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".octap.toml"),
            "[[hooks.complete_success]]\ntype = \"sound\"\npath = \"/toml.wav\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(".octap.yml"),
            "hooks:\n  complete_failure:\n    - type: sound\n      path: /yml.wav\n",
        )
        .unwrap();

        let (config, loaded) = AppConfig::load_from_directory(dir.path()).unwrap();

        assert!(loaded.unwrap().ends_with(".octap.yml"));
        assert!(config.hooks.complete_success.is_empty());
        assert_eq!(config.hooks.complete_failure.len(), 1);
    }

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".octap.toml"),
            "[[hooks.complete_success]]\ntype = \"notify\"\nmessage = \"done\"\n",
        )
        .unwrap();

        let (config, _) = AppConfig::load_from_directory(dir.path()).unwrap();
        assert_eq!(config.hooks.complete_success[0].kind, "notify");
    }

    #[test]
    fn test_invalid_yaml_is_an_error_for_strict_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".octap.yml");
        std::fs::write(&path, "hooks: [unclosed").unwrap();

        assert!(AppConfig::load_file(&path).is_err());
    }

    #[test]
    fn test_discover_order() {
        let cwd = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        std::fs::write(user.path().join("config.yaml"), "hooks: {}\n").unwrap();

        assert_eq!(
            discover(cwd.path(), Some(user.path())),
            Some(user.path().join("config.yaml"))
        );

        std::fs::write(cwd.path().join(".octap.yaml"), "hooks: {}\n").unwrap();
        assert_eq!(
            discover(cwd.path(), Some(user.path())),
            Some(cwd.path().join(".octap.yaml"))
        );
        assert_eq!(discover(tempfile::tempdir().unwrap().path(), None), None);
    }

    #[test]
    fn test_explicit_missing_file_falls_back_to_defaults() {
        let (config, path) = AppConfig::load(Some(Path::new("/nonexistent/octap.yml"))).unwrap();
        assert!(path.is_none());
        assert!(config.hooks.is_empty());
    }

    #[test]
    fn test_token_is_redacted() {
        let config = GitHubConfig {
            token: Some("ghp_secret".into()),
            api_url: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
