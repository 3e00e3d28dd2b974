use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::hooks::template::Template;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_NOTIFY_TITLE: &str = "octap";

/// An action entry exactly as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ActionConfig {
    pub fn new(kind: &str, fields: Value) -> Self {
        Self {
            kind: kind.to_string(),
            fields: match fields {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

/// A validated hook action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Sound(SoundAction),
    Command(CommandAction),
    Slack(SlackAction),
    Notify(NotifyAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundAction {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAction {
    pub command: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    /// Extra variables layered on top of the host and `OCTAP_*` environment.
    pub env: Vec<(String, String)>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SlackAction {
    pub webhook_url: String,
    pub message: Template,
    pub color: Option<String>,
    pub icon_emoji: Option<String>,
    pub username: Option<String>,
}

// Manual Debug impl to avoid leaking the webhook URL
impl fmt::Debug for SlackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackAction")
            .field("webhook_url", &"[REDACTED]")
            .field("message", &self.message)
            .field("color", &self.color)
            .field("icon_emoji", &self.icon_emoji)
            .field("username", &self.username)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyAction {
    pub title: Template,
    pub message: Template,
    /// macOS only. `None` means "play the default tone".
    pub sound: Option<bool>,
}

impl Action {
    /// Discriminant used to look up the executor for this action.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Sound(_) => "sound",
            Action::Command(_) => "command",
            Action::Slack(_) => "slack",
            Action::Notify(_) => "notify",
        }
    }

    pub fn from_config(config: &ActionConfig) -> Result<Self> {
        let fields = Fields {
            kind: &config.kind,
            map: &config.fields,
        };

        match config.kind.as_str() {
            "sound" => Ok(Action::Sound(SoundAction {
                path: fields.required_str("path")?,
            })),
            "command" => Ok(Action::Command(CommandAction {
                command: fields.required_str("command")?,
                args: fields.string_list("args")?,
                timeout: fields.duration("timeout")?.unwrap_or(DEFAULT_COMMAND_TIMEOUT),
                env: fields.env("env")?,
            })),
            "slack" => Ok(Action::Slack(SlackAction {
                webhook_url: fields.required_str("webhook_url")?,
                message: fields.template("message")?,
                color: fields.optional_str("color")?,
                icon_emoji: fields.optional_str("icon_emoji")?,
                username: fields.optional_str("username")?,
            })),
            "notify" => Ok(Action::Notify(NotifyAction {
                title: match fields.optional_str("title")? {
                    Some(title) => parse_template(&fields, "title", &title)?,
                    None => parse_template(&fields, "title", DEFAULT_NOTIFY_TITLE)?,
                },
                message: fields.template("message")?,
                sound: fields.optional_bool("sound")?,
            })),
            other => Err(AppError::Config(format!("unknown action type `{other}`"))),
        }
    }
}

struct Fields<'a> {
    kind: &'a str,
    map: &'a Map<String, Value>,
}

impl Fields<'_> {
    fn invalid(&self, key: &str, reason: &str) -> AppError {
        AppError::Config(format!("{} action: `{key}` {reason}", self.kind))
    }

    fn required_str(&self, key: &str) -> Result<String> {
        match self.optional_str(key)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            Some(_) => Err(self.invalid(key, "must not be empty")),
            None => Err(self.invalid(key, "is required")),
        }
    }

    fn optional_str(&self, key: &str) -> Result<Option<String>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.invalid(key, "must be a string")),
        }
    }

    fn optional_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.invalid(key, "must be true or false")),
        }
    }

    fn string_list(&self, key: &str) -> Result<Vec<String>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    Value::Bool(b) => Ok(b.to_string()),
                    _ => Err(self.invalid(key, "must contain only strings")),
                })
                .collect(),
            Some(_) => Err(self.invalid(key, "must be a list of strings")),
        }
    }

    fn duration(&self, key: &str) -> Result<Option<Duration>> {
        let duration = match self.map.get(key) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) => humantime::parse_duration(s.trim())
                .map_err(|e| self.invalid(key, &format!("is not a valid duration ({e})")))?,
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Duration::from_secs)
                .ok_or_else(|| self.invalid(key, "must be a positive number of seconds"))?,
            Some(_) => return Err(self.invalid(key, "must be a duration such as \"30s\"")),
        };

        if duration.is_zero() {
            return Err(self.invalid(key, "must be greater than zero"));
        }
        Ok(Some(duration))
    }

    fn env(&self, key: &str) -> Result<Vec<(String, String)>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(_)) => self
                .string_list(key)?
                .into_iter()
                .map(|entry| match entry.split_once('=') {
                    Some((name, value)) if !name.is_empty() => {
                        Ok((name.to_string(), value.to_string()))
                    }
                    _ => Err(self.invalid(key, &format!("entry {entry:?} is not KEY=VALUE"))),
                })
                .collect(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, value)| match value {
                    Value::String(s) => Ok((name.clone(), s.clone())),
                    Value::Number(_) | Value::Bool(_) => Ok((name.clone(), value.to_string())),
                    _ => Err(self.invalid(key, &format!("value of {name} must be a string"))),
                })
                .collect(),
            Some(_) => Err(self.invalid(key, "must be a list of KEY=VALUE or a map")),
        }
    }

    fn template(&self, key: &str) -> Result<Template> {
        let source = self.required_str(key)?;
        parse_template(self, key, &source)
    }
}

fn parse_template(fields: &Fields<'_>, key: &str, source: &str) -> Result<Template> {
    Template::parse(source).map_err(|e| fields.invalid(key, &e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(kind: &str, fields: Value) -> Result<Action> {
        Action::from_config(&ActionConfig::new(kind, fields))
    }

    #[test]
    fn test_sound_action() {
        let action = parse("sound", json!({ "path": "/path/to/sound.mp3" })).unwrap();
        assert_eq!(
            action,
            Action::Sound(SoundAction {
                path: "/path/to/sound.mp3".into()
            })
        );
        assert_eq!(action.kind(), "sound");
    }

    #[test]
    fn test_sound_requires_path() {
        assert!(parse("sound", json!({})).is_err());
        assert!(parse("sound", json!({ "path": "" })).is_err());
    }

    #[test]
    fn test_command_defaults() {
        let Action::Command(cmd) = parse("command", json!({ "command": "echo" })).unwrap() else {
            panic!("expected command action");
        };
        assert_eq!(cmd.command, "echo");
        assert!(cmd.args.is_empty());
        assert_eq!(cmd.timeout, DEFAULT_COMMAND_TIMEOUT);
        assert!(cmd.env.is_empty());
    }

    #[test]
    fn test_command_full() {
        let Action::Command(cmd) = parse(
            "command",
            json!({
                "command": "./notify.sh",
                "args": ["--fast", 3],
                "timeout": "100ms",
                "env": ["CUSTOM_VAR=custom=value"]
            }),
        )
        .unwrap() else {
            panic!("expected command action");
        };
        assert_eq!(cmd.args, vec!["--fast", "3"]);
        assert_eq!(cmd.timeout, Duration::from_millis(100));
        assert_eq!(cmd.env, vec![("CUSTOM_VAR".into(), "custom=value".into())]);
    }

    #[test]
    fn test_command_env_map_and_numeric_timeout() {
        let Action::Command(cmd) = parse(
            "command",
            json!({ "command": "echo", "timeout": 5, "env": { "LEVEL": "warn" } }),
        )
        .unwrap() else {
            panic!("expected command action");
        };
        assert_eq!(cmd.timeout, Duration::from_secs(5));
        assert_eq!(cmd.env, vec![("LEVEL".into(), "warn".into())]);
    }

    #[test]
    fn test_command_invalid_data() {
        assert!(parse("command", json!({})).is_err());
        assert!(parse("command", json!({ "command": "" })).is_err());
        assert!(parse("command", json!({ "command": "echo", "args": "not an array" })).is_err());
        assert!(parse("command", json!({ "command": "echo", "timeout": "invalid" })).is_err());
        assert!(parse("command", json!({ "command": "echo", "timeout": "0s" })).is_err());
        assert!(parse("command", json!({ "command": "echo", "env": ["NOEQUALS"] })).is_err());
    }

    #[test]
    fn test_slack_action() {
        let Action::Slack(slack) = parse(
            "slack",
            json!({
                "webhook_url": "https://hooks.slack.com/services/T000/B000/XXXX",
                "message": "{{.Workflow}} failed",
                "color": "danger",
                "icon_emoji": ":x:"
            }),
        )
        .unwrap() else {
            panic!("expected slack action");
        };
        assert_eq!(slack.message.source(), "{{.Workflow}} failed");
        assert_eq!(slack.color.as_deref(), Some("danger"));
        assert_eq!(slack.icon_emoji.as_deref(), Some(":x:"));
        assert_eq!(slack.username, None);

        let debug = format!("{slack:?}");
        assert!(!debug.contains("hooks.slack.com"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_slack_invalid_data() {
        assert!(parse("slack", json!({ "message": "Test" })).is_err());
        assert!(parse("slack", json!({ "webhook_url": "https://hooks.slack.com/test" })).is_err());
        assert!(parse("slack", json!({ "webhook_url": "", "message": "Test" })).is_err());
        assert!(parse(
            "slack",
            json!({ "webhook_url": "https://x", "message": "{{.Nope}}" })
        )
        .is_err());
    }

    #[test]
    fn test_notify_defaults() {
        let Action::Notify(notify) = parse("notify", json!({ "message": "Test message" })).unwrap()
        else {
            panic!("expected notify action");
        };
        assert_eq!(notify.title.source(), DEFAULT_NOTIFY_TITLE);
        assert_eq!(notify.message.source(), "Test message");
        assert_eq!(notify.sound, None);
    }

    #[test]
    fn test_notify_with_sound_flag() {
        let Action::Notify(notify) = parse(
            "notify",
            json!({ "title": "Test Title", "message": "Test message", "sound": false }),
        )
        .unwrap() else {
            panic!("expected notify action");
        };
        assert_eq!(notify.title.source(), "Test Title");
        assert_eq!(notify.sound, Some(false));
    }

    #[test]
    fn test_notify_requires_message() {
        assert!(parse("notify", json!({ "title": "Test Title" })).is_err());
        assert!(parse("notify", json!({ "message": "x", "sound": "yes" })).is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = parse("pager", json!({})).unwrap_err();
        assert!(err.to_string().contains("unknown action type `pager`"));
    }

    #[test]
    fn test_action_config_deserializes_flattened_fields() {
        let config: ActionConfig =
            serde_json::from_value(json!({ "type": "sound", "path": "/a.wav" })).unwrap();
        assert_eq!(config.kind, "sound");
        assert_eq!(config.fields["path"], "/a.wav");
    }
}
