//! `{{.Field}}` message templates for Slack and desktop notifications.
//!
//! Templates are parsed when the configuration is loaded so that a typo in a
//! placeholder is reported up front instead of when the hook fires.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::{AppError, Result};
use crate::hooks::WorkflowEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Repository,
    Workflow,
    RunId,
    EventType,
    RunUrl,
    Timestamp,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "Repository" => Some(Field::Repository),
            "Workflow" => Some(Field::Workflow),
            "RunID" => Some(Field::RunId),
            "EventType" => Some(Field::EventType),
            "RunURL" | "URL" => Some(Field::RunUrl),
            "Timestamp" => Some(Field::Timestamp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(Field),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*\.([A-Za-z]+)\s*\}\}").expect("valid placeholder regex"))
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in placeholder_re().captures_iter(source) {
            let whole = caps.get(0).expect("capture 0 always exists");
            let name = &caps[1];
            let field = Field::parse(name)
                .ok_or_else(|| AppError::Template(format!("unknown field `{name}` in {source:?}")))?;

            push_text(&mut segments, &source[last..whole.start()])?;
            segments.push(Segment::Field(field));
            last = whole.end();
        }
        push_text(&mut segments, &source[last..])?;

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render against an event, stamping `{{.Timestamp}}` with the current time.
    pub fn render(&self, event: &WorkflowEvent) -> String {
        self.render_at(event, Utc::now())
    }

    pub fn render_at(&self, event: &WorkflowEvent, now: DateTime<Utc>) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(Field::Repository) => out.push_str(&event.repository),
                Segment::Field(Field::Workflow) => out.push_str(&event.workflow),
                Segment::Field(Field::RunId) => out.push_str(&event.run_id.to_string()),
                Segment::Field(Field::EventType) => out.push_str(event.kind.as_str()),
                Segment::Field(Field::RunUrl) => out.push_str(&event.url),
                Segment::Field(Field::Timestamp) => out.push_str(&now.to_rfc3339()),
            }
        }
        out
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str) -> Result<()> {
    if text.contains("{{") {
        return Err(AppError::Template(format!("malformed placeholder in {text:?}")));
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
    Ok(())
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Template").field(&self.source).finish()
    }
}
