use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::tag::{partial_len, Located, CODE_ARTIFACT};

const FENCE: &str = "```";
const DEFAULT_LANGUAGE: &str = "text";
const UNFENCED_TITLE: &str = "Code Artifact";
const FILENAME_MARKER: &str = "filename:";

/// A code block extracted from a `<CODE_ARTIFACT>` region.
///
/// Immutable once produced. Ids are UUIDv7 (millisecond clock plus random
/// bits), unique for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    pub language: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Build an artifact from the text between the artifact delimiters.
    ///
    /// Never fails: inner text without a usable fence becomes a plain `text`
    /// artifact holding the whole trimmed region.
    pub fn from_region(inner: &str) -> Self {
        let (language, title, content) = match find_fence(inner) {
            Some(fence) => {
                let language = normalize_language(fence.label);
                let content = fence.body.trim().to_string();
                let title = title_from_body(&content)
                    .unwrap_or_else(|| format!("{} Code", capitalize(&language)));
                (language, title, content)
            }
            None => (
                DEFAULT_LANGUAGE.to_string(),
                UNFENCED_TITLE.to_string(),
                inner.trim().to_string(),
            ),
        };

        Self {
            id: Uuid::now_v7().to_string(),
            language,
            title,
            content,
            created_at: Utc::now(),
        }
    }
}

struct Fence<'a> {
    label: &'a str,
    body: &'a str,
}

/// First fenced block in `text`: opening fence, label up to the newline,
/// body, closing fence. An opening fence with no newline or no closing fence
/// does not count.
fn find_fence(text: &str) -> Option<Fence<'_>> {
    let start = text.find(FENCE)?;
    let after = &text[start + FENCE.len()..];
    let newline = after.find('\n')?;
    let body = &after[newline + 1..];
    let end = body.find(FENCE)?;
    Some(Fence {
        label: &after[..newline],
        body: &body[..end],
    })
}

fn normalize_language(label: &str) -> String {
    let token = label.split_whitespace().next().unwrap_or("");
    let valid = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '#' | '.' | '-'));
    if valid {
        token.to_string()
    } else {
        DEFAULT_LANGUAGE.to_string()
    }
}

/// Title from a `filename:` comment on the first body line, comment marker
/// stripped.
fn title_from_body(body: &str) -> Option<String> {
    let first = body.lines().next()?;
    if !first.contains(FILENAME_MARKER) {
        return None;
    }
    let mut line = first.trim();
    for marker in ["<!--", "//", "/*", "--", "#", ";"] {
        if let Some(stripped) = line.strip_prefix(marker) {
            line = stripped;
            break;
        }
    }
    for marker in ["-->", "*/"] {
        if let Some(stripped) = line.trim_end().strip_suffix(marker) {
            line = stripped;
            break;
        }
    }
    Some(line.trim().to_string())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Pulls complete artifact regions out of display-bound text.
///
/// Incomplete regions and partial opening delimiters are held back until the
/// closing delimiter arrives or the stream is flushed; a region still open at
/// flush time is discarded together with its text.
#[derive(Debug)]
pub(crate) struct ArtifactRouter {
    pending: String,
    /// Whether everything emitted so far ends at a line start.
    at_line_start: bool,
    /// Drop one leading newline from the next emitted text. Set after a
    /// region that stood on its own line, so removing it leaves no blank line.
    swallow_newline: bool,
}

impl Default for ArtifactRouter {
    fn default() -> Self {
        Self {
            pending: String::new(),
            at_line_start: true,
            swallow_newline: false,
        }
    }
}

impl ArtifactRouter {
    /// Feed display-bound `text`; return the display text resolved by this
    /// call and the artifacts completed by it, in stream order.
    pub(crate) fn route(&mut self, text: &str, flush: bool) -> (String, Vec<Artifact>) {
        self.pending.push_str(text);
        let buf = std::mem::take(&mut self.pending);
        let mut display = String::new();
        let mut found = Vec::new();
        let mut rest = buf.as_str();

        loop {
            match CODE_ARTIFACT.locate(rest) {
                Located::Absent => {
                    let held = if flush {
                        0
                    } else {
                        partial_len(rest, CODE_ARTIFACT.open)
                    };
                    let (ready, tail) = rest.split_at(rest.len() - held);
                    self.emit(&mut display, ready);
                    rest = tail;
                    break;
                }
                Located::Complete { open, close } => {
                    let region = CODE_ARTIFACT.split(rest, open, close);
                    self.emit(&mut display, region.before);
                    let artifact = Artifact::from_region(region.inner);
                    debug!(
                        id = %artifact.id,
                        language = %artifact.language,
                        len = artifact.content.len(),
                        "artifact extracted"
                    );
                    found.push(artifact);
                    if self.at_line_start {
                        self.swallow_newline = true;
                    }
                    rest = region.after;
                }
                Located::Incomplete { open } => {
                    self.emit(&mut display, &rest[..open]);
                    if flush {
                        debug!(len = rest.len() - open, "unterminated artifact dropped");
                        rest = "";
                    } else {
                        rest = &rest[open..];
                    }
                    break;
                }
            }
        }

        self.pending = rest.to_string();
        (display, found)
    }

    fn emit(&mut self, display: &mut String, mut text: &str) {
        if text.is_empty() {
            return;
        }
        if self.swallow_newline {
            self.swallow_newline = false;
            text = text.strip_prefix('\n').unwrap_or(text);
            if text.is_empty() {
                return;
            }
        }
        self.at_line_start = text.ends_with('\n');
        display.push_str(text);
    }
}
