use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tag::{partial_len, Located, THINK};

/// Reasoning state of the response being parsed.
///
/// `content` always holds the full text of the current (or most recently
/// closed) thinking episode. A new `<think>` overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingState {
    pub is_active: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

/// Splits raw model output into thinking text and display-bound text.
///
/// The unconsumed tail is rescanned on every call, so delimiters split across
/// chunks are found once the rest of them arrives. While a region is open the
/// tail holds everything after `<think>` and `content` is re-derived from it,
/// never appended to.
#[derive(Debug, Default)]
pub(crate) struct ThinkingRouter {
    state: ThinkingState,
    pending: String,
}

impl ThinkingRouter {
    pub(crate) fn state(&self) -> &ThinkingState {
        &self.state
    }

    /// Feed `chunk` and return the display-bound text resolved by this call.
    ///
    /// With `flush` set the stream is over: held delimiter prefixes are
    /// released to display and an open region is closed with whatever it
    /// captured.
    pub(crate) fn route(&mut self, chunk: &str, flush: bool) -> String {
        self.pending.push_str(chunk);
        let buf = std::mem::take(&mut self.pending);
        let mut display = String::new();
        let mut rest = buf.as_str();

        loop {
            if !self.state.is_active {
                match THINK.locate(rest) {
                    Located::Absent => {
                        let held = if flush { 0 } else { partial_len(rest, THINK.open) };
                        let (ready, tail) = rest.split_at(rest.len() - held);
                        display.push_str(ready);
                        rest = tail;
                        break;
                    }
                    Located::Complete { open, close } => {
                        let region = THINK.split(rest, open, close);
                        display.push_str(region.before);
                        self.state.content = region.inner.to_string();
                        self.state.started_at = Some(Utc::now());
                        debug!(len = region.inner.len(), "thinking region closed");
                        rest = region.after;
                    }
                    Located::Incomplete { open } => {
                        display.push_str(&rest[..open]);
                        self.state.is_active = true;
                        self.state.started_at = Some(Utc::now());
                        debug!("thinking region opened");
                        rest = THINK.after_open(rest, open);
                    }
                }
            } else {
                match THINK.find_close(rest) {
                    Some(close) => {
                        self.state.content = rest[..close].to_string();
                        self.state.is_active = false;
                        debug!(len = close, "thinking region closed");
                        rest = THINK.after_close(rest, close);
                    }
                    None if flush => {
                        self.state.content = rest.to_string();
                        self.state.is_active = false;
                        debug!(len = rest.len(), "unterminated thinking region salvaged");
                        rest = "";
                        break;
                    }
                    None => {
                        let held = partial_len(rest, THINK.close);
                        self.state.content = rest[..rest.len() - held].to_string();
                        // the whole tail stays pending: content is re-derived next call
                        break;
                    }
                }
            }
        }

        self.pending = rest.to_string();
        display
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(router: &mut ThinkingRouter, chunks: &[&str]) -> String {
        let mut out = String::new();
        for chunk in chunks {
            out.push_str(&router.route(chunk, false));
        }
        out
    }

    #[test]
    fn plain_text_passes_through() {
        let mut router = ThinkingRouter::default();
        assert_eq!(router.route("hello world", false), "hello world");
        assert!(!router.state().is_active);
        assert!(router.state().content.is_empty());
    }

    #[test]
    fn complete_region_is_removed_from_display() {
        let mut router = ThinkingRouter::default();
        let out = router.route("Hi there. <think>pondering</think>The answer is 4.", false);
        assert_eq!(out, "Hi there. The answer is 4.");
        assert_eq!(router.state().content, "pondering");
        assert!(!router.state().is_active);
        assert!(router.state().started_at.is_some());
    }

    #[test]
    fn delimiters_split_across_chunks() {
        let mut router = ThinkingRouter::default();
        assert_eq!(router.route("Hi <thi", false), "Hi ");
        assert!(!router.state().is_active);

        assert_eq!(router.route("nk>pond", false), "");
        assert!(router.state().is_active);
        assert_eq!(router.state().content, "pond");

        assert_eq!(router.route("ering</thi", false), "");
        assert_eq!(router.state().content, "pondering");
        assert!(router.state().is_active);

        assert_eq!(router.route("nk>done", false), "done");
        assert_eq!(router.state().content, "pondering");
        assert!(!router.state().is_active);
    }

    #[test]
    fn content_is_rederived_not_appended() {
        let mut router = ThinkingRouter::default();
        feed(&mut router, &["<think>", "a", "b", "c"]);
        assert_eq!(router.state().content, "abc");
    }

    #[test]
    fn new_episode_overwrites_previous_content() {
        let mut router = ThinkingRouter::default();
        let out = feed(&mut router, &["<think>A</think>x", "<think>B</think>y"]);
        assert_eq!(out, "xy");
        assert_eq!(router.state().content, "B");
    }

    #[test]
    fn several_regions_in_one_call() {
        let mut router = ThinkingRouter::default();
        let out = router.route("1<think>a</think>2<think>b</think>3<think>c", false);
        assert_eq!(out, "123");
        assert_eq!(router.state().content, "c");
        assert!(router.state().is_active);
    }

    #[test]
    fn flush_salvages_open_region() {
        let mut router = ThinkingRouter::default();
        assert_eq!(router.route("Thinking now <think>still going", false), "Thinking now ");
        assert_eq!(router.route("", true), "");
        assert_eq!(router.state().content, "still going");
        assert!(!router.state().is_active);
    }

    #[test]
    fn flush_releases_held_prefix() {
        let mut router = ThinkingRouter::default();
        assert_eq!(router.route("a <", false), "a ");
        assert_eq!(router.route("", true), "<");
    }

    #[test]
    fn held_prefix_resolves_to_text_when_it_diverges() {
        let mut router = ThinkingRouter::default();
        assert_eq!(router.route("x <", false), "x ");
        assert_eq!(router.route(" y", false), "< y");
    }

    #[test]
    fn stray_closer_outside_region_is_display_text() {
        let mut router = ThinkingRouter::default();
        assert_eq!(router.route("a</think>b", false), "a</think>b");
    }
}
