use serde::{Deserialize, Serialize};

use crate::artifact::{Artifact, ArtifactRouter};
use crate::thinking::{ThinkingRouter, ThinkingState};

/// Snapshot returned by every parse call.
///
/// `display_content` is cumulative: the whole resolved display text of the
/// current response, not the delta added by this call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedChunk {
    pub display_content: String,
    pub thinking_content: String,
    pub is_thinking_active: bool,
    pub artifacts: Vec<Artifact>,
    pub is_complete: bool,
}

/// Incremental parser for one streamed assistant response.
///
/// Chunks must be applied in transport order. Create one parser per response
/// (or `reset` between responses); instances share nothing.
#[derive(Debug, Default)]
pub struct StreamParser {
    thinking: ThinkingRouter,
    artifact_router: ArtifactRouter,
    display: String,
    artifacts: Vec<Artifact>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and reclassify everything not yet resolved.
    ///
    /// With `is_complete` set the stream is treated as over: an open thinking
    /// region keeps what it captured, an open artifact region is dropped, and
    /// held delimiter prefixes become plain text.
    pub fn parse_chunk(&mut self, chunk: &str, is_complete: bool) -> ParsedChunk {
        let display_bound = self.thinking.route(chunk, is_complete);
        let (resolved, found) = self.artifact_router.route(&display_bound, is_complete);
        self.display.push_str(&resolved);
        self.artifacts.extend(found);
        self.snapshot(is_complete)
    }

    /// Terminal call: no more chunks will arrive.
    pub fn finalize(&mut self) -> ParsedChunk {
        self.parse_chunk("", true)
    }

    /// Discard all state from the previous response.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn display_content(&self) -> &str {
        &self.display
    }

    pub fn thinking_state(&self) -> &ThinkingState {
        self.thinking.state()
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    fn snapshot(&self, is_complete: bool) -> ParsedChunk {
        let thinking = self.thinking.state();
        ParsedChunk {
            display_content: self.display.clone(),
            thinking_content: thinking.content.clone(),
            is_thinking_active: thinking.is_active,
            artifacts: self.artifacts.clone(),
            is_complete,
        }
    }
}

/// Parse a complete response in one shot.
pub fn parse_complete(text: &str) -> ParsedChunk {
    StreamParser::new().parse_chunk(text, true)
}
