//! Incremental parser for streamed LLM output.
//!
//! Splits a response into display text, `<think>` reasoning and
//! `<CODE_ARTIFACT>` code blocks while it is still arriving, with tag
//! delimiters allowed to straddle chunk boundaries.

pub mod artifact;
pub mod parser;
pub mod tag;
pub mod thinking;

pub use artifact::Artifact;
pub use parser::{parse_complete, ParsedChunk, StreamParser};
pub use tag::{Located, Tag, CODE_ARTIFACT, THINK};
pub use thinking::ThinkingState;
