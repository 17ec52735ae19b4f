//! Error types for collaborator calls.

use thiserror::Error;

/// Result type alias for collaborator operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors from the generation/repair/judgment collaborator.
///
/// Any of these degrades the engine to an explicit "cannot generate/repair"
/// state; none of them is ever papered over with substitute content.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    NotConfigured,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Collaborator returned an empty reply")]
    EmptyReply,

    #[error("Collaborator reply could not be parsed: {0}")]
    MalformedReply(String),

    #[error("No scripted reply available for {0}")]
    ScriptExhausted(&'static str),
}
