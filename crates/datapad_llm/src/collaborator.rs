//! The collaborator trait and its live implementation.

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use crate::client::LlmClient;
use crate::error::{LlmError, LlmResult};
use crate::prompts;
use crate::types::{CodeReply, GenerateRequest, JudgeRequest, Judgment, RepairRequest, Verdict};

/// The opaque generation/repair/judgment collaborator.
///
/// All three calls are suspension points; the engine awaits them without
/// holding anything another notebook needs.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Generate code from an intent.
    async fn generate(&self, req: &GenerateRequest) -> LlmResult<CodeReply>;

    /// Produce a candidate fix for failed code. `req.original_code` is
    /// always the cell's first-ever generated version.
    async fn repair(&self, req: &RepairRequest) -> LlmResult<CodeReply>;

    /// Judge the semantic correctness of a successful execution.
    async fn judge(&self, req: &JudgeRequest) -> LlmResult<Judgment>;
}

/// Live collaborator backed by an HTTP chat-completion client.
pub struct LiveCollaborator {
    client: LlmClient,
}

impl LiveCollaborator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    /// Build from environment variables.
    pub fn from_env() -> LlmResult<Self> {
        Ok(Self::new(LlmClient::from_env()?))
    }
}

#[async_trait]
impl Collaborator for LiveCollaborator {
    async fn generate(&self, req: &GenerateRequest) -> LlmResult<CodeReply> {
        let (system, user) = prompts::generate(req);
        let response = self.client.complete(&system, &user).await?;
        let trace_id = uuid::Uuid::new_v4().to_string();
        info!(trace = %trace_id, tokens = response.output_tokens, "generate call completed");
        Ok(CodeReply {
            code: extract_code(&response.content)?,
            trace_id,
        })
    }

    async fn repair(&self, req: &RepairRequest) -> LlmResult<CodeReply> {
        let (system, user) = prompts::repair(req);
        let response = self.client.complete(&system, &user).await?;
        let trace_id = uuid::Uuid::new_v4().to_string();
        info!(trace = %trace_id, attempt = req.attempt, "repair call completed");
        Ok(CodeReply {
            code: extract_code(&response.content)?,
            trace_id,
        })
    }

    async fn judge(&self, req: &JudgeRequest) -> LlmResult<Judgment> {
        let (system, user) = prompts::judge(req);
        let response = self.client.complete(&system, &user).await?;
        let trace_id = uuid::Uuid::new_v4().to_string();
        let verdict = parse_verdict(&response.content)?;
        debug!(trace = %trace_id, pass = matches!(verdict, Verdict::Pass), "judge call completed");
        Ok(Judgment {
            verdict,
            trace_id,
        })
    }
}

/// Pull code out of a collaborator reply.
///
/// Prefers the first fenced block; falls back to the trimmed reply when the
/// collaborator skipped the fence. An empty reply is an error, never empty
/// code.
pub fn extract_code(reply: &str) -> LlmResult<String> {
    let fence = Regex::new(r"(?s)```[a-zA-Z]*\n(.*?)```").expect("static regex");
    let code = match fence.captures(reply) {
        Some(caps) => caps[1].trim().to_string(),
        None => reply.trim().to_string(),
    };
    if code.is_empty() {
        return Err(LlmError::EmptyReply);
    }
    Ok(code)
}

/// Parse a judgment reply into a verdict.
///
/// Expects strict JSON; falls back to scanning for one fenced JSON block.
pub fn parse_verdict(reply: &str) -> LlmResult<Verdict> {
    if let Ok(verdict) = serde_json::from_str::<Verdict>(reply.trim()) {
        return Ok(verdict);
    }
    let fence = Regex::new(r"(?s)```(?:json)?\n(.*?)```").expect("static regex");
    if let Some(caps) = fence.captures(reply) {
        if let Ok(verdict) = serde_json::from_str::<Verdict>(caps[1].trim()) {
            return Ok(verdict);
        }
    }
    Err(LlmError::MalformedReply(format!(
        "not a verdict: {}",
        reply.chars().take(120).collect::<String>()
    )))
}
