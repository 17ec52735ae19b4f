//! Request and response types for the collaborator interface.

use datapad_core::Severity;
use serde::{Deserialize, Serialize};

/// Request to generate code from a natural-language intent.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// The user's intent text
    pub intent: String,
    /// Complete, untruncated execution context (see the context builder)
    pub context: String,
}

/// Request to repair code that failed at runtime.
#[derive(Debug, Clone)]
pub struct RepairRequest {
    /// The cell's first-ever generated code, never an interim failed
    /// attempt
    pub original_code: String,
    /// Error class, e.g. "KeyError"
    pub error_type: String,
    /// Error message
    pub error_message: String,
    /// Full traceback text
    pub traceback: String,
    /// Complete, untruncated execution context
    pub context: String,
    /// 1-based repair attempt number
    pub attempt: u32,
}

/// Request to judge the semantic correctness of a successful execution.
#[derive(Debug, Clone)]
pub struct JudgeRequest {
    /// The user's intent text
    pub intent: String,
    /// The code that was executed
    pub code: String,
    /// Console output of the execution
    pub console_text: String,
    /// Number of table artifacts captured
    pub table_count: usize,
    /// Number of figure artifacts captured (static + interactive)
    pub figure_count: usize,
}

/// Code returned by the collaborator, with a trace id for audit.
#[derive(Debug, Clone)]
pub struct CodeReply {
    pub code: String,
    /// Opaque identifier tying this reply to collaborator-side logs
    pub trace_id: String,
}

/// A finding as reported by the judgment call, before evidence
/// verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawFinding {
    pub severity: Severity,
    pub description: String,
    /// Literal excerpt from the supplied code or output, or "none"
    #[serde(default = "default_evidence")]
    pub evidence: String,
}

fn default_evidence() -> String {
    "none".to_string()
}

/// The judged verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail {
        #[serde(default)]
        findings: Vec<RawFinding>,
    },
}

/// A verdict plus its audit trace id.
#[derive(Debug, Clone)]
pub struct Judgment {
    pub verdict: Verdict,
    pub trace_id: String,
}

impl Judgment {
    /// Convenience constructor for a passing judgment.
    pub fn pass(trace_id: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Pass,
            trace_id: trace_id.into(),
        }
    }

    /// Convenience constructor for a failing judgment.
    pub fn fail(findings: Vec<RawFinding>, trace_id: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Fail { findings },
            trace_id: trace_id.into(),
        }
    }
}
