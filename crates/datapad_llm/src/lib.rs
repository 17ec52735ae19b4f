//! # datapad_llm
//!
//! The opaque generation/repair/judgment collaborator for the datapad
//! execution engine.
//!
//! The engine only ever sees the [`Collaborator`] trait: generate code from
//! an intent, repair failed code, or judge a successful result. This crate
//! provides the live implementation (OpenAI and Anthropic chat APIs, picked
//! via environment variables, with bounded transport-level retry) and a
//! scripted implementation for tests and offline replay.
//!
//! Collaborator unavailability or unparseable output always surfaces as a
//! tagged error, never as fabricated code or a fabricated verdict.

pub mod client;
pub mod collaborator;
pub mod error;
pub mod mock;
pub mod prompts;
pub mod types;

pub use client::{LlmClient, LlmProvider, LlmResponse};
pub use collaborator::{Collaborator, LiveCollaborator};
pub use error::{LlmError, LlmResult};
pub use mock::{CollaboratorCall, ScriptedCollaborator};
pub use types::{
    CodeReply, GenerateRequest, JudgeRequest, Judgment, RawFinding, RepairRequest, Verdict,
};
