//! Scripted collaborator for tests and offline replay.
//!
//! Replies are queued ahead of time; every call is logged with its inputs
//! so tests can assert exactly what the engine sent (most importantly, that
//! repair always receives the cell's original code).

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::collaborator::Collaborator;
use crate::error::{LlmError, LlmResult};
use crate::types::{CodeReply, GenerateRequest, JudgeRequest, Judgment, RepairRequest};

/// One recorded collaborator call with the inputs that mattered.
#[derive(Debug, Clone, PartialEq)]
pub enum CollaboratorCall {
    Generate {
        intent: String,
        context: String,
    },
    Repair {
        original_code: String,
        error_type: String,
        context: String,
        attempt: u32,
    },
    Judge {
        intent: String,
        code: String,
    },
}

/// A collaborator that replays queued responses.
#[derive(Default)]
pub struct ScriptedCollaborator {
    generations: Mutex<VecDeque<String>>,
    repairs: Mutex<VecDeque<String>>,
    judgments: Mutex<VecDeque<Judgment>>,
    calls: Mutex<Vec<CollaboratorCall>>,
}

impl ScriptedCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a generation reply.
    pub fn push_generation(&self, code: impl Into<String>) {
        self.generations.lock().unwrap().push_back(code.into());
    }

    /// Queue a repair reply.
    pub fn push_repair(&self, code: impl Into<String>) {
        self.repairs.lock().unwrap().push_back(code.into());
    }

    /// Queue a judgment reply.
    pub fn push_judgment(&self, judgment: Judgment) {
        self.judgments.lock().unwrap().push_back(judgment);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<CollaboratorCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of repair calls made so far.
    pub fn repair_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, CollaboratorCall::Repair { .. }))
            .count()
    }
}

#[async_trait]
impl Collaborator for ScriptedCollaborator {
    async fn generate(&self, req: &GenerateRequest) -> LlmResult<CodeReply> {
        self.calls.lock().unwrap().push(CollaboratorCall::Generate {
            intent: req.intent.clone(),
            context: req.context.clone(),
        });
        let code = self
            .generations
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(LlmError::ScriptExhausted("generate"))?;
        Ok(CodeReply {
            code,
            trace_id: "scripted-generate".to_string(),
        })
    }

    async fn repair(&self, req: &RepairRequest) -> LlmResult<CodeReply> {
        self.calls.lock().unwrap().push(CollaboratorCall::Repair {
            original_code: req.original_code.clone(),
            error_type: req.error_type.clone(),
            context: req.context.clone(),
            attempt: req.attempt,
        });
        let code = self
            .repairs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(LlmError::ScriptExhausted("repair"))?;
        Ok(CodeReply {
            code,
            trace_id: "scripted-repair".to_string(),
        })
    }

    async fn judge(&self, req: &JudgeRequest) -> LlmResult<Judgment> {
        self.calls.lock().unwrap().push(CollaboratorCall::Judge {
            intent: req.intent.clone(),
            code: req.code.clone(),
        });
        self.judgments
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(LlmError::ScriptExhausted("judge"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let collab = ScriptedCollaborator::new();
        collab.push_generation("first");
        collab.push_generation("second");

        let req = GenerateRequest {
            intent: "i".to_string(),
            context: "ctx".to_string(),
        };
        assert_eq!(collab.generate(&req).await.unwrap().code, "first");
        assert_eq!(collab.generate(&req).await.unwrap().code, "second");
        assert!(matches!(
            collab.generate(&req).await,
            Err(LlmError::ScriptExhausted("generate"))
        ));
        assert_eq!(collab.calls().len(), 3);
    }
}
