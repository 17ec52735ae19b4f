//! Prompt assembly for the three collaborator calls.
//!
//! The engine hands over complete, untruncated context; nothing here caps
//! or summarizes it.

use crate::types::{GenerateRequest, JudgeRequest, RepairRequest};

const CODE_SYSTEM: &str = "You are a data-analysis assistant writing datapad script. \
Reply with a single fenced code block and nothing else. \
Use only variables listed in the context; never invent columns.";

const JUDGE_SYSTEM: &str = "You are reviewing the result of executed analysis code. \
Reply with strict JSON only: {\"verdict\":\"pass\"} or \
{\"verdict\":\"fail\",\"findings\":[{\"severity\":\"high|medium|low\",\
\"description\":\"...\",\"evidence\":\"literal excerpt from the code or output, or none\"}]}.";

/// System + user prompts for code generation.
pub fn generate(req: &GenerateRequest) -> (String, String) {
    let user = format!(
        "Intent:\n{}\n\nExecution context:\n{}\n\nWrite the code.",
        req.intent, req.context
    );
    (CODE_SYSTEM.to_string(), user)
}

/// System + user prompts for a repair attempt.
pub fn repair(req: &RepairRequest) -> (String, String) {
    let user = format!(
        "The following code failed (repair attempt {}).\n\n\
         Original code:\n```\n{}\n```\n\n\
         Error: {}: {}\n\nTraceback:\n{}\n\n\
         Execution context:\n{}\n\n\
         Return a corrected version of the original code.",
        req.attempt,
        req.original_code,
        req.error_type,
        req.error_message,
        req.traceback,
        req.context
    );
    (CODE_SYSTEM.to_string(), user)
}

/// System + user prompts for the semantic judgment call.
pub fn judge(req: &JudgeRequest) -> (String, String) {
    let user = format!(
        "Intent:\n{}\n\nExecuted code:\n```\n{}\n```\n\n\
         Console output:\n{}\n\n\
         Artifacts captured: {} table(s), {} figure(s).\n\n\
         Did the code satisfy the intent?",
        req.intent, req.code, req.console_text, req.table_count, req.figure_count
    );
    (JUDGE_SYSTEM.to_string(), user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_prompt_carries_full_payload() {
        let req = RepairRequest {
            original_code: "x = df[\"missing\"]".to_string(),
            error_type: "KeyError".to_string(),
            error_message: "'missing'".to_string(),
            traceback: "line 1".to_string(),
            context: "df: table, columns [A, B]".to_string(),
            attempt: 2,
        };
        let (_, user) = repair(&req);
        assert!(user.contains("repair attempt 2"));
        assert!(user.contains("x = df[\"missing\"]"));
        assert!(user.contains("KeyError"));
        assert!(user.contains("columns [A, B]"));
    }

    #[test]
    fn test_judge_prompt_reports_artifact_counts() {
        let req = JudgeRequest {
            intent: "plot revenue".to_string(),
            code: "f = figure(\"revenue\")".to_string(),
            console_text: String::new(),
            table_count: 0,
            figure_count: 1,
        };
        let (_, user) = judge(&req);
        assert!(user.contains("0 table(s), 1 figure(s)"));
    }
}
