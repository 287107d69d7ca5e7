//! The distinguished `finish` tool — terminates the ReAct loop.
//!
//! The agent loop intercepts calls to any tool whose side-effect class is
//! `Finish` and returns the `final_answer` to the caller; this handler
//! only runs when the tool is invoked outside the loop.

use async_trait::async_trait;
use hearth_core::error::ToolError;
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, Tool};
use serde_json::Value;

pub struct FinishTool;

#[async_trait]
impl Tool for FinishTool {
    fn name(&self) -> &str {
        "finish"
    }

    fn description(&self) -> &str {
        "Call when the task is complete, with the final answer for the user."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "final_answer": {
                    "type": "string",
                    "description": "The complete final answer"
                }
            },
            "required": ["final_answer"]
        })
    }

    fn side_effect(&self) -> SideEffectClass {
        SideEffectClass::Finish
    }

    async fn execute(&self, params: Value) -> Result<Observation, ToolError> {
        let answer = params["final_answer"].as_str().unwrap_or_default();
        Ok(Observation::text(format!("task complete: {answer}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classified_as_finish() {
        assert_eq!(FinishTool.side_effect(), SideEffectClass::Finish);
    }

    #[tokio::test]
    async fn echoes_the_answer() {
        let obs = FinishTool
            .execute(serde_json::json!({"final_answer": "42"}))
            .await
            .unwrap();
        assert!(obs.ok);
        assert!(obs.summary.contains("42"));
    }
}
