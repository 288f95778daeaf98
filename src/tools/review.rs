//! Code review loop tools

use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::str_arg;
use crate::agent::{keys, FunctionTool, Tool, ToolContext, ToolSchema};

pub fn review_code(ctx: &ToolContext, feedback: &str) -> Result<Value> {
    ctx.state().set(keys::CODE_FEEDBACK, feedback);
    Ok(json!({
        "status": "needs_improvement",
        "feedback": feedback,
    }))
}

pub fn exit_loop(ctx: &ToolContext) -> Result<Value> {
    debug!("{} approved the code", ctx.agent_name);
    ctx.escalate();
    Ok(json!({
        "status": "complete",
        "message": "Code is optimal",
    }))
}

pub fn review_code_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new(
        "review_code",
        "Send feedback on the generated code so it can be improved",
    )
    .with_string_param("feedback", "Specific, actionable improvements", true);

    Arc::new(FunctionTool::new(schema, |args, ctx| async move {
        review_code(&ctx, str_arg(&args, "feedback"))
    }))
}

pub fn exit_loop_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new(
        "exit_loop",
        "Call when the code is correct and optimal to end the review loop",
    );

    Arc::new(FunctionTool::new(schema, |_args, ctx| async move { exit_loop(&ctx) }))
}
