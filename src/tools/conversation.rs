//! Conversation logging and history

use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;

use super::str_arg;
use crate::agent::{keys, FunctionTool, Tool, ToolContext, ToolSchema};

const ANONYMOUS_USER: &str = "anonymous";
const DEFAULT_SESSION: &str = "default_session";

/// Interactions returned by `get_user_history`
pub const HISTORY_LIMIT: usize = 10;

/// Session the tool call belongs to, falling back to state
fn session_id(ctx: &ToolContext) -> Option<String> {
    let id = ctx.session_id();
    if !id.is_empty() {
        return Some(id.to_string());
    }
    ctx.state().get_str(keys::SESSION_ID)
}

pub fn log_conversation(ctx: &ToolContext, agent_name: &str, query: &str, response: &str) -> Result<Value> {
    let user_id = ctx
        .state()
        .current_user_id()
        .unwrap_or_else(|| ANONYMOUS_USER.to_string());
    let session_id = session_id(ctx).unwrap_or_else(|| DEFAULT_SESSION.to_string());

    ctx.store()
        .log_interaction(&session_id, &user_id, agent_name, query, response)?;
    ctx.state().set(keys::CONVERSATION_LOGGED, true);

    Ok(json!({
        "logged": true,
        "agent": agent_name,
        "user_id": user_id,
    }))
}

pub fn get_user_history(ctx: &ToolContext) -> Result<Value> {
    let Some(user_id) = ctx.state().current_user_id() else {
        return Ok(json!({"error": "No user logged in"}));
    };

    let session_id = session_id(ctx);
    let history = ctx
        .store()
        .get_chat_history(&user_id, session_id.as_deref(), HISTORY_LIMIT)?;

    Ok(json!({ "history": history }))
}

pub fn log_conversation_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new(
        "log_conversation",
        "Save the user's query and your final response to the conversation history",
    )
    .with_string_param("agent_name", "Agent that produced the response", true)
    .with_string_param("query", "The user's message", true)
    .with_string_param("response", "The response given", true);

    Arc::new(FunctionTool::new(schema, |args, ctx| async move {
        log_conversation(
            &ctx,
            str_arg(&args, "agent_name"),
            str_arg(&args, "query"),
            str_arg(&args, "response"),
        )
    }))
}

pub fn get_user_history_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new(
        "get_user_history",
        "Get recent conversation history for the current user in this session",
    );

    Arc::new(FunctionTool::new(schema, |_args, ctx| async move { get_user_history(&ctx) }))
}
