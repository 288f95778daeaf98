//! Learning path tools
//!
//! A learning path binds the current chat session to a subject. Progress
//! lives in the subject profile, so a new path for a known subject inherits
//! the student's level.

use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{opt_str_arg, str_arg};
use crate::agent::{FunctionTool, Tool, ToolContext, ToolSchema};
use crate::response::title_case;
use crate::store::EMPTY_SYLLABUS;
use crate::syllabus::Syllabus;

/// Level given to a subject the student has never studied
pub const STARTING_LEVEL: &str = "Beginner";

const CURRENT_SUFFIX: &str = " (CURRENT)";

pub fn create_learning_path(ctx: &ToolContext, subject: &str, title: Option<&str>) -> Result<Value> {
    let session_id = ctx.session_id();
    let user_id = match ctx.state().current_user_id() {
        Some(id) if !session_id.is_empty() => id,
        user => {
            return Ok(json!({
                "error": format!(
                    "Context missing. UserID: {}, SessionID: {}",
                    user.as_deref().unwrap_or("none"),
                    if session_id.is_empty() { "none" } else { session_id }
                ),
            }))
        }
    };

    let title = title
        .map(|t| t.to_string())
        .unwrap_or_else(|| title_case(subject));

    ctx.store()
        .create_learning_path(&user_id, session_id, subject, &title)?;

    let mut message = format!("Learning Path '{}' created.", title);
    let existing = match ctx.store().get_student_profile(&user_id, subject)? {
        Some(profile) => {
            message.push_str(&format!(" Found existing progress: Level {}.", profile.level));
            json!(profile)
        }
        None => {
            let details = Syllabus::starter().to_json().to_string();
            ctx.store()
                .update_student_profile(&user_id, subject, STARTING_LEVEL, &details)?;
            message.push_str(" Starting fresh for this subject.");
            json!({
                "subject": subject,
                "level": STARTING_LEVEL,
                "details": details,
            })
        }
    };

    Ok(json!({
        "success": true,
        "path_created": true,
        "subject": subject,
        "title": title,
        "message": message,
        "existing_profile": existing,
    }))
}

pub fn get_learning_paths(ctx: &ToolContext) -> Result<Value> {
    let Some(user_id) = ctx.state().current_user_id() else {
        return Ok(json!({"error": "User ID missing"}));
    };

    let current_session = ctx.session_id();
    let paths: Vec<Value> = ctx
        .store()
        .get_learning_paths(&user_id)?
        .into_iter()
        .map(|path| {
            let is_current = path.session_id == current_session;
            let mut value = json!(path);
            value["is_current"] = json!(is_current);

            if is_current {
                value["title"] = json!(format!("{}{}", path.title, CURRENT_SUFFIX));
                if path.syllabus.trim() == EMPTY_SYLLABUS {
                    value["syllabus"] = Value::Null;
                }
            } else if let Some(obj) = value.as_object_mut() {
                // Other paths' plans would only confuse the model
                obj.remove("syllabus");
            }
            value
        })
        .collect();

    Ok(json!({ "paths": paths }))
}

pub fn get_current_learning_path_context(ctx: &ToolContext) -> Result<Value> {
    let session_id = ctx.session_id();
    if session_id.is_empty() {
        return Ok(json!({"error": "No active session ID found."}));
    }

    let path = ctx
        .store()
        .get_learning_path(session_id)?
        .filter(|p| ctx.state().current_user_id().map_or(true, |u| u == p.user_id));

    match path {
        Some(path) => Ok(json!({
            "found": true,
            "title": path.title,
            "subject": path.subject,
            "syllabus_json": path.syllabus,
            "message": "Found active learning path.",
        })),
        None => Ok(json!({
            "found": false,
            "message": "No learning path created for this chat session yet.",
        })),
    }
}

pub fn create_learning_path_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new(
        "create_learning_path",
        "Bind this chat to a subject as a persistent Learning Path. Use when the user starts or resumes a subject.",
    )
    .with_string_param("subject", "Subject ID, e.g. 'dsa', 'python', 'system_design'", true)
    .with_string_param("title", "Display title; defaults to the subject name", false);

    Arc::new(FunctionTool::new(schema, |args, ctx| async move {
        create_learning_path(&ctx, str_arg(&args, "subject"), opt_str_arg(&args, "title"))
    }))
}

pub fn get_learning_paths_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new("get_learning_paths", "List all learning paths of the current user");

    Arc::new(FunctionTool::new(schema, |_args, ctx| async move { get_learning_paths(&ctx) }))
}

pub fn get_current_learning_path_context_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new(
        "get_current_learning_path_context",
        "Get title, subject and saved syllabus of the learning path bound to this chat",
    );

    Arc::new(FunctionTool::new(schema, |_args, ctx| async move {
        get_current_learning_path_context(&ctx)
    }))
}
