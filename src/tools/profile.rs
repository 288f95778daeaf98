//! Student profile and syllabus tools

use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;

use super::str_arg;
use crate::agent::{FunctionTool, Tool, ToolContext, ToolSchema};

/// Profile details arrive as text or as structured JSON; stored as text
pub fn details_text(details: Option<&Value>) -> String {
    match details {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

pub fn get_student_profile(ctx: &ToolContext, subject: &str) -> Result<Value> {
    let Some(user_id) = ctx.state().current_user_id() else {
        return Ok(json!({"error": "No user logged in"}));
    };

    match ctx.store().get_student_profile(&user_id, subject)? {
        Some(profile) => Ok(json!({"found": true, "profile": profile})),
        None => Ok(json!({
            "found": false,
            "message": format!("No profile found for {}", subject),
        })),
    }
}

pub fn update_student_profile(ctx: &ToolContext, subject: &str, level: &str, details: &str) -> Result<Value> {
    let Some(user_id) = ctx.state().current_user_id() else {
        return Ok(json!({"error": "No user logged in"}));
    };

    ctx.store()
        .update_student_profile(&user_id, subject, level, details)?;

    Ok(json!({
        "success": true,
        "message": format!("Updated {} level to {}", subject, level),
    }))
}

pub fn update_learning_path_details(ctx: &ToolContext, syllabus: &str) -> Result<Value> {
    let session_id = ctx.session_id();
    if session_id.is_empty() {
        return Ok(json!({"success": false, "message": "No active session found"}));
    }

    let saved = ctx.store().update_learning_path_details(session_id, syllabus)?;
    Ok(json!({
        "success": saved,
        "message": if saved {
            "Syllabus saved to Learning Path."
        } else {
            "Failed to save syllabus. Create a learning path for this chat first."
        },
    }))
}

pub fn get_student_profile_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new(
        "get_student_profile",
        "Get the student's level and saved details for a subject",
    )
    .with_string_param("subject", "Subject ID, e.g. 'dsa', 'python', 'system_design'", true);

    Arc::new(FunctionTool::new(schema, |args, ctx| async move {
        get_student_profile(&ctx, str_arg(&args, "subject"))
    }))
}

pub fn update_student_profile_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new(
        "update_student_profile",
        "Save the student's level and details (notes or syllabus JSON) for a subject",
    )
    .with_string_param("subject", "Subject ID", true)
    .with_string_param("level", "Beginner, Intermediate or Advanced", true)
    .with_any_param("details", "Notes or a syllabus object", true);

    Arc::new(FunctionTool::new(schema, |args, ctx| async move {
        let details = details_text(args.get("details"));
        update_student_profile(&ctx, str_arg(&args, "subject"), str_arg(&args, "level"), &details)
    }))
}

pub fn update_learning_path_details_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new(
        "update_learning_path_details",
        "Save the syllabus for the CURRENT learning path (this chat session)",
    )
    .with_any_param(
        "syllabus",
        r#"Syllabus JSON: {"syllabus": [{"module", "status", "subtopics"}], "current_topic"}"#,
        true,
    );

    Arc::new(FunctionTool::new(schema, |args, ctx| async move {
        let syllabus = details_text(args.get("syllabus"));
        update_learning_path_details(&ctx, &syllabus)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ToolRegistry, ToolResult};
    use crate::tools::testing;

    #[test]
    fn test_profile_requires_login() {
        let ctx = testing::context("s1");
        assert_eq!(get_student_profile(&ctx, "dsa").unwrap()["error"], "No user logged in");
        assert_eq!(
            update_student_profile(&ctx, "dsa", "Beginner", "").unwrap()["error"],
            "No user logged in"
        );
    }

    #[test]
    fn test_profile_round_trip() {
        let ctx = testing::logged_in("s1", "alice");

        assert_eq!(get_student_profile(&ctx, "dsa").unwrap()["found"], false);
        update_student_profile(&ctx, "dsa", "Intermediate", "knows arrays").unwrap();

        let found = get_student_profile(&ctx, "dsa").unwrap();
        assert_eq!(found["profile"]["level"], "Intermediate");
        assert_eq!(found["profile"]["details"], "knows arrays");
    }

    #[test]
    fn test_details_text() {
        assert_eq!(details_text(Some(&json!("plain"))), "plain");
        assert_eq!(details_text(Some(&json!({"a": 1}))), r#"{"a":1}"#);
        assert_eq!(details_text(None), "");
    }

    #[tokio::test]
    async fn test_update_profile_tool_accepts_object_details() {
        let ctx = testing::logged_in("s1", "alice");
        let mut registry = ToolRegistry::new();
        registry.register(update_student_profile_tool());

        let result: ToolResult = registry
            .execute(
                "update_student_profile",
                json!({"subject": "dsa", "level": "Beginner", "details": {"syllabus": []}}),
                &ctx,
            )
            .await;
        assert!(result.success);

        let profile = ctx.store().get_student_profile("alice", "dsa").unwrap().unwrap();
        assert_eq!(profile.details, r#"{"syllabus":[]}"#);
    }

    #[test]
    fn test_path_details_need_a_path() {
        let ctx = testing::logged_in("s1", "alice");
        assert_eq!(update_learning_path_details(&ctx, "{}").unwrap()["success"], false);

        ctx.store().create_learning_path("alice", "s1", "dsa", "DSA").unwrap();
        assert_eq!(update_learning_path_details(&ctx, r#"{"syllabus": []}"#).unwrap()["success"], true);
        assert!(ctx.store().get_learning_path("s1").unwrap().unwrap().has_syllabus());
    }
}
