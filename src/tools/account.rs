//! Account tools: look up, create and remove users

use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::str_arg;
use crate::agent::{keys, FunctionTool, SessionState, Tool, ToolContext, ToolSchema};
use crate::store::{is_guest_id, StoreError};

/// Fresh `guest_xxxxxx` identifier
pub fn new_guest_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("guest_{}", &hex[..6])
}

/// Guest requests never reuse a caller-chosen ID
fn is_guest_request(user_id: &str) -> bool {
    user_id.eq_ignore_ascii_case("guest") || user_id.starts_with("guest_")
}

/// Mark `user_id` as the authenticated user of this session
pub fn load_user_into_state(state: &SessionState, user_id: &str, name: &str) {
    state.set(&keys::user_name(user_id), name);
    state.set(keys::CURRENT_USER_ID, user_id);
    state.set(keys::AUTHENTICATED, true);
}

pub fn check_user(ctx: &ToolContext, user_id: &str) -> Result<Value> {
    match ctx.store().get_user(user_id)? {
        Some(user) => {
            load_user_into_state(ctx.state(), &user.user_id, &user.name);
            Ok(json!({
                "exists": true,
                "user_id": user.user_id,
                "name": user.name,
                "message": format!("User {} found and loaded", user.name),
            }))
        }
        None => Ok(json!({
            "exists": false,
            "user_id": user_id,
            "message": "User not found in database",
        })),
    }
}

pub fn create_user(ctx: &ToolContext, user_id: &str, name: &str) -> Result<Value> {
    let user_id = if is_guest_request(user_id) {
        new_guest_id()
    } else {
        user_id.to_string()
    };

    match ctx.store().create_user(&user_id, name) {
        Ok(user) => {
            load_user_into_state(ctx.state(), &user.user_id, &user.name);
            if user.is_guest() {
                ctx.state().set(keys::IS_GUEST, true);
            }
            Ok(json!({
                "success": true,
                "user_id": user.user_id,
                "name": user.name,
                "message": format!("Account created successfully for {} (ID: {})", user.name, user.user_id),
            }))
        }
        Err(e @ StoreError::UserExists(_)) => Ok(json!({
            "success": false,
            "message": format!("Failed to create account: {}", e),
        })),
        Err(e) => Err(e.into()),
    }
}

pub fn delete_guest_user(ctx: &ToolContext, user_id: &str) -> Result<Value> {
    if !is_guest_id(user_id) {
        return Ok(json!({"success": false, "message": "Can only delete guest users"}));
    }

    let deleted = ctx.store().delete_user(user_id)?;
    if deleted {
        info!("Guest {} removed", user_id);
    }
    Ok(json!({
        "success": deleted,
        "message": if deleted {
            format!("Guest user {} deleted", user_id)
        } else {
            format!("Guest user {} not found", user_id)
        },
    }))
}

pub fn check_user_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new(
        "check_user",
        "Check whether a user exists and load their profile into the session",
    )
    .with_string_param("user_id", "The user's ID", true);

    Arc::new(FunctionTool::new(schema, |args, ctx| async move {
        check_user(&ctx, str_arg(&args, "user_id"))
    }))
}

pub fn create_user_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new(
        "create_user",
        "Create a new user account. Use user_id 'guest' for a temporary guest account.",
    )
    .with_string_param("user_id", "Desired user ID", true)
    .with_string_param("name", "Display name", true);

    Arc::new(FunctionTool::new(schema, |args, ctx| async move {
        create_user(&ctx, str_arg(&args, "user_id"), str_arg(&args, "name"))
    }))
}

pub fn delete_guest_user_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new("delete_guest_user", "Delete a temporary guest account")
        .with_string_param("user_id", "Guest user ID (guest_xxxxxx)", true);

    Arc::new(FunctionTool::new(schema, |args, ctx| async move {
        delete_guest_user(&ctx, str_arg(&args, "user_id"))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;

    #[test]
    fn test_guest_id_shape() {
        let id = new_guest_id();
        assert_eq!(id.len(), "guest_".len() + 6);
        assert!(crate::response::extract_guest_id(&id).is_some());
    }

    #[test]
    fn test_check_user_loads_state() {
        let ctx = testing::context("s1");
        ctx.store().create_user("alice", "Alice").unwrap();

        let result = check_user(&ctx, "alice").unwrap();
        assert_eq!(result["exists"], true);
        assert_eq!(ctx.state().current_user_id().as_deref(), Some("alice"));
        assert!(ctx.state().get_bool(keys::AUTHENTICATED));
        assert_eq!(ctx.state().get_str("user:alice_name").as_deref(), Some("Alice"));

        let missing = check_user(&ctx, "bob").unwrap();
        assert_eq!(missing["exists"], false);
    }

    #[test]
    fn test_create_user_and_duplicate() {
        let ctx = testing::context("s1");

        let created = create_user(&ctx, "alice", "Alice").unwrap();
        assert_eq!(created["success"], true);
        assert!(!ctx.state().get_bool(keys::IS_GUEST));

        let dup = create_user(&ctx, "alice", "Other").unwrap();
        assert_eq!(dup["success"], false);
        assert!(dup["message"].as_str().unwrap().contains("already exists"));
    }

    #[test]
    fn test_create_guest_rewrites_id() {
        let ctx = testing::context("s1");

        let result = create_user(&ctx, "GUEST", "Guest User").unwrap();
        let id = result["user_id"].as_str().unwrap();
        assert!(id.starts_with("guest_"));
        assert_ne!(id, "guest_");
        assert!(ctx.state().get_bool(keys::IS_GUEST));

        let chosen = create_user(&ctx, "guest_abcdef", "Guest User").unwrap();
        assert_ne!(chosen["user_id"], "guest_abcdef");
    }

    #[test]
    fn test_delete_guest_only() {
        let ctx = testing::context("s1");
        ctx.store().create_user("alice", "Alice").unwrap();
        ctx.store().create_user("guest_123abc", "Guest User").unwrap();

        assert_eq!(delete_guest_user(&ctx, "alice").unwrap()["success"], false);
        assert!(ctx.store().get_user("alice").unwrap().is_some());

        assert_eq!(delete_guest_user(&ctx, "guest_123abc").unwrap()["success"], true);
        assert!(ctx.store().get_user("guest_123abc").unwrap().is_none());
    }
}
