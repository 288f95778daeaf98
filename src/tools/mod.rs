//! Tutor Tools
//!
//! Functions the tutor agents can call. Each takes JSON arguments and the
//! calling agent's `ToolContext` and returns a JSON object. Expected failures
//! (nobody logged in, unknown session, refused delete) come back as JSON for
//! the model to read; database failures propagate as errors.

pub mod account;
pub mod conversation;
pub mod docs;
pub mod paths;
pub mod profile;
pub mod review;

use serde_json::Value;

/// String argument, empty when missing
pub(crate) fn str_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(|v| v.as_str()).unwrap_or_default()
}

/// Optional non-empty string argument
pub(crate) fn opt_str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
