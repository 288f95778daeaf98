//! Session state
//!
//! A flat JSON map shared by every agent and tool in a session. Keys may carry
//! a scope prefix (`app:`, `user:`, `temp:`); `temp:` keys live for a single
//! turn and are dropped by the runner when the turn ends.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Prefix for keys cleared at the end of every turn
pub const TEMP_PREFIX: &str = "temp:";

/// Well-known state keys
pub mod keys {
    pub const CURRENT_USER_ID: &str = "current_user_id";
    pub const AUTHENTICATED: &str = "authenticated";
    pub const IS_GUEST: &str = "is_guest";
    pub const SESSION_ID: &str = "session_id";
    pub const CODE_FEEDBACK: &str = "code_feedback";
    pub const PARSED_DOCUMENTATION: &str = "temp:parsed_documentation";
    /// Set when the root agent logged the turn itself
    pub const CONVERSATION_LOGGED: &str = "temp:conversation_logged";

    /// `user:<id>_name`
    pub fn user_name(user_id: &str) -> String {
        format!("user:{}_name", user_id)
    }
}

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{+([^{}]*)\}+").unwrap());

static STATE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(?:app|user|temp):)?[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Shared, cloneable handle to a session's state
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    inner: Arc<RwLock<Map<String, Value>>>,
}

impl SessionState {
    pub fn new(initial: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().get(key).cloned()
    }

    /// String value, ignoring nulls and empty strings
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.inner.read().get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.inner
            .read()
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.inner.write().insert(key.to_string(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().remove(key)
    }

    /// Copy of the whole map
    pub fn snapshot(&self) -> Map<String, Value> {
        self.inner.read().clone()
    }

    /// Drop every `temp:` key, returning how many were removed
    pub fn clear_temp(&self) -> usize {
        let mut map = self.inner.write();
        let before = map.len();
        map.retain(|k, _| !k.starts_with(TEMP_PREFIX));
        before - map.len()
    }

    /// Identified user for this session, if any
    pub fn current_user_id(&self) -> Option<String> {
        self.get_str(keys::CURRENT_USER_ID)
    }
}

/// Substitute `{key}` placeholders in an instruction with state values.
///
/// Only identifier-like names (optionally scoped with `app:`, `user:` or
/// `temp:`) are substituted, so JSON examples in instructions survive
/// untouched. A trailing `?` marks a placeholder optional: missing optional
/// keys become empty, missing required keys are left as written.
pub fn inject_state(template: &str, state: &SessionState) -> String {
    let map = state.inner.read();

    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            let whole = caps[0].to_string();
            let inner = caps[1].trim();
            let (name, optional) = match inner.strip_suffix('?') {
                Some(name) => (name, true),
                None => (inner, false),
            };

            if !STATE_KEY_RE.is_match(name) {
                return whole;
            }

            match map.get(name) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None if optional => String::new(),
                Some(other) => other.to_string(),
                None => {
                    warn!("Instruction references missing state key '{}'", name);
                    whole
                }
            }
        })
        .into_owned()
}
