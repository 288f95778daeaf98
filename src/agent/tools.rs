//! Tools
//!
//! JSON-schema tool definitions plus the three kinds of tool an agent can hold:
//! - Function tools (async closures over the session)
//! - Agent tools (a sub-agent answering a `request`)
//! - Server-side web search (declared to the model, executed by the API)

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::{Agent, AgentInput, InvocationContext, SessionState};
use crate::store::TutorStore;

/// JSON Schema for tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name (snake_case)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: Value,
    /// Required parameter names
    pub required: Vec<String>,
}

impl ToolSchema {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: json!({
                "type": "object",
                "properties": {}
            }),
            required: vec![],
        }
    }

    fn with_param(mut self, name: &str, schema: Value, required: bool) -> Self {
        if let Some(props) = self.parameters.get_mut("properties") {
            props[name] = schema;
        }
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn with_string_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(name, json!({"type": "string", "description": description}), required)
    }

    pub fn with_int_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(name, json!({"type": "integer", "description": description}), required)
    }

    pub fn with_bool_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(name, json!({"type": "boolean", "description": description}), required)
    }

    /// Parameter accepting any JSON value (text or structured)
    pub fn with_any_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(name, json!({"description": description}), required)
    }

    /// Validate parameters against schema
    pub fn validate(&self, params: &Value) -> Result<()> {
        for req in &self.required {
            if params.get(req).map_or(true, |v| v.is_null()) {
                return Err(anyhow!("Missing required parameter: {}", req));
            }
        }

        if let Some(obj) = self.parameters.get("properties").and_then(|p| p.as_object()) {
            for (name, schema) in obj {
                let Some(value) = params.get(name) else { continue };
                if value.is_null() {
                    continue;
                }
                let expected_type = schema.get("type").and_then(|t| t.as_str());
                let valid = match expected_type {
                    Some("string") => value.is_string(),
                    Some("integer") => value.is_i64(),
                    Some("boolean") => value.is_boolean(),
                    Some("object") => value.is_object(),
                    _ => true,
                };
                if !valid {
                    return Err(anyhow!(
                        "Parameter '{}' has wrong type, expected {}",
                        name,
                        expected_type.unwrap_or("unknown")
                    ));
                }
            }
        }

        Ok(())
    }

    /// Format as Claude-compatible tool definition
    pub fn to_claude_format(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": {
                "type": "object",
                "properties": self.parameters.get("properties").cloned().unwrap_or_else(|| json!({})),
                "required": self.required
            }
        })
    }
}

/// Result from tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub success: bool,
    /// Text handed back to the model
    pub content: String,
    pub duration_ms: u64,
}

impl ToolResult {
    pub fn success(tool_name: &str, data: &Value) -> Self {
        let content = match data {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            tool_name: tool_name.to_string(),
            success: true,
            content,
            duration_ms: 0,
        }
    }

    pub fn error(tool_name: &str, error: String) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: false,
            content: error,
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }
}

/// What a tool sees while running
#[derive(Clone)]
pub struct ToolContext {
    pub invocation: InvocationContext,
    /// Agent that called the tool
    pub agent_name: String,
    escalate: Arc<AtomicBool>,
}

impl ToolContext {
    pub fn new(invocation: InvocationContext, agent_name: &str, escalate: Arc<AtomicBool>) -> Self {
        Self {
            invocation,
            agent_name: agent_name.to_string(),
            escalate,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.invocation.state
    }

    pub fn store(&self) -> &TutorStore {
        &self.invocation.store
    }

    pub fn session_id(&self) -> &str {
        &self.invocation.session_id
    }

    /// Ask the enclosing loop agent to stop after this agent finishes
    pub fn escalate(&self) {
        self.escalate.store(true, Ordering::SeqCst);
    }

    pub fn is_escalated(&self) -> bool {
        self.escalate.load(Ordering::SeqCst)
    }
}

/// Something an agent can call
#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> &ToolSchema;

    /// Definition sent to the model
    fn declaration(&self) -> Value {
        self.schema().to_claude_format()
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Type alias for tool handler function
pub type ToolHandler = Arc<dyn Fn(Value, ToolContext) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A tool backed by an async function
pub struct FunctionTool {
    schema: ToolSchema,
    handler: ToolHandler,
}

impl FunctionTool {
    pub fn new<F, Fut>(schema: ToolSchema, handler: F) -> Self
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            schema,
            handler: Arc::new(move |args, ctx| handler(args, ctx).boxed()),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        (self.handler)(args, ctx.clone()).await
    }
}

/// A sub-agent exposed as a tool taking a single `request`
pub struct AgentTool {
    agent: Arc<dyn Agent>,
    schema: ToolSchema,
}

impl AgentTool {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        let schema = ToolSchema::new(agent.name(), agent.description()).with_string_param(
            "request",
            "What the specialist should do, with all relevant context",
            true,
        );
        Self { agent, schema }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let request = args
            .get("request")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let child = ctx.invocation.child()?;
        debug!("{} -> {} (depth {})", ctx.agent_name, self.agent.name(), child.depth());

        let output = self.agent.run(&child, AgentInput::text(request)).await?;
        Ok(json!({ "result": output.text }))
    }
}

/// Server-side web search, executed by the model provider
pub struct WebSearchTool {
    schema: ToolSchema,
    max_uses: u32,
}

impl WebSearchTool {
    pub fn new(max_uses: u32) -> Self {
        Self {
            schema: ToolSchema::new("web_search", "Search the web"),
            max_uses,
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn declaration(&self) -> Value {
        json!({
            "type": "web_search_20250305",
            "name": "web_search",
            "max_uses": self.max_uses
        })
    }

    async fn call(&self, _args: Value, _ctx: &ToolContext) -> Result<Value> {
        Err(anyhow!("web_search runs on the model provider, not locally"))
    }
}

/// Ordered set of tools held by one agent
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any existing tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name.clone();
        if let Some(pos) = self.tools.iter().position(|t| t.schema().name == name) {
            warn!("Replacing tool: {}", name);
            self.tools[pos] = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.schema().name == name)
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.schema().name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Format all tools for Claude API
    pub fn to_claude_format(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.declaration()).collect()
    }

    /// Execute a single tool call. Failures come back as error results so the
    /// model can see and react to them.
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::error(name, format!("Unknown tool: {}", name));
        };

        if let Err(e) = tool.schema().validate(&args) {
            return ToolResult::error(name, e.to_string());
        }

        let start = Instant::now();
        let result = match tool.call(args, ctx).await {
            Ok(data) => ToolResult::success(name, &data),
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                ToolResult::error(name, e.to_string())
            }
        };
        result.with_duration(start.elapsed().as_millis() as u64)
    }
}
