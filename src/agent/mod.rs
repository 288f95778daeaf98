//! Agent Runtime
//!
//! Executes tutor agents against a language model:
//! - LLM agents (instruction + tools, tool-use loop until a text answer)
//! - Loop agents (generate → review, bounded, exited by escalation)
//! - Agents as tools (a specialist is just another tool to its parent)
//! - Session state shared by every agent and tool in a turn
//!
//! The model decides routing; this module only runs what it asks for.

pub mod llm;
pub mod loop_agent;
pub mod runner;
pub mod session;
pub mod state;
pub mod tools;

pub use llm::LlmAgent;
pub use loop_agent::LoopAgent;
pub use runner::Runner;
pub use session::{Session, SessionService};
pub use state::{inject_state, keys, SessionState};
pub use tools::{AgentTool, FunctionTool, Tool, ToolContext, ToolRegistry, ToolResult, ToolSchema, WebSearchTool};

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::claude::{ChatMessage, ModelClient};
use crate::store::TutorStore;

/// Nesting limit for agents invoking agents
pub const MAX_AGENT_DEPTH: usize = 6;

/// What kind of thing happened during a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Text produced by the top-level agent
    Text,
    /// An agent asked for a tool (or a sub-agent)
    ToolCall,
    /// A tool finished
    ToolResult,
}

/// A single event in a turn
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub author: String,
    pub kind: EventKind,
    pub text: String,
    pub timestamp: i64,
}

impl Event {
    fn new(author: &str, kind: EventKind, text: String) -> Self {
        Self {
            author: author.to_string(),
            kind,
            text,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn text(author: &str, text: &str) -> Self {
        Self::new(author, EventKind::Text, text.to_string())
    }

    pub fn tool_call(author: &str, tool: &str) -> Self {
        Self::new(author, EventKind::ToolCall, tool.to_string())
    }

    pub fn tool_result(author: &str, tool: &str, success: bool) -> Self {
        let status = if success { "ok" } else { "error" };
        Self::new(author, EventKind::ToolResult, format!("{}: {}", tool, status))
    }
}

/// Collects the events of one turn and optionally streams them
#[derive(Clone, Default)]
pub struct EventSink {
    log: Arc<Mutex<Vec<Event>>>,
    tx: Option<mpsc::UnboundedSender<Event>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streaming(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            log: Arc::default(),
            tx: Some(tx),
        }
    }

    pub fn emit(&self, event: Event) {
        if let Some(tx) = &self.tx {
            // Receiver gone just means nobody is watching
            let _ = tx.send(event.clone());
        }
        self.log.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().clone()
    }
}

/// Limits applied to every model call in a turn
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub max_tokens: usize,
    /// Model round trips an agent may spend on tool calls
    pub max_tool_rounds: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            max_tool_rounds: 8,
        }
    }
}

/// Everything an agent needs while handling one turn
#[derive(Clone)]
pub struct InvocationContext {
    pub session_id: String,
    pub user_id: String,
    pub state: SessionState,
    pub store: Arc<TutorStore>,
    pub model: Arc<dyn ModelClient>,
    pub config: RunConfig,
    pub events: EventSink,
    depth: usize,
}

impl InvocationContext {
    pub fn new(
        session_id: &str,
        user_id: &str,
        state: SessionState,
        store: Arc<TutorStore>,
        model: Arc<dyn ModelClient>,
        config: RunConfig,
        events: EventSink,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            state,
            store,
            model,
            config,
            events,
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True for the agent talking to the user directly
    pub fn is_top_level(&self) -> bool {
        self.depth == 0
    }

    /// Context for a sub-agent invoked as a tool
    pub fn child(&self) -> Result<Self> {
        if self.depth + 1 > MAX_AGENT_DEPTH {
            bail!("Agent nesting deeper than {} levels", MAX_AGENT_DEPTH);
        }
        let mut child = self.clone();
        child.depth += 1;
        Ok(child)
    }
}

/// Input handed to an agent
#[derive(Debug, Clone)]
pub struct AgentInput {
    pub messages: Vec<ChatMessage>,
}

impl AgentInput {
    /// A single user message
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user_text(text)],
        }
    }

    /// Prior conversation followed by a new user message
    pub fn with_history(history: Vec<ChatMessage>, text: impl Into<String>) -> Self {
        let mut messages = history;
        messages.push(ChatMessage::user_text(text));
        Self { messages }
    }

    /// Text of the latest user message
    pub fn latest_text(&self) -> String {
        self.messages.last().map(|m| m.text()).unwrap_or_default()
    }
}

/// What an agent produced
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    /// Final text answer (may be empty)
    pub text: String,
    /// A tool asked the enclosing loop to stop
    pub escalated: bool,
}

/// An agent: something that turns input into text, possibly calling tools
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn run(&self, ctx: &InvocationContext, input: AgentInput) -> Result<AgentOutput>;
}
