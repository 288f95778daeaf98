//! LLM agent
//!
//! Instruction + tools + model. Each run calls the model, executes any tool
//! calls it asks for, feeds the results back, and repeats until the model
//! answers in plain text or the round limit is hit.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::tools::{Tool, ToolContext, ToolRegistry};
use super::{inject_state, Agent, AgentInput, AgentOutput, Event, InvocationContext};
use crate::claude::{ChatMessage, ContentBlock, ModelRequest, Role};

/// An agent driven by a language model
pub struct LlmAgent {
    name: String,
    description: String,
    model: String,
    instruction: String,
    tools: ToolRegistry,
    output_key: Option<String>,
}

impl LlmAgent {
    pub fn new(name: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            model: model.to_string(),
            instruction: String::new(),
            tools: ToolRegistry::new(),
            output_key: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Instruction template; `{key}` placeholders are filled from state
    pub fn with_instruction(mut self, instruction: &str) -> Self {
        self.instruction = instruction.to_string();
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    /// Store the final answer in state under `key`
    pub fn with_output_key(mut self, key: &str) -> Self {
        self.output_key = Some(key.to_string());
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &InvocationContext, input: AgentInput) -> Result<AgentOutput> {
        let tools = self.tools.to_claude_format();
        let escalate = Arc::new(AtomicBool::new(false));
        let tool_ctx = ToolContext::new(ctx.clone(), &self.name, escalate.clone());

        let mut messages = input.messages;
        let mut final_text = String::new();
        let mut rounds = 0;

        loop {
            // Tools may have written state since the last round
            let request = ModelRequest {
                model: self.model.clone(),
                system: inject_state(&self.instruction, &ctx.state),
                messages: messages.clone(),
                tools: tools.clone(),
                max_tokens: ctx.config.max_tokens,
            };
            let response = ctx.model.generate(&request).await?;

            let text = response.joined_text();
            if !text.trim().is_empty() {
                if ctx.is_top_level() {
                    ctx.events.emit(Event::text(&self.name, &text));
                }
                final_text = text;
            }

            let calls: Vec<(String, String, serde_json::Value)> = response
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if calls.is_empty() {
                break;
            }

            if rounds >= ctx.config.max_tool_rounds {
                warn!("{} hit the tool round limit ({})", self.name, ctx.config.max_tool_rounds);
                break;
            }
            rounds += 1;

            messages.push(ChatMessage {
                role: Role::Assistant,
                content: response.replayable_content(),
            });

            let mut results = Vec::with_capacity(calls.len());
            for (id, name, args) in calls {
                debug!("{} calls {} with {}", self.name, name, args);
                ctx.events.emit(Event::tool_call(&self.name, &name));

                let result = self.tools.execute(&name, args, &tool_ctx).await;
                ctx.events.emit(Event::tool_result(&self.name, &name, result.success));

                results.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    content: result.content,
                    is_error: !result.success,
                });
            }
            messages.push(ChatMessage {
                role: Role::User,
                content: results,
            });
        }

        if let Some(key) = &self.output_key {
            if !final_text.trim().is_empty() {
                ctx.state.set(key, final_text.clone());
            }
        }

        let escalated = tool_ctx.is_escalated();
        if escalated {
            info!("{} escalated", self.name);
        }

        Ok(AgentOutput {
            text: final_text,
            escalated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::{FunctionTool, ToolSchema};
    use crate::agent::{EventKind, EventSink, RunConfig, SessionState};
    use crate::claude::{ModelClient, ModelResponse};
    use crate::store::TutorStore;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Replays canned responses and records requests
    struct Scripted {
        replies: Mutex<VecDeque<ModelResponse>>,
        requests: Mutex<Vec<ModelRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<ModelResponse>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl crate::claude::ModelClient for Scripted {
        async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse> {
            self.requests.lock().push(request.clone());
            Ok(self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| ModelResponse::text("done")))
        }
    }

    fn tool_call(name: &str, input: serde_json::Value) -> ModelResponse {
        ModelResponse {
            content: vec![ContentBlock::ToolUse {
                id: format!("toolu_{}", name),
                name: name.to_string(),
                input,
            }],
            stop_reason: Some("tool_use".to_string()),
            ..Default::default()
        }
    }

    fn context(model: Arc<dyn ModelClient>, state: SessionState) -> InvocationContext {
        let store = Arc::new(TutorStore::open_in_memory().unwrap());
        InvocationContext::new("s1", "alice", state, store, model, RunConfig::default(), EventSink::new())
    }

    #[tokio::test]
    async fn test_tool_loop_and_output_key() {
        let model = Scripted::new(vec![
            tool_call("exit_loop", json!({})),
            ModelResponse::text("final code"),
        ]);
        let state = SessionState::default();
        state.set("generated_code", "x = 1");
        let ctx = context(model.clone(), state.clone());

        let agent = LlmAgent::new("code_reviewer", "sonnet")
            .with_instruction("Review: {generated_code}")
            .with_output_key("reviewed_code")
            .with_tool(Arc::new(FunctionTool::new(
                ToolSchema::new("exit_loop", "Stop"),
                |_args, ctx| async move {
                    ctx.escalate();
                    Ok(json!({}))
                },
            )));

        let out = agent.run(&ctx, AgentInput::text("go")).await.unwrap();

        assert_eq!(out.text, "final code");
        assert!(out.escalated);
        assert_eq!(state.get_str("reviewed_code").as_deref(), Some("final code"));

        let requests = model.requests.lock();
        assert_eq!(requests[0].system, "Review: x = 1");
        // go, tool_use, tool_result
        assert_eq!(requests[1].messages.len(), 3);
        assert!(matches!(
            requests[1].messages[2].content[0],
            ContentBlock::ToolResult { is_error: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_tool_reported_to_model() {
        let model = Scripted::new(vec![tool_call("nope", json!({})), ModelResponse::text("sorry")]);
        let ctx = context(model.clone(), SessionState::default());

        let out = LlmAgent::new("a", "sonnet")
            .run(&ctx, AgentInput::text("hi"))
            .await
            .unwrap();

        assert_eq!(out.text, "sorry");
        let requests = model.requests.lock();
        assert!(matches!(
            &requests[1].messages[2].content[0],
            ContentBlock::ToolResult { is_error: true, content, .. } if content.contains("Unknown tool")
        ));
    }

    #[tokio::test]
    async fn test_round_limit_stops_runaway_tools() {
        let replies = (0..20).map(|_| tool_call("nope", json!({}))).collect();
        let model = Scripted::new(replies);
        let ctx = context(model.clone(), SessionState::default());

        let out = LlmAgent::new("a", "sonnet")
            .run(&ctx, AgentInput::text("hi"))
            .await
            .unwrap();

        assert!(out.text.is_empty());
        assert_eq!(model.requests.lock().len(), RunConfig::default().max_tool_rounds + 1);
    }

    #[tokio::test]
    async fn test_top_level_emits_text_events() {
        let model = Scripted::new(vec![ModelResponse::text("Hello!")]);
        let ctx = context(model, SessionState::default());

        LlmAgent::new("ai_tutor", "sonnet")
            .run(&ctx, AgentInput::text("hi"))
            .await
            .unwrap();

        let events = ctx.events.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Text);
        assert_eq!(events[0].author, "ai_tutor");
    }

    #[tokio::test]
    async fn test_state_written_by_tool_reaches_next_round() {
        let model = Scripted::new(vec![
            tool_call("fetch_docs", json!({})),
            ModelResponse::text("Hooks let components keep state."),
        ]);
        let ctx = context(model.clone(), SessionState::default());

        let agent = LlmAgent::new("developer_agent", "sonnet")
            .with_instruction("Docs: {temp:parsed_documentation?}")
            .with_tool(Arc::new(FunctionTool::new(
                ToolSchema::new("fetch_docs", "Fetch"),
                |_args, ctx| async move {
                    ctx.state().set("temp:parsed_documentation", "PAGE TEXT ABOUT HOOKS");
                    Ok(json!({"success": true}))
                },
            )));

        agent.run(&ctx, AgentInput::text("explain hooks")).await.unwrap();

        let requests = model.requests.lock();
        assert_eq!(requests[0].system, "Docs: ");
        assert_eq!(requests[1].system, "Docs: PAGE TEXT ABOUT HOOKS");
    }
}
