//! Loop agent
//!
//! Runs its sub-agents in order, repeatedly, until one of them escalates or
//! the iteration limit is reached. Later sub-agents see what earlier ones said.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{Agent, AgentInput, AgentOutput, InvocationContext};

pub struct LoopAgent {
    name: String,
    description: String,
    sub_agents: Vec<Arc<dyn Agent>>,
    max_iterations: usize,
}

impl LoopAgent {
    pub fn new(name: &str, max_iterations: usize) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            sub_agents: vec![],
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_sub_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.sub_agents.push(agent);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}

/// Original request followed by what each step has said so far
fn compose_prompt(request: &str, transcript: &[(String, String)]) -> String {
    if transcript.is_empty() {
        return request.to_string();
    }

    let mut prompt = format!("{}\n\n[Previous steps]", request);
    for (author, text) in transcript {
        prompt.push_str(&format!("\n[{}] said: {}", author, text));
    }
    prompt
}

#[async_trait]
impl Agent for LoopAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &InvocationContext, input: AgentInput) -> Result<AgentOutput> {
        let request = input.latest_text();
        let mut transcript: Vec<(String, String)> = Vec::new();
        let mut last_text = String::new();

        for iteration in 1..=self.max_iterations {
            for agent in &self.sub_agents {
                let prompt = compose_prompt(&request, &transcript);
                let output = agent.run(ctx, AgentInput::text(prompt)).await?;

                if !output.text.trim().is_empty() {
                    transcript.push((agent.name().to_string(), output.text.clone()));
                    last_text = output.text;
                }

                if output.escalated {
                    info!("{} finished on iteration {} ({} escalated)", self.name, iteration, agent.name());
                    return Ok(AgentOutput {
                        text: last_text,
                        escalated: false,
                    });
                }
            }
        }

        info!("{} stopped after {} iterations", self.name, self.max_iterations);
        Ok(AgentOutput {
            text: last_text,
            escalated: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{EventSink, RunConfig, SessionState};
    use crate::claude::{ModelClient, ModelRequest, ModelResponse};
    use crate::store::TutorStore;
    use parking_lot::Mutex;

    /// Answers with a fixed text, escalating on a chosen call
    struct Step {
        name: String,
        escalate_on: Option<usize>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Agent for Step {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            ""
        }

        async fn run(&self, _ctx: &InvocationContext, input: AgentInput) -> Result<AgentOutput> {
            let mut seen = self.seen.lock();
            seen.push(input.latest_text());
            let call = seen.len();
            Ok(AgentOutput {
                text: format!("{} #{}", self.name, call),
                escalated: self.escalate_on == Some(call),
            })
        }
    }

    struct NoModel;

    #[async_trait]
    impl ModelClient for NoModel {
        async fn generate(&self, _request: &ModelRequest) -> Result<ModelResponse> {
            anyhow::bail!("not used")
        }
    }

    fn step(name: &str, escalate_on: Option<usize>) -> Arc<Step> {
        Arc::new(Step {
            name: name.to_string(),
            escalate_on,
            seen: Mutex::new(vec![]),
        })
    }

    fn context() -> InvocationContext {
        InvocationContext::new(
            "s1",
            "alice",
            SessionState::default(),
            Arc::new(TutorStore::open_in_memory().unwrap()),
            Arc::new(NoModel),
            RunConfig::default(),
            EventSink::new(),
        )
    }

    #[tokio::test]
    async fn test_stops_on_escalation() {
        let generator = step("code_generator", None);
        let reviewer = step("code_reviewer", Some(1));
        let agent = LoopAgent::new("dsa_solver", 2)
            .with_sub_agent(generator.clone())
            .with_sub_agent(reviewer.clone());

        let out = agent.run(&context(), AgentInput::text("two sum")).await.unwrap();

        assert_eq!(out.text, "code_reviewer #1");
        assert!(!out.escalated);
        assert_eq!(generator.seen.lock().len(), 1);
        assert!(reviewer.seen.lock()[0].contains("[code_generator] said: code_generator #1"));
    }

    #[tokio::test]
    async fn test_runs_to_iteration_limit() {
        let generator = step("code_generator", None);
        let reviewer = step("code_reviewer", None);
        let agent = LoopAgent::new("dsa_solver", 2)
            .with_sub_agent(generator.clone())
            .with_sub_agent(reviewer.clone());

        let out = agent.run(&context(), AgentInput::text("two sum")).await.unwrap();

        assert_eq!(out.text, "code_reviewer #2");
        assert_eq!(generator.seen.lock().len(), 2);
        assert!(generator.seen.lock()[1].starts_with("two sum\n\n[Previous steps]"));
    }

    #[test]
    fn test_compose_prompt_without_history() {
        assert_eq!(compose_prompt("hi", &[]), "hi");
    }
}
