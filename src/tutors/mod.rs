//! Tutor agents
//!
//! The agent tree behind the AI Tutor:
//!
//! ```text
//! ai_tutor
//! ├── account_agent
//! ├── dsa_agent
//! │   ├── dsa_tutor
//! │   └── dsa_solver (loop: code_generator → code_reviewer)
//! ├── developer_agent ── search_agent
//! ├── system_design_agent ── search_agent
//! └── general_agent ── search_agent
//! ```
//!
//! Specialists are exposed to their parent as tools; the model picks the route.

pub mod prompts;

use std::sync::Arc;

use crate::agent::{Agent, AgentTool, LlmAgent, LoopAgent, Tool, WebSearchTool};
use crate::tools::{account, conversation, docs, paths, profile, review};

pub const ROOT_AGENT_NAME: &str = "ai_tutor";

/// Review rounds for generated solutions
pub const DSA_SOLVER_MAX_ITERATIONS: usize = 2;

/// Web searches allowed per search agent call
pub const MAX_WEB_SEARCHES: u32 = 5;

fn as_tool(agent: Arc<dyn Agent>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(agent))
}

pub fn search_agent(model: &str) -> Arc<LlmAgent> {
    Arc::new(
        LlmAgent::new("search_agent", model)
            .with_description("Searches the web and returns relevant, up-to-date information")
            .with_instruction(prompts::SEARCH)
            .with_tool(Arc::new(WebSearchTool::new(MAX_WEB_SEARCHES))),
    )
}

pub fn account_agent(model: &str) -> Arc<LlmAgent> {
    Arc::new(
        LlmAgent::new("account_agent", model)
            .with_description("Handles sign-in: existing users, new accounts and guest sessions")
            .with_instruction(prompts::ACCOUNT)
            .with_tool(account::check_user_tool())
            .with_tool(account::create_user_tool())
            .with_tool(account::delete_guest_user_tool())
            .with_output_key("account_status"),
    )
}

pub fn dsa_tutor(model: &str) -> Arc<LlmAgent> {
    Arc::new(
        LlmAgent::new("dsa_tutor", model)
            .with_description("Explains DSA concepts, builds roadmaps and tracks progress")
            .with_instruction(prompts::DSA_TUTOR)
            .with_tool(profile::get_student_profile_tool())
            .with_tool(profile::update_student_profile_tool())
            .with_tool(profile::update_learning_path_details_tool()),
    )
}

pub fn code_generator(model: &str) -> Arc<LlmAgent> {
    Arc::new(
        LlmAgent::new("code_generator", model)
            .with_description("Writes optimised DSA solutions")
            .with_instruction(prompts::CODE_GENERATOR)
            .with_tool(profile::get_student_profile_tool())
            .with_output_key("generated_code"),
    )
}

pub fn code_reviewer(model: &str) -> Arc<LlmAgent> {
    Arc::new(
        LlmAgent::new("code_reviewer", model)
            .with_description("Reviews generated solutions for correctness and efficiency")
            .with_instruction(prompts::CODE_REVIEWER)
            .with_tool(review::review_code_tool())
            .with_tool(review::exit_loop_tool())
            .with_output_key("reviewed_code"),
    )
}

pub fn dsa_solver(model: &str) -> Arc<LoopAgent> {
    Arc::new(
        LoopAgent::new("dsa_solver", DSA_SOLVER_MAX_ITERATIONS)
            .with_description("Solves DSA coding problems with iterative code review")
            .with_sub_agent(code_generator(model))
            .with_sub_agent(code_reviewer(model)),
    )
}

pub fn dsa_agent(model: &str) -> Arc<LlmAgent> {
    Arc::new(
        LlmAgent::new("dsa_agent", model)
            .with_description("Specialist for data structures and algorithms: concepts and coding problems")
            .with_instruction(prompts::DSA_ROUTER)
            .with_tool(as_tool(dsa_tutor(model)))
            .with_tool(as_tool(dsa_solver(model))),
    )
}

pub fn developer_agent(model: &str, search: Arc<dyn Agent>) -> Arc<LlmAgent> {
    Arc::new(
        LlmAgent::new("developer_agent", model)
            .with_description("Teaches web, mobile and desktop development")
            .with_instruction(prompts::DEVELOPER)
            .with_tool(as_tool(search))
            .with_tool(docs::parse_documentation_tool())
            .with_tool(profile::get_student_profile_tool())
            .with_tool(profile::update_student_profile_tool())
            .with_tool(profile::update_learning_path_details_tool()),
    )
}

pub fn system_design_agent(model: &str, search: Arc<dyn Agent>) -> Arc<LlmAgent> {
    Arc::new(
        LlmAgent::new("system_design_agent", model)
            .with_description("Teaches system architecture, databases and cloud infrastructure")
            .with_instruction(prompts::SYSTEM_DESIGN)
            .with_tool(as_tool(search))
            .with_tool(profile::get_student_profile_tool())
            .with_tool(profile::update_student_profile_tool())
            .with_tool(profile::update_learning_path_details_tool()),
    )
}

pub fn general_agent(model: &str, search: Arc<dyn Agent>) -> Arc<LlmAgent> {
    Arc::new(
        LlmAgent::new("general_agent", model)
            .with_description("Answers topics outside the specialist areas using web search")
            .with_instruction(prompts::GENERAL)
            .with_tool(as_tool(search)),
    )
}

/// Build the whole agent tree
pub fn root_agent(model: &str) -> Arc<LlmAgent> {
    let search: Arc<dyn Agent> = search_agent(model);

    Arc::new(
        LlmAgent::new(ROOT_AGENT_NAME, model)
            .with_description("AI Tutor coordinator")
            .with_instruction(prompts::ROOT)
            .with_tool(as_tool(account_agent(model)))
            .with_tool(as_tool(dsa_agent(model)))
            .with_tool(as_tool(developer_agent(model, search.clone())))
            .with_tool(as_tool(system_design_agent(model, search.clone())))
            .with_tool(as_tool(general_agent(model, search)))
            .with_tool(conversation::log_conversation_tool())
            .with_tool(conversation::get_user_history_tool())
            .with_tool(paths::create_learning_path_tool())
            .with_tool(paths::get_learning_paths_tool())
            .with_tool(paths::get_current_learning_path_context_tool()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_tools() {
        let root = root_agent("sonnet");
        assert_eq!(root.name(), ROOT_AGENT_NAME);
        assert_eq!(
            root.tools().list(),
            vec![
                "account_agent",
                "dsa_agent",
                "developer_agent",
                "system_design_agent",
                "general_agent",
                "log_conversation",
                "get_user_history",
                "create_learning_path",
                "get_learning_paths",
                "get_current_learning_path_context",
            ]
        );
    }

    #[test]
    fn test_agent_tools_take_request() {
        let root = root_agent("sonnet");
        let decl = root.tools().get("dsa_agent").unwrap().declaration();
        assert_eq!(decl["input_schema"]["required"][0], "request");
    }

    #[test]
    fn test_search_agent_uses_native_search() {
        let search = search_agent("haiku");
        let decls = search.tools().to_claude_format();
        assert_eq!(decls[0]["type"], "web_search_20250305");
        assert_eq!(search.model(), "haiku");
    }

    #[test]
    fn test_specialist_tool_sets() {
        assert_eq!(account_agent("sonnet").tools().list(), vec!["check_user", "create_user", "delete_guest_user"]);
        assert_eq!(code_reviewer("sonnet").tools().list(), vec!["review_code", "exit_loop"]);
        assert_eq!(dsa_agent("sonnet").tools().list(), vec!["dsa_tutor", "dsa_solver"]);
        assert_eq!(dsa_solver("sonnet").max_iterations(), DSA_SOLVER_MAX_ITERATIONS);
        assert!(developer_agent("sonnet", search_agent("sonnet"))
            .tools()
            .list()
            .contains(&"parse_documentation"));
    }
}
