//! Tutor Flow Integration Tests
//!
//! Drives the real agent tree with a scripted model: replies are handed out
//! in call order, which is deterministic because agents run sequentially.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tempfile::TempDir;
use tutor_agents::bootstrap::{self, Identity};
use tutor_agents::claude::{ContentBlock, ModelRequest, ModelResponse};
use tutor_agents::{tutors, ModelClient, RunConfig, Runner, TutorApp, TutorStore};

struct Scripted {
    replies: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl Scripted {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(vec![]),
        })
    }

    fn push(&self, reply: ModelResponse) {
        self.replies.lock().push_back(reply);
    }

    fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ModelClient for Scripted {
    async fn generate(&self, request: &ModelRequest) -> anyhow::Result<ModelResponse> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("script exhausted"))
    }
}

fn tool_call(name: &str, input: Value) -> ModelResponse {
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

fn text_and_call(text: &str, name: &str, input: Value) -> ModelResponse {
    let mut reply = tool_call(name, input);
    reply.content.insert(0, ContentBlock::Text { text: text.to_string() });
    reply
}

fn create_app(temp: &TempDir, model: Arc<Scripted>) -> (TutorApp, Arc<TutorStore>) {
    let store = Arc::new(TutorStore::open(&temp.path().join("tutor.db")).expect("Failed to open store"));
    let runner = Arc::new(Runner::new(
        "ai_tutor",
        tutors::root_agent("sonnet"),
        model,
        store.clone(),
        RunConfig::default(),
    ));
    (TutorApp::new(runner, 30), store)
}

fn sign_up_alice(store: &TutorStore) -> Identity {
    bootstrap::sign_up(store, "alice", "Alice").unwrap()
}

#[tokio::test]
async fn test_new_chat_creates_learning_path() {
    let temp = TempDir::new().unwrap();
    let model = Scripted::new();
    let (app, store) = create_app(&temp, model.clone());
    let alice = sign_up_alice(&store);

    model.push(ModelResponse::text("Welcome Alice! What would you like to learn?"));
    let chat = app.open_chat(&alice, None).await.unwrap();
    assert_eq!(
        chat.greeting.as_ref().unwrap().text,
        "Welcome Alice! What would you like to learn?"
    );
    assert_eq!(chat.title(), "AI Tutor Assistant");
    assert!(model.requests()[0].messages[0].text().starts_with("[System] New user/guest 'Alice'"));

    model.push(tool_call(
        "create_learning_path",
        json!({"subject": "dsa", "title": "Data Structures"}),
    ));
    model.push(text_and_call(
        "Your DSA path is ready!",
        "log_conversation",
        json!({"agent_name": "ai_tutor", "query": "I want to learn DSA", "response": "Your DSA path is ready!"}),
    ));
    model.push(ModelResponse::default());

    let reply = app.send(&chat.session_id, "I want to learn DSA").await.unwrap().unwrap();
    assert_eq!(reply.text, "Your DSA path is ready!");
    assert_eq!(reply.display_name(), "AI Tutor");

    let path = store.get_learning_path(&chat.session_id).unwrap().unwrap();
    assert_eq!(path.subject, "dsa");
    assert_eq!(path.title, "Data Structures");
    let profile = store.get_student_profile("alice", "dsa").unwrap().unwrap();
    assert_eq!(profile.level, "Beginner");

    // Logged once by the tool, never for the system notice
    let history = store.get_chat_history("alice", Some(&chat.session_id), 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].query, "I want to learn DSA");

    let progress = app.progress(&alice, &chat.session_id).unwrap().unwrap();
    assert_eq!(progress.level.as_deref(), Some("Beginner"));
    assert!(progress.syllabus.is_some());
}

#[tokio::test]
async fn test_dsa_solver_revises_until_approved() {
    let temp = TempDir::new().unwrap();
    let model = Scripted::new();
    let (app, store) = create_app(&temp, model.clone());
    let alice = sign_up_alice(&store);

    model.push(ModelResponse::text("Hi Alice!"));
    let chat = app.open_chat(&alice, None).await.unwrap();

    // root -> dsa_agent -> dsa_solver (generator, reviewer) x2
    model.push(tool_call("dsa_agent", json!({"request": "Solve two sum"})));
    model.push(tool_call("dsa_solver", json!({"request": "Solve two sum"})));
    model.push(ModelResponse::text("v1: nested loops"));
    model.push(tool_call("review_code", json!({"feedback": "use a hash map"})));
    model.push(ModelResponse::text("v1 needs work"));
    model.push(ModelResponse::text("v2: hash map"));
    model.push(tool_call("exit_loop", json!({})));
    model.push(ModelResponse::text("Final: v2 hash map, O(n)"));
    model.push(ModelResponse::text("Final: v2 hash map, O(n)"));
    model.push(ModelResponse::text("Here is the solution: v2 hash map, O(n)"));

    let reply = app.send(&chat.session_id, "Solve two sum").await.unwrap().unwrap();
    assert_eq!(reply.text, "Here is the solution: v2 hash map, O(n)");

    let requests = model.requests();
    assert_eq!(requests.len(), 11);

    // Second generator call sees the reviewer's feedback and the earlier steps
    let second_generation = &requests[6];
    assert!(second_generation.system.contains("use a hash map"));
    let prompt = second_generation.messages[0].text();
    assert!(prompt.starts_with("Solve two sum\n\n[Previous steps]"));
    assert!(prompt.contains("[code_generator] said: v1: nested loops"));

    // Reviewer sees the latest generated code
    assert!(requests[7].system.contains("v2: hash map"));

    // Sub-agent chatter stays out of the reply and the turn is auto-logged
    let history = store.get_chat_history("alice", Some(&chat.session_id), 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].agent_name.as_deref(), Some("ai_tutor"));

    // Turn-scoped feedback survives, temp keys do not
    let session = app.runner().sessions().get_session(&chat.session_id).unwrap();
    assert_eq!(session.state.get_str("code_feedback").as_deref(), Some("use a hash map"));
    assert!(!session.state.contains("temp:conversation_logged"));
}

#[tokio::test]
async fn test_resumed_chat_replays_history() {
    let temp = TempDir::new().unwrap();
    let session_id;
    {
        let model = Scripted::new();
        let (app, store) = create_app(&temp, model.clone());
        let alice = sign_up_alice(&store);

        model.push(ModelResponse::text("Hello!"));
        session_id = app.open_chat(&alice, None).await.unwrap().session_id;
        model.push(ModelResponse::text("A heap is a tree."));
        app.send(&session_id, "What is a heap?").await.unwrap();
        store
            .create_learning_path("alice", &session_id, "dsa", "DSA")
            .unwrap();
    }

    // Fresh process over the same database
    let model = Scripted::new();
    let (app, store) = create_app(&temp, model.clone());
    let alice = bootstrap::login(&store, "alice").unwrap().unwrap();

    model.push(ModelResponse::text("Welcome back!"));
    let chat = app.open_chat(&alice, Some(&session_id)).await.unwrap();
    assert_eq!(chat.title(), "DSA");
    assert_eq!(chat.history.len(), 1);
    assert!(chat.greeting.is_none());

    let request = &model.requests()[0];
    assert_eq!(request.messages.len(), 3);
    assert_eq!(request.messages[0].text(), "What is a heap?");
    assert_eq!(request.messages[1].text(), "A heap is a tree.");
    assert_eq!(request.messages[2].text(), "[System] User 'Alice' connected.");

    // Opening an already-live chat sends no notice
    app.open_chat(&alice, Some(&session_id)).await.unwrap();
    assert_eq!(model.requests().len(), 1);
}

#[tokio::test]
async fn test_guest_sign_out_removes_data() {
    let temp = TempDir::new().unwrap();
    let model = Scripted::new();
    let (app, store) = create_app(&temp, model.clone());
    let guest = bootstrap::continue_as_guest(&store).unwrap();
    assert!(guest.user_id.starts_with("guest_"));

    model.push(ModelResponse::text("Hi there!"));
    let chat = app.open_chat(&guest, None).await.unwrap();
    model.push(ModelResponse::text("Sure."));
    app.send(&chat.session_id, "Teach me graphs").await.unwrap();
    assert_eq!(store.get_chat_history(&guest.user_id, None, 10).unwrap().len(), 1);

    app.sign_out(&guest).unwrap();
    assert!(store.get_user(&guest.user_id).unwrap().is_none());
    assert!(store.get_chat_history(&guest.user_id, None, 10).unwrap().is_empty());
    assert!(app.runner().sessions().get_session(&chat.session_id).is_none());
}

#[tokio::test]
async fn test_model_failure_surfaces_and_clears_turn_state() {
    let temp = TempDir::new().unwrap();
    let model = Scripted::new();
    let (app, store) = create_app(&temp, model.clone());
    let alice = sign_up_alice(&store);

    // Notice failure is logged, not fatal
    let chat = app.open_chat(&alice, None).await.unwrap();
    assert!(chat.greeting.is_none());

    let err = app.send(&chat.session_id, "hello").await.unwrap_err();
    assert!(err.to_string().contains("script exhausted"));
    assert!(store.get_chat_history("alice", None, 10).unwrap().is_empty());
}
