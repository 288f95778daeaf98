//! Terminal Front End Tests
//!
//! Feeds typed lines into the REPL and checks what it prints.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tutor_agents::claude::{ModelRequest, ModelResponse};
use tutor_agents::cli::Repl;
use tutor_agents::{tutors, ModelClient, RunConfig, Runner, TutorApp, TutorStore};

/// Canned replies; a rate-limit error once they run out
struct Canned(Mutex<VecDeque<&'static str>>);

#[async_trait]
impl ModelClient for Canned {
    async fn generate(&self, _request: &ModelRequest) -> anyhow::Result<ModelResponse> {
        match self.0.lock().pop_front() {
            Some(text) => Ok(ModelResponse::text(text)),
            None => anyhow::bail!("Claude API error 429: Too Many Requests"),
        }
    }
}

/// Canned replies that also register any guest they announce, the way the
/// account agent's create_user tool would
struct GuestAnnouncer {
    store: Arc<TutorStore>,
    replies: Mutex<VecDeque<(&'static str, Option<&'static str>)>>,
}

#[async_trait]
impl ModelClient for GuestAnnouncer {
    async fn generate(&self, _request: &ModelRequest) -> anyhow::Result<ModelResponse> {
        let Some((text, creates)) = self.replies.lock().pop_front() else {
            anyhow::bail!("no reply left");
        };
        if let Some(guest_id) = creates {
            self.store.create_user(guest_id, "Guest User")?;
        }
        Ok(ModelResponse::text(text))
    }
}

fn open_store(temp: &TempDir) -> Arc<TutorStore> {
    Arc::new(TutorStore::open(&temp.path().join("cli.db")).expect("Failed to open store"))
}

fn app_over(store: Arc<TutorStore>, model: Arc<dyn ModelClient>) -> TutorApp {
    let runner = Arc::new(Runner::new(
        "ai_tutor",
        tutors::root_agent("sonnet"),
        model,
        store,
        RunConfig::default(),
    ));
    TutorApp::new(runner, 30)
}

fn create_app(temp: &TempDir, replies: Vec<&'static str>) -> (TutorApp, Arc<TutorStore>) {
    let store = open_store(temp);
    let app = app_over(store.clone(), Arc::new(Canned(Mutex::new(replies.into()))));
    (app, store)
}

async fn run_repl(app: TutorApp, input: &'static str) -> String {
    let mut repl = Repl::new(app, input.as_bytes(), Vec::new()).with_rate_limit_wait(Duration::ZERO);
    repl.run().await.unwrap();
    String::from_utf8(repl.into_output()).unwrap()
}

#[tokio::test]
async fn test_guest_session() {
    let temp = TempDir::new().unwrap();
    let (app, store) = create_app(&temp, vec!["Hi guest! What shall we learn?", "Hello back!"]);

    let out = run_repl(app, "3\nhello\n/paths\n/syllabus\n/switch 4\n/dance\nexit\n").await;

    assert!(out.contains("Welcome, Guest User! (ID: guest_"));
    assert!(out.contains("--- AI Tutor Assistant ---"));
    assert!(out.contains("AI Tutor:\nHi guest! What shall we learn?"));
    assert!(out.contains("AI Tutor:\nHello back!"));
    assert!(out.contains("No learning paths yet."));
    assert!(out.contains("This chat has no learning path yet."));
    assert!(out.contains("No learning path #4. Try /paths."));
    assert!(out.contains("Unknown command '/dance'. Type /help."));
    assert!(out.contains("Guest data cleaned up."));
    assert!(out.trim_end().ends_with("Goodbye!"));

    assert_eq!(store.stats().unwrap().users, 0);
    assert_eq!(store.stats().unwrap().interactions, 0);
}

#[tokio::test]
async fn test_unknown_id_then_sign_up() {
    let temp = TempDir::new().unwrap();
    let (app, store) = create_app(&temp, vec!["Welcome Bob!", "Arrays store items contiguously."]);

    let out = run_repl(app, "1\nbob\n2\nbob\nBob\nexplain arrays\n/history\nquit\n").await;

    assert!(out.contains("User ID not found."));
    assert!(out.contains("Welcome, Bob! (ID: bob)"));
    assert!(out.contains("Bob: explain arrays"));
    assert!(out.contains("AI Tutor: Arrays store items contiguously."));
    assert!(!out.contains("Guest data cleaned up."));

    // Registered users keep their data
    assert!(store.get_user("bob").unwrap().is_some());
    assert_eq!(store.get_chat_history("bob", None, 10).unwrap().len(), 1);
}

#[tokio::test]
async fn test_rate_limit_keeps_session_alive() {
    let temp = TempDir::new().unwrap();
    let (app, _store) = create_app(&temp, vec![]);

    let out = run_repl(app, "3\nhello\n/help\n").await;

    assert!(out.contains("Rate limit reached. Waiting 0s..."));
    assert!(out.contains("/switch <n>"));
    assert!(out.contains("Guest data cleaned up."));
}

#[test]
fn test_end_of_input_at_menu() {
    let temp = TempDir::new().unwrap();
    let (app, store) = create_app(&temp, vec![]);

    let out = tokio_test::block_on(run_repl(app, "9\n"));

    assert!(out.contains("Type 1, 2 or 3."));
    assert!(out.contains("Goodbye!"));
    assert_eq!(store.stats().unwrap().users, 0);
}

#[tokio::test]
async fn test_guest_made_in_chat_removed_after_leaving_that_chat() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    store.create_user("alice", "Alice").unwrap();
    store.create_user("guest_abcdef", "Guest User").unwrap();
    std::thread::sleep(Duration::from_millis(5));

    let model = Arc::new(GuestAnnouncer {
        store: store.clone(),
        replies: Mutex::new(
            vec![
                ("Hi Alice!", None),
                ("Guest session created! (ID: guest_1a2b3c)", Some("guest_1a2b3c")),
                ("guest_abcdef exists.", None),
                ("Fresh chat, what next?", None),
            ]
            .into(),
        ),
    });
    let app = app_over(store.clone(), model);

    let out = run_repl(app, "1\nalice\nmake me a guest\ncheck guest_abcdef\n/new\nexit\n").await;
    assert!(out.contains("Guest session created! (ID: guest_1a2b3c)"));
    assert!(out.contains("Fresh chat, what next?"));

    // Created during the visit: gone even though another chat was open at exit
    assert!(store.get_user("guest_1a2b3c").unwrap().is_none());
    // Only looked up: kept
    assert!(store.get_user("guest_abcdef").unwrap().is_some());
    assert!(store.get_user("alice").unwrap().is_some());
}
