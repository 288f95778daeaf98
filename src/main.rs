//! AI Tutor - Entry Point
//!
//! Modes:
//! - Default: interactive tutor in the terminal
//! - --stats: print database row counts and exit

use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use tutor_agents::cli::Repl;
use tutor_agents::{tutors, ClaudeClient, Config, Runner, TutorApp, TutorStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let stats_mode = args.iter().any(|a| a == "--stats" || a == "-s");
    let json_logs = args.iter().any(|a| a == "--json-logs");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("AI Tutor v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: tutor-agents [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --stats, -s    Print database statistics and exit");
        println!("  --json-logs    Log to stderr as JSON");
        println!("  --help, -h     Show this help");
        println!();
        println!("Default: Run the tutor in this terminal");
        println!();
        println!("Environment variables:");
        println!("  ANTHROPIC_API_KEY               Claude API key");
        println!("  DATABASE_URI                    SQLite database (default: sqlite:///ai_tutor.db)");
        println!("  TUTOR_AGENT_MODEL               haiku, sonnet, opus or a model id (default: sonnet)");
        println!("  TUTOR_MAX_TOKENS                Output tokens per model call (default: 4096)");
        println!("  TUTOR_MAX_TOOL_ROUNDS           Tool rounds per agent turn (default: 8)");
        println!("  TUTOR_RETRY_ATTEMPTS            Attempts per model call (default: 15)");
        println!("  TUTOR_RETRY_INITIAL_DELAY_SECS  First retry delay (default: 2)");
        println!("  TUTOR_HISTORY_LIMIT             Messages reloaded on resume (default: 30)");
        println!("  RUST_LOG                        trace, debug, info, warn or error (default: warn)");
        return Ok(());
    }

    // Chat owns stdout, logs go to stderr
    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        })
        .unwrap_or(Level::WARN);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let config = Config::from_env()?;
    let store = Arc::new(TutorStore::open(config.db_path())?);

    if stats_mode {
        let stats = store.stats()?;
        println!("Database: {}", config.db_path().display());
        println!("  users:          {}", stats.users);
        println!("  interactions:   {}", stats.interactions);
        println!("  profiles:       {}", stats.profiles);
        println!("  learning paths: {}", stats.learning_paths);
        return Ok(());
    }

    info!("AI Tutor v{}", env!("CARGO_PKG_VERSION"));

    let client = ClaudeClient::from_config(&config);
    if !client.is_available() {
        warn!("ANTHROPIC_API_KEY not set - tutor replies will fail");
    }

    let runner = Arc::new(Runner::new(
        "ai_tutor",
        tutors::root_agent(&config.agent_model),
        Arc::new(client),
        store,
        config.run_config(),
    ));
    let app = TutorApp::new(runner, config.history_limit);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    Repl::new(app, stdin, std::io::stdout()).run().await?;

    Ok(())
}
