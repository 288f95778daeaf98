//! Terminal front end
//!
//! Sign-in menu followed by a chat loop. Generic over input and output so the
//! whole conversation can be driven from tests.

use anyhow::Result;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{info, warn};

use crate::bootstrap::{self, ChatView, Identity, Reply, TutorApp};
use crate::recovery::ErrorClass;
use crate::response::{display_name, extract_guest_id};
use crate::store::{is_guest_id, Interaction, LearningPath, StoreError};
use crate::syllabus::level_progress;
use crate::tutors::ROOT_AGENT_NAME;

/// Pause after the model reports a rate limit
pub const RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

const RULE: &str = "======================================================================";

const HELP: &str = "Commands:
  /paths        list your learning paths
  /new          start a new chat
  /switch <n>   open learning path number n from /paths
  /syllabus     show progress for this chat's path
  /history      show earlier messages in this chat
  /help         show this help
  exit          leave (guest data is deleted)";

/// A line typed in the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Exit,
    Help,
    Paths,
    New,
    Switch(usize),
    Syllabus,
    History,
    Unknown(String),
    Message(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if matches!(line.to_lowercase().as_str(), "exit" | "quit" | "bye") {
            return Self::Exit;
        }
        if !line.starts_with('/') {
            return Self::Message(line.to_string());
        }

        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or_default().to_lowercase();
        match cmd.as_str() {
            "/help" => Self::Help,
            "/paths" => Self::Paths,
            "/new" => Self::New,
            "/syllabus" => Self::Syllabus,
            "/history" => Self::History,
            "/switch" => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
                Some(n) if n > 0 => Self::Switch(n),
                _ => Self::Unknown(line.to_string()),
            },
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// Interactive session over any line source and writer
pub struct Repl<R, W> {
    app: TutorApp,
    input: Lines<R>,
    out: W,
    rate_limit_wait: Duration,
    /// Guest IDs seen in replies, removed on exit if created during this visit
    chat_guests: Vec<String>,
    /// Milliseconds since the epoch when this REPL was created
    started_at: i64,
}

impl<R, W> Repl<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(app: TutorApp, input: R, out: W) -> Self {
        Self {
            app,
            input: input.lines(),
            out,
            rate_limit_wait: RATE_LIMIT_WAIT,
            chat_guests: Vec::new(),
            started_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.rate_limit_wait = wait;
        self
    }

    pub fn into_output(self) -> W {
        self.out
    }

    async fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.out, "{}", label)?;
        self.out.flush()?;
        Ok(self.input.next_line().await?.map(|l| l.trim().to_string()))
    }

    /// Run until the user leaves or input ends
    pub async fn run(&mut self) -> Result<()> {
        writeln!(self.out, "\n{}\nAI TUTOR\n{}\n", RULE, RULE)?;

        let Some(identity) = self.sign_in().await? else {
            writeln!(self.out, "\nGoodbye!")?;
            return Ok(());
        };
        writeln!(self.out, "\nWelcome, {}! (ID: {})", identity.name, identity.user_id)?;
        writeln!(self.out, "Type /help for commands, 'exit' to quit.\n{}", RULE)?;

        let mut chat = self.app.open_chat(&identity, None).await?;
        self.show_chat(&chat)?;

        loop {
            let Some(line) = self.prompt("\nYou: ").await? else {
                break;
            };

            match Command::parse(&line) {
                Command::Empty => {}
                Command::Exit => break,
                Command::Help => writeln!(self.out, "{}", HELP)?,
                Command::Paths => {
                    self.show_paths(&identity, &chat.session_id)?;
                }
                Command::New => {
                    chat = self.app.open_chat(&identity, None).await?;
                    self.show_chat(&chat)?;
                }
                Command::Switch(n) => {
                    let paths = self.app.learning_paths(&identity)?;
                    match paths.get(n - 1) {
                        Some(path) => {
                            chat = self.app.open_chat(&identity, Some(&path.session_id)).await?;
                            self.show_chat(&chat)?;
                        }
                        None => writeln!(self.out, "No learning path #{}. Try /paths.", n)?,
                    }
                }
                Command::Syllabus => self.show_progress(&identity, &chat.session_id)?,
                Command::History => {
                    let history = self.app.history(&identity, &chat.session_id)?;
                    self.show_history(&identity, &history)?;
                }
                Command::Unknown(cmd) => writeln!(self.out, "Unknown command '{}'. Type /help.", cmd)?,
                Command::Message(text) => self.send(&chat, &text).await?,
            }
        }

        self.sign_out(&identity)?;
        writeln!(self.out, "\nGoodbye!\n")?;
        Ok(())
    }

    async fn sign_in(&mut self) -> Result<Option<Identity>> {
        loop {
            writeln!(self.out, "Please choose an option:")?;
            writeln!(self.out, "  1. Enter your existing user ID")?;
            writeln!(self.out, "  2. Create a new account")?;
            writeln!(self.out, "  3. Continue as guest (temporary session)")?;

            let Some(choice) = self.prompt("> ").await? else {
                return Ok(None);
            };

            match choice.as_str() {
                "1" => {
                    let Some(user_id) = self.prompt("User ID: ").await? else {
                        return Ok(None);
                    };
                    match bootstrap::login(self.app.store(), &user_id)? {
                        Some(identity) => return Ok(Some(identity)),
                        None => writeln!(self.out, "User ID not found.\n")?,
                    }
                }
                "2" => {
                    let Some(user_id) = self.prompt("Choose a user ID: ").await? else {
                        return Ok(None);
                    };
                    let Some(name) = self.prompt("Your name: ").await? else {
                        return Ok(None);
                    };
                    match bootstrap::sign_up(self.app.store(), &user_id, &name) {
                        Ok(identity) => return Ok(Some(identity)),
                        Err(e) if matches!(e.downcast_ref::<StoreError>(), Some(StoreError::UserExists(_))) => {
                            writeln!(self.out, "User ID already exists.\n")?
                        }
                        Err(e) => writeln!(self.out, "Could not create account: {}\n", e)?,
                    }
                }
                "3" => return bootstrap::continue_as_guest(self.app.store()).map(Some),
                "exit" | "quit" | "bye" => return Ok(None),
                _ => writeln!(self.out, "Type 1, 2 or 3.\n")?,
            }
        }
    }

    async fn send(&mut self, chat: &ChatView, text: &str) -> Result<()> {
        match self.app.send(&chat.session_id, text).await {
            Ok(Some(reply)) => {
                if let Some(guest) = extract_guest_id(&reply.text) {
                    if !self.chat_guests.contains(&guest) {
                        self.chat_guests.push(guest);
                    }
                }
                self.show_reply(&reply)?;
            }
            Ok(None) => writeln!(self.out, "\n(No response)")?,
            Err(e) if ErrorClass::from_error(&e.to_string()) == ErrorClass::RateLimited => {
                warn!("Rate limited: {}", e);
                writeln!(
                    self.out,
                    "\nRate limit reached. Waiting {}s...",
                    self.rate_limit_wait.as_secs()
                )?;
                tokio::time::sleep(self.rate_limit_wait).await;
            }
            Err(e) => writeln!(self.out, "\nError: {}", e)?,
        }
        Ok(())
    }

    fn sign_out(&mut self, identity: &Identity) -> Result<()> {
        // Guests mentioned in replies that were created during this visit
        for guest in std::mem::take(&mut self.chat_guests) {
            if !is_guest_id(&guest) || guest == identity.user_id {
                continue;
            }
            let created_here = self
                .app
                .store()
                .get_user(&guest)?
                .map_or(false, |u| u.created_at >= self.started_at);
            if created_here {
                self.app.store().delete_user(&guest)?;
                info!("Removed chat guest {}", guest);
            }
        }

        self.app.sign_out(identity)?;
        if identity.is_guest {
            writeln!(self.out, "\nGuest data cleaned up.")?;
        }
        Ok(())
    }

    fn show_reply(&mut self, reply: &Reply) -> Result<()> {
        writeln!(self.out, "\n{}:\n{}", reply.display_name(), reply.text)?;
        Ok(())
    }

    fn show_chat(&mut self, chat: &ChatView) -> Result<()> {
        writeln!(self.out, "\n--- {} ---", chat.title())?;
        if !chat.history.is_empty() {
            writeln!(self.out, "({} earlier messages, /history to show)", chat.history.len())?;
        }
        if let Some(greeting) = &chat.greeting {
            self.show_reply(greeting)?;
        }
        Ok(())
    }

    fn show_paths(&mut self, identity: &Identity, current_session: &str) -> Result<()> {
        let paths = self.app.learning_paths(identity)?;
        if paths.is_empty() {
            writeln!(self.out, "No learning paths yet. Start chatting to create one!")?;
            return Ok(());
        }

        writeln!(self.out, "Learning Paths:")?;
        for (i, path) in paths.iter().enumerate() {
            writeln!(self.out, "{}", path_line(i + 1, path, current_session))?;
        }
        Ok(())
    }

    fn show_progress(&mut self, identity: &Identity, session_id: &str) -> Result<()> {
        let Some(progress) = self.app.progress(identity, session_id)? else {
            writeln!(self.out, "This chat has no learning path yet.")?;
            return Ok(());
        };

        writeln!(self.out, "{} ({})", progress.path.title, progress.path.subject)?;
        if let Some(level) = &progress.level {
            writeln!(self.out, "Level: {} {}", level, progress_bar(level_progress(level)))?;
        }
        match &progress.syllabus {
            Some(syllabus) if !syllabus.is_empty() => {
                writeln!(self.out, "Completed: {}", progress_bar(syllabus.completion()))?;
                write!(self.out, "{}", syllabus.render())?;
            }
            _ => writeln!(self.out, "Syllabus generating...")?,
        }
        Ok(())
    }

    fn show_history(&mut self, identity: &Identity, history: &[Interaction]) -> Result<()> {
        if history.is_empty() {
            writeln!(self.out, "No earlier messages in this chat.")?;
            return Ok(());
        }
        for h in history {
            writeln!(self.out, "\n{}: {}", identity.name, h.query)?;
            let author = h.agent_name.as_deref().unwrap_or(ROOT_AGENT_NAME);
            writeln!(self.out, "{}: {}", display_name(author), h.response)?;
        }
        Ok(())
    }
}

fn path_line(n: usize, path: &LearningPath, current_session: &str) -> String {
    let marker = if path.session_id == current_session { "*" } else { " " };
    format!("{} {}. {} ({})", marker, n, path.title, path.subject)
}

/// `[#####-----] 50%`
pub fn progress_bar(fraction: f64) -> String {
    let fraction = fraction.clamp(0.0, 1.0);
    let filled = (fraction * 10.0).round() as usize;
    format!(
        "[{}{}] {:.0}%",
        "#".repeat(filled),
        "-".repeat(10 - filled),
        fraction * 100.0
    )
}
