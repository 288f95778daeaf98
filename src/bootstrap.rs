//! Session bootstrap
//!
//! Front-end logic shared by every interface: signing in, opening a chat
//! (new, resumed or switched), telling the root agent what just happened,
//! and cleaning up guests on exit.

use anyhow::{bail, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::agent::runner::SYSTEM_PREFIX;
use crate::agent::{keys, Event, Runner};
use crate::response::{collect_response, display_name, last_author};
use crate::store::{Interaction, LearningPath, StoreError, TutorStore};
use crate::syllabus::{effective_syllabus, Syllabus};
use crate::tools::account::new_guest_id;

pub const GUEST_NAME: &str = "Guest User";

/// Attempts at finding an unused guest ID
const GUEST_ID_ATTEMPTS: usize = 5;

/// Who is using the tutor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub name: String,
    pub is_guest: bool,
}

/// Sign in with an existing ID. None when the ID is unknown.
pub fn login(store: &TutorStore, user_id: &str) -> Result<Option<Identity>> {
    let user = store.get_user(user_id.trim())?;
    Ok(user.map(|u| Identity {
        is_guest: u.is_guest(),
        user_id: u.user_id,
        name: u.name,
    }))
}

/// Create an account. Fails with `StoreError::UserExists` for a taken ID.
pub fn sign_up(store: &TutorStore, user_id: &str, name: &str) -> Result<Identity> {
    let (user_id, name) = (user_id.trim(), name.trim());
    if user_id.is_empty() || name.is_empty() {
        bail!("User ID and name are both required");
    }

    let user = store.create_user(user_id, name)?;
    Ok(Identity {
        is_guest: user.is_guest(),
        user_id: user.user_id,
        name: user.name,
    })
}

/// Create a temporary guest account
pub fn continue_as_guest(store: &TutorStore) -> Result<Identity> {
    for _ in 0..GUEST_ID_ATTEMPTS {
        let guest_id = new_guest_id();
        match store.create_user(&guest_id, GUEST_NAME) {
            Ok(user) => {
                info!("Guest session {}", user.user_id);
                return Ok(Identity {
                    user_id: user.user_id,
                    name: user.name,
                    is_guest: true,
                });
            }
            Err(StoreError::UserExists(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    bail!("Could not allocate a guest ID")
}

/// State a chat session starts with
pub fn initial_state(identity: &Identity, session_id: &str) -> Map<String, Value> {
    let mut state = Map::new();
    state.insert(keys::AUTHENTICATED.to_string(), Value::Bool(true));
    state.insert(keys::CURRENT_USER_ID.to_string(), Value::from(identity.user_id.clone()));
    state.insert(keys::user_name(&identity.user_id), Value::from(identity.name.clone()));
    state.insert(keys::SESSION_ID.to_string(), Value::from(session_id));
    if identity.is_guest {
        state.insert(keys::IS_GUEST.to_string(), Value::Bool(true));
    }
    state
}

/// What the root agent is told when a chat opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Nothing said yet and no path bound
    NewSession,
    /// Nothing said yet in a chat that already has a path
    ResumedPath(String),
    /// Chat with earlier messages
    Reconnected,
}

impl Notice {
    pub fn choose(has_history: bool, path: Option<&LearningPath>) -> Self {
        match (has_history, path) {
            (false, None) => Self::NewSession,
            (false, Some(path)) => Self::ResumedPath(path.title.clone()),
            (true, _) => Self::Reconnected,
        }
    }

    pub fn message(&self, identity: &Identity) -> String {
        match self {
            Self::NewSession => format!(
                "{} New user/guest '{}' (ID: {}) has joined in a blank session. \
                 Greet them warmly and ask what they want to learn today (DSA, development, system design?). \
                 When they pick a topic, call create_learning_path.",
                SYSTEM_PREFIX, identity.name, identity.user_id
            ),
            Self::ResumedPath(title) => format!(
                "{} User resumed Learning Path '{}'. Welcome them back and check the path context.",
                SYSTEM_PREFIX, title
            ),
            Self::Reconnected => format!("{} User '{}' connected.", SYSTEM_PREFIX, identity.name),
        }
    }
}

/// One assistant reply ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub author: String,
    pub text: String,
}

impl Reply {
    /// Build from a turn's events; None when the agents said nothing
    pub fn from_events(events: &[Event]) -> Option<Self> {
        let text = collect_response(events)?;
        let author = last_author(events).unwrap_or(crate::tutors::ROOT_AGENT_NAME);
        Some(Self {
            author: author.to_string(),
            text,
        })
    }

    pub fn display_name(&self) -> String {
        display_name(&self.author)
    }
}

/// An opened chat
#[derive(Debug, Clone)]
pub struct ChatView {
    pub session_id: String,
    pub path: Option<LearningPath>,
    /// Earlier exchanges, oldest first
    pub history: Vec<Interaction>,
    /// Greeting produced for a blank chat
    pub greeting: Option<Reply>,
}

impl ChatView {
    pub fn title(&self) -> &str {
        self.path
            .as_ref()
            .map(|p| p.title.as_str())
            .unwrap_or("AI Tutor Assistant")
    }
}

/// The tutor as seen by a front end
pub struct TutorApp {
    runner: Arc<Runner>,
    history_limit: usize,
}

impl TutorApp {
    pub fn new(runner: Arc<Runner>, history_limit: usize) -> Self {
        Self { runner, history_limit }
    }

    pub fn runner(&self) -> &Arc<Runner> {
        &self.runner
    }

    pub fn store(&self) -> &TutorStore {
        self.runner.store()
    }

    /// Open a chat, creating a new session when `session_id` is None.
    ///
    /// A chat the runner has not seen yet gets its state seeded, its stored
    /// history replayed into the transcript, and a system notice sent.
    pub async fn open_chat(&self, identity: &Identity, session_id: Option<&str>) -> Result<ChatView> {
        let session_id = session_id
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let path = self
            .store()
            .get_learning_path(&session_id)?
            .filter(|p| p.user_id == identity.user_id);
        let history = self
            .store()
            .get_chat_history(&identity.user_id, Some(&session_id), self.history_limit)?;

        let mut greeting = None;
        if self.runner.sessions().get_session(&session_id).is_none() {
            let session = self.runner.sessions().create_session(
                &identity.user_id,
                Some(&session_id),
                initial_state(identity, &session_id),
            );
            for h in &history {
                session.record_exchange(&h.query, &h.response);
            }

            let notice = Notice::choose(!history.is_empty(), path.as_ref());
            match self.runner.run(&session_id, &notice.message(identity)).await {
                Ok(events) if history.is_empty() => greeting = Reply::from_events(&events),
                Ok(_) => {}
                Err(e) => warn!("Failed to notify tutor of session start: {}", e),
            }
        }

        Ok(ChatView {
            session_id,
            path,
            history,
            greeting,
        })
    }

    /// Send a student message
    pub async fn send(&self, session_id: &str, message: &str) -> Result<Option<Reply>> {
        let events = self.runner.run(session_id, message).await?;
        Ok(Reply::from_events(&events))
    }

    /// Stored exchanges of one chat, oldest first
    pub fn history(&self, identity: &Identity, session_id: &str) -> Result<Vec<Interaction>> {
        Ok(self
            .store()
            .get_chat_history(&identity.user_id, Some(session_id), self.history_limit)?)
    }

    /// Learning paths of a user, most recent first
    pub fn learning_paths(&self, identity: &Identity) -> Result<Vec<LearningPath>> {
        Ok(self.store().get_learning_paths(&identity.user_id)?)
    }

    /// Level and syllabus for the path bound to a chat
    pub fn progress(&self, identity: &Identity, session_id: &str) -> Result<Option<Progress>> {
        let Some(path) = self
            .store()
            .get_learning_path(session_id)?
            .filter(|p| p.user_id == identity.user_id)
        else {
            return Ok(None);
        };

        let profile = self
            .store()
            .get_student_profile(&identity.user_id, &path.subject)?;
        let syllabus = effective_syllabus(
            Some(path.syllabus.as_str()),
            profile.as_ref().map(|p| p.details.as_str()),
        );

        Ok(Some(Progress {
            level: profile.map(|p| p.level),
            syllabus,
            path,
        }))
    }

    /// End a user's visit; guests are deleted along with their data
    pub fn sign_out(&self, identity: &Identity) -> Result<()> {
        for session in self.runner.sessions().list_sessions(&identity.user_id) {
            self.runner.sessions().delete_session(&session.id);
        }

        if identity.is_guest {
            self.store().delete_user(&identity.user_id)?;
            info!("Removed guest {}", identity.user_id);
        }
        Ok(())
    }
}

/// Progress shown for a learning path
#[derive(Debug, Clone)]
pub struct Progress {
    pub path: LearningPath,
    pub level: Option<String>,
    pub syllabus: Option<Syllabus>,
}
