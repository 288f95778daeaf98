//! Runner
//!
//! Drives one turn: looks up the session, runs the root agent with the
//! session transcript, records the exchange, makes sure the turn is logged to
//! the store, and clears turn-scoped state.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::session::{Session, SessionService};
use super::state::keys;
use super::{Agent, AgentInput, Event, EventSink, InvocationContext, RunConfig};
use crate::claude::ModelClient;
use crate::store::TutorStore;

/// Messages starting with this are front-end notices, not student input
pub const SYSTEM_PREFIX: &str = "[System]";

/// Stand-in for an empty reply so the transcript keeps alternating roles
const EMPTY_REPLY: &str = "(no response)";

pub struct Runner {
    app_name: String,
    root: Arc<dyn Agent>,
    model: Arc<dyn ModelClient>,
    store: Arc<TutorStore>,
    sessions: SessionService,
    config: RunConfig,
}

impl Runner {
    pub fn new(
        app_name: &str,
        root: Arc<dyn Agent>,
        model: Arc<dyn ModelClient>,
        store: Arc<TutorStore>,
        config: RunConfig,
    ) -> Self {
        Self {
            app_name: app_name.to_string(),
            root,
            model,
            store,
            sessions: SessionService::new(),
            config,
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<TutorStore> {
        &self.store
    }

    /// Run one turn and return its events
    pub async fn run(&self, session_id: &str, message: &str) -> Result<Vec<Event>> {
        self.run_with_sink(session_id, message, EventSink::new()).await
    }

    /// Run one turn in the background, streaming events as they happen
    pub fn run_streaming(
        self: &Arc<Self>,
        session_id: &str,
        message: &str,
    ) -> (mpsc::UnboundedReceiver<Event>, JoinHandle<Result<Vec<Event>>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = Arc::clone(self);
        let session_id = session_id.to_string();
        let message = message.to_string();

        let handle = tokio::spawn(async move {
            runner
                .run_with_sink(&session_id, &message, EventSink::streaming(tx))
                .await
        });

        (rx, handle)
    }

    async fn run_with_sink(&self, session_id: &str, message: &str, sink: EventSink) -> Result<Vec<Event>> {
        let session = self
            .sessions
            .get_session(session_id)
            .ok_or_else(|| anyhow!("Session not found: {}", session_id))?;

        debug!("Turn in session {}: {} chars", session_id, message.len());
        session.state.remove(keys::CONVERSATION_LOGGED);

        let ctx = InvocationContext::new(
            &session.id,
            &session.user_id,
            session.state.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.model),
            self.config.clone(),
            sink.clone(),
        );

        let input = AgentInput::with_history(session.transcript(), message);
        let result = self.root.run(&ctx, input).await;

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                session.state.clear_temp();
                return Err(e);
            }
        };

        let reply = if output.text.trim().is_empty() {
            EMPTY_REPLY
        } else {
            output.text.as_str()
        };
        session.record_exchange(message, reply);

        self.ensure_logged(&session, message, &output.text);
        let cleared = session.state.clear_temp();
        if cleared > 0 {
            debug!("Cleared {} turn-scoped state keys", cleared);
        }

        Ok(sink.events())
    }

    /// Log the exchange unless the root agent already did
    fn ensure_logged(&self, session: &Session, message: &str, response: &str) {
        if session.state.get_bool(keys::CONVERSATION_LOGGED)
            || message.starts_with(SYSTEM_PREFIX)
            || response.trim().is_empty()
        {
            return;
        }

        let user_id = session
            .state
            .current_user_id()
            .unwrap_or_else(|| session.user_id.clone());

        match self
            .store
            .log_interaction(&session.id, &user_id, self.root.name(), message, response)
        {
            Ok(id) => info!("Auto-logged turn {} for {}", id, user_id),
            Err(e) => warn!("Failed to log turn for {}: {}", user_id, e),
        }
    }
}
