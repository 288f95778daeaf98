//! AI Tutor
//!
//! A multi-agent tutor: a coordinating agent routes each student message to
//! specialist tutors (DSA, development, system design, general) that keep
//! per-subject learning paths in SQLite.
//!
//! # Architecture
//!
//! ```text
//! cli ──► bootstrap ──► Runner ──► ai_tutor (LlmAgent) ──► Claude API
//!                         │            │
//!                         │            ├── specialist agents (AgentTool)
//!                         │            ├── dsa_solver (LoopAgent)
//!                         │            └── function tools ──► TutorStore
//!                         └── SessionService (state + transcript)
//! ```

pub mod agent;
pub mod bootstrap;
pub mod claude;
pub mod cli;
pub mod config;
pub mod recovery;
pub mod response;
pub mod store;
pub mod syllabus;
pub mod tools;
pub mod tutors;

pub use agent::{Agent, AgentInput, AgentOutput, Event, EventKind, LlmAgent, LoopAgent, Runner, RunConfig};
pub use bootstrap::{ChatView, Identity, Reply, TutorApp};
pub use claude::{ClaudeClient, ModelClient};
pub use config::Config;
pub use store::{LearningPath, StoreError, StudentProfile, TutorStore};
pub use syllabus::Syllabus;
