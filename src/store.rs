//! Tutor Store
//!
//! SQLite persistence for everything the tutor remembers between turns:
//! - Users (registered accounts and temporary guests)
//! - Interactions (one row per logged query/response exchange)
//! - Student profiles (per-subject level + syllabus details)
//! - Learning paths (one persistent chat session per subject track)

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Syllabus value stored for a path that has no plan yet
pub const EMPTY_SYLLABUS: &str = "{}";

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("User ID '{0}' already exists")]
    UserExists(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A registered user or guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub created_at: i64,
}

impl User {
    pub fn is_guest(&self) -> bool {
        is_guest_id(&self.user_id)
    }
}

/// One logged query/response exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: i64,
    pub session_id: String,
    pub user_id: String,
    pub agent_name: Option<String>,
    pub query: String,
    pub response: String,
    pub timestamp: i64,
}

/// Per-subject mastery profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfile {
    pub user_id: String,
    pub subject: String,
    pub level: String,
    pub details: String,
    pub updated_at: i64,
}

/// A learning path - a chat session bound to a subject with its own syllabus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: i64,
    pub user_id: String,
    pub session_id: String,
    pub subject: String,
    pub title: String,
    pub syllabus: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl LearningPath {
    /// True when a syllabus has been saved for this path
    pub fn has_syllabus(&self) -> bool {
        let trimmed = self.syllabus.trim();
        !trimmed.is_empty() && trimmed != EMPTY_SYLLABUS
    }
}

/// Row counts across all tables
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub users: usize,
    pub interactions: usize,
    pub profiles: usize,
    pub learning_paths: usize,
}

/// Guest accounts are created with a `guest_` prefix
pub fn is_guest_id(user_id: &str) -> bool {
    user_id.starts_with("guest_")
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Tutor store with SQLite backend
pub struct TutorStore {
    conn: Mutex<Connection>,
}

impl TutorStore {
    /// Open or create the tutor database
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        info!("Tutor store opened: {}", path.display());
        Ok(store)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                agent_name TEXT,
                query TEXT NOT NULL,
                response TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_interactions_session
                ON interactions(session_id);
            CREATE INDEX IF NOT EXISTS idx_interactions_user
                ON interactions(user_id, id DESC);

            CREATE TABLE IF NOT EXISTS student_profiles (
                user_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                level TEXT NOT NULL,
                details TEXT NOT NULL DEFAULT '',
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, subject)
            );

            CREATE TABLE IF NOT EXISTS learning_paths (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL UNIQUE,
                subject TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_learning_paths_user
                ON learning_paths(user_id, updated_at DESC);
            "#,
        )?;

        // Migration: databases created before per-path syllabi lack the column
        if !Self::has_column(&conn, "learning_paths", "syllabus")? {
            conn.execute(
                "ALTER TABLE learning_paths ADD COLUMN syllabus TEXT NOT NULL DEFAULT '{}'",
                [],
            )?;
            info!("Migrated learning_paths: added syllabus column");
        }

        Ok(())
    }

    fn has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names.iter().any(|n| n == column))
    }

    // ========== Users ==========

    /// Create a new user
    pub fn create_user(&self, user_id: &str, name: &str) -> StoreResult<User> {
        let conn = self.conn.lock();
        let created_at = now_millis();

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (user_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, name, created_at],
        )?;

        if inserted == 0 {
            return Err(StoreError::UserExists(user_id.to_string()));
        }

        info!("Created user {}", user_id);
        Ok(User {
            user_id: user_id.to_string(),
            name: name.to_string(),
            created_at,
        })
    }

    /// Get user by ID
    pub fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT user_id, name, created_at FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Delete a user along with everything recorded for them
    pub fn delete_user(&self, user_id: &str) -> StoreResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let rows = tx.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM interactions WHERE user_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM student_profiles WHERE user_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM learning_paths WHERE user_id = ?1", params![user_id])?;
        tx.commit()?;

        if rows > 0 {
            info!("Deleted user {}", user_id);
        }
        Ok(rows > 0)
    }

    // ========== Interactions ==========

    /// Log an interaction
    pub fn log_interaction(
        &self,
        session_id: &str,
        user_id: &str,
        agent_name: &str,
        query: &str,
        response: &str,
    ) -> StoreResult<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO interactions (session_id, user_id, agent_name, query, response, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![session_id, user_id, agent_name, query, response, now_millis()],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Logged interaction {} for {} in {}", id, user_id, session_id);
        Ok(id)
    }

    /// Get chat history for a user, optionally scoped to one session.
    /// Returns the newest `limit` rows in chronological order.
    pub fn get_chat_history(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<Interaction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, user_id, agent_name, query, response, timestamp
             FROM interactions
             WHERE user_id = ?1 AND (?2 IS NULL OR session_id = ?2)
             ORDER BY id DESC
             LIMIT ?3",
        )?;

        let mut history = stmt
            .query_map(params![user_id, session_id, limit as i64], Self::interaction_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        history.reverse();
        Ok(history)
    }

    fn interaction_from_row(row: &Row<'_>) -> rusqlite::Result<Interaction> {
        Ok(Interaction {
            id: row.get(0)?,
            session_id: row.get(1)?,
            user_id: row.get(2)?,
            agent_name: row.get(3)?,
            query: row.get(4)?,
            response: row.get(5)?,
            timestamp: row.get(6)?,
        })
    }

    // ========== Student profiles ==========

    /// Get the profile for one subject
    pub fn get_student_profile(
        &self,
        user_id: &str,
        subject: &str,
    ) -> StoreResult<Option<StudentProfile>> {
        let conn = self.conn.lock();
        let profile = conn
            .query_row(
                "SELECT user_id, subject, level, details, updated_at
                 FROM student_profiles WHERE user_id = ?1 AND subject = ?2",
                params![user_id, subject],
                |row| {
                    Ok(StudentProfile {
                        user_id: row.get(0)?,
                        subject: row.get(1)?,
                        level: row.get(2)?,
                        details: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    /// Create or replace the profile for one subject
    pub fn update_student_profile(
        &self,
        user_id: &str,
        subject: &str,
        level: &str,
        details: &str,
    ) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO student_profiles (user_id, subject, level, details, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, subject) DO UPDATE SET
                level = excluded.level,
                details = excluded.details,
                updated_at = excluded.updated_at
            "#,
            params![user_id, subject, level, details, now_millis()],
        )?;

        debug!("Updated {} profile for {}: {}", subject, user_id, level);
        Ok(())
    }

    // ========== Learning paths ==========

    /// Create the learning path for a session. A session holds at most one
    /// path; creating again retitles it and keeps the saved syllabus.
    pub fn create_learning_path(
        &self,
        user_id: &str,
        session_id: &str,
        subject: &str,
        title: &str,
    ) -> StoreResult<()> {
        let conn = self.conn.lock();
        let now = now_millis();
        conn.execute(
            r#"
            INSERT INTO learning_paths (user_id, session_id, subject, title, syllabus, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, '{}', ?5, ?5)
            ON CONFLICT(session_id) DO UPDATE SET
                subject = excluded.subject,
                title = excluded.title,
                updated_at = excluded.updated_at
            "#,
            params![user_id, session_id, subject, title, now],
        )?;

        info!("Learning path '{}' ({}) bound to session {}", title, subject, session_id);
        Ok(())
    }

    /// All learning paths for a user, most recently active first
    pub fn get_learning_paths(&self, user_id: &str) -> StoreResult<Vec<LearningPath>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, session_id, subject, title, syllabus, created_at, updated_at
             FROM learning_paths
             WHERE user_id = ?1
             ORDER BY updated_at DESC, id DESC",
        )?;

        let paths = stmt
            .query_map(params![user_id], Self::path_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(paths)
    }

    /// The learning path bound to a session, if any
    pub fn get_learning_path(&self, session_id: &str) -> StoreResult<Option<LearningPath>> {
        let conn = self.conn.lock();
        let path = conn
            .query_row(
                "SELECT id, user_id, session_id, subject, title, syllabus, created_at, updated_at
                 FROM learning_paths WHERE session_id = ?1",
                params![session_id],
                Self::path_from_row,
            )
            .optional()?;
        Ok(path)
    }

    /// Save the syllabus for a session's path. Returns false if the session
    /// has no path yet.
    pub fn update_learning_path_details(&self, session_id: &str, syllabus: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE learning_paths SET syllabus = ?1, updated_at = ?2 WHERE session_id = ?3",
            params![syllabus, now_millis(), session_id],
        )?;
        Ok(rows > 0)
    }

    fn path_from_row(row: &Row<'_>) -> rusqlite::Result<LearningPath> {
        Ok(LearningPath {
            id: row.get(0)?,
            user_id: row.get(1)?,
            session_id: row.get(2)?,
            subject: row.get(3)?,
            title: row.get(4)?,
            syllabus: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    /// Get total stats
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let conn = self.conn.lock();
        let count = |table: &str| -> rusqlite::Result<usize> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as usize)
        };

        Ok(StoreStats {
            users: count("users")?,
            interactions: count("interactions")?,
            profiles: count("student_profiles")?,
            learning_paths: count("learning_paths")?,
        })
    }
}
