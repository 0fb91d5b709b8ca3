pub mod models;

use models::{FileId, KnowledgeFile, NewKnowledgeFile};
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// How many files feed the chat context.
pub const CONTEXT_FILES: usize = 10;

pub const DEFAULT_USER: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Knowledge base backed by a SQLite file. Every operation opens its own
/// connection and drops it before returning.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    path: PathBuf,
}

impl KnowledgeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).ok();
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrate(&conn)?;
        Ok(conn)
    }

    /// Metadata for a user's files, newest first.
    pub fn list(&self, user_id: &str) -> Result<Vec<KnowledgeFile>, KnowledgeError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, filename, file_type, file_size, created_at FROM knowledge_base WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(KnowledgeFile {
                id: row.get(0)?,
                filename: row.get(1)?,
                file_type: row.get(2)?,
                file_size: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn upload(&self, user_id: &str, file: &NewKnowledgeFile) -> Result<i64, KnowledgeError> {
        if file.filename.trim().is_empty() || file.content.is_empty() {
            return Err(KnowledgeError::Validation("Filename and content required"));
        }

        let file_type = file
            .file_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("text");
        let file_size = file.file_size.unwrap_or(file.content.len() as i64);

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO knowledge_base (user_id, filename, content, file_type, file_size) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, file.filename, file.content, file_type, file_size],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Stored {} ({} bytes) for {} as #{}", file.filename, file_size, user_id, id);
        Ok(id)
    }

    /// The user's newest files joined into one prompt block, each introduced
    /// by a filename header. Empty when the user has nothing stored.
    pub fn context(&self, user_id: &str) -> Result<String, KnowledgeError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT filename, content FROM knowledge_base WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, CONTEXT_FILES as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut context = String::new();
        for row in rows {
            let (filename, content) = row?;
            context.push_str(&format!("\n\n--- File: {} ---\n{}\n", filename, content));
        }
        Ok(context.trim().to_string())
    }

    /// Remove a file owned by `user_id`. Succeeds whether or not a row matched.
    pub fn delete(&self, user_id: &str, file_id: &FileId) -> Result<(), KnowledgeError> {
        if file_id.is_blank() {
            return Err(KnowledgeError::Validation("File ID required"));
        }
        let Some(id) = file_id.row_id() else {
            debug!("Delete for non-numeric id {:?} matches nothing", file_id);
            return Ok(());
        };

        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM knowledge_base WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        debug!("Delete #{} for {} removed {} row(s)", id, user_id, removed);
        Ok(())
    }
}

fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS knowledge_base (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            content TEXT NOT NULL,
            file_type TEXT NOT NULL DEFAULT 'text',
            file_size INTEGER,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_knowledge_base_user
            ON knowledge_base (user_id, created_at);
        ",
    )
}
