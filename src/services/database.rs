use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use tokio::task;

use crate::models::{Chat, Message, NewChat};

/// Relational store for chats and their messages.
///
/// All access goes through one connection, so batch saves never interleave.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn open(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        task::spawn_blocking(move || {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory: {}", parent.display())
                })?;
            }

            let conn = Connection::open(&path)
                .with_context(|| format!("Failed to open database at {}", path.display()))?;
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

            let db = Database {
                conn: Arc::new(Mutex::new(conn)),
            };
            db.init_schema()?;
            tracing::info!("Database initialized at {}", path.display());
            Ok(db)
        })
        .await?
    }

    /// Create an in-memory database (used for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn conn_ref(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        conn.lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = Self::lock(&self.conn)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                title TEXT
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                FOREIGN KEY (chat_id) REFERENCES chats(id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id);",
        )
        .context("Failed to create chat tables")?;
        Ok(())
    }

    // --- Chat histories ---

    /// All chats, most recent first, each with its messages in insertion order.
    pub async fn list_histories(&self) -> Result<Vec<Chat>> {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            let mut stmt = conn.prepare(
                "SELECT c.id, c.timestamp, c.title, m.role, m.content, m.timestamp
                 FROM chats c
                 LEFT JOIN messages m ON c.id = m.chat_id
                 ORDER BY c.timestamp DESC, c.id, m.id ASC",
            )?;
            let mut rows = stmt.query([])?;

            let mut chats: Vec<Chat> = Vec::new();
            while let Some(row) = rows.next()? {
                let chat_id: String = row.get(0)?;
                if chats.last().is_none_or(|c| c.id != chat_id) {
                    chats.push(Chat {
                        id: chat_id,
                        timestamp: row.get(1)?,
                        title: row.get(2)?,
                        messages: Vec::new(),
                    });
                }

                // A chat without messages joins to a single all-NULL row.
                let role: Option<String> = row.get(3)?;
                let Some(role) = role else {
                    continue;
                };
                if let Some(chat) = chats.last_mut() {
                    chat.messages.push(Message {
                        role,
                        content: row.get(4)?,
                        timestamp: row.get(5)?,
                    });
                }
            }

            tracing::debug!("Loaded {} chats from database", chats.len());
            Ok(chats)
        })
        .await?
    }

    /// Upsert every chat in one transaction, replacing the message list of
    /// each chat that carries a non-empty one.
    pub async fn save_histories(&self, chats: Vec<NewChat>) -> Result<()> {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let mut conn = Self::lock(&conn)?;
            let tx = conn.transaction()?;

            for chat in &chats {
                let now = Utc::now().to_rfc3339();
                let timestamp = chat.timestamp.as_deref().unwrap_or(&now);
                let title = chat.title.as_deref().unwrap_or("");

                tracing::debug!(
                    "Saving chat {} with {} messages",
                    chat.id,
                    chat.messages.len()
                );

                tx.execute(
                    "INSERT INTO chats (id, timestamp, title) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE SET timestamp = ?2, title = ?3",
                    params![chat.id, timestamp, title],
                )?;

                if chat.messages.is_empty() {
                    continue;
                }

                tx.execute("DELETE FROM messages WHERE chat_id = ?1", params![chat.id])?;
                let mut insert = tx.prepare_cached(
                    "INSERT INTO messages (chat_id, role, content, timestamp)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for msg in &chat.messages {
                    let msg_timestamp = msg.timestamp.as_deref().unwrap_or(&now);
                    insert.execute(params![chat.id, msg.role, msg.content, msg_timestamp])?;
                }
            }

            tx.commit()?;
            tracing::debug!("Saved {} chats to database", chats.len());
            Ok(())
        })
        .await?
    }
}
