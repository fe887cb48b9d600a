//! SQLite-backed persistence for the three entities in the data model.
//!
//! Mirrors the teacher's `Database` wrapper: a single `Mutex<Connection>`
//! behind per-entity store structs, `open`/`open_in_memory` constructors,
//! WAL mode for concurrent readers.

mod projects;
mod refresh_tokens;
mod users;

pub use projects::{Project, ProjectStatus, ProjectStore};
pub use refresh_tokens::{RefreshToken, RefreshTokenStore};
pub use users::{User, UserStore};

use std::path::Path;

use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::Result;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                crate::error::PomodexError::Backend(format!("creating db directory: {e}"))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::init_tables(&conn)?;

        info!(path = %path.display(), "database opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::init_tables(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init_tables(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                email_fold TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS refresh_tokens (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token_hash TEXT NOT NULL UNIQUE,
                expires_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user ON refresh_tokens(user_id);

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                display_name TEXT NOT NULL,
                status TEXT NOT NULL,
                container_name TEXT NOT NULL,
                volume_name TEXT NOT NULL,
                ssh_host_port INTEGER,
                ssh_public_key TEXT NOT NULL,
                ssh_private_key TEXT NOT NULL,
                cloud_sa_email TEXT,
                cloud_sa_key TEXT,
                object_store_prefix TEXT NOT NULL UNIQUE,
                snapshot_image_ref TEXT,
                last_snapshot_at INTEGER,
                created_at INTEGER NOT NULL,
                last_active_at INTEGER,
                last_backup_at INTEGER,
                last_connection_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_projects_user ON projects(user_id);
            CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status);
            "#,
        )?;
        Ok(())
    }

    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(&self.conn)
    }

    pub fn refresh_tokens(&self) -> RefreshTokenStore<'_> {
        RefreshTokenStore::new(&self.conn)
    }

    pub fn projects(&self) -> ProjectStore<'_> {
        ProjectStore::new(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_creates_tables() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.users().find_by_email("nobody@example.com").await.unwrap().is_none());
    }
}
