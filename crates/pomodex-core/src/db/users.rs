use rusqlite::params;
use tokio::sync::Mutex;

use crate::error::{PomodexError, Result};

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
}

pub struct UserStore<'a> {
    conn: &'a Mutex<rusqlite::Connection>,
}

impl<'a> UserStore<'a> {
    pub(super) fn new(conn: &'a Mutex<rusqlite::Connection>) -> Self {
        Self { conn }
    }

    /// Inserts a user. `email_fold` is the case-folded form used for the
    /// uniqueness constraint; `email` keeps the caller's casing for display.
    pub async fn create(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        created_at: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        let email_fold = email.to_lowercase();
        let result = conn.execute(
            "INSERT INTO users (id, email, email_fold, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, email, email_fold, password_hash, created_at],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(PomodexError::Conflict(format!("email already registered: {email}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        let email_fold = email.to_lowercase();
        let result = conn.query_row(
            "SELECT id, email, password_hash, created_at FROM users WHERE email_fold = ?1",
            [email_fold],
            Self::from_row,
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = ?1",
            [id],
            Self::from_row,
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn create_and_find_by_email_is_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        db.users().create("u1", "Alice@Example.com", "hash", 0).await.unwrap();

        let found = db.users().find_by_email("alice@example.com").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().email, "Alice@Example.com");
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.users().create("u1", "alice@example.com", "hash", 0).await.unwrap();
        let err = db.users().create("u2", "ALICE@example.com", "hash2", 1).await.unwrap_err();
        assert!(matches!(err, crate::error::PomodexError::Conflict(_)));
    }

    #[tokio::test]
    async fn find_by_id_missing_returns_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.users().find_by_id("missing").await.unwrap().is_none());
    }
}
