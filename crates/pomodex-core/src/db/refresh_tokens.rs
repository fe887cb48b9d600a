use rusqlite::params;
use tokio::sync::Mutex;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: i64,
    pub created_at: i64,
}

pub struct RefreshTokenStore<'a> {
    conn: &'a Mutex<rusqlite::Connection>,
}

impl<'a> RefreshTokenStore<'a> {
    pub(super) fn new(conn: &'a Mutex<rusqlite::Connection>) -> Self {
        Self { conn }
    }

    pub async fn create(&self, token: &RefreshToken) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                token.id,
                token.user_id,
                token.token_hash,
                token.expires_at,
                token.created_at
            ],
        )?;
        Ok(())
    }

    pub async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            "SELECT id, user_id, token_hash, expires_at, created_at
             FROM refresh_tokens WHERE token_hash = ?1",
            [token_hash],
            Self::from_row,
        );
        match result {
            Ok(token) => Ok(Some(token)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes a single token by id. Used for single-use rotation: the
    /// presented token is deleted the moment it is exchanged, whether or
    /// not the exchange succeeds past that point.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM refresh_tokens WHERE id = ?1", [id])?;
        Ok(())
    }

    pub async fn delete_all_for_user(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM refresh_tokens WHERE user_id = ?1", [user_id])?;
        Ok(())
    }

    /// Lazily reaps rows past their absolute expiry. Safe to call on a
    /// schedule or opportunistically before a lookup.
    pub async fn reap_expired(&self, now: i64) -> Result<usize> {
        let conn = self.conn.lock().await;
        let count = conn.execute("DELETE FROM refresh_tokens WHERE expires_at < ?1", [now])?;
        Ok(count)
    }

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<RefreshToken> {
        Ok(RefreshToken {
            id: row.get(0)?,
            user_id: row.get(1)?,
            token_hash: row.get(2)?,
            expires_at: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn sample(id: &str, user_id: &str, expires_at: i64) -> RefreshToken {
        RefreshToken {
            id: id.into(),
            user_id: user_id.into(),
            token_hash: format!("hash-{id}"),
            expires_at,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn create_and_find_by_hash_round_trips() {
        let db = Database::open_in_memory().unwrap();
        db.users().create("u1", "a@example.com", "h", 0).await.unwrap();
        db.refresh_tokens().create(&sample("t1", "u1", 1_000)).await.unwrap();

        let found = db.refresh_tokens().find_by_hash("hash-t1").await.unwrap();
        assert_eq!(found.unwrap().user_id, "u1");
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let db = Database::open_in_memory().unwrap();
        db.users().create("u1", "a@example.com", "h", 0).await.unwrap();
        db.refresh_tokens().create(&sample("t1", "u1", 1_000)).await.unwrap();
        db.refresh_tokens().delete("t1").await.unwrap();

        assert!(db.refresh_tokens().find_by_hash("hash-t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reap_expired_only_removes_past_expiry() {
        let db = Database::open_in_memory().unwrap();
        db.users().create("u1", "a@example.com", "h", 0).await.unwrap();
        db.refresh_tokens().create(&sample("old", "u1", 100)).await.unwrap();
        db.refresh_tokens().create(&sample("fresh", "u1", 10_000)).await.unwrap();

        let reaped = db.refresh_tokens().reap_expired(5_000).await.unwrap();
        assert_eq!(reaped, 1);
        assert!(db.refresh_tokens().find_by_hash("hash-old").await.unwrap().is_none());
        assert!(db.refresh_tokens().find_by_hash("hash-fresh").await.unwrap().is_some());
    }
}
