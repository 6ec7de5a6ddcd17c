use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::DbPool;

/// Account row. Identity (email, password hash) and profile (name,
/// role) live in the same row, written by one insert; there is no
/// secondary profile write that can fail behind the caller's back.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: String, // admin, translator, reader
    pub created_at: NaiveDateTime,
}

impl User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get("id")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            full_name: row.get("full_name")?,
            role: row.get("role")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn get_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM users WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn get_by_email(pool: &DbPool, email: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM users WHERE email = ?1",
            params![email],
            Self::from_row,
        )
        .ok()
    }

    pub fn create(
        pool: &DbPool,
        email: &str,
        password_hash: &str,
        full_name: Option<&str>,
        role: &str,
    ) -> Result<Self, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO users (email, password_hash, full_name, role) VALUES (?1, ?2, ?3, ?4)",
            params![email, password_hash, full_name, role],
        )
        .map_err(|e| {
            log::error!("user insert failed for {}: {}", email, e);
            e.to_string()
        })?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT * FROM users WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .map_err(|e| e.to_string())
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    /// JSON shape for API responses: everything except the hash.
    pub fn safe_json(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "full_name": self.full_name,
            "role": self.role,
            "created_at": self.created_at,
        })
    }
}
