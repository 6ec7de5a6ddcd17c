use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const MESSAGE_STATUSES: &[&str] = &["unread", "read", "replied"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContactMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub status: String, // unread, read, replied
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactMessage {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ContactMessage {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            subject: row.get("subject")?,
            message: row.get("message")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM contact_messages WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn
            .prepare("SELECT * FROM contact_messages ORDER BY created_at DESC, id DESC")
        {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    /// New messages always enter the inbox as 'unread', whatever the
    /// submitter sent.
    pub fn create(pool: &DbPool, form: &ContactForm) -> Result<Self, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO contact_messages (name, email, subject, message, status)
             VALUES (?1, ?2, ?3, ?4, 'unread')",
            params![form.name, form.email, form.subject, form.message],
        )
        .map_err(|e| {
            log::error!("contact message insert failed: {}", e);
            e.to_string()
        })?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT * FROM contact_messages WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .map_err(|e| e.to_string())
    }

    pub fn update_status(pool: &DbPool, id: i64, status: &str) -> Result<(), String> {
        if !MESSAGE_STATUSES.contains(&status) {
            return Err(format!("invalid message status '{}'", status));
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE contact_messages SET status = ?1 WHERE id = ?2",
            params![status, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM contact_messages WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn unread_count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM contact_messages WHERE status = 'unread'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }
}
