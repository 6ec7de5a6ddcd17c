use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const CAMPAIGN_STATUSES: &[&str] = &["draft", "sent", "scheduled"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subscriber {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub status: String, // active, unsubscribed
    pub subscribed_at: NaiveDateTime,
    pub unsubscribed_at: Option<NaiveDateTime>,
}

/// Campaigns are bookkeeping rows: nothing in this system sends mail.
/// Marking one 'sent' just stamps sent_at and records a count.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Campaign {
    pub id: i64,
    pub title: String,
    pub subject: String,
    pub content: String,
    pub r#type: String, // broadcast, new_article
    pub article_id: Option<i64>,
    pub status: String, // draft, sent, scheduled
    pub sent_count: i64,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub sent_at: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CampaignForm {
    pub title: String,
    pub subject: String,
    pub content: String,
    pub r#type: String,
    pub article_id: Option<i64>,
    pub created_by: String,
}

impl Subscriber {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Subscriber {
            id: row.get("id")?,
            email: row.get("email")?,
            name: row.get("name")?,
            status: row.get("status")?,
            subscribed_at: row.get("subscribed_at")?,
            unsubscribed_at: row.get("unsubscribed_at")?,
        })
    }

    /// Insert as 'active'. The UNIQUE email constraint is the only
    /// duplicate guard; a repeat subscription surfaces as the
    /// constraint error for the caller to translate.
    pub fn subscribe(pool: &DbPool, email: &str, name: Option<&str>) -> Result<Self, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO newsletter_subscribers (email, name, status) VALUES (?1, ?2, 'active')",
            params![email, name],
        )
        .map_err(|e| {
            log::error!("newsletter subscribe failed for {}: {}", email, e);
            e.to_string()
        })?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT * FROM newsletter_subscribers WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .map_err(|e| e.to_string())
    }

    /// Filtered update; an email with no matching row is still Ok.
    /// The caller never learns the difference.
    pub fn unsubscribe(pool: &DbPool, email: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE newsletter_subscribers
             SET status = 'unsubscribed', unsubscribed_at = CURRENT_TIMESTAMP
             WHERE email = ?1",
            params![email],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn active_list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT * FROM newsletter_subscribers WHERE status = 'active'
             ORDER BY subscribed_at DESC, id DESC",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn active_count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM newsletter_subscribers WHERE status = 'active'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "DELETE FROM newsletter_subscribers WHERE id = ?1",
            params![id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }
}

impl Campaign {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Campaign {
            id: row.get("id")?,
            title: row.get("title")?,
            subject: row.get("subject")?,
            content: row.get("content")?,
            r#type: row.get("type")?,
            article_id: row.get("article_id")?,
            status: row.get("status")?,
            sent_count: row.get("sent_count")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            sent_at: row.get("sent_at")?,
        })
    }

    pub fn find(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM newsletter_campaigns WHERE id = ?1",
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
            .prepare("SELECT * FROM newsletter_campaigns ORDER BY created_at DESC, id DESC")
        {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM newsletter_campaigns", [], |row| {
            row.get(0)
        })
        .unwrap_or(0)
    }

    pub fn create(pool: &DbPool, form: &CampaignForm) -> Result<Self, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO newsletter_campaigns (title, subject, content, type, article_id, status, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, 'draft', ?6)",
            params![
                form.title,
                form.subject,
                form.content,
                form.r#type,
                form.article_id,
                form.created_by,
            ],
        )
        .map_err(|e| {
            log::error!("campaign insert failed: {}", e);
            e.to_string()
        })?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT * FROM newsletter_campaigns WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .map_err(|e| e.to_string())
    }

    /// Status bookkeeping. The 'sent' transition stamps sent_at and,
    /// when given, the recipient count; other transitions touch only
    /// the status column.
    pub fn update_status(
        pool: &DbPool,
        id: i64,
        status: &str,
        sent_count: Option<i64>,
    ) -> Result<(), String> {
        if !CAMPAIGN_STATUSES.contains(&status) {
            return Err(format!("invalid campaign status '{}'", status));
        }
        let conn = pool.get().map_err(|e| e.to_string())?;

        if status == "sent" {
            match sent_count {
                Some(count) => conn.execute(
                    "UPDATE newsletter_campaigns
                     SET status = ?1, sent_at = CURRENT_TIMESTAMP, sent_count = ?2
                     WHERE id = ?3",
                    params![status, count, id],
                ),
                None => conn.execute(
                    "UPDATE newsletter_campaigns
                     SET status = ?1, sent_at = CURRENT_TIMESTAMP
                     WHERE id = ?2",
                    params![status, id],
                ),
            }
        } else {
            conn.execute(
                "UPDATE newsletter_campaigns SET status = ?1 WHERE id = ?2",
                params![status, id],
            )
        }
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM newsletter_campaigns WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
