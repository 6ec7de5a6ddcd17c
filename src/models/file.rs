use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

/// Metadata for a document in the upload store. `name` is the storage
/// key; `public_url` is trusted as stored, nothing cross-checks it
/// against bucket/file_path.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FileRecord {
    pub id: i64,
    pub name: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: Option<String>,
    pub bucket: String,
    pub file_path: String,
    pub public_url: Option<String>,
    pub uploaded_by: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileForm {
    pub name: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: Option<String>,
    pub bucket: String,
    pub file_path: String,
    pub public_url: Option<String>,
    pub uploaded_by: String,
}

impl FileRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(FileRecord {
            id: row.get("id")?,
            name: row.get("name")?,
            original_name: row.get("original_name")?,
            size_bytes: row.get("size_bytes")?,
            mime_type: row.get("mime_type")?,
            bucket: row.get("bucket")?,
            file_path: row.get("file_path")?,
            public_url: row.get("public_url")?,
            uploaded_by: row.get("uploaded_by")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM files WHERE id = ?1",
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
        let mut stmt =
            match conn.prepare("SELECT * FROM files ORDER BY created_at DESC, id DESC") {
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
        conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn create(pool: &DbPool, form: &FileForm) -> Result<Self, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO files (name, original_name, size_bytes, mime_type, bucket, file_path, public_url, uploaded_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                form.name,
                form.original_name,
                form.size_bytes,
                form.mime_type,
                form.bucket,
                form.file_path,
                form.public_url,
                form.uploaded_by,
            ],
        )
        .map_err(|e| {
            log::error!("file record insert failed: {}", e);
            e.to_string()
        })?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT * FROM files WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .map_err(|e| e.to_string())
    }

    /// Removes the record only. Articles referencing it keep their
    /// file_id and dangle; the stored object is not touched either.
    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM files WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
