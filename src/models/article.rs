use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;
use crate::models::file::FileRecord;
use crate::models::settings::Setting;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub excerpt: String,
    pub category: String,
    pub author: String,
    pub translator: Option<String>,
    pub status: String,       // draft, published
    pub article_type: String, // text, file
    pub file_id: Option<i64>,
    pub view_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArticleForm {
    pub title: String,
    pub content: Option<String>,
    pub excerpt: String,
    pub category: String,
    pub author: String,
    pub translator: Option<String>,
    pub status: String,
    pub article_type: String,
    pub file_id: Option<i64>,
}

/// Partial update: only fields that are present change.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub translator: Option<String>,
    pub status: Option<String>,
    pub article_type: Option<String>,
    pub file_id: Option<i64>,
}

#[derive(Debug, Default, Clone)]
pub struct ArticleFilter {
    pub category: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Outcome of the publish-files-as-articles batch: how many articles
/// were created before the loop stopped, and the error that stopped it
/// (None when every selected file went through).
#[derive(Debug, Serialize)]
pub struct PublishReport {
    pub created: usize,
    pub error: Option<String>,
}

impl Article {
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Article {
            id: row.get("id")?,
            title: row.get("title")?,
            content: row.get("content")?,
            excerpt: row.get("excerpt")?,
            category: row.get("category")?,
            author: row.get("author")?,
            translator: row.get("translator")?,
            status: row.get("status")?,
            article_type: row.get("article_type")?,
            file_id: row.get("file_id")?,
            view_count: row.get("view_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn find(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM articles WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    /// List articles newest-first with optional equality filters and
    /// windowing. An offset with no explicit limit assumes a page of 10
    /// (long-standing caller contract, covered by tests; do not "fix").
    /// id DESC breaks ties within one created_at second.
    pub fn list(pool: &DbPool, filter: &ArticleFilter) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };

        let mut sql = String::from("SELECT * FROM articles");
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();

        if let Some(ref category) = filter.category {
            params_vec.push(Box::new(category.clone()));
            clauses.push(format!("category = ?{}", params_vec.len()));
        }
        if let Some(ref status) = filter.status {
            params_vec.push(Box::new(status.clone()));
            clauses.push(format!("status = ?{}", params_vec.len()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");

        match (filter.limit, filter.offset) {
            (limit, Some(offset)) => {
                params_vec.push(Box::new(limit.unwrap_or(10)));
                sql.push_str(&format!(" LIMIT ?{}", params_vec.len()));
                params_vec.push(Box::new(offset));
                sql.push_str(&format!(" OFFSET ?{}", params_vec.len()));
            }
            (Some(limit), None) => {
                params_vec.push(Box::new(limit));
                sql.push_str(&format!(" LIMIT ?{}", params_vec.len()));
            }
            (None, None) => {}
        }

        let mut stmt = match conn.prepare(&sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        stmt.query_map(params_refs.as_slice(), Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count(pool: &DbPool, status: Option<&str>) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };

        match status {
            Some(s) => conn
                .query_row(
                    "SELECT COUNT(*) FROM articles WHERE status = ?1",
                    params![s],
                    |row| row.get(0),
                )
                .unwrap_or(0),
            None => conn
                .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))
                .unwrap_or(0),
        }
    }

    pub fn total_views(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COALESCE(SUM(view_count), 0) FROM articles",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    /// Insert and return the stored row (id, timestamps and view_count
    /// are server-assigned). Does not validate the type/file_id pairing:
    /// callers own that, same as the service this layer fronts.
    pub fn create(pool: &DbPool, form: &ArticleForm) -> Result<Self, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;

        conn.execute(
            "INSERT INTO articles (title, content, excerpt, category, author, translator, status, article_type, file_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                form.title,
                form.content,
                form.excerpt,
                form.category,
                form.author,
                form.translator,
                form.status,
                form.article_type,
                form.file_id,
            ],
        )
        .map_err(|e| {
            log::error!("article insert failed: {}", e);
            e.to_string()
        })?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT * FROM articles WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .map_err(|e| e.to_string())
    }

    /// Apply a partial update and return the updated row.
    pub fn update(pool: &DbPool, id: i64, patch: &ArticlePatch) -> Result<Self, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;

        let mut sets: Vec<String> = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        macro_rules! set_field {
            ($field:ident) => {
                if let Some(ref v) = patch.$field {
                    params_vec.push(Box::new(v.clone()));
                    sets.push(format!("{} = ?{}", stringify!($field), params_vec.len()));
                }
            };
        }

        set_field!(title);
        set_field!(content);
        set_field!(excerpt);
        set_field!(category);
        set_field!(author);
        set_field!(translator);
        set_field!(status);
        set_field!(article_type);
        if let Some(file_id) = patch.file_id {
            params_vec.push(Box::new(file_id));
            sets.push(format!("file_id = ?{}", params_vec.len()));
        }

        sets.push("updated_at = CURRENT_TIMESTAMP".to_string());

        params_vec.push(Box::new(id));
        let sql = format!(
            "UPDATE articles SET {} WHERE id = ?{}",
            sets.join(", "),
            params_vec.len()
        );

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let changed = conn
            .execute(&sql, params_refs.as_slice())
            .map_err(|e| {
                log::error!("article update failed: {}", e);
                e.to_string()
            })?;
        if changed == 0 {
            return Err("article update matched no rows".to_string());
        }

        conn.query_row(
            "SELECT * FROM articles WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .map_err(|e| e.to_string())
    }

    /// Hard delete. Referenced file records are left alone.
    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM articles WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Bump the view counter with a single UPDATE expression evaluated
    /// by the store, then read the new value back. Concurrent readers
    /// cannot lose increments.
    pub fn increment_views(pool: &DbPool, id: i64) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE articles SET view_count = view_count + 1 WHERE id = ?1",
                params![id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err("view count update matched no rows".to_string());
        }
        let count: i64 = conn
            .query_row(
                "SELECT view_count FROM articles WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map_err(|e| e.to_string())?;
        Ok(count)
    }

    /// Turn a selection of uploaded files into published file-type
    /// articles. Ids are deduplicated first-seen-first; ids with no
    /// matching file record are skipped without complaint. The loop is
    /// not transactional: the first failing insert stops it, earlier
    /// inserts stay, and the report names the file that failed.
    pub fn publish_from_files(pool: &DbPool, file_ids: &[i64]) -> PublishReport {
        let default_category = Setting::get_or(pool, "default_category", "Siyosat");
        let default_author = Setting::get_or(pool, "default_author", "Admin");

        let files = FileRecord::list(pool);

        let mut selection: Vec<i64> = Vec::new();
        for id in file_ids {
            if !selection.contains(id) {
                selection.push(*id);
            }
        }

        let mut created = 0usize;
        for file_id in selection {
            let file = match files.iter().find(|f| f.id == file_id) {
                Some(f) => f,
                None => continue,
            };

            let title = match file.original_name.rsplit_once('.') {
                Some((stem, _ext)) => stem.to_string(),
                None => file.original_name.clone(),
            };

            let form = ArticleForm {
                title,
                content: Some(format!("File: {}", file.original_name)),
                excerpt: format!("Document file: {}", file.original_name),
                category: default_category.clone(),
                author: default_author.clone(),
                translator: None,
                status: "published".to_string(),
                article_type: "file".to_string(),
                file_id: Some(file.id),
            };

            if let Err(e) = Self::create(pool, &form) {
                log::error!("publishing file {} as article failed: {}", file.id, e);
                return PublishReport {
                    created,
                    error: Some(format!("{} (file {}): {}", file.original_name, file.id, e)),
                };
            }
            created += 1;
        }

        PublishReport { created, error: None }
    }
}
