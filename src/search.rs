use rusqlite::params;

use crate::db::DbPool;
use crate::models::article::Article;

/// Case-insensitive substring search over articles, matching any of
/// title, content, excerpt, category or author. Runs in the store
/// rather than over a fetched page, but keeps the caller-visible
/// contract of the filter it replaces: substring (not token) matching,
/// OR across fields, no status filter (drafts match too), newest
/// first, results capped at `limit`.
///
/// SQLite's lower() folds ASCII only; the query is lowercased here, so
/// matches on non-ASCII text are case-exact.
pub fn search_articles(pool: &DbPool, query: &str, limit: i64) -> Vec<Article> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return vec![];
    }

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return vec![],
    };

    let mut stmt = match conn.prepare(
        "SELECT * FROM articles
         WHERE instr(lower(title), ?1) > 0
            OR instr(lower(coalesce(content, '')), ?1) > 0
            OR instr(lower(excerpt), ?1) > 0
            OR instr(lower(category), ?1) > 0
            OR instr(lower(author), ?1) > 0
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    ) {
        Ok(s) => s,
        Err(_) => return vec![],
    };

    stmt.query_map(params![needle, limit.max(1)], Article::from_row)
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
}
