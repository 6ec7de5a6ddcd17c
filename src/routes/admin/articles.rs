use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::article::{Article, ArticleFilter, ArticleForm, ArticlePatch};

const ARTICLE_STATUSES: &[&str] = &["draft", "published"];
const ARTICLE_TYPES: &[&str] = &["text", "file"];

fn validate_form(form: &ArticleForm) -> Option<&'static str> {
    if form.title.trim().is_empty() {
        return Some("Title is required");
    }
    if form.category.trim().is_empty() {
        return Some("Category is required");
    }
    if form.author.trim().is_empty() {
        return Some("Author is required");
    }
    if !ARTICLE_STATUSES.contains(&form.status.as_str()) {
        return Some("Status must be 'draft' or 'published'");
    }
    if !ARTICLE_TYPES.contains(&form.article_type.as_str()) {
        return Some("Article type must be 'text' or 'file'");
    }
    None
}

/// Admin listing: drafts included, same filter semantics as the
/// public listing.
#[get("/articles?<category>&<status>&<limit>&<offset>")]
pub fn list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    category: Option<String>,
    status: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Json<Vec<Article>> {
    let filter = ArticleFilter {
        category,
        status,
        limit,
        offset,
    };
    Json(Article::list(pool, &filter))
}

#[post("/articles", format = "json", data = "<form>")]
pub fn create(_admin: AdminUser, pool: &State<DbPool>, form: Json<ArticleForm>) -> Json<Value> {
    if let Some(error) = validate_form(&form) {
        return Json(json!({"success": false, "error": error}));
    }

    match Article::create(pool, &form) {
        Ok(article) => Json(json!({"success": true, "article": article})),
        Err(_) => Json(json!({"success": false, "error": "Could not create article"})),
    }
}

#[put("/articles/<id>", format = "json", data = "<patch>")]
pub fn update(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    patch: Json<ArticlePatch>,
) -> Json<Value> {
    if let Some(ref status) = patch.status {
        if !ARTICLE_STATUSES.contains(&status.as_str()) {
            return Json(json!({"success": false, "error": "Status must be 'draft' or 'published'"}));
        }
    }
    if let Some(ref article_type) = patch.article_type {
        if !ARTICLE_TYPES.contains(&article_type.as_str()) {
            return Json(json!({"success": false, "error": "Article type must be 'text' or 'file'"}));
        }
    }

    match Article::update(pool, id, &patch) {
        Ok(article) => Json(json!({"success": true, "article": article})),
        Err(_) => Json(json!({"success": false, "error": "Could not update article"})),
    }
}

#[delete("/articles/<id>")]
pub fn delete(_admin: AdminUser, pool: &State<DbPool>, id: i64) -> Json<Value> {
    match Article::delete(pool, id) {
        Ok(()) => Json(json!({"success": true})),
        Err(_) => Json(json!({"success": false, "error": "Could not delete article"})),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list, create, update, delete]
}
