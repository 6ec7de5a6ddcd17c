use rocket::response::content::RawXml;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{hash_ip, ClientIp};
use crate::db::DbPool;
use crate::feed;
use crate::models::article::{Article, ArticleFilter};
use crate::models::category::Category;
use crate::models::contact::{ContactForm, ContactMessage};
use crate::models::file::FileRecord;
use crate::models::newsletter::Subscriber;
use crate::models::settings::Setting;
use crate::rate_limit::RateLimiter;
use crate::search;

const RATE_WINDOW: std::time::Duration = std::time::Duration::from_secs(15 * 60);

// ── Articles ───────────────────────────────────────────

#[get("/articles?<category>&<status>&<limit>&<offset>")]
pub fn list_articles(
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

/// Article detail. File-type articles get their file record resolved
/// with a second lookup; a failed lookup yields "file": null and the
/// consumer decides what to render.
#[get("/article/<id>")]
pub fn article_detail(pool: &State<DbPool>, id: i64) -> Option<Json<Value>> {
    let article = Article::find(pool, id)?;

    let file = if article.article_type == "file" {
        article.file_id.and_then(|fid| FileRecord::find(pool, fid))
    } else {
        None
    };

    Some(Json(json!({
        "article": article,
        "file": file,
    })))
}

#[post("/article/<id>/view")]
pub fn record_view(pool: &State<DbPool>, id: i64) -> Option<Json<Value>> {
    match Article::increment_views(pool, id) {
        Ok(count) => Some(Json(json!({ "view_count": count }))),
        Err(_) => None,
    }
}

// ── Categories ─────────────────────────────────────────

#[get("/categories")]
pub fn list_categories(pool: &State<DbPool>) -> Json<Vec<Category>> {
    Json(Category::list(pool))
}

#[get("/category/<slug>?<limit>&<offset>")]
pub fn category_page(
    pool: &State<DbPool>,
    slug: &str,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Option<Json<Value>> {
    let category = Category::find_by_slug(pool, slug)?;

    let per_page = Setting::get_i64(pool, "articles_per_page").max(1);
    let filter = ArticleFilter {
        category: Some(category.name.clone()),
        status: Some("published".to_string()),
        limit: Some(limit.unwrap_or(per_page)),
        offset,
    };
    let articles = Article::list(pool, &filter);

    Some(Json(json!({
        "category": category,
        "articles": articles,
    })))
}

// ── Search ─────────────────────────────────────────────

#[get("/search?<q>&<limit>")]
pub fn search_articles(
    pool: &State<DbPool>,
    q: Option<String>,
    limit: Option<i64>,
) -> Json<Value> {
    let query = q.unwrap_or_default();
    let cap = Setting::get_i64(pool, "search_result_limit").max(1);
    let limit = limit.unwrap_or(cap).clamp(1, cap);

    let results = search::search_articles(pool, &query, limit);
    Json(json!({
        "query": query,
        "limit": limit,
        "results": results,
    }))
}

// ── Contact form ───────────────────────────────────────

#[post("/contact", format = "json", data = "<form>")]
pub fn contact_submit(
    pool: &State<DbPool>,
    limiter: &State<RateLimiter>,
    client_ip: ClientIp,
    form: Json<ContactForm>,
) -> Json<Value> {
    let rate_key = format!("contact:{}", hash_ip(&client_ip.0));
    let max_attempts = Setting::get_i64(pool, "contact_rate_limit").max(1) as u64;
    if !limiter.allow(&rate_key, max_attempts, RATE_WINDOW) {
        return Json(json!({
            "success": false,
            "error": "Too many messages. Please wait before sending another."
        }));
    }

    if form.name.trim().is_empty()
        || form.subject.trim().is_empty()
        || form.message.trim().is_empty()
    {
        return Json(json!({"success": false, "error": "All fields are required"}));
    }
    if !form.email.contains('@') {
        return Json(json!({"success": false, "error": "Invalid email address"}));
    }

    match ContactMessage::create(pool, &form) {
        Ok(message) => Json(json!({"success": true, "id": message.id})),
        Err(_) => Json(json!({"success": false, "error": "Could not submit your message"})),
    }
}

// ── Newsletter ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubscribeForm {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeForm {
    pub email: String,
}

#[post("/newsletter/subscribe", format = "json", data = "<form>")]
pub fn newsletter_subscribe(
    pool: &State<DbPool>,
    limiter: &State<RateLimiter>,
    client_ip: ClientIp,
    form: Json<SubscribeForm>,
) -> Json<Value> {
    let rate_key = format!("subscribe:{}", hash_ip(&client_ip.0));
    let max_attempts = Setting::get_i64(pool, "subscribe_rate_limit").max(1) as u64;
    if !limiter.allow(&rate_key, max_attempts, RATE_WINDOW) {
        return Json(json!({
            "success": false,
            "error": "Too many attempts. Please try again later."
        }));
    }

    let email = form.email.trim();
    if !email.contains('@') {
        return Json(json!({"success": false, "error": "Invalid email address"}));
    }

    match Subscriber::subscribe(pool, email, form.name.as_deref()) {
        Ok(subscriber) => Json(json!({"success": true, "id": subscriber.id})),
        // The store's uniqueness constraint is the duplicate guard;
        // translate its error for the reader.
        Err(e) if e.contains("UNIQUE") => Json(json!({
            "success": false,
            "error": "This email is already subscribed"
        })),
        Err(_) => Json(json!({"success": false, "error": "Subscription failed"})),
    }
}

#[post("/newsletter/unsubscribe", format = "json", data = "<form>")]
pub fn newsletter_unsubscribe(pool: &State<DbPool>, form: Json<UnsubscribeForm>) -> Json<Value> {
    match Subscriber::unsubscribe(pool, form.email.trim()) {
        Ok(()) => Json(json!({"success": true})),
        Err(_) => Json(json!({"success": false, "error": "Unsubscribe failed"})),
    }
}

// ── Feed ───────────────────────────────────────────────

#[get("/feed")]
pub fn rss_feed(pool: &State<DbPool>) -> RawXml<String> {
    RawXml(feed::generate_feed(pool))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        list_articles,
        article_detail,
        record_view,
        list_categories,
        category_page,
        search_articles,
        contact_submit,
        newsletter_subscribe,
        newsletter_unsubscribe,
    ]
}

pub fn feed_routes() -> Vec<rocket::Route> {
    routes![rss_feed]
}
