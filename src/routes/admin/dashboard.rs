use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::article::Article;
use crate::models::contact::ContactMessage;
use crate::models::file::FileRecord;
use crate::models::newsletter::{Campaign, Subscriber};
use crate::models::user::User;

/// One round trip for every number the dashboard shows. Totals are
/// aggregated by the store over all rows, not over a fetched page.
#[get("/")]
pub fn dashboard(_admin: AdminUser, pool: &State<DbPool>) -> Json<Value> {
    Json(json!({
        "total_articles": Article::count(pool, None),
        "published_articles": Article::count(pool, Some("published")),
        "draft_articles": Article::count(pool, Some("draft")),
        "total_files": FileRecord::count(pool),
        "total_views": Article::total_views(pool),
        "unread_messages": ContactMessage::unread_count(pool),
        "active_subscribers": Subscriber::active_count(pool),
        "campaigns": Campaign::count(pool),
        "users": User::count(pool),
    }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![dashboard]
}
