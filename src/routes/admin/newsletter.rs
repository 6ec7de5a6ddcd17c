use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::newsletter::{Campaign, CampaignForm, Subscriber};

const CAMPAIGN_TYPES: &[&str] = &["broadcast", "new_article"];

#[derive(Debug, Deserialize)]
pub struct CampaignStatusForm {
    pub status: String,
    pub sent_count: Option<i64>,
}

// ── Subscribers ────────────────────────────────────────

#[get("/subscribers")]
pub fn subscribers(_admin: AdminUser, pool: &State<DbPool>) -> Json<Vec<Subscriber>> {
    Json(Subscriber::active_list(pool))
}

#[delete("/subscribers/<id>")]
pub fn delete_subscriber(_admin: AdminUser, pool: &State<DbPool>, id: i64) -> Json<Value> {
    match Subscriber::delete(pool, id) {
        Ok(()) => Json(json!({"success": true})),
        Err(_) => Json(json!({"success": false, "error": "Could not delete subscriber"})),
    }
}

// ── Campaigns ──────────────────────────────────────────

#[get("/campaigns")]
pub fn campaigns(_admin: AdminUser, pool: &State<DbPool>) -> Json<Vec<Campaign>> {
    Json(Campaign::list(pool))
}

#[post("/campaigns", format = "json", data = "<form>")]
pub fn create_campaign(
    admin: AdminUser,
    pool: &State<DbPool>,
    form: Json<CampaignForm>,
) -> Json<Value> {
    if form.title.trim().is_empty() || form.subject.trim().is_empty() {
        return Json(json!({"success": false, "error": "Title and subject are required"}));
    }
    if !CAMPAIGN_TYPES.contains(&form.r#type.as_str()) {
        return Json(json!({"success": false, "error": "Type must be 'broadcast' or 'new_article'"}));
    }

    let mut form = form.into_inner();
    if form.created_by.trim().is_empty() {
        form.created_by = admin.user.email.clone();
    }

    match Campaign::create(pool, &form) {
        Ok(campaign) => Json(json!({"success": true, "campaign": campaign})),
        Err(_) => Json(json!({"success": false, "error": "Could not create campaign"})),
    }
}

#[put("/campaigns/<id>/status", format = "json", data = "<form>")]
pub fn update_campaign_status(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    form: Json<CampaignStatusForm>,
) -> Json<Value> {
    match Campaign::update_status(pool, id, &form.status, form.sent_count) {
        Ok(()) => Json(json!({"success": true})),
        Err(e) => Json(json!({"success": false, "error": e})),
    }
}

#[delete("/campaigns/<id>")]
pub fn delete_campaign(_admin: AdminUser, pool: &State<DbPool>, id: i64) -> Json<Value> {
    match Campaign::delete(pool, id) {
        Ok(()) => Json(json!({"success": true})),
        Err(_) => Json(json!({"success": false, "error": "Could not delete campaign"})),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        subscribers,
        delete_subscriber,
        campaigns,
        create_campaign,
        update_campaign_status,
        delete_campaign,
    ]
}
