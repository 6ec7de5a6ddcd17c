use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::contact::ContactMessage;

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

#[get("/messages")]
pub fn list(_admin: AdminUser, pool: &State<DbPool>) -> Json<Vec<ContactMessage>> {
    Json(ContactMessage::list(pool))
}

#[put("/messages/<id>/status", format = "json", data = "<form>")]
pub fn update_status(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    form: Json<StatusForm>,
) -> Json<Value> {
    match ContactMessage::update_status(pool, id, &form.status) {
        Ok(()) => Json(json!({"success": true})),
        Err(e) => Json(json!({"success": false, "error": e})),
    }
}

#[delete("/messages/<id>")]
pub fn delete(_admin: AdminUser, pool: &State<DbPool>, id: i64) -> Json<Value> {
    match ContactMessage::delete(pool, id) {
        Ok(()) => Json(json!({"success": true})),
        Err(_) => Json(json!({"success": false, "error": "Could not delete message"})),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list, update_status, delete]
}
