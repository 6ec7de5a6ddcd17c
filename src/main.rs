#[macro_use]
extern crate rocket;

use rocket::fs::FileServer;
use rocket::serde::json::Json;
use serde_json::{json, Value};

mod auth;
mod db;
mod feed;
mod models;
mod rate_limit;
mod routes;
mod search;
mod tests;

use rate_limit::RateLimiter;

#[catch(401)]
fn unauthorized() -> Json<Value> {
    Json(json!({"success": false, "error": "Authentication required"}))
}

#[catch(403)]
fn forbidden() -> Json<Value> {
    Json(json!({"success": false, "error": "Admin access required"}))
}

#[catch(404)]
fn not_found() -> Json<Value> {
    Json(json!({"success": false, "error": "Not found"}))
}

#[catch(422)]
fn unprocessable() -> Json<Value> {
    Json(json!({"success": false, "error": "Malformed request body"}))
}

#[catch(500)]
fn server_error() -> Json<Value> {
    Json(json!({"success": false, "error": "Internal server error"}))
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    let pool = db::init_pool().expect("Failed to initialize database pool");
    db::run_migrations(&pool).expect("Failed to run database migrations");
    db::seed_defaults(&pool).expect("Failed to seed defaults");

    // Stale sessions from previous runs
    if let Err(e) = auth::cleanup_expired_sessions(&pool) {
        log::warn!("session cleanup failed: {}", e);
    }

    rocket::build()
        .manage(pool)
        .manage(RateLimiter::new())
        .mount("/uploads", FileServer::from("website/uploads"))
        .mount("/", routes::public::feed_routes())
        .mount("/api", routes::public::routes())
        .mount("/auth", routes::auth::routes())
        .mount("/admin", routes::admin::routes())
        .register(
            "/",
            catchers![unauthorized, forbidden, not_found, unprocessable, server_error],
        )
}
