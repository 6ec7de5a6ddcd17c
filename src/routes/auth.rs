use rocket::http::CookieJar;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth;
use crate::auth::{AuthenticatedUser, ClientIp};
use crate::db::DbPool;
use crate::models::settings::Setting;
use crate::models::user::User;
use crate::rate_limit::RateLimiter;

const RATE_WINDOW: std::time::Duration = std::time::Duration::from_secs(15 * 60);

#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

/// Account creation: identity and profile land in one row, then a
/// session opens immediately, mirroring a sign-up that returns a live
/// session.
#[post("/signup", format = "json", data = "<form>")]
pub fn signup(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    client_ip: ClientIp,
    form: Json<SignUpForm>,
) -> Json<Value> {
    let email = form.email.trim().to_lowercase();
    if !email.contains('@') {
        return Json(json!({"success": false, "error": "Invalid email address"}));
    }
    if form.password.len() < 8 {
        return Json(json!({
            "success": false,
            "error": "Password must be at least 8 characters"
        }));
    }

    let hash = match auth::hash_password(&form.password) {
        Ok(h) => h,
        Err(_) => return Json(json!({"success": false, "error": "Sign up failed"})),
    };

    let user = match User::create(pool, &email, &hash, form.full_name.as_deref(), "reader") {
        Ok(u) => u,
        Err(e) if e.contains("UNIQUE") => {
            return Json(json!({
                "success": false,
                "error": "This email is already registered"
            }))
        }
        Err(_) => return Json(json!({"success": false, "error": "Sign up failed"})),
    };

    match auth::create_session(pool, user.id, Some(&client_ip.0), None) {
        Ok(session_id) => {
            auth::set_session_cookie(cookies, &session_id);
            Json(json!({"success": true, "user": user.safe_json()}))
        }
        Err(_) => Json(json!({"success": true, "user": user.safe_json(), "session": false})),
    }
}

#[post("/signin", format = "json", data = "<form>")]
pub fn signin(
    pool: &State<DbPool>,
    limiter: &State<RateLimiter>,
    cookies: &CookieJar<'_>,
    client_ip: ClientIp,
    form: Json<SignInForm>,
) -> Json<Value> {
    let rate_key = format!("signin:{}", auth::hash_ip(&client_ip.0));
    let max_attempts = Setting::get_i64(pool, "login_rate_limit").max(1) as u64;
    if !limiter.allow(&rate_key, max_attempts, RATE_WINDOW) {
        return Json(json!({
            "success": false,
            "error": "Too many sign-in attempts. Please try again in 15 minutes."
        }));
    }

    let email = form.email.trim().to_lowercase();
    let user = match User::get_by_email(pool, &email) {
        Some(u) => u,
        None => return Json(json!({"success": false, "error": "Invalid credentials"})),
    };

    if !auth::verify_password(&form.password, &user.password_hash) {
        return Json(json!({"success": false, "error": "Invalid credentials"}));
    }

    match auth::create_session(pool, user.id, Some(&client_ip.0), None) {
        Ok(session_id) => {
            auth::set_session_cookie(cookies, &session_id);
            Json(json!({"success": true, "user": user.safe_json()}))
        }
        Err(_) => Json(json!({"success": false, "error": "Session creation failed"})),
    }
}

#[post("/signout")]
pub fn signout(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> Json<Value> {
    if let Some(session_id) = auth::session_cookie_value(cookies) {
        let _ = auth::destroy_session(pool, &session_id);
    }
    auth::clear_session_cookie(cookies);
    Json(json!({"success": true}))
}

/// Current session, if any. Anonymous callers get user: null rather
/// than an error.
#[get("/session")]
pub fn session(user: Option<AuthenticatedUser>) -> Json<Value> {
    match user {
        Some(auth_user) => Json(json!({"user": auth_user.user.safe_json()})),
        None => Json(json!({"user": null})),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![signup, signin, signout, session]
}
