use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::article::Article;
use crate::models::file::{FileForm, FileRecord};
use crate::models::settings::Setting;

#[derive(FromForm)]
pub struct FileUpload<'r> {
    pub file: TempFile<'r>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub file_ids: Vec<i64>,
}

#[get("/files")]
pub fn list(_admin: AdminUser, pool: &State<DbPool>) -> Json<Vec<FileRecord>> {
    Json(FileRecord::list(pool))
}

/// Store the upload under a fresh key (original extension kept) and
/// record its metadata. The original filename survives only in the
/// record; the stored key never collides.
#[post("/files", data = "<upload>")]
pub async fn upload(
    admin: AdminUser,
    pool: &State<DbPool>,
    mut upload: Form<FileUpload<'_>>,
) -> Json<Value> {
    let file = &mut upload.file;

    let original_name = file
        .raw_name()
        .map(|rn| rn.dangerous_unsafe_unsanitized_raw().as_str().to_string())
        .unwrap_or_else(|| "upload".to_string());

    let ext = original_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_lowercase())
        .or_else(|| {
            file.content_type()
                .and_then(|ct| ct.extension())
                .map(|e| e.to_string())
        })
        .unwrap_or_else(|| "bin".to_string());

    let stored_name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
    let uploads_path = Setting::get_or(pool, "uploads_path", "website/uploads");
    let upload_dir = std::path::Path::new(&uploads_path);
    let _ = std::fs::create_dir_all(upload_dir);
    let dest = upload_dir.join(&stored_name);

    let size_bytes = file.len() as i64;
    let mime_type = file.content_type().map(|ct| ct.to_string());

    if file.persist_to(&dest).await.is_err() {
        log::error!("failed to persist upload {}", original_name);
        return Json(json!({"success": false, "error": "Upload failed"}));
    }

    let site_url = Setting::get_or(pool, "site_url", "http://localhost:8000");
    let bucket = Setting::get_or(pool, "uploads_bucket", "articles");

    let form = FileForm {
        name: stored_name.clone(),
        original_name,
        size_bytes,
        mime_type,
        bucket,
        file_path: dest.to_string_lossy().to_string(),
        public_url: Some(format!("{}/uploads/{}", site_url, stored_name)),
        uploaded_by: admin.user.email.clone(),
    };

    match FileRecord::create(pool, &form) {
        Ok(record) => Json(json!({"success": true, "file": record})),
        Err(_) => Json(json!({"success": false, "error": "Could not record uploaded file"})),
    }
}

#[delete("/files/<id>")]
pub fn delete(_admin: AdminUser, pool: &State<DbPool>, id: i64) -> Json<Value> {
    match FileRecord::delete(pool, id) {
        Ok(()) => Json(json!({"success": true})),
        Err(_) => Json(json!({"success": false, "error": "Could not delete file record"})),
    }
}

/// Publish the selected uploads as file-type articles. Partial
/// success is reported as such: the count that made it in plus the
/// error that stopped the loop.
#[post("/files/publish", format = "json", data = "<request>")]
pub fn publish(_admin: AdminUser, pool: &State<DbPool>, request: Json<PublishRequest>) -> Json<Value> {
    if request.file_ids.is_empty() {
        return Json(json!({"success": false, "error": "No files selected"}));
    }

    let report = Article::publish_from_files(pool, &request.file_ids);
    match report.error {
        None => Json(json!({"success": true, "created": report.created})),
        Some(error) => Json(json!({
            "success": false,
            "created": report.created,
            "error": error,
        })),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list, upload, delete, publish]
}
