use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use super::{require_permission, AdminError};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::security::auth::{AuthGate, ClientInfo};
use crate::uploads::{UploadError, UploadPolicy};

#[derive(FromForm)]
pub struct UploadForm<'r> {
    pub file: TempFile<'r>,
    pub prefix: Option<String>,
}

#[post("/uploads", data = "<form>")]
pub async fn upload(
    pool: &State<DbPool>,
    config: &State<AppConfig>,
    gate: AuthGate,
    client: ClientInfo,
    mut form: Form<UploadForm<'_>>,
) -> Result<Json<Value>, AdminError> {
    let session = require_permission(pool, gate, "upload_files")?;
    let policy = UploadPolicy::from_config(config);
    let prefix = form.prefix.clone().unwrap_or_else(|| "upload".to_string());

    let filename = policy.save(&mut form.file, &prefix).await.map_err(|e| match e {
        UploadError::Io(io) => AdminError::internal("Storing the upload", io.to_string()),
        other => {
            log::warn!("Upload rejected: {}", other);
            AdminError::BadRequest(other.to_string())
        }
    })?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "upload",
        Some("file"),
        None,
        Some(&filename),
        &client,
    );
    Ok(Json(json!({ "ok": true, "filename": filename, "url": format!("/uploads/{}", filename) })))
}
