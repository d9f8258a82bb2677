use rocket::form::Form;
use rocket::response::Redirect;
use rocket::State;

use super::articles::StatusForm;
use super::{require_permission, AdminError};
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::comment::Comment;
use crate::security::auth::{AuthGate, ClientInfo};

pub const COMMENT_STATUSES: &[&str] = &["pending", "approved", "spam"];

#[post("/comments/<id>/status", data = "<form>")]
pub fn comment_status(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    id: i64,
    form: Form<StatusForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "moderate_comments")?;
    let status = form.status.trim();
    if !COMMENT_STATUSES.contains(&status) {
        return Err(AdminError::BadRequest(format!("Unknown comment status: {}", status)));
    }
    let comment =
        Comment::find_by_id(pool, id).ok_or_else(|| AdminError::NotFound("Comment not found".to_string()))?;

    Comment::update_status(pool, id, status).map_err(|e| AdminError::internal("Moderating the comment", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "comment_status",
        Some("comment"),
        Some(id),
        Some(&format!("comment by '{}' on article {} -> {}", comment.author_name, comment.article_id, status)),
        &client,
    );
    Ok(Redirect::to("/admin"))
}
