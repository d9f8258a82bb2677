use rocket::response::Redirect;

use crate::db::DbPool;
use crate::security::auth::AuthGate;
use crate::security::permissions::has_permission;
use crate::security::session::SessionContext;

pub mod articles;
pub mod categories;
pub mod comments;
pub mod dashboard;
pub mod media;
pub mod roles;
pub mod settings;
pub mod users;

#[derive(Debug, Responder)]
pub enum AdminError {
    Login(Redirect),
    #[response(status = 403)]
    Forbidden(String),
    #[response(status = 404)]
    NotFound(String),
    #[response(status = 400)]
    BadRequest(String),
    #[response(status = 500)]
    Internal(String),
}

impl AdminError {
    /// A write that failed after its target was found: log it and answer 500.
    pub fn internal(action: &str, e: String) -> Self {
        log::error!("{} failed: {}", action, e);
        AdminError::Internal(format!("{} failed", action))
    }
}

pub(crate) fn require_permission(
    pool: &DbPool,
    gate: AuthGate,
    permission: &str,
) -> Result<SessionContext, AdminError> {
    let session = gate.require().map_err(AdminError::Login)?;
    if !has_permission(pool, &session, permission) {
        log::info!(
            "User {:?} denied '{}'",
            session.state().map(|s| s.username.as_str()),
            permission
        );
        return Err(AdminError::Forbidden(format!("Missing permission: {}", permission)));
    }
    Ok(session)
}

/// Any other admin path: the gate still runs, then the dashboard or login.
#[get("/<_..>", rank = 20)]
pub fn fallback(gate: AuthGate) -> Redirect {
    match gate.require() {
        Ok(_) => Redirect::to("/admin"),
        Err(login) => login,
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        dashboard::dashboard,
        articles::article_create,
        articles::article_status,
        articles::article_flags,
        articles::article_taxonomy,
        categories::category_create,
        categories::category_delete,
        comments::comment_status,
        users::user_create,
        users::user_status,
        users::user_role,
        users::user_delete,
        roles::roles_list,
        roles::role_create,
        roles::role_permission,
        roles::permission_create,
        settings::settings_update,
        media::upload,
        fallback,
    ]
}
