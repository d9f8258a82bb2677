use rocket::form::Form;
use rocket::response::Redirect;
use rocket::State;

use super::articles::StatusForm;
use super::{require_permission, AdminError};
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::role::Role;
use crate::models::user::{User, UserForm};
use crate::security::auth::{self, AuthGate, ClientInfo};
use crate::security::session::SessionContext;

pub const USER_STATUSES: &[&str] = &["active", "pending", "suspended"];
const MIN_PASSWORD_LEN: usize = 8;

/// Empty means "no role".
fn role_id_for(pool: &DbPool, name: Option<&str>) -> Result<Option<i64>, AdminError> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        None => Ok(None),
        Some(n) => Role::find_by_name(pool, n)
            .map(|r| Some(r.id))
            .ok_or_else(|| AdminError::BadRequest(format!("Unknown role: {}", n))),
    }
}

fn find_other_user(pool: &DbPool, session: &SessionContext, id: i64) -> Result<User, AdminError> {
    if session.user_id() == Some(id) {
        return Err(AdminError::BadRequest("You cannot change your own account here".to_string()));
    }
    User::get_by_id(pool, id).ok_or_else(|| AdminError::NotFound("User not found".to_string()))
}

// ── Create ─────────────────────────────────────────────

#[derive(Debug, FromForm)]
pub struct UserCreateForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

#[post("/users", data = "<form>")]
pub fn user_create(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    form: Form<UserCreateForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "manage_users")?;
    let username = form.username.trim();
    let email = form.email.trim();
    if username.is_empty() || !email.contains('@') {
        return Err(AdminError::BadRequest("Username and a valid email are required".to_string()));
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AdminError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    for identifier in [username, email] {
        match User::find_by_identifier(pool, identifier) {
            Ok(None) => {}
            Ok(Some(_)) => return Err(AdminError::BadRequest(format!("'{}' is already in use", identifier))),
            Err(e) => return Err(AdminError::internal("Checking for an existing user", e)),
        }
    }
    let role_id = role_id_for(pool, form.role.as_deref())?;
    let password_hash =
        auth::hash_password(&form.password).map_err(|e| AdminError::internal("Hashing the password", e))?;

    let id = User::create(
        pool,
        &UserForm {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            full_name: form.full_name.clone().unwrap_or_default().trim().to_string(),
            role_id,
            status: "active".to_string(),
        },
    )
    .map_err(|e| AdminError::internal("Creating the user", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "user_create",
        Some("user"),
        Some(id),
        Some(username),
        &client,
    );
    Ok(Redirect::to("/admin"))
}

// ── Status, role, delete ───────────────────────────────

/// Anything but `active` also ends the user's sessions.
#[post("/users/<id>/status", data = "<form>")]
pub fn user_status(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    id: i64,
    form: Form<StatusForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "manage_users")?;
    let status = form.status.trim();
    if !USER_STATUSES.contains(&status) {
        return Err(AdminError::BadRequest(format!("Unknown user status: {}", status)));
    }
    let user = find_other_user(pool, &session, id)?;

    User::update_status(pool, id, status).map_err(|e| AdminError::internal("Updating user status", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "user_status",
        Some("user"),
        Some(id),
        Some(&format!("'{}' {} -> {}", user.username, user.status, status)),
        &client,
    );
    Ok(Redirect::to("/admin"))
}

#[derive(Debug, FromForm)]
pub struct RoleForm {
    pub role: Option<String>,
}

#[post("/users/<id>/role", data = "<form>")]
pub fn user_role(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    id: i64,
    form: Form<RoleForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "manage_users")?;
    let user = find_other_user(pool, &session, id)?;
    let role_id = role_id_for(pool, form.role.as_deref())?;

    User::update_role(pool, id, role_id).map_err(|e| AdminError::internal("Updating the user's role", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "user_role",
        Some("user"),
        Some(id),
        Some(&format!(
            "'{}' role -> {}",
            user.username,
            form.role.as_deref().map(str::trim).filter(|r| !r.is_empty()).unwrap_or("none")
        )),
        &client,
    );
    Ok(Redirect::to("/admin"))
}

/// Sessions go with the user; articles stay with no author.
#[post("/users/<id>/delete")]
pub fn user_delete(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    id: i64,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "manage_users")?;
    let user = find_other_user(pool, &session, id)?;

    User::delete(pool, id).map_err(|e| AdminError::internal("Deleting the user", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "user_delete",
        Some("user"),
        Some(id),
        Some(&user.username),
        &client,
    );
    Ok(Redirect::to("/admin"))
}
