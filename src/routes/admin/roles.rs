use rocket::form::Form;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use super::{require_permission, AdminError};
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::role::{Permission, Role};
use crate::security::auth::{AuthGate, ClientInfo};

/// Every role with its granted permissions, plus the full permission list.
#[get("/roles")]
pub fn roles_list(pool: &State<DbPool>, gate: AuthGate) -> Result<Json<Value>, AdminError> {
    require_permission(pool, gate, "manage_roles")?;
    let roles: Vec<Value> = Role::list(pool)
        .into_iter()
        .map(|role| {
            let granted: Vec<String> = Role::permissions(pool, role.id)
                .into_iter()
                .map(|p| p.name)
                .collect();
            json!({ "id": role.id, "name": role.name, "permissions": granted })
        })
        .collect();
    Ok(Json(json!({ "roles": roles, "permissions": Permission::list(pool) })))
}

#[derive(Debug, FromForm)]
pub struct NameForm {
    pub name: String,
    pub description: Option<String>,
}

fn valid_name(raw: &str) -> Result<String, AdminError> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AdminError::BadRequest(
            "Names may only use letters, digits and underscores".to_string(),
        ));
    }
    Ok(name)
}

#[post("/roles", data = "<form>")]
pub fn role_create(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    form: Form<NameForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "manage_roles")?;
    let name = valid_name(&form.name)?;
    if Role::find_by_name(pool, &name).is_some() {
        return Err(AdminError::BadRequest(format!("Role '{}' already exists", name)));
    }
    let id = Role::create(pool, &name).map_err(|e| AdminError::internal("Creating the role", e))?;

    ActivityEntry::log(pool, session.user_id(), "role_create", Some("role"), Some(id), Some(&name), &client);
    Ok(Redirect::to("/admin/roles"))
}

#[post("/permissions", data = "<form>")]
pub fn permission_create(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    form: Form<NameForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "manage_roles")?;
    let name = valid_name(&form.name)?;
    if Permission::list(pool).iter().any(|p| p.name == name) {
        return Err(AdminError::BadRequest(format!("Permission '{}' already exists", name)));
    }
    let description = form.description.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let id = Permission::create(pool, &name, description)
        .map_err(|e| AdminError::internal("Creating the permission", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "permission_create",
        Some("permission"),
        Some(id),
        Some(&name),
        &client,
    );
    Ok(Redirect::to("/admin/roles"))
}

#[derive(Debug, FromForm)]
pub struct GrantForm {
    pub permission: String,
    pub granted: bool,
}

/// Grant or revoke one permission on a role.
#[post("/roles/<name>/permissions", data = "<form>")]
pub fn role_permission(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    name: &str,
    form: Form<GrantForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "manage_roles")?;
    let role = Role::find_by_name(pool, name).ok_or_else(|| AdminError::NotFound("Role not found".to_string()))?;
    let permission = form.permission.trim();
    if !Permission::list(pool).iter().any(|p| p.name == permission) {
        return Err(AdminError::BadRequest(format!("Unknown permission: {}", permission)));
    }

    let (action, result) = if form.granted {
        ("permission_grant", Role::grant(pool, role.id, permission))
    } else {
        ("permission_revoke", Role::revoke(pool, role.id, permission))
    };
    result.map_err(|e| AdminError::internal("Changing role permissions", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        action,
        Some("role"),
        Some(role.id),
        Some(&format!("{} {}", role.name, permission)),
        &client,
    );
    Ok(Redirect::to("/admin/roles"))
}
