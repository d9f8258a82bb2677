use rocket::form::Form;
use rocket::response::Redirect;
use rocket::State;

use super::{require_permission, AdminError};
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::category::{Category, CategoryForm};
use crate::security::auth::{AuthGate, ClientInfo};

#[derive(Debug, FromForm)]
pub struct CategoryCreateForm {
    pub name: String,
    pub slug: Option<String>,
    pub parent_id: Option<i64>,
    pub description: Option<String>,
}

#[post("/categories", data = "<form>")]
pub fn category_create(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    form: Form<CategoryCreateForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "manage_categories")?;
    let name = form.name.trim();
    let cat_slug = match form.slug.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => slug::slugify(s),
        _ => slug::slugify(name),
    };
    if name.is_empty() || cat_slug.is_empty() {
        return Err(AdminError::BadRequest("Category name is required".to_string()));
    }
    if let Some(parent) = form.parent_id {
        if Category::find_by_id(pool, parent).is_none() {
            return Err(AdminError::BadRequest("Parent category not found".to_string()));
        }
    }

    let id = Category::create(
        pool,
        &CategoryForm {
            name: name.to_string(),
            slug: cat_slug,
            parent_id: form.parent_id,
            description: form.description.clone().filter(|d| !d.trim().is_empty()),
        },
    )
    .map_err(|e| AdminError::internal("Creating the category", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "category_create",
        Some("category"),
        Some(id),
        Some(name),
        &client,
    );
    Ok(Redirect::to("/admin"))
}

/// Children of a deleted category become top-level.
#[post("/categories/<id>/delete")]
pub fn category_delete(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    id: i64,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "manage_categories")?;
    let category =
        Category::find_by_id(pool, id).ok_or_else(|| AdminError::NotFound("Category not found".to_string()))?;

    Category::delete(pool, id).map_err(|e| AdminError::internal("Deleting the category", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "category_delete",
        Some("category"),
        Some(id),
        Some(&category.name),
        &client,
    );
    Ok(Redirect::to("/admin"))
}
