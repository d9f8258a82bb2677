use std::collections::HashMap;

use rocket::form::Form;
use rocket::response::Redirect;
use rocket::State;

use super::{require_permission, AdminError};
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::settings::Setting;
use crate::security::auth::{AuthGate, ClientInfo};

/// Keys the settings form may write. Anything else is rejected.
pub const EDITABLE_SETTINGS: &[&str] = &[
    "site_name",
    "site_tagline",
    "site_url",
    "home_featured_limit",
    "home_breaking_limit",
    "home_trending_limit",
    "home_latest_limit",
    "home_category_limit",
    "category_page_limit",
    "activity_feed_limit",
    "login_rate_limit",
    "comment_rate_limit",
];

#[derive(Debug, FromForm)]
pub struct SettingsForm {
    pub values: HashMap<String, String>,
}

#[post("/settings", data = "<form>")]
pub fn settings_update(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    form: Form<SettingsForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "manage_settings")?;
    if let Some(key) = form.values.keys().find(|k| !EDITABLE_SETTINGS.contains(&k.as_str())) {
        return Err(AdminError::BadRequest(format!("Unknown setting: {}", key)));
    }

    let mut keys: Vec<&String> = form.values.keys().collect();
    keys.sort();
    for key in &keys {
        Setting::set(pool, key, form.values[*key].trim()).map_err(|e| AdminError::internal("Saving settings", e))?;
    }

    let changed: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
    ActivityEntry::log(
        pool,
        session.user_id(),
        "settings_update",
        Some("settings"),
        None,
        Some(&changed.join(", ")),
        &client,
    );
    Ok(Redirect::to("/admin"))
}
