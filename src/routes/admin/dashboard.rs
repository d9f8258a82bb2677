use rocket::response::Redirect;
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::{json, Value};

use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::article::Article;
use crate::models::settings::SiteSettings;
use crate::models::user::User;
use crate::routes::auth::NoCacheTemplate;
use crate::security::auth::AuthGate;
use crate::security::permissions::permission_flags;
use crate::text;

/// Permissions the dashboard shows or hides controls for.
const DASHBOARD_PERMISSIONS: &[&str] = &[
    "create_articles",
    "edit_articles",
    "publish_articles",
    "upload_files",
    "manage_users",
    "manage_settings",
    "view_activity",
];

#[get("/")]
pub fn dashboard(pool: &State<DbPool>, gate: AuthGate) -> Result<NoCacheTemplate, Redirect> {
    let session = gate.require()?;
    let settings = SiteSettings::load(pool);
    let now = chrono::Utc::now().naive_utc();
    let flags = permission_flags(pool, &session, DASHBOARD_PERMISSIONS);
    let can_view_activity = flags.get("view_activity").copied().unwrap_or(false);

    let (activity, activity_total, failed_logins): (Vec<Value>, i64, i64) = if can_view_activity {
        let entries = ActivityEntry::recent(pool, settings.activity_feed_limit)
            .iter()
            .map(|e| json!({ "entry": e, "time_ago": text::time_ago(e.created_at, now) }))
            .collect();
        (
            entries,
            ActivityEntry::count(pool),
            ActivityEntry::count_for_action(pool, "login_failed"),
        )
    } else {
        (vec![], 0, 0)
    };

    let user = session
        .user_id()
        .and_then(|id| User::get_by_id(pool, id))
        .map(|u| u.safe_json());

    let context = json!({
        "settings": settings,
        "session": session.state(),
        "user": user,
        "can": flags,
        "activity": activity,
        "stats": {
            "published": Article::count(pool, Some("published")),
            "drafts": Article::count(pool, Some("draft")),
            "total": Article::count(pool, None),
            "users": User::count(pool),
            "activity": activity_total,
            "failed_logins": failed_logins,
        },
    });
    Ok(NoCacheTemplate(Template::render("admin/dashboard", &context)))
}
