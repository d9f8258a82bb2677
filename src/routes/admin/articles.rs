use chrono::Utc;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket::State;

use super::{require_permission, AdminError};
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::article::{Article, ArticleForm};
use crate::models::category::Category;
use crate::models::tag::Tag;
use crate::security::auth::{AuthGate, ClientInfo};
use crate::text;

pub const ARTICLE_STATUSES: &[&str] = &["draft", "published", "archived"];

/// Comma-separated tag names, trimmed, empties dropped.
fn tag_names(raw: Option<&str>) -> Vec<&str> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Replace an article's category and tag links.
fn apply_taxonomy(pool: &DbPool, article_id: i64, categories: &[i64], tags: Option<&str>) -> Result<(), String> {
    Category::set_for_article(pool, article_id, categories)?;
    let tag_ids = tag_names(tags)
        .into_iter()
        .map(|name| Tag::find_or_create(pool, name))
        .collect::<Result<Vec<i64>, String>>()?;
    Tag::set_for_article(pool, article_id, &tag_ids)
}

/// A slug not used by any other article yet.
fn unique_slug(pool: &DbPool, title: &str) -> Result<String, String> {
    let now = Utc::now();
    let base = text::slugify_title(title, now);
    if !Article::slug_exists(pool, &base)? {
        return Ok(base);
    }
    Ok(format!("{}-{}", base, now.timestamp_millis()))
}

// ── Create ─────────────────────────────────────────────

#[derive(Debug, FromForm)]
pub struct ArticleCreateForm {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub categories: Vec<i64>,
    pub tags: Option<String>,
}

/// New articles start as drafts written by the current user.
#[post("/articles", data = "<form>")]
pub fn article_create(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    form: Form<ArticleCreateForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "create_articles")?;
    let title = form.title.trim();
    if title.is_empty() {
        return Err(AdminError::BadRequest("Title is required".to_string()));
    }

    let slug = unique_slug(pool, title).map_err(|e| AdminError::internal("Choosing a slug", e))?;
    let id = Article::create(
        pool,
        &ArticleForm {
            title: title.to_string(),
            slug,
            excerpt: form.excerpt.clone().filter(|e| !e.trim().is_empty()),
            content: form.content.clone(),
            author_id: session.user_id(),
            status: "draft".to_string(),
            featured: false,
            breaking_news: false,
            featured_image: None,
            published_at: None,
        },
    )
    .map_err(|e| AdminError::internal("Creating the article", e))?;

    apply_taxonomy(pool, id, &form.categories, form.tags.as_deref())
        .map_err(|e| AdminError::internal("Linking categories and tags", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "article_create",
        Some("article"),
        Some(id),
        Some(title),
        &client,
    );
    Ok(Redirect::to("/admin"))
}

// ── Status ─────────────────────────────────────────────

#[derive(Debug, FromForm)]
pub struct StatusForm {
    pub status: String,
}

#[post("/articles/<id>/status", data = "<form>")]
pub fn article_status(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    id: i64,
    form: Form<StatusForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "publish_articles")?;
    let status = form.status.trim();
    if !ARTICLE_STATUSES.contains(&status) {
        return Err(AdminError::BadRequest(format!("Unknown article status: {}", status)));
    }
    let article =
        Article::find_by_id(pool, id).ok_or_else(|| AdminError::NotFound("Article not found".to_string()))?;

    Article::update_status(pool, id, status).map_err(|e| AdminError::internal("Updating article status", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "article_status",
        Some("article"),
        Some(id),
        Some(&format!("'{}' {} -> {}", article.title, article.status, status)),
        &client,
    );
    Ok(Redirect::to("/admin"))
}

// ── Featured / breaking flags ──────────────────────────

#[derive(Debug, FromForm)]
pub struct FlagsForm {
    pub featured: bool,
    pub breaking_news: bool,
}

#[post("/articles/<id>/feature", data = "<form>")]
pub fn article_flags(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    id: i64,
    form: Form<FlagsForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "edit_articles")?;
    let article =
        Article::find_by_id(pool, id).ok_or_else(|| AdminError::NotFound("Article not found".to_string()))?;

    Article::set_flags(pool, id, form.featured, form.breaking_news)
        .map_err(|e| AdminError::internal("Updating article flags", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "article_flags",
        Some("article"),
        Some(id),
        Some(&format!(
            "'{}' featured={} breaking={}",
            article.title, form.featured, form.breaking_news
        )),
        &client,
    );
    Ok(Redirect::to("/admin"))
}

// ── Categories and tags ────────────────────────────────

#[derive(Debug, FromForm)]
pub struct TaxonomyForm {
    pub categories: Vec<i64>,
    pub tags: Option<String>,
}

#[post("/articles/<id>/taxonomy", data = "<form>")]
pub fn article_taxonomy(
    pool: &State<DbPool>,
    gate: AuthGate,
    client: ClientInfo,
    id: i64,
    form: Form<TaxonomyForm>,
) -> Result<Redirect, AdminError> {
    let session = require_permission(pool, gate, "edit_articles")?;
    let article =
        Article::find_by_id(pool, id).ok_or_else(|| AdminError::NotFound("Article not found".to_string()))?;

    apply_taxonomy(pool, id, &form.categories, form.tags.as_deref())
        .map_err(|e| AdminError::internal("Linking categories and tags", e))?;

    ActivityEntry::log(
        pool,
        session.user_id(),
        "article_taxonomy",
        Some("article"),
        Some(id),
        Some(&article.title),
        &client,
    );
    Ok(Redirect::to("/admin"))
}
