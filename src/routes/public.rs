use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use rocket::form::Form;
use rocket::response::Redirect;
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::{json, Value};

use crate::db::DbPool;
use crate::models::article::{Article, ArticleView};
use crate::models::category::Category;
use crate::models::activity::ActivityEntry;
use crate::models::comment::{Comment, CommentForm};
use crate::models::settings::{Setting, SiteSettings};
use crate::models::tag::Tag;
use crate::rate_limit::RateLimiter;
use crate::security::auth::ClientInfo;
use crate::text;

const CARD_EXCERPT_CHARS: usize = 160;
const COMMENT_WINDOW: Duration = Duration::from_secs(10 * 60);
const MAX_COMMENT_NAME: usize = 80;
const MAX_COMMENT_BODY: usize = 4000;

/// Article plus the display fields the templates need.
fn card(article: &ArticleView, now: NaiveDateTime) -> Value {
    let summary = match article.excerpt.as_deref().filter(|e| !e.trim().is_empty()) {
        Some(e) => text::excerpt(e, CARD_EXCERPT_CHARS),
        None => text::excerpt(&article.content, CARD_EXCERPT_CHARS),
    };
    let shown_at = article.published_at.unwrap_or(article.created_at);
    json!({
        "article": article,
        "summary": summary,
        "time_ago": text::time_ago(shown_at, now),
    })
}

fn cards(articles: &[ArticleView], now: NaiveDateTime) -> Vec<Value> {
    articles.iter().map(|a| card(a, now)).collect()
}

// ── Homepage ───────────────────────────────────────────

#[get("/")]
pub fn index(pool: &State<DbPool>) -> Template {
    let settings = SiteSettings::load(pool);
    let now = Utc::now().naive_utc();

    let featured = ArticleView::featured(pool, settings.featured_limit);
    let breaking = ArticleView::breaking(pool, settings.breaking_limit);
    let trending = ArticleView::trending(pool, settings.trending_limit);
    let latest = ArticleView::latest(pool, settings.latest_limit);
    let categories = Category::top_level(pool, settings.category_limit);

    let context = json!({
        "settings": settings,
        "featured": cards(&featured, now),
        "breaking": cards(&breaking, now),
        "trending": cards(&trending, now),
        "latest": cards(&latest, now),
        "categories": categories,
        "page_type": "home",
    });
    Template::render("index", &context)
}

// ── Category ───────────────────────────────────────────

#[get("/category/<id>")]
pub fn category_page(pool: &State<DbPool>, id: i64) -> Option<Template> {
    let category = Category::find_by_id(pool, id)?;
    let settings = SiteSettings::load(pool);
    let now = Utc::now().naive_utc();

    let articles = ArticleView::by_category(pool, category.id, settings.category_page_limit);
    let children = Category::children(pool, category.id);
    let categories = Category::top_level(pool, settings.category_limit);

    let context = json!({
        "settings": settings,
        "category": category,
        "subcategories": children,
        "articles": cards(&articles, now),
        "categories": categories,
        "page_type": "category",
    });
    Some(Template::render("category", &context))
}

// ── Article ────────────────────────────────────────────

#[get("/article/<slug>?<comment>")]
pub fn article_page(pool: &State<DbPool>, slug: &str, comment: Option<&str>) -> Option<Template> {
    let article = ArticleView::published_by_slug(pool, slug)?;
    if let Err(e) = Article::increment_views(pool, article.id) {
        log::warn!("View count for article {} not updated: {}", article.id, e);
    }

    let settings = SiteSettings::load(pool);
    let now = Utc::now().naive_utc();
    let comments: Vec<Value> = Comment::approved_for_article(pool, article.id)
        .iter()
        .map(|c| json!({ "comment": c, "time_ago": text::time_ago(c.created_at, now) }))
        .collect();
    let categories = Category::top_level(pool, settings.category_limit);

    let context = json!({
        "settings": settings,
        "post": card(&article, now),
        "article_categories": Category::for_article(pool, article.id),
        "article_tags": Tag::for_article(pool, article.id),
        "comments": comments,
        "notice": comment_notice(comment),
        "categories": categories,
        "page_type": "article",
    });
    Some(Template::render("article", &context))
}

fn comment_notice(outcome: Option<&str>) -> Option<&'static str> {
    match outcome? {
        "pending" => Some("Thanks! Your comment is awaiting moderation."),
        "invalid" => Some("Please give your name and a comment."),
        "limited" => Some("Too many comments. Please try again later."),
        "failed" => Some("Your comment could not be saved. Please try again."),
        _ => None,
    }
}

// ── Comments ───────────────────────────────────────────

#[derive(Debug, FromForm)]
pub struct CommentSubmitForm {
    pub author_name: String,
    pub body: String,
}

/// Visitor comments land as `pending` until a moderator approves them.
#[post("/article/<slug>/comments", data = "<form>")]
pub fn comment_submit(
    pool: &State<DbPool>,
    limiter: &State<RateLimiter>,
    client: ClientInfo,
    slug: &str,
    form: Form<CommentSubmitForm>,
) -> Option<Redirect> {
    let article = ArticleView::published_by_slug(pool, slug)?;
    let back = |outcome: &str| Redirect::to(format!("/article/{}?comment={}", article.slug, outcome));

    let author_name = form.author_name.trim();
    let body = form.body.trim();
    if author_name.is_empty()
        || body.is_empty()
        || author_name.chars().count() > MAX_COMMENT_NAME
        || body.chars().count() > MAX_COMMENT_BODY
    {
        return Some(back("invalid"));
    }

    let max_comments = Setting::get_i64(pool, "comment_rate_limit").max(1) as u64;
    if !limiter.check_and_record(&client.rate_key("comment"), max_comments, COMMENT_WINDOW) {
        return Some(back("limited"));
    }

    let new_comment = CommentForm {
        article_id: article.id,
        user_id: None,
        author_name: author_name.to_string(),
        body: body.to_string(),
    };
    match Comment::create(pool, &new_comment) {
        Ok(id) => {
            ActivityEntry::log(
                pool,
                None,
                "comment_create",
                Some("comment"),
                Some(id),
                Some(&format!("by '{}' on article {}", author_name, article.id)),
                &client,
            );
            Some(back("pending"))
        }
        Err(e) => {
            log::error!("Saving a comment on article {} failed: {}", article.id, e);
            Some(back("failed"))
        }
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![index, category_page, article_page, comment_submit]
}
