use chrono::NaiveDateTime;
use log::error;
use rusqlite::types::ToSql;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::{collect_rows, DbPool};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub author_id: Option<i64>,
    pub status: String, // draft, published, archived
    pub featured: bool,
    pub breaking_news: bool,
    pub views: i64,
    pub featured_image: Option<String>,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct ArticleForm {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub author_id: Option<i64>,
    pub status: String,
    pub featured: bool,
    pub breaking_news: bool,
    pub featured_image: Option<String>,
    pub published_at: Option<NaiveDateTime>,
}

/// Denormalized article row for the public pages: the article plus its
/// author, comma-joined category and tag names and approved comment count.
#[derive(Debug, Serialize, Clone)]
pub struct ArticleView {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image: Option<String>,
    pub featured: bool,
    pub breaking_news: bool,
    pub views: i64,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub categories: Option<String>,
    pub tags: Option<String>,
    pub comment_count: i64,
}

const VIEW_SELECT: &str = "SELECT a.id, a.title, a.slug, a.excerpt, a.content, a.featured_image,
        a.featured, a.breaking_news, a.views, a.published_at, a.created_at, a.author_id,
        COALESCE(NULLIF(u.full_name, ''), u.username) AS author_name,
        u.avatar AS author_avatar,
        (SELECT GROUP_CONCAT(c.name, ', ') FROM article_categories ac
            JOIN categories c ON c.id = ac.category_id
            WHERE ac.article_id = a.id) AS categories,
        (SELECT GROUP_CONCAT(t.name, ', ') FROM article_tags atg
            JOIN tags t ON t.id = atg.tag_id
            WHERE atg.article_id = a.id) AS tags,
        (SELECT COUNT(*) FROM comments cm
            WHERE cm.article_id = a.id AND cm.status = 'approved') AS comment_count
    FROM articles a
    LEFT JOIN users u ON u.id = a.author_id";

const NEWEST_FIRST: &str = "COALESCE(a.published_at, a.created_at) DESC, a.id DESC";

impl ArticleView {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ArticleView {
            id: row.get("id")?,
            title: row.get("title")?,
            slug: row.get("slug")?,
            excerpt: row.get("excerpt")?,
            content: row.get("content")?,
            featured_image: row.get("featured_image")?,
            featured: row.get::<_, i64>("featured")? != 0,
            breaking_news: row.get::<_, i64>("breaking_news")? != 0,
            views: row.get("views")?,
            published_at: row.get("published_at")?,
            created_at: row.get("created_at")?,
            author_id: row.get("author_id")?,
            author_name: row.get("author_name")?,
            author_avatar: row.get("author_avatar")?,
            categories: row.get("categories")?,
            tags: row.get("tags")?,
            comment_count: row.get("comment_count")?,
        })
    }

    /// Run one of the view queries. A failing query degrades to an empty
    /// section instead of taking the whole page down.
    fn fetch(pool: &DbPool, section: &str, sql: &str, args: &[&dyn ToSql]) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                error!("{} articles: no connection: {}", section, e);
                return vec![];
            }
        };
        let mut stmt = match conn.prepare(sql) {
            Ok(s) => s,
            Err(e) => {
                error!("{} articles query failed: {}", section, e);
                return vec![];
            }
        };
        let rows = match stmt.query_map(args, Self::from_row) {
            Ok(rows) => rows,
            Err(e) => {
                error!("{} articles query failed: {}", section, e);
                return vec![];
            }
        };
        let views: Vec<Self> = collect_rows(section, rows);
        views
    }

    pub fn featured(pool: &DbPool, limit: i64) -> Vec<Self> {
        let sql = format!(
            "{} WHERE a.status = 'published' AND a.featured = 1 ORDER BY {} LIMIT ?1",
            VIEW_SELECT, NEWEST_FIRST
        );
        Self::fetch(pool, "Featured", &sql, params![limit])
    }

    pub fn breaking(pool: &DbPool, limit: i64) -> Vec<Self> {
        let sql = format!(
            "{} WHERE a.status = 'published' AND a.breaking_news = 1 ORDER BY {} LIMIT ?1",
            VIEW_SELECT, NEWEST_FIRST
        );
        Self::fetch(pool, "Breaking", &sql, params![limit])
    }

    pub fn by_category(pool: &DbPool, category_id: i64, limit: i64) -> Vec<Self> {
        let sql = format!(
            "{} JOIN article_categories f ON f.article_id = a.id AND f.category_id = ?1
             WHERE a.status = 'published' ORDER BY {} LIMIT ?2",
            VIEW_SELECT, NEWEST_FIRST
        );
        Self::fetch(pool, "Category", &sql, params![category_id, limit])
    }

    pub fn trending(pool: &DbPool, limit: i64) -> Vec<Self> {
        let sql = format!(
            "{} WHERE a.status = 'published' ORDER BY a.views DESC, {} LIMIT ?1",
            VIEW_SELECT, NEWEST_FIRST
        );
        Self::fetch(pool, "Trending", &sql, params![limit])
    }

    pub fn latest(pool: &DbPool, limit: i64) -> Vec<Self> {
        let sql = format!(
            "{} WHERE a.status = 'published' ORDER BY {} LIMIT ?1",
            VIEW_SELECT, NEWEST_FIRST
        );
        Self::fetch(pool, "Latest", &sql, params![limit])
    }

    pub fn published_by_slug(pool: &DbPool, slug: &str) -> Option<Self> {
        let sql = format!(
            "{} WHERE a.status = 'published' AND a.slug = ?1 LIMIT 1",
            VIEW_SELECT
        );
        Self::fetch(pool, "Single", &sql, params![slug]).into_iter().next()
    }
}

impl Article {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Article {
            id: row.get("id")?,
            title: row.get("title")?,
            slug: row.get("slug")?,
            excerpt: row.get("excerpt")?,
            content: row.get("content")?,
            author_id: row.get("author_id")?,
            status: row.get("status")?,
            featured: row.get::<_, i64>("featured")? != 0,
            breaking_news: row.get::<_, i64>("breaking_news")? != 0,
            views: row.get("views")?,
            featured_image: row.get("featured_image")?,
            published_at: row.get("published_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM articles WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    pub fn slug_exists(pool: &DbPool, slug: &str) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM articles WHERE slug = ?1",
                params![slug],
                |row| row.get(0),
            )
            .map_err(|e| e.to_string())?;
        Ok(count > 0)
    }

    pub fn create(pool: &DbPool, form: &ArticleForm) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO articles (title, slug, excerpt, content, author_id, status, featured, breaking_news, featured_image, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                form.title,
                form.slug,
                form.excerpt,
                form.content,
                form.author_id,
                form.status,
                form.featured as i64,
                form.breaking_news as i64,
                form.featured_image,
                form.published_at,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_flags(pool: &DbPool, id: i64, featured: bool, breaking_news: bool) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE articles SET featured = ?1, breaking_news = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?3",
                params![featured as i64, breaking_news as i64, id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err(format!("Article {} not found", id));
        }
        Ok(())
    }

    pub fn update_status(pool: &DbPool, id: i64, status: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE articles SET status = ?1,
             published_at = CASE WHEN ?1 = 'published' AND published_at IS NULL THEN CURRENT_TIMESTAMP ELSE published_at END,
             updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
            params![status, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn increment_views(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE articles SET views = views + 1 WHERE id = ?1",
            params![id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn count(pool: &DbPool, status: Option<&str>) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        match status {
            Some(s) => conn
                .query_row(
                    "SELECT COUNT(*) FROM articles WHERE status = ?1",
                    params![s],
                    |row| row.get(0),
                )
                .unwrap_or(0),
            None => conn
                .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))
                .unwrap_or(0),
        }
    }
}
