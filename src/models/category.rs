use chrono::NaiveDateTime;
use log::error;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::{collect_rows, DbPool};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    pub slug: String,
    pub parent_id: Option<i64>,
    pub description: Option<String>,
}

impl Category {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Category {
            id: row.get("id")?,
            name: row.get("name")?,
            slug: row.get("slug")?,
            parent_id: row.get("parent_id")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM categories WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    /// Categories without a parent, oldest first. Empty on failure.
    pub fn top_level(pool: &DbPool, limit: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                error!("Top-level categories: no connection: {}", e);
                return vec![];
            }
        };
        let mut stmt = match conn.prepare(
            "SELECT * FROM categories WHERE parent_id IS NULL
             ORDER BY created_at ASC, id ASC LIMIT ?1",
        ) {
            Ok(s) => s,
            Err(e) => {
                error!("Top-level categories query failed: {}", e);
                return vec![];
            }
        };
        stmt.query_map(params![limit], Self::from_row)
            .map(|rows| collect_rows("category", rows))
            .unwrap_or_default()
    }

    pub fn children(pool: &DbPool, parent_id: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT * FROM categories WHERE parent_id = ?1 ORDER BY name",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![parent_id], Self::from_row)
            .map(|rows| collect_rows("category", rows))
            .unwrap_or_default()
    }

    pub fn for_article(pool: &DbPool, article_id: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };

        let mut stmt = match conn.prepare(
            "SELECT c.* FROM categories c
             JOIN article_categories ac ON ac.category_id = c.id
             WHERE ac.article_id = ?1
             ORDER BY c.name",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };

        stmt.query_map(params![article_id], Self::from_row)
            .map(|rows| collect_rows("category", rows))
            .unwrap_or_default()
    }

    pub fn create(pool: &DbPool, form: &CategoryForm) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO categories (name, slug, parent_id, description) VALUES (?1, ?2, ?3, ?4)",
            params![form.name, form.slug, form.parent_id, form.description],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM categories WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Replace the article's category links with `category_ids`.
    pub fn set_for_article(
        pool: &DbPool,
        article_id: i64,
        category_ids: &[i64],
    ) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "DELETE FROM article_categories WHERE article_id = ?1",
            params![article_id],
        )
        .map_err(|e| e.to_string())?;

        for cat_id in category_ids {
            conn.execute(
                "INSERT OR IGNORE INTO article_categories (article_id, category_id) VALUES (?1, ?2)",
                params![article_id, cat_id],
            )
            .map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}
