use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::{collect_rows, DbPool};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub user_id: Option<i64>,
    pub author_name: String,
    pub body: String,
    pub status: String, // pending, approved, spam
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    pub article_id: i64,
    pub user_id: Option<i64>,
    pub author_name: String,
    pub body: String,
}

impl Comment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Comment {
            id: row.get("id")?,
            article_id: row.get("article_id")?,
            user_id: row.get("user_id")?,
            author_name: row.get("author_name")?,
            body: row.get("body")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM comments WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    /// Approved comments for an article, oldest first.
    pub fn approved_for_article(pool: &DbPool, article_id: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT * FROM comments WHERE article_id = ?1 AND status = 'approved'
             ORDER BY created_at ASC, id ASC",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![article_id], Self::from_row)
            .map(|rows| collect_rows("comment", rows))
            .unwrap_or_default()
    }

    /// New comments wait for moderation.
    pub fn create(pool: &DbPool, form: &CommentForm) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO comments (article_id, user_id, author_name, body, status)
             VALUES (?1, ?2, ?3, ?4, 'pending')",
            params![form.article_id, form.user_id, form.author_name, form.body],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_status(pool: &DbPool, id: i64, status: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE comments SET status = ?1 WHERE id = ?2",
            params![status, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }
}
