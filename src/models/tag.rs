use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{collect_rows, DbPool};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl Tag {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Tag {
            id: row.get("id")?,
            name: row.get("name")?,
            slug: row.get("slug")?,
        })
    }

    pub fn for_article(pool: &DbPool, article_id: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT t.id, t.name, t.slug FROM tags t
             JOIN article_tags atg ON atg.tag_id = t.id
             WHERE atg.article_id = ?1
             ORDER BY t.name",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![article_id], Self::from_row)
            .map(|rows| collect_rows("tag", rows))
            .unwrap_or_default()
    }

    /// Return the id of the tag with this name's slug, creating it if needed.
    pub fn find_or_create(pool: &DbPool, name: &str) -> Result<i64, String> {
        let slug_str = slug::slugify(name);
        if slug_str.is_empty() {
            return Err(format!("Tag name '{}' has no usable characters", name));
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM tags WHERE slug = ?1",
                params![slug_str],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| e.to_string())?;
        if let Some(id) = existing {
            return Ok(id);
        }
        conn.execute(
            "INSERT INTO tags (name, slug) VALUES (?1, ?2)",
            params![name.trim(), slug_str],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_for_article(pool: &DbPool, article_id: i64, tag_ids: &[i64]) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "DELETE FROM article_tags WHERE article_id = ?1",
            params![article_id],
        )
        .map_err(|e| e.to_string())?;
        for tag_id in tag_ids {
            conn.execute(
                "INSERT OR IGNORE INTO article_tags (article_id, tag_id) VALUES (?1, ?2)",
                params![article_id, tag_id],
            )
            .map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}
