use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::{collect_rows, DbPool};

#[derive(Debug, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

impl Setting {
    pub fn get(pool: &DbPool, key: &str) -> Option<String> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .ok()
    }

    pub fn get_i64(pool: &DbPool, key: &str) -> i64 {
        Self::get(pool, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn set(pool: &DbPool, key: &str, value: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Every setting in one query. Empty map on failure.
    pub fn all(pool: &DbPool) -> HashMap<String, String> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return HashMap::new(),
        };

        let mut stmt = match conn.prepare("SELECT key, value FROM settings") {
            Ok(s) => s,
            Err(e) => {
                log::error!("Loading settings failed: {}", e);
                return HashMap::new();
            }
        };

        stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            ))
        })
        .map(|rows| collect_rows("setting", rows))
        .unwrap_or_default()
    }
}

/// The settings the front end renders with, loaded once per page.
/// A key missing from the table falls back to the value hard-coded here.
#[derive(Debug, Clone, Serialize)]
pub struct SiteSettings {
    pub site_name: String,
    pub site_tagline: String,
    pub site_url: String,
    pub featured_limit: i64,
    pub breaking_limit: i64,
    pub trending_limit: i64,
    pub latest_limit: i64,
    pub category_limit: i64,
    pub category_page_limit: i64,
    pub activity_feed_limit: i64,
}

impl SiteSettings {
    pub fn load(pool: &DbPool) -> Self {
        Self::from_map(&Setting::all(pool))
    }

    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let text = |key: &str, default: &str| -> String {
            map.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };
        let number = |key: &str, default: i64| -> i64 {
            map.get(key)
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(default)
        };

        SiteSettings {
            site_name: text("site_name", "Newsroom"),
            site_tagline: text("site_tagline", ""),
            site_url: text("site_url", "http://localhost:8000"),
            featured_limit: number("home_featured_limit", 5),
            breaking_limit: number("home_breaking_limit", 5),
            trending_limit: number("home_trending_limit", 5),
            latest_limit: number("home_latest_limit", 10),
            category_limit: number("home_category_limit", 8),
            category_page_limit: number("category_page_limit", 20),
            activity_feed_limit: number("activity_feed_limit", 10),
        }
    }
}
