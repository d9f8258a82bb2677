use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub avatar: String,
    pub role_id: Option<i64>,
    pub status: String, // active, inactive, suspended, pending
    pub last_login: Option<NaiveDateTime>,
    pub registration_date: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct UserForm {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role_id: Option<i64>,
    pub status: String,
}

impl User {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            full_name: row.get(4)?,
            avatar: row.get(5)?,
            role_id: row.get(6)?,
            status: row.get(7)?,
            last_login: row.get(8)?,
            registration_date: row.get(9)?,
        })
    }

    const SELECT_COLS: &'static str =
        "id, username, email, password_hash, full_name, avatar, role_id, status, last_login, registration_date";

    // ── Lookups ──

    pub fn get_by_id(pool: &DbPool, id: i64) -> Option<User> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", Self::SELECT_COLS),
            params![id],
            Self::from_row,
        )
        .ok()
    }

    /// Look a user up by username or email.
    /// Unlike the other lookups this keeps "no such user" and "query failed"
    /// apart, since login reports them differently.
    pub fn find_by_identifier(pool: &DbPool, identifier: &str) -> Result<Option<User>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row(
            &format!(
                "SELECT {} FROM users WHERE username = ?1 OR email = ?1 LIMIT 1",
                Self::SELECT_COLS
            ),
            params![identifier],
            Self::from_row,
        )
        .optional()
        .map_err(|e| e.to_string())
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap_or(0)
    }

    // ── Create ──

    pub fn create(pool: &DbPool, form: &UserForm) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO users (username, email, password_hash, full_name, role_id, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                form.username,
                form.email,
                form.password_hash,
                form.full_name,
                form.role_id,
                form.status,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    // ── Update ──

    pub fn touch_last_login(pool: &DbPool, id: i64, at: NaiveDateTime) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![at, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn update_status(pool: &DbPool, id: i64, status: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET status = ?1 WHERE id = ?2",
            params![status, id],
        )
        .map_err(|e| e.to_string())?;
        // A suspended account must not keep a live session
        if status != "active" {
            conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    pub fn update_role(pool: &DbPool, id: i64, role_id: Option<i64>) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET role_id = ?1 WHERE id = ?2",
            params![role_id, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Delete ──

    /// Sessions go with the user (cascade), articles are kept with a null author,
    /// activity entries are kept as they are.
    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM users WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Helpers ──

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }

    /// Return a safe version without password_hash for template contexts
    pub fn safe_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "username": self.username,
            "email": self.email,
            "full_name": self.full_name,
            "display_name": self.display_name(),
            "avatar": self.avatar,
            "role_id": self.role_id,
            "status": self.status,
            "last_login": self.last_login,
            "registration_date": self.registration_date,
        })
    }
}
