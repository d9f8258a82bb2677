use chrono::{NaiveDateTime, Utc};
use log::{error, warn};
use rusqlite::params;
use serde::Serialize;

use crate::db::{collect_rows, DbPool};
use crate::security::auth::ClientInfo;

/// One row of the append-only activity log, with the acting user's name
/// joined in when that user still exists.
#[derive(Debug, Serialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub description: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: NaiveDateTime,
}

impl ActivityEntry {
    /// Append an entry. Never fails from the caller's point of view: a lost
    /// audit row is reported to the operational log and the action goes on.
    pub fn log(
        pool: &DbPool,
        user_id: Option<i64>,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<i64>,
        description: Option<&str>,
        client: &ClientInfo,
    ) {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                warn!("Activity log '{}' dropped, no connection: {}", action, e);
                return;
            }
        };
        let now = Utc::now().naive_utc();
        if let Err(e) = conn.execute(
            "INSERT INTO activity_logs (user_id, action, entity_type, entity_id, description, ip_address, user_agent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user_id,
                action,
                entity_type,
                entity_id,
                description,
                client.ip_address,
                client.user_agent,
                now
            ],
        ) {
            warn!("Activity log '{}' dropped: {}", action, e);
        }
    }

    /// Newest entries first, at most `limit`. Empty on any failure.
    pub fn recent(pool: &DbPool, limit: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                error!("Recent activity: no connection: {}", e);
                return vec![];
            }
        };

        let mut stmt = match conn.prepare(
            "SELECT l.id, l.user_id, u.username, l.action, l.entity_type, l.entity_id,
                    l.description, l.ip_address, l.user_agent, l.created_at
             FROM activity_logs l
             LEFT JOIN users u ON u.id = l.user_id
             ORDER BY l.created_at DESC, l.id DESC
             LIMIT ?1",
        ) {
            Ok(s) => s,
            Err(e) => {
                error!("Recent activity query failed: {}", e);
                return vec![];
            }
        };

        let entries: Vec<Self> = stmt
            .query_map(params![limit.max(0)], |row| {
                Ok(ActivityEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    username: row.get(2)?,
                    action: row.get(3)?,
                    entity_type: row.get(4)?,
                    entity_id: row.get(5)?,
                    description: row.get(6)?,
                    ip_address: row.get(7)?,
                    user_agent: row.get(8)?,
                    created_at: row.get(9)?,
                })
            })
            .map(|rows| collect_rows("activity", rows))
            .unwrap_or_default();
        entries
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM activity_logs", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn count_for_action(pool: &DbPool, action: &str) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM activity_logs WHERE action = ?1",
            params![action],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }
}
