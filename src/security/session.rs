use chrono::{Duration, NaiveDateTime, Utc};
use log::{error, warn};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::db::DbPool;
use crate::models::user::User;
use crate::security::auth::ClientInfo;

/// What the server remembers about a signed-in client.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionState {
    pub user_id: i64,
    pub username: String,
    pub role_id: Option<i64>,
    pub last_activity: NaiveDateTime,
}

/// Per-request view of one client's session, built from the cookie token at
/// the start of the request and dropped at the end of it. Mutations are
/// written through to the `sessions` table immediately.
#[derive(Debug, Default)]
pub struct SessionContext {
    token: Option<String>,
    state: Option<SessionState>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Resolve a cookie token. Unknown tokens and lookup failures both yield
    /// an anonymous context.
    pub fn load(pool: &DbPool, token: &str) -> Self {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                error!("Session lookup: no connection: {}", e);
                return Self::anonymous();
            }
        };
        let found = conn
            .query_row(
                "SELECT user_id, username, role_id, last_activity FROM sessions WHERE id = ?1",
                params![token],
                |row| {
                    Ok(SessionState {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        role_id: row.get(2)?,
                        last_activity: row.get(3)?,
                    })
                },
            )
            .optional();
        match found {
            Ok(Some(state)) => SessionContext {
                token: Some(token.to_string()),
                state: Some(state),
            },
            Ok(None) => Self::anonymous(),
            Err(e) => {
                error!("Session lookup failed: {}", e);
                Self::anonymous()
            }
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.state.as_ref().map(|s| s.user_id)
    }

    pub fn is_logged_in(&self) -> bool {
        self.user_id().is_some()
    }

    /// True when there is a last-activity timestamp and more than `lifetime`
    /// has passed since it.
    pub fn is_expired_at(&self, now: NaiveDateTime, lifetime: Duration) -> bool {
        match &self.state {
            Some(state) => now - state.last_activity > lifetime,
            None => false,
        }
    }

    /// Issue a fresh session for `user`. Any session this context already held
    /// is removed first, so a token never survives a change of identity.
    pub(crate) fn begin(
        &mut self,
        pool: &DbPool,
        user: &User,
        client: &ClientInfo,
        now: NaiveDateTime,
    ) -> Result<(), String> {
        self.destroy(pool);

        let token = uuid::Uuid::new_v4().to_string();
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO sessions (id, user_id, username, role_id, created_at, last_activity, ip_address, user_agent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7)",
            params![
                token,
                user.id,
                user.username,
                user.role_id,
                now,
                client.ip_address,
                client.user_agent
            ],
        )
        .map_err(|e| e.to_string())?;

        self.token = Some(token);
        self.state = Some(SessionState {
            user_id: user.id,
            username: user.username.clone(),
            role_id: user.role_id,
            last_activity: now,
        });
        Ok(())
    }

    /// Record activity at `now`. The in-memory timestamp moves even if the
    /// write fails; the next request simply sees the older stored value.
    pub fn touch(&mut self, pool: &DbPool, now: NaiveDateTime) -> Result<(), String> {
        let (token, state) = match (&self.token, &mut self.state) {
            (Some(t), Some(s)) => (t, s),
            _ => return Ok(()),
        };
        state.last_activity = now;
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE sessions SET last_activity = ?1 WHERE id = ?2",
            params![now, token],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Forget everything about this session. The in-memory state is cleared
    /// unconditionally; a failed row delete is only reported.
    pub fn destroy(&mut self, pool: &DbPool) {
        self.state = None;
        if let Some(token) = self.token.take() {
            let deleted = pool
                .get()
                .map_err(|e| e.to_string())
                .and_then(|conn| {
                    conn.execute("DELETE FROM sessions WHERE id = ?1", params![token])
                        .map_err(|e| e.to_string())
                });
            if let Err(e) = deleted {
                warn!("Could not delete session row: {}", e);
            }
        }
    }
}

/// Remove sessions idle for longer than `lifetime`.
pub fn cleanup_expired(pool: &DbPool, lifetime: Duration) -> Result<usize, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    let cutoff = Utc::now().naive_utc() - lifetime;
    conn.execute(
        "DELETE FROM sessions WHERE last_activity < ?1",
        params![cutoff],
    )
    .map_err(|e| e.to_string())
}
