use log::error;
use rusqlite::params;

use crate::db::DbPool;
use crate::security::session::SessionContext;

/// Whether the signed-in user's role carries `permission`.
///
/// Resolved through users → roles → role_permissions → permissions on every
/// call; nothing is cached beyond the session itself. Anonymous sessions and
/// lookup failures both answer false.
pub fn has_permission(pool: &DbPool, session: &SessionContext, permission: &str) -> bool {
    let user_id = match session.user_id() {
        Some(id) => id,
        None => return false,
    };
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => {
            error!("Permission check '{}': no connection: {}", permission, e);
            return false;
        }
    };
    let count: rusqlite::Result<i64> = conn.query_row(
        "SELECT COUNT(*) FROM users u
         JOIN roles r ON r.id = u.role_id
         JOIN role_permissions rp ON rp.role_id = r.id
         JOIN permissions p ON p.id = rp.permission_id
         WHERE u.id = ?1 AND p.name = ?2",
        params![user_id, permission],
        |row| row.get(0),
    );
    match count {
        Ok(n) => n > 0,
        Err(e) => {
            error!("Permission check '{}' failed: {}", permission, e);
            false
        }
    }
}

/// `has_permission` for each name, for templates that show or hide controls.
pub fn permission_flags(
    pool: &DbPool,
    session: &SessionContext,
    permissions: &[&str],
) -> std::collections::HashMap<String, bool> {
    permissions
        .iter()
        .map(|p| (p.to_string(), has_permission(pool, session, p)))
        .collect()
}
