use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::{collect_rows, DbPool};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

impl Role {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Role {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }

    pub fn find_by_name(pool: &DbPool, name: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT id, name FROM roles WHERE name = ?1",
            params![name],
            Self::from_row,
        )
        .ok()
    }

    pub fn list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare("SELECT id, name FROM roles ORDER BY id") {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| collect_rows("role", rows))
            .unwrap_or_default()
    }

    pub fn create(pool: &DbPool, name: &str) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("INSERT INTO roles (name) VALUES (?1)", params![name])
            .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    /// Link a permission to a role. Granting twice is a no-op.
    pub fn grant(pool: &DbPool, role_id: i64, permission: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
                 SELECT ?1, id FROM permissions WHERE name = ?2",
                params![role_id, permission],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            let exists: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM permissions WHERE name = ?1",
                    params![permission],
                    |row| row.get(0),
                )
                .map_err(|e| e.to_string())?;
            if exists == 0 {
                return Err(format!("Unknown permission: {}", permission));
            }
        }
        Ok(())
    }

    pub fn revoke(pool: &DbPool, role_id: i64, permission: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "DELETE FROM role_permissions
             WHERE role_id = ?1
             AND permission_id IN (SELECT id FROM permissions WHERE name = ?2)",
            params![role_id, permission],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn permissions(pool: &DbPool, role_id: i64) -> Vec<Permission> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT p.id, p.name, p.description FROM permissions p
             JOIN role_permissions rp ON rp.permission_id = p.id
             WHERE rp.role_id = ?1
             ORDER BY p.name",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![role_id], Permission::from_row)
            .map(|rows| collect_rows("permission", rows))
            .unwrap_or_default()
    }
}

impl Permission {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Permission {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
        })
    }

    pub fn create(pool: &DbPool, name: &str, description: Option<&str>) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO permissions (name, description) VALUES (?1, ?2)",
            params![name, description],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare("SELECT id, name, description FROM permissions ORDER BY name") {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| collect_rows("permission", rows))
            .unwrap_or_default()
    }
}
