use log::warn;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::params;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Collect decoded rows, logging and skipping any row that fails to decode.
pub fn collect_rows<T, C, I>(what: &str, rows: I) -> C
where
    I: Iterator<Item = rusqlite::Result<T>>,
    C: FromIterator<T>,
{
    rows.filter_map(|row| match row {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Skipping unreadable {} row: {}", what, e);
            None
        }
    })
    .collect()
}

/// Roles created on first boot.
const DEFAULT_ROLES: &[&str] = &["admin", "editor", "author"];

const DEFAULT_PERMISSIONS: &[(&str, &str)] = &[
    ("manage_users", "Create, edit and suspend user accounts"),
    ("manage_roles", "Edit roles and their permissions"),
    ("manage_settings", "Change site settings"),
    ("create_articles", "Write new articles"),
    ("edit_articles", "Edit any article, including featured and breaking flags"),
    ("publish_articles", "Publish and unpublish articles"),
    ("delete_articles", "Delete articles"),
    ("manage_categories", "Create and edit categories and tags"),
    ("moderate_comments", "Approve, reject and delete comments"),
    ("upload_files", "Upload images and documents"),
    ("view_activity", "Read the activity log"),
];

/// Grants applied only when the roles table is first populated, so that an
/// administrator's later revocations survive restarts.
const DEFAULT_GRANTS: &[(&str, &[&str])] = &[
    (
        "admin",
        &[
            "manage_users",
            "manage_roles",
            "manage_settings",
            "create_articles",
            "edit_articles",
            "publish_articles",
            "delete_articles",
            "manage_categories",
            "moderate_comments",
            "upload_files",
            "view_activity",
        ],
    ),
    (
        "editor",
        &[
            "create_articles",
            "edit_articles",
            "publish_articles",
            "delete_articles",
            "manage_categories",
            "moderate_comments",
            "upload_files",
            "view_activity",
        ],
    ),
    ("author", &["create_articles", "upload_files"]),
];

pub fn init_pool_at(path: &str) -> Result<DbPool, String> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
    }
    let manager = SqliteConnectionManager::file(path)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys=ON;"));
    let pool = Pool::builder()
        .max_size(10)
        .build(manager)
        .map_err(|e| e.to_string())?;

    // WAL is a property of the database file, one connection is enough
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")
        .map_err(|e| e.to_string())?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        -- Roles and permissions
        CREATE TABLE IF NOT EXISTS roles (
            id INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS permissions (
            id INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS role_permissions (
            role_id INTEGER NOT NULL,
            permission_id INTEGER NOT NULL,
            PRIMARY KEY (role_id, permission_id),
            FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE CASCADE,
            FOREIGN KEY (permission_id) REFERENCES permissions(id) ON DELETE CASCADE
        );

        -- Users
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            full_name TEXT NOT NULL DEFAULT '',
            avatar TEXT NOT NULL DEFAULT '',
            role_id INTEGER,
            status TEXT NOT NULL DEFAULT 'active',
            last_login DATETIME,
            registration_date DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE SET NULL
        );

        -- Admin sessions, keyed by the cookie token
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            username TEXT NOT NULL,
            role_id INTEGER,
            created_at DATETIME NOT NULL,
            last_activity DATETIME NOT NULL,
            ip_address TEXT,
            user_agent TEXT,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Activity log. No foreign key on user_id: entries outlive their users.
        CREATE TABLE IF NOT EXISTS activity_logs (
            id INTEGER PRIMARY KEY,
            user_id INTEGER,
            action TEXT NOT NULL,
            entity_type TEXT,
            entity_id INTEGER,
            description TEXT,
            ip_address TEXT,
            user_agent TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_activity_created ON activity_logs(created_at);

        -- Categories (nested one level via parent_id)
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            parent_id INTEGER,
            description TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (parent_id) REFERENCES categories(id) ON DELETE SET NULL
        );

        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Articles
        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            excerpt TEXT,
            content TEXT NOT NULL DEFAULT '',
            author_id INTEGER,
            status TEXT NOT NULL DEFAULT 'draft',
            featured INTEGER NOT NULL DEFAULT 0,
            breaking_news INTEGER NOT NULL DEFAULT 0,
            views INTEGER NOT NULL DEFAULT 0,
            featured_image TEXT,
            published_at DATETIME,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status, published_at);
        CREATE INDEX IF NOT EXISTS idx_articles_views ON articles(views);

        -- Many-to-many: articles <-> categories
        CREATE TABLE IF NOT EXISTS article_categories (
            article_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            PRIMARY KEY (article_id, category_id),
            FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE,
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
        );

        -- Many-to-many: articles <-> tags
        CREATE TABLE IF NOT EXISTS article_tags (
            article_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (article_id, tag_id),
            FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE,
            FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
        );

        -- Comments
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY,
            article_id INTEGER NOT NULL,
            user_id INTEGER,
            author_name TEXT NOT NULL,
            body TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE
        );

        -- Settings (key-value)
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        );
        ",
    )?;

    Ok(())
}

pub fn seed_defaults(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    let defaults = vec![
        // General
        ("site_name", "Newsroom"),
        ("site_tagline", "News as it happens"),
        ("site_url", "http://localhost:8000"),
        // Home page sections
        ("home_featured_limit", "5"),
        ("home_breaking_limit", "5"),
        ("home_trending_limit", "5"),
        ("home_latest_limit", "10"),
        ("home_category_limit", "8"),
        ("category_page_limit", "20"),
        // Admin
        ("activity_feed_limit", "10"),
        ("login_rate_limit", "5"),
        // Public
        ("comment_rate_limit", "5"),
    ];

    for (key, value) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }

    let role_count: i64 = conn.query_row("SELECT COUNT(*) FROM roles", [], |row| row.get(0))?;

    for name in DEFAULT_ROLES {
        conn.execute("INSERT OR IGNORE INTO roles (name) VALUES (?1)", params![name])?;
    }
    for (name, description) in DEFAULT_PERMISSIONS {
        conn.execute(
            "INSERT OR IGNORE INTO permissions (name, description) VALUES (?1, ?2)",
            params![name, description],
        )?;
    }

    if role_count == 0 {
        for (role, permissions) in DEFAULT_GRANTS {
            for permission in permissions.iter() {
                conn.execute(
                    "INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
                     SELECT r.id, p.id FROM roles r, permissions p
                     WHERE r.name = ?1 AND p.name = ?2",
                    params![role, permission],
                )?;
            }
        }
    }

    // First boot: create an admin account with a one-time random password
    let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    if user_count == 0 {
        let password: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        let hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)?;
        conn.execute(
            "INSERT INTO users (username, email, password_hash, full_name, role_id, status)
             SELECT 'admin', 'admin@localhost', ?1, 'Administrator', id, 'active'
             FROM roles WHERE name = 'admin'",
            params![hash],
        )?;
        warn!(
            "Created initial admin account 'admin' with password '{}'. Change it after first login.",
            password
        );
    }

    Ok(())
}
