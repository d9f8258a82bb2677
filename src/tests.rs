#![cfg(test)]

use chrono::{Duration, NaiveDateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::{Client, LocalResponse};
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::config::AppConfig;
use crate::db::{run_migrations, seed_defaults, DbPool};
use crate::models::activity::ActivityEntry;
use crate::models::article::{Article, ArticleForm, ArticleView};
use crate::models::category::{Category, CategoryForm};
use crate::models::comment::{Comment, CommentForm};
use crate::models::role::{Permission, Role};
use crate::models::settings::{Setting, SiteSettings};
use crate::models::tag::Tag;
use crate::models::user::{User, UserForm};
use crate::security::auth::{self, AuthGate, ClientInfo, GateOutcome};
use crate::security::permissions::{has_permission, permission_flags};
use crate::security::session::{cleanup_expired, SessionContext};

/// Atomic counter for unique shared-cache DB names so parallel tests don't collide.
static TEST_DB_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

fn memory_pool() -> DbPool {
    let id = TEST_DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let uri = format!("file:testdb_{}?mode=memory&cache=shared", id);
    let manager = SqliteConnectionManager::file(uri)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys=ON;"));
    Pool::builder()
        .max_size(2)
        .build(manager)
        .expect("Failed to create test pool")
}

/// Create a fresh in-memory SQLite pool with all migrations + seed defaults applied.
/// Uses a named shared-cache in-memory DB so multiple connections see the same data.
/// Pre-inserts the admin user with a fast bcrypt hash so seed_defaults skips the
/// expensive DEFAULT_COST hash (which can take 60s+ in debug builds).
fn test_pool() -> DbPool {
    let pool = memory_pool();
    run_migrations(&pool).expect("Failed to run migrations");
    {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (username, email, password_hash, full_name, status)
             VALUES ('admin', 'admin@localhost', ?1, 'Administrator', 'active')",
            rusqlite::params![fast_hash("admin")],
        )
        .unwrap();
    }
    seed_defaults(&pool).expect("Failed to seed defaults");
    {
        let conn = pool.get().unwrap();
        conn.execute(
            "UPDATE users SET role_id = (SELECT id FROM roles WHERE name = 'admin') WHERE username = 'admin'",
            [],
        )
        .unwrap();
    }
    pool
}

/// A pool whose database has no tables, for exercising failure paths.
fn broken_pool() -> DbPool {
    memory_pool()
}

/// Fast bcrypt hash for tests (cost=4 instead of DEFAULT_COST=12).
fn fast_hash(password: &str) -> String {
    bcrypt::hash(password, 4).unwrap()
}

fn client() -> ClientInfo {
    ClientInfo::new("203.0.113.7", "test-agent/1.0")
}

fn make_user(pool: &DbPool, username: &str, password: &str, role: Option<&str>, status: &str) -> i64 {
    let role_id = role.map(|r| Role::find_by_name(pool, r).expect("role exists").id);
    User::create(
        pool,
        &UserForm {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash: fast_hash(password),
            full_name: String::new(),
            role_id,
            status: status.to_string(),
        },
    )
    .unwrap()
}

fn logged_in(pool: &DbPool, identifier: &str, password: &str) -> SessionContext {
    let mut session = SessionContext::anonymous();
    let result = auth::login(pool, &mut session, identifier, password, &client());
    assert!(result.success, "login failed: {}", result.message);
    session
}

fn minutes_ago(m: i64) -> NaiveDateTime {
    Utc::now().naive_utc() - Duration::minutes(m)
}

struct Story<'a> {
    title: &'a str,
    status: &'a str,
    featured: bool,
    breaking: bool,
    age_minutes: i64,
}

impl<'a> Story<'a> {
    fn published(title: &'a str, age_minutes: i64) -> Self {
        Story {
            title,
            status: "published",
            featured: false,
            breaking: false,
            age_minutes,
        }
    }
}

fn make_article(pool: &DbPool, author_id: Option<i64>, story: Story<'_>) -> i64 {
    Article::create(
        pool,
        &ArticleForm {
            title: story.title.to_string(),
            slug: slug::slugify(story.title),
            excerpt: None,
            content: format!("<p>{} body text</p>", story.title),
            author_id,
            status: story.status.to_string(),
            featured: story.featured,
            breaking_news: story.breaking,
            featured_image: None,
            published_at: Some(minutes_ago(story.age_minutes)),
        },
    )
    .unwrap()
}

fn make_category(pool: &DbPool, name: &str, parent_id: Option<i64>) -> i64 {
    Category::create(
        pool,
        &CategoryForm {
            name: name.to_string(),
            slug: slug::slugify(name),
            parent_id,
            description: None,
        },
    )
    .unwrap()
}

fn titles(views: &[ArticleView]) -> Vec<&str> {
    views.iter().map(|v| v.title.as_str()).collect()
}

// ═══════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════

#[test]
fn settings_set_and_get() {
    let pool = test_pool();
    Setting::set(&pool, "test_key", "hello").unwrap();
    assert_eq!(Setting::get(&pool, "test_key"), Some("hello".to_string()));
    Setting::set(&pool, "test_key", "again").unwrap();
    assert_eq!(Setting::get(&pool, "test_key"), Some("again".to_string()));
}

#[test]
fn settings_missing_key() {
    let pool = test_pool();
    assert_eq!(Setting::get(&pool, "nonexistent"), None);
    assert_eq!(Setting::get_i64(&pool, "nonexistent"), 0);
}

#[test]
fn settings_seeded_values() {
    let pool = test_pool();
    assert_eq!(Setting::get(&pool, "site_name"), Some("Newsroom".to_string()));
    assert_eq!(Setting::get_i64(&pool, "login_rate_limit"), 5);
    assert_eq!(Setting::get_i64(&pool, "home_latest_limit"), 10);
}

#[test]
fn site_settings_load_from_table() {
    let pool = test_pool();
    Setting::set(&pool, "home_featured_limit", "3").unwrap();
    let s = SiteSettings::load(&pool);
    assert_eq!(s.site_name, "Newsroom");
    assert_eq!(s.featured_limit, 3);
    assert_eq!(s.category_page_limit, 20);
}

#[test]
fn site_settings_missing_or_bad_keys_use_defaults() {
    let mut map = HashMap::new();
    map.insert("home_trending_limit".to_string(), "abc".to_string());
    map.insert("home_latest_limit".to_string(), "-4".to_string());
    map.insert("site_name".to_string(), String::new());
    let s = SiteSettings::from_map(&map);
    assert_eq!(s.site_name, "Newsroom");
    assert_eq!(s.trending_limit, 5);
    assert_eq!(s.latest_limit, 10);
    assert_eq!(s.activity_feed_limit, 10);
}

#[test]
fn site_settings_survive_broken_database() {
    let s = SiteSettings::load(&broken_pool());
    assert_eq!(s.site_url, "http://localhost:8000");
    assert_eq!(s.breaking_limit, 5);
}

// ═══════════════════════════════════════════════════════════
// Migrations and seeding
// ═══════════════════════════════════════════════════════════

#[test]
fn migrations_are_idempotent() {
    let pool = test_pool();
    run_migrations(&pool).unwrap();
    seed_defaults(&pool).unwrap();
    assert_eq!(User::count(&pool), 1);
    assert_eq!(Role::list(&pool).len(), 3);
}

#[test]
fn migrations_create_all_tables() {
    let pool = test_pool();
    let conn = pool.get().unwrap();
    for table in [
        "roles",
        "permissions",
        "role_permissions",
        "users",
        "sessions",
        "activity_logs",
        "categories",
        "tags",
        "articles",
        "article_categories",
        "article_tags",
        "comments",
        "settings",
    ] {
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                rusqlite::params![table],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(n, 1, "missing table {}", table);
    }
}

#[test]
fn seeded_grants_per_role() {
    let pool = test_pool();
    let names = |role: &str| -> Vec<String> {
        let id = Role::find_by_name(&pool, role).unwrap().id;
        Role::permissions(&pool, id).into_iter().map(|p| p.name).collect()
    };
    assert_eq!(names("admin").len(), Permission::list(&pool).len());
    let editor = names("editor");
    assert!(editor.contains(&"edit_articles".to_string()));
    assert!(!editor.contains(&"manage_users".to_string()));
    assert_eq!(names("author"), vec!["create_articles", "upload_files"]);
}

#[test]
fn seeding_keeps_revoked_grants_revoked() {
    let pool = test_pool();
    let editor = Role::find_by_name(&pool, "editor").unwrap();
    Role::revoke(&pool, editor.id, "edit_articles").unwrap();
    seed_defaults(&pool).unwrap();
    assert!(!Role::permissions(&pool, editor.id)
        .iter()
        .any(|p| p.name == "edit_articles"));
}

// ═══════════════════════════════════════════════════════════
// Users
// ═══════════════════════════════════════════════════════════

#[test]
fn user_find_by_username_or_email() {
    let pool = test_pool();
    let id = make_user(&pool, "carol", "pw", Some("author"), "active");
    let by_name = User::find_by_identifier(&pool, "carol").unwrap().unwrap();
    let by_mail = User::find_by_identifier(&pool, "carol@example.com").unwrap().unwrap();
    assert_eq!(by_name.id, id);
    assert_eq!(by_mail.id, id);
    assert!(User::find_by_identifier(&pool, "nobody").unwrap().is_none());
}

#[test]
fn user_lookup_failure_is_an_error() {
    assert!(User::find_by_identifier(&broken_pool(), "carol").is_err());
}

#[test]
fn user_safe_json_has_no_hash() {
    let pool = test_pool();
    let id = make_user(&pool, "dave", "pw", None, "active");
    let user = User::get_by_id(&pool, id).unwrap();
    let json = user.safe_json();
    assert!(json.get("password_hash").is_none());
    assert_eq!(json["display_name"], "dave");
}

#[test]
fn user_suspension_drops_sessions() {
    let pool = test_pool();
    let id = make_user(&pool, "erin", "pw", Some("author"), "active");
    let session = logged_in(&pool, "erin", "pw");
    User::update_status(&pool, id, "suspended").unwrap();
    let reloaded = SessionContext::load(&pool, session.token().unwrap());
    assert!(!reloaded.is_logged_in());
}

// ═══════════════════════════════════════════════════════════
// Login / logout
// ═══════════════════════════════════════════════════════════

#[test]
fn login_unknown_user() {
    let pool = test_pool();
    let mut session = SessionContext::anonymous();
    let r = auth::login(&pool, &mut session, "ghost", "whatever", &client());
    assert!(!r.success);
    assert_eq!(r.message, auth::MSG_USER_NOT_FOUND);
    assert!(!session.is_logged_in());
}

#[test]
fn login_wrong_password_is_logged() {
    let pool = test_pool();
    let id = make_user(&pool, "frank", "right", Some("author"), "active");
    let mut session = SessionContext::anonymous();
    let r = auth::login(&pool, &mut session, "frank", "wrong", &client());
    assert!(!r.success);
    assert_eq!(r.message, auth::MSG_INVALID_PASSWORD);
    assert!(!session.is_logged_in());

    let failed = ActivityEntry::recent(&pool, 10);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].action, "login_failed");
    assert_eq!(failed[0].user_id, Some(id));
}

#[test]
fn login_pending_then_active_account() {
    let pool = test_pool();
    let alice = make_user(&pool, "alice", "correct", Some("author"), "pending");

    let mut session = SessionContext::anonymous();
    let r = auth::login(&pool, &mut session, "alice", "correct", &client());
    assert!(!r.success);
    assert_eq!(
        r.message,
        "Your account is not active. Please contact an administrator."
    );
    assert!(!session.is_logged_in());
    assert_eq!(ActivityEntry::count_for_action(&pool, "login"), 0);

    User::update_status(&pool, alice, "active").unwrap();
    let r = auth::login(&pool, &mut session, "alice", "correct", &client());
    assert!(r.success);
    assert_eq!(r.message, auth::MSG_LOGIN_OK);
    assert_eq!(session.user_id(), Some(alice));

    let entries = ActivityEntry::recent(&pool, 10);
    let login = entries.iter().find(|e| e.action == "login").expect("login row");
    assert_eq!(login.user_id, Some(alice));
    assert_eq!(login.username.as_deref(), Some("alice"));
    assert_eq!(login.ip_address.as_deref(), Some("203.0.113.7"));
    assert_eq!(login.user_agent.as_deref(), Some("test-agent/1.0"));
}

#[test]
fn login_by_email_sets_last_login() {
    let pool = test_pool();
    let id = make_user(&pool, "gina", "pw", Some("editor"), "active");
    assert!(User::get_by_id(&pool, id).unwrap().last_login.is_none());
    let session = logged_in(&pool, "gina@example.com", "pw");
    assert_eq!(session.user_id(), Some(id));
    assert!(User::get_by_id(&pool, id).unwrap().last_login.is_some());
}

#[test]
fn login_database_error_is_reported() {
    let pool = broken_pool();
    let mut session = SessionContext::anonymous();
    let r = auth::login(&pool, &mut session, "alice", "correct", &client());
    assert!(!r.success);
    assert_eq!(r.message, auth::MSG_DATABASE_ERROR);
}

#[test]
fn login_replaces_previous_session() {
    let pool = test_pool();
    make_user(&pool, "hank", "pw", Some("author"), "active");
    make_user(&pool, "ivy", "pw", Some("author"), "active");
    let mut session = logged_in(&pool, "hank", "pw");
    let old_token = session.token().unwrap().to_string();

    let r = auth::login(&pool, &mut session, "ivy", "pw", &client());
    assert!(r.success);
    assert_ne!(session.token().unwrap(), old_token);
    assert!(!SessionContext::load(&pool, &old_token).is_logged_in());
}

#[test]
fn failed_login_keeps_existing_session() {
    let pool = test_pool();
    let id = make_user(&pool, "hugo", "pw", Some("author"), "active");
    let mut session = logged_in(&pool, "hugo", "pw");
    let token = session.token().unwrap().to_string();

    let r = auth::login(&pool, &mut session, "hugo", "wrong", &client());
    assert!(!r.success);
    assert_eq!(r.message, auth::MSG_INVALID_PASSWORD);
    assert_eq!(session.token(), Some(token.as_str()));
    assert_eq!(SessionContext::load(&pool, &token).user_id(), Some(id));
    assert_eq!(ActivityEntry::count_for_action(&pool, "logout"), 0);
}

#[test]
fn login_survives_lost_activity_log() {
    let pool = test_pool();
    make_user(&pool, "jack", "pw", Some("author"), "active");
    pool.get().unwrap().execute_batch("DROP TABLE activity_logs;").unwrap();
    let session = logged_in(&pool, "jack", "pw");
    assert!(session.is_logged_in());
}

#[test]
fn logged_in_session_is_fresh_then_expires() {
    let pool = test_pool();
    make_user(&pool, "kate", "pw", Some("author"), "active");
    let session = logged_in(&pool, "kate", "pw");
    let lifetime = Duration::seconds(3600);

    let now = Utc::now().naive_utc();
    assert!(session.is_logged_in());
    assert!(!session.is_expired_at(now, lifetime));
    assert!(!session.is_expired_at(now + Duration::seconds(3599), lifetime));
    assert!(session.is_expired_at(now + Duration::seconds(3601), lifetime));
}

#[test]
fn anonymous_session_never_expires() {
    let s = SessionContext::anonymous();
    assert!(!s.is_logged_in());
    assert!(!s.is_expired_at(Utc::now().naive_utc() + Duration::days(30), Duration::seconds(1)));
}

#[test]
fn session_reloads_from_token() {
    let pool = test_pool();
    let id = make_user(&pool, "leo", "pw", Some("editor"), "active");
    let session = logged_in(&pool, "leo", "pw");
    let reloaded = SessionContext::load(&pool, session.token().unwrap());
    assert_eq!(reloaded.user_id(), Some(id));
    assert_eq!(reloaded.state().unwrap().username, "leo");
    assert!(!SessionContext::load(&pool, "not-a-token").is_logged_in());
}

#[test]
fn logout_always_succeeds() {
    let pool = test_pool();
    let mut anon = SessionContext::anonymous();
    let r = auth::logout(&pool, &mut anon, &client());
    assert!(r.success);
    assert!(!anon.is_logged_in());
    assert_eq!(ActivityEntry::count_for_action(&pool, "logout"), 0);

    let id = make_user(&pool, "mia", "pw", Some("author"), "active");
    let mut session = logged_in(&pool, "mia", "pw");
    let token = session.token().unwrap().to_string();
    let r = auth::logout(&pool, &mut session, &client());
    assert!(r.success);
    assert_eq!(r.message, auth::MSG_LOGGED_OUT);
    assert!(!session.is_logged_in());
    assert!(session.token().is_none());
    assert!(!SessionContext::load(&pool, &token).is_logged_in());

    let entries = ActivityEntry::recent(&pool, 10);
    assert_eq!(entries[0].action, "logout");
    assert_eq!(entries[0].user_id, Some(id));
}

#[test]
fn logout_succeeds_on_broken_database() {
    let pool = broken_pool();
    let mut session = SessionContext::anonymous();
    assert!(auth::logout(&pool, &mut session, &client()).success);
}

// ═══════════════════════════════════════════════════════════
// Expiry enforcement
// ═══════════════════════════════════════════════════════════

#[test]
fn enforce_anonymous() {
    let pool = test_pool();
    let mut session = SessionContext::anonymous();
    let outcome = auth::enforce(&pool, &mut session, Duration::seconds(3600), &client());
    assert_eq!(outcome, GateOutcome::Anonymous);
}

#[test]
fn enforce_refreshes_active_session() {
    let pool = test_pool();
    make_user(&pool, "ned", "pw", Some("author"), "active");
    let mut session = logged_in(&pool, "ned", "pw");
    let lifetime = Duration::seconds(3600);
    let later = Utc::now().naive_utc() + Duration::seconds(1800);

    let outcome = auth::enforce_at(&pool, &mut session, lifetime, &client(), later);
    assert_eq!(outcome, GateOutcome::Active);
    assert_eq!(session.state().unwrap().last_activity, later);

    // The refreshed timestamp is persisted: another 1800s on is still fresh.
    let reloaded = SessionContext::load(&pool, session.token().unwrap());
    assert_eq!(reloaded.state().unwrap().last_activity, later);
    assert!(!reloaded.is_expired_at(later + Duration::seconds(1800), lifetime));
}

#[test]
fn enforce_logs_out_expired_session() {
    let pool = test_pool();
    let id = make_user(&pool, "olga", "pw", Some("author"), "active");
    let mut session = logged_in(&pool, "olga", "pw");
    let token = session.token().unwrap().to_string();
    let lifetime = Duration::seconds(3600);
    let later = Utc::now().naive_utc() + lifetime + Duration::seconds(1);

    let outcome = auth::enforce_at(&pool, &mut session, lifetime, &client(), later);
    assert_eq!(outcome, GateOutcome::Expired);
    assert!(!session.is_logged_in());
    assert!(!SessionContext::load(&pool, &token).is_logged_in());

    let entries = ActivityEntry::recent(&pool, 1);
    assert_eq!(entries[0].action, "logout");
    assert_eq!(entries[0].user_id, Some(id));
}

#[test]
fn gate_redirect_targets() {
    assert_eq!(GateOutcome::Active.login_redirect(), None);
    assert_eq!(GateOutcome::Anonymous.login_redirect().as_deref(), Some("/admin/login"));
    assert_eq!(
        GateOutcome::Expired.login_redirect().as_deref(),
        Some("/admin/login?expired=true")
    );
}

#[test]
fn gate_require_passes_only_active_sessions() {
    let pool = test_pool();
    let id = make_user(&pool, "opal", "pw", Some("author"), "active");
    let session = logged_in(&pool, "opal", "pw");

    let active = AuthGate { outcome: GateOutcome::Active, session };
    assert_eq!(active.require().unwrap().user_id(), Some(id));

    for outcome in [GateOutcome::Anonymous, GateOutcome::Expired] {
        let gate = AuthGate { outcome, session: SessionContext::anonymous() };
        assert!(gate.require().is_err());
    }
}

#[test]
fn cleanup_removes_only_idle_sessions() {
    let pool = test_pool();
    make_user(&pool, "pat", "pw", Some("author"), "active");
    make_user(&pool, "quin", "pw", Some("author"), "active");
    let fresh = logged_in(&pool, "pat", "pw");
    let stale = logged_in(&pool, "quin", "pw");
    pool.get()
        .unwrap()
        .execute(
            "UPDATE sessions SET last_activity = ?1 WHERE id = ?2",
            rusqlite::params![minutes_ago(180), stale.token().unwrap()],
        )
        .unwrap();

    assert_eq!(cleanup_expired(&pool, Duration::seconds(3600)).unwrap(), 1);
    assert!(SessionContext::load(&pool, fresh.token().unwrap()).is_logged_in());
    assert!(!SessionContext::load(&pool, stale.token().unwrap()).is_logged_in());
}

// ═══════════════════════════════════════════════════════════
// Permissions
// ═══════════════════════════════════════════════════════════

#[test]
fn anonymous_has_no_permissions() {
    let pool = test_pool();
    let anon = SessionContext::anonymous();
    for p in Permission::list(&pool) {
        assert!(!has_permission(&pool, &anon, &p.name));
    }
}

#[test]
fn permission_missing_from_role_is_denied() {
    let pool = test_pool();
    make_user(&pool, "rob", "pw", Some("author"), "active");
    let session = logged_in(&pool, "rob", "pw");
    assert!(!has_permission(&pool, &session, "edit_articles"));
    assert!(has_permission(&pool, &session, "create_articles"));
}

#[test]
fn permission_follows_role_permissions_rows() {
    let pool = test_pool();
    make_user(&pool, "sue", "pw", Some("author"), "active");
    let session = logged_in(&pool, "sue", "pw");
    let author = Role::find_by_name(&pool, "author").unwrap();

    Role::grant(&pool, author.id, "edit_articles").unwrap();
    assert!(has_permission(&pool, &session, "edit_articles"));

    Role::revoke(&pool, author.id, "edit_articles").unwrap();
    assert!(!has_permission(&pool, &session, "edit_articles"));
}

#[test]
fn permission_for_user_without_role() {
    let pool = test_pool();
    make_user(&pool, "tom", "pw", None, "active");
    let session = logged_in(&pool, "tom", "pw");
    assert!(!has_permission(&pool, &session, "create_articles"));
}

#[test]
fn grant_unknown_permission_fails() {
    let pool = test_pool();
    let role = Role::create(&pool, "guest").unwrap();
    let err = Role::grant(&pool, role, "launch_rockets").unwrap_err();
    assert!(err.contains("Unknown permission"));
    Role::grant(&pool, role, "view_activity").unwrap();
    Role::grant(&pool, role, "view_activity").unwrap();
    assert_eq!(Role::permissions(&pool, role).len(), 1);
}

#[test]
fn permission_flags_map() {
    let pool = test_pool();
    make_user(&pool, "uma", "pw", Some("editor"), "active");
    let session = logged_in(&pool, "uma", "pw");
    let flags = permission_flags(&pool, &session, &["edit_articles", "manage_users"]);
    assert_eq!(flags.get("edit_articles"), Some(&true));
    assert_eq!(flags.get("manage_users"), Some(&false));
}

#[test]
fn admin_has_every_permission() {
    let pool = test_pool();
    let session = logged_in(&pool, "admin", "admin");
    for p in Permission::list(&pool) {
        assert!(has_permission(&pool, &session, &p.name), "admin lacks {}", p.name);
    }
}

// ═══════════════════════════════════════════════════════════
// Activity log
// ═══════════════════════════════════════════════════════════

#[test]
fn recent_is_bounded_and_newest_first() {
    let pool = test_pool();
    for i in 0..7 {
        ActivityEntry::log(
            &pool,
            Some(1),
            &format!("action_{}", i),
            None,
            None,
            None,
            &client(),
        );
    }
    // Entry with the highest id gets the oldest timestamp.
    pool.get()
        .unwrap()
        .execute_batch(
            "UPDATE activity_logs SET created_at = datetime('2026-01-01 12:00:00', '-' || id || ' minutes');",
        )
        .unwrap();

    let entries = ActivityEntry::recent(&pool, 5);
    assert_eq!(entries.len(), 5);
    let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(
        actions,
        vec!["action_0", "action_1", "action_2", "action_3", "action_4"]
    );
    for pair in entries.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
}

#[test]
fn recent_tolerates_missing_user() {
    let pool = test_pool();
    ActivityEntry::log(&pool, Some(9999), "ghost_action", Some("article"), Some(3), Some("gone"), &client());
    ActivityEntry::log(&pool, None, "system_action", None, None, None, &ClientInfo::default());

    let entries = ActivityEntry::recent(&pool, 5);
    assert_eq!(entries.len(), 2);
    let ghost = entries.iter().find(|e| e.action == "ghost_action").unwrap();
    assert_eq!(ghost.user_id, Some(9999));
    assert!(ghost.username.is_none());
    assert_eq!(ghost.entity_type.as_deref(), Some("article"));
    assert_eq!(ghost.entity_id, Some(3));
    let system = entries.iter().find(|e| e.action == "system_action").unwrap();
    assert!(system.user_id.is_none());
    assert!(system.ip_address.is_none());
}

#[test]
fn activity_outlives_deleted_user() {
    let pool = test_pool();
    let id = make_user(&pool, "vic", "pw", Some("author"), "active");
    logged_in(&pool, "vic", "pw");
    User::delete(&pool, id).unwrap();
    let entries = ActivityEntry::recent(&pool, 5);
    assert_eq!(entries[0].user_id, Some(id));
    assert!(entries[0].username.is_none());
}

#[test]
fn activity_failures_are_swallowed() {
    let pool = broken_pool();
    ActivityEntry::log(&pool, Some(1), "login", None, None, None, &client());
    assert!(ActivityEntry::recent(&pool, 5).is_empty());
    assert_eq!(ActivityEntry::count(&pool), 0);
}

#[test]
fn recent_skips_unreadable_rows() {
    let pool = test_pool();
    ActivityEntry::log(&pool, None, "first", None, None, None, &client());
    ActivityEntry::log(&pool, None, "second", None, None, None, &client());
    pool.get()
        .unwrap()
        .execute(
            "INSERT INTO activity_logs (action, created_at) VALUES ('corrupt', 'not a timestamp')",
            [],
        )
        .unwrap();

    let actions: Vec<String> = ActivityEntry::recent(&pool, 10).into_iter().map(|e| e.action).collect();
    assert_eq!(actions, vec!["second", "first"]);
    assert_eq!(ActivityEntry::count(&pool), 3);
}

// ═══════════════════════════════════════════════════════════
// Content queries
// ═══════════════════════════════════════════════════════════

#[test]
fn featured_and_breaking_filters() {
    let pool = test_pool();
    make_article(&pool, None, Story { featured: true, ..Story::published("Old featured", 60) });
    make_article(&pool, None, Story { featured: true, ..Story::published("New featured", 5) });
    make_article(&pool, None, Story { breaking: true, ..Story::published("Breaking one", 10) });
    make_article(
        &pool,
        None,
        Story { status: "draft", featured: true, breaking: true, ..Story::published("Draft story", 1) },
    );
    make_article(&pool, None, Story::published("Plain", 2));

    assert_eq!(
        titles(&ArticleView::featured(&pool, 10)),
        vec!["New featured", "Old featured"]
    );
    assert_eq!(titles(&ArticleView::breaking(&pool, 10)), vec!["Breaking one"]);
    assert_eq!(titles(&ArticleView::featured(&pool, 1)), vec!["New featured"]);
}

#[test]
fn by_category_only_published_members() {
    let pool = test_pool();
    let politics = make_category(&pool, "Politics", None);
    let sport = make_category(&pool, "Sport", None);
    let a = make_article(&pool, None, Story::published("Election night", 30));
    let b = make_article(&pool, None, Story::published("Budget vote", 3));
    let c = make_article(&pool, None, Story::published("Cup final", 1));
    let d = make_article(&pool, None, Story { status: "draft", ..Story::published("Draft politics", 1) });
    for id in [a, b, d] {
        Category::set_for_article(&pool, id, &[politics]).unwrap();
    }
    Category::set_for_article(&pool, c, &[sport]).unwrap();

    assert_eq!(
        titles(&ArticleView::by_category(&pool, politics, 10)),
        vec!["Budget vote", "Election night"]
    );
    assert_eq!(titles(&ArticleView::by_category(&pool, sport, 10)), vec!["Cup final"]);
    assert!(ArticleView::by_category(&pool, 999, 10).is_empty());
}

#[test]
fn trending_by_views_then_recency() {
    let pool = test_pool();
    make_article(&pool, None, Story::published("Quiet", 1));
    let popular = make_article(&pool, None, Story::published("Popular", 100));
    let tie_old = make_article(&pool, None, Story::published("Tie old", 50));
    let tie_new = make_article(&pool, None, Story::published("Tie new", 20));
    for _ in 0..5 {
        Article::increment_views(&pool, popular).unwrap();
    }
    for id in [tie_old, tie_new] {
        Article::increment_views(&pool, id).unwrap();
        Article::increment_views(&pool, id).unwrap();
    }

    assert_eq!(
        titles(&ArticleView::trending(&pool, 10)),
        vec!["Popular", "Tie new", "Tie old", "Quiet"]
    );
    assert_eq!(ArticleView::trending(&pool, 2).len(), 2);
}

#[test]
fn view_rows_carry_joined_fields() {
    let pool = test_pool();
    let author = make_user(&pool, "wendy", "pw", Some("author"), "active");
    pool.get()
        .unwrap()
        .execute(
            "UPDATE users SET full_name = 'Wendy Writer', avatar = 'w.png' WHERE id = ?1",
            rusqlite::params![author],
        )
        .unwrap();
    let world = make_category(&pool, "World", None);
    let europe = make_category(&pool, "Europe", Some(world));
    let id = make_article(&pool, Some(author), Story { featured: true, ..Story::published("Summit", 5) });
    Category::set_for_article(&pool, id, &[world, europe]).unwrap();
    let t1 = Tag::find_or_create(&pool, "Diplomacy").unwrap();
    let t2 = Tag::find_or_create(&pool, "Trade").unwrap();
    Tag::set_for_article(&pool, id, &[t1, t2]).unwrap();

    let approved = Comment::create(
        &pool,
        &CommentForm { article_id: id, user_id: None, author_name: "Reader".into(), body: "Good".into() },
    )
    .unwrap();
    Comment::update_status(&pool, approved, "approved").unwrap();
    Comment::create(
        &pool,
        &CommentForm { article_id: id, user_id: None, author_name: "Spammer".into(), body: "Buy".into() },
    )
    .unwrap();

    let view = ArticleView::featured(&pool, 1).remove(0);
    assert_eq!(view.author_name.as_deref(), Some("Wendy Writer"));
    assert_eq!(view.author_avatar.as_deref(), Some("w.png"));
    let mut cats: Vec<&str> = view.categories.as_deref().unwrap().split(", ").collect();
    cats.sort();
    assert_eq!(cats, vec!["Europe", "World"]);
    let mut tags: Vec<&str> = view.tags.as_deref().unwrap().split(", ").collect();
    tags.sort();
    assert_eq!(tags, vec!["Diplomacy", "Trade"]);
    assert_eq!(view.comment_count, 1);
    assert_eq!(Comment::approved_for_article(&pool, id).len(), 1);
}

#[test]
fn view_row_without_author_or_links() {
    let pool = test_pool();
    make_article(&pool, None, Story::published("Orphan", 1));
    let view = ArticleView::latest(&pool, 1).remove(0);
    assert!(view.author_name.is_none());
    assert!(view.categories.is_none());
    assert!(view.tags.is_none());
    assert_eq!(view.comment_count, 0);
}

#[test]
fn author_name_falls_back_to_username() {
    let pool = test_pool();
    let author = make_user(&pool, "xena", "pw", Some("author"), "active");
    make_article(&pool, Some(author), Story::published("Byline", 1));
    let view = ArticleView::latest(&pool, 1).remove(0);
    assert_eq!(view.author_name.as_deref(), Some("xena"));
}

#[test]
fn published_by_slug_hides_drafts() {
    let pool = test_pool();
    make_article(&pool, None, Story::published("Live story", 1));
    make_article(&pool, None, Story { status: "draft", ..Story::published("Secret story", 1) });
    assert!(ArticleView::published_by_slug(&pool, "live-story").is_some());
    assert!(ArticleView::published_by_slug(&pool, "secret-story").is_none());
    assert!(ArticleView::published_by_slug(&pool, "missing").is_none());
}

#[test]
fn article_flags_and_status() {
    let pool = test_pool();
    let id = make_article(&pool, None, Story { status: "draft", ..Story::published("Flag me", 1) });
    Article::set_flags(&pool, id, true, true).unwrap();
    let a = Article::find_by_id(&pool, id).unwrap();
    assert!(a.featured && a.breaking_news);
    assert!(Article::set_flags(&pool, 9999, true, false).is_err());

    assert_eq!(Article::count(&pool, Some("published")), 0);
    Article::update_status(&pool, id, "published").unwrap();
    assert_eq!(Article::count(&pool, Some("published")), 1);
    assert_eq!(Article::count(&pool, None), 1);
}

#[test]
fn top_level_categories_oldest_first() {
    let pool = test_pool();
    let news = make_category(&pool, "News", None);
    make_category(&pool, "Local", Some(news));
    make_category(&pool, "Arts", None);
    make_category(&pool, "Business", None);

    let names: Vec<String> = Category::top_level(&pool, 10).into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["News", "Arts", "Business"]);
    assert_eq!(Category::top_level(&pool, 2).len(), 2);
    assert_eq!(Category::children(&pool, news).len(), 1);
}

#[test]
fn unreadable_rows_do_not_empty_a_section() {
    let pool = test_pool();
    make_article(&pool, None, Story { featured: true, ..Story::published("Readable", 5) });
    let bad = make_article(&pool, None, Story { featured: true, ..Story::published("Garbled", 1) });
    make_category(&pool, "Good", None);
    let conn = pool.get().unwrap();
    conn.execute(
        "UPDATE articles SET published_at = 'yesterday-ish' WHERE id = ?1",
        rusqlite::params![bad],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO categories (name, slug, created_at) VALUES ('Bad', 'bad', 'soon')",
        [],
    )
    .unwrap();
    drop(conn);

    assert_eq!(titles(&ArticleView::featured(&pool, 5)), vec!["Readable"]);
    let names: Vec<String> = Category::top_level(&pool, 10).into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["Good"]);
}

#[test]
fn content_queries_fail_soft() {
    let pool = broken_pool();
    assert!(ArticleView::featured(&pool, 5).is_empty());
    assert!(ArticleView::breaking(&pool, 5).is_empty());
    assert!(ArticleView::by_category(&pool, 1, 5).is_empty());
    assert!(ArticleView::trending(&pool, 5).is_empty());
    assert!(ArticleView::latest(&pool, 5).is_empty());
    assert!(ArticleView::published_by_slug(&pool, "x").is_none());
    assert!(Category::top_level(&pool, 5).is_empty());
}

#[test]
fn content_query_fails_soft_when_one_table_breaks() {
    let pool = test_pool();
    make_article(&pool, None, Story { featured: true, ..Story::published("Still here", 1) });
    make_category(&pool, "Kept", None);
    pool.get().unwrap().execute_batch("DROP TABLE article_tags;").unwrap();

    assert!(ArticleView::featured(&pool, 5).is_empty());
    assert_eq!(Category::top_level(&pool, 5).len(), 1);
}

// ═══════════════════════════════════════════════════════════
// Tags
// ═══════════════════════════════════════════════════════════

#[test]
fn tag_find_or_create_reuses_slug() {
    let pool = test_pool();
    let a = Tag::find_or_create(&pool, "Climate Change").unwrap();
    let b = Tag::find_or_create(&pool, "climate change").unwrap();
    assert_eq!(a, b);
    let article = make_article(&pool, None, Story::published("Heat records", 5));
    Tag::set_for_article(&pool, article, &[a]).unwrap();
    let tags = Tag::for_article(&pool, article);
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "Climate Change");
    assert_eq!(tags[0].slug, "climate-change");
    assert!(Tag::find_or_create(&pool, "!!!").is_err());
}

// ═══════════════════════════════════════════════════════════
// Roles, categories, passwords
// ═══════════════════════════════════════════════════════════

#[test]
fn custom_role_and_permission() {
    let pool = test_pool();
    let id = make_user(&pool, "yuri", "pw", None, "active");
    let session = logged_in(&pool, "yuri", "pw");

    Permission::create(&pool, "manage_newsletters", Some("Send newsletters")).unwrap();
    let role = Role::create(&pool, "marketing").unwrap();
    Role::grant(&pool, role, "manage_newsletters").unwrap();
    assert!(!has_permission(&pool, &session, "manage_newsletters"));

    User::update_role(&pool, id, Some(role)).unwrap();
    assert!(has_permission(&pool, &session, "manage_newsletters"));

    User::update_role(&pool, id, None).unwrap();
    assert!(!has_permission(&pool, &session, "manage_newsletters"));
}

#[test]
fn category_lookup_and_delete() {
    let pool = test_pool();
    let parent = make_category(&pool, "Science", None);
    let child = make_category(&pool, "Space", Some(parent));
    assert_eq!(Category::find_by_id(&pool, child).unwrap().parent_id, Some(parent));
    assert_eq!(Category::children(&pool, parent).len(), 1);

    Category::delete(&pool, parent).unwrap();
    assert!(Category::find_by_id(&pool, parent).is_none());
    // Orphaned children become top-level.
    assert!(Category::find_by_id(&pool, child).unwrap().parent_id.is_none());
    assert_eq!(Category::top_level(&pool, 10).len(), 1);
}

#[test]
fn password_hash_roundtrip() {
    let hash = auth::hash_password("s3cret").unwrap();
    assert!(auth::verify_password("s3cret", &hash));
    assert!(!auth::verify_password("other", &hash));
    assert!(!auth::verify_password("s3cret", "not-a-hash"));
}

#[test]
fn client_rate_key_hides_address() {
    let key = client().rate_key("login");
    assert!(key.starts_with("login:"));
    assert!(!key.contains("203.0.113.7"));
    assert_eq!(key, ClientInfo::new("203.0.113.7", "other").rate_key("login"));
}

// ═══════════════════════════════════════════════════════════
// HTTP routes
// ═══════════════════════════════════════════════════════════

const PEER: &str = "198.51.100.20:40000";

fn http_client(pool: &DbPool, config: AppConfig) -> Client {
    let figment = rocket::Config::figment()
        .merge(("template_dir", "website/templates"))
        .merge(("log_level", "off"));
    Client::tracked(crate::build(figment, pool.clone(), config)).expect("valid rocket instance")
}

fn peer() -> SocketAddr {
    PEER.parse().unwrap()
}

fn post_form<'c>(http: &'c Client, uri: String, body: &str) -> LocalResponse<'c> {
    http.post(uri)
        .remote(peer())
        .header(ContentType::Form)
        .body(body.to_string())
        .dispatch()
}

fn http_login<'c>(http: &'c Client, identifier: &str, password: &str) -> LocalResponse<'c> {
    post_form(
        http,
        "/admin/login".to_string(),
        &format!("identifier={}&password={}", identifier, password),
    )
}

fn location(response: &LocalResponse<'_>) -> Option<String> {
    response.headers().get_one("Location").map(|l| l.to_string())
}

fn session_rows(pool: &DbPool) -> i64 {
    pool.get()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
        .unwrap()
}

fn admin_client(pool: &DbPool) -> Client {
    let http = http_client(pool, AppConfig::default());
    let response = http_login(&http, "admin", "admin");
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response).as_deref(), Some("/admin"));
    drop(response);
    http
}

#[test]
fn http_admin_requires_login() {
    let pool = test_pool();
    let http = http_client(&pool, AppConfig::default());

    let response = http.get("/admin").dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response).as_deref(), Some("/admin/login"));

    let response = http.get("/admin/anything/else").dispatch();
    assert_eq!(location(&response).as_deref(), Some("/admin/login"));
}

#[test]
fn http_active_session_reaches_dashboard() {
    let pool = test_pool();
    let http = admin_client(&pool);
    assert!(http.cookies().get_private(auth::SESSION_COOKIE).is_some());

    let response = http.get("/admin").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(
        response.headers().get_one("Cache-Control"),
        Some("no-store, no-cache, must-revalidate, max-age=0")
    );
}

#[test]
fn http_expired_session_redirects_with_indicator() {
    let pool = test_pool();
    let http = admin_client(&pool);
    pool.get()
        .unwrap()
        .execute(
            "UPDATE sessions SET last_activity = ?1",
            rusqlite::params![minutes_ago(120)],
        )
        .unwrap();

    let response = http.get("/admin").dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response).as_deref(), Some("/admin/login?expired=true"));
    drop(response);

    assert!(http.cookies().get_private(auth::SESSION_COOKIE).is_none());
    assert_eq!(session_rows(&pool), 0);
    assert_eq!(ActivityEntry::recent(&pool, 1)[0].action, "logout");

    let page = http.get("/admin/login?expired=true").dispatch();
    assert!(page.into_string().unwrap().contains("Your session has expired"));
}

#[test]
fn http_failed_relogin_keeps_session() {
    let pool = test_pool();
    let http = admin_client(&pool);

    let response = http_login(&http, "admin", "not-the-password");
    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().unwrap().contains("Invalid password"));

    assert_eq!(session_rows(&pool), 1);
    assert!(http.cookies().get_private(auth::SESSION_COOKIE).is_some());
    assert_eq!(http.get("/admin").dispatch().status(), Status::Ok);
    assert_eq!(ActivityEntry::count_for_action(&pool, "logout"), 0);
}

#[test]
fn http_forwarded_headers_do_not_evade_rate_limit() {
    let pool = test_pool();
    let http = http_client(&pool, AppConfig::default());

    let blocked = (0..20)
        .filter(|i| {
            let body = http
                .post("/admin/login")
                .remote(peer())
                .header(ContentType::Form)
                .header(Header::new("X-Forwarded-For", format!("10.0.0.{}", i)))
                .header(Header::new("CF-Connecting-IP", format!("10.1.0.{}", i)))
                .body("identifier=admin&password=wrong")
                .dispatch()
                .into_string()
                .unwrap();
            body.contains("Too many login attempts")
        })
        .count();
    assert_eq!(blocked, 15);
}

#[test]
fn http_trusted_proxy_headers_key_the_limiter() {
    let pool = test_pool();
    let config = AppConfig { trust_proxy_headers: true, ..AppConfig::default() };
    let http = http_client(&pool, config);
    let attempt = |forwarded: &str| {
        http.post("/admin/login")
            .remote(peer())
            .header(ContentType::Form)
            .header(Header::new("X-Forwarded-For", forwarded.to_string()))
            .body("identifier=admin&password=wrong")
            .dispatch()
            .into_string()
            .unwrap()
            .contains("Too many login attempts")
    };

    for i in 0..6 {
        assert!(!attempt(&format!("192.0.2.{}, 10.0.0.1", i)));
    }
    for _ in 0..5 {
        assert!(!attempt("192.0.2.200"));
    }
    assert!(attempt("192.0.2.200"));
}

#[test]
fn http_flag_update_failure_is_server_error() {
    let pool = test_pool();
    let id = make_article(&pool, None, Story::published("Locked story", 5));
    let http = admin_client(&pool);

    assert_eq!(
        post_form(&http, "/admin/articles/9999/feature".to_string(), "featured=true").status(),
        Status::NotFound
    );

    pool.get()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER lock_flags BEFORE UPDATE OF featured ON articles
             BEGIN SELECT RAISE(ABORT, 'flags are locked'); END;",
        )
        .unwrap();
    let response = post_form(&http, format!("/admin/articles/{}/feature", id), "featured=true");
    assert_eq!(response.status(), Status::InternalServerError);
    assert_eq!(ActivityEntry::count_for_action(&pool, "article_flags"), 0);
}

#[test]
fn http_missing_permission_is_forbidden() {
    let pool = test_pool();
    make_user(&pool, "rita", "pw", Some("author"), "active");
    let id = make_article(&pool, None, Story { status: "draft", ..Story::published("Rita's draft", 5) });
    let http = http_client(&pool, AppConfig::default());
    http_login(&http, "rita", "pw");

    let response = post_form(&http, format!("/admin/articles/{}/status", id), "status=published");
    assert_eq!(response.status(), Status::Forbidden);
    assert_eq!(Article::find_by_id(&pool, id).unwrap().status, "draft");
}

#[test]
fn http_publish_article_and_moderate_comment() {
    let pool = test_pool();
    let id = make_article(&pool, None, Story { status: "draft", ..Story::published("Council vote", 5) });
    let http = admin_client(&pool);

    let bad = post_form(&http, format!("/admin/articles/{}/status", id), "status=live");
    assert_eq!(bad.status(), Status::BadRequest);
    let ok = post_form(&http, format!("/admin/articles/{}/status", id), "status=published");
    assert_eq!(ok.status(), Status::SeeOther);
    assert!(ArticleView::published_by_slug(&pool, "council-vote").is_some());

    let comment = Comment::create(
        &pool,
        &CommentForm {
            article_id: id,
            user_id: None,
            author_name: "Reader".to_string(),
            body: "Good coverage".to_string(),
        },
    )
    .unwrap();
    assert!(Comment::approved_for_article(&pool, id).is_empty());
    post_form(&http, format!("/admin/comments/{}/status", comment), "status=approved");
    assert_eq!(Comment::approved_for_article(&pool, id).len(), 1);
    assert_eq!(
        post_form(&http, "/admin/comments/9999/status".to_string(), "status=approved").status(),
        Status::NotFound
    );
}

#[test]
fn http_create_article_with_taxonomy() {
    let pool = test_pool();
    let politics = make_category(&pool, "Politics", None);
    let http = admin_client(&pool);

    let body = format!(
        "title=Budget+passes&content=Body&categories={}&tags=Budget,+Economy",
        politics
    );
    assert_eq!(post_form(&http, "/admin/articles".to_string(), &body).status(), Status::SeeOther);
    let again = post_form(&http, "/admin/articles".to_string(), "title=Budget+passes&content=Other");
    assert_eq!(again.status(), Status::SeeOther);

    let conn = pool.get().unwrap();
    let (id, status): (i64, String) = conn
        .query_row(
            "SELECT id, status FROM articles WHERE slug = 'budget-passes'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))
        .unwrap();
    drop(conn);

    assert_eq!(status, "draft");
    assert_eq!(total, 2);
    assert_eq!(Category::for_article(&pool, id)[0].name, "Politics");
    let tags: Vec<String> = Tag::for_article(&pool, id).into_iter().map(|t| t.name).collect();
    assert_eq!(tags, vec!["Budget", "Economy"]);
}

#[test]
fn http_user_role_and_status_changes() {
    let pool = test_pool();
    let sam = make_user(&pool, "sam", "pw", Some("author"), "active");
    let admin_id = User::find_by_identifier(&pool, "admin").unwrap().unwrap().id;
    let http = admin_client(&pool);

    post_form(&http, format!("/admin/users/{}/role", sam), "role=editor");
    let editor = Role::find_by_name(&pool, "editor").unwrap();
    assert_eq!(User::get_by_id(&pool, sam).unwrap().role_id, Some(editor.id));

    assert_eq!(
        post_form(&http, format!("/admin/users/{}/role", sam), "role=overlord").status(),
        Status::BadRequest
    );
    assert_eq!(
        post_form(&http, format!("/admin/users/{}/status", admin_id), "status=suspended").status(),
        Status::BadRequest
    );

    post_form(&http, format!("/admin/users/{}/status", sam), "status=suspended");
    assert_eq!(User::get_by_id(&pool, sam).unwrap().status, "suspended");
    assert_eq!(ActivityEntry::count_for_action(&pool, "user_status"), 1);
}

#[test]
fn http_role_permissions_round_trip() {
    let pool = test_pool();
    let http = admin_client(&pool);

    post_form(&http, "/admin/roles".to_string(), "name=reviewer");
    post_form(
        &http,
        "/admin/roles/reviewer/permissions".to_string(),
        "permission=moderate_comments&granted=true",
    );
    let reviewer = Role::find_by_name(&pool, "reviewer").unwrap();
    let names: Vec<String> = Role::permissions(&pool, reviewer.id).into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["moderate_comments"]);

    let listing: serde_json::Value = serde_json::from_str(&http.get("/admin/roles").dispatch().into_string().unwrap()).unwrap();
    let listed = listing["roles"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "reviewer")
        .unwrap();
    assert_eq!(listed["permissions"][0], "moderate_comments");

    post_form(
        &http,
        "/admin/roles/reviewer/permissions".to_string(),
        "permission=moderate_comments&granted=false",
    );
    assert!(Role::permissions(&pool, reviewer.id).is_empty());
    assert_eq!(
        post_form(&http, "/admin/roles/reviewer/permissions".to_string(), "permission=fly&granted=true").status(),
        Status::BadRequest
    );
}

#[test]
fn http_settings_update_accepts_known_keys_only() {
    let pool = test_pool();
    let http = admin_client(&pool);

    let ok = post_form(&http, "/admin/settings".to_string(), "values[site_name]=Daily+Bulletin");
    assert_eq!(ok.status(), Status::SeeOther);
    assert_eq!(SiteSettings::load(&pool).site_name, "Daily Bulletin");

    let bad = post_form(&http, "/admin/settings".to_string(), "values[admin_password]=x");
    assert_eq!(bad.status(), Status::BadRequest);
    assert_eq!(Setting::get(&pool, "admin_password"), None);
}

#[test]
fn http_visitor_comment_waits_for_moderation() {
    let pool = test_pool();
    let id = make_article(&pool, None, Story::published("Harbour reopens", 5));
    let http = http_client(&pool, AppConfig::default());

    let response = post_form(
        &http,
        "/article/harbour-reopens/comments".to_string(),
        "author_name=Mia&body=Finally!",
    );
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(
        location(&response).as_deref(),
        Some("/article/harbour-reopens?comment=pending")
    );
    assert!(Comment::approved_for_article(&pool, id).is_empty());
    assert_eq!(ActivityEntry::count_for_action(&pool, "comment_create"), 1);

    let empty = post_form(&http, "/article/harbour-reopens/comments".to_string(), "author_name=&body=hi");
    assert_eq!(location(&empty).as_deref(), Some("/article/harbour-reopens?comment=invalid"));
    assert_eq!(
        post_form(&http, "/article/no-such-story/comments".to_string(), "author_name=A&body=B").status(),
        Status::NotFound
    );
}
