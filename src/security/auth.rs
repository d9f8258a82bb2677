use chrono::{Duration, NaiveDateTime, Utc};
use log::{error, info};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::Redirect;
use rocket::State;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::user::User;
use crate::security::session::SessionContext;

pub const SESSION_COOKIE: &str = "newsroom_session";

pub const LOGIN_PATH: &str = "/admin/login";

pub const MSG_LOGIN_OK: &str = "Login successful";
pub const MSG_LOGGED_OUT: &str = "Logged out";
pub const MSG_USER_NOT_FOUND: &str = "User not found";
pub const MSG_INVALID_PASSWORD: &str = "Invalid password";
pub const MSG_NOT_ACTIVE: &str = "Your account is not active. Please contact an administrator.";
pub const MSG_DATABASE_ERROR: &str = "Database error";

// ── Client info request guard ──

/// Network address and client agent of the caller, handed explicitly to
/// anything that records who did what.
///
/// The address is the socket peer unless `trust_proxy_headers` is set, in
/// which case the first header present wins, in order:
///   1. CF-Connecting-IP (Cloudflare)
///   2. X-Real-IP (nginx proxy_set_header)
///   3. X-Forwarded-For (first IP in the chain = original client)
///   4. the socket peer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    #[cfg(test)]
    pub fn new(ip_address: &str, user_agent: &str) -> Self {
        ClientInfo {
            ip_address: Some(ip_address.to_string()),
            user_agent: Some(user_agent.to_string()),
        }
    }

    /// Key for per-client counters; hashed so raw addresses are not kept in memory.
    pub fn rate_key(&self, bucket: &str) -> String {
        format!(
            "{}:{}",
            bucket,
            hash_ip(self.ip_address.as_deref().unwrap_or("unknown"))
        )
    }
}

fn first_header(request: &Request<'_>, name: &str) -> Option<String> {
    request
        .headers()
        .get_one(name)
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn client_address(request: &Request<'_>, trust_proxy_headers: bool) -> Option<String> {
    let peer = || request.remote().map(|addr| addr.ip().to_string());
    if !trust_proxy_headers {
        return peer();
    }
    first_header(request, "CF-Connecting-IP")
        .or_else(|| first_header(request, "X-Real-IP"))
        .or_else(|| first_header(request, "X-Forwarded-For"))
        .or_else(peer)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientInfo {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let trust_proxy_headers = request
            .rocket()
            .state::<AppConfig>()
            .map(|c| c.trust_proxy_headers)
            .unwrap_or(false);
        let ip_address = client_address(request, trust_proxy_headers);
        let user_agent = request
            .headers()
            .get_one("User-Agent")
            .map(|ua| ua.chars().take(512).collect());

        Outcome::Success(ClientInfo {
            ip_address,
            user_agent,
        })
    }
}

// ── Auth gate request guard ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// No session for this client.
    Anonymous,
    /// The session had been idle too long and was just logged out.
    Expired,
    /// Logged in; last activity refreshed.
    Active,
}

/// Runs the expiry check for every admin request. Always succeeds; handlers
/// call [`AuthGate::require`] to turn a missing or expired session into a
/// redirect to the login page.
pub struct AuthGate {
    pub outcome: GateOutcome,
    pub session: SessionContext,
}

impl GateOutcome {
    /// Where the request is sent instead, or `None` when it may go on.
    pub fn login_redirect(self) -> Option<String> {
        match self {
            GateOutcome::Active => None,
            GateOutcome::Expired => Some(format!("{}?expired=true", LOGIN_PATH)),
            GateOutcome::Anonymous => Some(LOGIN_PATH.to_string()),
        }
    }
}

impl AuthGate {
    pub fn require(self) -> Result<SessionContext, Redirect> {
        match self.outcome.login_redirect() {
            None => Ok(self.session),
            Some(target) => Err(Redirect::to(target)),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthGate {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let pool = match request.guard::<&State<DbPool>>().await.succeeded() {
            Some(p) => p,
            None => return Outcome::Forward(Status::InternalServerError),
        };
        let config = match request.guard::<&State<AppConfig>>().await.succeeded() {
            Some(c) => c,
            None => return Outcome::Forward(Status::InternalServerError),
        };
        let client = request
            .guard::<ClientInfo>()
            .await
            .succeeded()
            .unwrap_or_default();

        let cookies = request.cookies();
        let mut session = match cookies.get_private(SESSION_COOKIE) {
            Some(c) => SessionContext::load(pool, c.value()),
            None => SessionContext::anonymous(),
        };

        let outcome = enforce(pool, &mut session, config.session_lifetime(), &client);
        if outcome != GateOutcome::Active {
            clear_session_cookie(cookies);
        }

        Outcome::Success(AuthGate { outcome, session })
    }
}

// ── Password utilities ──

pub fn hash_password(password: &str) -> Result<String, String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| e.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

// ── Login / logout ──

/// Outcome of login and logout, rendered straight into the login page.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthResult {
    pub success: bool,
    pub message: String,
}

impl AuthResult {
    fn ok(message: &str) -> Self {
        AuthResult {
            success: true,
            message: message.to_string(),
        }
    }

    fn fail(message: &str) -> Self {
        AuthResult {
            success: false,
            message: message.to_string(),
        }
    }
}

/// Verify credentials and, on success, start a session in `session`.
///
/// `identifier` may be a username or an email address. Checks run in a fixed
/// order: unknown user, wrong password, inactive account. Database failures
/// come back as a plain "Database error" result.
pub fn login(
    pool: &DbPool,
    session: &mut SessionContext,
    identifier: &str,
    password: &str,
    client: &ClientInfo,
) -> AuthResult {
    let user = match User::find_by_identifier(pool, identifier.trim()) {
        Ok(Some(u)) => u,
        Ok(None) => return AuthResult::fail(MSG_USER_NOT_FOUND),
        Err(e) => {
            error!("Login lookup failed: {}", e);
            return AuthResult::fail(MSG_DATABASE_ERROR);
        }
    };

    if !verify_password(password, &user.password_hash) {
        ActivityEntry::log(
            pool,
            Some(user.id),
            "login_failed",
            Some("user"),
            Some(user.id),
            Some("Invalid password"),
            client,
        );
        return AuthResult::fail(MSG_INVALID_PASSWORD);
    }

    if !user.is_active() {
        return AuthResult::fail(MSG_NOT_ACTIVE);
    }

    let now = Utc::now().naive_utc();
    if let Err(e) = session.begin(pool, &user, client, now) {
        error!("Session creation failed for user {}: {}", user.id, e);
        return AuthResult::fail(MSG_DATABASE_ERROR);
    }

    // Not atomic with the session insert or the log write below.
    if let Err(e) = User::touch_last_login(pool, user.id, now) {
        error!("Updating last_login for user {} failed: {}", user.id, e);
        session.destroy(pool);
        return AuthResult::fail(MSG_DATABASE_ERROR);
    }

    ActivityEntry::log(
        pool,
        Some(user.id),
        "login",
        Some("user"),
        Some(user.id),
        Some(&format!("{} logged in", user.username)),
        client,
    );
    info!("User '{}' logged in", user.username);

    AuthResult::ok(MSG_LOGIN_OK)
}

/// End the session. Always succeeds, whether or not anyone was logged in.
pub fn logout(pool: &DbPool, session: &mut SessionContext, client: &ClientInfo) -> AuthResult {
    if let Some(state) = session.state() {
        ActivityEntry::log(
            pool,
            Some(state.user_id),
            "logout",
            Some("user"),
            Some(state.user_id),
            Some(&format!("{} logged out", state.username)),
            client,
        );
    }
    session.destroy(pool);
    AuthResult::ok(MSG_LOGGED_OUT)
}

/// The per-request expiry check: log out an idle session, otherwise refresh
/// its last activity.
pub fn enforce(
    pool: &DbPool,
    session: &mut SessionContext,
    lifetime: Duration,
    client: &ClientInfo,
) -> GateOutcome {
    enforce_at(pool, session, lifetime, client, Utc::now().naive_utc())
}

pub fn enforce_at(
    pool: &DbPool,
    session: &mut SessionContext,
    lifetime: Duration,
    client: &ClientInfo,
    now: NaiveDateTime,
) -> GateOutcome {
    if !session.is_logged_in() {
        return GateOutcome::Anonymous;
    }
    if session.is_expired_at(now, lifetime) {
        if let Some(state) = session.state() {
            info!("Session for '{}' expired", state.username);
        }
        logout(pool, session, client);
        return GateOutcome::Expired;
    }
    if let Err(e) = session.touch(pool, now) {
        log::warn!("Refreshing session activity failed: {}", e);
    }
    GateOutcome::Active
}

// ── Cookies ──

pub fn set_session_cookie(cookies: &CookieJar<'_>, token: &str, secure: bool) {
    let mut cookie = Cookie::new(SESSION_COOKIE, token.to_string());
    cookie.set_http_only(true);
    cookie.set_same_site(rocket::http::SameSite::Strict);
    cookie.set_path("/");
    if secure {
        cookie.set_secure(true);
    }
    cookies.add_private(cookie);
}

pub fn clear_session_cookie(cookies: &CookieJar<'_>) {
    cookies.remove_private(Cookie::from(SESSION_COOKIE));
}

pub fn hash_ip(ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hex::encode(hasher.finalize())
}
