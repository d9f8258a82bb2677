use rocket::form::Form;
use rocket::http::{CookieJar, Header};
use rocket::response::{self, Redirect, Responder};
use rocket::{Request, State};
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::db::DbPool;
use crate::models::settings::{Setting, SiteSettings};
use crate::rate_limit::RateLimiter;
use crate::security::auth::{self, AuthGate, ClientInfo, GateOutcome, SESSION_COOKIE};
use crate::security::session::SessionContext;

const LOGIN_WINDOW: std::time::Duration = std::time::Duration::from_secs(15 * 60);

/// Wrapper that adds no-cache headers to a Template response
pub struct NoCacheTemplate(pub Template);

impl<'r> Responder<'r, 'static> for NoCacheTemplate {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let mut resp = self.0.respond_to(req)?;
        resp.set_header(Header::new("Cache-Control", "no-store, no-cache, must-revalidate, max-age=0"));
        resp.set_header(Header::new("Pragma", "no-cache"));
        Ok(resp)
    }
}

#[derive(Debug, FromForm)]
pub struct LoginForm {
    pub identifier: String,
    pub password: String,
}

fn login_template(settings: &SiteSettings, error: Option<&str>, notice: Option<&str>) -> NoCacheTemplate {
    NoCacheTemplate(Template::render(
        "admin/login",
        json!({
            "settings": settings,
            "error": error,
            "notice": notice,
        }),
    ))
}

fn session_from_cookie(pool: &DbPool, cookies: &CookieJar<'_>) -> SessionContext {
    match cookies.get_private(SESSION_COOKIE) {
        Some(c) => SessionContext::load(pool, c.value()),
        None => SessionContext::anonymous(),
    }
}

#[get("/login?<expired>")]
pub fn login_page(
    pool: &State<DbPool>,
    gate: AuthGate,
    expired: Option<bool>,
) -> Result<NoCacheTemplate, Redirect> {
    if gate.outcome == GateOutcome::Active {
        return Err(Redirect::to("/admin"));
    }
    let settings = SiteSettings::load(pool);
    let notice = if expired.unwrap_or(false) || gate.outcome == GateOutcome::Expired {
        Some("Your session has expired. Please log in again.")
    } else {
        None
    };
    Ok(login_template(&settings, None, notice))
}

#[post("/login", data = "<form>")]
pub fn login_submit(
    form: Form<LoginForm>,
    pool: &State<DbPool>,
    limiter: &State<RateLimiter>,
    client: ClientInfo,
    cookies: &CookieJar<'_>,
) -> Result<Redirect, NoCacheTemplate> {
    let settings = SiteSettings::load(pool);
    let rate_key = client.rate_key("login");
    let max_attempts = Setting::get_i64(pool, "login_rate_limit").max(1) as u64;
    limiter.cleanup(LOGIN_WINDOW);

    if !limiter.check_and_record(&rate_key, max_attempts, LOGIN_WINDOW) {
        log::warn!("Login rate limit hit for {}", rate_key);
        return Err(login_template(
            &settings,
            Some("Too many login attempts. Please try again in 15 minutes."),
            None,
        ));
    }

    let mut session = session_from_cookie(pool, cookies);
    let result = auth::login(pool, &mut session, &form.identifier, &form.password, &client);
    if !result.success {
        return Err(login_template(&settings, Some(&result.message), None));
    }

    match session.token() {
        Some(token) => {
            let secure = settings.site_url.starts_with("https://");
            auth::set_session_cookie(cookies, token, secure);
            limiter.reset(&rate_key);
            Ok(Redirect::to("/admin"))
        }
        None => Err(login_template(&settings, Some(auth::MSG_DATABASE_ERROR), None)),
    }
}

#[get("/logout")]
pub fn logout(pool: &State<DbPool>, client: ClientInfo, cookies: &CookieJar<'_>) -> NoCacheTemplate {
    let mut session = session_from_cookie(pool, cookies);
    let result = auth::logout(pool, &mut session, &client);
    auth::clear_session_cookie(cookies);
    login_template(&SiteSettings::load(pool), None, Some(&result.message))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![login_page, login_submit, logout]
}
