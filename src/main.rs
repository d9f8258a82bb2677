#[macro_use]
extern crate rocket;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::figment::Figment;
use rocket::fs::{FileServer, Options};
use rocket::http::Header;
use rocket::response::content::RawHtml;
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;

mod boot;
mod config;
mod db;
mod models;
mod rate_limit;
mod routes;
mod security;
mod text;
mod uploads;

#[cfg(test)]
mod tests;

use config::AppConfig;
use rate_limit::RateLimiter;

pub struct NoCacheAdmin;

#[rocket::async_trait]
impl Fairing for NoCacheAdmin {
    fn info(&self) -> Info {
        Info { name: "No-Cache Admin Pages", kind: Kind::Response }
    }

    async fn on_response<'r>(&self, req: &'r rocket::Request<'_>, res: &mut rocket::Response<'r>) {
        if req.uri().path().starts_with("/admin") {
            res.set_header(Header::new("Cache-Control", "no-store, no-cache, must-revalidate, max-age=0"));
            res.set_header(Header::new("Pragma", "no-cache"));
        }
    }
}

#[catch(404)]
fn not_found() -> RawHtml<String> {
    RawHtml("<html><body style='font-family:sans-serif;text-align:center;padding:80px'><h1>404</h1><p>Page not found.</p><a href='/'>← Home</a></body></html>".to_string())
}

#[catch(500)]
fn server_error() -> RawHtml<String> {
    RawHtml("<html><body style='font-family:sans-serif;text-align:center;padding:80px'><h1>500</h1><p>Internal server error.</p><a href='/'>← Home</a></body></html>".to_string())
}

/// Assemble the server around an already prepared database.
pub fn build(figment: Figment, pool: db::DbPool, config: AppConfig) -> Rocket<Build> {
    let upload_dir = config.upload_dir.clone();

    rocket::custom(figment)
        .manage(pool)
        .manage(config)
        .manage(RateLimiter::new())
        .attach(Template::fairing())
        .attach(NoCacheAdmin)
        .mount("/static", FileServer::from("website/static"))
        .mount("/uploads", FileServer::new(upload_dir, Options::Missing | Options::NormalizeDirs))
        .mount("/", routes::public::routes())
        .mount("/admin", routes::auth::routes())
        .mount("/admin", routes::admin::routes())
        .register("/", catchers![not_found, server_error])
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    let figment = rocket::Config::figment();
    let config = AppConfig::from_figment(&figment);

    // Boot check: create directories, validate critical files
    boot::run(&config);

    let pool = db::init_pool_at(&config.database_path).expect("Failed to initialize database pool");
    db::run_migrations(&pool).expect("Failed to run database migrations");
    db::seed_defaults(&pool).expect("Failed to seed default settings");

    match security::session::cleanup_expired(&pool, config.session_lifetime()) {
        Ok(0) => {}
        Ok(n) => log::info!("Removed {} expired session(s)", n),
        Err(e) => log::warn!("Expired session cleanup failed: {}", e),
    }

    log::info!("Admin panel mounted at: /admin");
    build(figment, pool, config)
}
