use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use crate::config::AppConfig;

/// Directories served or rendered from; created if missing.
const SITE_DIRS: &[&str] = &[
    "website",
    "website/static",
    "website/templates",
    "website/templates/admin",
];

/// Server cannot render its core pages without these.
const CRITICAL_TEMPLATES: &[&str] = &[
    "website/templates/base.html.tera",
    "website/templates/index.html.tera",
    "website/templates/article.html.tera",
    "website/templates/category.html.tera",
    "website/templates/admin/login.html.tera",
    "website/templates/admin/dashboard.html.tera",
];

#[derive(Debug, Default)]
pub struct BootReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

fn database_dir(config: &AppConfig) -> Option<PathBuf> {
    Path::new(&config.database_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

fn ensure_dir(path: &Path, report: &mut BootReport) {
    if path.exists() {
        return;
    }
    match fs::create_dir_all(path) {
        Ok(_) => info!("  Created directory: {}", path.display()),
        Err(e) => report
            .errors
            .push(format!("failed to create directory {}: {}", path.display(), e)),
    }
}

fn writable(dir: &Path) -> Result<(), std::io::Error> {
    let marker = dir.join(".write_test");
    fs::write(&marker, "test")?;
    let _ = fs::remove_file(&marker);
    Ok(())
}

/// Create the directories the site needs and verify it can write its
/// database and uploads. Template checks use the working directory.
pub fn check(config: &AppConfig) -> BootReport {
    let mut report = BootReport::default();

    for dir in SITE_DIRS {
        ensure_dir(Path::new(dir), &mut report);
    }
    let db_dir = database_dir(config);
    if let Some(dir) = &db_dir {
        ensure_dir(dir, &mut report);
    }
    let upload_dir = PathBuf::from(&config.upload_dir);
    ensure_dir(&upload_dir, &mut report);

    for file in CRITICAL_TEMPLATES {
        if !Path::new(file).exists() {
            report.errors.push(format!("missing critical template: {}", file));
        }
    }

    if let Some(dir) = db_dir.filter(|d| d.exists()) {
        if let Err(e) = writable(&dir) {
            report
                .errors
                .push(format!("database directory {} not writable: {}", dir.display(), e));
        }
    }

    if upload_dir.exists() {
        if let Err(e) = writable(&upload_dir) {
            report.warnings.push(format!(
                "upload directory {} not writable: {} (file uploads will fail)",
                upload_dir.display(),
                e
            ));
        }
    }

    if !Path::new("Rocket.toml").exists() {
        report
            .warnings
            .push("Rocket.toml not found, using default config".to_string());
    }

    report
}

/// Run the boot checks before launch; exits the process on any error.
pub fn run(config: &AppConfig) {
    info!("Newsroom boot check starting...");
    let report = check(config);

    for w in &report.warnings {
        warn!("  {}", w);
    }
    for e in &report.errors {
        error!("  {}", e);
    }

    if !report.errors.is_empty() {
        error!(
            "Boot check FAILED: {} error(s), {} warning(s). Aborting.",
            report.errors.len(),
            report.warnings.len()
        );
        process::exit(1);
    }

    if report.warnings.is_empty() {
        info!("Boot check passed. All systems go.");
    } else {
        warn!(
            "Boot check passed with {} warning(s). Some features may not work correctly.",
            report.warnings.len()
        );
    }
}
