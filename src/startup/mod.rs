//! Startup self-checks.
//!
//! Runs before the server starts accepting requests: database connectivity,
//! upload directory writability, and a warning when the shipped admin
//! credentials are still in place.

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::DbPool;

/// Result of a single startup check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Critical failures abort startup
    pub critical: bool,
    pub message: String,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            critical: false,
            message: message.into(),
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>, critical: bool) -> Self {
        Self {
            name: name.into(),
            passed: false,
            critical,
            message: message.into(),
        }
    }
}

async fn check_database(pool: &DbPool) -> CheckResult {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => CheckResult::pass("database", "Database reachable"),
        Err(err) => CheckResult::fail(
            "database",
            format!("Database check failed: {}", err),
            true,
        ),
    }
}

fn check_upload_dir(config: &Config) -> CheckResult {
    let dir = config.upload_dir();
    if let Err(err) = std::fs::create_dir_all(&dir) {
        return CheckResult::fail(
            "upload_dir",
            format!("Cannot create upload dir {}: {}", dir.display(), err),
            true,
        );
    }
    let probe = dir.join(".write-probe");
    match std::fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            CheckResult::pass("upload_dir", format!("Upload dir {} writable", dir.display()))
        }
        Err(err) => CheckResult::fail(
            "upload_dir",
            format!("Upload dir {} not writable: {}", dir.display(), err),
            true,
        ),
    }
}

fn check_admin_credentials(config: &Config) -> CheckResult {
    if config.admin.uses_default_credentials() {
        CheckResult::fail(
            "admin_credentials",
            "Admin login/password are still the shipped defaults; set ADMIN_LOGIN and ADMIN_PASSWORD",
            false,
        )
    } else {
        CheckResult::pass("admin_credentials", "Admin credentials configured")
    }
}

/// Run all startup checks. Returns an error when a critical check failed.
pub async fn run_checks(config: &Config, pool: &DbPool) -> Result<Vec<CheckResult>> {
    let checks = vec![
        check_database(pool).await,
        check_upload_dir(config),
        check_admin_credentials(config),
    ];

    let mut critical_failure = false;
    for check in &checks {
        if check.passed {
            info!(check = %check.name, "{}", check.message);
        } else if check.critical {
            error!(check = %check.name, "{}", check.message);
            critical_failure = true;
        } else {
            warn!(check = %check.name, "{}", check.message);
        }
    }

    if critical_failure {
        anyhow::bail!("Startup checks failed");
    }
    Ok(checks)
}
