use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Explicit sqlite URL; when unset the database lives under data_dir
    pub database_url: Option<String>,
    /// Prefix prepended to upload URLs returned to clients (e.g. a CDN origin)
    #[serde(default)]
    pub public_url_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            database_url: None,
            public_url_prefix: String::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_login")]
    pub login: String,
    #[serde(default = "default_admin_password")]
    pub password: String,
    /// Admin session lifetime in hours
    #[serde(default = "default_admin_session_hours")]
    pub session_hours: i64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            login: default_admin_login(),
            password: default_admin_password(),
            session_hours: default_admin_session_hours(),
        }
    }
}

fn default_admin_login() -> String {
    "Gasan123".to_string()
}

fn default_admin_password() -> String {
    "1111".to_string()
}

fn default_admin_session_hours() -> i64 {
    24
}

impl AdminConfig {
    /// True while the shipped placeholder credentials are still in effect
    pub fn uses_default_credentials(&self) -> bool {
        self.login == default_admin_login() && self.password == default_admin_password()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory holding user-submitted images (default: <data_dir>/uploads
    /// resolved at startup when left empty)
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Mailbox complaints are forwarded to
    pub complaints_to: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            smtp_tls: default_smtp_tls(),
            from_address: None,
            from_name: default_from_name(),
            complaints_to: None,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

fn default_from_name() -> String {
    "Registry".to_string()
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from_address.is_some() && self.complaints_to.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse configuration file")?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            admin: AdminConfig::default(),
            uploads: UploadConfig::default(),
            email: EmailConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Deployment-sensitive settings can be injected through the environment,
    /// taking precedence over the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("REGISTRY_DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.server.database_url = Some(v);
        }
        if let Ok(v) = std::env::var("PUBLIC_URL_PREFIX") {
            self.server.public_url_prefix = v;
        }
        if let Ok(v) = std::env::var("ADMIN_LOGIN") {
            self.admin.login = v;
        }
        if let Ok(v) = std::env::var("ADMIN_PASSWORD") {
            self.admin.password = v;
        }
        if let Ok(v) = std::env::var("UPLOAD_DIR") {
            self.uploads.dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("SMTP_HOST") {
            self.email.smtp_host = Some(v);
        }
        if let Ok(v) = std::env::var("SMTP_PORT") {
            if let Ok(port) = v.parse() {
                self.email.smtp_port = port;
            }
        }
        if let Ok(v) = std::env::var("SMTP_USERNAME") {
            self.email.smtp_username = Some(v);
        }
        if let Ok(v) = std::env::var("SMTP_PASSWORD") {
            self.email.smtp_password = Some(v);
        }
        if let Ok(v) = std::env::var("SMTP_FROM") {
            self.email.from_address = Some(v);
        }
        if let Ok(v) = std::env::var("COMPLAINTS_TO") {
            self.email.complaints_to = Some(v);
        }
    }

    /// Resolved upload directory
    pub fn upload_dir(&self) -> PathBuf {
        self.uploads
            .dir
            .clone()
            .unwrap_or_else(|| self.server.data_dir.join("uploads"))
    }

    /// Resolved sqlite connection URL
    pub fn database_url(&self) -> String {
        self.server.database_url.clone().unwrap_or_else(|| {
            format!(
                "sqlite:{}?mode=rwc",
                self.server.data_dir.join("registry.db").display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_credentials() {
        let config = Config::default();
        assert_eq!(config.admin.login, "Gasan123");
        assert_eq!(config.admin.password, "1111");
        assert!(config.admin.uses_default_credentials());
    }

    #[test]
    fn upload_dir_falls_back_to_data_dir() {
        let config = Config::default();
        assert_eq!(config.upload_dir(), PathBuf::from("./data/uploads"));

        let mut config = Config::default();
        config.uploads.dir = Some(PathBuf::from("/srv/uploads"));
        assert_eq!(config.upload_dir(), PathBuf::from("/srv/uploads"));
    }

    #[test]
    fn database_url_prefers_explicit_setting() {
        let mut config = Config::default();
        assert!(config.database_url().starts_with("sqlite:"));
        config.server.database_url = Some("sqlite::memory:".to_string());
        assert_eq!(config.database_url(), "sqlite::memory:");
    }

    #[test]
    fn parses_partial_config_file() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [admin]
            login = "ops"
            password = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.admin.login, "ops");
        assert!(!config.admin.uses_default_credentials());
        assert_eq!(config.uploads.max_bytes, 5 * 1024 * 1024);
    }
}
