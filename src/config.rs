use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_addr: String,
    pub catalog_file: PathBuf,
    pub public_dir: PathBuf, // uploads/ живёт внутри
    pub scratch_dir: PathBuf,
    pub archive_name: String,
    pub max_upload_size: usize,
    pub sentry_dsn: Option<String>,
    pub swagger_enabled: bool,
    pub swagger_title: String,
    pub swagger_version: String,
    pub production_mode: bool,
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|s| s == "true" || s == "1")
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Self {
        dotenv().ok();
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
        let catalog_file = env::var("CATALOG_FILE")
            .unwrap_or_else(|_| "data/uploads.json".into())
            .into();
        let public_dir = env::var("PUBLIC_DIR").unwrap_or_else(|_| "public".into()).into();
        let scratch_dir = env::var("SCRATCH_DIR").unwrap_or_else(|_| "temp".into()).into();
        let archive_name =
            env::var("ARCHIVE_NAME").unwrap_or_else(|_| "astroclub_uploads.zip".into());
        let max_upload_size = env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20 * 1024 * 1024);

        let sentry_dsn = env::var("SENTRY_DSN").ok().filter(|s| !s.is_empty());

        let swagger_enabled = env_flag("SWAGGER_ENABLED", true);
        let swagger_title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Club Gallery".into());
        let swagger_version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "1.0.0".into());
        let production_mode = env_flag("PRODUCTION_MODE", false);

        Self {
            bind_addr,
            catalog_file,
            public_dir,
            scratch_dir,
            archive_name,
            max_upload_size,
            sentry_dsn,
            swagger_enabled,
            swagger_title,
            swagger_version,
            production_mode,
        }
    }

    /// Settings rooted in `root`, for tests.
    #[cfg(test)]
    pub fn rooted_at(root: &std::path::Path) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            catalog_file: root.join("data").join("uploads.json"),
            public_dir: root.join("public"),
            scratch_dir: root.join("temp"),
            archive_name: "astroclub_uploads.zip".into(),
            max_upload_size: 1024 * 1024,
            sentry_dsn: None,
            swagger_enabled: false,
            swagger_title: "Club Gallery".into(),
            swagger_version: "test".into(),
            production_mode: true,
        }
    }
}
