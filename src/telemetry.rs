use sentry::{ClientInitGuard, IntoDsn};
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

/// fmt-подписчик; уровень из RUST_LOG, по умолчанию info
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

/// Sentry client, only when a DSN is configured. Keep the guard alive.
pub fn init_sentry(dsn: Option<String>) -> Option<ClientInitGuard> {
    dsn.as_ref()?;
    let guard = sentry::init((
        dsn.into_dsn().ok()?,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            traces_sample_rate: 0.1,
            shutdown_timeout: Duration::from_secs(2),
            ..Default::default()
        },
    ));
    tracing::info!("Sentry reporting enabled");
    Some(guard)
}
