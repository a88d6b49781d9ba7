//! Logging setup
//!
//! Console output always; with a log directory also daily rolling files:
//!
//! ```text
//! {log_dir}/
//!   ├── app/app.YYYY-MM-DD        # everything except target "security"
//!   └── security/security.YYYY-MM-DD  # sign-in / sign-out trail
//! ```
//!
//! Application files older than `APP_LOG_RETENTION_DAYS` are pruned hourly.

use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, prelude::*};

pub const APP_LOG_RETENTION_DAYS: i64 = 14;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn file_layer(json: bool, writer: RollingFileAppender, security: bool) -> BoxedLayer {
    let keep = move |meta: &tracing::Metadata<'_>| (meta.target() == "security") == security;
    let writer = std::sync::Mutex::new(writer);
    if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_writer(writer)
            .with_filter(tracing_subscriber::filter::filter_fn(keep))
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(tracing_subscriber::filter::filter_fn(keep))
            .boxed()
    }
}

/// Initialize logging. `RUST_LOG` overrides `level`.
pub fn init_logger_with_file(
    level: &str,
    json_format: bool,
    log_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let env_filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if json_format {
        layers.push(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(env_filter())
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(env_filter())
                .boxed(),
        );
    }

    if let Some(dir) = log_dir {
        let app_dir = dir.join("app");
        let security_dir = dir.join("security");
        fs::create_dir_all(&app_dir)?;
        fs::create_dir_all(&security_dir)?;

        let app_log = RollingFileAppender::new(Rotation::DAILY, app_dir, "app");
        let security_log = RollingFileAppender::new(Rotation::DAILY, security_dir, "security");
        layers.push(file_layer(json_format, app_log, false).with_filter(env_filter()).boxed());
        layers.push(file_layer(json_format, security_log, true));

        tokio::spawn(periodic_cleanup(dir.to_path_buf()));
    }

    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(())
}

pub fn init_logger(level: &str, json_format: bool) -> anyhow::Result<()> {
    init_logger_with_file(level, json_format, None)
}

/// Delete `app.YYYY-MM-DD` files older than the retention window.
/// Security logs are kept.
pub fn cleanup_old_logs(log_dir: &Path) -> anyhow::Result<usize> {
    let cutoff = chrono::Local::now().date_naive() - chrono::Duration::days(APP_LOG_RETENTION_DAYS);
    let app_dir = log_dir.join("app");
    if !app_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(app_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(date) = name.strip_prefix("app.")
            && let Ok(date) = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
            && date < cutoff
        {
            fs::remove_file(&path)?;
            tracing::info!(file = %name, "Deleted old log file");
            removed += 1;
        }
    }
    Ok(removed)
}

async fn periodic_cleanup(log_dir: PathBuf) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
    loop {
        interval.tick().await;
        if let Err(e) = cleanup_old_logs(&log_dir) {
            tracing::error!(error = %e, "Failed to cleanup old logs");
        }
    }
}

/// Security trail: sign-in, sign-out and rejected credentials
#[macro_export]
macro_rules! security_log {
    (WARN, $event:expr, $($arg:tt)*) => {
        tracing::warn!(target: "security", event = $event, $($arg)*)
    };
    (INFO, $event:expr, $($arg:tt)*) => {
        tracing::info!(target: "security", event = $event, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cleanup_keeps_recent_and_security_logs() {
        let dir = TempDir::new().unwrap();
        let app = dir.path().join("app");
        let security = dir.path().join("security");
        fs::create_dir_all(&app).unwrap();
        fs::create_dir_all(&security).unwrap();

        let today = chrono::Local::now().date_naive();
        let old = today - chrono::Duration::days(APP_LOG_RETENTION_DAYS + 1);
        fs::write(app.join(format!("app.{}", old.format("%Y-%m-%d"))), "").unwrap();
        fs::write(app.join(format!("app.{}", today.format("%Y-%m-%d"))), "").unwrap();
        fs::write(security.join(format!("security.{}", old.format("%Y-%m-%d"))), "").unwrap();

        assert_eq!(cleanup_old_logs(dir.path()).unwrap(), 1);
        assert_eq!(fs::read_dir(&app).unwrap().count(), 1);
        assert_eq!(fs::read_dir(&security).unwrap().count(), 1);
    }
}
