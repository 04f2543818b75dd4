use std::{env, path::Path, sync::OnceLock};
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt,
    util::SubscriberInitExt,
};

static INITED: OnceLock<()> = OnceLock::new();

const DEFAULT_DIRECTIVES: &str = "panel_oracle=info,tower_http=info,warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Split `LOG_FILE` into (directory, file name). A bare file name lands in
/// `LOG_DIR`, or the working directory when that is unset too.
fn file_target(log_file: &str) -> (String, String) {
    let fallback_dir = || env::var("LOG_DIR").unwrap_or_else(|_| ".".into());
    let p = Path::new(log_file);
    match p.file_name().and_then(|s| s.to_str()) {
        Some(name) => {
            let dir = p
                .parent()
                .map(|d| d.to_string_lossy().into_owned())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(fallback_dir);
            (dir, name.to_string())
        }
        None => (fallback_dir(), log_file.to_string()),
    }
}

fn appender(dir: &str, file: &str) -> RollingFileAppender {
    // never|daily|hourly|minutely
    let rotation = env::var("LOG_ROTATION").unwrap_or_else(|_| "never".into());
    match rotation.to_lowercase().as_str() {
        "daily" => tracing_appender::rolling::daily(dir, file),
        "hourly" => tracing_appender::rolling::hourly(dir, file),
        "minutely" => tracing_appender::rolling::minutely(dir, file),
        _ => tracing_appender::rolling::never(dir, file),
    }
}

/// Install the global subscriber. Later calls are no-ops, and so is a call
/// made after some other subscriber was already installed (tests).
///
/// Env vars:
/// - RUST_LOG: filter directives (e.g. "panel_oracle=debug,tower_http=info")
/// - LOG_FORMAT: "pretty" (default) or "json"
/// - LOG_ANSI: "0" to disable colors on the console
/// - LOG_FILE / LOG_DIR / LOG_ROTATION: mirror records as JSON into a file
pub fn init() {
    if INITED.get().is_some() {
        return;
    }

    let console = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(env::var("LOG_ANSI").map_or(true, |v| v != "0"));
    let format = env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".into());
    let console = if format.eq_ignore_ascii_case("json") {
        console.json().boxed()
    } else {
        console.pretty().boxed()
    };

    let file_layer = env::var("LOG_FILE")
        .ok()
        .filter(|f| !f.is_empty())
        .map(|f| {
            let (dir, file) = file_target(&f);
            let (writer, guard) =
                tracing_appender::non_blocking(appender(&dir, &file));
            // flushes on drop; the process owns it until exit
            Box::leak(Box::new(guard));
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .json()
                .with_writer(writer)
                .boxed()
        });

    let installed = Registry::default()
        .with(env_filter())
        .with(console)
        .with(file_layer)
        .try_init();
    if installed.is_ok() {
        let _ = INITED.set(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_with_directory_keeps_it() {
        let (dir, file) = file_target("/var/log/oracle/monitor.log");
        assert_eq!(dir, "/var/log/oracle");
        assert_eq!(file, "monitor.log");
    }
}
