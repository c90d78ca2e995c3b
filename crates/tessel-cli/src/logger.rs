//! Tracing subscriber setup for the CLI.
//!
//! Level precedence:
//! 1. `--verbose`: debug for tessel crates
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`
//! 4. `settings.log_level` from the config file
//! 5. info for tessel crates

use tessel_bundler::LogLevel;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: &[&str] = &["tessel_bundler", "tessel_config", "tessel_cli"];

/// Initialize the global subscriber. Later calls are ignored.
///
/// ```rust,no_run
/// use tessel_cli::logger::init_logger;
///
/// init_logger(false, false, false, None);
/// ```
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool, configured: Option<LogLevel>) {
    let filter = match filter_directives(verbose, quiet, configured) {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(crate_directives(configured.unwrap_or_default()))),
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && should_use_colors())
        .with_writer(std::io::stderr)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Directives forced by flags, or `None` when `RUST_LOG` should be consulted.
fn filter_directives(verbose: bool, quiet: bool, configured: Option<LogLevel>) -> Option<String> {
    if verbose {
        return Some(crate_directives(LogLevel::Debug));
    }
    if quiet {
        return Some("error".to_string());
    }
    if std::env::var_os("RUST_LOG").is_some() {
        return None;
    }
    configured.map(crate_directives)
}

fn crate_directives(level: LogLevel) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(CRATES.iter().map(|name| format!("{name}={level}")));
    directives.join(",")
}

/// Whether stderr should get ANSI colors (`NO_COLOR`, `FORCE_COLOR`, then TTY detection).
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}
