//! Terminal output: status lines and the build summary.
//!
//! Everything goes to stderr so stdout stays free for machine-readable
//! output. `--quiet` silences everything but errors, and color follows
//! `--no-color`, `NO_COLOR`, `FORCE_COLOR` and TTY detection.

mod format;
mod messages;

use std::sync::atomic::{AtomicBool, Ordering};

pub use format::{format_duration, format_size, print_build_summary};
pub use messages::{info, success, warning};

static COLOR: AtomicBool = AtomicBool::new(true);
static QUIET: AtomicBool = AtomicBool::new(false);

/// Check if running in a CI environment.
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS"]
        .iter()
        .any(|var| std::env::var_os(var).is_some())
}

/// Check if color output should be enabled.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr() && !is_ci()
}

/// Detect color support from the environment. Call once, early in `main`.
pub fn init_colors() {
    COLOR.store(should_use_color(), Ordering::Relaxed);
}

/// Apply the global `--no-color` and `--quiet` flags.
pub fn configure(no_color: bool, quiet: bool) {
    if no_color {
        COLOR.store(false, Ordering::Relaxed);
    }
    QUIET.store(quiet, Ordering::Relaxed);
}

pub(crate) fn colors_enabled() -> bool {
    COLOR.load(Ordering::Relaxed)
}

pub(crate) fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}
