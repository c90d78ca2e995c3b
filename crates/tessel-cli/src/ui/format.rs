//! Formatting utilities for sizes, durations, and build summaries.

use std::time::Duration;

use console::Term;
use owo_colors::OwoColorize;
use tessel_bundler::EmittedFile;

use super::{colors_enabled, is_quiet};

/// Format file size in human-readable format.
///
/// ```
/// use tessel_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1024), "1.00 KB");
/// assert_eq!(format_size(1_048_576), "1.00 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format duration in human-readable format.
///
/// ```
/// use std::time::Duration;
/// use tessel_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// One summary row: file name, the chunk kind it belongs to, and its size.
fn summary_row(file: &EmittedFile) -> (String, String, String) {
    let kind = match file.chunk {
        Some(kind) => kind.to_string(),
        None if file.name.ends_with(".html") => "html".to_string(),
        None => "manifest".to_string(),
    };
    (file.name.clone(), kind, format_size(file.size))
}

/// Print the emitted files with their sizes, then the total and elapsed time.
pub fn print_build_summary(files: &[EmittedFile], elapsed: Duration) {
    if is_quiet() {
        return;
    }
    let width = (Term::stderr().size().1 as usize).clamp(20, 80);
    let color = colors_enabled();

    if color {
        eprintln!("\n{}", "Build Summary".bold().underline());
    } else {
        eprintln!("\nBuild Summary");
    }
    eprintln!("{}", "─".repeat(width));

    for file in files {
        let (name, kind, size) = summary_row(file);
        if color {
            eprintln!(
                "  {} {} {} {}",
                "▸".blue(),
                name.bright_white().bold(),
                size.dimmed(),
                format!("({kind})").dimmed()
            );
        } else {
            eprintln!("  ▸ {name} {size} ({kind})");
        }
    }

    eprintln!("{}", "─".repeat(width));

    let total = format_size(files.iter().map(|file| file.size).sum());
    let elapsed = format_duration(elapsed);
    if color {
        eprintln!(
            "  {} {} in {}",
            "Total:".bold(),
            total.green(),
            elapsed.green()
        );
    } else {
        eprintln!("  Total: {total} in {elapsed}");
    }
}
