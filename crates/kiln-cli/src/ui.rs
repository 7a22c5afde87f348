//! Terminal output: status lines and the build summary.
//!
//! Everything goes to stderr so `kiln build --json` keeps stdout clean.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use kiln_bundler::{BuildResult, Diagnostic, HmrDecision};
use owo_colors::OwoColorize;

static COLOR: AtomicBool = AtomicBool::new(true);

/// Decide once whether status lines are colored.
pub fn init_colors(no_color: bool) {
    COLOR.store(!no_color && crate::logger::should_use_colors(), Ordering::Relaxed);
}

fn colored() -> bool {
    COLOR.load(Ordering::Relaxed)
}

pub fn success(message: &str) {
    if colored() {
        eprintln!("{} {}", "✓".green().bold(), message);
    } else {
        eprintln!("✓ {message}");
    }
}

pub fn info(message: &str) {
    if colored() {
        eprintln!("{} {}", "ℹ".blue().bold(), message);
    } else {
        eprintln!("ℹ {message}");
    }
}

pub fn warning(message: &str) {
    if colored() {
        eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
    } else {
        eprintln!("⚠ {message}");
    }
}

pub fn error(message: &str) {
    if colored() {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    } else {
        eprintln!("✗ {message}");
    }
}

/// Format a byte count with the largest fitting unit.
///
/// ```
/// use kiln_cli::ui::format_size;
///
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;
    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// ```
/// use std::time::Duration;
/// use kiln_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    if total_ms < 1000 {
        format!("{total_ms}ms")
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        error(&diagnostic.to_string());
        if let Some(help) = &diagnostic.help {
            eprintln!("    {help}");
        }
    }
}

/// Artifact table followed by the fingerprint line.
pub fn print_build_summary(result: &BuildResult, duration: Duration) {
    let width = result
        .artifacts
        .iter()
        .map(|a| a.file_name.len())
        .max()
        .unwrap_or(0);

    eprintln!();
    for artifact in &result.artifacts {
        let size = format_size(artifact.len() as u64);
        if colored() {
            eprintln!(
                "  {:<width$}  {:>10}  {}",
                artifact.file_name.cyan(),
                size,
                artifact.artifact_type.dimmed()
            );
        } else {
            eprintln!("  {:<width$}  {:>10}  {}", artifact.file_name, size, artifact.artifact_type);
        }
    }
    eprintln!();

    let source = if result.from_cache { "cached" } else { "built" };
    success(&format!(
        "{} {} artifacts in {} (output {})",
        source,
        result.artifacts.len(),
        format_duration(duration),
        result.fingerprint.output_hash.short()
    ));
}

pub fn print_decision(decision: &HmrDecision) {
    match decision {
        HmrDecision::Reload { .. } => warning(&decision.to_string()),
        _ => success(&decision.to_string()),
    }
}
