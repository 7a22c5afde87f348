//! Logging setup for the kiln CLI.
//!
//! Verbosity comes from the global flags; without them `KILN_LOG` and then
//! `RUST_LOG` are honored, falling back to info for kiln crates.
//!
//! ```rust,no_run
//! use kiln_cli::logger::init_logger;
//!
//! init_logger(false, false, false);
//! tracing::info!("starting build");
//! ```

use kiln_bundler::LogLevel;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: &[&str] = &["kiln", "kiln_cli", "kiln_bundler", "kiln_config", "kiln_graph"];

/// One directive per kiln crate at `level`.
fn directives(level: LogLevel) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Filter for the given flags.
///
/// `--verbose` wins over `--quiet`; clap already rejects both together.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(directives(LogLevel::Debug))
    } else if quiet {
        EnvFilter::new(directives(LogLevel::Error))
    } else {
        EnvFilter::try_from_env(kiln_bundler::logging::LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(directives(LogLevel::Info)))
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && should_use_colors())
        .with_writer(std::io::stderr)
        .compact();

    // a second init (tests) is not an error worth surfacing
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(fmt_layer)
        .try_init();
}

/// Whether stderr should get ANSI colors.
///
/// `NO_COLOR` disables and `FORCE_COLOR` forces colors; otherwise the
/// terminal decides.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_directives_cover_every_crate() {
        let filter = directives(LogLevel::Warn);
        assert!(filter.starts_with("kiln=warn,"));
        assert!(filter.contains("kiln_graph=warn"));
        let _ = filter_for(true, false);
        let _ = filter_for(false, true);
    }

    #[test]
    #[serial]
    fn test_no_color_wins_over_force_color() {
        // SAFETY: serialized with the other env-mutating tests
        unsafe {
            std::env::set_var("NO_COLOR", "1");
            std::env::set_var("FORCE_COLOR", "1");
        }
        assert!(!should_use_colors());
        unsafe {
            std::env::remove_var("NO_COLOR");
        }
        assert!(should_use_colors());
        unsafe {
            std::env::remove_var("FORCE_COLOR");
        }
    }
}
