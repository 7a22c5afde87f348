//! Build command implementation.

use std::time::Instant;

use kiln_bundler::{BuildContext, CacheOptions, build, verify_reproducible};

use super::utils::load_project;
use crate::cli::BuildArgs;
use crate::error::{CliError, Result};
use crate::ui;

/// Execute the build command.
///
/// 1. Load kiln.toml and apply command line overrides
/// 2. Optionally build twice to check reproducibility
/// 3. Build, reusing cached results when the inputs are unchanged
/// 4. Print the summary, or the fingerprint with `--json`
///
/// # Errors
///
/// Configuration errors, fatal build errors, and [`CliError::PartialBuild`]
/// when some chunks failed. Artifacts of the healthy chunks are still
/// written in that case.
pub async fn execute(args: BuildArgs) -> Result<()> {
    let project = load_project(&args.project)?;
    let mut options = project.options;

    if let Some(out_dir) = args.out_dir {
        options = options.out_dir(out_dir);
    }
    if args.no_cache {
        options = options.cache(CacheOptions::disabled());
    } else if args.force {
        let cache = options.cache.clone().with_force_rebuild(true);
        options = options.cache(cache);
    }

    let ctx = BuildContext::default();

    if args.verify {
        ui::info("Checking that the build is reproducible...");
        let first = verify_reproducible(options.clone(), &ctx).await?;
        ui::success(&format!(
            "Reproducible (output {})",
            first.fingerprint.output_hash.short()
        ));
    }

    tracing::debug!(root = %project.root.display(), "starting build");
    let started = Instant::now();
    let result = build(options, &ctx).await?;
    let elapsed = started.elapsed();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.fingerprint)?);
    } else {
        ui::print_build_summary(&result, elapsed);
    }

    if !result.is_clean() {
        ui::print_diagnostics(&result.diagnostics);
        return Err(CliError::PartialBuild {
            count: result.diagnostics.len(),
        });
    }
    Ok(())
}
