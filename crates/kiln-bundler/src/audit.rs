//! Reproducibility checks.

use crate::cache::CacheOptions;
use crate::context::{BuildContext, Stage};
use crate::fingerprint::{BuildFingerprint, FingerprintChain};
use crate::pipeline::{BuildOptions, BuildResult, build};
use crate::Result;

/// Two fingerprints of the same inputs disagree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("builds diverged at the {stage} stage: expected {expected}, got {actual}")]
pub struct DeterminismError {
    pub stage: Stage,
    pub expected: String,
    pub actual: String,
}

/// Compare two fingerprints, naming the first stage that differs.
///
/// `build_time` is informational and ignored.
pub fn compare(
    expected: &BuildFingerprint,
    actual: &BuildFingerprint,
) -> std::result::Result<(), DeterminismError> {
    let Some(stage) = FingerprintChain::diverged_stage(expected, actual) else {
        return Ok(());
    };
    let pick = |fp: &BuildFingerprint| match stage {
        Stage::Init => fp.input_hash.to_string(),
        Stage::Graph => fp.graph_hash.to_string(),
        Stage::Plan => fp.plan_hash.to_string(),
        _ => fp.output_hash.to_string(),
    };
    Err(DeterminismError {
        stage,
        expected: pick(expected),
        actual: pick(actual),
    })
}

/// Build twice from scratch and require identical fingerprints.
///
/// The cache is disabled and nothing is written, so both runs do the full
/// work. Returns the first build on success.
pub async fn verify_reproducible(options: BuildOptions, ctx: &BuildContext) -> Result<BuildResult> {
    let mut options = options.cache(CacheOptions::disabled()).write(false);
    options.cache_backend = None;

    let first = build(options.clone(), ctx).await?;
    let second = build(options, ctx).await?;

    match compare(&first.fingerprint, &second.fingerprint) {
        Ok(()) => {
            ctx.report(
                Stage::Audit,
                "reproducible",
                &first.fingerprint.output_hash.to_string(),
            );
            Ok(first)
        }
        Err(err) => {
            ctx.report(Stage::Audit, "diverged", &err.to_string());
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::ENGINE_VERSION;
    use kiln_config::Target;
    use kiln_graph::hash_bytes;

    fn fingerprint() -> BuildFingerprint {
        BuildFingerprint {
            engine_version: ENGINE_VERSION.into(),
            graph_hash: hash_bytes(b"g"),
            plan_hash: hash_bytes(b"p"),
            input_hash: hash_bytes(b"i"),
            output_hash: hash_bytes(b"o"),
            target: Target::Browser,
            build_time: "t1".into(),
        }
    }

    #[test]
    fn build_time_is_ignored() {
        let a = fingerprint();
        let mut b = fingerprint();
        b.build_time = "t2".into();
        assert!(compare(&a, &b).is_ok());
    }

    #[test]
    fn names_the_diverged_stage() {
        let a = fingerprint();
        let mut b = fingerprint();
        b.plan_hash = hash_bytes(b"p2");
        b.output_hash = hash_bytes(b"o2");

        let err = compare(&a, &b).unwrap_err();
        assert_eq!(err.stage, Stage::Plan);
        assert_eq!(err.expected, a.plan_hash.to_string());
        assert_eq!(err.actual, b.plan_hash.to_string());
        assert!(err.to_string().contains("plan stage"));
    }
}
