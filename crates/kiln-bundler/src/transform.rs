//! Transformation collaborator.
//!
//! The engine does not compile modules itself. A [`Transformer`] turns the
//! source of one module into executable code; its output is cached at the
//! artifact tier under the transformer's [`id`](Transformer::id), so a
//! transformer must be a pure function of its request.

use async_trait::async_trait;
use kiln_config::{Mode, Target};

/// Input for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    /// Root-relative path or virtual id.
    pub path: String,
    pub content: String,
    pub target: Target,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub code: String,
    /// Source map, if the transformer produced one.
    pub map: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct TransformFailure {
    pub path: String,
    pub message: String,
}

impl TransformFailure {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait Transformer: Send + Sync + std::fmt::Debug {
    /// Identity and version, e.g. `swc@1.4`. Part of every artifact key.
    fn id(&self) -> &str;

    async fn transform(&self, request: TransformRequest) -> Result<TransformOutput, TransformFailure>;
}

/// Returns the source unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransformer;

#[async_trait]
impl Transformer for PassthroughTransformer {
    fn id(&self) -> &str {
        "passthrough@1"
    }

    async fn transform(&self, request: TransformRequest) -> Result<TransformOutput, TransformFailure> {
        Ok(TransformOutput {
            code: request.content,
            map: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passthrough_keeps_content() {
        let output = PassthroughTransformer
            .transform(TransformRequest {
                path: "src/a.ts".into(),
                content: "export const a = 1;".into(),
                target: Target::Browser,
                mode: Mode::Production,
            })
            .await
            .unwrap();
        assert_eq!(output.code, "export const a = 1;");
        assert!(output.map.is_none());
    }
}
