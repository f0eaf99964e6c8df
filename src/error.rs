use std::time::Duration;
use thiserror::Error;

/// External call that can fail the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Narration,
    Speech,
    Search,
    Download,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Narration => "narration",
            Stage::Speech => "speech synthesis",
            Stage::Search => "footage search",
            Stage::Download => "footage download",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ReelError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{stage} failed: {reason}")]
    Provider { stage: Stage, reason: String },

    #[error("render failed: {0:#}")]
    Render(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReelError {
    pub fn config(msg: impl Into<String>) -> Self {
        ReelError::Config(msg.into())
    }

    pub fn provider(stage: Stage, reason: impl std::fmt::Display) -> Self {
        ReelError::Provider {
            stage,
            reason: reason.to_string(),
        }
    }

    pub fn timeout(stage: Stage, after: Duration) -> Self {
        ReelError::Provider {
            stage,
            reason: format!("timed out after {}s", after.as_secs()),
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReelError::Config(_) => 2,
            ReelError::Provider { .. } => 3,
            ReelError::Render(_) => 4,
            ReelError::Io(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReelError>;

/// Runs `fut` under `limit`, folding an elapsed deadline into a provider error.
pub async fn with_timeout<T, F>(stage: Stage, limit: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(ReelError::timeout(stage, limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_classes() {
        assert_eq!(ReelError::config("missing key").exit_code(), 2);
        assert_eq!(ReelError::provider(Stage::Search, "500").exit_code(), 3);
        assert_eq!(
            ReelError::Render(anyhow::anyhow!("ffmpeg exploded")).exit_code(),
            4
        );
    }

    #[test]
    fn provider_message_names_stage() {
        let err = ReelError::provider(Stage::Download, "HTTP 404");
        assert_eq!(err.to_string(), "footage download failed: HTTP 404");
    }

    #[tokio::test]
    async fn timeout_becomes_provider_error() {
        let res: Result<()> = with_timeout(Stage::Speech, Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        match res {
            Err(ReelError::Provider { stage, .. }) => assert_eq!(stage, Stage::Speech),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
