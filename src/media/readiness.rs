//! Readiness polling for registered assets.

use std::time::Duration;

use thiserror::Error;

use crate::ai::{AssetHandle, AssetState, GenAiError, GenerativeBackend};

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Status queries after the upload before giving up
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 60,
        }
    }
}

/// Why an asset never became ready
#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("remote processing of {asset} failed: {reason}")]
    Failed { asset: String, reason: String },

    #[error("{asset} still not ready after {attempts} status checks")]
    TimedOut { asset: String, attempts: u32 },

    #[error(transparent)]
    Backend(#[from] GenAiError),
}

/// Poll until `asset` is ready.
///
/// The handle returned by the upload is the first observation. While it is
/// pending or processing, sleep one interval and query again, at most
/// `policy.max_attempts` times. Only a handle in the `Ready` state is ever
/// returned.
pub async fn wait_until_ready(
    backend: &dyn GenerativeBackend,
    mut asset: AssetHandle,
    policy: PollPolicy,
) -> Result<AssetHandle, ReadinessError> {
    let mut attempts = 0u32;

    while !asset.state.is_terminal() {
        if attempts >= policy.max_attempts {
            tracing::warn!(asset = %asset.name, attempts, "gave up waiting for asset");
            return Err(ReadinessError::TimedOut {
                asset: asset.name,
                attempts,
            });
        }
        tracing::debug!(
            asset = %asset.name,
            state = %asset.state,
            attempt = attempts + 1,
            "asset not ready, waiting"
        );
        tokio::time::sleep(policy.interval).await;
        attempts += 1;
        asset = backend.get_file(&asset.name).await?;
    }

    if asset.state == AssetState::Failed {
        let reason = asset
            .error
            .clone()
            .unwrap_or_else(|| "no reason given".to_string());
        tracing::warn!(asset = %asset.name, %reason, "asset processing failed");
        return Err(ReadinessError::Failed {
            asset: asset.name,
            reason,
        });
    }

    tracing::info!(asset = %asset.name, attempts, backend = backend.name(), "asset ready");
    Ok(asset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::ScriptedBackend;
    use crate::ai::{GenerativeBackend, UploadRequest};

    async fn uploaded(backend: &ScriptedBackend) -> AssetHandle {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"0123456789").unwrap();
        backend
            .upload_file(UploadRequest {
                path,
                mime_type: "video/mp4".to_string(),
                display_name: "clip.mp4".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_two_intervals() {
        use AssetState::*;
        let backend = ScriptedBackend::with_states(&[Processing, Processing, Ready]);
        let asset = uploaded(&backend).await;

        let start = tokio::time::Instant::now();
        let ready = wait_until_ready(&backend, asset, PollPolicy::default())
            .await
            .unwrap();

        assert_eq!(ready.state, Ready);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(*backend.status_queries.lock(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_ready_does_not_poll() {
        let backend = ScriptedBackend::with_states(&[AssetState::Ready]);
        let asset = uploaded(&backend).await;

        let start = tokio::time::Instant::now();
        wait_until_ready(&backend, asset, PollPolicy::default())
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(*backend.status_queries.lock(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_state_stops_polling() {
        use AssetState::*;
        let backend = ScriptedBackend::with_states(&[Pending, Processing, Failed, Ready]);
        let asset = uploaded(&backend).await;

        let err = wait_until_ready(&backend, asset, PollPolicy::default())
            .await
            .unwrap_err();

        match err {
            ReadinessError::Failed { asset, reason } => {
                assert_eq!(asset, "files/scripted");
                assert_eq!(reason, "transcode error");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(*backend.status_queries.lock(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let backend = ScriptedBackend::with_states(&[AssetState::Processing]);
        let asset = uploaded(&backend).await;
        let policy = PollPolicy {
            interval: Duration::from_secs(10),
            max_attempts: 3,
        };

        let start = tokio::time::Instant::now();
        let err = wait_until_ready(&backend, asset, policy).await.unwrap_err();

        assert!(matches!(err, ReadinessError::TimedOut { attempts: 3, .. }));
        assert_eq!(*backend.status_queries.lock(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_upload_does_not_poll() {
        let backend = ScriptedBackend::with_states(&[AssetState::Failed]);
        let asset = uploaded(&backend).await;

        let err = wait_until_ready(&backend, asset, PollPolicy::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ReadinessError::Failed { .. }));
        assert_eq!(*backend.status_queries.lock(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_is_polled_like_processing() {
        use AssetState::*;
        let backend = ScriptedBackend::with_states(&[Pending, Pending, Ready]);
        let asset = uploaded(&backend).await;

        let ready = wait_until_ready(&backend, asset, PollPolicy::default())
            .await
            .unwrap();

        assert_eq!(ready.state, Ready);
        assert_eq!(*backend.status_queries.lock(), 2);
    }
}
