//! True-duration resolution.
//!
//! Streaming containers written slice by slice often report an infinite
//! duration. Resolution is two-phase:
//!
//! 1. Seek far past the end and wait (bounded) for the container to report
//!    a finite duration.
//! 2. Seek back to zero so playback starts from the beginning.
//!
//! If the probe times out, the duration recorded with the artifact is used.

use std::time::Duration;

use crate::media::PlayableMedia;

/// Seek target used to force a duration scan. The largest integer an IEEE
/// double represents exactly.
pub const DURATION_PROBE_SECS: f64 = 9_007_199_254_740_991.0;

/// Resolve the playable duration of `media` in seconds.
pub async fn resolve_duration(
    media: &dyn PlayableMedia,
    fallback_secs: f64,
    timeout: Duration,
) -> f64 {
    if let Some(secs) = media.duration().finite_secs() {
        return secs;
    }

    tracing::debug!(reported = ?media.duration(), "Probing media duration");
    let mut changes = media.subscribe_duration();
    if let Err(e) = media.seek(DURATION_PROBE_SECS).await {
        tracing::warn!(error = %e, "Duration probe seek failed");
    }

    let probed = tokio::time::timeout(timeout, async {
        loop {
            if let Some(secs) = changes.borrow_and_update().finite_secs() {
                return Some(secs);
            }
            if changes.changed().await.is_err() {
                return None;
            }
        }
    })
    .await
    .ok()
    .flatten();

    if let Err(e) = media.seek(0.0).await {
        tracing::warn!(error = %e, "Seek back to start after duration probe failed");
    }

    match probed {
        Some(secs) => {
            tracing::info!(duration_secs = secs, "Resolved media duration");
            secs
        }
        None => {
            let fallback = fallback_secs.max(0.0);
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                fallback_secs = fallback,
                "Media duration unresolved, using recorded duration"
            );
            fallback
        }
    }
}
