//! Ownership of everything a recording session holds.
//!
//! Streams, the mix graph, the live preview and helper tasks all live in
//! one [`SessionResources`]. `release()` tears them down once; every exit
//! path calls it and dropping the last handle calls it too.

use std::sync::Arc;

use clipcast_media_model::{MediaStream, StreamKind};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::audio_mix::AudioMixGraph;
use crate::preview::LivePreview;
use crate::provider::CaptureProvider;

struct ResourcesInner {
    provider: Arc<dyn CaptureProvider>,
    streams: Vec<MediaStream>,
    mix: Option<AudioMixGraph>,
    preview: Option<LivePreview>,
    tasks: Vec<JoinHandle<()>>,
    released: bool,
}

impl ResourcesInner {
    fn release_all(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;

        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(preview) = self.preview.take() {
            preview.stop();
        }
        if let Some(mix) = self.mix.take() {
            mix.close();
        }
        let streams = self.streams.len();
        for stream in self.streams.drain(..) {
            self.provider.release(&stream);
        }
        tracing::info!(streams, "Released session resources");
        true
    }
}

impl Drop for ResourcesInner {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Shared handle to a session's resources.
#[derive(Clone)]
pub struct SessionResources {
    inner: Arc<Mutex<ResourcesInner>>,
}

impl SessionResources {
    pub fn new(provider: Arc<dyn CaptureProvider>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ResourcesInner {
                provider,
                streams: Vec::new(),
                mix: None,
                preview: None,
                tasks: Vec::new(),
                released: false,
            })),
        }
    }

    /// Take ownership of an acquired stream.
    ///
    /// A stream that arrives after release is given back immediately.
    pub fn add_stream(&self, stream: MediaStream) {
        let mut inner = self.inner.lock();
        if inner.released {
            tracing::warn!(kind = ?stream.kind(), "Stream acquired after release, giving it back");
            inner.provider.release(&stream);
            return;
        }
        inner.streams.push(stream);
    }

    /// Release one stream early and forget it.
    pub fn remove_stream(&self, stream_id: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(index) = inner.streams.iter().position(|s| s.id() == stream_id) else {
            return false;
        };
        let stream = inner.streams.remove(index);
        inner.provider.release(&stream);
        true
    }

    /// First held stream of `kind`.
    pub fn stream(&self, kind: StreamKind) -> Option<MediaStream> {
        self.inner
            .lock()
            .streams
            .iter()
            .find(|s| s.kind() == kind)
            .cloned()
    }

    pub fn stream_count(&self) -> usize {
        self.inner.lock().streams.len()
    }

    pub fn set_mix(&self, mix: AudioMixGraph) {
        let mut inner = self.inner.lock();
        if inner.released {
            mix.close();
            return;
        }
        inner.mix = Some(mix);
    }

    pub fn mix(&self) -> Option<AudioMixGraph> {
        self.inner.lock().mix.clone()
    }

    pub fn set_preview(&self, preview: LivePreview) {
        let mut inner = self.inner.lock();
        if inner.released {
            preview.stop();
            return;
        }
        inner.preview = Some(preview);
    }

    pub fn preview(&self) -> Option<LivePreview> {
        self.inner.lock().preview.clone()
    }

    /// Hand a session task over; `release()` aborts it.
    pub fn add_task(&self, task: JoinHandle<()>) {
        let mut inner = self.inner.lock();
        if inner.released {
            task.abort();
            return;
        }
        inner.tasks.push(task);
    }

    /// Tear everything down. Returns `false` if already released.
    pub fn release(&self) -> bool {
        self.inner.lock().release_all()
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }
}

impl std::fmt::Debug for SessionResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SessionResources")
            .field("streams", &inner.streams.len())
            .field("mix", &inner.mix.is_some())
            .field("preview", &inner.preview.is_some())
            .field("released", &inner.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticCaptureProvider;

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let provider = Arc::new(SyntheticCaptureProvider::new());
        let resources = SessionResources::new(provider.clone());
        let screen = provider.acquire_screen().await.unwrap();
        resources.add_stream(screen.clone());
        resources.set_mix(AudioMixGraph::create_mixer(Vec::new(), &[], 48000));

        assert!(resources.release());
        assert!(!resources.release());
        assert!(!screen.is_active());
        assert_eq!(provider.release_count(), 1);
    }

    #[tokio::test]
    async fn test_late_stream_is_given_back() {
        let provider = Arc::new(SyntheticCaptureProvider::new());
        let resources = SessionResources::new(provider.clone());
        resources.release();

        let camera = provider.acquire_camera().await.unwrap();
        resources.add_stream(camera.clone());
        assert!(!camera.is_active());
        assert_eq!(resources.stream_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases() {
        let provider = Arc::new(SyntheticCaptureProvider::new());
        let mic = provider.acquire_microphone().await.unwrap();
        {
            let resources = SessionResources::new(provider.clone());
            resources.add_stream(mic.clone());
        }
        assert!(!mic.is_active());
    }

    #[tokio::test]
    async fn test_remove_stream_releases_only_that_stream() {
        let provider = Arc::new(SyntheticCaptureProvider::new());
        let resources = SessionResources::new(provider.clone());
        let screen = provider.acquire_screen().await.unwrap();
        let mic = provider.acquire_microphone().await.unwrap();
        resources.add_stream(screen.clone());
        resources.add_stream(mic.clone());

        assert!(resources.remove_stream(mic.id()));
        assert!(!mic.is_active());
        assert!(screen.is_active());
        assert!(resources.stream(StreamKind::Microphone).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_aborts_tasks() {
        let provider = Arc::new(SyntheticCaptureProvider::new());
        let resources = SessionResources::new(provider);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        resources.add_task(tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        }));

        resources.release();
        // The sender is dropped with the aborted task.
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_task_added_after_release_is_aborted() {
        let provider = Arc::new(SyntheticCaptureProvider::new());
        let resources = SessionResources::new(provider);
        resources.release();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        resources.add_task(tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        }));
        assert!(rx.await.is_err());
    }
}
