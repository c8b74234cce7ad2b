//! Live composite preview.
//!
//! A fixed-rate task draws the screen and camera with the current webcam
//! placement onto a canvas and publishes it as a video track. The same track
//! can feed the primary encoder when composite recording is enabled.

use std::sync::{Arc, Weak};

use clipcast_common::clock::RateController;
use clipcast_compositor::compose_live;
use clipcast_media_model::{CanvasSource, VideoTrack, WebcamConfigHandle};
use image::RgbaImage;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

struct PreviewShared {
    canvas: Arc<CanvasSource>,
    track: VideoTrack,
    screen: Option<VideoTrack>,
    camera: Mutex<Option<VideoTrack>>,
    webcam: WebcamConfigHandle,
    width: u32,
    height: u32,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PreviewShared {
    fn render(&self) {
        let screen = self.screen.as_ref().and_then(VideoTrack::latest_frame);
        let camera = self
            .camera
            .lock()
            .as_ref()
            .and_then(VideoTrack::latest_frame);
        let webcam = self.webcam.snapshot();

        let mut frame = RgbaImage::new(self.width, self.height);
        compose_live(&mut frame, screen.as_deref(), camera.as_deref(), &webcam);
        self.canvas.publish(frame);
    }
}

/// Handle to a running live composite. Clones share the same preview.
#[derive(Clone)]
pub struct LivePreview {
    shared: Arc<PreviewShared>,
}

impl LivePreview {
    /// Start compositing at `fps`. The first frame is drawn immediately.
    pub fn start(
        screen: Option<VideoTrack>,
        camera: Option<VideoTrack>,
        webcam: WebcamConfigHandle,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Self {
        let canvas = Arc::new(CanvasSource::new());
        let shared = Arc::new(PreviewShared {
            track: VideoTrack::new("live-composite", canvas.clone()),
            canvas,
            screen,
            camera: Mutex::new(camera),
            webcam,
            width: width.max(1),
            height: height.max(1),
            task: Mutex::new(None),
        });
        shared.render();

        let period = RateController::new(fps).interval();
        let weak: Weak<PreviewShared> = Arc::downgrade(&shared);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                shared.render();
            }
        });
        *shared.task.lock() = Some(task);

        tracing::info!(width, height, fps, "Live preview started");
        Self { shared }
    }

    /// The composited output.
    pub fn track(&self) -> VideoTrack {
        self.shared.track.clone()
    }

    /// Swap the camera shown in the composite; `None` hides it.
    pub fn set_camera(&self, camera: Option<VideoTrack>) {
        tracing::info!(visible = camera.is_some(), "Live preview camera changed");
        *self.shared.camera.lock() = camera;
    }

    pub fn has_camera(&self) -> bool {
        self.shared.camera.lock().is_some()
    }

    /// Draw one frame now, outside the regular cadence.
    pub fn render_now(&self) {
        self.shared.render();
    }

    /// Stop the render task and end the output track.
    pub fn stop(&self) {
        if let Some(task) = self.shared.task.lock().take() {
            task.abort();
            tracing::debug!("Live preview stopped");
        }
        self.shared.track.stop();
    }
}

impl std::fmt::Debug for LivePreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivePreview")
            .field("width", &self.shared.width)
            .field("height", &self.shared.height)
            .field("camera", &self.has_camera())
            .finish()
    }
}
