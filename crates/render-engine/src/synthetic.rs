//! Media opener for sample-record blobs.
//!
//! Plays back what the in-memory encoder wrote: each record's frame is
//! shown from its timestamp until the next one, and audio is a tone at the
//! recorded level. Like a streaming container, the duration is reported as
//! infinite until something seeks past the end.

use std::f64::consts::TAU;
use std::sync::Arc;

use clipcast_common::error::{ClipcastError, ClipcastResult};
use clipcast_media_model::samples::{decode_records, SampleRecord, SAMPLES_MIME};
use clipcast_media_model::{AudioSource, AudioTrack, Blob, VideoFrame};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::media::{MediaDuration, MediaOpener, PlayableMedia};

/// Tone used to re-synthesize recorded audio levels.
const PLAYBACK_TONE_HZ: f64 = 440.0;

/// Opens blobs written by the in-memory encoder.
#[derive(Debug, Clone)]
pub struct SampleMediaOpener {
    sample_rate: u32,
    report_infinite: bool,
}

impl SampleMediaOpener {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            report_infinite: true,
        }
    }

    /// Report the real duration right away instead of `Infinite`.
    pub fn with_known_duration(mut self) -> Self {
        self.report_infinite = false;
        self
    }
}

#[async_trait::async_trait]
impl MediaOpener for SampleMediaOpener {
    async fn open(&self, blob: &Blob) -> ClipcastResult<Arc<dyn PlayableMedia>> {
        if blob.mime_type() != SAMPLES_MIME {
            return Err(ClipcastError::export(format!(
                "unsupported media type '{}'",
                blob.mime_type()
            )));
        }
        let records = decode_records(blob.bytes())?;
        tracing::debug!(records = records.len(), bytes = blob.len(), "Opened sample media");
        Ok(Arc::new(SampleMedia::new(
            records,
            self.sample_rate,
            self.report_infinite,
        )))
    }
}

struct Playback {
    position: f64,
    playing_since: Option<Instant>,
    cached: Option<(usize, VideoFrame)>,
}

struct SampleShared {
    records: Vec<SampleRecord>,
    length_secs: f64,
    duration: watch::Sender<MediaDuration>,
    playback: Mutex<Playback>,
}

impl SampleShared {
    fn current_time(&self) -> f64 {
        let playback = self.playback.lock();
        Self::position_of(&playback, self.length_secs)
    }

    fn position_of(playback: &Playback, length_secs: f64) -> f64 {
        let running = playback
            .playing_since
            .map(|since| since.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (playback.position + running).min(length_secs)
    }

    /// Index of the last record at or before `t`.
    fn record_index_at(&self, t: f64) -> Option<usize> {
        let after = self.records.partition_point(|r| r.t <= t);
        after.checked_sub(1)
    }
}

/// A blob of sample records opened for playback.
pub struct SampleMedia {
    shared: Arc<SampleShared>,
    sample_rate: u32,
}

impl SampleMedia {
    fn new(records: Vec<SampleRecord>, sample_rate: u32, report_infinite: bool) -> Self {
        let length_secs = playable_length(&records);
        let initial = if report_infinite {
            MediaDuration::Infinite
        } else {
            MediaDuration::Finite(length_secs)
        };
        let (duration, _) = watch::channel(initial);
        Self {
            shared: Arc::new(SampleShared {
                records,
                length_secs,
                duration,
                playback: Mutex::new(Playback {
                    position: 0.0,
                    playing_since: None,
                    cached: None,
                }),
            }),
            sample_rate,
        }
    }
}

/// Last timestamp plus one average sample interval.
fn playable_length(records: &[SampleRecord]) -> f64 {
    match (records.first(), records.last()) {
        (Some(first), Some(last)) if records.len() > 1 => {
            let step = (last.t - first.t) / (records.len() - 1) as f64;
            last.t + step
        }
        (Some(only), _) => only.t,
        _ => 0.0,
    }
}

#[async_trait::async_trait]
impl PlayableMedia for SampleMedia {
    fn duration(&self) -> MediaDuration {
        *self.shared.duration.borrow()
    }

    fn subscribe_duration(&self) -> watch::Receiver<MediaDuration> {
        self.shared.duration.subscribe()
    }

    async fn seek(&self, secs: f64) -> ClipcastResult<()> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(ClipcastError::export(format!("invalid seek target {secs}")));
        }
        let length = self.shared.length_secs;
        if secs >= length && self.duration().finite_secs().is_none() {
            // Scanning to the end reveals the real length.
            self.shared
                .duration
                .send_replace(MediaDuration::Finite(length));
        }
        let mut playback = self.shared.playback.lock();
        playback.position = secs.min(length);
        if playback.playing_since.is_some() {
            playback.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    fn play(&self) {
        let mut playback = self.shared.playback.lock();
        if playback.playing_since.is_none() {
            playback.playing_since = Some(Instant::now());
        }
    }

    fn pause(&self) {
        let mut playback = self.shared.playback.lock();
        let position = SampleShared::position_of(&playback, self.shared.length_secs);
        playback.position = position;
        playback.playing_since = None;
    }

    fn current_time(&self) -> f64 {
        self.shared.current_time()
    }

    fn is_ended(&self) -> bool {
        self.shared.current_time() >= self.shared.length_secs
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        let t = self.shared.current_time();
        let index = self.shared.record_index_at(t)?;
        // Records without video hold the previous frame.
        let index = (0..=index)
            .rev()
            .find(|&i| self.shared.records[i].video.is_some())?;

        let mut playback = self.shared.playback.lock();
        if let Some((cached, frame)) = &playback.cached {
            if *cached == index {
                return Some(frame.clone());
            }
        }
        let frame: VideoFrame = Arc::new(self.shared.records[index].video?.to_frame());
        playback.cached = Some((index, frame.clone()));
        Some(frame)
    }

    fn audio_track(&self) -> Option<AudioTrack> {
        if !self.shared.records.iter().any(|r| r.audio_rms.is_some()) {
            return None;
        }
        Some(AudioTrack::new(
            "sample-playback-audio",
            Arc::new(SampleAudio {
                shared: self.shared.clone(),
                step: TAU * PLAYBACK_TONE_HZ / self.sample_rate as f64,
                phase: Mutex::new(0.0),
            }),
        ))
    }
}

struct SampleAudio {
    shared: Arc<SampleShared>,
    step: f64,
    phase: Mutex<f64>,
}

impl AudioSource for SampleAudio {
    fn pull(&self, frames: usize) -> ClipcastResult<Vec<f32>> {
        let t = self.shared.current_time();
        let level = self
            .shared
            .record_index_at(t)
            .and_then(|i| self.shared.records[i].audio_rms)
            .unwrap_or(0.0);
        // A sine with RMS `level` peaks at `level * sqrt(2)`.
        let amplitude = level * std::f32::consts::SQRT_2;

        let mut phase = self.phase.lock();
        Ok((0..frames)
            .map(|_| {
                let sample = amplitude * phase.sin() as f32;
                *phase = (*phase + self.step) % TAU;
                sample
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clipcast_media_model::samples::{encode_records, FrameSample};

    use super::*;
    use crate::duration::{resolve_duration, DURATION_PROBE_SECS};

    fn blob(count: usize) -> Blob {
        let records: Vec<SampleRecord> = (0..count)
            .map(|i| SampleRecord {
                t: i as f64 * 0.1,
                video: Some(FrameSample {
                    width: 4,
                    height: 2,
                    rgba: [i as u8, 0, 0, 255],
                }),
                audio_rms: Some(0.25),
            })
            .collect();
        Blob::new(encode_records(&records).unwrap(), SAMPLES_MIME)
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_is_infinite_until_probed() {
        let media = SampleMediaOpener::new(48000).open(&blob(20)).await.unwrap();
        assert_eq!(media.duration(), MediaDuration::Infinite);

        let secs = resolve_duration(media.as_ref(), 99.0, Duration::from_secs(1)).await;
        assert!((secs - 2.0).abs() < 1e-9);
        assert_eq!(media.current_time(), 0.0);

        media.seek(DURATION_PROBE_SECS).await.unwrap();
        assert!(media.is_ended());
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_follows_clock() {
        let media = SampleMediaOpener::new(48000)
            .with_known_duration()
            .open(&blob(20))
            .await
            .unwrap();
        media.play();
        tokio::time::sleep(Duration::from_millis(550)).await;

        assert!((media.current_time() - 0.55).abs() < 1e-6);
        assert_eq!(media.current_frame().unwrap().get_pixel(0, 0)[0], 5);

        let audio = media.audio_track().unwrap();
        let samples = audio.pull(4800).unwrap();
        let level = clipcast_media_model::samples::rms(&samples);
        assert!((level - 0.25).abs() < 0.01);

        media.pause();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!media.is_ended());
        media.play();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(media.is_ended());
        assert!((media.current_time() - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rejects_foreign_mime() {
        let foreign = Blob::new(vec![1, 2, 3], "video/webm");
        let err = SampleMediaOpener::new(48000).open(&foreign).await.err().unwrap();
        assert!(err.to_string().contains("video/webm"));
    }
}
