//! Line-delimited sample records.
//!
//! The in-memory encoder writes one JSON object per sampled tick; the
//! matching media opener replays them. Each record keeps the frame size and
//! its center color plus the RMS level of the audio pulled on that tick,
//! which is enough to reconstruct a recognisable clip without a real codec.

use clipcast_common::error::{ClipcastError, ClipcastResult};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// MIME type of a blob made of sample records.
pub const SAMPLES_MIME: &str = "application/x-clipcast-samples";

/// A reduced video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSample {
    pub width: u32,
    pub height: u32,
    pub rgba: [u8; 4],
}

impl FrameSample {
    /// Reduce a frame to its size and center pixel.
    pub fn from_frame(frame: &RgbaImage) -> Self {
        let (width, height) = frame.dimensions();
        let rgba = if width == 0 || height == 0 {
            [0, 0, 0, 0]
        } else {
            frame.get_pixel(width / 2, height / 2).0
        };
        Self {
            width,
            height,
            rgba,
        }
    }

    /// Expand back into a solid frame.
    pub fn to_frame(&self) -> RgbaImage {
        RgbaImage::from_pixel(self.width, self.height, Rgba(self.rgba))
    }
}

/// One sampled tick, timestamped in media seconds from encoder start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub t: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<FrameSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_rms: Option<f32>,
}

/// Serialize records as JSON lines.
pub fn encode_records(records: &[SampleRecord]) -> ClipcastResult<Vec<u8>> {
    let mut out = Vec::new();
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Parse JSON lines back into records, sorted by time.
///
/// Blank lines are skipped; a malformed line is an error naming its line
/// number.
pub fn decode_records(bytes: &[u8]) -> ClipcastResult<Vec<SampleRecord>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ClipcastError::export(format!("sample blob is not UTF-8: {e}")))?;

    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: SampleRecord = serde_json::from_str(line).map_err(|e| {
            ClipcastError::export(format!("malformed sample record on line {}: {e}", index + 1))
        })?;
        records.push(record);
    }
    records.sort_by(|a, b| a.t.total_cmp(&b.t));
    Ok(records)
}

/// Root-mean-square level of a block of samples.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_sample_takes_center_pixel() {
        let mut frame = RgbaImage::from_pixel(10, 6, Rgba([0, 0, 0, 255]));
        frame.put_pixel(5, 3, Rgba([1, 2, 3, 255]));
        let sample = FrameSample::from_frame(&frame);
        assert_eq!(sample.rgba, [1, 2, 3, 255]);
        assert_eq!(sample.to_frame().dimensions(), (10, 6));
    }

    #[test]
    fn test_decode_concatenated_chunks() {
        let first = encode_records(&[SampleRecord {
            t: 0.0,
            video: None,
            audio_rms: Some(0.5),
        }])
        .unwrap();
        let second = encode_records(&[SampleRecord {
            t: 0.1,
            video: Some(FrameSample {
                width: 2,
                height: 2,
                rgba: [9, 9, 9, 255],
            }),
            audio_rms: None,
        }])
        .unwrap();

        let mut joined = first;
        joined.extend_from_slice(&second);
        let records = decode_records(&joined).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].video.unwrap().rgba, [9, 9, 9, 255]);
    }

    #[test]
    fn test_decode_reports_bad_line() {
        let err = decode_records(b"{\"t\":0.0}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_rms_of_constant() {
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }
}
