//! Audio capture for a single push-to-talk session.
//!
//! The capture stream runs at a fixed 16 kHz mono f32 configuration (what
//! the transcription service expects). The stream callback does exactly two
//! things: check the active flag, append the chunk. Concatenation and the
//! f32 -> i16 WAV encoding happen once, at stop time, on the event context
//! after the stream is confirmed paused, so no concurrent writer exists.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Host, SampleRate, StreamConfig};
use hound::WavWriter;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info};

/// Capture sample rate expected by the transcription service.
pub const SAMPLE_RATE: u32 = 16_000;
/// Mono capture.
pub const CHANNELS: u16 = 1;
/// Fixed scaling factor for f32 -> i16 conversion.
const I16_SCALE: f32 = i16::MAX as f32;

#[derive(Debug, Error)]
pub enum RecorderError {
    /// generic anyhow error
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    /// No recording device available
    #[error("no input device available")]
    NoInputDevice,
    /// Sample format not supported
    #[error("sample format not supported: {0}")]
    SampleFormatNotSupported(String),
    /// Build stream error
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),
}

type Result<T> = std::result::Result<T, RecorderError>;

/// The append-only frame buffer shared with the stream callback. Cloning is
/// cheap; the callback holds one clone, the handle the other.
#[derive(Clone)]
struct FrameBuffer {
    samples: Arc<Mutex<Vec<f32>>>,
    active: Arc<AtomicBool>,
}

impl FrameBuffer {
    fn new() -> Self {
        Self {
            samples: Arc::new(Mutex::new(Vec::with_capacity(SAMPLE_RATE as usize))),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Called from the stream callback. Appends in arrival order; no chunk
    /// is dropped while recording. The only other locker is [`take`], which
    /// runs after the stream is paused, so the lock here is uncontended for
    /// the lifetime of the callback.
    ///
    /// [`take`]: FrameBuffer::take
    fn append(&self, chunk: &[f32]) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        self.samples.lock().extend_from_slice(chunk);
    }

    /// Deactivate and drain. Must only be called once the stream is paused;
    /// the `active` flag rejects any callback invocation still in flight on
    /// backends where pause is not immediate.
    fn take(self) -> Vec<f32> {
        self.active.store(false, Ordering::Release);
        std::mem::take(&mut *self.samples.lock())
    }
}

pub struct Recorder {
    host: Host,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn start(&self) -> Result<RecordingHandle> {
        let device = self
            .host
            .default_input_device()
            .ok_or(RecorderError::NoInputDevice)?;
        let supported = device
            .default_input_config()
            .map_err(|_| RecorderError::NoInputDevice)?;

        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(RecorderError::SampleFormatNotSupported(format!(
                "{:?}",
                supported.sample_format()
            )));
        }

        info!(
            device_name = %device.name().unwrap_or_else(|_| "<unknown>".into()),
            sample_rate = SAMPLE_RATE,
            "Recording from device"
        );

        let config = StreamConfig {
            channels: CHANNELS,
            sample_rate: SampleRate(SAMPLE_RATE),
            buffer_size: BufferSize::Default,
        };

        let buffer = FrameBuffer::new();
        let callback_buffer = buffer.clone();

        let err_fn = move |err| {
            error!("an error occurred on stream: {}", err);
        };

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &_| callback_buffer.append(data),
            err_fn,
            None,
        )?;

        stream
            .play()
            .map_err(|_| anyhow!("failed to play stream"))?;

        Ok(RecordingHandle {
            stream,
            buffer: Some(buffer),
            started: Instant::now(),
        })
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

/// A finished capture, encoded and ready for transport.
#[derive(Debug)]
pub struct Recording {
    wav: Vec<u8>,
    samples: usize,
    duration: Duration,
}

impl Recording {
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn into_wav(self) -> Vec<u8> {
        self.wav
    }
}

/// Handle to the active capture stream. Presence of the buffer indicates
/// the recording has not been finalized yet.
pub struct RecordingHandle {
    stream: cpal::Stream,
    buffer: Option<FrameBuffer>,
    started: Instant,
}

impl RecordingHandle {
    /// Stop the stream and encode what was captured. Returns `Ok(None)` when
    /// zero frames arrived (hotkey tapped faster than stream startup); the
    /// caller skips the pipeline in that case.
    pub fn finish(&mut self) -> Result<Option<Recording>> {
        let Some(buffer) = self.buffer.take() else {
            return Ok(None);
        };
        info!("Ending recording.");
        // Pause before draining so the callback cannot append concurrently.
        self.stream.pause().ok();
        let samples = buffer.take();
        if samples.is_empty() {
            return Ok(None);
        }

        let wav = encode_wav(&samples)?;
        Ok(Some(Recording {
            wav,
            samples: samples.len(),
            duration: self.started.elapsed(),
        }))
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.stream.pause().ok();
            drop(buffer.take());
        }
    }
}

/// Encode f32 samples as a mono 16 kHz signed 16-bit PCM WAV payload. Every
/// sample is clamped to [-1, 1] and scaled by the same fixed factor.
pub fn encode_wav(samples: &[f32]) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = WavWriter::new(&mut cursor, spec)
        .map_err(|e| RecorderError::Anyhow(anyhow!("Failed to create wav writer: {}", e)))?;
    for &sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * I16_SCALE) as i16;
        writer
            .write_sample(quantized)
            .map_err(|e| RecorderError::Anyhow(anyhow!("Failed to write sample: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| RecorderError::Anyhow(anyhow!("Failed to finalize writer: {}", e)))?;

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_wav(data: &[u8]) -> (hound::WavSpec, Vec<i16>) {
        let reader = hound::WavReader::new(Cursor::new(data)).unwrap();
        let spec = reader.spec();
        let samples = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        (spec, samples)
    }

    #[test]
    fn test_encode_wav_spec() {
        let wav = encode_wav(&[0.0, 0.5, -0.5]).unwrap();
        let (spec, samples) = decode_wav(&wav);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);
        assert_eq!(samples.len(), 3);
    }

    #[test]
    fn test_round_trip_preserves_count_order_and_precision() {
        let original: Vec<f32> = (0..1000).map(|i| ((i as f32) / 500.0) - 1.0).collect();
        let wav = encode_wav(&original).unwrap();
        let (_, decoded) = decode_wav(&wav);

        assert_eq!(decoded.len(), original.len());
        let quantum = 1.0 / I16_SCALE;
        for (orig, &raw) in original.iter().zip(decoded.iter()) {
            let back = raw as f32 / I16_SCALE;
            assert!(
                (orig - back).abs() <= quantum,
                "sample {} decoded as {}",
                orig,
                back
            );
        }
        // Ordering: the ramp stays monotonic.
        assert!(decoded.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_encode_clamps_out_of_range_samples() {
        let wav = encode_wav(&[2.0, -3.0, 1.0, -1.0]).unwrap();
        let (_, decoded) = decode_wav(&wav);
        assert_eq!(decoded, vec![i16::MAX, -i16::MAX, i16::MAX, -i16::MAX]);
    }

    #[test]
    fn test_frame_buffer_preserves_arrival_order() {
        let buffer = FrameBuffer::new();
        buffer.append(&[1.0, 2.0]);
        buffer.append(&[3.0]);
        buffer.append(&[4.0, 5.0]);
        assert_eq!(buffer.take(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_frame_buffer_keeps_every_chunk_until_take() {
        let buffer = FrameBuffer::new();
        let callback_side = buffer.clone();
        let writer = std::thread::spawn(move || {
            for i in 0..200 {
                callback_side.append(&[i as f32; 16]);
            }
        });
        writer.join().unwrap();
        assert_eq!(buffer.take().len(), 200 * 16);
    }

    #[test]
    fn test_frame_buffer_ignores_appends_after_take() {
        let buffer = FrameBuffer::new();
        let callback_side = buffer.clone();
        buffer.append(&[1.0]);
        assert_eq!(callback_side.take(), vec![1.0]);
        // Flag is shared; late callbacks append nothing.
        buffer.append(&[9.0]);
        assert!(buffer.take().is_empty());
    }
}
