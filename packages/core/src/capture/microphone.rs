//! Microphone recording via cpal, finalized to a WAV blob via hound.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::capture::{ClipRecorder, MAX_CLIP_DURATION};
use crate::timeline::{AudioClip, AudioOrigin};
use crate::{FlipbookError, FlipbookResult};

/// Stream configuration for the microphone.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Sample rate (e.g., 48000)
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Buffer size in samples
    pub buffer_size: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            buffer_size: 1024,
        }
    }
}

/// Captures f32 samples from the default input device. The stream callback
/// enforces the 30-second cap: once reached, no further samples are
/// collected and the recording flag drops, but `stop` still finalizes.
pub struct MicrophoneRecorder {
    config: RecorderConfig,
    collecting: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<f32>>>,
    stream: Option<cpal::Stream>,
    started_at: Option<Instant>,
}

impl MicrophoneRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            collecting: Arc::new(AtomicBool::new(false)),
            samples: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            started_at: None,
        }
    }
}

impl ClipRecorder for MicrophoneRecorder {
    fn start(&mut self) -> FlipbookResult<()> {
        if self.stream.is_some() {
            return Err(FlipbookError::RecordingInProgress);
        }

        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            FlipbookError::PermissionDenied("no default audio input device".to_string())
        })?;

        let stream_config = cpal::StreamConfig {
            channels: self.config.channels,
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.config.buffer_size),
        };

        let collecting = self.collecting.clone();
        let samples = self.samples.clone();
        let max_samples = (self.config.sample_rate as u64
            * self.config.channels as u64
            * MAX_CLIP_DURATION.as_secs()) as usize;

        let err_fn = |err| {
            tracing::error!("audio stream error: {}", err);
        };

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !collecting.load(Ordering::SeqCst) {
                        return;
                    }
                    let mut samples = samples.lock().expect("sample buffer poisoned");
                    let room = max_samples.saturating_sub(samples.len());
                    if room == 0 {
                        collecting.store(false, Ordering::SeqCst);
                        tracing::info!("recording cap reached, no longer collecting");
                        return;
                    }
                    samples.extend_from_slice(&data[..data.len().min(room)]);
                },
                err_fn,
                None,
            )
            .map_err(|e| FlipbookError::Audio(format!("failed to build stream: {e}")))?;

        stream
            .play()
            .map_err(|e| FlipbookError::Audio(format!("failed to start stream: {e}")))?;

        self.samples.lock().expect("sample buffer poisoned").clear();
        self.collecting.store(true, Ordering::SeqCst);
        self.stream = Some(stream);
        self.started_at = Some(Instant::now());

        tracing::info!(
            "microphone recording started: {}Hz, {} channels",
            self.config.sample_rate,
            self.config.channels
        );
        Ok(())
    }

    fn stop(&mut self) -> FlipbookResult<AudioClip> {
        if self.stream.is_none() {
            return Err(FlipbookError::NoRecordingInProgress);
        }

        self.collecting.store(false, Ordering::SeqCst);
        // Dropping the stream stops it.
        self.stream = None;
        self.started_at = None;

        let samples = std::mem::take(&mut *self.samples.lock().expect("sample buffer poisoned"));

        let spec = hound::WavSpec {
            channels: self.config.channels,
            sample_rate: self.config.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| FlipbookError::Audio(format!("failed to write WAV: {e}")))?;
            for sample in samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| FlipbookError::Audio(format!("failed to write WAV: {e}")))?;
            }
            writer
                .finalize()
                .map_err(|e| FlipbookError::Audio(format!("failed to finalize WAV: {e}")))?;
        }

        tracing::info!("microphone recording stopped");
        Ok(AudioClip::new(
            AudioOrigin::Recorded,
            cursor.into_inner(),
            "audio/wav",
        ))
    }

    fn is_recording(&self) -> bool {
        self.stream.is_some()
    }

    fn elapsed(&self) -> Duration {
        self.started_at
            .map(|t| t.elapsed().min(MAX_CLIP_DURATION))
            .unwrap_or_default()
    }
}

impl Drop for MicrophoneRecorder {
    fn drop(&mut self) {
        self.collecting.store(false, Ordering::SeqCst);
        self.stream = None;
    }
}
