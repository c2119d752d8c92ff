//! Stub clip recorder for tests and headless use: no device access,
//! produces a short silent WAV.

use std::time::{Duration, Instant};

use crate::capture::{ClipRecorder, MAX_CLIP_DURATION};
use crate::timeline::{AudioClip, AudioOrigin};
use crate::{FlipbookError, FlipbookResult};

/// Minimal PCM16 mono WAV file containing `samples` zero samples.
fn silent_wav(sample_rate: u32, samples: u32) -> Vec<u8> {
    let data_len = samples * 2;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes()); // byte rate
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, 0);
    out
}

/// Always-available recorder yielding bounded silence.
pub struct StubRecorder {
    started_at: Option<Instant>,
    sample_rate: u32,
}

impl StubRecorder {
    pub fn new() -> Self {
        Self {
            started_at: None,
            sample_rate: 8000,
        }
    }
}

impl Default for StubRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipRecorder for StubRecorder {
    fn start(&mut self) -> FlipbookResult<()> {
        if self.started_at.is_some() {
            return Err(FlipbookError::RecordingInProgress);
        }
        tracing::info!("starting STUB clip recorder (test mode)");
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) -> FlipbookResult<AudioClip> {
        let started = self
            .started_at
            .take()
            .ok_or(FlipbookError::NoRecordingInProgress)?;
        let clip_len = started.elapsed().min(MAX_CLIP_DURATION);
        let samples = (clip_len.as_secs_f64() * self.sample_rate as f64).ceil() as u32;
        Ok(AudioClip::new(
            AudioOrigin::Recorded,
            silent_wav(self.sample_rate, samples.max(1)),
            "audio/wav",
        ))
    }

    fn is_recording(&self) -> bool {
        self.started_at.is_some()
    }

    fn elapsed(&self) -> Duration {
        self.started_at
            .map(|t| t.elapsed().min(MAX_CLIP_DURATION))
            .unwrap_or_default()
    }
}
