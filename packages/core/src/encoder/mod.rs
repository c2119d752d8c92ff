//! Export: drives an injected encoder over a timeline snapshot and yields a
//! downloadable artifact.
//!
//! The pipeline owns orchestration only. Encoders are capability objects
//! with an explicit availability check, so tests substitute fakes and the
//! concrete GIF backend stays swappable.

#[cfg(feature = "gif")]
pub mod gif;

use std::time::Duration;

use crate::timeline::Frame;
use crate::{FlipbookError, FlipbookResult};

/// One decoded raster submitted to an encoder, at the source image's native
/// dimensions. Frames in one export may have heterogeneous sizes; the
/// output canvas policy belongs to the encoder.
#[derive(Debug, Clone)]
pub struct RasterFrame {
    /// RGBA, 4 bytes per pixel, row-major.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// How long this frame is displayed.
    pub delay: Duration,
}

/// An encoder accepts an ordered stream of raster submissions and finishes
/// with exactly one terminal result: the encoded bytes or an error.
pub trait Encoder {
    /// Typed availability check, probed before any frame is submitted.
    fn is_available(&self) -> bool;

    /// Extension for the suggested artifact filename, without the dot.
    fn file_extension(&self) -> &'static str;

    fn add_frame(&mut self, frame: RasterFrame) -> FlipbookResult<()>;

    /// Consume the submitted frames and produce the encoded file. May
    /// report progress in `[0, 1]`.
    fn finish(&mut self, progress: &mut dyn FnMut(f32)) -> FlipbookResult<Vec<u8>>;
}

/// The encoded file plus a suggested download name.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Clamps a progress stream so consumers always observe a monotonically
/// non-decreasing fraction in `[0, 1]`, whatever the encoder reports.
struct MonotoneProgress<'a> {
    last: f32,
    inner: &'a mut dyn FnMut(f32),
}

impl<'a> MonotoneProgress<'a> {
    fn new(inner: &'a mut dyn FnMut(f32)) -> Self {
        Self { last: 0.0, inner }
    }

    fn report(&mut self, fraction: f32) {
        let fraction = fraction.clamp(self.last, 1.0);
        self.last = fraction;
        (self.inner)(fraction);
    }
}

/// Drives an [`Encoder`] over a snapshot of the timeline.
pub struct ExportPipeline;

impl ExportPipeline {
    /// Encode `frames` (a snapshot isolated from concurrent timeline
    /// mutation) into a single artifact.
    ///
    /// Fails fast with `EmptyTimeline` before touching the encoder, with
    /// `EncoderUnavailable` when the capability is not ready, and with
    /// `FrameLoad` naming the offending frame when any raster decode fails.
    /// On any failure partial output is discarded.
    pub fn export(
        frames: &[Frame],
        encoder: &mut dyn Encoder,
        progress: &mut dyn FnMut(f32),
    ) -> FlipbookResult<ExportArtifact> {
        if frames.is_empty() {
            return Err(FlipbookError::EmptyTimeline);
        }
        if !encoder.is_available() {
            return Err(FlipbookError::EncoderUnavailable);
        }

        let mut progress = MonotoneProgress::new(progress);
        let total = frames.len();
        tracing::info!(frames = total, "export started");

        // Submission covers the first half of the progress range, encoding
        // the second.
        for (index, frame) in frames.iter().enumerate() {
            let raster = decode_raster(index, frame)?;
            encoder.add_frame(raster)?;
            progress.report(0.5 * (index + 1) as f32 / total as f32);
        }

        let bytes = encoder.finish(&mut |p| progress.report(0.5 + 0.5 * p))?;
        progress.report(1.0);

        let filename = format!(
            "animation-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            encoder.file_extension()
        );
        tracing::info!(%filename, size = bytes.len(), "export finished");
        Ok(ExportArtifact { bytes, filename })
    }
}

/// Decode one frame's blob to RGBA at its native dimensions.
fn decode_raster(index: usize, frame: &Frame) -> FlipbookResult<RasterFrame> {
    let decoded = image::load_from_memory(&frame.image.data).map_err(|e| {
        FlipbookError::FrameLoad {
            index,
            reason: e.to_string(),
        }
    })?;
    let rgba = decoded.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    Ok(RasterFrame {
        pixels: rgba.into_raw(),
        width,
        height,
        delay: Duration::from_millis(frame.duration_ms),
    })
}
