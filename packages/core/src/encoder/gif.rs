//! GIF encoding backend using gifski.
//!
//! Palette-optimized output; frames are fed to gifski's collector from a
//! scoped thread while the writer drains, per its collector/writer contract.

use imgref::ImgVec;
use rgb::RGBA8;

use crate::encoder::{Encoder, RasterFrame};
use crate::{FlipbookError, FlipbookResult};

/// GIF encoder configuration.
#[derive(Debug, Clone)]
pub struct GifConfig {
    /// Quality from 1-100 (higher = better quality, larger file).
    pub quality: u8,
    /// Loop count (0 = infinite).
    pub loop_count: u16,
}

impl Default for GifConfig {
    fn default() -> Self {
        Self {
            quality: 80,
            loop_count: 0,
        }
    }
}

impl GifConfig {
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn with_loop_count(mut self, count: u16) -> Self {
        self.loop_count = count;
        self
    }
}

/// GIF encoder. Accumulates raster submissions and produces the encoded
/// file on `finish`. The output canvas policy is gifski's: frame sizes are
/// not constrained here.
pub struct GifskiEncoder {
    config: GifConfig,
    frames: Vec<RasterFrame>,
}

impl GifskiEncoder {
    pub fn new(config: GifConfig) -> Self {
        Self {
            config,
            frames: Vec::new(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl Default for GifskiEncoder {
    fn default() -> Self {
        Self::new(GifConfig::default())
    }
}

fn to_imgvec(frame: &RasterFrame) -> ImgVec<RGBA8> {
    let mut rgba: Vec<RGBA8> = Vec::with_capacity((frame.width * frame.height) as usize);
    for chunk in frame.pixels.chunks_exact(4) {
        rgba.push(RGBA8::new(chunk[0], chunk[1], chunk[2], chunk[3]));
    }
    ImgVec::new(rgba, frame.width as usize, frame.height as usize)
}

impl Encoder for GifskiEncoder {
    fn is_available(&self) -> bool {
        true
    }

    fn file_extension(&self) -> &'static str {
        "gif"
    }

    fn add_frame(&mut self, frame: RasterFrame) -> FlipbookResult<()> {
        let expected = (frame.width * frame.height * 4) as usize;
        if frame.pixels.len() != expected {
            return Err(FlipbookError::Encoding(format!(
                "frame data size mismatch: expected {} bytes, got {}",
                expected,
                frame.pixels.len()
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    fn finish(&mut self, progress: &mut dyn FnMut(f32)) -> FlipbookResult<Vec<u8>> {
        let frames = std::mem::take(&mut self.frames);
        if frames.is_empty() {
            return Err(FlipbookError::Encoding("no frames submitted".to_string()));
        }

        let settings = gifski::Settings {
            width: None,
            height: None,
            quality: self.config.quality,
            fast: false,
            repeat: if self.config.loop_count == 0 {
                gifski::Repeat::Infinite
            } else {
                gifski::Repeat::Finite(self.config.loop_count)
            },
        };

        let (collector, writer) = gifski::new(settings).map_err(|e| {
            FlipbookError::Encoding(format!("failed to create gifski encoder: {e}"))
        })?;

        let frame_count = frames.len();
        let mut out = Vec::new();

        std::thread::scope(|scope| -> FlipbookResult<()> {
            let feeder = scope.spawn(move || -> Result<(), gifski::Error> {
                let mut pts = 0.0f64;
                for (i, frame) in frames.iter().enumerate() {
                    collector.add_frame_rgba(i, to_imgvec(frame), pts)?;
                    pts += frame.delay.as_secs_f64();
                }
                Ok(())
            });

            let mut reporter = gifski::progress::NoProgress {};
            let write_result = writer.write(&mut out, &mut reporter);

            match feeder.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(FlipbookError::Encoding(format!("failed to add frame: {e}")))
                }
                Err(_) => {
                    return Err(FlipbookError::Encoding("frame feeder panicked".to_string()))
                }
            }

            write_result
                .map_err(|e| FlipbookError::Encoding(format!("failed to write GIF: {e}")))
        })?;

        progress(1.0);
        tracing::info!(frames = frame_count, size = out.len(), "GIF encoding complete");
        Ok(out)
    }
}
