//! Top-level application state: one struct owning the frame store, the
//! playback controller, and the injected conversion capability. Components
//! receive it explicitly; there are no ambient singletons.

use crate::capture::ClipRecorder;
use crate::convert::{ImageConverter, RasterConverter};
use crate::encoder::{Encoder, ExportArtifact, ExportPipeline};
use crate::playback::{PlaybackController, PlaybackSink, Scheduler, TimerToken};
use crate::project::ProjectDocument;
use crate::timeline::{AudioClip, AudioOrigin, FrameStore};
use crate::{FlipbookError, FlipbookResult};

/// Outcome of a batch image import. Files that cannot be converted are
/// skipped, not fatal, and reported per file.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub added: usize,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// The assembled application: timeline, playback, and adapters.
pub struct Studio {
    store: FrameStore,
    playback: PlaybackController,
    converter: Box<dyn ImageConverter>,
}

impl Studio {
    pub fn new(converter: Box<dyn ImageConverter>) -> Self {
        Self {
            store: FrameStore::new(),
            playback: PlaybackController::new(),
            converter,
        }
    }

    /// Studio with the built-in raster converter.
    pub fn with_default_converter() -> Self {
        Self::new(Box::new(RasterConverter::new()))
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut FrameStore {
        &mut self.store
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    /// Convert and append a batch of uploaded files. Unconvertible files
    /// are skipped and reported; the rest import in order.
    pub fn import_images<I>(&mut self, files: I) -> ImportReport
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let mut report = ImportReport::default();
        for (name, bytes) in files {
            match self.converter.convert(&bytes, &name) {
                Ok(blob) => {
                    self.store.add_frame(blob);
                    report.added += 1;
                }
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "skipping file");
                    report.skipped.push(SkippedFile {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        tracing::info!(added = report.added, skipped = report.skipped.len(), "import finished");
        report
    }

    pub fn play(
        &mut self,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn PlaybackSink,
    ) -> FlipbookResult<()> {
        self.playback.play(&self.store, scheduler, sink)
    }

    pub fn stop(&mut self, scheduler: &mut dyn Scheduler, sink: &mut dyn PlaybackSink) {
        self.playback.stop(scheduler, sink);
    }

    pub fn on_timer(
        &mut self,
        token: TimerToken,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn PlaybackSink,
    ) {
        self.playback.on_timer(token, &self.store, scheduler, sink);
    }

    /// Attach an uploaded audio file to the frame at `index`.
    pub fn attach_uploaded_audio(
        &mut self,
        index: usize,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> FlipbookResult<()> {
        if !mime_type.starts_with("audio/") {
            return Err(FlipbookError::Audio(format!(
                "not an audio file: {mime_type}"
            )));
        }
        self.store
            .attach_audio(index, AudioClip::new(AudioOrigin::Uploaded, bytes, mime_type))
    }

    /// Finalize an in-progress recording and attach the clip to the frame
    /// at `index`. The frame must still exist; a failed attach surfaces
    /// the error and discards nothing else.
    pub fn finish_recording(
        &mut self,
        index: usize,
        recorder: &mut dyn ClipRecorder,
    ) -> FlipbookResult<()> {
        let clip = recorder.stop()?;
        self.store.attach_audio(index, clip)
    }

    pub fn save_project(&self, name: impl Into<String>) -> ProjectDocument {
        ProjectDocument::snapshot(name, &self.store)
    }

    /// Replace all state from a loaded document. Playback is stopped first
    /// so no timer from the old timeline survives the swap.
    pub fn load_project(
        &mut self,
        doc: ProjectDocument,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn PlaybackSink,
    ) {
        self.playback.stop(scheduler, sink);
        self.store = doc.into_store();
    }

    /// Export the current timeline through `encoder`. Reads a snapshot:
    /// mutations made while the encoder runs cannot affect the output.
    pub fn export(
        &self,
        encoder: &mut dyn Encoder,
        progress: &mut dyn FnMut(f32),
    ) -> FlipbookResult<ExportArtifact> {
        let snapshot = self.store.snapshot();
        ExportPipeline::export(&snapshot, encoder, progress)
    }
}
