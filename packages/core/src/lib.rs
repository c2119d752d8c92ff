pub mod capture;
pub mod convert;
pub mod encoder;
pub mod error;
pub mod playback;
pub mod project;
pub mod studio;
pub mod timeline;

pub use convert::{ImageConverter, RasterConverter};
pub use encoder::{Encoder, ExportArtifact, ExportPipeline, RasterFrame};
pub use error::{FlipbookError, FlipbookResult};
pub use playback::{
    PlaybackController, PlaybackSink, PlaybackState, Scheduler, TimerHandle, TimerToken,
    TokioScheduler,
};
pub use project::ProjectDocument;
pub use studio::{ImportReport, SkippedFile, Studio};
pub use timeline::{
    AudioClip, AudioOrigin, Frame, FrameStore, ImageBlob, PlaybackSettings,
    DEFAULT_GLOBAL_DURATION_MS,
};
