//! Audio capture: records a bounded clip from the microphone, producing a
//! byte blob + mime type that gets attached to the frame being edited.

use std::time::Duration;

use crate::timeline::AudioClip;
use crate::FlipbookResult;

#[cfg(feature = "capture")]
pub mod microphone;
pub mod stub;

#[cfg(feature = "capture")]
pub use microphone::{MicrophoneRecorder, RecorderConfig};
pub use stub::StubRecorder;

/// Hard cap on a recorded clip. Recording that reaches the cap stops
/// collecting on its own; `stop` still finalizes the clip.
pub const MAX_CLIP_DURATION: Duration = Duration::from_secs(30);

/// Records one audio clip at a time. `stop` is either user-initiated or
/// follows the [`MAX_CLIP_DURATION`] auto-cap.
pub trait ClipRecorder {
    /// Begin recording. Fails before any state change when the device is
    /// missing or permission is denied.
    fn start(&mut self) -> FlipbookResult<()>;

    /// Finalize and return the recorded clip.
    fn stop(&mut self) -> FlipbookResult<AudioClip>;

    fn is_recording(&self) -> bool;

    fn elapsed(&self) -> Duration;
}

#[cfg(feature = "capture")]
pub fn create_recorder() -> FlipbookResult<Box<dyn ClipRecorder>> {
    Ok(Box::new(MicrophoneRecorder::new(RecorderConfig::default())))
}

#[cfg(not(feature = "capture"))]
pub fn create_recorder() -> FlipbookResult<Box<dyn ClipRecorder>> {
    Err(crate::FlipbookError::Audio(
        "capture feature not enabled".to_string(),
    ))
}
