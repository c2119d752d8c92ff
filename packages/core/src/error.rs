use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlipbookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("frame index {index} out of range for timeline of {len} frame(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid duration: {0} ms (must be greater than zero)")]
    InvalidDuration(u64),

    #[error("the timeline is empty")]
    EmptyTimeline,

    #[error("encoder is not available")]
    EncoderUnavailable,

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("failed to load frame {index}: {reason}")]
    FrameLoad { index: usize, reason: String },

    #[error("unsupported image encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("image conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Recording already in progress")]
    RecordingInProgress,

    #[error("No recording in progress")]
    NoRecordingInProgress,
}

pub type FlipbookResult<T> = Result<T, FlipbookError>;
