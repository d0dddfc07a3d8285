use thiserror::Error;

/// Reasons a capture session never reaches the running state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no video capture device available")]
    DeviceUnavailable,

    #[error("capture session rejected input {0}")]
    InputRejected(String),

    #[error("capture session has no input")]
    NoInput,

    #[error("camera backend failure: {0}")]
    Backend(String),
}
