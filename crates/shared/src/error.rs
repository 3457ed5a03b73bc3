use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera answered with HTTP status {status}")]
    Transport { status: u16 },
    #[error("http request failed: {0}")]
    Http(String),
    #[error("invalid camera url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to bind live view socket on {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("camera controller is no longer running")]
    ControllerClosed,
}

impl CameraError {
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http(message.into())
    }
}

