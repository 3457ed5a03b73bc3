use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shared::error::CameraError;
use tracing::debug;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "OlympusCameraKit";

/// One GET against the camera. The reply body is returned as raw bytes.
#[async_trait]
pub trait CameraTransport: Send + Sync {
    async fn get(&self, url: Url) -> Result<Vec<u8>, CameraError>;
}

/// Transport for when no camera network is configured.
pub struct MissingCameraTransport;

#[async_trait]
impl CameraTransport for MissingCameraTransport {
    async fn get(&self, url: Url) -> Result<Vec<u8>, CameraError> {
        Err(CameraError::http(format!("no camera transport available for {url}")))
    }
}

pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self, CameraError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(3))
            .build()
            .map_err(|err| CameraError::http(err.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl CameraTransport for HttpTransport {
    async fn get(&self, url: Url) -> Result<Vec<u8>, CameraError> {
        debug!(%url, "camera request");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| CameraError::http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CameraError::Transport {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| CameraError::http(err.to_string()))?;
        Ok(body.to_vec())
    }
}
