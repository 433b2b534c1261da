use std::time::Duration;

use base64::{Engine, engine::general_purpose};
use reqwest::Client;

use super::EngineGateway;
use super::error::EngineError;
use super::types::{ProgressReport, Txt2ImgRequest, Txt2ImgResponse};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(1);
const PROGRESS_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP client for a Stable Diffusion WebUI compatible engine.
pub struct EngineClient {
    client: Client,
    base_url: String,
}

impl EngineClient {
    /// Create a client for the engine at `base_url`. A trailing slash is ignored.
    pub fn with_base_url(base_url: String) -> Result<Self, EngineError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EngineError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

impl EngineGateway for EngineClient {
    async fn health_check(&self) -> Result<(), EngineError> {
        let response = self
            .client
            .get(self.url("/sdapi/v1/options"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn submit(&self, req: &Txt2ImgRequest) -> Result<Vec<u8>, EngineError> {
        let response = self
            .client
            .post(self.url("/sdapi/v1/txt2img"))
            .json(req)
            .send()
            .await?;
        let body = Self::ensure_success(response)
            .await?
            .json::<Txt2ImgResponse>()
            .await?;

        let encoded = body
            .images
            .first()
            .ok_or_else(|| EngineError::Decode("response contained no images".into()))?;
        // Some builds prefix a data URL header.
        let payload = encoded
            .split_once(',')
            .map_or(encoded.as_str(), |(_, data)| data);
        general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| EngineError::Decode(e.to_string()))
    }

    async fn poll_progress(&self) -> Result<ProgressReport, EngineError> {
        let response = self
            .client
            .get(self.url("/sdapi/v1/progress"))
            .timeout(PROGRESS_TIMEOUT)
            .send()
            .await?;
        let report = Self::ensure_success(response)
            .await?
            .json::<ProgressReport>()
            .await?;
        Ok(report)
    }
}
