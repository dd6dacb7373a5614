//! Cloud pipeline client
//!
//! Three request/response stages (recognize, infer, synthesize) sharing
//! one call contract: post a JSON body, check the status, validate the
//! response before handing anything to the next stage. No stage retries and
//! the orchestrator never has two calls outstanding.

mod infer;
mod recognize;
mod synthesize;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{DeviceCredentials, Endpoints, VoiceConfig};
use crate::{Error, Result};

/// Library-level timeout applied to every stage request
const STAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// The three cloud stages the orchestrator drives, behind one seam so the
/// state machine can be exercised without a network.
#[async_trait]
pub trait PipelineStages {
    /// Transcribe base64 LINEAR16 audio.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status, malformed
    /// JSON, or an empty result set.
    async fn recognize(&self, audio_b64: &str, sample_rate_hz: u32) -> Result<String>;

    /// Send the transcript to the language model and return the reply text.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status, malformed
    /// JSON, or an empty candidate set.
    async fn infer(&self, transcript: &str) -> Result<String>;

    /// Synthesize the reply and return the base64 audio content.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status, malformed
    /// JSON, or missing audio content.
    async fn synthesize(&self, text: &str) -> Result<String>;
}

/// HTTP client for the three cloud stages
pub struct PipelineClient {
    client: reqwest::Client,
    endpoints: Endpoints,
    language: String,
    voice: String,
    recognize_key: SecretString,
    infer_key: SecretString,
    synthesize_key: SecretString,
}

impl PipelineClient {
    /// Create a client from stored credentials.
    ///
    /// # Errors
    ///
    /// Returns error if any API key is missing or the HTTP client cannot be
    /// built.
    pub fn new(
        credentials: &DeviceCredentials,
        voice: &VoiceConfig,
        endpoints: Endpoints,
    ) -> Result<Self> {
        if !credentials.is_provisioned() {
            return Err(Error::Config(
                "recognize, infer and synthesize API keys are all required".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::builder().timeout(STAGE_TIMEOUT).build()?,
            endpoints,
            language: voice.language.clone(),
            voice: voice.voice.clone(),
            recognize_key: SecretString::from(credentials.recognize_key.expose_secret().to_owned()),
            infer_key: SecretString::from(credentials.infer_key.expose_secret().to_owned()),
            synthesize_key: SecretString::from(credentials.synthesize_key.expose_secret().to_owned()),
        })
    }

    fn keyed_url(&self, base: &str, key: &SecretString) -> String {
        format!("{base}?key={}", urlencoding::encode(key.expose_secret()))
    }

    /// Shared stage contract: post JSON, check status, return the raw body
    async fn post_json<T: serde::Serialize + Sync>(&self, url: &str, body: &T) -> Result<String> {
        let response = self.client.post(url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "cloud stage error");
            return Err(Error::HttpStatus(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PipelineStages for PipelineClient {
    async fn recognize(&self, audio_b64: &str, sample_rate_hz: u32) -> Result<String> {
        self.recognize_stage(audio_b64, sample_rate_hz).await
    }

    async fn infer(&self, transcript: &str) -> Result<String> {
        self.infer_stage(transcript).await
    }

    async fn synthesize(&self, text: &str) -> Result<String> {
        self.synthesize_stage(text).await
    }
}
