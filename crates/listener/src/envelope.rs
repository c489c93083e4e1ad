use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pipeline::BuildEvent;
use serde::Deserialize;
use thiserror::Error;

/// Body of a Pub/Sub push request.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Base64-encoded JSON build resource.
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// A push request that can never be turned into a build event.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("request body is not a Pub/Sub push envelope")]
    Envelope(#[source] serde_json::Error),

    #[error("push message carries no data")]
    EmptyData,

    #[error("push message data is not valid base64")]
    Base64(#[source] base64::DecodeError),

    #[error("push message data is not a build resource")]
    Build(#[source] serde_json::Error),
}

impl PushEnvelope {
    pub fn from_slice(body: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(body).map_err(EnvelopeError::Envelope)
    }

    /// Decodes the build resource carried in `message.data`.
    pub fn build_event(&self) -> Result<BuildEvent, EnvelopeError> {
        let data = self.message.data.trim();
        if data.is_empty() {
            return Err(EnvelopeError::EmptyData);
        }
        let raw = STANDARD.decode(data).map_err(EnvelopeError::Base64)?;
        serde_json::from_slice(&raw).map_err(EnvelopeError::Build)
    }
}
