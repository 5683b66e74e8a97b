//! Trigger configuration parsing.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use weftgate_handler::{FeatureNegotiator, Features};

/// User-facing TOML configuration for one HTTP trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub bind_addr: SocketAddr,
    pub features: Option<FeaturesConfig>,
}

/// Capabilities requested for the middleware before serving begins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesConfig {
    pub buffer_request: Option<bool>,
    pub buffer_response: Option<bool>,
    pub trailers: Option<bool>,
}

impl TriggerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TriggerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Run the process-wide feature negotiation for the configured
    /// capabilities and return the granted set. Called once, before the
    /// trigger starts accepting requests.
    pub fn negotiated_features(&self) -> Features {
        let requested = self
            .features
            .as_ref()
            .map(FeaturesConfig::requested)
            .unwrap_or(Features::NONE);
        FeatureNegotiator::new().negotiate(requested)
    }
}

impl FeaturesConfig {
    fn requested(&self) -> Features {
        let mut features = Features::NONE;
        if self.buffer_request.unwrap_or(false) {
            features |= Features::BUFFER_REQUEST;
        }
        if self.buffer_response.unwrap_or(false) {
            features |= Features::BUFFER_RESPONSE;
        }
        if self.trailers.unwrap_or(false) {
            features |= Features::TRAILERS;
        }
        features
    }
}
