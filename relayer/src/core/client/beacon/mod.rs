use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

const FINALIZED_HEADER_PATH: &str = "eth/v1/beacon/headers/finalized";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum BeaconError {
    #[error("No beacon REST endpoint configured")]
    NoEndpoints,

    #[error("Beacon endpoint {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Beacon endpoint {url} returned slot `{slot}` which is not a number")]
    InvalidSlot { url: String, slot: String },

    #[error("All beacon endpoints failed, last error: {0}")]
    AllEndpointsFailed(Box<BeaconError>),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Read access to the beacon chain REST API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BeaconClient: Send + Sync {
    /// Slot of the latest finalized header. Endpoints are tried in order until one answers.
    async fn finalized_slot(&self, endpoints: &[Url]) -> Result<u64, BeaconError>;
}

#[derive(Deserialize)]
struct HeaderResponse {
    data: HeaderData,
}

#[derive(Deserialize)]
struct HeaderData {
    header: SignedHeader,
}

#[derive(Deserialize)]
struct SignedHeader {
    message: HeaderMessage,
}

#[derive(Deserialize)]
struct HeaderMessage {
    slot: String,
}

pub struct BeaconRestClient {
    client: reqwest::Client,
}

impl BeaconRestClient {
    pub fn new() -> Result<Self, BeaconError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, BeaconError> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(BeaconError::ClientBuild)?;
        Ok(Self { client })
    }

    fn finalized_header_url(endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(FINALIZED_HEADER_PATH.split('/'));
        }
        url
    }

    async fn query(&self, endpoint: &Url) -> Result<u64, BeaconError> {
        let url = Self::finalized_header_url(endpoint);
        let request_error = |e: reqwest::Error| BeaconError::Request { url: url.to_string(), message: e.to_string() };
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_error)?;
        let header: HeaderResponse = response.json().await.map_err(request_error)?;
        let slot = header.data.header.message.slot;
        slot.parse().map_err(|_| BeaconError::InvalidSlot { url: url.to_string(), slot })
    }
}

#[async_trait]
impl BeaconClient for BeaconRestClient {
    async fn finalized_slot(&self, endpoints: &[Url]) -> Result<u64, BeaconError> {
        let mut last_error = None;
        for endpoint in endpoints {
            match self.query(endpoint).await {
                Ok(slot) => return Ok(slot),
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Beacon endpoint failed, trying the next one");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Err(BeaconError::AllEndpointsFailed(Box::new(e))),
            None => Err(BeaconError::NoEndpoints),
        }
    }
}
