pub mod error;

use std::time::Duration;

use async_trait::async_trait;
use relayer_prover_client_interface::{CompressionClient, ProofInput, ProverClient, ProverClientError, ProverOutput};
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::value::RawValue;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ProverServiceError;

pub const GEN_PROOF_PATH: &str = "genProof";

#[derive(Debug, Clone)]
pub struct HttpServiceValidatedArgs {
    pub service_url: Url,
    pub request_timeout: Duration,
}

/// Thin reqwest wrapper shared by the proving and compression services. Both expose a single
/// `POST /genProof` endpoint.
struct GenProofEndpoint {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl GenProofEndpoint {
    fn new(args: &HttpServiceValidatedArgs) -> Result<Self, ProverServiceError> {
        let client = Client::builder().timeout(args.request_timeout).build().map_err(ProverServiceError::ClientBuild)?;
        let mut url = args.service_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProverServiceError::UrlError {
                operation: "gen_proof".to_string(),
                message: format!("{} cannot be a base URL", args.service_url),
            })?
            .pop_if_empty()
            .push(GEN_PROOF_PATH);
        Ok(Self { client, url, timeout: args.request_timeout })
    }

    async fn post<B: Serialize + ?Sized>(&self, operation: &str, body: &B) -> Result<Response, ProverServiceError> {
        self.send(operation, body).await.inspect_err(|err| {
            warn!(operation, retryable = err.is_retryable(), error = %err, "Request to {} failed", self.url);
        })
    }

    async fn send<B: Serialize + ?Sized>(&self, operation: &str, body: &B) -> Result<Response, ProverServiceError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(body)
            .send()
            .await
            .map_err(|e| ProverServiceError::from_reqwest_error(operation, self.timeout, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ProverServiceError::ApiError { operation: operation.to_string(), status, message })
    }
}

/// Client of the remote proving service.
pub struct HttpProverService {
    endpoint: GenProofEndpoint,
}

impl HttpProverService {
    pub fn new_with_args(args: &HttpServiceValidatedArgs) -> Result<Self, ProverServiceError> {
        Ok(Self { endpoint: GenProofEndpoint::new(args)? })
    }
}

#[async_trait]
impl ProverClient for HttpProverService {
    #[tracing::instrument(skip(self, input), fields(protocol = %input.protocol_id, slot = input.slot))]
    async fn generate_proof(&self, input: &ProofInput) -> Result<ProverOutput, ProverClientError> {
        info!(log_type = "starting", category = "prover", function_type = "generate_proof", "Requesting proof.");
        let response = self.endpoint.post("generate_proof", input).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ProverServiceError::from_reqwest_error("generate_proof", self.endpoint.timeout, e))?;
        let output: ProverOutput = serde_json::from_slice(&body)
            .map_err(|e| ProverServiceError::parse_error("generate_proof", e.to_string()))?;
        info!(log_type = "completed", category = "prover", function_type = "generate_proof", "Proof received.");
        Ok(output)
    }
}

#[derive(Serialize)]
struct CompressionRequest<'a> {
    verifier_only_circuit_data: &'a RawValue,
    proof_with_public_inputs: &'a RawValue,
}

/// Client of the proof compression (wrapping) service.
pub struct HttpCompressionService {
    endpoint: GenProofEndpoint,
}

impl HttpCompressionService {
    pub fn new_with_args(args: &HttpServiceValidatedArgs) -> Result<Self, ProverServiceError> {
        Ok(Self { endpoint: GenProofEndpoint::new(args)? })
    }
}

#[async_trait]
impl CompressionClient for HttpCompressionService {
    /// Sends the wrapper proof and reads the whole response body as the final proof.
    async fn compress_proof(
        &self,
        verifier_only_circuit_data: &RawValue,
        proof_with_public_inputs: &RawValue,
    ) -> Result<Vec<u8>, ProverClientError> {
        let request = CompressionRequest { verifier_only_circuit_data, proof_with_public_inputs };
        let response = self.endpoint.post("compress_proof", &request).await?;
        let proof = response
            .bytes()
            .await
            .map_err(|e| ProverServiceError::from_reqwest_error("compress_proof", self.endpoint.timeout, e))?;
        debug!(proof_len = proof.len(), "Compressed proof received");
        Ok(proof.to_vec())
    }
}
