use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Prover client drives the external proving service for one balance-proof input.
///
/// The service is opaque: it accepts a [`ProofInput`] and answers with the final layer proof
/// plus the balance wrapper proof and its verifier data. Proof contents are never inspected,
/// they are carried as raw JSON so that big integers inside them are not re-encoded.
#[automock]
#[async_trait]
pub trait ProverClient: Send + Sync {
    async fn generate_proof(&self, input: &ProofInput) -> Result<ProverOutput, ProverClientError>;
}

/// Compression client wraps a balance wrapper proof into the succinct proof that the
/// destination verifier accepts.
#[automock]
#[async_trait]
pub trait CompressionClient: Send + Sync {
    async fn compress_proof(
        &self,
        verifier_only_circuit_data: &RawValue,
        proof_with_public_inputs: &RawValue,
    ) -> Result<Vec<u8>, ProverClientError>;
}

/// Input of one proving cycle, produced by the upstream input generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofInput {
    pub protocol_id: String,
    pub slot: u64,
    pub balance_sum_limbs: Vec<u64>,
    pub number_of_non_activated_validators: u64,
    pub number_of_active_validators: u64,
    pub number_of_exited_validators: u64,
    pub number_of_slashed_validators: u64,
}

/// Raw answer of the proving service. Every field may be absent or null on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProverOutput {
    pub final_layer_proof: Option<Box<RawValue>>,
    pub balance_wrapper_proof_with_public_inputs: Option<Box<RawValue>>,
    pub balance_wrapper_verifier_only: Option<Box<RawValue>>,
}

/// A prover answer with every artifact present.
#[derive(Debug, Clone)]
pub struct ProvenArtifacts {
    pub final_layer_proof: Box<RawValue>,
    pub balance_wrapper_proof_with_public_inputs: Box<RawValue>,
    pub balance_wrapper_verifier_only: Box<RawValue>,
}

impl ProverOutput {
    /// Checks that every artifact is present and not `null`.
    pub fn validate(self) -> Result<ProvenArtifacts, ProverClientError> {
        Ok(ProvenArtifacts {
            final_layer_proof: required("final_layer_proof", self.final_layer_proof)?,
            balance_wrapper_proof_with_public_inputs: required(
                "balance_wrapper_proof_with_public_inputs",
                self.balance_wrapper_proof_with_public_inputs,
            )?,
            balance_wrapper_verifier_only: required(
                "balance_wrapper_verifier_only",
                self.balance_wrapper_verifier_only,
            )?,
        })
    }
}

fn required(field: &str, value: Option<Box<RawValue>>) -> Result<Box<RawValue>, ProverClientError> {
    match value {
        Some(raw) if raw.get().trim() != "null" => Ok(raw),
        _ => Err(ProverClientError::MalformedOutput(field.to_string())),
    }
}

/// Failure of a proving or compression service call.
#[derive(Debug, thiserror::Error)]
pub enum ProverClientError {
    #[error("Internal service error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("Prover output is missing field `{0}`")]
    MalformedOutput(String),
    #[error("Service request timed out after {0:?}")]
    Timeout(Duration),
}
