//! Proof artifacts written by the proof generation worker and read back by the publisher.
//!
//! Each protocol owns four store keys. Every blob is wrapped in a [`StoredArtifact`] envelope
//! that carries the id of the worker cycle that wrote it, which lets readers detect a set
//! that mixes two cycles.

use bytes::Bytes;
use relayer_prover_client_interface::{ProofInput, ProvenArtifacts};
use serde::{Deserialize, Serialize};
use serde_json::value::{to_raw_value, RawValue};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use thiserror::Error;
use uuid::Uuid;

use crate::core::client::storage::{StorageClient, StorageError};

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
    FinalLayerProof,
    FinalProofInput,
    BalanceWrapperProofWithPublicInputs,
    BalanceWrapperVerifierOnly,
}

impl ArtifactKind {
    pub fn key(&self, protocol: &str) -> String {
        format!("{protocol}:{self}")
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArtifact {
    pub cycle_id: Uuid,
    pub body: Box<RawValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalLayerProof {
    pub proof: Box<RawValue>,
    pub balance_sum: Vec<u64>,
    pub number_of_non_activated_validators: u64,
    pub number_of_active_validators: u64,
    pub number_of_exited_validators: u64,
}

/// Signal sent on the protocol channel once all four artifacts are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofReady {
    pub protocol_id: String,
    pub cycle_id: Uuid,
    pub slot: u64,
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact {0} is missing")]
    Missing(String),

    #[error("Artifact {key} belongs to cycle {found}, expected {expected}")]
    TornRead { key: String, expected: Uuid, found: Uuid },

    #[error("Artifact {key} is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode artifacts: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// The four artifacts of one worker cycle.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub cycle_id: Uuid,
    pub final_layer_proof: FinalLayerProof,
    pub final_proof_input: ProofInput,
    pub balance_wrapper_proof_with_public_inputs: Box<RawValue>,
    pub balance_wrapper_verifier_only: Box<RawValue>,
}

impl ArtifactSet {
    pub fn from_proof(input: &ProofInput, proven: ProvenArtifacts, cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            final_layer_proof: FinalLayerProof {
                proof: proven.final_layer_proof,
                balance_sum: input.balance_sum_limbs.clone(),
                number_of_non_activated_validators: input.number_of_non_activated_validators,
                number_of_active_validators: input.number_of_active_validators,
                number_of_exited_validators: input.number_of_exited_validators,
            },
            final_proof_input: input.clone(),
            balance_wrapper_proof_with_public_inputs: proven.balance_wrapper_proof_with_public_inputs,
            balance_wrapper_verifier_only: proven.balance_wrapper_verifier_only,
        }
    }

    fn body(&self, kind: ArtifactKind) -> Result<Box<RawValue>, serde_json::Error> {
        match kind {
            ArtifactKind::FinalLayerProof => to_raw_value(&self.final_layer_proof),
            ArtifactKind::FinalProofInput => to_raw_value(&self.final_proof_input),
            ArtifactKind::BalanceWrapperProofWithPublicInputs => Ok(self.balance_wrapper_proof_with_public_inputs.clone()),
            ArtifactKind::BalanceWrapperVerifierOnly => Ok(self.balance_wrapper_verifier_only.clone()),
        }
    }

    /// Serializes every artifact, in write order, as `(key, envelope)` pairs.
    pub fn encode(&self, protocol: &str) -> Result<Vec<(String, Bytes)>, ArtifactError> {
        ArtifactKind::iter()
            .map(|kind| -> Result<(String, Bytes), ArtifactError> {
                let envelope = StoredArtifact { cycle_id: self.cycle_id, body: self.body(kind)? };
                Ok((kind.key(protocol), Bytes::from(serde_json::to_vec(&envelope)?)))
            })
            .collect()
    }

    /// Reads the four artifacts of `protocol` and checks that they come from a single cycle.
    pub async fn load(storage: &dyn StorageClient, protocol: &str) -> Result<Self, ArtifactError> {
        let final_layer = read_envelope(storage, protocol, ArtifactKind::FinalLayerProof).await?;
        let input = read_envelope(storage, protocol, ArtifactKind::FinalProofInput).await?;
        let wrapper_proof = read_envelope(storage, protocol, ArtifactKind::BalanceWrapperProofWithPublicInputs).await?;
        let verifier_only = read_envelope(storage, protocol, ArtifactKind::BalanceWrapperVerifierOnly).await?;

        let cycle_id = final_layer.cycle_id;
        for (kind, envelope) in [
            (ArtifactKind::FinalProofInput, &input),
            (ArtifactKind::BalanceWrapperProofWithPublicInputs, &wrapper_proof),
            (ArtifactKind::BalanceWrapperVerifierOnly, &verifier_only),
        ] {
            if envelope.cycle_id != cycle_id {
                return Err(ArtifactError::TornRead {
                    key: kind.key(protocol),
                    expected: cycle_id,
                    found: envelope.cycle_id,
                });
            }
        }

        Ok(Self {
            cycle_id,
            final_layer_proof: parse_body(protocol, ArtifactKind::FinalLayerProof, &final_layer.body)?,
            final_proof_input: parse_body(protocol, ArtifactKind::FinalProofInput, &input.body)?,
            balance_wrapper_proof_with_public_inputs: wrapper_proof.body,
            balance_wrapper_verifier_only: verifier_only.body,
        })
    }
}

async fn read_envelope(
    storage: &dyn StorageClient,
    protocol: &str,
    kind: ArtifactKind,
) -> Result<StoredArtifact, ArtifactError> {
    let key = kind.key(protocol);
    let raw = storage.get_data(&key).await?.ok_or_else(|| ArtifactError::Missing(key.clone()))?;
    serde_json::from_slice(&raw).map_err(|source| ArtifactError::Malformed { key, source })
}

fn parse_body<T: serde::de::DeserializeOwned>(
    protocol: &str,
    kind: ArtifactKind,
    body: &RawValue,
) -> Result<T, ArtifactError> {
    serde_json::from_str(body.get()).map_err(|source| ArtifactError::Malformed { key: kind.key(protocol), source })
}
