use std::time::Duration;

use relayer_prover_client_interface::ProofInput;
use relayer_utils::time::slots_to_duration;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::config::networks::NetworkConfig;

pub const UPDATE_JOB_ATTEMPTS: u32 = 10;
pub const UPDATE_JOB_BACKOFF: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backoff {
    /// Delay in milliseconds
    Fixed { delay: u64 },
}

impl Backoff {
    pub fn fixed(delay: Duration) -> Self {
        Backoff::Fixed { delay: delay.as_millis() as u64 }
    }

    pub fn delay(&self) -> Duration {
        match self {
            Backoff::Fixed { delay } => Duration::from_millis(*delay),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatOptions {
    /// Interval in milliseconds
    pub every: u64,
    pub immediately: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    pub attempts: u32,
    pub backoff: Backoff,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatOptions>,
}

impl JobOptions {
    /// Options of the recurring update job: fires now, then every `slots_jump` slots.
    pub fn update_job(slots_jump: u64) -> Self {
        Self {
            attempts: UPDATE_JOB_ATTEMPTS,
            backoff: Backoff::fixed(UPDATE_JOB_BACKOFF),
            repeat: Some(RepeatOptions { every: slots_to_duration(slots_jump).as_millis() as u64, immediately: true }),
        }
    }

    pub fn with_retries(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff: Backoff::fixed(backoff), repeat: None }
    }
}

impl Default for JobOptions {
    fn default() -> Self {
        Self::with_retries(1, Duration::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJob {
    pub last_downloaded_update_key: String,
    pub beacon_rest_apis: Vec<Url>,
    pub slots_jump: u64,
    pub network_config: NetworkConfig,
}

/// A slot the poller found finalized, handed to proof input generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotUpdate {
    pub cursor_key: String,
    pub network: String,
    pub previous_slot: u64,
    pub slot: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum JobPayload {
    UpdateJob(UpdateJob),
    ProofInput(ProofInput),
    SlotUpdate(SlotUpdate),
}

impl JobPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            JobPayload::UpdateJob(_) => "update_job",
            JobPayload::ProofInput(_) => "proof_input",
            JobPayload::SlotUpdate(_) => "slot_update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub id: Uuid,
    pub name: String,
    pub attempts_made: u32,
    pub options: JobOptions,
    pub payload: JobPayload,
}

impl JobMessage {
    pub fn new(name: impl Into<String>, payload: JobPayload, options: JobOptions) -> Self {
        Self { id: Uuid::new_v4(), name: name.into(), attempts_made: 0, options, payload }
    }

    /// True when another attempt fits in the attempt budget.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts_made + 1 < self.options.attempts
    }

    /// The message to enqueue for the next attempt.
    pub fn next_attempt(mut self) -> Self {
        self.attempts_made += 1;
        self
    }
}

/// Wire envelope of every queue message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum VersionedJobMessage {
    #[serde(rename = "1")]
    V1(JobMessage),
}

impl From<JobMessage> for VersionedJobMessage {
    fn from(value: JobMessage) -> Self {
        VersionedJobMessage::V1(value)
    }
}

impl VersionedJobMessage {
    pub fn into_latest(self) -> JobMessage {
        match self {
            VersionedJobMessage::V1(message) => message,
        }
    }
}

/// A recurring job as stored in the repeat registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatableJob {
    pub name: String,
    pub payload: JobPayload,
    pub options: JobOptions,
    pub every: u64,
    pub next_run_at_ms: i64,
}

impl RepeatableJob {
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.next_run_at_ms <= now_ms
    }

    /// Interval in milliseconds as a timestamp offset, saturating at `i64::MAX`.
    pub fn every_ms(&self) -> i64 {
        i64::try_from(self.every).unwrap_or(i64::MAX).max(1)
    }

    /// Moves the schedule to the first slot after `now_ms`, skipping missed intervals.
    pub fn advance(&mut self, now_ms: i64) {
        let every = self.every_ms();
        self.next_run_at_ms = self.next_run_at_ms.saturating_add(every);
        if self.next_run_at_ms <= now_ms {
            let missed = now_ms.saturating_sub(self.next_run_at_ms) / every + 1;
            self.next_run_at_ms = self.next_run_at_ms.saturating_add(missed.saturating_mul(every));
        }
    }
}

/// Record of a job that exhausted its attempt budget or could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedJob {
    pub id: Option<Uuid>,
    pub name: String,
    pub attempts_made: u32,
    pub failed_reason: String,
    pub failed_at: chrono::DateTime<chrono::Utc>,
}
