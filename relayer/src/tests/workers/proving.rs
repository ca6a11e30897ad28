use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use relayer_prover_client_interface::{MockProverClient, ProverClientError, ProverOutput};
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;

use crate::core::client::storage::StorageClient;
use crate::error::JobError;
use crate::tests::common::{
    config_with_storage, in_memory_config, proof_input, prover_output, wait_until, DelayedWriteStorage, TEST_WAIT,
};
use crate::types::artifacts::{ArtifactKind, ArtifactSet};
use crate::types::jobs::{JobMessage, JobOptions, JobPayload, SlotUpdate};
use crate::types::queue::QueueType;
use crate::worker::handlers::{JobHandler, ProofGenerationHandler};

fn proof_job(limbs: Vec<u64>, options: JobOptions) -> JobMessage {
    JobMessage::new("proof-p1-110", JobPayload::ProofInput(proof_input("p1", limbs)), options)
}

fn succeeding_prover() -> MockProverClient {
    let mut prover = MockProverClient::new();
    prover.expect_generate_proof().times(1).returning(|_| Ok(prover_output()));
    prover
}

#[tokio::test]
async fn proof_writes_artifacts_then_notifies() {
    let (config, storage) = in_memory_config().await;
    let mut notifications = config.notifications().subscribe("p1").await.unwrap();
    let handler = ProofGenerationHandler::new(config.clone(), Arc::new(succeeding_prover()));

    handler.handle(&proof_job(vec![42], JobOptions::default())).await.unwrap();

    let ready = tokio::time::timeout(TEST_WAIT, notifications.next()).await.unwrap().unwrap();
    assert_eq!(ready.protocol_id, "p1");
    assert_eq!(ready.slot, 110);
    assert!(tokio::time::timeout(Duration::from_millis(100), notifications.next()).await.is_err());

    let mut expected: Vec<String> = ArtifactKind::iter().map(|kind| kind.key("p1")).collect();
    expected.sort();
    assert_eq!(storage.keys().await, expected);

    let artifacts = ArtifactSet::load(storage.as_ref(), "p1").await.unwrap();
    assert_eq!(artifacts.cycle_id, ready.cycle_id);
    assert_eq!(artifacts.final_layer_proof.balance_sum, vec![42]);
    assert_eq!(artifacts.final_proof_input.number_of_slashed_validators, 4);
    assert_eq!(
        artifacts.balance_wrapper_proof_with_public_inputs.get(),
        r#"{"public_inputs":[340282366920938463463374607431768211455]}"#
    );
}

#[tokio::test]
async fn notification_follows_slow_writes() {
    let storage = Arc::new(DelayedWriteStorage::new(Duration::from_millis(30)));
    let config = config_with_storage(storage.clone()).await;
    let mut notifications = config.notifications().subscribe("p1").await.unwrap();
    let handler = ProofGenerationHandler::new(config.clone(), Arc::new(succeeding_prover()));

    let job = proof_job(vec![7], JobOptions::default());
    let run = tokio::spawn(async move { handler.handle(&job).await });

    let ready = tokio::time::timeout(TEST_WAIT, notifications.next()).await.unwrap().unwrap();
    for kind in ArtifactKind::iter() {
        assert!(storage.inner.get_data(&kind.key("p1")).await.unwrap().is_some(), "{kind} not written before notify");
    }
    assert_eq!(ready.slot, 110);
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_prover_output_writes_nothing() {
    let (config, storage) = in_memory_config().await;
    let mut prover = MockProverClient::new();
    prover.expect_generate_proof().times(1).returning(|_| {
        Ok(ProverOutput { balance_wrapper_verifier_only: None, ..prover_output() })
    });
    let handler = ProofGenerationHandler::new(config, Arc::new(prover));

    let result = handler.handle(&proof_job(vec![1], JobOptions::default())).await;

    match result {
        Err(JobError::MalformedProverOutput(field)) => assert_eq!(field, "balance_wrapper_verifier_only"),
        other => panic!("expected malformed output, got {other:?}"),
    }
    assert!(storage.keys().await.is_empty());
}

#[tokio::test]
async fn wrong_payload_is_not_retryable() {
    let (config, _) = in_memory_config().await;
    let mut prover = MockProverClient::new();
    prover.expect_generate_proof().never();
    let handler = ProofGenerationHandler::new(config, Arc::new(prover));

    let job = JobMessage::new("x", JobPayload::SlotUpdate(SlotUpdate {
            cursor_key: "lastDownloadedUpdateKey:mainnet".to_string(),
            network: "mainnet".to_string(),
            previous_slot: 100,
            slot: 110,
        }), JobOptions::default());
    let error = handler.handle(&job).await.unwrap_err();
    assert!(!error.is_retryable());
}

/// Runs the proof generation consumer over `prover` until `done` holds.
async fn consume_until<F, Fut>(config: Arc<crate::core::config::Config>, prover: MockProverClient, done: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let handler = Arc::new(ProofGenerationHandler::new(config.clone(), Arc::new(prover)));
    let token = CancellationToken::new();
    let worker =
        tokio::spawn(config.job_queue().clone().consume(QueueType::ProofGeneration, 1, handler, token.clone()));
    let reached = wait_until(done).await;
    token.cancel();
    worker.await.unwrap().unwrap();
    reached
}

#[tokio::test]
async fn job_succeeds_on_tenth_attempt() {
    let (config, storage) = in_memory_config().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let mut prover = MockProverClient::new();
    let counter = calls.clone();
    prover.expect_generate_proof().returning(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) < 9 {
            Err(ProverClientError::Timeout(Duration::from_secs(1)))
        } else {
            Ok(prover_output())
        }
    });

    config
        .job_queue()
        .enqueue(
            QueueType::ProofGeneration,
            "proof-p1-110",
            JobPayload::ProofInput(proof_input("p1", vec![42])),
            JobOptions::with_retries(10, Duration::from_millis(10)),
        )
        .await
        .unwrap();

    let written = consume_until(config.clone(), prover, || {
        let storage = storage.clone();
        async move { storage.keys().await.len() == 4 }
    })
    .await;

    assert!(written);
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert!(config.job_queue().failed_job(QueueType::ProofGeneration, "proof-p1-110").await.unwrap().is_none());
}

#[tokio::test]
async fn job_fails_after_ten_attempts() {
    let (config, storage) = in_memory_config().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let mut prover = MockProverClient::new();
    let counter = calls.clone();
    prover.expect_generate_proof().returning(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(ProverClientError::Timeout(Duration::from_secs(1)))
    });

    config
        .job_queue()
        .enqueue(
            QueueType::ProofGeneration,
            "proof-p1-110",
            JobPayload::ProofInput(proof_input("p1", vec![42])),
            JobOptions::with_retries(10, Duration::from_millis(10)),
        )
        .await
        .unwrap();

    let job_queue = config.job_queue().clone();
    let failed = consume_until(config.clone(), prover, || {
        let job_queue = job_queue.clone();
        async move { job_queue.failed_job(QueueType::ProofGeneration, "proof-p1-110").await.unwrap().is_some() }
    })
    .await;
    assert!(failed);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    let record = job_queue.failed_job(QueueType::ProofGeneration, "proof-p1-110").await.unwrap().unwrap();
    assert_eq!(record.attempts_made, 10);
    assert!(record.failed_reason.contains("timed out"));
    assert!(storage.keys().await.iter().all(|key| !key.starts_with("p1:")));
}
