use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

use crate::core::client::queue::{MockQueueClient, QueueError};
use crate::core::client::InMemoryStorage;
use crate::core::job_queue::{FailureOutcome, JobQueue};
use crate::error::JobError;
use crate::scheduler::UpdateScheduler;
use crate::tests::common::{in_memory_config, proof_input, schedule_params, wait_until};
use crate::types::jobs::{JobMessage, JobOptions, JobPayload, RepeatOptions, VersionedJobMessage};
use crate::types::params::ScheduleParams;
use crate::types::queue::QueueType;
use crate::worker::handlers::JobHandler;

const RECEIVE_WAIT: Duration = Duration::from_millis(200);

struct CountingHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl JobHandler for CountingHandler {
    async fn handle(&self, _message: &JobMessage) -> Result<(), JobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn decode(delivery: &omniqueue::Delivery) -> JobMessage {
    let payload = delivery.borrow_payload().unwrap();
    serde_json::from_slice::<VersionedJobMessage>(payload).unwrap().into_latest()
}

#[rstest]
#[tokio::test]
async fn repeat_fires_once_per_interval(schedule_params: ScheduleParams) {
    let (config, _) = in_memory_config().await;
    UpdateScheduler::new(config.clone()).schedule(&schedule_params).await.unwrap();
    let job_queue = config.job_queue();
    let now = relayer_utils::time::now_millis();

    assert_eq!(job_queue.fire_due_repeats(QueueType::UpdatePolling, now).await.unwrap(), 1);
    assert_eq!(job_queue.fire_due_repeats(QueueType::UpdatePolling, now).await.unwrap(), 0);
    assert_eq!(job_queue.fire_due_repeats(QueueType::UpdatePolling, now + 120_000).await.unwrap(), 1);

    for _ in 0..2 {
        let delivery = job_queue.receive(QueueType::UpdatePolling, RECEIVE_WAIT).await.unwrap().unwrap();
        let message = decode(&delivery);
        assert_eq!(message.name, "downloadUpdatemainnet");
        assert_eq!(message.attempts_made, 0);
        assert!(message.options.repeat.is_none());
        delivery.ack().await.unwrap();
    }
    assert!(job_queue.receive(QueueType::UpdatePolling, RECEIVE_WAIT).await.unwrap().is_none());
}

#[rstest]
#[tokio::test]
async fn rescheduling_replaces_the_repeat_entry(schedule_params: ScheduleParams) {
    let (config, _) = in_memory_config().await;
    let scheduler = UpdateScheduler::new(config.clone());
    scheduler.schedule(&schedule_params).await.unwrap();
    scheduler.schedule(&ScheduleParams { slots_jump: 32, ..schedule_params }).await.unwrap();

    let jobs = config.job_queue().repeatable_jobs(QueueType::UpdatePolling).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].every, 32 * 12 * 1000);

    let now = relayer_utils::time::now_millis();
    assert_eq!(config.job_queue().fire_due_repeats(QueueType::UpdatePolling, now).await.unwrap(), 1);
}

#[tokio::test]
async fn oversized_repeat_interval_saturates() {
    let (config, _) = in_memory_config().await;
    let job_queue = config.job_queue();
    let options = JobOptions {
        repeat: Some(RepeatOptions { every: u64::MAX, immediately: true }),
        ..JobOptions::with_retries(1, Duration::ZERO)
    };
    job_queue
        .enqueue(QueueType::UpdatePolling, "huge", JobPayload::ProofInput(proof_input("p1", vec![1])), options)
        .await
        .unwrap();
    let now = relayer_utils::time::now_millis();

    assert_eq!(job_queue.fire_due_repeats(QueueType::UpdatePolling, now).await.unwrap(), 1);
    assert_eq!(job_queue.fire_due_repeats(QueueType::UpdatePolling, now).await.unwrap(), 0);

    let jobs = job_queue.repeatable_jobs(QueueType::UpdatePolling).await.unwrap();
    assert_eq!(jobs[0].next_run_at_ms, i64::MAX);
}

#[tokio::test]
async fn fired_repeats_stay_advanced_when_a_later_send_fails() {
    let sends = Arc::new(AtomicUsize::new(0));
    let counter = sends.clone();
    let mut queue = MockQueueClient::new();
    queue.expect_send_message().returning(move |_, _, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 1 {
            return Err(QueueError::QueueNotFound("update_polling".to_string()));
        }
        Ok(())
    });
    let job_queue = JobQueue::new(Arc::new(queue), Arc::new(InMemoryStorage::default()));
    let options = JobOptions {
        repeat: Some(RepeatOptions { every: 60_000, immediately: true }),
        ..JobOptions::with_retries(1, Duration::ZERO)
    };
    for name in ["a", "b"] {
        let payload = JobPayload::ProofInput(proof_input("p1", vec![1]));
        job_queue.enqueue(QueueType::UpdatePolling, name, payload, options.clone()).await.unwrap();
    }
    let now = relayer_utils::time::now_millis();

    assert!(job_queue.fire_due_repeats(QueueType::UpdatePolling, now).await.is_err());
    let jobs = job_queue.repeatable_jobs(QueueType::UpdatePolling).await.unwrap();
    assert_eq!(jobs[0].name, "a");
    assert!(!jobs[0].is_due(now));
    assert!(jobs[1].is_due(now));

    assert_eq!(job_queue.fire_due_repeats(QueueType::UpdatePolling, now).await.unwrap(), 1);
    assert_eq!(sends.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_keeps_id_and_counts_attempts() {
    let (config, _) = in_memory_config().await;
    let job_queue = config.job_queue();
    let message = JobMessage::new(
        "proof-p1",
        JobPayload::ProofInput(proof_input("p1", vec![42])),
        JobOptions::with_retries(2, Duration::ZERO),
    );
    let error = JobError::MissingCursor("k".to_string());

    let outcome = job_queue.retry_or_fail(QueueType::ProofGeneration, message.clone(), &error).await.unwrap();
    assert_eq!(outcome, FailureOutcome::Retried { attempts_made: 1, delay: Duration::ZERO });

    let delivery = job_queue.receive(QueueType::ProofGeneration, RECEIVE_WAIT).await.unwrap().unwrap();
    let retried = decode(&delivery);
    delivery.ack().await.unwrap();
    assert_eq!(retried.id, message.id);
    assert_eq!(retried.attempts_made, 1);

    let outcome = job_queue.retry_or_fail(QueueType::ProofGeneration, retried, &error).await.unwrap();
    assert_eq!(outcome, FailureOutcome::Failed);
    let failed = job_queue.failed_job(QueueType::ProofGeneration, "proof-p1").await.unwrap().unwrap();
    assert_eq!(failed.attempts_made, 2);
    assert_eq!(failed.id, Some(message.id));
    assert!(failed.failed_reason.contains('k'));
}

#[tokio::test]
async fn malformed_payload_is_recorded_and_never_handled() {
    let (config, _) = in_memory_config().await;
    config
        .queue()
        .send_message(QueueType::ProofGeneration, r#"{"name":"bad-job","payload":42}"#.to_string(), None)
        .await
        .unwrap();

    let handler = Arc::new(CountingHandler { calls: AtomicUsize::new(0) });
    let token = CancellationToken::new();
    let worker = tokio::spawn(config.job_queue().clone().consume(
        QueueType::ProofGeneration,
        1,
        handler.clone(),
        token.clone(),
    ));

    let job_queue = config.job_queue().clone();
    let recorded = wait_until(|| {
        let job_queue = job_queue.clone();
        async move { job_queue.failed_job(QueueType::ProofGeneration, "bad-job").await.unwrap().is_some() }
    })
    .await;
    token.cancel();
    worker.await.unwrap().unwrap();

    assert!(recorded);
    let failed = job_queue.failed_job(QueueType::ProofGeneration, "bad-job").await.unwrap().unwrap();
    assert_eq!(failed.attempts_made, 0);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    assert!(job_queue.receive(QueueType::ProofGeneration, RECEIVE_WAIT).await.unwrap().is_none());
}

#[tokio::test]
async fn handled_jobs_are_acknowledged() {
    let (config, _) = in_memory_config().await;
    let job_queue = config.job_queue().clone();
    for slot in 0..3 {
        job_queue
            .enqueue(
                QueueType::ProofGeneration,
                &format!("job-{slot}"),
                JobPayload::ProofInput(proof_input("p1", vec![slot])),
                JobOptions::default(),
            )
            .await
            .unwrap();
    }

    let handler = Arc::new(CountingHandler { calls: AtomicUsize::new(0) });
    let token = CancellationToken::new();
    let worker = tokio::spawn(job_queue.clone().consume(QueueType::ProofGeneration, 1, handler.clone(), token.clone()));

    let done = wait_until(|| {
        let handler = handler.clone();
        async move { handler.calls.load(Ordering::SeqCst) == 3 }
    })
    .await;
    token.cancel();
    worker.await.unwrap().unwrap();

    assert!(done);
    assert!(job_queue.receive(QueueType::ProofGeneration, RECEIVE_WAIT).await.unwrap().is_none());
}
