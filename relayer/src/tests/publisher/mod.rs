use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use ::redis::{ErrorKind, RedisError};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use relayer_prover_client_interface::{CompressionClient, MockCompressionClient, ProverClientError};
use relayer_settlement_client_interface::{MockSettlementClient, SpeedTier};
use rstest::rstest;
use serde_json::value::RawValue;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::client::storage::StorageClient;
use crate::core::client::{InMemoryNotifications, InMemoryStorage};
use crate::core::client::notification::{MockNotificationClient, NotificationClient, NotificationError};
use crate::publisher::{PublishError, PublisherConfig, UpdatePublisher};
use crate::tests::common::{proof_input, prover_output, wait_until};
use crate::types::artifacts::{ArtifactError, ArtifactKind, ArtifactSet, ProofReady};

fn publisher_config(await_finality: bool) -> PublisherConfig {
    PublisherConfig {
        protocol: "p1".to_string(),
        speed: SpeedTier::Fast,
        compression_timeout: Duration::from_secs(5),
        await_finality,
    }
}

fn artifact_set(limbs: Vec<u64>) -> ArtifactSet {
    let proven = prover_output().validate().unwrap();
    ArtifactSet::from_proof(&proof_input("p1", limbs), proven, Uuid::new_v4())
}

async fn store_artifacts(storage: &InMemoryStorage, set: &ArtifactSet) {
    for (key, blob) in set.encode("p1").unwrap() {
        storage.put_data(blob, &key).await.unwrap();
    }
}

fn ready(set: &ArtifactSet) -> ProofReady {
    ProofReady { protocol_id: "p1".to_string(), cycle_id: set.cycle_id, slot: 110 }
}

fn compression_answering(body: &'static [u8]) -> MockCompressionClient {
    let mut compression = MockCompressionClient::new();
    compression.expect_compress_proof().times(1).returning(move |_, _| Ok(body.to_vec()));
    compression
}

fn untouched_compression() -> MockCompressionClient {
    let mut compression = MockCompressionClient::new();
    compression.expect_compress_proof().never();
    compression
}

fn untouched_settlement() -> MockSettlementClient {
    let mut settlement = MockSettlementClient::new();
    settlement.expect_submit_verification().never();
    settlement.expect_wait_for_tx_finality().never();
    settlement
}

fn publisher(
    storage: Arc<InMemoryStorage>,
    compression: impl CompressionClient + 'static,
    settlement: MockSettlementClient,
    await_finality: bool,
) -> UpdatePublisher {
    UpdatePublisher::new(
        publisher_config(await_finality),
        storage,
        Arc::new(InMemoryNotifications::default()),
        Arc::new(compression),
        Arc::new(settlement),
    )
}

#[tokio::test]
async fn cycle_submits_verification_with_stored_values() {
    let storage = Arc::new(InMemoryStorage::default());
    let set = artifact_set(vec![5, 1]);
    store_artifacts(&storage, &set).await;

    let mut settlement = MockSettlementClient::new();
    settlement
        .expect_submit_verification()
        .withf(|call, speed| {
            call.proof == vec![0xde, 0xad]
                && call.slot == 110
                && call.balance_sum == (1u128 << 64) + 5
                && call.non_activated_validators == 1
                && call.active_validators == 2
                && call.exited_validators == 3
                && call.slashed_validators == 4
                && *speed == SpeedTier::Fast
        })
        .times(1)
        .returning(|_, _| Ok("0xabc".to_string()));
    settlement.expect_wait_for_tx_finality().never();

    let publisher = publisher(storage, compression_answering(b"0xdead"), settlement, false);
    let tx_hash = publisher.run_cycle(&ready(&set)).await.unwrap();
    assert_eq!(tx_hash, "0xabc");
}

#[tokio::test]
async fn finality_is_awaited_when_configured() {
    let storage = Arc::new(InMemoryStorage::default());
    let set = artifact_set(vec![42]);
    store_artifacts(&storage, &set).await;

    let mut settlement = MockSettlementClient::new();
    settlement.expect_submit_verification().times(1).returning(|call, _| {
        assert_eq!(call.balance_sum, 42);
        Ok("0xfeed".to_string())
    });
    settlement.expect_wait_for_tx_finality().withf(|hash| hash == "0xfeed").times(1).returning(|_| Ok(Some(12)));

    let publisher = publisher(storage, compression_answering(&[1, 2, 3]), settlement, true);
    assert_eq!(publisher.run_cycle(&ready(&set)).await.unwrap(), "0xfeed");
}

#[rstest]
#[case(vec![1, 2, 3])]
#[case(vec![0, 0, 0, 1])]
#[tokio::test]
async fn oversized_balance_sum_is_never_submitted(#[case] limbs: Vec<u64>) {
    let storage = Arc::new(InMemoryStorage::default());
    let set = artifact_set(limbs.clone());
    store_artifacts(&storage, &set).await;

    let publisher = publisher(storage, untouched_compression(), untouched_settlement(), false);
    let error = publisher.run_cycle(&ready(&set)).await.unwrap_err();
    assert_matches!(error, PublishError::BalanceSum(_));
}

#[tokio::test]
async fn mixed_cycles_are_rejected() {
    let storage = Arc::new(InMemoryStorage::default());
    let first = artifact_set(vec![1]);
    let second = artifact_set(vec![2]);
    store_artifacts(&storage, &first).await;
    let (key, blob) = second
        .encode("p1")
        .unwrap()
        .into_iter()
        .find(|(key, _)| *key == ArtifactKind::BalanceWrapperVerifierOnly.key("p1"))
        .unwrap();
    storage.put_data(blob, &key).await.unwrap();

    let publisher = publisher(storage, untouched_compression(), untouched_settlement(), false);
    let error = publisher.run_cycle(&ready(&first)).await.unwrap_err();
    assert_matches!(
        error,
        PublishError::Artifact(ArtifactError::TornRead { key, expected, found }) => {
            assert_eq!(key, "p1:balance_wrapper_verifier_only");
            assert_eq!(expected, first.cycle_id);
            assert_eq!(found, second.cycle_id);
        }
    );
}

#[tokio::test]
async fn missing_artifact_aborts_cycle() {
    let storage = Arc::new(InMemoryStorage::default());
    let set = artifact_set(vec![1]);
    for (key, blob) in set.encode("p1").unwrap().into_iter().take(3) {
        storage.put_data(blob, &key).await.unwrap();
    }

    let publisher = publisher(storage, untouched_compression(), untouched_settlement(), false);
    let error = publisher.run_cycle(&ready(&set)).await.unwrap_err();
    assert_matches!(error, PublishError::Artifact(ArtifactError::Missing(key)) => {
        assert_eq!(key, "p1:balance_wrapper_verifier_only");
    });
}

struct SlowCompression;

#[async_trait]
impl CompressionClient for SlowCompression {
    async fn compress_proof(&self, _: &RawValue, _: &RawValue) -> Result<Vec<u8>, ProverClientError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![])
    }
}

#[tokio::test]
async fn compression_timeout_aborts_cycle() {
    let storage = Arc::new(InMemoryStorage::default());
    let set = artifact_set(vec![1]);
    store_artifacts(&storage, &set).await;

    let publisher = UpdatePublisher::new(
        PublisherConfig { compression_timeout: Duration::from_millis(50), ..publisher_config(false) },
        storage,
        Arc::new(InMemoryNotifications::default()),
        Arc::new(SlowCompression),
        Arc::new(untouched_settlement()),
    );
    let error = publisher.run_cycle(&ready(&set)).await.unwrap_err();
    assert_matches!(error, PublishError::CompressionTimeout(timeout) => assert_eq!(timeout, Duration::from_millis(50)));
}

#[tokio::test]
async fn failed_submission_is_reported() {
    let storage = Arc::new(InMemoryStorage::default());
    let set = artifact_set(vec![1]);
    store_artifacts(&storage, &set).await;

    let mut settlement = MockSettlementClient::new();
    settlement
        .expect_submit_verification()
        .times(1)
        .returning(|_, _| Err(color_eyre::eyre::eyre!("nonce too low")));

    let publisher = publisher(storage, compression_answering(b"\x01"), settlement, false);
    let error = publisher.run_cycle(&ready(&set)).await.unwrap_err();
    assert_matches!(error, PublishError::Settlement(report) => assert!(report.to_string().contains("nonce")));
}

#[tokio::test]
async fn run_loop_publishes_on_notification() {
    let storage = Arc::new(InMemoryStorage::default());
    let set = artifact_set(vec![9]);
    store_artifacts(&storage, &set).await;

    let submitted = Arc::new(AtomicUsize::new(0));
    let counter = submitted.clone();
    let mut settlement = MockSettlementClient::new();
    settlement.expect_submit_verification().returning(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok("0x01".to_string())
    });
    let mut compression = MockCompressionClient::new();
    compression.expect_compress_proof().returning(|_, _| Ok(vec![7]));

    let notifications = Arc::new(InMemoryNotifications::default());
    let publisher = Arc::new(UpdatePublisher::new(
        publisher_config(false),
        storage,
        notifications.clone(),
        Arc::new(compression),
        Arc::new(settlement),
    ));
    let token = CancellationToken::new();
    let run = {
        let publisher = publisher.clone();
        let token = token.clone();
        tokio::spawn(async move { publisher.run(token).await })
    };

    let notification = ready(&set);
    let published = wait_until(|| {
        let notifications = notifications.clone();
        let submitted = submitted.clone();
        let notification = notification.clone();
        async move {
            if submitted.load(Ordering::SeqCst) > 0 {
                return true;
            }
            notifications.publish("p2", &notification).await.unwrap();
            notifications.publish("p1", &notification).await.unwrap();
            false
        }
    })
    .await;

    token.cancel();
    run.await.unwrap();
    assert!(published);
}

#[tokio::test]
async fn run_loop_subscribes_again_after_subscribe_error() {
    let storage = Arc::new(InMemoryStorage::default());
    let set = artifact_set(vec![9]);
    store_artifacts(&storage, &set).await;

    let subscriptions = Arc::new(AtomicUsize::new(0));
    let attempts = subscriptions.clone();
    let notification = ready(&set);
    let mut notifications = MockNotificationClient::new();
    notifications.expect_subscribe().returning(move |_| {
        if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(NotificationError::Redis(RedisError::from((ErrorKind::IoError, "connection refused"))));
        }
        Ok(stream::iter(vec![notification.clone()]).chain(stream::pending()).boxed())
    });

    let submitted = Arc::new(AtomicUsize::new(0));
    let counter = submitted.clone();
    let mut settlement = MockSettlementClient::new();
    settlement.expect_submit_verification().returning(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok("0x01".to_string())
    });
    let mut compression = MockCompressionClient::new();
    compression.expect_compress_proof().returning(|_, _| Ok(vec![7]));

    let publisher = Arc::new(UpdatePublisher::new(
        publisher_config(false),
        storage,
        Arc::new(notifications),
        Arc::new(compression),
        Arc::new(settlement),
    ));
    let token = CancellationToken::new();
    let run = {
        let publisher = publisher.clone();
        let token = token.clone();
        tokio::spawn(async move { publisher.run(token).await })
    };

    let published = wait_until(|| {
        let submitted = submitted.clone();
        async move { submitted.load(Ordering::SeqCst) == 1 }
    })
    .await;

    token.cancel();
    run.await.unwrap();
    assert!(published);
    assert_eq!(subscriptions.load(Ordering::SeqCst), 2);
}
