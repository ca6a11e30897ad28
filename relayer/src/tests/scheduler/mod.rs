use assert_matches::assert_matches;
use relayer_utils::time::MAX_SLOTS_JUMP;
use rstest::rstest;
use url::Url;

use crate::config::networks::{NetworkConfig, NetworkRegistry, DEFAULT_BEACON_REST_API};
use crate::error::{ConfigError, RelayerError};
use crate::scheduler::UpdateScheduler;
use crate::tests::common::{in_memory_config, schedule_params};
use crate::types::jobs::{JobPayload, UPDATE_JOB_ATTEMPTS, UPDATE_JOB_BACKOFF};
use crate::types::params::ScheduleParams;
use crate::types::queue::QueueType;

#[rstest]
#[tokio::test]
async fn schedule_initializes_cursor_and_registers_job(schedule_params: ScheduleParams) {
    let (config, _) = in_memory_config().await;
    let before = relayer_utils::time::now_millis();

    let scheduled = UpdateScheduler::new(config.clone()).schedule(&schedule_params).await.unwrap();

    assert_eq!(scheduled.job_name, "downloadUpdatemainnet");
    assert_eq!(scheduled.cursor_key, "lastDownloadedUpdateKey:mainnet");
    assert!(scheduled.cursor_initialized);
    assert_eq!(scheduled.every_ms, 120_000);

    let cursor = config.storage().get_data("lastDownloadedUpdateKey:mainnet").await.unwrap().unwrap();
    assert_eq!(&cursor[..], b"100");

    let jobs = config.job_queue().repeatable_jobs(QueueType::UpdatePolling).await.unwrap();
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.every, 120_000);
    assert!(job.next_run_at_ms >= before);
    assert!(job.next_run_at_ms <= relayer_utils::time::now_millis());
    assert_eq!(job.options.attempts, UPDATE_JOB_ATTEMPTS);
    assert_eq!(job.options.backoff.delay(), UPDATE_JOB_BACKOFF);
    assert_matches!(&job.payload, JobPayload::UpdateJob(update) => {
        assert_eq!(update.last_downloaded_update_key, "lastDownloadedUpdateKey:mainnet");
        assert_eq!(update.slots_jump, 10);
        assert_eq!(update.beacon_rest_apis, vec![Url::parse("http://beacon.local:5052").unwrap()]);
        assert_eq!(update.network_config.network, "mainnet");
        assert_eq!(update.network_config.beacon_rest_apis, update.beacon_rest_apis);
        assert_eq!(update.network_config.seconds_per_slot, 12);
    });
}

#[rstest]
#[tokio::test]
async fn scheduling_twice_keeps_cursor_and_single_schedule(schedule_params: ScheduleParams) {
    let (config, _) = in_memory_config().await;
    let scheduler = UpdateScheduler::new(config.clone());
    scheduler.schedule(&schedule_params).await.unwrap();

    let again = ScheduleParams { initial_slot: 5000, ..schedule_params };
    let scheduled = scheduler.schedule(&again).await.unwrap();

    assert!(!scheduled.cursor_initialized);
    let cursor = config.storage().get_data("lastDownloadedUpdateKey:mainnet").await.unwrap().unwrap();
    assert_eq!(&cursor[..], b"100");
    assert_eq!(config.job_queue().repeatable_jobs(QueueType::UpdatePolling).await.unwrap().len(), 1);
}

#[rstest]
#[tokio::test]
async fn light_client_instances_get_their_own_cursor(schedule_params: ScheduleParams) {
    let (config, _) = in_memory_config().await;
    let scheduler = UpdateScheduler::new(config.clone());
    scheduler.schedule(&schedule_params).await.unwrap();
    let with_lc = ScheduleParams { light_client: Some("lc7".to_string()), ..schedule_params };
    let scheduled = scheduler.schedule(&with_lc).await.unwrap();

    assert_eq!(scheduled.cursor_key, "lastDownloadedUpdateKey:mainnet:lc7");
    assert_eq!(scheduled.job_name, "downloadUpdatemainnetlc7");
    assert_eq!(config.job_queue().repeatable_jobs(QueueType::UpdatePolling).await.unwrap().len(), 2);
}

#[rstest]
#[case::unknown_network(ScheduleParams { network: "goerli-old".to_string(), ..schedule_params() }, "unsupported")]
#[case::zero_jump(ScheduleParams { slots_jump: 0, ..schedule_params() }, "jump")]
#[case::jump_past_timestamp_range(ScheduleParams { slots_jump: MAX_SLOTS_JUMP + 1, ..schedule_params() }, "jump")]
#[case::blank_light_client(ScheduleParams { light_client: Some(" ".to_string()), ..schedule_params() }, "light_client")]
#[tokio::test]
async fn invalid_requests_write_nothing(#[case] params: ScheduleParams, #[case] reason: &str) {
    let (config, storage) = in_memory_config().await;

    let result = UpdateScheduler::new(config.clone()).schedule(&params).await;

    let error = result.unwrap_err();
    match (reason, &error) {
        ("unsupported", RelayerError::ConfigError(ConfigError::UnsupportedNetwork(name))) => {
            assert_eq!(name, "goerli-old")
        }
        ("jump", RelayerError::ConfigError(ConfigError::InvalidSlotsJump)) => {}
        ("light_client", RelayerError::ConfigError(ConfigError::EmptyLightClient)) => {}
        _ => panic!("unexpected error for {reason}: {error:?}"),
    }
    assert!(storage.keys().await.is_empty());
    assert!(config.job_queue().repeatable_jobs(QueueType::UpdatePolling).await.unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn omitted_endpoints_fall_back_to_network_defaults(schedule_params: ScheduleParams) {
    let (config, _) = in_memory_config().await;
    let params = ScheduleParams { beacon_rest_apis: vec![], ..schedule_params };

    UpdateScheduler::new(config.clone()).schedule(&params).await.unwrap();

    let jobs = config.job_queue().repeatable_jobs(QueueType::UpdatePolling).await.unwrap();
    assert_matches!(&jobs[0].payload, JobPayload::UpdateJob(update) => {
        assert_eq!(update.beacon_rest_apis, vec![Url::parse(DEFAULT_BEACON_REST_API).unwrap()]);
    });
}

#[rstest]
#[tokio::test]
async fn network_without_endpoints_needs_explicit_ones(schedule_params: ScheduleParams) {
    let (config, storage) = in_memory_config().await;
    let networks = NetworkRegistry::new([NetworkConfig::beacon("mainnet", vec![])]);
    let scheduler = UpdateScheduler::with_networks(config.clone(), networks);

    let error = scheduler.schedule(&ScheduleParams { beacon_rest_apis: vec![], ..schedule_params.clone() }).await;
    assert_matches!(error, Err(RelayerError::ConfigError(ConfigError::MissingBeaconEndpoints)));
    assert!(storage.keys().await.is_empty());

    scheduler.schedule(&schedule_params).await.unwrap();
    assert_eq!(config.job_queue().repeatable_jobs(QueueType::UpdatePolling).await.unwrap().len(), 1);
}
