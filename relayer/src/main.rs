use std::sync::Arc;
use std::time::Duration;

use clap::Parser as _;
use dotenvy::dotenv;
use relayer::cli::{Cli, Commands, PollerCmd, ProverCmd, PublisherCmd, ScheduleCmd};
use relayer::core::client::BeaconRestClient;
use relayer::core::config::Config;
use relayer::publisher::{PublisherConfig, UpdatePublisher};
use relayer::scheduler::UpdateScheduler;
use relayer::types::params::{PollerParams, ProverWorkerParams, PublisherParams, ScheduleParams, StoreParams};
use relayer::types::queue::QueueType;
use relayer::utils::logging::init_logging;
use relayer::utils::signal_handler::SignalHandler;
use relayer::worker::controller::worker_controller::WorkerController;
use relayer::worker::handlers::{ProofGenerationHandler, UpdatePollingHandler};
use relayer::{RelayerError, RelayerResult};
use relayer_ethereum_settlement_client::EthereumSettlementClient;
use relayer_http_prover_service::{HttpCompressionService, HttpProverService};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    let (name, result) = match cli.command {
        Commands::ScheduleUpdate { schedule_command } => ("schedule-update", schedule_update(*schedule_command).await),
        Commands::RunPoller { poller_command } => ("run-poller", run_poller(*poller_command).await),
        Commands::RunProver { prover_command } => ("run-prover", run_prover(*prover_command).await),
        Commands::RunPublisher { publisher_command } => ("run-publisher", run_publisher(*publisher_command).await),
    };

    match result {
        Ok(()) => info!(command = name, "Relayer command finished"),
        Err(e) => {
            error!(command = name, category = %e.category(), error = %e, error_chain = ?e, "Relayer command failed");
            panic!("{name} failed: {e}");
        }
    }
}

async fn connect(store_args: relayer::cli::store::StoreCliArgs) -> RelayerResult<Arc<Config>> {
    let params = StoreParams::try_from(store_args)?;
    let config = Config::from_store_params(&params).await?;
    config.health_check().await?;
    debug!("Configuration initialized");
    Ok(Arc::new(config))
}

async fn schedule_update(cmd: ScheduleCmd) -> RelayerResult<()> {
    let config = connect(cmd.store_args.clone()).await?;
    let params = ScheduleParams::from(cmd);
    let scheduled = UpdateScheduler::new(config).schedule(&params).await?;
    info!(
        job_name = %scheduled.job_name,
        cursor_key = %scheduled.cursor_key,
        cursor_initialized = scheduled.cursor_initialized,
        every_ms = scheduled.every_ms,
        "Update job scheduled"
    );
    Ok(())
}

async fn run_poller(cmd: PollerCmd) -> RelayerResult<()> {
    let config = connect(cmd.store_args.clone()).await?;
    let params = PollerParams::from(cmd);
    let beacon = BeaconRestClient::new().map_err(|e| RelayerError::ClientError(e.to_string()))?;

    let controller = WorkerController::new(config.clone(), CancellationToken::new())
        .with_worker(QueueType::UpdatePolling, Arc::new(UpdatePollingHandler::new(config, Arc::new(beacon))), 1)
        .with_repeat_driver(params.repeat_tick);
    run_controller(controller).await
}

async fn run_prover(cmd: ProverCmd) -> RelayerResult<()> {
    let config = connect(cmd.store_args.clone()).await?;
    let params = ProverWorkerParams::from(cmd);
    let prover = HttpProverService::new_with_args(&params.prover).map_err(|e| RelayerError::ClientError(e.to_string()))?;

    let controller = WorkerController::new(config.clone(), CancellationToken::new()).with_worker(
        QueueType::ProofGeneration,
        Arc::new(ProofGenerationHandler::new(config, Arc::new(prover))),
        1,
    );
    run_controller(controller).await
}

/// Runs the workers until a signal arrives or one of them fails, then drains them.
async fn run_controller(controller: WorkerController) -> RelayerResult<()> {
    let mut signal_handler = SignalHandler::new();
    let trigger = signal_handler.shutdown_trigger();

    let runner = controller.clone();
    let worker_task = tokio::spawn(async move {
        let result = runner.run().await;
        trigger.notify_one();
        result
    });

    signal_handler.wait_for_shutdown().await?;
    controller.shutdown();

    signal_handler
        .handle_graceful_shutdown(
            move || async move {
                match worker_task.await {
                    Ok(result) => result.map_err(anyhow::Error::from),
                    Err(e) => Err(anyhow::anyhow!("worker controller panicked: {e}")),
                }
            },
            SHUTDOWN_TIMEOUT,
        )
        .await?;
    Ok(())
}

async fn run_publisher(cmd: PublisherCmd) -> RelayerResult<()> {
    let config = connect(cmd.store_args.clone()).await?;
    let params = PublisherParams::try_from(cmd)?;

    let compression = Arc::new(
        HttpCompressionService::new_with_args(&params.compression).map_err(|e| RelayerError::ClientError(e.to_string()))?,
    );
    let settlement = Arc::new(
        EthereumSettlementClient::new_with_args(&params.settlement).map_err(|e| RelayerError::ClientError(e.to_string()))?,
    );

    let mut signal_handler = SignalHandler::new();
    let trigger = signal_handler.shutdown_trigger();
    let token = CancellationToken::new();
    let mut publishers = JoinSet::new();

    for protocol in &params.protocols {
        let publisher = UpdatePublisher::new(
            PublisherConfig {
                protocol: protocol.clone(),
                speed: params.speed,
                compression_timeout: params.compression_timeout,
                await_finality: params.await_finality,
            },
            config.storage().clone(),
            config.notifications().clone(),
            compression.clone(),
            settlement.clone(),
        );
        let token = token.child_token();
        let trigger = trigger.clone();
        publishers.spawn(async move {
            publisher.run(token).await;
            trigger.notify_one();
        });
    }
    info!(protocols = ?params.protocols, speed = %params.speed, "Publishers started");

    signal_handler.wait_for_shutdown().await?;
    token.cancel();

    signal_handler
        .handle_graceful_shutdown(
            move || async move {
                while let Some(joined) = publishers.join_next().await {
                    joined?;
                }
                Ok(())
            },
            SHUTDOWN_TIMEOUT,
        )
        .await?;
    Ok(())
}
