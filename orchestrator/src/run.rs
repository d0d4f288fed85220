//! Wires stores, the adapter registry, the signal queue, one dispatcher worker per
//! configured chain, the gas-gating and pending-signature background loops, and the
//! health/metrics HTTP surface together, then runs until a shutdown signal arrives.

use axum::Router;
use orch_adapter::adapters::aave_v3::AaveV3Adapter;
use orch_adapter::adapters::htlc_bridge::HtlcBridgeAdapter;
use orch_adapter::adapters::jupiter::JupiterAdapter;
use orch_adapter::adapters::uniswap_v3::UniswapV3Adapter;
use orch_adapter::registry::AdapterRegistry;
use orch_dispatch::{run_chain_worker, GasQueue};
use orch_execution::gas_scheduler::GasScheduler;
use orch_execution::key_vault::KeyVault;
use orch_execution::nonce_manager::NonceManager;
use orch_store::memory_queue::InMemorySignalQueue;
use orch_store::memory_store::InMemoryStore;
use orch_store::queue::SignalQueue;
use orch_store::store::{AuditLogStore, PendingSignatureStore, PositionStore, TxRecordStore};
use orch_types::chain::ChainId;
use orch_types::config::ConfigWatcher;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;

use crate::config::Config;
use crate::dry_run_chain::{DryRunNonceSource, DryRunRouteSubmitter, DryRunSigner, DryRunSimulator, DryRunSubmitter};
use crate::gas_watch::DryRunGasPriceSource;
use crate::http::{self, Metrics};
use crate::sig_down::SigDown;
use crate::worker::{run_gas_release_loop, run_pending_signature_watch_loop, WorkerDeps};

const IDLE_POLL: Duration = Duration::from_millis(250);

fn build_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(AaveV3Adapter::new()));
    registry.register(Arc::new(UniswapV3Adapter::new()));
    registry.register(Arc::new(JupiterAdapter::new()));
    registry.register(Arc::new(HtlcBridgeAdapter::new()));
    registry
}

pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    #[cfg(feature = "telemetry")]
    let _telemetry = crate::telemetry::Telemetry::init();
    #[cfg(not(feature = "telemetry"))]
    tracing_subscriber::fmt::init();

    let config = Config::load()?;

    let mut key_vault = KeyVault::new(config.wallet_encryption_key.clone().into_inner());
    for chain in config.chains() {
        for signer in &chain.signers {
            key_vault.load_plaintext(chain.chain_id.clone(), signer.address.clone(), signer.private_key.clone().into_inner().as_bytes());
        }
    }
    let key_vault = Arc::new(key_vault);

    let tx_store: Arc<dyn TxRecordStore> = Arc::new(InMemoryStore::new());
    let audit_store: Arc<dyn AuditLogStore> = Arc::new(InMemoryStore::new());
    let pending_store: Arc<dyn PendingSignatureStore> = Arc::new(InMemoryStore::new());
    let position_store: Arc<dyn PositionStore> = Arc::new(InMemoryStore::new());
    let queue: Arc<dyn SignalQueue> = Arc::new(InMemorySignalQueue::new());
    let config_watcher = Arc::new(ConfigWatcher::new(config.initial_system_config()));
    let registry = Arc::new(build_registry());

    let gas_overrides: HashMap<ChainId, u64> =
        config.chains().iter().filter_map(|c| c.gas_max_gwei.map(|g| (c.chain_id.clone(), g))).collect();
    let gas_scheduler = Arc::new(GasScheduler::with_defaults(gas_overrides));
    let gas_prices: Arc<dyn orch_dispatch::GasPriceSource> = Arc::new(DryRunGasPriceSource::new());
    let gas_queue = Arc::new(GasQueue::new(gas_scheduler.clone()));

    let metrics = Metrics::new();
    let ready = Arc::new(AtomicBool::new(false));

    let sig_down = SigDown::try_new()?;
    let cancellation = sig_down.cancellation_token();
    let worker_tracker = TaskTracker::new();

    for chain in config.chains() {
        let chain_id = chain.chain_id.clone();
        let queue = queue.clone();
        let cancellation_for_worker = cancellation.clone();

        let deps = Arc::new(WorkerDeps {
            registry: registry.clone(),
            tx_store: tx_store.clone(),
            audit_store: audit_store.clone(),
            pending_store: pending_store.clone(),
            position_store: position_store.clone(),
            config_watcher: config_watcher.clone(),
            key_vault: key_vault.clone(),
            metrics: metrics.clone(),
            nonce_manager: Arc::new(NonceManager::new(DryRunNonceSource)),
            simulator: Arc::new(DryRunSimulator),
            signer: Arc::new(DryRunSigner),
            submitter: Arc::new(DryRunSubmitter::new()),
            route_submitter: Arc::new(DryRunRouteSubmitter::new()),
            gas_scheduler: gas_scheduler.clone(),
            gas_prices: gas_prices.clone(),
            cancellation: cancellation_for_worker.clone(),
        });

        let gas_queue_for_worker = gas_queue.clone();
        let deps_for_worker = deps.clone();
        worker_tracker.spawn(async move {
            let result = run_chain_worker(queue, chain_id.clone(), IDLE_POLL, cancellation_for_worker, |signal| {
                let deps = deps_for_worker.clone();
                let gas_queue = gas_queue_for_worker.clone();
                async move { deps.admit(signal, gas_queue.as_ref()).await }
            })
            .await;

            if let Err(err) = result {
                tracing::error!(%chain_id, %err, "chain worker exited with an error");
            }
        });

        let gas_release_cancellation = cancellation.clone();
        worker_tracker.spawn(run_gas_release_loop(deps, gas_queue.clone(), gas_release_cancellation));
    }

    let pending_watch_submitter: Arc<dyn orch_execution::tx_executor::ChainSubmitter> = Arc::new(DryRunSubmitter::new());
    worker_tracker.spawn(run_pending_signature_watch_loop(
        pending_store.clone(),
        tx_store.clone(),
        audit_store.clone(),
        pending_watch_submitter,
        cancellation.clone(),
    ));

    worker_tracker.close();
    ready.store(true, Ordering::Relaxed);

    let http_router: Router = http::routes(metrics, ready);
    let addr = SocketAddr::new(config.host(), config.port());
    tracing::info!(%addr, "starting health/metrics server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let http_cancellation = cancellation.clone();
    axum::serve(listener, http_router)
        .with_graceful_shutdown(async move { http_cancellation.cancelled().await })
        .await?;

    worker_tracker.wait().await;
    Ok(())
}
