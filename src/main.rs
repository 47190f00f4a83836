use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;

use mint_sniper::blockchain::rpc_client::{DryRunLedger, Ledger, RpcClient};
use mint_sniper::blockchain::stream::{SubscribeRequest, WsTransport};
use mint_sniper::blockchain::transaction::ActionSigner;
use mint_sniper::core::config::Config;
use mint_sniper::core::events::EventBus;
use mint_sniper::engine::classifier::EventClassifier;
use mint_sniper::engine::dispatcher::{ActionDispatcher, ActionSettings};
use mint_sniper::engine::pipeline::Pipeline;
use mint_sniper::engine::supervisor::ConnectionSupervisor;
use mint_sniper::logger::run_logger;
use mint_sniper::strategy::mint_filter::mint_filter_for;
use mint_sniper::strategy::purchase::AssociatedAccountPurchase;
use mint_sniper::strategy::valuation::FixedPriceValuator;
use mint_sniper::utils::backoff::Backoff;
use mint_sniper::utils::wallet::KeypairSigner;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("🚀 Starting Pump.Fun mint sniper");

    let config = Config::from_env().context("Failed to load configuration")?;
    log::info!(
        "✅ Configuration loaded (program={}, min_market_cap={}, commitment={}, workers={})",
        config.program_id,
        config.min_market_cap,
        config.commitment.as_str(),
        config.dispatch_workers
    );

    let signer = KeypairSigner::from_file(&config.keypair_path).with_context(|| {
        format!("Failed to load signer from {}", config.keypair_path.display())
    })?;
    log::info!("✅ Wallet loaded: {}", signer.public_identity());

    let rpc = RpcClient::new(config.rpc_http_url.clone(), config.rpc_timeout());
    let ledger: Arc<dyn Ledger> = if config.dry_run {
        log::info!("📝 DRY RUN: actions are built and signed but never broadcast");
        Arc::new(DryRunLedger::new(rpc))
    } else {
        Arc::new(rpc)
    };

    let event_bus = EventBus::new(config.event_bus_buffer_size);
    let cancel = CancellationToken::new();

    // Stopped only after the pipeline returns so shutdown outcomes are counted.
    let logger_stop = CancellationToken::new();
    let logger = tokio::spawn(run_logger(event_bus.subscribe(), config.dry_run, logger_stop.clone()));

    let classifier = Arc::new(EventClassifier::new(
        config.program_id,
        config.min_market_cap,
        mint_filter_for(config.mint_filter),
        Arc::new(FixedPriceValuator::new(config.unit_price_usd)),
    ));

    let dispatcher = Arc::new(ActionDispatcher::new(
        ledger,
        Arc::new(signer),
        Arc::new(AssociatedAccountPurchase::new()),
        ActionSettings {
            compute_units: config.buy_compute_units,
            priority_fee_per_cu: config.priority_fee_per_cu,
        },
        event_bus.clone(),
    ));

    let supervisor = ConnectionSupervisor::new(
        WsTransport::new(
            config.update_channel_size,
            config.connect_timeout(),
            config.stream_idle_timeout(),
        ),
        config.stream_endpoint.clone(),
        config.auth_token.clone(),
        SubscribeRequest {
            program_id: config.program_id,
            stream_name: config.stream_name.clone(),
            commitment: config.commitment,
        },
        Backoff::from_millis(
            config.reconnect_initial_delay_ms,
            config.reconnect_max_delay_ms,
            config.reconnect_jitter_max_ms,
        ),
    );

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Shutdown signal received, stopping...");
                shutdown.cancel();
            }
            Err(e) => log::error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let pipeline = Pipeline::new(
        supervisor,
        classifier,
        Arc::clone(&dispatcher),
        event_bus,
        config.dispatch_queue_size,
        config.dispatch_workers,
    );
    let stats = pipeline.run(cancel.clone()).await?;

    cancel.cancel();
    logger_stop.cancel();
    if let Err(e) = logger.await {
        log::warn!("Logger task ended abnormally: {}", e);
    }

    let counts = dispatcher.table().counts();
    log::info!(
        "Stopped after {} session(s): updates={}, candidates={}, dropped={}",
        stats.sessions,
        stats.updates,
        stats.candidates,
        stats.dropped
    );
    log::info!(
        "Dispatch table: {} mint(s) attempted (submitted={}, failed={}, pending={})",
        counts.total(),
        counts.submitted,
        counts.failed,
        counts.pending
    );

    Ok(())
}
