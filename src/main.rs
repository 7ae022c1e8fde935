//! DCABOT — scheduled dollar-cost-averaging buyer.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! selects the paper or live backend and runs the buy loop until the
//! budget is exhausted or Ctrl+C is pressed. A one-line summary is printed
//! on every exit path.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dcabot::config::DcaConfig;
use dcabot::engine::controller::Controller;
use dcabot::engine::executor::{select_backend, ExecutionBackend};
use dcabot::engine::price::{ExchangePriceSource, PriceSource};
use dcabot::exchange::binance::BinanceClient;
use dcabot::exchange::ExchangeClient;
use dcabot::types::{DcaError, RunState, RunSummary};

const BANNER: &str = r#"
  ____   ____    _    ____   ___ _____
 |  _ \ / ___|  / \  | __ ) / _ \_   _|
 | | | | |     / _ \ |  _ \| | | || |
 | |_| | |___ / ___ \| |_) | |_| || |
 |____/ \____/_/   \_\____/ \___/ |_|

  Dollar-Cost Averaging Bot v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = match DcaConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            let defaults = DcaConfig::default();
            print_summary(&RunSummary::empty(
                RunState::Aborted("configuration error".into()),
                &defaults.base_asset,
                &defaults.quote_asset,
            ));
            return Err(e);
        }
    };

    init_logging(&cfg);

    println!("{BANNER}");
    info!(
        pair = %cfg.pair,
        base_asset = %cfg.base_asset,
        quote_asset = %cfg.quote_asset,
        per_order = %cfg.investment_per_order,
        interval_minutes = cfg.interval_minutes,
        max_orders = cfg.max_orders,
        investment_cap = %cfg.investment_cap,
        live_mode = cfg.live_mode,
        testnet = cfg.testnet,
        endpoint = %cfg.rest_base_url(),
        "DCABOT starting up"
    );
    info!(
        slippage_pct = %cfg.slippage_pct,
        "Slippage tolerance is informational only and not enforced"
    );

    // -- Backend selection ------------------------------------------------

    let (prices, backend) = match build_pipeline(&cfg) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, "Refusing to start");
            print_summary(&RunSummary::empty(
                RunState::Aborted(e.to_string()),
                &cfg.base_asset,
                &cfg.quote_asset,
            ));
            return Err(e.into());
        }
    };
    info!(mode = %backend.mode(), "Execution backend selected");

    // -- Main loop --------------------------------------------------------

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    info!("Entering DCA loop. Press Ctrl+C to stop.");

    let mut controller = Controller::new(&cfg, prices, backend);
    let summary = controller.run(&cancel).await;

    info!(
        state = %summary.state,
        orders = summary.orders_executed,
        total_invested = %summary.total_invested,
        acquired = %summary.total_quantity,
        "DCABOT shut down."
    );
    print_summary(&summary);

    Ok(())
}

/// Exchange client, price source and execution backend for this run.
fn build_pipeline(
    cfg: &DcaConfig,
) -> Result<(Arc<dyn PriceSource>, Box<dyn ExecutionBackend>), DcaError> {
    let exchange: Arc<dyn ExchangeClient> = Arc::new(BinanceClient::from_config(cfg)?);
    let prices: Arc<dyn PriceSource> =
        Arc::new(ExchangePriceSource::new(Some(Arc::clone(&exchange))));
    let backend = select_backend(cfg, exchange, Arc::clone(&prices))?;
    Ok((prices, backend))
}

/// Cancel `token` on Ctrl+C.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received.");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "Could not listen for Ctrl+C"),
        }
    });
}

fn print_summary(summary: &RunSummary) {
    println!("{summary}");
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &DcaConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dcabot={}", cfg.log_level)));

    if cfg.log_json {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
