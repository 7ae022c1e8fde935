//! Order execution.
//!
//! Two backends share the `ExecutionBackend` contract:
//! - `SimulatedBackend` (paper trading) synthesises a fill from the current
//!   price and keeps it in an in-memory log. No funds move.
//! - `LiveBackend` sends a quote-sized market buy to the exchange and
//!   reports back the exchange's fill.
//!
//! The backend is chosen once at startup by `select_backend`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::DcaConfig;
use crate::engine::price::PriceSource;
use crate::exchange::ExchangeClient;
use crate::types::{DcaError, Order, OrderKind, Side};

/// Fractional digits kept on simulated fill quantities.
pub const SIMULATED_QTY_DP: u32 = 6;

// ---------------------------------------------------------------------------
// Backend contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Paper,
    Live,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Paper => write!(f, "paper"),
            ExecutionMode::Live => write!(f, "live"),
        }
    }
}

/// Places a market buy for `quote_amount` of the quote currency.
///
/// Failures come back as `DcaError::Execution` wrapping the cause.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionBackend: Send {
    async fn buy(&mut self, pair: &str, quote_amount: Decimal) -> Result<Order, DcaError>;

    fn mode(&self) -> ExecutionMode;
}

/// Pick the backend for this run.
///
/// Live mode without a complete API key pair is a configuration error;
/// the loop must not start.
pub fn select_backend(
    cfg: &DcaConfig,
    client: Arc<dyn ExchangeClient>,
    prices: Arc<dyn PriceSource>,
) -> Result<Box<dyn ExecutionBackend>, DcaError> {
    if cfg.live_mode {
        if cfg.live_credentials().is_none() {
            return Err(DcaError::Config(
                "live mode requires BINANCE_API_KEY and BINANCE_API_SECRET".into(),
            ));
        }
        if !cfg.testnet {
            warn!(pair = %cfg.pair, "LIVE MODE on mainnet: real funds will be spent");
        }
        Ok(Box::new(LiveBackend::new(client)))
    } else {
        Ok(Box::new(SimulatedBackend::new(prices)))
    }
}

// ---------------------------------------------------------------------------
// Paper trading
// ---------------------------------------------------------------------------

pub struct SimulatedBackend {
    prices: Arc<dyn PriceSource>,
    orders: Vec<Order>,
    next_id: u64,
}

impl SimulatedBackend {
    pub fn new(prices: Arc<dyn PriceSource>) -> Self {
        Self {
            prices,
            orders: Vec::new(),
            next_id: 1,
        }
    }

    /// Every simulated fill so far, oldest first.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// `round(quote_amount / price, 6)`.
    pub fn quantity_for(quote_amount: Decimal, price: Decimal) -> Option<Decimal> {
        if price <= Decimal::ZERO {
            return None;
        }
        quote_amount
            .checked_div(price)
            .map(|q| q.round_dp(SIMULATED_QTY_DP))
    }
}

#[async_trait]
impl ExecutionBackend for SimulatedBackend {
    async fn buy(&mut self, pair: &str, quote_amount: Decimal) -> Result<Order, DcaError> {
        let price = self
            .prices
            .price(pair)
            .await
            .map_err(|e| DcaError::execution(pair, format!("no price for simulated fill: {e}")))?;

        let quantity = Self::quantity_for(quote_amount, price)
            .ok_or_else(|| {
                DcaError::execution(pair, format!("cannot size order at price {price}"))
            })?;

        let order = Order {
            id: format!("SIM-{:06}", self.next_id),
            pair: pair.to_string(),
            side: Side::Buy,
            kind: OrderKind::MarketByQuote,
            quote_amount,
            executed_quantity: quantity,
            average_price: price,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        };
        self.next_id += 1;
        self.orders.push(order.clone());

        info!(
            order_id = %order.id,
            pair,
            quantity = %quantity,
            price = %price,
            quote = %quote_amount,
            "[PAPER] Simulated market buy"
        );

        Ok(order)
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Paper
    }
}

// ---------------------------------------------------------------------------
// Live trading
// ---------------------------------------------------------------------------

/// Delegates to the exchange. Slippage and partial fills are reported as
/// the exchange returns them; nothing is reconciled locally.
pub struct LiveBackend {
    client: Arc<dyn ExchangeClient>,
}

impl LiveBackend {
    pub fn new(client: Arc<dyn ExchangeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExecutionBackend for LiveBackend {
    async fn buy(&mut self, pair: &str, quote_amount: Decimal) -> Result<Order, DcaError> {
        let fill = self
            .client
            .market_buy_quote(pair, quote_amount)
            .await
            .map_err(|e| match e {
                DcaError::Execution { .. } | DcaError::Unexpected(_) => e,
                other => DcaError::execution(pair, other),
            })?;

        info!(
            order_id = %fill.order_id,
            pair,
            quantity = %fill.executed_quantity,
            price = %fill.average_price,
            quote_spent = %fill.quote_spent,
            "[LIVE] Market buy filled"
        );

        Ok(Order {
            id: fill.order_id,
            pair: pair.to_string(),
            side: Side::Buy,
            kind: OrderKind::MarketByQuote,
            quote_amount,
            executed_quantity: fill.executed_quantity,
            average_price: fill.average_price,
            timestamp_ms: fill.transact_time_ms,
        })
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Live
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
