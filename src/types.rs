//! Shared types for the DCA bot.
//!
//! Orders, budget bookkeeping, run states and the error taxonomy used
//! by the exchange, engine and binary layers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Order direction. The bot only ever accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
        }
    }
}

/// Order type. Market orders sized by quote amount (e.g. "spend 10 USDT").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    MarketByQuote,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::MarketByQuote => write!(f, "MARKET"),
        }
    }
}

/// A completed buy, either synthesised by the paper backend or
/// reported back by the exchange. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub pair: String,
    pub side: Side,
    pub kind: OrderKind,
    /// Quote currency committed to the order.
    pub quote_amount: Decimal,
    /// Base asset received.
    pub executed_quantity: Decimal,
    pub average_price: Decimal,
    pub timestamp_ms: i64,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {} for {} @ {}",
            self.id,
            self.side,
            self.executed_quantity,
            self.pair,
            self.quote_amount,
            self.average_price,
        )
    }
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Running totals owned by the controller. Reset on every process start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BudgetState {
    pub total_invested: Decimal,
    pub executed_order_count: u64,
}

impl BudgetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-order cap check: would committing `next` push us past `cap`?
    ///
    /// A sum that overflows `Decimal` counts as past the cap.
    pub fn would_exceed_cap(&self, next: Decimal, cap: Decimal) -> bool {
        self.total_invested
            .checked_add(next)
            .map_or(true, |total| total > cap)
    }

    pub fn order_limit_reached(&self, max_orders: u64) -> bool {
        self.executed_order_count >= max_orders
    }

    /// Book one successful buy.
    pub fn record(&mut self, amount: Decimal) -> Result<(), DcaError> {
        let total = self
            .total_invested
            .checked_add(amount)
            .ok_or_else(|| DcaError::Unexpected("total invested overflowed".into()))?;
        self.total_invested = total;
        self.executed_order_count += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Why the loop stopped buying on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustReason {
    /// The next order would push total invested past the cap.
    InvestmentCap,
    /// `max_orders` orders have been executed.
    OrderLimit,
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustReason::InvestmentCap => write!(f, "investment cap reached"),
            ExhaustReason::OrderLimit => write!(f, "order limit reached"),
        }
    }
}

/// Controller lifecycle.
///
/// `Idle → Running → (Stopped | Exhausted | Aborted)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    /// Terminal state for an external interrupt (Ctrl+C). Interrupts end
    /// here rather than in `Aborted` so the summary separates an operator
    /// stop from an unexpected failure.
    Stopped,
    Exhausted(ExhaustReason),
    /// An unexpected error escaped the loop body.
    Aborted(String),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Idle | RunState::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Stopped => write!(f, "stopped"),
            RunState::Exhausted(reason) => write!(f, "exhausted ({reason})"),
            RunState::Aborted(cause) => write!(f, "aborted ({cause})"),
        }
    }
}

/// Final report, printed on every termination path.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub state: RunState,
    pub orders_executed: u64,
    pub total_invested: Decimal,
    pub total_quantity: Decimal,
    pub quote_asset: String,
    pub base_asset: String,
}

impl RunSummary {
    /// Summary for a run that never entered the loop.
    pub fn empty(state: RunState, base_asset: &str, quote_asset: &str) -> Self {
        Self {
            state,
            orders_executed: 0,
            total_invested: Decimal::ZERO,
            total_quantity: Decimal::ZERO,
            quote_asset: quote_asset.to_string(),
            base_asset: base_asset.to_string(),
        }
    }

    /// Average cost per unit of base asset. Zero when nothing was bought.
    pub fn average_cost(&self) -> Decimal {
        if self.total_quantity.is_zero() {
            Decimal::ZERO
        } else {
            (self.total_invested / self.total_quantity).round_dp(8)
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DCA run {}: orders executed={} | total invested={} {} | acquired={} {} | avg cost={} {}",
            self.state,
            self.orders_executed,
            self.total_invested,
            self.quote_asset,
            self.total_quantity,
            self.base_asset,
            self.average_cost(),
            self.quote_asset,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// What the controller does with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Sleep the short backoff and try the same cycle again.
    RetryAfterBackoff,
    /// Give up on this cycle, keep counters, wait for the next one.
    AbandonCycle,
    /// Leave the loop.
    Abort,
}

/// Domain-specific error types for the bot.
#[derive(Debug, thiserror::Error)]
pub enum DcaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Price unavailable for {pair}: {message}")]
    PriceUnavailable { pair: String, message: String },

    #[error("Execution failed for {pair}: {message}")]
    Execution { pair: String, message: String },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl DcaError {
    pub fn price_unavailable(pair: &str, message: impl fmt::Display) -> Self {
        DcaError::PriceUnavailable {
            pair: pair.to_string(),
            message: message.to_string(),
        }
    }

    pub fn execution(pair: &str, message: impl fmt::Display) -> Self {
        DcaError::Execution {
            pair: pair.to_string(),
            message: message.to_string(),
        }
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            DcaError::PriceUnavailable { .. } => Recovery::RetryAfterBackoff,
            DcaError::Execution { .. } => Recovery::AbandonCycle,
            DcaError::Config(_) | DcaError::Unexpected(_) => Recovery::Abort,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
