//! The DCA scheduler.
//!
//! Each cycle: fetch the price (retrying after a short backoff), check the
//! investment cap, buy `investment_per_order`, book it, then wait for the
//! next interval. Purchases are gated on elapsed time only.
//!
//! The cap check is a pre-check on the next order's amount; fills are not
//! re-validated afterwards.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DcaConfig;
use crate::engine::executor::ExecutionBackend;
use crate::engine::price::PriceSource;
use crate::types::{BudgetState, DcaError, ExhaustReason, Order, Recovery, RunState, RunSummary};

/// Result of a single cycle that did not escape as an error.
#[derive(Debug)]
enum CycleOutcome {
    Bought(Order),
    /// Execution failed; counters untouched.
    Skipped,
    CapReached,
    Cancelled,
}

pub struct Controller<'a> {
    config: &'a DcaConfig,
    prices: Arc<dyn PriceSource>,
    backend: Box<dyn ExecutionBackend>,
    budget: BudgetState,
    /// Local record of every fill received this run.
    ledger: Vec<Order>,
    state: RunState,
}

impl<'a> Controller<'a> {
    pub fn new(
        config: &'a DcaConfig,
        prices: Arc<dyn PriceSource>,
        backend: Box<dyn ExecutionBackend>,
    ) -> Self {
        Self {
            config,
            prices,
            backend,
            budget: BudgetState::new(),
            ledger: Vec::new(),
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn budget(&self) -> &BudgetState {
        &self.budget
    }

    pub fn ledger(&self) -> &[Order] {
        &self.ledger
    }

    /// Run until the budget is exhausted, `cancel` fires, or an unexpected
    /// error escapes a cycle. Always returns a summary.
    pub async fn run(&mut self, cancel: &CancellationToken) -> RunSummary {
        let cfg = self.config;
        self.state = RunState::Running;

        info!(
            pair = %cfg.pair,
            per_order = %cfg.investment_per_order,
            cap = %cfg.investment_cap,
            max_orders = cfg.max_orders,
            interval_minutes = cfg.interval_minutes,
            "DCA loop started"
        );

        let terminal = loop {
            if self.budget.order_limit_reached(cfg.max_orders) {
                break RunState::Exhausted(ExhaustReason::OrderLimit);
            }
            if cancel.is_cancelled() {
                break RunState::Stopped;
            }

            match self.run_cycle(cancel).await {
                Ok(CycleOutcome::Bought(order)) => {
                    info!(
                        order_id = %order.id,
                        orders = self.budget.executed_order_count,
                        max_orders = cfg.max_orders,
                        total_invested = %self.budget.total_invested,
                        "Order booked"
                    );
                    self.ledger.push(order);
                }
                Ok(CycleOutcome::Skipped) => {}
                Ok(CycleOutcome::CapReached) => {
                    info!(
                        total_invested = %self.budget.total_invested,
                        next = %cfg.investment_per_order,
                        cap = %cfg.investment_cap,
                        "Investment cap would be exceeded, no further orders"
                    );
                    break RunState::Exhausted(ExhaustReason::InvestmentCap);
                }
                Ok(CycleOutcome::Cancelled) => break RunState::Stopped,
                Err(e) => {
                    error!(error = %e, "Unexpected error, aborting DCA loop");
                    break RunState::Aborted(e.to_string());
                }
            }

            if self.budget.order_limit_reached(cfg.max_orders) {
                break RunState::Exhausted(ExhaustReason::OrderLimit);
            }

            debug!(minutes = cfg.interval_minutes, "Waiting for next cycle");
            if !sleep_or_cancel(cfg.interval(), cancel).await {
                break RunState::Stopped;
            }
        };

        if terminal == RunState::Stopped {
            info!("Stop signal received");
        }
        self.state = terminal;
        self.summary()
    }

    async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleOutcome, DcaError> {
        let cfg = self.config;

        // 1. Price, retried in place until it comes back.
        let price = loop {
            match self.prices.price(&cfg.pair).await {
                Ok(price) => break price,
                Err(e) => match e.recovery() {
                    Recovery::RetryAfterBackoff => {
                        warn!(
                            error = %e,
                            retry_in_secs = cfg.price_retry_secs,
                            "Price lookup failed"
                        );
                        if !sleep_or_cancel(cfg.price_retry_backoff(), cancel).await {
                            return Ok(CycleOutcome::Cancelled);
                        }
                    }
                    Recovery::AbandonCycle => {
                        warn!(error = %e, "Price lookup failed, skipping cycle");
                        return Ok(CycleOutcome::Skipped);
                    }
                    Recovery::Abort => return Err(e),
                },
            }
        };
        info!(pair = %cfg.pair, price = %price, "Current price");

        // 2. Cap.
        if self
            .budget
            .would_exceed_cap(cfg.investment_per_order, cfg.investment_cap)
        {
            return Ok(CycleOutcome::CapReached);
        }

        // 3-4. Buy and book.
        match self.backend.buy(&cfg.pair, cfg.investment_per_order).await {
            Ok(order) => {
                self.budget.record(cfg.investment_per_order)?;
                Ok(CycleOutcome::Bought(order))
            }
            Err(e) if e.recovery() == Recovery::Abort => Err(e),
            Err(e) => {
                warn!(error = %e, "Order failed, waiting for next cycle");
                Ok(CycleOutcome::Skipped)
            }
        }
    }

    /// Snapshot of the run so far.
    pub fn summary(&self) -> RunSummary {
        let total_quantity: Decimal = self.ledger.iter().map(|o| o.executed_quantity).sum();
        RunSummary {
            state: self.state.clone(),
            orders_executed: self.budget.executed_order_count,
            total_invested: self.budget.total_invested,
            total_quantity,
            quote_asset: self.config.quote_asset.clone(),
            base_asset: self.config.base_asset.clone(),
        }
    }
}

/// Sleep for `duration` unless `cancel` fires first.
///
/// Returns `false` when cancelled.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
