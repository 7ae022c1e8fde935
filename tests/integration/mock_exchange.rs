//! Mock exchange for integration testing.
//!
//! Deterministic `ExchangeClient` that quotes a controllable price, fills
//! market buys at that price and can be told to fail the next N ticker or
//! order calls. All state is in-memory and shared between clones, so a test
//! can hand one clone to the bot and inspect another.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

use dcabot::exchange::{ExchangeClient, ExchangeFill};
use dcabot::types::DcaError;

#[derive(Clone)]
pub struct MockExchange {
    price: Arc<Mutex<Decimal>>,
    ticker_failures: Arc<Mutex<u32>>,
    order_failures: Arc<Mutex<u32>>,
    ticker_calls: Arc<Mutex<u32>>,
    order_attempts: Arc<Mutex<u32>>,
    fills: Arc<Mutex<Vec<ExchangeFill>>>,
}

impl MockExchange {
    pub fn new(price: Decimal) -> Self {
        Self {
            price: Arc::new(Mutex::new(price)),
            ticker_failures: Arc::new(Mutex::new(0)),
            order_failures: Arc::new(Mutex::new(0)),
            ticker_calls: Arc::new(Mutex::new(0)),
            order_attempts: Arc::new(Mutex::new(0)),
            fills: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_price(&self, price: Decimal) {
        *self.price.lock().unwrap() = price;
    }

    /// Fail the next `n` ticker calls.
    pub fn fail_tickers(&self, n: u32) {
        *self.ticker_failures.lock().unwrap() = n;
    }

    /// Reject the next `n` orders.
    pub fn reject_orders(&self, n: u32) {
        *self.order_failures.lock().unwrap() = n;
    }

    pub fn ticker_calls(&self) -> u32 {
        *self.ticker_calls.lock().unwrap()
    }

    pub fn order_attempts(&self) -> u32 {
        *self.order_attempts.lock().unwrap()
    }

    pub fn fills(&self) -> Vec<ExchangeFill> {
        self.fills.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    async fn ticker_price(&self, pair: &str) -> Result<Decimal, DcaError> {
        *self.ticker_calls.lock().unwrap() += 1;
        let mut failures = self.ticker_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(DcaError::price_unavailable(pair, "mock ticker offline"));
        }
        Ok(*self.price.lock().unwrap())
    }

    async fn market_buy_quote(
        &self,
        pair: &str,
        quote_amount: Decimal,
    ) -> Result<ExchangeFill, DcaError> {
        *self.order_attempts.lock().unwrap() += 1;
        {
            let mut failures = self.order_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(DcaError::execution(
                    pair,
                    "exchange rejected (-2010): Account has insufficient balance",
                ));
            }
        }

        let price = *self.price.lock().unwrap();
        let mut fills = self.fills.lock().unwrap();
        let fill = ExchangeFill {
            order_id: format!("MOCK-{}", fills.len() + 1),
            executed_quantity: (quote_amount / price).round_dp(8),
            quote_spent: quote_amount,
            average_price: price,
            transact_time_ms: 1_700_000_000_000 + fills.len() as i64,
        };
        fills.push(fill.clone());
        Ok(fill)
    }
}
