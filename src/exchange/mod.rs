//! Exchange integration.
//!
//! Defines the `ExchangeClient` trait: the two calls the bot needs from a
//! venue (ticker price and a market buy sized in quote currency). Wire
//! protocol, authentication and rate limiting live in the implementation.

pub mod binance;
pub mod signing;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::DcaError;

/// Authoritative fill record returned by the exchange for a market buy.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeFill {
    pub order_id: String,
    pub executed_quantity: Decimal,
    /// Quote currency actually spent.
    pub quote_spent: Decimal,
    pub average_price: Decimal,
    pub transact_time_ms: i64,
}

/// Abstraction over a spot exchange.
///
/// Price failures surface as `DcaError::PriceUnavailable`, order failures
/// as `DcaError::Execution`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Latest traded price for `pair`.
    async fn ticker_price(&self, pair: &str) -> Result<Decimal, DcaError>;

    /// Market buy spending `quote_amount` of the quote currency.
    async fn market_buy_quote(
        &self,
        pair: &str,
        quote_amount: Decimal,
    ) -> Result<ExchangeFill, DcaError>;
}
