//! Current price lookup for the traded pair.
//!
//! No caching and no retry here: a failed lookup is handed straight back to
//! the controller, which decides whether to back off.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use crate::exchange::ExchangeClient;
use crate::types::DcaError;

/// Source of the current quote price for a pair.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn price(&self, pair: &str) -> Result<Decimal, DcaError>;
}

/// Price source backed by the exchange ticker.
///
/// Paper trading uses the same ticker through a read-only client. Without
/// a client there is no price oracle at all and every lookup fails.
pub struct ExchangePriceSource {
    client: Option<Arc<dyn ExchangeClient>>,
}

impl ExchangePriceSource {
    pub fn new(client: Option<Arc<dyn ExchangeClient>>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PriceSource for ExchangePriceSource {
    async fn price(&self, pair: &str) -> Result<Decimal, DcaError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| DcaError::price_unavailable(pair, "no exchange client configured"))?;

        let price = client.ticker_price(pair).await?;
        debug!(pair, price = %price, "Price fetched");
        Ok(price)
    }
}
