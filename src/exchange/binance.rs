//! Binance spot REST integration.
//!
//! Only two endpoints are used:
//! - `GET  /api/v3/ticker/price` (public) for the current price
//! - `POST /api/v3/order` (signed) for a MARKET BUY sized by `quoteOrderQty`
//!
//! Mainnet: https://api.binance.com
//! Testnet: https://testnet.binance.vision
//! Auth: `X-MBX-APIKEY` header plus HMAC-SHA256 `signature` over the query.
//!
//! Without credentials the client is read-only: price lookups work, order
//! placement fails with an execution error.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::signing::sign_query;
use super::{ExchangeClient, ExchangeFill};
use crate::config::{Credentials, DcaConfig};
use crate::types::DcaError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const TICKER_PATH: &str = "/api/v3/ticker/price";
const ORDER_PATH: &str = "/api/v3/order";

/// Milliseconds the exchange accepts between our timestamp and its clock.
const RECV_WINDOW_MS: u64 = 5000;

const HTTP_TIMEOUT_SECS: u64 = 15;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

/// `newOrderRespType=FULL` response. We only deserialize what we use.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    symbol: String,
    order_id: u64,
    client_order_id: String,
    transact_time: i64,
    executed_qty: String,
    cummulative_quote_qty: String,
    status: String,
}

/// Error body: `{"code": -2010, "msg": "Account has insufficient balance..."}`.
#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Binance spot client.
pub struct BinanceClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl BinanceClient {
    /// Create a client against `base_url`. `credentials` are only needed
    /// for order placement.
    pub fn new(
        base_url: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Result<Self, DcaError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent("DCABOT/0.1.0")
            .build()
            .map_err(|e| DcaError::Unexpected(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: credentials.filter(|c| c.is_complete()),
        })
    }

    /// Client for the configured environment (testnet/mainnet/override).
    pub fn from_config(cfg: &DcaConfig) -> Result<Self, DcaError> {
        Self::new(cfg.rest_base_url(), cfg.live_credentials().cloned())
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, String> {
        Decimal::from_str(raw).map_err(|e| format!("bad {field} '{raw}': {e}"))
    }

    /// Turn a non-2xx body into a readable reason.
    fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
        match serde_json::from_str::<ApiError>(body) {
            Ok(err) => format!("exchange rejected ({}): {}", err.code, err.msg),
            Err(_) => format!("HTTP {status}: {body}"),
        }
    }

    fn to_fill(resp: OrderResponse) -> Result<ExchangeFill, String> {
        let executed_quantity = Self::parse_decimal("executedQty", &resp.executed_qty)?;
        let quote_spent = Self::parse_decimal("cummulativeQuoteQty", &resp.cummulative_quote_qty)?;
        let average_price = if executed_quantity.is_zero() {
            Decimal::ZERO
        } else {
            (quote_spent / executed_quantity).round_dp(8)
        };

        Ok(ExchangeFill {
            order_id: resp.order_id.to_string(),
            executed_quantity,
            quote_spent,
            average_price,
            transact_time_ms: resp.transact_time,
        })
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    async fn ticker_price(&self, pair: &str) -> Result<Decimal, DcaError> {
        let url = format!(
            "{}{TICKER_PATH}?symbol={}",
            self.base_url,
            urlencoding::encode(pair)
        );
        debug!(url = %url, "Fetching ticker price");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DcaError::price_unavailable(pair, format!("ticker request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DcaError::price_unavailable(pair, Self::describe_failure(status, &body)));
        }

        let ticker: TickerPrice = resp
            .json()
            .await
            .map_err(|e| DcaError::price_unavailable(pair, format!("bad ticker response: {e}")))?;

        let price = Self::parse_decimal("price", &ticker.price)
            .map_err(|e| DcaError::price_unavailable(pair, e))?;
        if price <= Decimal::ZERO {
            return Err(DcaError::price_unavailable(
                pair,
                format!("non-positive price {price} for {}", ticker.symbol),
            ));
        }

        Ok(price)
    }

    async fn market_buy_quote(
        &self,
        pair: &str,
        quote_amount: Decimal,
    ) -> Result<ExchangeFill, DcaError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| {
                DcaError::execution(pair, "API credentials required for placing orders")
            })?;

        let client_order_id = format!("dca-{}", uuid::Uuid::new_v4().simple());
        let timestamp = chrono::Utc::now().timestamp_millis();
        let query = format!(
            "symbol={}&side=BUY&type=MARKET&quoteOrderQty={}&newClientOrderId={}&newOrderRespType=FULL&recvWindow={}&timestamp={}",
            urlencoding::encode(pair),
            quote_amount.normalize(),
            client_order_id,
            RECV_WINDOW_MS,
            timestamp,
        );
        let signature = sign_query(&query, creds.api_secret.expose_secret())?;
        let url = format!("{}{ORDER_PATH}?{query}&signature={signature}", self.base_url);

        debug!(
            pair,
            client_order_id = %client_order_id,
            quote = %quote_amount,
            "Submitting market buy"
        );

        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", creds.api_key.expose_secret().as_str())
            .send()
            .await
            .map_err(|e| DcaError::execution(pair, format!("order request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DcaError::execution(pair, Self::describe_failure(status, &body)));
        }

        let order: OrderResponse = resp
            .json()
            .await
            .map_err(|e| DcaError::execution(pair, format!("bad order response: {e}")))?;

        info!(
            symbol = %order.symbol,
            order_id = order.order_id,
            client_order_id = %order.client_order_id,
            status = %order.status,
            executed_qty = %order.executed_qty,
            "Binance market buy accepted"
        );

        Self::to_fill(order).map_err(|e| DcaError::execution(pair, e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
