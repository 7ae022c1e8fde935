//! Full paper and live runs through the public API.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use dcabot::config::{Credentials, DcaConfig};
use dcabot::engine::controller::Controller;
use dcabot::engine::executor::{select_backend, ExecutionMode};
use dcabot::engine::price::{ExchangePriceSource, PriceSource};
use dcabot::exchange::ExchangeClient;
use dcabot::types::{DcaError, ExhaustReason, RunState};

use crate::mock_exchange::MockExchange;

fn paper_config(per_order: Decimal, cap: Decimal, max_orders: u64) -> DcaConfig {
    DcaConfig {
        pair: "ETHUSDT".into(),
        base_asset: "ETH".into(),
        quote_asset: "USDT".into(),
        investment_per_order: per_order,
        investment_cap: cap,
        max_orders,
        interval_minutes: 5,
        ..DcaConfig::default()
    }
}

fn live_config(per_order: Decimal, cap: Decimal, max_orders: u64) -> DcaConfig {
    DcaConfig {
        live_mode: true,
        credentials: Some(Credentials::new("key", "secret")),
        ..paper_config(per_order, cap, max_orders)
    }
}

fn wire(exchange: &MockExchange) -> (Arc<dyn ExchangeClient>, Arc<dyn PriceSource>) {
    let client: Arc<dyn ExchangeClient> = Arc::new(exchange.clone());
    let prices: Arc<dyn PriceSource> = Arc::new(ExchangePriceSource::new(Some(client.clone())));
    (client, prices)
}

#[tokio::test(start_paused = true)]
async fn paper_run_stops_at_investment_cap() {
    let exchange = MockExchange::new(dec!(2000));
    let cfg = paper_config(dec!(10), dec!(25), 20);
    let (client, prices) = wire(&exchange);

    let backend = select_backend(&cfg, client, prices.clone()).unwrap();
    assert_eq!(backend.mode(), ExecutionMode::Paper);

    let mut controller = Controller::new(&cfg, prices, backend);
    let summary = controller.run(&CancellationToken::new()).await;

    assert_eq!(summary.state, RunState::Exhausted(ExhaustReason::InvestmentCap));
    assert_eq!(summary.orders_executed, 2);
    assert_eq!(summary.total_invested, dec!(20));
    assert_eq!(summary.total_quantity, dec!(0.01));
    assert_eq!(summary.average_cost(), dec!(2000));
    // paper trading never reaches the order endpoint
    assert_eq!(exchange.order_attempts(), 0);

    let ids: Vec<_> = controller.ledger().iter().map(|o| o.id.clone()).collect();
    assert_eq!(ids, vec!["SIM-000001", "SIM-000002"]);
}

#[tokio::test(start_paused = true)]
async fn paper_run_tracks_changing_price() {
    let exchange = MockExchange::new(dec!(2000));
    let cfg = paper_config(dec!(10), dec!(1000), 2);
    let (client, prices) = wire(&exchange);
    let backend = select_backend(&cfg, client, prices.clone()).unwrap();
    let mut controller = Controller::new(&cfg, prices, backend);

    let repricer = exchange.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        repricer.set_price(dec!(2500));
    });

    let summary = controller.run(&CancellationToken::new()).await;

    let ledger = controller.ledger();
    assert_eq!(ledger[0].executed_quantity, dec!(0.005));
    assert_eq!(ledger[1].executed_quantity, dec!(0.004));
    assert_eq!(ledger[1].average_price, dec!(2500));
    assert_eq!(summary.total_quantity, dec!(0.009));
}

#[tokio::test(start_paused = true)]
async fn paper_run_rides_out_price_outage() {
    let exchange = MockExchange::new(dec!(2000));
    exchange.fail_tickers(2);
    let cfg = paper_config(dec!(10), dec!(100), 1);
    let (client, prices) = wire(&exchange);
    let backend = select_backend(&cfg, client, prices.clone()).unwrap();
    let mut controller = Controller::new(&cfg, prices, backend);

    let started = tokio::time::Instant::now();
    let summary = controller.run(&CancellationToken::new()).await;

    assert_eq!(summary.orders_executed, 1);
    assert_eq!(started.elapsed(), Duration::from_secs(20));
    // two failures, one controller lookup, one lookup for the simulated fill
    assert_eq!(exchange.ticker_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn paper_run_without_price_oracle_only_stops_on_signal() {
    let cfg = paper_config(dec!(10), dec!(100), 3);
    let prices: Arc<dyn PriceSource> = Arc::new(ExchangePriceSource::new(None));
    let client: Arc<dyn ExchangeClient> = Arc::new(MockExchange::new(dec!(1)));
    let backend = select_backend(&cfg, client, prices.clone()).unwrap();
    let mut controller = Controller::new(&cfg, prices, backend);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(600)).await;
        trigger.cancel();
    });

    let summary = controller.run(&cancel).await;

    assert_eq!(summary.state, RunState::Stopped);
    assert_eq!(summary.orders_executed, 0);
    assert_eq!(summary.total_invested, Decimal::ZERO);
}

#[tokio::test(start_paused = true)]
async fn live_run_books_exchange_fills() {
    let exchange = MockExchange::new(dec!(40000));
    let cfg = live_config(dec!(20), dec!(1000), 3);
    let (client, prices) = wire(&exchange);

    let backend = select_backend(&cfg, client, prices.clone()).unwrap();
    assert_eq!(backend.mode(), ExecutionMode::Live);

    let mut controller = Controller::new(&cfg, prices, backend);
    let summary = controller.run(&CancellationToken::new()).await;

    assert_eq!(summary.state, RunState::Exhausted(ExhaustReason::OrderLimit));
    assert_eq!(summary.orders_executed, 3);
    assert_eq!(summary.total_invested, dec!(60));
    assert_eq!(exchange.fills().len(), 3);

    let ledger = controller.ledger();
    assert_eq!(ledger[0].id, "MOCK-1");
    assert_eq!(ledger[2].id, "MOCK-3");
    assert_eq!(ledger[0].executed_quantity, dec!(0.0005));
}

#[tokio::test(start_paused = true)]
async fn live_rejection_wastes_cycle_but_not_budget() {
    let exchange = MockExchange::new(dec!(100));
    exchange.reject_orders(1);
    let cfg = live_config(dec!(10), dec!(1000), 2);
    let (client, prices) = wire(&exchange);
    let backend = select_backend(&cfg, client, prices.clone()).unwrap();
    let mut controller = Controller::new(&cfg, prices, backend);

    let summary = controller.run(&CancellationToken::new()).await;

    assert_eq!(exchange.order_attempts(), 3);
    assert_eq!(summary.orders_executed, 2);
    assert_eq!(summary.total_invested, dec!(20));
}

#[test]
fn live_mode_without_credentials_refuses_to_start() {
    let exchange = MockExchange::new(dec!(2000));
    let cfg = DcaConfig {
        live_mode: true,
        ..paper_config(dec!(10), dec!(100), 5)
    };
    let (client, prices) = wire(&exchange);

    let result = select_backend(&cfg, client, prices);

    assert!(matches!(result, Err(DcaError::Config(_))));
    assert_eq!(exchange.ticker_calls(), 0);
    assert_eq!(exchange.order_attempts(), 0);
}
