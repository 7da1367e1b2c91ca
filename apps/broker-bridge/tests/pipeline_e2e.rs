//! End-to-End Pipeline Tests
//!
//! Wires the simulated broker, the in-process bus, and all three service
//! tasks together and drives them through the public topics only: submit
//! and cancel requests go in over the bus, order rows and cached state are
//! observed on the way out.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use broker_bridge::application::dto::{CancelPayload, InboundRequest, SubmitPayload};
use broker_bridge::application::ports::{
    BreakdownCache, BusPublisherPort, position_cache_key, topics,
};
use broker_bridge::application::services::{
    CacheTtl, DiffMonitor, PersistenceService, PersistenceWorker, ReconnectConfig, RequestConsumer,
};
use broker_bridge::application::use_cases::{CancelOrderUseCase, RouteOrderUseCase};
use broker_bridge::domain::events::{OrderEventKind, PositionUpdate};
use broker_bridge::domain::order::{Direction, Offset, OrderStatus};
use broker_bridge::domain::position::PositionBreakdown;
use broker_bridge::domain::shared::{OrderId, PortfolioId, RequestId, Symbol, Timestamp};
use broker_bridge::infrastructure::{
    InMemoryBus, InMemoryKvCache, InMemoryOrderStore, LockedBreakdownCache, SimBroker,
};

const PORTFOLIO: &str = "pf-e2e";
const SYMBOL: &str = "SHFE.rb2505";

struct Pipeline {
    broker: Arc<SimBroker>,
    bus: Arc<InMemoryBus>,
    store: Arc<InMemoryOrderStore>,
    kv: Arc<InMemoryKvCache>,
    breakdowns: Arc<LockedBreakdownCache>,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Start all three tasks and wait until every topic has a consumer, so
    /// tests never race the bindings.
    async fn start() -> Self {
        let broker = Arc::new(SimBroker::new());
        let bus = Arc::new(InMemoryBus::with_capacity(64));
        let store = Arc::new(InMemoryOrderStore::new());
        let kv = Arc::new(InMemoryKvCache::new());
        let breakdowns = Arc::new(LockedBreakdownCache::new());
        let shutdown = CancellationToken::new();

        let service = PersistenceService::new(
            Arc::clone(&store),
            Arc::clone(&kv),
            CacheTtl::default(),
        );
        let persistence =
            PersistenceWorker::new(Arc::clone(&bus), service, shutdown.clone());
        let persistence_handle = tokio::spawn(async move {
            persistence.run().await.unwrap();
        });

        let route_order = RouteOrderUseCase::new(
            Arc::clone(&broker),
            Arc::clone(&breakdowns),
            Arc::clone(&store),
        );
        let cancel_order = CancelOrderUseCase::new(Arc::clone(&broker));
        let consumer =
            RequestConsumer::new(Arc::clone(&bus), route_order, cancel_order, shutdown.clone());
        let consumer_handle = tokio::spawn(async move {
            consumer.run().await.unwrap();
        });

        let monitor = DiffMonitor::new(
            PortfolioId::new(PORTFOLIO),
            Arc::clone(&broker),
            Arc::clone(&bus),
            Arc::clone(&breakdowns),
            ReconnectConfig::default(),
            shutdown.clone(),
        );
        let monitor_handle = tokio::spawn(monitor.run());

        let pipeline = Self {
            broker,
            bus,
            store,
            kv,
            breakdowns,
            shutdown,
            handles: vec![persistence_handle, consumer_handle, monitor_handle],
        };

        // An empty payload fails decoding downstream and is dropped with a
        // warning; a successful publish proves the consumer is bound.
        for topic in [
            topics::ORDER_SUBMIT,
            topics::ORDER_CANCEL,
            topics::ORDER_UPDATES,
            topics::POSITION_UPDATES,
            topics::ACCOUNT_UPDATES,
        ] {
            pipeline.wait_topic_bound(topic).await;
        }
        pipeline
    }

    async fn wait_topic_bound(&self, topic: &str) {
        for _ in 0..500 {
            if self.bus.publish(topic, Vec::new()).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("topic {topic} never got a consumer");
    }

    async fn submit(&self, payload: SubmitPayload) {
        let request = InboundRequest::Submit {
            request_id: RequestId::generate(),
            timestamp: Timestamp::now(),
            payload,
        };
        self.bus
            .publish(topics::ORDER_SUBMIT, serde_json::to_vec(&request).unwrap())
            .await
            .unwrap();
    }

    async fn cancel(&self, order_id: &str) {
        let request = InboundRequest::Cancel {
            request_id: RequestId::generate(),
            timestamp: Timestamp::now(),
            payload: CancelPayload {
                order_id: OrderId::new(order_id),
                portfolio_id: PortfolioId::new(PORTFOLIO),
            },
        };
        self.bus
            .publish(topics::ORDER_CANCEL, serde_json::to_vec(&request).unwrap())
            .await
            .unwrap();
    }

    /// Poll the order store until the row for `order_id` is terminal.
    async fn wait_terminal(&self, order_id: &str) -> broker_bridge::application::ports::OrderRecord {
        let id = OrderId::new(order_id);
        wait_for(|| {
            self.store
                .order(&id)
                .filter(|record| record.status.is_terminal())
        })
        .await
    }

    async fn stop(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("task did not stop after cancellation")
                .unwrap();
        }
    }
}

/// Poll `check` every few milliseconds until it yields a value.
async fn wait_for<T>(mut check: impl FnMut() -> Option<T>) -> T {
    for _ in 0..1000 {
        if let Some(value) = check() {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within the polling window");
}

fn open_payload(order_id: &str, volume: u32) -> SubmitPayload {
    SubmitPayload {
        symbol: Symbol::new(SYMBOL),
        direction: Direction::Buy,
        offset: Offset::Open,
        volume,
        limit_price: Some(dec!(3500)),
        order_id: OrderId::new(order_id),
        portfolio_id: PortfolioId::new(PORTFOLIO),
    }
}

fn close_payload(order_id: &str, volume: u32) -> SubmitPayload {
    SubmitPayload {
        symbol: Symbol::new(SYMBOL),
        direction: Direction::Sell,
        offset: Offset::Close,
        volume,
        limit_price: Some(dec!(3500)),
        order_id: OrderId::new(order_id),
        portfolio_id: PortfolioId::new(PORTFOLIO),
    }
}

#[tokio::test]
async fn open_order_fills_end_to_end() {
    let pipeline = Pipeline::start().await;

    pipeline.submit(open_payload("ord-1", 10)).await;

    let record = pipeline.wait_terminal("ord-1").await;
    assert_eq!(record.status, OrderStatus::Finished);
    assert_eq!(record.volume_left, 0);
    assert_eq!(record.filled_quantity, 10);
    assert_eq!(record.trade_price, Some(dec!(3500)));

    // One NEW and exactly one terminal event in the audit log. The audit
    // append trails the row upsert, so poll rather than assert directly.
    let order_id = OrderId::new("ord-1");
    wait_for(|| {
        let kinds: Vec<OrderEventKind> = pipeline
            .store
            .events_for(&order_id)
            .into_iter()
            .map(|event| event.event_type)
            .collect();
        (kinds == [OrderEventKind::New, OrderEventKind::CompleteFill]).then_some(())
    })
    .await;

    // The fill's position snapshot landed in the TTL cache.
    let key = position_cache_key(&PortfolioId::new(PORTFOLIO), &Symbol::new(SYMBOL));
    let cached: PositionUpdate = wait_for(|| {
        pipeline
            .kv
            .peek(&key)
            .and_then(|value| serde_json::from_str(&value).ok())
    })
    .await;
    assert_eq!(cached.breakdown.pos_long_today, 10);
    assert_eq!(cached.net_position, 10);

    pipeline.stop().await;
}

#[tokio::test]
async fn close_is_split_into_today_and_historical_legs() {
    let pipeline = Pipeline::start().await;

    pipeline.broker.seed_position(
        Symbol::new(SYMBOL),
        PositionBreakdown {
            pos_long_today: 5,
            pos_long_his: 10,
            pos_short_today: 0,
            pos_short_his: 0,
        },
    );

    // The monitor feeds the breakdown cache from the seeded diff; the close
    // must not race that feed.
    let portfolio = PortfolioId::new(PORTFOLIO);
    let symbol = Symbol::new(SYMBOL);
    wait_for(|| pipeline.breakdowns.get(&portfolio, &symbol)).await;

    pipeline.submit(close_payload("ord-2", 8)).await;

    let today_leg = pipeline.wait_terminal("ord-2_closetoday").await;
    assert_eq!(today_leg.offset, Offset::CloseToday);
    assert_eq!(today_leg.volume_orign, 5);
    assert_eq!(today_leg.filled_quantity, 5);

    let his_leg = pipeline.wait_terminal("ord-2_close").await;
    assert_eq!(his_leg.offset, Offset::Close);
    assert_eq!(his_leg.volume_orign, 3);
    assert_eq!(his_leg.filled_quantity, 3);

    // Position after both fills: today fully consumed, 3 lots off the
    // historical side.
    let expected = PositionBreakdown {
        pos_long_today: 0,
        pos_long_his: 7,
        pos_short_today: 0,
        pos_short_his: 0,
    };
    wait_for(|| {
        pipeline
            .breakdowns
            .get(&portfolio, &symbol)
            .filter(|b| *b == expected)
    })
    .await;

    pipeline.stop().await;
}

#[tokio::test]
async fn redelivered_submit_routes_once() {
    let pipeline = Pipeline::start().await;

    pipeline.submit(open_payload("ord-3", 4)).await;
    let record = pipeline.wait_terminal("ord-3").await;
    assert_eq!(record.filled_quantity, 4);

    // Same envelope again, as the bus is allowed to do.
    pipeline.submit(open_payload("ord-3", 4)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Still one row, still terminal, and no extra lifecycle events.
    assert_eq!(pipeline.store.len(), 1);
    let record = pipeline.store.order(&OrderId::new("ord-3")).unwrap();
    assert_eq!(record.status, OrderStatus::Finished);
    assert_eq!(pipeline.store.events_for(&OrderId::new("ord-3")).len(), 2);

    pipeline.stop().await;
}

#[tokio::test]
async fn cancel_of_unknown_order_leaves_pipeline_running() {
    let pipeline = Pipeline::start().await;

    pipeline.cancel("no-such-order").await;

    // The pipeline still routes after the no-op cancel.
    pipeline.submit(open_payload("ord-4", 2)).await;
    let record = pipeline.wait_terminal("ord-4").await;
    assert_eq!(record.filled_quantity, 2);

    pipeline.stop().await;
}

#[tokio::test]
async fn shutdown_stops_all_tasks() {
    let pipeline = Pipeline::start().await;
    pipeline.stop().await;
}
