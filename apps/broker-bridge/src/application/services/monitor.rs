//! The diff monitor: broker state changes in, bus events out.
//!
//! One long-lived task per broker session. Each diff runs through the change
//! detector, the resulting events are published to their per-type topics,
//! and every observed position breakdown is fed into the in-process cache
//! the order router splits against.
//!
//! Connection loss is handled in-loop: backoff per the reconnect policy,
//! reset the detector so the next diff re-baselines, and keep going. Only
//! shutdown, a closed diff stream, or an exhausted retry budget end the task.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::ports::{
    BreakdownCache, BrokerDiff, BrokerDiffPort, BrokerError, BusPublisherPort, topics,
};
use crate::application::services::change_detector::ChangeDetector;
use crate::application::services::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::domain::events::DomainEvent;
use crate::domain::shared::PortfolioId;
use crate::observability::{record_event_published, record_publish_failure, record_task_restart};

/// Long-running diff pump for one portfolio.
pub struct DiffMonitor<D, P, C>
where
    D: BrokerDiffPort,
    P: BusPublisherPort,
    C: BreakdownCache,
{
    portfolio_id: PortfolioId,
    diffs: Arc<D>,
    publisher: Arc<P>,
    breakdowns: Arc<C>,
    detector: ChangeDetector,
    reconnect: ReconnectPolicy,
    shutdown: CancellationToken,
}

impl<D, P, C> DiffMonitor<D, P, C>
where
    D: BrokerDiffPort,
    P: BusPublisherPort,
    C: BreakdownCache,
{
    /// Create a monitor bound to one broker session.
    pub fn new(
        portfolio_id: PortfolioId,
        diffs: Arc<D>,
        publisher: Arc<P>,
        breakdowns: Arc<C>,
        reconnect: ReconnectConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let detector = ChangeDetector::new(portfolio_id.clone());
        Self {
            portfolio_id,
            diffs,
            publisher,
            breakdowns,
            detector,
            reconnect: ReconnectPolicy::new(reconnect),
            shutdown,
        }
    }

    /// Drive the monitor until shutdown or a non-recoverable stream end.
    pub async fn run(mut self) {
        info!(portfolio_id = %self.portfolio_id, "diff monitor started");
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!(portfolio_id = %self.portfolio_id, "diff monitor shutting down");
                    break;
                }
                result = self.diffs.next_diff() => match result {
                    Ok(diff) => {
                        self.reconnect.reset();
                        self.handle_diff(&diff).await;
                    }
                    Err(BrokerError::Closed) => {
                        info!(portfolio_id = %self.portfolio_id, "diff stream closed");
                        break;
                    }
                    Err(e) => {
                        if !self.backoff(&e).await {
                            break;
                        }
                    }
                },
            }
        }
    }

    async fn handle_diff(&mut self, diff: &BrokerDiff) {
        let events = self.detector.observe(diff);
        debug!(
            portfolio_id = %self.portfolio_id,
            orders = diff.orders.len(),
            positions = diff.positions.len(),
            events = events.len(),
            "diff classified"
        );

        // Feed the split cache before publishing so a submit racing this diff
        // sees availability at least as fresh as the events it follows. Fed
        // from the emitted events so close-outs zero their entry too.
        for event in &events {
            if let DomainEvent::PositionUpdate(update) = event {
                self.breakdowns
                    .set(&self.portfolio_id, &update.symbol, update.breakdown.into());
            }
        }

        for event in events {
            self.publish(&event).await;
        }
    }

    async fn publish(&self, event: &DomainEvent) {
        let topic = match event {
            DomainEvent::OrderUpdate(_) => topics::ORDER_UPDATES,
            DomainEvent::PositionUpdate(_) => topics::POSITION_UPDATES,
            DomainEvent::AccountUpdate(_) => topics::ACCOUNT_UPDATES,
        };
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(topic, error = %e, "failed to serialize event");
                record_publish_failure(topic);
                return;
            }
        };
        match self.publisher.publish(topic, payload).await {
            Ok(()) => record_event_published(topic),
            Err(e) => {
                // The event is dropped; the next diff for the same entity
                // re-publishes full state, so consumers converge anyway.
                error!(topic, error = %e, "failed to publish event");
                record_publish_failure(topic);
            }
        }
    }

    /// Sleep out the backoff. Returns false when the task should end.
    async fn backoff(&mut self, cause: &BrokerError) -> bool {
        record_task_restart("monitor");
        let Some(delay) = self.reconnect.next_delay() else {
            error!(
                portfolio_id = %self.portfolio_id,
                attempts = self.reconnect.attempt_count(),
                error = %cause,
                "broker connection retries exhausted"
            );
            return false;
        };
        warn!(
            portfolio_id = %self.portfolio_id,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt = self.reconnect.attempt_count(),
            error = %cause,
            "broker connection lost, backing off"
        );

        tokio::select! {
            () = self.shutdown.cancelled() => return false,
            () = tokio::time::sleep(delay) => {}
        }

        // Orders may have changed during the outage; re-baseline so the
        // first post-reconnect diff replays full state.
        self.detector.reset();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::BusError;
    use crate::domain::order::{Direction, Offset, OrderStatus};
    use crate::domain::position::PositionBreakdown;
    use crate::domain::shared::{OrderId, Symbol, Timestamp};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves a fixed script of poll results, then reports the stream closed.
    struct ScriptedDiffs {
        script: Mutex<Vec<Result<BrokerDiff, BrokerError>>>,
    }

    impl ScriptedDiffs {
        fn new(mut script: Vec<Result<BrokerDiff, BrokerError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl BrokerDiffPort for ScriptedDiffs {
        async fn next_diff(&self) -> Result<BrokerDiff, BrokerError> {
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(BrokerError::Closed))
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl BusPublisherPort for RecordingPublisher {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingCache {
        entries: Mutex<HashMap<(PortfolioId, Symbol), PositionBreakdown>>,
    }

    impl BreakdownCache for RecordingCache {
        fn get(&self, portfolio_id: &PortfolioId, symbol: &Symbol) -> Option<PositionBreakdown> {
            self.entries
                .lock()
                .unwrap()
                .get(&(portfolio_id.clone(), symbol.clone()))
                .copied()
        }

        fn set(&self, portfolio_id: &PortfolioId, symbol: &Symbol, breakdown: PositionBreakdown) {
            self.entries
                .lock()
                .unwrap()
                .insert((portfolio_id.clone(), symbol.clone()), breakdown);
        }
    }

    fn fast_reconnect() -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts: 3,
        }
    }

    fn order_diff(id: &str, left: u32) -> BrokerDiff {
        let mut diff = BrokerDiff::default();
        diff.orders.insert(
            OrderId::new(id),
            crate::domain::order::OrderSnapshot {
                order_id: OrderId::new(id),
                exchange_order_id: None,
                symbol: Symbol::new("SHFE.rb2505"),
                direction: Direction::Buy,
                offset: Offset::Open,
                volume_orign: 10,
                volume_left: left,
                limit_price: None,
                status: OrderStatus::Alive,
                is_dead: false,
                is_error: false,
                trade_price: None,
                insert_date_time: Timestamp::now(),
            },
        );
        diff
    }

    fn monitor(
        script: Vec<Result<BrokerDiff, BrokerError>>,
        publisher: Arc<RecordingPublisher>,
        cache: Arc<RecordingCache>,
    ) -> DiffMonitor<ScriptedDiffs, RecordingPublisher, RecordingCache> {
        DiffMonitor::new(
            PortfolioId::new("pf-1"),
            Arc::new(ScriptedDiffs::new(script)),
            publisher,
            cache,
            fast_reconnect(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn publishes_order_events_and_stops_on_close() {
        let publisher = Arc::new(RecordingPublisher::default());
        let m = monitor(
            vec![Ok(order_diff("a", 10)), Ok(order_diff("a", 4))],
            Arc::clone(&publisher),
            Arc::default(),
        );

        m.run().await;

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert!(published.iter().all(|(t, _)| t == topics::ORDER_UPDATES));
        let second: serde_json::Value = serde_json::from_slice(&published[1].1).unwrap();
        assert_eq!(second["event_type"], "PARTIAL_FILL");
    }

    #[tokio::test]
    async fn positions_feed_the_breakdown_cache() {
        let cache = Arc::new(RecordingCache::default());
        let mut diff = BrokerDiff::default();
        diff.positions.insert(
            Symbol::new("SHFE.rb2505"),
            PositionBreakdown {
                pos_long_today: 5,
                pos_long_his: 2,
                pos_short_today: 0,
                pos_short_his: 0,
            },
        );

        monitor(vec![Ok(diff)], Arc::default(), Arc::clone(&cache))
            .run()
            .await;

        let cached = cache
            .get(&PortfolioId::new("pf-1"), &Symbol::new("SHFE.rb2505"))
            .unwrap();
        assert_eq!(cached.pos_long_today, 5);
    }

    #[tokio::test]
    async fn connection_error_backs_off_and_resumes() {
        let publisher = Arc::new(RecordingPublisher::default());
        let m = monitor(
            vec![
                Ok(order_diff("a", 10)),
                Err(BrokerError::ConnectionError {
                    message: "link down".to_string(),
                }),
                Ok(order_diff("a", 10)),
            ],
            Arc::clone(&publisher),
            Arc::default(),
        );

        m.run().await;

        // The detector re-baselined after the outage, so the re-sighting of
        // the unchanged order is a fresh NEW event, not silence.
        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        let second: serde_json::Value = serde_json::from_slice(&published[1].1).unwrap();
        assert_eq!(second["event_type"], "NEW");
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_ends_the_task() {
        let err = || {
            Err(BrokerError::ConnectionError {
                message: "link down".to_string(),
            })
        };
        let m = monitor(vec![err(), err(), err(), err()], Arc::default(), Arc::default());

        // Must terminate rather than spin forever.
        tokio::time::timeout(Duration::from_secs(5), m.run())
            .await
            .expect("monitor should stop after exhausting retries");
    }

    #[tokio::test]
    async fn shutdown_token_stops_the_loop() {
        let shutdown = CancellationToken::new();
        let m = DiffMonitor::new(
            PortfolioId::new("pf-1"),
            Arc::new(ScriptedDiffs::new(vec![])),
            Arc::new(RecordingPublisher::default()),
            Arc::new(RecordingCache::default()),
            fast_reconnect(),
            shutdown.clone(),
        );

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), m.run())
            .await
            .expect("monitor should exit on shutdown");
    }
}
