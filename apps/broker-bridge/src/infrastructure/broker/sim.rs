//! Simulated broker connection.
//!
//! Implements both broker ports against an internal book: every accepted
//! order is echoed as an ALIVE snapshot, then filled completely in the next
//! diff, with positions and account adjusted. Used by the dev wiring and
//! the end-to-end tests; fill behavior is deliberately simple (one full
//! fill per order, at the limit price or the seeded mark price).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use crate::application::ports::{
    BrokerCommandPort, BrokerDiff, BrokerDiffPort, BrokerError, BrokerOrder,
};
use crate::domain::account::AccountSnapshot;
use crate::domain::order::{Direction, Offset, OrderSnapshot, OrderStatus};
use crate::domain::position::PositionBreakdown;
use crate::domain::shared::{OrderId, Symbol, Timestamp};

#[derive(Debug, Default)]
struct SimState {
    orders: HashMap<OrderId, OrderSnapshot>,
    positions: HashMap<Symbol, PositionBreakdown>,
    account: AccountSnapshot,
    mark_price: Decimal,
}

/// In-process broker double.
#[derive(Debug)]
pub struct SimBroker {
    state: Mutex<SimState>,
    diff_tx: mpsc::UnboundedSender<BrokerDiff>,
    diff_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<BrokerDiff>>,
}

impl SimBroker {
    /// Create a broker with an empty book.
    #[must_use]
    pub fn new() -> Self {
        let (diff_tx, diff_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(SimState {
                mark_price: Decimal::new(3500, 0),
                ..SimState::default()
            }),
            diff_tx,
            diff_rx: tokio::sync::Mutex::new(diff_rx),
        }
    }

    /// Seed a position before the session starts and emit it as a diff,
    /// the way a reconnecting session replays its current book.
    pub fn seed_position(&self, symbol: Symbol, breakdown: PositionBreakdown) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.positions.insert(symbol, breakdown);
        let mut diff = BrokerDiff::default();
        diff.positions.clone_from(&state.positions);
        diff.account = Some(state.account.clone());
        let _ = self.diff_tx.send(diff);
    }

    /// Seed the account state and emit it.
    pub fn seed_account(&self, account: AccountSnapshot) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.account = account.clone();
        let mut diff = BrokerDiff::default();
        diff.account = Some(account);
        let _ = self.diff_tx.send(diff);
    }

    fn emit_order(&self, snapshot: &OrderSnapshot, state: &SimState, include_book: bool) {
        let mut diff = BrokerDiff::default();
        diff.orders
            .insert(snapshot.order_id.clone(), snapshot.clone());
        if include_book {
            diff.positions.clone_from(&state.positions);
            diff.account = Some(state.account.clone());
        }
        let _ = self.diff_tx.send(diff);
    }

    fn apply_fill(state: &mut SimState, order: &BrokerOrder) {
        let breakdown = state.positions.entry(order.symbol.clone()).or_default();
        match (order.offset, order.direction) {
            (Offset::Open, Direction::Buy) => breakdown.pos_long_today += order.volume,
            (Offset::Open, Direction::Sell) => breakdown.pos_short_today += order.volume,
            (Offset::CloseToday, Direction::Sell) => {
                breakdown.pos_long_today = breakdown.pos_long_today.saturating_sub(order.volume);
            }
            (Offset::CloseToday, Direction::Buy) => {
                breakdown.pos_short_today = breakdown.pos_short_today.saturating_sub(order.volume);
            }
            (Offset::Close, Direction::Sell) => {
                let from_his = order.volume.min(breakdown.pos_long_his);
                breakdown.pos_long_his -= from_his;
                breakdown.pos_long_today = breakdown
                    .pos_long_today
                    .saturating_sub(order.volume - from_his);
            }
            (Offset::Close, Direction::Buy) => {
                let from_his = order.volume.min(breakdown.pos_short_his);
                breakdown.pos_short_his -= from_his;
                breakdown.pos_short_today = breakdown
                    .pos_short_today
                    .saturating_sub(order.volume - from_his);
            }
        }
    }
}

impl Default for SimBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerCommandPort for SimBroker {
    async fn submit(&self, order: BrokerOrder) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.orders.contains_key(&order.order_id) {
            return Err(BrokerError::CommandRejected {
                reason: format!("duplicate order id {}", order.order_id),
            });
        }

        let fill_price = order.limit_price.unwrap_or(state.mark_price);
        let alive = OrderSnapshot {
            order_id: order.order_id.clone(),
            exchange_order_id: None,
            symbol: order.symbol.clone(),
            direction: order.direction,
            offset: order.offset,
            volume_orign: order.volume,
            volume_left: order.volume,
            limit_price: order.limit_price,
            status: OrderStatus::Alive,
            is_dead: false,
            is_error: false,
            trade_price: None,
            insert_date_time: Timestamp::now(),
        };
        state.orders.insert(order.order_id.clone(), alive.clone());
        self.emit_order(&alive, &state, false);

        // Immediate complete fill in a follow-up diff.
        let mut filled = alive;
        filled.volume_left = 0;
        filled.status = OrderStatus::Finished;
        filled.is_dead = true;
        filled.trade_price = Some(fill_price);
        Self::apply_fill(&mut state, &order);
        state.orders.insert(order.order_id.clone(), filled.clone());
        self.emit_order(&filled, &state, true);

        Ok(())
    }

    async fn cancel(&self, order_id: &OrderId) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(snapshot) = state.orders.get(order_id) else {
            // Unknown id: the real connection acknowledges and does nothing.
            return Ok(());
        };
        if snapshot.status.is_terminal() {
            return Ok(());
        }

        let mut cancelled = snapshot.clone();
        cancelled.status = OrderStatus::Finished;
        cancelled.is_dead = true;
        state.orders.insert(order_id.clone(), cancelled.clone());
        self.emit_order(&cancelled, &state, false);
        Ok(())
    }
}

#[async_trait]
impl BrokerDiffPort for SimBroker {
    async fn next_diff(&self) -> Result<BrokerDiff, BrokerError> {
        let mut rx = self.diff_rx.lock().await;
        rx.recv().await.ok_or(BrokerError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(id: &str, offset: Offset, direction: Direction, volume: u32) -> BrokerOrder {
        BrokerOrder {
            order_id: OrderId::new(id),
            symbol: Symbol::new("SHFE.rb2505"),
            direction,
            offset,
            volume,
            limit_price: Some(dec!(3500)),
        }
    }

    #[tokio::test]
    async fn submit_emits_alive_then_filled() {
        let broker = SimBroker::new();
        broker
            .submit(order("a", Offset::Open, Direction::Buy, 10))
            .await
            .unwrap();

        let first = broker.next_diff().await.unwrap();
        let alive = &first.orders[&OrderId::new("a")];
        assert_eq!(alive.status, OrderStatus::Alive);
        assert_eq!(alive.volume_left, 10);

        let second = broker.next_diff().await.unwrap();
        let filled = &second.orders[&OrderId::new("a")];
        assert_eq!(filled.status, OrderStatus::Finished);
        assert_eq!(filled.volume_left, 0);
        assert_eq!(filled.trade_price, Some(dec!(3500)));
        assert_eq!(
            second.positions[&Symbol::new("SHFE.rb2505")].pos_long_today,
            10
        );
    }

    #[tokio::test]
    async fn close_consumes_historical_before_today() {
        let broker = SimBroker::new();
        broker.seed_position(
            Symbol::new("SHFE.rb2505"),
            PositionBreakdown {
                pos_long_today: 5,
                pos_long_his: 3,
                pos_short_today: 0,
                pos_short_his: 0,
            },
        );
        let _ = broker.next_diff().await.unwrap();

        broker
            .submit(order("c", Offset::Close, Direction::Sell, 4))
            .await
            .unwrap();
        let _ = broker.next_diff().await.unwrap();
        let filled = broker.next_diff().await.unwrap();

        let breakdown = filled.positions[&Symbol::new("SHFE.rb2505")];
        assert_eq!(breakdown.pos_long_his, 0);
        assert_eq!(breakdown.pos_long_today, 4);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let broker = SimBroker::new();
        broker
            .submit(order("a", Offset::Open, Direction::Buy, 1))
            .await
            .unwrap();
        let err = broker
            .submit(order("a", Offset::Open, Direction::Buy, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::CommandRejected { .. }));
    }

    #[tokio::test]
    async fn cancel_of_unknown_order_is_acknowledged() {
        let broker = SimBroker::new();
        broker.cancel(&OrderId::new("nope")).await.unwrap();
    }
}
