//! Classification of broker state diffs into domain events.
//!
//! The broker port yields full post-change snapshots, never deltas. The
//! detector keeps the previously observed snapshot per order and per account
//! and classifies each new snapshot against it:
//!
//! - `volume_left` decreased to zero: `COMPLETE_FILL` (terminal).
//! - `volume_left` decreased but stays positive: `PARTIAL_FILL`.
//! - ALIVE to FINISHED with no fill: `CANCELLED`, or `REJECTED` when the
//!   broker error flag is set.
//! - First sighting of an order: `NEW`, before any coalesced fill events.
//!
//! A single diff may coalesce a fill and a terminal transition; the fill
//! event is emitted first and exactly one terminal event per order lifecycle
//! follows. A dropped snapshot never becomes last-seen state, and closed
//! lifecycles keep only their id so the per-order maps stay bounded. Positions are emitted unconditionally for every symbol present
//! in the diff, and a tracked symbol missing from a position-bearing diff is
//! reported as a flat close-out. Account state is emitted only on exact
//! change.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::application::ports::BrokerDiff;
use crate::domain::account::AccountSnapshot;
use crate::domain::events::{
    AccountUpdate, BreakdownWire, DomainEvent, OrderEventKind, OrderUpdate, PositionUpdate,
};
use crate::domain::order::OrderSnapshot;
use crate::domain::position::PositionBreakdown;
use crate::domain::shared::{OrderId, PortfolioId, Symbol, Timestamp};
use crate::observability::{record_dropped_snapshot, record_order_event};

/// Stateful diff classifier for one portfolio.
///
/// Owns its previous-state maps; never shared. The monitor loop drives one
/// detector per broker session and resets it on reconnect so the first diff
/// after resubscription re-baselines every order.
#[derive(Debug)]
pub struct ChangeDetector {
    portfolio_id: PortfolioId,
    orders: HashMap<OrderId, OrderSnapshot>,
    finished: HashSet<OrderId>,
    tracked_positions: HashSet<Symbol>,
    account: Option<AccountSnapshot>,
}

impl ChangeDetector {
    /// Create an empty detector for a portfolio.
    #[must_use]
    pub fn new(portfolio_id: PortfolioId) -> Self {
        Self {
            portfolio_id,
            orders: HashMap::new(),
            finished: HashSet::new(),
            tracked_positions: HashSet::new(),
            account: None,
        }
    }

    /// Drop all remembered state.
    ///
    /// Called on broker reconnect: the next diff then re-baselines, which
    /// may re-emit events for orders that changed during the outage. The
    /// persistence side tolerates that by upserting full state.
    pub fn reset(&mut self) {
        self.orders.clear();
        self.finished.clear();
        self.tracked_positions.clear();
        self.account = None;
    }

    /// Classify one diff into zero or more domain events.
    ///
    /// Pure with respect to the outside world; the only side effect is the
    /// internal previous-state update.
    pub fn observe(&mut self, diff: &BrokerDiff) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        let now = Timestamp::now();

        for (order_id, snapshot) in &diff.orders {
            if !snapshot.is_well_formed() {
                warn!(
                    order_id = %order_id,
                    volume_orign = snapshot.volume_orign,
                    volume_left = snapshot.volume_left,
                    is_dead = snapshot.is_dead,
                    status = %snapshot.status,
                    "dropping malformed order snapshot"
                );
                record_dropped_snapshot("malformed");
                continue;
            }
            // A snapshot the classifier rejects must not become last-seen
            // state, or the emitted volume_left could regress afterwards.
            if self.classify_order(snapshot, now, &mut events) {
                if snapshot.status.is_terminal() || snapshot.volume_left == 0 {
                    // Lifecycle closed; only the id is kept so a re-reported
                    // closing snapshot cannot emit a second terminal event.
                    self.orders.remove(order_id);
                    self.finished.insert(order_id.clone());
                } else {
                    self.orders.insert(order_id.clone(), snapshot.clone());
                }
            }
        }

        // A non-empty positions map is the full book; a symbol we tracked
        // that no longer appears has been closed out and is reported flat.
        if !diff.positions.is_empty() {
            for (symbol, breakdown) in &diff.positions {
                events.push(self.position_event(symbol.clone(), *breakdown, now));
            }

            let closed: Vec<Symbol> = self
                .tracked_positions
                .iter()
                .filter(|symbol| !diff.positions.contains_key(*symbol))
                .cloned()
                .collect();
            for symbol in closed {
                debug!(symbol = %symbol, "position closed out");
                self.tracked_positions.remove(&symbol);
                events.push(self.position_event(symbol, PositionBreakdown::zero(), now));
            }

            self.tracked_positions
                .extend(diff.positions.keys().cloned());
        }

        if let Some(account) = &diff.account
            && self.account.as_ref() != Some(account)
        {
            events.push(DomainEvent::AccountUpdate(AccountUpdate {
                timestamp: now,
                portfolio_id: self.portfolio_id.clone(),
                account: account.clone(),
            }));
            self.account = Some(account.clone());
        }

        events
    }

    fn position_event(
        &self,
        symbol: Symbol,
        breakdown: PositionBreakdown,
        now: Timestamp,
    ) -> DomainEvent {
        DomainEvent::PositionUpdate(PositionUpdate {
            timestamp: now,
            portfolio_id: self.portfolio_id.clone(),
            symbol,
            net_position: breakdown.net(),
            breakdown: BreakdownWire::from(breakdown),
        })
    }

    /// Classify one admissible snapshot, pushing its events.
    ///
    /// Returns whether the snapshot may replace the last-seen state; dropped
    /// snapshots (regressions, re-reported terminals) return `false`.
    fn classify_order(
        &self,
        snapshot: &OrderSnapshot,
        now: Timestamp,
        events: &mut Vec<DomainEvent>,
    ) -> bool {
        if self.finished.contains(&snapshot.order_id) {
            // Lifecycle already closed; at most log repeated terminal diffs.
            debug!(order_id = %snapshot.order_id, "ignoring diff for terminal order");
            return false;
        }

        let previous = self.orders.get(&snapshot.order_id);

        // An unseen order diffs against its own requested volume, so a first
        // sighting that already carries fills still produces fill events.
        let previous_left = previous.map_or(snapshot.volume_orign, |p| p.volume_left);

        if snapshot.volume_left > previous_left {
            warn!(
                order_id = %snapshot.order_id,
                previous_left,
                volume_left = snapshot.volume_left,
                "dropping order snapshot with increased volume_left"
            );
            record_dropped_snapshot("volume_regression");
            return false;
        }

        if previous.is_none() {
            self.push_order_event(snapshot, OrderEventKind::New, now, events);
        }

        let fill = previous_left - snapshot.volume_left;
        let became_terminal = snapshot.status.is_terminal();

        if fill > 0 && snapshot.volume_left == 0 {
            // A complete fill is itself the terminal event.
            self.push_order_event(snapshot, OrderEventKind::CompleteFill, now, events);
            return true;
        }
        if fill > 0 {
            self.push_order_event(snapshot, OrderEventKind::PartialFill, now, events);
        }
        if became_terminal {
            let kind = if snapshot.is_error {
                OrderEventKind::Rejected
            } else {
                OrderEventKind::Cancelled
            };
            self.push_order_event(snapshot, kind, now, events);
        }
        true
    }

    fn push_order_event(
        &self,
        snapshot: &OrderSnapshot,
        kind: OrderEventKind,
        now: Timestamp,
        events: &mut Vec<DomainEvent>,
    ) {
        record_order_event(kind.as_str());
        events.push(DomainEvent::OrderUpdate(OrderUpdate {
            timestamp: now,
            portfolio_id: self.portfolio_id.clone(),
            order_id: snapshot.order_id.clone(),
            exchange_order_id: snapshot.exchange_order_id.clone(),
            symbol: snapshot.symbol.clone(),
            direction: snapshot.direction,
            offset: snapshot.offset,
            status: snapshot.status,
            event_type: kind,
            volume_orign: snapshot.volume_orign,
            volume_left: snapshot.volume_left,
            filled_quantity: snapshot.filled_quantity(),
            limit_price: snapshot.limit_price,
            trade_price: snapshot.trade_price,
            insert_date_time: snapshot.insert_date_time,
        }));
    }
}
