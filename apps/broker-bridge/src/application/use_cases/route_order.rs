//! Route Order Use Case
//!
//! Validates one inbound submit request, rewrites close orders for
//! CLOSETODAY exchanges, records the submit-time rows, and forwards every leg
//! to the broker.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::application::dto::{SubmitPayload, ValidationError};
use crate::application::ports::{
    BreakdownCache, BrokerCommandPort, BrokerError, BrokerOrder, OrderRecord, OrderStorePort,
};
use crate::application::services::splitter::{requires_closetoday, split_close};
use crate::domain::order::Offset;
use crate::domain::position::PositionBreakdown;
use crate::domain::shared::{OrderId, Timestamp};
use crate::observability::{record_close_split, record_order_submission};

/// Routing error.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The request failed field validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The broker refused a leg.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// What one submit request turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Broker order ids actually submitted, in submission order.
    pub submitted: Vec<OrderId>,
    /// A close leg was force-routed without full cached backing.
    pub insufficient_close_volume: bool,
}

/// Use case for routing one submit request to the broker.
pub struct RouteOrderUseCase<B, C, S>
where
    B: BrokerCommandPort,
    C: BreakdownCache,
    S: OrderStorePort,
{
    broker: Arc<B>,
    breakdowns: Arc<C>,
    order_store: Arc<S>,
}

impl<B, C, S> RouteOrderUseCase<B, C, S>
where
    B: BrokerCommandPort,
    C: BreakdownCache,
    S: OrderStorePort,
{
    /// Create a new `RouteOrderUseCase`.
    pub fn new(broker: Arc<B>, breakdowns: Arc<C>, order_store: Arc<S>) -> Self {
        Self {
            broker,
            breakdowns,
            order_store,
        }
    }

    /// Execute the use case.
    ///
    /// Submission is sequential per leg; a broker rejection of the first leg
    /// stops the second, since submitting the historical leg after a failed
    /// today leg would close the wrong lots.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Validation`] for malformed requests and
    /// [`RouteError::Broker`] when the broker refuses a leg.
    pub async fn execute(&self, payload: SubmitPayload) -> Result<RouteOutcome, RouteError> {
        if let Err(e) = payload.validate() {
            record_order_submission(payload.offset.to_string().as_str(), "invalid");
            return Err(e.into());
        }

        // Redelivery guard: the submit topic is at-least-once, and a second
        // delivery must not reach the broker again. The whole request is
        // deduplicated, never individual legs: a replayed split close would
        // re-plan against a breakdown the first delivery's fills have since
        // changed, and routing the recomputed remainder over-closes.
        if self.already_routed(&payload.order_id).await {
            record_order_submission(payload.offset.to_string().as_str(), "duplicate");
            warn!(order_id = %payload.order_id, "duplicate submit request ignored");
            return Ok(RouteOutcome {
                submitted: Vec::new(),
                insufficient_close_volume: false,
            });
        }

        let (legs, insufficient) = self.plan_legs(&payload);
        let submitted_at = Timestamp::now();
        let mut submitted = Vec::with_capacity(legs.len());

        for leg in legs {
            // Submit-time insert: the row exists before the first diff echoes
            // the order, so downstream readers never see fills for an unknown
            // id. Persistence failure must not block the submission itself.
            let record = OrderRecord::pending(
                leg.order_id.clone(),
                payload.portfolio_id.clone(),
                leg.symbol.clone(),
                leg.direction,
                leg.offset,
                leg.volume,
                leg.limit_price,
                submitted_at,
            );
            if let Err(e) = self.order_store.upsert_order(record).await {
                error!(order_id = %leg.order_id, error = %e, "failed to insert pending order row");
            }

            let offset_label = leg.offset.to_string();
            match self.broker.submit(leg.clone()).await {
                Ok(()) => {
                    record_order_submission(&offset_label, "submitted");
                    info!(
                        order_id = %leg.order_id,
                        symbol = %leg.symbol,
                        offset = %leg.offset,
                        volume = leg.volume,
                        "order submitted"
                    );
                    submitted.push(leg.order_id);
                }
                Err(e) => {
                    record_order_submission(&offset_label, "rejected");
                    error!(order_id = %leg.order_id, error = %e, "broker refused order");
                    return Err(e.into());
                }
            }
        }

        Ok(RouteOutcome {
            submitted,
            insufficient_close_volume: insufficient,
        })
    }

    /// Whether any row from an earlier delivery of this request exists.
    ///
    /// Legs persist under the request id or its derived split ids, so all
    /// three are checked regardless of how a fresh plan would split today.
    /// A rejected request keeps its pending rows; resubmission needs a new
    /// id.
    async fn already_routed(&self, order_id: &OrderId) -> bool {
        let candidates = [
            order_id.clone(),
            order_id.derive_closetoday(),
            order_id.derive_close(),
        ];
        for id in &candidates {
            match self.order_store.get_order(id).await {
                Ok(Some(_)) => return true,
                Ok(None) => {}
                Err(e) => {
                    error!(order_id = %id, error = %e, "order lookup failed, routing anyway");
                }
            }
        }
        false
    }

    /// Rewrite the request into broker legs.
    ///
    /// Only a plain CLOSE on a split-rule exchange is rewritten; OPEN and an
    /// explicit CLOSETODAY pass through under the original id.
    fn plan_legs(&self, payload: &SubmitPayload) -> (Vec<BrokerOrder>, bool) {
        if payload.offset != Offset::Close || !requires_closetoday(&payload.symbol) {
            let leg = BrokerOrder {
                order_id: payload.order_id.clone(),
                symbol: payload.symbol.clone(),
                direction: payload.direction,
                offset: payload.offset,
                volume: payload.volume,
                limit_price: payload.limit_price,
            };
            return (vec![leg], false);
        }

        // Missing cache entry reads as a flat book: the whole volume is
        // force-routed to the historical side and flagged.
        let breakdown = self
            .breakdowns
            .get(&payload.portfolio_id, &payload.symbol)
            .unwrap_or_else(PositionBreakdown::zero);
        let plan = split_close(payload, breakdown);
        record_close_split(plan.insufficient);
        if plan.insufficient {
            warn!(
                order_id = %payload.order_id,
                symbol = %payload.symbol,
                volume = payload.volume,
                covered = plan.covered_volume,
                "close volume exceeds cached availability, force-routing remainder"
            );
        }

        let legs = plan
            .sub_orders
            .into_iter()
            .map(|sub| BrokerOrder {
                order_id: sub.order_id,
                symbol: payload.symbol.clone(),
                direction: payload.direction,
                offset: sub.offset,
                volume: sub.volume,
                limit_price: payload.limit_price,
            })
            .collect();
        (legs, plan.insufficient)
    }
}
