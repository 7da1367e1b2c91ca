//! Inbound request envelopes and their synchronous validation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::{Direction, Offset};
use crate::domain::shared::{OrderId, PortfolioId, RequestId, Symbol, Timestamp};

/// Validation error for a malformed request. Rejected synchronously; a
/// request that fails validation never enters the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field is empty.
    #[error("Field '{field}' must not be empty")]
    EmptyField {
        /// The offending field name.
        field: &'static str,
    },

    /// Volume must be a positive contract count.
    #[error("Volume must be positive, got {volume}")]
    NonPositiveVolume {
        /// The requested volume.
        volume: u32,
    },

    /// Limit price, when present, must be positive.
    #[error("Limit price must be positive, got {price}")]
    NonPositivePrice {
        /// The requested price.
        price: Decimal,
    },
}

/// Payload of a submit request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitPayload {
    /// Contract symbol.
    pub symbol: Symbol,
    /// Buy or sell.
    pub direction: Direction,
    /// Position effect.
    pub offset: Offset,
    /// Contracts to trade.
    pub volume: u32,
    /// Limit price; absent means a market order.
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Caller-assigned order id.
    pub order_id: OrderId,
    /// Owning portfolio.
    pub portfolio_id: PortfolioId,
}

impl SubmitPayload {
    /// Validate the payload fields.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.is_empty() {
            return Err(ValidationError::EmptyField { field: "symbol" });
        }
        if self.order_id.is_empty() {
            return Err(ValidationError::EmptyField { field: "order_id" });
        }
        if self.portfolio_id.is_empty() {
            return Err(ValidationError::EmptyField {
                field: "portfolio_id",
            });
        }
        if self.volume == 0 {
            return Err(ValidationError::NonPositiveVolume { volume: 0 });
        }
        if let Some(price) = self.limit_price
            && price <= Decimal::ZERO
        {
            return Err(ValidationError::NonPositivePrice { price });
        }
        Ok(())
    }
}

/// Payload of a cancel request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPayload {
    /// The order to cancel.
    pub order_id: OrderId,
    /// Owning portfolio.
    pub portfolio_id: PortfolioId,
}

impl CancelPayload {
    /// Validate the payload fields.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order_id.is_empty() {
            return Err(ValidationError::EmptyField { field: "order_id" });
        }
        Ok(())
    }
}

/// Envelope for inbound requests from external callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundRequest {
    /// Place an order.
    Submit {
        /// Caller request id, stable across redelivery.
        request_id: RequestId,
        /// Caller timestamp.
        timestamp: Timestamp,
        /// The order to place.
        payload: SubmitPayload,
    },
    /// Cancel an order.
    Cancel {
        /// Caller request id.
        request_id: RequestId,
        /// Caller timestamp.
        timestamp: Timestamp,
        /// The cancellation target.
        payload: CancelPayload,
    },
}
