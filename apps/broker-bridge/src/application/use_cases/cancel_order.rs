//! Cancel Order Use Case
//!
//! Forwards a cancel request to the broker after field validation only. No
//! local order-state check happens here: the local view lags the broker, so
//! whether the order is unknown or already terminal is the broker's call.
//! The outcome arrives through the diff stream like any other change.

use std::sync::Arc;

use tracing::{error, info};

use crate::application::dto::{CancelPayload, ValidationError};
use crate::application::ports::{BrokerCommandPort, BrokerError};
use crate::observability::record_order_cancel;

/// Cancel error.
#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    /// The request failed field validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The broker refused the cancel command.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Use case for forwarding cancel requests to the broker.
pub struct CancelOrderUseCase<B>
where
    B: BrokerCommandPort,
{
    broker: Arc<B>,
}

impl<B> CancelOrderUseCase<B>
where
    B: BrokerCommandPort,
{
    /// Create a new `CancelOrderUseCase`.
    pub fn new(broker: Arc<B>) -> Self {
        Self { broker }
    }

    /// Execute the use case.
    ///
    /// # Errors
    ///
    /// Returns [`CancelError::Validation`] for an empty order id and
    /// [`CancelError::Broker`] when the broker refuses the command.
    pub async fn execute(&self, payload: CancelPayload) -> Result<(), CancelError> {
        if let Err(e) = payload.validate() {
            record_order_cancel("invalid");
            return Err(e.into());
        }

        match self.broker.cancel(&payload.order_id).await {
            Ok(()) => {
                record_order_cancel("forwarded");
                info!(order_id = %payload.order_id, "cancel forwarded to broker");
                Ok(())
            }
            Err(e) => {
                record_order_cancel("rejected");
                error!(order_id = %payload.order_id, error = %e, "broker refused cancel");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::BrokerOrder;
    use crate::domain::shared::{OrderId, PortfolioId};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockBroker {
        reject: bool,
        cancelled: Mutex<Vec<OrderId>>,
    }

    #[async_trait]
    impl BrokerCommandPort for MockBroker {
        async fn submit(&self, _order: BrokerOrder) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn cancel(&self, order_id: &OrderId) -> Result<(), BrokerError> {
            if self.reject {
                return Err(BrokerError::ConnectionError {
                    message: "link down".to_string(),
                });
            }
            self.cancelled.lock().unwrap().push(order_id.clone());
            Ok(())
        }
    }

    fn broker(reject: bool) -> Arc<MockBroker> {
        Arc::new(MockBroker {
            reject,
            cancelled: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn cancel_forwards_without_local_state_check() {
        let broker = broker(false);
        let uc = CancelOrderUseCase::new(Arc::clone(&broker));

        // The order was never submitted through this process; the request is
        // still forwarded verbatim.
        uc.execute(CancelPayload {
            order_id: OrderId::new("unknown-ord"),
            portfolio_id: PortfolioId::new("pf-1"),
        })
        .await
        .unwrap();

        assert_eq!(
            *broker.cancelled.lock().unwrap(),
            vec![OrderId::new("unknown-ord")]
        );
    }

    #[tokio::test]
    async fn empty_order_id_is_invalid() {
        let broker = broker(false);
        let uc = CancelOrderUseCase::new(Arc::clone(&broker));

        let err = uc
            .execute(CancelPayload {
                order_id: OrderId::new(""),
                portfolio_id: PortfolioId::new("pf-1"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CancelError::Validation(_)));
        assert!(broker.cancelled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn broker_refusal_surfaces() {
        let uc = CancelOrderUseCase::new(broker(true));

        let err = uc
            .execute(CancelPayload {
                order_id: OrderId::new("ord-1"),
                portfolio_id: PortfolioId::new("pf-1"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CancelError::Broker(_)));
    }
}
