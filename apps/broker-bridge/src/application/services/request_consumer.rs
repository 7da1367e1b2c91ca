//! Inbound request consumer.
//!
//! Subscribes to the submit and cancel topics, decodes the request
//! envelopes, and drives the routing and cancel use cases. A failed request
//! is logged and dropped; the consumer itself only stops on shutdown or when
//! the bus closes the subscriptions.

use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{StreamExt, StreamMap};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::dto::InboundRequest;
use crate::application::ports::{
    BreakdownCache, BrokerCommandPort, BusConsumerPort, BusError, Delivery, OrderStorePort, topics,
};
use crate::application::use_cases::{CancelOrderUseCase, RouteOrderUseCase};

/// Consumer task for `order.submit` and `order.cancel`.
pub struct RequestConsumer<Bus, B, C, S>
where
    Bus: BusConsumerPort,
    B: BrokerCommandPort,
    C: BreakdownCache,
    S: OrderStorePort,
{
    consumer: Arc<Bus>,
    route_order: RouteOrderUseCase<B, C, S>,
    cancel_order: CancelOrderUseCase<B>,
    shutdown: CancellationToken,
}

impl<Bus, B, C, S> RequestConsumer<Bus, B, C, S>
where
    Bus: BusConsumerPort,
    B: BrokerCommandPort,
    C: BreakdownCache,
    S: OrderStorePort,
{
    /// Create the consumer.
    pub fn new(
        consumer: Arc<Bus>,
        route_order: RouteOrderUseCase<B, C, S>,
        cancel_order: CancelOrderUseCase<B>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            consumer,
            route_order,
            cancel_order,
            shutdown,
        }
    }

    /// Consume requests until shutdown.
    ///
    /// # Errors
    ///
    /// Returns the subscription error when a topic cannot be consumed.
    pub async fn run(self) -> Result<(), BusError> {
        let mut streams = StreamMap::new();
        for topic in [topics::ORDER_SUBMIT, topics::ORDER_CANCEL] {
            let receiver = self.consumer.consume(topic).await?;
            streams.insert(topic, ReceiverStream::new(receiver));
        }
        info!("request consumer started");

        loop {
            let next = tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("request consumer shutting down");
                    return Ok(());
                }
                next = streams.next() => next,
            };
            // The merged stream ends only once every topic is closed.
            let Some((_, delivery)) = next else {
                info!("request topics closed, consumer stopping");
                return Ok(());
            };
            self.process(delivery).await;
        }
    }

    /// Decode and dispatch one delivery. Dispatch follows the envelope tag,
    /// not the topic, so a misrouted request still does the right thing.
    async fn process(&self, delivery: Delivery) {
        let request = match serde_json::from_slice::<InboundRequest>(&delivery.payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(topic = %delivery.topic, error = %e, "undecodable request dropped");
                return;
            }
        };

        match request {
            InboundRequest::Submit {
                request_id,
                payload,
                ..
            } => match self.route_order.execute(payload).await {
                Ok(outcome) => {
                    info!(
                        request_id = %request_id,
                        legs = outcome.submitted.len(),
                        insufficient = outcome.insufficient_close_volume,
                        "submit request routed"
                    );
                }
                Err(e) => {
                    error!(request_id = %request_id, error = %e, "submit request failed");
                }
            },
            InboundRequest::Cancel {
                request_id,
                payload,
                ..
            } => {
                if let Err(e) = self.cancel_order.execute(payload).await {
                    error!(request_id = %request_id, error = %e, "cancel request failed");
                }
            }
        }
    }
}
