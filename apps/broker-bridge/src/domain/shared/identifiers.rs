//! Strongly-typed identifiers for domain entities.
//!
//! These prevent mixing up IDs from different contexts.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a new unique identifier using UUID v4.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }

            /// True when the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(
    OrderId,
    "Caller-assigned order identifier, globally unique per portfolio."
);
define_id!(
    ExchangeOrderId,
    "Exchange-assigned order identifier, set late in the order lifecycle."
);
define_id!(PortfolioId, "Identifier for a trading portfolio.");
define_id!(RequestId, "Identifier for an inbound submit/cancel request.");

impl OrderId {
    /// Derive the deterministic sub-order id for the today-side leg of a
    /// split close order.
    #[must_use]
    pub fn derive_closetoday(&self) -> Self {
        Self(format!("{}_closetoday", self.0))
    }

    /// Derive the deterministic sub-order id for the historical-side leg of a
    /// split close order.
    #[must_use]
    pub fn derive_close(&self) -> Self {
        Self(format!("{}_close", self.0))
    }
}
