//! Symbol value object for futures contract identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A futures contract symbol in `EXCHANGE.contract` form.
///
/// Examples:
/// - "SHFE.rb2505" (Shanghai rebar)
/// - "DCE.m2505" (Dalian soybean meal)
/// - "INE.sc2506" (INE crude)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Extract the exchange prefix, the part before the first dot.
    ///
    /// Returns an empty string when the symbol carries no exchange prefix.
    #[must_use]
    pub fn exchange(&self) -> &str {
        self.0.split_once('.').map_or("", |(exchange, _)| exchange)
    }

    /// True when the symbol is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self(value)
    }
}
