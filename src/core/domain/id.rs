//! Newtype identifiers used throughout the core.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::new_v4()))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(MarketId, "market");
string_id!(TokenId, "token");
string_id!(ConditionId, "cond");
string_id!(OrderId, "order");
string_id!(ClientOrderId, "corder");
string_id!(FillId, "fill");
string_id!(PositionId, "pos");
string_id!(SignalId, "sig");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrips_raw_value() {
        let id = MarketId::new("market-123");
        assert_eq!(id.as_str(), "market-123");
        assert_eq!(format!("{id}"), "market-123");
    }

    #[test]
    fn generate_is_prefixed_and_unique() {
        let a = SignalId::generate();
        let b = SignalId::generate();
        assert!(a.as_str().starts_with("sig-"));
        assert_ne!(a, b);
    }
}
