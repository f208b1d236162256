//! Plain string and UUID identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::IdError;

/// Identifier of a roaming network, e.g. `Prod` or `QA`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoamingNetworkId(String);

impl RoamingNetworkId {
    pub fn parse(text: &str) -> Result<Self, IdError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(IdError::Empty {
                kind: "roaming network id",
            });
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a charging tariff, unique per operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChargingTariffId(String);

impl ChargingTariffId {
    pub fn parse(text: &str) -> Result<Self, IdError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(IdError::Empty {
                kind: "charging tariff id",
            });
        }
        if text.chars().any(char::is_whitespace) {
            return Err(IdError::malformed("charging tariff id", text));
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_id_conversions {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

string_id_conversions!(RoamingNetworkId);
string_id_conversions!(ChargingTariffId);

/// Correlates everything a single operation caused: status pushes,
/// events and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTrackingId(Uuid);

impl EventTrackingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventTrackingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventTrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roaming_network_id_trims_and_rejects_empty() {
        assert_eq!(RoamingNetworkId::parse(" Prod ").unwrap().as_str(), "Prod");
        assert!(RoamingNetworkId::parse("").is_err());
    }

    #[test]
    fn tariff_id_rejects_whitespace() {
        assert!(ChargingTariffId::parse("AC 1").is_err());
        let id: ChargingTariffId = serde_json::from_str("\"AC1\"").unwrap();
        assert_eq!(id.to_string(), "AC1");
        assert!(serde_json::from_str::<ChargingTariffId>("\"\"").is_err());
    }

    #[test]
    fn event_tracking_ids_are_unique() {
        assert_ne!(EventTrackingId::new(), EventTrackingId::new());
    }
}
