//! Operator-scoped infrastructure identifiers
//!
//! Charging pools, charging stations and EVSEs are identified relative to
//! their operator:
//!
//! ```text
//! ISO   DE*GEF*P123   DE*GEF*S123   DE*GEF*E123*1   (or DEGEFE1231)
//! DIN   +49*822*P123  +49*822*S123  +49*822*123*1
//! ```
//!
//! DIN EVSE ids carry no `E` marker and a numeric suffix.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::operator_id::{ChargingStationOperatorId, OperatorIdFormat, DIN_PATTERN, ISO_PATTERN};
use crate::domain::error::IdError;

const MAX_SUFFIX_LEN: usize = 48;

macro_rules! operator_scoped_id {
    ($(#[$meta:meta])* $name:ident, marker = $marker:literal, kind = $kind:literal, din_marker = $din_marker:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            operator_id: ChargingStationOperatorId,
            suffix: String,
        }

        impl $name {
            pub const MARKER: &'static str = $marker;

            pub fn new(operator_id: ChargingStationOperatorId, suffix: &str) -> Result<Self, IdError> {
                let suffix = suffix.trim().to_ascii_uppercase();
                let numeric_only = operator_id.format().is_din() && !$din_marker;
                let valid = !suffix.is_empty()
                    && suffix.len() <= MAX_SUFFIX_LEN
                    && !suffix.starts_with('*')
                    && suffix.chars().all(|c| {
                        c == '*' || if numeric_only { c.is_ascii_digit() } else { c.is_ascii_alphanumeric() }
                    });
                if !valid {
                    return Err(IdError::malformed($kind, suffix));
                }
                Ok(Self { operator_id, suffix })
            }

            pub fn parse(text: &str) -> Result<Self, IdError> {
                static ISO: Lazy<Regex> = Lazy::new(|| {
                    Regex::new(&format!(r"^{}\*?{}([A-Za-z0-9][A-Za-z0-9*]*)$", ISO_PATTERN, $marker))
                        .expect("valid regex")
                });
                static DIN: Lazy<Regex> = Lazy::new(|| {
                    let marker = if $din_marker { $marker } else { "" };
                    Regex::new(&format!(r"^{}\*{}([A-Za-z0-9][A-Za-z0-9*]*)$", DIN_PATTERN, marker))
                        .expect("valid regex")
                });

                let text = text.trim();
                if text.is_empty() {
                    return Err(IdError::Empty { kind: $kind });
                }
                if let Some(caps) = DIN.captures(text) {
                    let operator_id = ChargingStationOperatorId::from_din_captures(&caps[1], &caps[2])?;
                    return Self::new(operator_id, &caps[3]);
                }
                if let Some(caps) = ISO.captures(text) {
                    let operator_id =
                        ChargingStationOperatorId::from_iso_captures(&caps[1], &caps[2], &caps[3])?;
                    return Self::new(operator_id, &caps[4]);
                }
                Err(IdError::malformed($kind, text))
            }

            pub fn try_parse(text: &str) -> Option<Self> {
                Self::parse(text).ok()
            }

            pub fn operator_id(&self) -> &ChargingStationOperatorId {
                &self.operator_id
            }

            pub fn suffix(&self) -> &str {
                &self.suffix
            }

            /// Fail unless this id lives below the given operator.
            pub fn ensure_operator(&self, operator_id: &ChargingStationOperatorId) -> Result<(), IdError> {
                if &self.operator_id == operator_id {
                    Ok(())
                } else {
                    Err(IdError::ForeignOperator {
                        kind: $kind,
                        value: self.to_string(),
                        operator: operator_id.to_string(),
                    })
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.operator_id.format() {
                    OperatorIdFormat::Iso => write!(f, "{}{}{}", self.operator_id, $marker, self.suffix),
                    OperatorIdFormat::IsoStar => write!(f, "{}*{}{}", self.operator_id, $marker, self.suffix),
                    OperatorIdFormat::Din if $din_marker => {
                        write!(f, "{}*{}{}", self.operator_id, $marker, self.suffix)
                    }
                    OperatorIdFormat::Din => write!(f, "{}*{}", self.operator_id, self.suffix),
                }
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                Self::parse(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

operator_scoped_id!(
    /// Identifier of a charging pool (a site with one or more stations).
    ChargingPoolId,
    marker = "P",
    kind = "charging pool id",
    din_marker = true
);

operator_scoped_id!(
    /// Identifier of a charging station.
    ChargingStationId,
    marker = "S",
    kind = "charging station id",
    din_marker = true
);

operator_scoped_id!(
    /// Identifier of an EVSE (Electric Vehicle Supply Equipment).
    EvseId,
    marker = "E",
    kind = "EVSE id",
    din_marker = false
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_evse_ids_round_trip() {
        for text in ["DE*GEF*E123*1", "DEGEFE1231"] {
            let id = EvseId::parse(text).unwrap();
            assert_eq!(id.to_string(), text);
            assert_eq!(id.operator_id().suffix(), "GEF");
        }
        assert_eq!(EvseId::parse("DE*GEF*E123*1").unwrap().suffix(), "123*1");
    }

    #[test]
    fn din_evse_ids_are_numeric() {
        let id = EvseId::parse("+49*822*4201*1").unwrap();
        assert_eq!(id.operator_id().to_string(), "+49*822");
        assert_eq!(id.suffix(), "4201*1");
        assert_eq!(id.to_string(), "+49*822*4201*1");

        assert!(EvseId::parse("+49*822*ABC").is_err());
    }

    #[test]
    fn pools_and_stations_use_their_marker() {
        let pool = ChargingPoolId::parse("DE*GEF*P1").unwrap();
        assert_eq!(pool.suffix(), "1");
        let station = ChargingStationId::parse("+49*822*S77").unwrap();
        assert_eq!(station.to_string(), "+49*822*S77");
        assert!(ChargingPoolId::parse("DE*GEF*S1").is_err());
    }

    #[test]
    fn foreign_operator_is_detected() {
        let evse = EvseId::parse("DE*GEF*E1").unwrap();
        let other = ChargingStationOperatorId::parse("DE*ABC").unwrap();
        assert!(evse.ensure_operator(evse.operator_id()).is_ok());
        assert!(matches!(
            evse.ensure_operator(&other),
            Err(IdError::ForeignOperator { .. })
        ));
    }
}
