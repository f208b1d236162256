//! Charging Station Operator identifiers

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::country::Country;
use crate::domain::error::IdError;

const KIND: &str = "charging station operator id";

/// Textual formats of a [`ChargingStationOperatorId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorIdFormat {
    /// `+49*822`
    Din,
    /// `DEGEF`
    Iso,
    /// `DE*GEF`
    IsoStar,
}

impl OperatorIdFormat {
    pub fn is_din(&self) -> bool {
        matches!(self, Self::Din)
    }
}

pub(crate) const DIN_PATTERN: &str = r"\+?([0-9]{1,3})\*([0-9]{3,6})";
pub(crate) const ISO_PATTERN: &str = r"([A-Za-z]{2})(\*?)([A-Za-z0-9]{3})";

static DIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{DIN_PATTERN}$")).expect("valid regex"));
static ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{ISO_PATTERN}$")).expect("valid regex"));

/// Identifier of a charging station operator (CSO).
///
/// DIN ids use a numeric suffix of 3 to 6 digits, ISO ids an alphanumeric
/// suffix of 3 characters.
#[derive(Debug, Clone)]
pub struct ChargingStationOperatorId {
    country: Country,
    suffix: String,
    format: OperatorIdFormat,
}

impl ChargingStationOperatorId {
    pub fn new(country: Country, suffix: &str, format: OperatorIdFormat) -> Result<Self, IdError> {
        let suffix = suffix.trim().to_ascii_uppercase();
        let valid = match format {
            OperatorIdFormat::Din => {
                (3..=6).contains(&suffix.len()) && suffix.chars().all(|c| c.is_ascii_digit())
            }
            OperatorIdFormat::Iso | OperatorIdFormat::IsoStar => {
                suffix.len() == 3 && suffix.chars().all(|c| c.is_ascii_alphanumeric())
            }
        };
        if !valid {
            return Err(IdError::malformed(KIND, suffix));
        }
        Ok(Self {
            country,
            suffix,
            format,
        })
    }

    pub fn parse(text: &str) -> Result<Self, IdError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(IdError::Empty { kind: KIND });
        }
        if let Some(caps) = DIN.captures(text) {
            return Self::from_din_captures(&caps[1], &caps[2]);
        }
        if let Some(caps) = ISO.captures(text) {
            return Self::from_iso_captures(&caps[1], &caps[2], &caps[3]);
        }
        Err(IdError::malformed(KIND, text))
    }

    pub(crate) fn from_din_captures(telephone_code: &str, suffix: &str) -> Result<Self, IdError> {
        let country = Country::from_telephone_code(telephone_code)
            .ok_or_else(|| IdError::UnknownCountry(telephone_code.to_string()))?;
        Self::new(country, suffix, OperatorIdFormat::Din)
    }

    pub(crate) fn from_iso_captures(
        alpha2: &str,
        separator: &str,
        suffix: &str,
    ) -> Result<Self, IdError> {
        let country = Country::from_alpha2(alpha2)
            .ok_or_else(|| IdError::UnknownCountry(alpha2.to_string()))?;
        let format = if separator.is_empty() {
            OperatorIdFormat::Iso
        } else {
            OperatorIdFormat::IsoStar
        };
        Self::new(country, suffix, format)
    }

    pub fn try_parse(text: &str) -> Option<Self> {
        Self::parse(text).ok()
    }

    pub fn country(&self) -> Country {
        self.country
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn format(&self) -> OperatorIdFormat {
        self.format
    }

    /// Render in another format. DIN and ISO suffixes are not
    /// interchangeable, so switching family yields `None`.
    pub fn to_string_in(&self, format: OperatorIdFormat) -> Option<String> {
        match (format, self.format.is_din()) {
            (OperatorIdFormat::Din, true) => {
                Some(format!("+{}*{}", self.country.telephone_code(), self.suffix))
            }
            (OperatorIdFormat::Iso, false) => {
                Some(format!("{}{}", self.country.alpha2(), self.suffix))
            }
            (OperatorIdFormat::IsoStar, false) => {
                Some(format!("{}*{}", self.country.alpha2(), self.suffix))
            }
            _ => None,
        }
    }

    fn key(&self) -> (&'static str, &str) {
        (self.country.alpha2(), self.suffix.as_str())
    }
}

impl PartialEq for ChargingStationOperatorId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ChargingStationOperatorId {}

impl Hash for ChargingStationOperatorId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for ChargingStationOperatorId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChargingStationOperatorId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for ChargingStationOperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_string_in(self.format) {
            Some(text) => f.write_str(&text),
            None => Err(fmt::Error),
        }
    }
}

impl FromStr for ChargingStationOperatorId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ChargingStationOperatorId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChargingStationOperatorId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_and_din() {
        let iso = ChargingStationOperatorId::parse("DE*GEF").unwrap();
        assert_eq!(iso.format(), OperatorIdFormat::IsoStar);
        assert_eq!(iso.to_string(), "DE*GEF");

        let compact = ChargingStationOperatorId::parse("degef").unwrap();
        assert_eq!(compact.format(), OperatorIdFormat::Iso);
        assert_eq!(compact, iso);

        let din = ChargingStationOperatorId::parse("+49*822").unwrap();
        assert_eq!(din.format(), OperatorIdFormat::Din);
        assert_eq!(din.suffix(), "822");
        assert_eq!(din.to_string(), "+49*822");
    }

    #[test]
    fn din_and_iso_do_not_convert() {
        let din = ChargingStationOperatorId::parse("+49*822").unwrap();
        assert_eq!(din.to_string_in(OperatorIdFormat::Iso), None);
        let iso = ChargingStationOperatorId::parse("DEGEF").unwrap();
        assert_eq!(
            iso.to_string_in(OperatorIdFormat::IsoStar).as_deref(),
            Some("DE*GEF")
        );
    }

    #[test]
    fn rejects_malformed() {
        assert!(ChargingStationOperatorId::parse("+49*82").is_err());
        assert!(ChargingStationOperatorId::parse("DE*GE").is_err());
        assert!(ChargingStationOperatorId::parse("ZZ*GEF").is_err());
    }
}
