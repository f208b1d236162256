//! e-Mobility Provider identifiers (EVSP ids)
//!
//! A provider id is a country plus a three character suffix. It has been
//! written in several ways over time:
//!
//! | Format      | Example   |
//! |-------------|-----------|
//! | `Din`       | `+49*GDF` |
//! | `DinStar`   | `DE*GDF`  |
//! | `DinHyphen` | `DE-GDF`  |
//! | `Iso`       | `DEGDF`   |
//! | `IsoHyphen` | `DE-GDF`  |
//!
//! `DinHyphen` and `IsoHyphen` share their textual form; parsing a hyphenated
//! id always yields `IsoHyphen`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::country::Country;
use crate::domain::error::IdError;

const KIND: &str = "e-mobility provider id";

/// Textual formats of an [`EMobilityProviderId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderIdFormat {
    Din,
    DinStar,
    DinHyphen,
    Iso,
    IsoHyphen,
}

impl ProviderIdFormat {
    pub const ALL: &'static [ProviderIdFormat] = &[
        Self::Din,
        Self::DinStar,
        Self::DinHyphen,
        Self::Iso,
        Self::IsoHyphen,
    ];

    pub fn is_din(&self) -> bool {
        matches!(self, Self::Din | Self::DinStar | Self::DinHyphen)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Din => "DIN",
            Self::DinStar => "DIN*",
            Self::DinHyphen => "DIN-",
            Self::Iso => "ISO",
            Self::IsoHyphen => "ISO-",
        }
    }
}

impl fmt::Display for ProviderIdFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static DIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?([0-9]{1,3})\*([A-Za-z0-9]{3})$").expect("valid regex"));
static DIN_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]{2})\*([A-Za-z0-9]{3})$").expect("valid regex"));
static ISO_HYPHEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]{2})-([A-Za-z0-9]{3})$").expect("valid regex"));
static ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]{2})([A-Za-z0-9]{3})$").expect("valid regex"));

/// Identifier of an e-mobility provider.
///
/// Equality, hashing and ordering ignore the textual format.
#[derive(Debug, Clone)]
pub struct EMobilityProviderId {
    country: Country,
    suffix: String,
    format: ProviderIdFormat,
}

impl EMobilityProviderId {
    /// Build a provider id from its parts.
    pub fn new(
        country: Country,
        suffix: &str,
        format: ProviderIdFormat,
    ) -> Result<Self, IdError> {
        let suffix = suffix.trim();
        if suffix.len() != 3 || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IdError::malformed(KIND, suffix));
        }
        Ok(Self {
            country,
            suffix: suffix.to_ascii_uppercase(),
            format,
        })
    }

    /// Parse a provider id in any of the supported formats.
    pub fn parse(text: &str) -> Result<Self, IdError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(IdError::Empty { kind: KIND });
        }

        if let Some(caps) = DIN.captures(text) {
            let country = Country::from_telephone_code(&caps[1])
                .ok_or_else(|| IdError::UnknownCountry(caps[1].to_string()))?;
            return Self::new(country, &caps[2], ProviderIdFormat::Din);
        }

        for (regex, format) in [
            (&*DIN_STAR, ProviderIdFormat::DinStar),
            (&*ISO_HYPHEN, ProviderIdFormat::IsoHyphen),
            (&*ISO, ProviderIdFormat::Iso),
        ] {
            if let Some(caps) = regex.captures(text) {
                let country = Country::from_alpha2(&caps[1])
                    .ok_or_else(|| IdError::UnknownCountry(caps[1].to_string()))?;
                return Self::new(country, &caps[2], format);
            }
        }

        Err(IdError::malformed(KIND, text))
    }

    /// Parse, returning `None` on failure.
    pub fn try_parse(text: &str) -> Option<Self> {
        Self::parse(text).ok()
    }

    pub fn country(&self) -> Country {
        self.country
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn format(&self) -> ProviderIdFormat {
        self.format
    }

    /// The same id, rendered in another format from now on.
    pub fn with_format(&self, format: ProviderIdFormat) -> Self {
        Self {
            format,
            ..self.clone()
        }
    }

    /// Render in the given format.
    pub fn to_string_in(&self, format: ProviderIdFormat) -> String {
        match format {
            ProviderIdFormat::Din => {
                format!("+{}*{}", self.country.telephone_code(), self.suffix)
            }
            ProviderIdFormat::DinStar => format!("{}*{}", self.country.alpha2(), self.suffix),
            ProviderIdFormat::DinHyphen | ProviderIdFormat::IsoHyphen => {
                format!("{}-{}", self.country.alpha2(), self.suffix)
            }
            ProviderIdFormat::Iso => format!("{}{}", self.country.alpha2(), self.suffix),
        }
    }

    fn key(&self) -> (&'static str, &str) {
        (self.country.alpha2(), self.suffix.as_str())
    }
}

impl PartialEq for EMobilityProviderId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for EMobilityProviderId {}

impl Hash for EMobilityProviderId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for EMobilityProviderId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EMobilityProviderId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for EMobilityProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_in(self.format))
    }
}

impl FromStr for EMobilityProviderId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for EMobilityProviderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EMobilityProviderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_format() {
        let cases = [
            ("+49*GDF", ProviderIdFormat::Din),
            ("49*gdf", ProviderIdFormat::Din),
            ("DE*GDF", ProviderIdFormat::DinStar),
            ("DE-GDF", ProviderIdFormat::IsoHyphen),
            ("DEGDF", ProviderIdFormat::Iso),
        ];
        for (text, format) in cases {
            let id = EMobilityProviderId::parse(text).unwrap();
            assert_eq!(id.format(), format, "{text}");
            assert_eq!(id.country().alpha2(), "DE");
            assert_eq!(id.suffix(), "GDF");
        }
    }

    #[test]
    fn display_preserves_parsed_format() {
        for text in ["+49*GDF", "DE*GDF", "DE-GDF", "DEGDF"] {
            assert_eq!(EMobilityProviderId::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn equality_ignores_format() {
        let din = EMobilityProviderId::parse("+49*GDF").unwrap();
        let iso = EMobilityProviderId::parse("degdf").unwrap();
        assert_eq!(din, iso);
        assert_eq!(iso.to_string_in(ProviderIdFormat::Din), "+49*GDF");
        assert_eq!(din.to_string_in(ProviderIdFormat::DinHyphen), "DE-GDF");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            EMobilityProviderId::parse("DE*GDFX"),
            Err(IdError::Malformed { .. })
        ));
        assert!(matches!(
            EMobilityProviderId::parse("XX*GDF"),
            Err(IdError::UnknownCountry(_))
        ));
        assert!(matches!(
            EMobilityProviderId::parse("  "),
            Err(IdError::Empty { .. })
        ));
    }

    #[test]
    fn serde_uses_string_form() {
        let id = EMobilityProviderId::parse("DE*GDF").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"DE*GDF\"");
        let back: EMobilityProviderId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.format(), ProviderIdFormat::DinStar);
    }
}
