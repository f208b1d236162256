//! e-Mobility Account identifiers (eMAIds)
//!
//! ISO 15118 / eMI3 ids carry a 9 character instance and an optional check
//! character, DIN SPEC 91286 ids a 6 character instance and a mandatory check
//! character:
//!
//! ```text
//! ISO   DEGDFC12345678X       DEGDFC12345678
//! ISO-  DE-GDF-C12345678-X    DE-GDF-C12345678
//! DIN   +49*GDF*123456*7
//! DIN*  DE*GDF*123456*7
//! DIN-  DE-GDF-123456-7
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::country::Country;
use super::provider_id::{EMobilityProviderId, ProviderIdFormat};
use crate::domain::error::IdError;

const KIND: &str = "e-mobility account id";

pub const ISO_INSTANCE_LEN: usize = 9;
pub const DIN_INSTANCE_LEN: usize = 6;

static ISO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{2})([A-Za-z0-9]{3})([A-Za-z0-9]{9})([A-Za-z0-9])?$")
        .expect("valid regex")
});
static ISO_HYPHEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{2})-([A-Za-z0-9]{3})-([A-Za-z0-9]{9})(?:-([A-Za-z0-9]))?$")
        .expect("valid regex")
});
static DIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?([0-9]{1,3})\*([A-Za-z0-9]{3})\*([A-Za-z0-9]{6})\*([A-Za-z0-9])$")
        .expect("valid regex")
});
static DIN_STAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{2})\*([A-Za-z0-9]{3})\*([A-Za-z0-9]{6})\*([A-Za-z0-9])$")
        .expect("valid regex")
});
static DIN_HYPHEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{2})-([A-Za-z0-9]{3})-([A-Za-z0-9]{6})-([A-Za-z0-9])$")
        .expect("valid regex")
});

/// Identifier of an e-mobility account (contract) issued by a provider.
///
/// Equality, hashing and ordering ignore the textual format.
#[derive(Debug, Clone)]
pub struct EMobilityAccountId {
    provider_id: EMobilityProviderId,
    instance: String,
    check_char: Option<char>,
    format: ProviderIdFormat,
}

impl EMobilityAccountId {
    /// Build an account id from its parts.
    ///
    /// The instance length decides which family of formats is allowed:
    /// 9 characters for ISO, 6 characters plus a check character for DIN.
    pub fn new(
        provider_id: EMobilityProviderId,
        instance: &str,
        check_char: Option<char>,
        format: ProviderIdFormat,
    ) -> Result<Self, IdError> {
        let instance = instance.trim().to_ascii_uppercase();
        if !instance.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IdError::malformed(KIND, instance));
        }
        if let Some(c) = check_char {
            if !c.is_ascii_alphanumeric() {
                return Err(IdError::malformed(KIND, format!("{instance}*{c}")));
            }
        }

        let valid = if format.is_din() {
            instance.len() == DIN_INSTANCE_LEN && check_char.is_some()
        } else {
            instance.len() == ISO_INSTANCE_LEN
        };
        if !valid {
            return Err(IdError::malformed(KIND, instance));
        }

        Ok(Self {
            provider_id: provider_id.with_format(format),
            instance,
            check_char: check_char.map(|c| c.to_ascii_uppercase()),
            format,
        })
    }

    /// Parse an account id in any of the supported formats.
    pub fn parse(text: &str) -> Result<Self, IdError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(IdError::Empty { kind: KIND });
        }

        if let Some(caps) = DIN.captures(text) {
            let country = Country::from_telephone_code(&caps[1])
                .ok_or_else(|| IdError::UnknownCountry(caps[1].to_string()))?;
            return Self::from_parts(country, &caps[2], &caps[3], caps.get(4), ProviderIdFormat::Din);
        }

        for (regex, format) in [
            (&*DIN_STAR, ProviderIdFormat::DinStar),
            (&*DIN_HYPHEN, ProviderIdFormat::DinHyphen),
            (&*ISO_HYPHEN, ProviderIdFormat::IsoHyphen),
            (&*ISO, ProviderIdFormat::Iso),
        ] {
            if let Some(caps) = regex.captures(text) {
                let country = Country::from_alpha2(&caps[1])
                    .ok_or_else(|| IdError::UnknownCountry(caps[1].to_string()))?;
                return Self::from_parts(country, &caps[2], &caps[3], caps.get(4), format);
            }
        }

        Err(IdError::malformed(KIND, text))
    }

    fn from_parts(
        country: Country,
        provider_suffix: &str,
        instance: &str,
        check: Option<regex::Match<'_>>,
        format: ProviderIdFormat,
    ) -> Result<Self, IdError> {
        let provider_id = EMobilityProviderId::new(country, provider_suffix, format)?;
        let check_char = check.and_then(|m| m.as_str().chars().next());
        Self::new(provider_id, instance, check_char, format)
    }

    /// Parse, returning `None` on failure.
    pub fn try_parse(text: &str) -> Option<Self> {
        Self::parse(text).ok()
    }

    pub fn provider_id(&self) -> &EMobilityProviderId {
        &self.provider_id
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn check_char(&self) -> Option<char> {
        self.check_char
    }

    pub fn format(&self) -> ProviderIdFormat {
        self.format
    }

    /// Render in another format of the same family (DIN or ISO).
    ///
    /// Returns `None` when the instance length does not fit the target family.
    pub fn to_string_in(&self, format: ProviderIdFormat) -> Option<String> {
        if format.is_din() != self.format.is_din() {
            return None;
        }

        let provider = self.provider_id.to_string_in(format);
        let rendered = match (format, self.check_char) {
            (ProviderIdFormat::Din | ProviderIdFormat::DinStar, Some(c)) => {
                format!("{provider}*{}*{c}", self.instance)
            }
            (ProviderIdFormat::DinHyphen, Some(c)) => format!("{provider}-{}-{c}", self.instance),
            (ProviderIdFormat::Iso, Some(c)) => format!("{provider}{}{c}", self.instance),
            (ProviderIdFormat::Iso, None) => format!("{provider}{}", self.instance),
            (ProviderIdFormat::IsoHyphen, Some(c)) => format!("{provider}-{}-{c}", self.instance),
            (ProviderIdFormat::IsoHyphen, None) => format!("{provider}-{}", self.instance),
            (_, None) => return None,
        };
        Some(rendered)
    }
}

impl EMobilityAccountId {
    fn key(&self) -> (&EMobilityProviderId, &str, Option<char>) {
        (&self.provider_id, self.instance.as_str(), self.check_char)
    }
}

impl PartialEq for EMobilityAccountId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for EMobilityAccountId {}

impl Hash for EMobilityAccountId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for EMobilityAccountId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EMobilityAccountId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for EMobilityAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_string_in(self.format) {
            Some(text) => f.write_str(&text),
            None => Err(fmt::Error),
        }
    }
}

impl FromStr for EMobilityAccountId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for EMobilityAccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EMobilityAccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_with_and_without_check_char() {
        let id = EMobilityAccountId::parse("DEGDFC12345678X").unwrap();
        assert_eq!(id.format(), ProviderIdFormat::Iso);
        assert_eq!(id.provider_id().to_string(), "DEGDF");
        assert_eq!(id.instance(), "C12345678");
        assert_eq!(id.check_char(), Some('X'));

        let id = EMobilityAccountId::parse("DE-GDF-C12345678").unwrap();
        assert_eq!(id.format(), ProviderIdFormat::IsoHyphen);
        assert_eq!(id.check_char(), None);
    }

    #[test]
    fn parses_din_formats() {
        let din = EMobilityAccountId::parse("+49*GDF*123456*7").unwrap();
        assert_eq!(din.format(), ProviderIdFormat::Din);
        let star = EMobilityAccountId::parse("DE*GDF*123456*7").unwrap();
        assert_eq!(star.format(), ProviderIdFormat::DinStar);
        let hyphen = EMobilityAccountId::parse("DE-GDF-123456-7").unwrap();
        assert_eq!(hyphen.format(), ProviderIdFormat::DinHyphen);

        assert_eq!(din, star);
        assert_eq!(star, hyphen);
        assert_eq!(hyphen.instance(), "123456");
        assert_eq!(hyphen.check_char(), Some('7'));
    }

    #[test]
    fn round_trips_keep_the_input_format() {
        for text in [
            "DEGDFC12345678X",
            "DE-GDF-C12345678-X",
            "DE-GDF-C12345678",
            "+49*GDF*123456*7",
            "DE*GDF*123456*7",
            "DE-GDF-123456-7",
        ] {
            assert_eq!(EMobilityAccountId::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn lower_case_input_is_normalized() {
        let id = EMobilityAccountId::parse("degdfc12345678x").unwrap();
        assert_eq!(id.to_string(), "DEGDFC12345678X");
    }

    #[test]
    fn converts_within_a_family_only() {
        let id = EMobilityAccountId::parse("DE*GDF*123456*7").unwrap();
        assert_eq!(
            id.to_string_in(ProviderIdFormat::Din).as_deref(),
            Some("+49*GDF*123456*7")
        );
        assert_eq!(id.to_string_in(ProviderIdFormat::Iso), None);
    }

    #[test]
    fn din_requires_a_check_char() {
        assert!(EMobilityAccountId::parse("DE*GDF*123456").is_err());
        assert!(EMobilityAccountId::parse("DE*GDF*12345*7").is_err());
    }
}
