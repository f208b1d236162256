//! Countries as used by e-mobility identifiers
//!
//! DIN identifiers carry the E.164 telephone code (`+49`), ISO/eMI3
//! identifiers carry the ISO 3166 alpha-2 code (`DE`).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::error::IdError;

/// A country known to the identifier parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Country {
    alpha2: &'static str,
    telephone_code: u16,
    name: &'static str,
}

const COUNTRIES: &[Country] = &[
    Country::new("AT", 43, "Austria"),
    Country::new("BE", 32, "Belgium"),
    Country::new("BG", 359, "Bulgaria"),
    Country::new("CH", 41, "Switzerland"),
    Country::new("CY", 357, "Cyprus"),
    Country::new("CZ", 420, "Czech Republic"),
    Country::new("DE", 49, "Germany"),
    Country::new("DK", 45, "Denmark"),
    Country::new("EE", 372, "Estonia"),
    Country::new("ES", 34, "Spain"),
    Country::new("FI", 358, "Finland"),
    Country::new("FR", 33, "France"),
    Country::new("GB", 44, "United Kingdom"),
    Country::new("GR", 30, "Greece"),
    Country::new("HR", 385, "Croatia"),
    Country::new("HU", 36, "Hungary"),
    Country::new("IE", 353, "Ireland"),
    Country::new("IS", 354, "Iceland"),
    Country::new("IT", 39, "Italy"),
    Country::new("LI", 423, "Liechtenstein"),
    Country::new("LT", 370, "Lithuania"),
    Country::new("LU", 352, "Luxembourg"),
    Country::new("LV", 371, "Latvia"),
    Country::new("MT", 356, "Malta"),
    Country::new("NL", 31, "Netherlands"),
    Country::new("NO", 47, "Norway"),
    Country::new("PL", 48, "Poland"),
    Country::new("PT", 351, "Portugal"),
    Country::new("RO", 40, "Romania"),
    Country::new("SE", 46, "Sweden"),
    Country::new("SI", 386, "Slovenia"),
    Country::new("SK", 421, "Slovakia"),
    Country::new("US", 1, "United States"),
];

impl Country {
    const fn new(alpha2: &'static str, telephone_code: u16, name: &'static str) -> Self {
        Self {
            alpha2,
            telephone_code,
            name,
        }
    }

    /// Look up a country by its ISO 3166 alpha-2 code (case-insensitive).
    pub fn from_alpha2(code: &str) -> Option<Self> {
        let code = code.trim();
        COUNTRIES
            .iter()
            .find(|c| c.alpha2.eq_ignore_ascii_case(code))
            .copied()
    }

    /// Look up a country by its telephone code, with or without the leading `+`.
    pub fn from_telephone_code(code: &str) -> Option<Self> {
        let code: u16 = code.trim().trim_start_matches('+').parse().ok()?;
        COUNTRIES
            .iter()
            .find(|c| c.telephone_code == code)
            .copied()
    }

    /// Parse either representation.
    pub fn parse(text: &str) -> Result<Self, IdError> {
        Self::from_alpha2(text)
            .or_else(|| Self::from_telephone_code(text))
            .ok_or_else(|| IdError::UnknownCountry(text.to_string()))
    }

    pub fn alpha2(&self) -> &'static str {
        self.alpha2
    }

    pub fn telephone_code(&self) -> u16 {
        self.telephone_code
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// All countries known to the parsers.
    pub fn all() -> &'static [Country] {
        COUNTRIES
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alpha2)
    }
}

impl Serialize for Country {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.alpha2)
    }
}

impl<'de> Deserialize<'de> for Country {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Country::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_alpha2_ignores_case() {
        let de = Country::from_alpha2("de").unwrap();
        assert_eq!(de.alpha2(), "DE");
        assert_eq!(de.telephone_code(), 49);
    }

    #[test]
    fn lookup_by_telephone_code() {
        assert_eq!(Country::from_telephone_code("+49").unwrap().alpha2(), "DE");
        assert_eq!(Country::from_telephone_code("33").unwrap().alpha2(), "FR");
        assert!(Country::from_telephone_code("+999").is_none());
    }

    #[test]
    fn unknown_country_is_an_error() {
        assert_eq!(
            Country::parse("XX"),
            Err(IdError::UnknownCountry("XX".into()))
        );
    }
}
