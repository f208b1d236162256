//! Charging tariffs published by an operator

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::ids::{ChargingStationOperatorId, ChargingTariffId};

/// Price components of a tariff. All prices are in `currency` and excl. VAT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargingTariff {
    pub id: ChargingTariffId,
    pub operator_id: ChargingStationOperatorId,
    pub currency: String,
    #[serde(default)]
    pub price_per_kwh: Decimal,
    #[serde(default)]
    pub price_per_minute: Decimal,
    #[serde(default)]
    pub session_fee: Decimal,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl ChargingTariff {
    pub fn new(
        id: ChargingTariffId,
        operator_id: ChargingStationOperatorId,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id,
            operator_id,
            currency: currency.into(),
            price_per_kwh: Decimal::ZERO,
            price_per_minute: Decimal::ZERO,
            session_fee: Decimal::ZERO,
            valid_from: None,
            valid_until: None,
        }
    }

    pub fn with_energy_price(mut self, price_per_kwh: Decimal) -> Self {
        self.price_per_kwh = price_per_kwh;
        self
    }

    pub fn with_time_price(mut self, price_per_minute: Decimal) -> Self {
        self.price_per_minute = price_per_minute;
        self
    }

    pub fn with_session_fee(mut self, session_fee: Decimal) -> Self {
        self.session_fee = session_fee;
        self
    }

    pub fn valid_between(
        mut self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }

    /// Whether the tariff applies at `at`.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from.map_or(true, |from| from <= at)
            && self.valid_until.map_or(true, |until| at < until)
    }

    /// Price of a session with the given energy and duration.
    pub fn price_of(&self, energy_kwh: Decimal, minutes: Decimal) -> Decimal {
        self.session_fee + self.price_per_kwh * energy_kwh + self.price_per_minute * minutes
    }

    pub fn validate(&self) -> DomainResult<()> {
        let currency_ok =
            self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_uppercase());
        if !currency_ok {
            return Err(DomainError::Validation(format!(
                "Illegal currency '{}'",
                self.currency
            )));
        }

        if [self.price_per_kwh, self.price_per_minute, self.session_fee]
            .iter()
            .any(|p| p.is_sign_negative() && !p.is_zero())
        {
            return Err(DomainError::Validation(format!(
                "Tariff '{}' has a negative price",
                self.id
            )));
        }

        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if until <= from {
                return Err(DomainError::Validation(format!(
                    "Tariff '{}' ends before it starts",
                    self.id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    fn tariff() -> ChargingTariff {
        ChargingTariff::new(
            ChargingTariffId::parse("AC-STANDARD").unwrap(),
            ChargingStationOperatorId::parse("DE*GEF").unwrap(),
            "EUR",
        )
    }

    #[test]
    fn prices_a_session() {
        let t = tariff()
            .with_energy_price(Decimal::from_str("0.39").unwrap())
            .with_time_price(Decimal::from_str("0.05").unwrap())
            .with_session_fee(Decimal::from_str("1.00").unwrap());

        let price = t.price_of(Decimal::from(20), Decimal::from(60));
        assert_eq!(price, Decimal::from_str("11.80").unwrap());
    }

    #[test]
    fn validation() {
        assert!(tariff().validate().is_ok());

        let mut bad_currency = tariff();
        bad_currency.currency = "euro".into();
        assert!(matches!(bad_currency.validate(), Err(DomainError::Validation(_))));

        let negative = tariff().with_energy_price(Decimal::from(-1));
        assert!(negative.validate().is_err());

        let now = Utc::now();
        let inverted = tariff().valid_between(Some(now), Some(now - Duration::hours(1)));
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn validity_window() {
        let now = Utc::now();
        let t = tariff().valid_between(Some(now), Some(now + Duration::days(1)));
        assert!(!t.is_valid_at(now - Duration::seconds(1)));
        assert!(t.is_valid_at(now));
        assert!(!t.is_valid_at(now + Duration::days(1)));
        assert!(tariff().is_valid_at(now));
    }
}
