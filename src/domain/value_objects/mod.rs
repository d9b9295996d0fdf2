//! Value Objects for the storefront

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

/// Money value object. Amounts are kept in major units (e.g. rupees, dollars).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_uppercase() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    /// Amount in the currency's minor unit, as payment gateways expect it.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        if self.amount.is_sign_negative() { return Err(MoneyError::Negative); }
        (self.amount * Decimal::ONE_HUNDRED).round().to_i64().ok_or(MoneyError::Overflow)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount, self.currency) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { CurrencyMismatch, Negative, Overflow }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrencyMismatch => write!(f, "Currency mismatch"),
            Self::Negative => write!(f, "Negative amount"),
            Self::Overflow => write!(f, "Amount out of range"),
        }
    }
}

/// Quantity value object, used for stock levels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

/// Where an order is shipped to. Every field is required.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    #[validate(custom = "not_blank")]
    pub street: String,
    #[validate(custom = "not_blank")]
    pub city: String,
    #[validate(custom = "not_blank")]
    pub state: String,
    #[validate(custom = "not_blank")]
    pub zip_code: String,
    #[validate(custom = "not_blank")]
    pub country: String,
    #[validate(custom = "not_blank")]
    pub phone: String,
}

impl ShippingAddress {
    /// Names of the fields that are missing or blank, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let Err(errors) = self.validate() else { return vec![] };
        let failed = errors.field_errors();
        ["street", "city", "state", "zip_code", "country", "phone"]
            .into_iter()
            .filter(|field| failed.contains_key(field))
            .collect()
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() { return Err(ValidationError::new("required")); }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            street: "12 MG Road".into(), city: "Bengaluru".into(), state: "KA".into(),
            zip_code: "560001".into(), country: "IN".into(), phone: "+91 98450 00000".into(),
        }
    }

    #[test]
    fn test_money_add() {
        let a = Money::new(Decimal::new(100, 0), "inr");
        let b = Money::new(Decimal::new(50, 0), "INR");
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert_eq!(a.add(&Money::zero("USD")), Err(MoneyError::CurrencyMismatch));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(Money::new(Decimal::new(1999, 2), "USD").to_minor_units(), Ok(1999));
        assert_eq!(Money::new(Decimal::new(10, 0), "INR").to_minor_units(), Ok(1000));
        assert_eq!(Money::new(Decimal::new(-1, 0), "INR").to_minor_units(), Err(MoneyError::Negative));
    }

    #[test]
    fn test_quantity_never_negative() {
        let q = Quantity::new(3);
        assert_eq!(q.subtract(3), Some(Quantity::new(0)));
        assert_eq!(q.subtract(4), None);
    }

    #[test]
    fn test_address_validation() {
        assert!(address().missing_fields().is_empty());
        let mut incomplete = address();
        incomplete.city = "   ".into();
        incomplete.phone.clear();
        assert_eq!(incomplete.missing_fields(), vec!["city", "phone"]);
    }

    #[test]
    fn test_address_missing_keys_deserialize_blank() {
        let parsed: ShippingAddress = serde_json::from_str(r#"{"street":"1 Main","zipCode":"10001"}"#).unwrap();
        assert_eq!(parsed.zip_code, "10001");
        assert_eq!(parsed.missing_fields(), vec!["city", "state", "country", "phone"]);
    }
}
