//! Runtime configuration read from the environment.

use std::str::FromStr;

use crate::domain::value_objects::Money;
use crate::BookstoreError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Absent means the in-memory store with demo data.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub nats_url: Option<String>,
    pub nats_subject_prefix: String,
    pub port: u16,
    pub pricing: PricingConfig,
}

/// Shipping policy applied at checkout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PricingConfig {
    pub shipping_fee: Money,
    /// Subtotals at or above this ship for free.
    pub free_shipping_threshold: Option<Money>,
}

impl PricingConfig {
    pub const DEFAULT_SHIPPING_FEE: Money = Money::vnd(30_000);

    pub fn shipping_fee_for(&self, subtotal: Money) -> Money {
        match self.free_shipping_threshold {
            Some(threshold) if subtotal >= threshold => Money::ZERO,
            _ => self.shipping_fee,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self { shipping_fee: Self::DEFAULT_SHIPPING_FEE, free_shipping_threshold: None }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, BookstoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BookstoreError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let shipping_fee = parse_or(&non_empty, "SHIPPING_FEE", PricingConfig::DEFAULT_SHIPPING_FEE.amount())?;
        let free_shipping_threshold = non_empty("FREE_SHIPPING_THRESHOLD")
            .map(|v| parse::<i64>("FREE_SHIPPING_THRESHOLD", &v))
            .transpose()?;
        if shipping_fee < 0 || free_shipping_threshold.is_some_and(|t| t < 0) {
            return Err(BookstoreError::Config("shipping amounts must not be negative".into()));
        }
        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            max_connections: parse_or(&non_empty, "DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: non_empty("NATS_URL"),
            nats_subject_prefix: non_empty("NATS_SUBJECT_PREFIX").unwrap_or_else(|| "bookstore".to_string()),
            port: parse_or(&non_empty, "PORT", 8083)?,
            pricing: PricingConfig {
                shipping_fee: Money::vnd(shipping_fee),
                free_shipping_threshold: free_shipping_threshold.map(Money::vnd),
            },
        })
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, BookstoreError> {
    value
        .trim()
        .parse()
        .map_err(|_| BookstoreError::Config(format!("{key} has an invalid value: {value}")))
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, BookstoreError> {
    lookup(key).map_or(Ok(default), |v| parse(key, &v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, BookstoreError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 8083);
        assert_eq!(c.max_connections, 10);
        assert_eq!(c.database_url, None);
        assert_eq!(c.pricing, PricingConfig::default());
    }

    #[test]
    fn test_overrides() {
        let c = config(&[("PORT", "9000"), ("SHIPPING_FEE", "25000"), ("FREE_SHIPPING_THRESHOLD", "150000"), ("DATABASE_URL", "postgres://x")]).unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.pricing.shipping_fee_for(Money::vnd(149_999)), Money::vnd(25_000));
        assert_eq!(c.pricing.shipping_fee_for(Money::vnd(150_000)), Money::ZERO);
        assert_eq!(c.database_url.as_deref(), Some("postgres://x"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[("PORT", "eighty")]), Err(BookstoreError::Config(_))));
        assert!(matches!(config(&[("SHIPPING_FEE", "-1")]), Err(BookstoreError::Config(_))));
    }
}
