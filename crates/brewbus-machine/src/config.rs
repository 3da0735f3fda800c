//! Coffee machine configuration.
//!
//! The configuration is static for the lifetime of a machine: a menu of
//! coffees with their prices and the set of coin denominations available for
//! paying out change.

use crate::error::{MachineError, MachineResult};
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Menu and coin configuration for a coffee machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoffeeMachineConfig {
    /// Coin denominations available for change
    pub available_coins: BTreeSet<Money>,
    /// Time spent brewing each coffee, in milliseconds
    #[serde(default)]
    pub brew_time_ms: u64,
    /// Coffee name to price
    pub coffees: BTreeMap<String, Money>,
}

impl Default for CoffeeMachineConfig {
    fn default() -> Self {
        let coffees = [
            ("espresso", 150),
            ("americano", 175),
            ("latte", 200),
            ("cappuccino", 250),
        ]
        .into_iter()
        .map(|(name, minor)| (name.to_string(), Money::from_minor(minor)))
        .collect();
        let available_coins = [10, 25, 50, 100].into_iter().map(Money::from_minor).collect();

        Self {
            available_coins,
            brew_time_ms: 0,
            coffees,
        }
    }
}

impl CoffeeMachineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> MachineResult<()> {
        if self.coffees.is_empty() {
            return Err(MachineError::config("at least one coffee is required"));
        }
        for (name, price) in &self.coffees {
            if name.trim().is_empty() {
                return Err(MachineError::config("coffee names must not be empty"));
            }
            if price.is_negative() {
                return Err(MachineError::config(format!(
                    "price of '{}' must not be negative",
                    name
                )));
            }
        }

        if self.available_coins.is_empty() {
            return Err(MachineError::config("at least one coin is required"));
        }
        if let Some(coin) = self.available_coins.iter().find(|coin| !coin.is_positive()) {
            return Err(MachineError::config(format!(
                "coin {} must be positive",
                coin
            )));
        }

        Ok(())
    }

    /// Brewing delay as a duration
    pub fn brew_time(&self) -> Duration {
        Duration::from_millis(self.brew_time_ms)
    }
}
