//! Coffee machine business logic.
//!
//! Computes the coffee served and the change owed for a payment. The machine
//! holds only its immutable configuration, so one instance can serve any
//! number of concurrent requests.

use crate::config::CoffeeMachineConfig;
use crate::error::{MachineError, MachineResult};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Change owed, as a count per coin denomination
pub type Change = BTreeMap<Money, u64>;

/// A brewed coffee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoffeeInstance {
    /// Coffee name
    pub name: String,
    /// Price charged
    pub price: Money,
    /// When the coffee was brewed
    pub created_at: DateTime<Utc>,
}

/// The outcome of a successful coffee request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrewResult {
    /// The coffee served
    pub coffee: CoffeeInstance,
    /// Coins returned; every configured denomination is listed, unused ones with 0
    pub change: Change,
    /// Total value of the change, exactly `money_provided - price`
    pub change_value: Money,
}

/// Coffee machine
#[derive(Debug, Clone)]
pub struct CoffeeMachine {
    config: CoffeeMachineConfig,
    /// Configured coins, largest first
    denominations: Vec<Money>,
}

impl CoffeeMachine {
    /// Create a machine from a validated configuration
    pub fn new(config: CoffeeMachineConfig) -> MachineResult<Self> {
        config.validate()?;
        let denominations = config.available_coins.iter().rev().copied().collect();
        tracing::debug!(
            "Coffee machine ready with {} coffees and {} coins",
            config.coffees.len(),
            config.available_coins.len()
        );
        Ok(Self {
            config,
            denominations,
        })
    }

    /// Brew a coffee and compute the change for the payment
    pub fn request_coffee(
        &self,
        coffee_id: &str,
        money_provided: Money,
    ) -> MachineResult<BrewResult> {
        let price = self
            .price_of(coffee_id)
            .ok_or_else(|| MachineError::NotFound {
                coffee_id: coffee_id.to_string(),
            })?;

        if money_provided < price {
            return Err(MachineError::InsufficientFunds {
                coffee_id: coffee_id.to_string(),
                price,
                provided: money_provided,
            });
        }

        let change_value = money_provided.checked_sub(price)?;
        let change = self.compute_change(change_value)?;

        Ok(BrewResult {
            coffee: CoffeeInstance {
                name: coffee_id.to_string(),
                price,
                created_at: Utc::now(),
            },
            change,
            change_value,
        })
    }

    /// Break an amount into coins, largest denomination first
    ///
    /// Fails with `UnrepresentableChange` when the configured coins cannot
    /// make up the exact amount.
    pub fn compute_change(&self, amount: Money) -> MachineResult<Change> {
        let mut change = Change::new();
        let mut remaining = amount;

        for &coin in &self.denominations {
            let (count, rest) = remaining.div_rem(coin);
            change.insert(coin, count);
            remaining = rest;
        }

        if remaining != Money::ZERO {
            tracing::warn!(
                "Cannot represent {} with coins {:?}: {} left over",
                amount,
                self.denominations,
                remaining
            );
            return Err(MachineError::UnrepresentableChange {
                change_value: amount,
                remaining,
            });
        }

        Ok(change)
    }

    /// Price of a coffee, if it is on the menu
    pub fn price_of(&self, coffee_id: &str) -> Option<Money> {
        self.config.coffees.get(coffee_id).copied()
    }

    /// Coffees on the menu with their prices
    pub fn menu(&self) -> impl Iterator<Item = (&str, Money)> + '_ {
        self.config
            .coffees
            .iter()
            .map(|(name, price)| (name.as_str(), *price))
    }

    /// Configured coins, largest first
    pub fn denominations(&self) -> &[Money] {
        &self.denominations
    }

    /// Time each brew takes
    pub fn brew_time(&self) -> Duration {
        self.config.brew_time()
    }

    /// Get the configuration
    pub fn config(&self) -> &CoffeeMachineConfig {
        &self.config
    }
}
