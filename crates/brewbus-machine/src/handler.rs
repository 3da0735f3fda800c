//! Event bus wiring for the coffee machine.
//!
//! A brew request travels over the bus as `brew_coffee` with the arguments
//! `[coffee_id, money]`. The handler registered here turns the request into a
//! [`CoffeeMachine::request_coffee`] call and settles the dispatch with either
//! the JSON form of the [`BrewResult`] or the [`MachineError`].

use crate::error::{MachineError, MachineResult};
use crate::machine::{BrewResult, CoffeeMachine};
use crate::money::Money;
use brewbus_core::{BusError, DispatchError, DispatchResolver, Event, EventType};
use serde_json::Value;
use std::sync::Arc;

/// Event type of brew requests
pub const BREW_COFFEE: &str = "brew_coffee";

/// Observer id of the order log
pub const ORDER_LOG: &str = "order_log";

/// A decoded `brew_coffee` argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrewRequest {
    /// Coffee to brew
    pub coffee_id: String,
    /// Amount paid
    pub money: Money,
}

impl BrewRequest {
    /// Create a request for `coffee_id` paid with `money`
    pub fn new(coffee_id: impl Into<String>, money: Money) -> Self {
        Self {
            coffee_id: coffee_id.into(),
            money,
        }
    }

    /// Decode `[coffee_id, money]`
    ///
    /// Surrounding whitespace is trimmed from the coffee id, so `" latte "`
    /// orders `latte`. The amount may be a decimal string or a JSON number.
    pub fn from_args(args: &[Value]) -> MachineResult<Self> {
        let [coffee, money] = args else {
            return Err(MachineError::request(format!(
                "expected [coffee_id, money], got {} arguments",
                args.len()
            )));
        };

        let coffee_id = coffee
            .as_str()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MachineError::request("coffee_id must be a non-empty string"))?;

        let money = match money {
            Value::String(text) => text.parse::<Money>()?,
            Value::Number(_) => serde_json::from_value::<Money>(money.clone())
                .map_err(|e| MachineError::request(e.to_string()))?,
            other => {
                return Err(MachineError::request(format!(
                    "money must be a decimal amount, got {}",
                    other
                )))
            }
        };

        Ok(Self::new(coffee_id, money))
    }

    /// The bus event carrying this request
    pub fn into_event(self) -> Result<Event, BusError> {
        Ok(Event::new(EventType::new(BREW_COFFEE)?)
            .arg(self.coffee_id)
            .arg(self.money.to_string()))
    }
}

/// Register the `brew_coffee` handler backed by `machine`
///
/// Replaces any handler already registered for `brew_coffee`.
pub fn register_brew_handler(
    bus: &brewbus_core::EventBus,
    machine: Arc<CoffeeMachine>,
) -> Result<(), BusError> {
    bus.add_handler(BREW_COFFEE, move |args, resolver| {
        brew(&machine, args, resolver);
        Ok(())
    })
}

/// Register the `order_log` observer on `brew_coffee`
pub fn register_order_log_observer(bus: &brewbus_core::EventBus) -> Result<(), BusError> {
    bus.add_observer(BREW_COFFEE, ORDER_LOG, |args| {
        match BrewRequest::from_args(args) {
            Ok(request) => tracing::info!(
                "Order received: {} paid with {}",
                request.coffee_id,
                request.money
            ),
            Err(e) => tracing::info!("Order received with unreadable arguments: {}", e),
        }
        Ok(())
    })
}

fn brew(machine: &CoffeeMachine, args: &[Value], resolver: DispatchResolver) {
    let outcome = BrewRequest::from_args(args).and_then(|request| {
        let brew_time = machine.brew_time();
        if !brew_time.is_zero() {
            std::thread::sleep(brew_time);
        }
        machine.request_coffee(&request.coffee_id, request.money)
    });

    match outcome.and_then(|result| encode(&result)) {
        Ok(value) => {
            resolver.resolve(value);
        }
        Err(e) => {
            tracing::debug!("Brew request rejected: {}", e);
            resolver.reject(DispatchError::rejected(e));
        }
    }
}

fn encode(result: &BrewResult) -> MachineResult<Value> {
    serde_json::to_value(result).map_err(|e| MachineError::request(e.to_string()))
}
