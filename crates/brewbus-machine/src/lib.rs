//! # Brewbus Machine
//!
//! Coffee machine pricing and change computation, plus the handler and
//! observer that put a machine behind the event bus.

pub mod config;
pub mod error;
pub mod handler;
pub mod machine;
pub mod money;

pub use config::CoffeeMachineConfig;
pub use error::{MachineError, MachineResult, MoneyError};
pub use handler::{
    register_brew_handler, register_order_log_observer, BrewRequest, BREW_COFFEE, ORDER_LOG,
};
pub use machine::{BrewResult, Change, CoffeeInstance, CoffeeMachine};
pub use money::Money;
