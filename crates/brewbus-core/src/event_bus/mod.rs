//! # Event Bus Module
//!
//! Decouples producers of events from their consumers with two fan-out
//! disciplines:
//! - exactly one **handler** per event type, which settles the deferred result
//!   returned to the dispatcher
//! - any number of **observers** per event type, run on every dispatch for
//!   their side effects only
//!
//! ## Usage
//!
//! ```rust,ignore
//! use brewbus_core::event_bus::{DispatchOptions, Event, EventBus, EventBusConfig};
//!
//! let bus = EventBus::with_config(EventBusConfig::default())?;
//!
//! bus.add_observer("brew_coffee", "audit", |args| {
//!     tracing::info!("brew requested: {:?}", args);
//!     Ok(())
//! })?;
//!
//! bus.add_handler("brew_coffee", |args, resolver| {
//!     resolver.resolve(serde_json::json!({ "coffee": args[0] }));
//!     Ok(())
//! })?;
//!
//! let event = Event::with_args("brew_coffee", vec!["latte".into(), "2.10".into()])?;
//! let deferred = bus.dispatch(event, DispatchOptions::enforced()).await?;
//! let body = deferred.wait().await?;
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
