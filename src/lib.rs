//! # Brewbus
//!
//! An in-process event bus that runs registered handlers and observers on a
//! bounded worker pool, and delivers each dispatch's result through a
//! single-assignment deferred value. The bundled application puts a coffee
//! machine behind the bus.
//!
//! ## Architecture
//!
//! Brewbus is organized as a workspace with multiple crates:
//!
//! 1. **brewbus-core** - Event bus, worker pool, deferred results, errors
//! 2. **brewbus-machine** - Money, coffee machine, brew handler and order log
//! 3. **brewbus-settings** - Configuration file loading and validation
//! 4. **brewbus** - Startup wiring and the command line binary

use std::sync::Arc;
use std::time::Duration;

pub use brewbus_core::{
    BusError, Deferred, DispatchError, DispatchOptions, Event, EventBus, EventBusConfig,
    EventType, Outcome, Resolver, RunState,
};
pub use brewbus_machine::{
    BrewRequest, BrewResult, CoffeeMachine, CoffeeMachineConfig, MachineError, Money,
};
pub use brewbus_settings::{AppConfig, SettingsError};

use brewbus_machine::{register_brew_handler, register_order_log_observer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version with the build date (set at compile time), shown by `brewbus --version`
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("BREWBUS_BUILD_DATE"),
    ")"
);

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output on stderr, keeping stdout for results
/// - RUST_LOG environment variable support, `info` otherwise
/// - Thread names and line numbers
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Why a brew order did not produce a result
#[derive(thiserror::Error, Debug)]
pub enum OrderError {
    /// The bus refused the dispatch
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The dispatch was rejected or the wait timed out
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The handler resolved with something that is not a brew result
    #[error("Unexpected brew result: {0}")]
    Decode(#[from] serde_json::Error),
}

impl OrderError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> u8 {
        let OrderError::Dispatch(err) = self else {
            return 1;
        };
        match err.downcast_ref::<MachineError>() {
            Some(MachineError::NotFound { .. }) => 3,
            Some(MachineError::InsufficientFunds { .. }) => 4,
            Some(MachineError::UnrepresentableChange { .. }) => 5,
            Some(MachineError::InvalidRequest { .. } | MachineError::Money(_)) => 6,
            Some(MachineError::InvalidConfig { .. }) => 1,
            None if err.is_timeout() => 7,
            None => 1,
        }
    }
}

/// A running bus with a coffee machine registered on it
pub struct Brewery {
    bus: EventBus,
    machine: Arc<CoffeeMachine>,
}

impl Brewery {
    /// Build the machine and bus from the configuration and wire them together
    ///
    /// With `auto_start` enabled this must be called from within a tokio runtime.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let machine = Arc::new(CoffeeMachine::new(config.machine.clone())?);
        let bus = EventBus::with_config(config.bus.clone())?;

        register_brew_handler(&bus, machine.clone())?;
        register_order_log_observer(&bus)?;
        tracing::info!(
            "Brewery ready: {} coffees, {} workers",
            config.machine.coffees.len(),
            config.bus.pool_size
        );

        Ok(Self { bus, machine })
    }

    /// Dispatch a brew request and wait for its result
    pub async fn order(
        &self,
        request: BrewRequest,
        timeout: Option<Duration>,
    ) -> Result<BrewResult, OrderError> {
        let deferred = self
            .bus
            .dispatch(request.into_event()?, DispatchOptions::enforced())
            .await?;

        let value = match timeout {
            Some(timeout) => deferred.wait_timeout(timeout).await?,
            None => deferred.wait().await?,
        };
        Ok(serde_json::from_value(value)?)
    }

    /// Stop the bus once queued orders are finished
    pub async fn shutdown(&self) {
        self.bus.stop().await;
    }

    /// The underlying event bus
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The coffee machine behind the brew handler
    pub fn machine(&self) -> &Arc<CoffeeMachine> {
        &self.machine
    }
}

impl std::fmt::Debug for Brewery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Brewery")
            .field("bus", &self.bus)
            .field("denominations", &self.machine.denominations())
            .finish()
    }
}
