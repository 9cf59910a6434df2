//! Companion power rail and the one-time address provisioning sequence.
//!
//! Two sensors ship with the same factory address. The companion is supplied
//! from a switchable rail; while it is off, the other sensor is alone on the
//! factory address and can be moved to `base + address_addon`. When the
//! companion comes back it still holds the factory address, so both are
//! addressable. The address register is volatile, so this runs on every
//! bring-up.
//!
//! Sequence (`ConflictResolver::provision`):
//! 1. rail off
//! 2. if a sensor already answers at the target address, skip programming
//! 3. otherwise program `base -> target` and verify
//! 4. rail on and wait for the companion to power up, whatever happened above

use std::sync::Arc;
use std::time::Duration;

use encoder_traits::clock::{Clock, MonotonicClock};
use encoder_traits::{AngleSensorBus, BusError, PowerSwitch};
use eyre::WrapErr;
use tracing::{debug, info, warn};

use crate::error::{EncoderError, Result};
use crate::hw_error::map_bus_error;

/// What `provision` did to the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The sensor was moved to the target address.
    Programmed,
    /// A sensor already answered at the target address; nothing was written.
    AlreadyAddressed,
}

/// Power switch for buses without a companion rail. Switching off is refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRail;

impl PowerSwitch for NoRail {
    fn set_power(&mut self, on: bool) -> std::result::Result<(), BusError> {
        if on {
            Ok(())
        } else {
            Err(Box::new(std::io::Error::other(
                "no companion power rail configured",
            )))
        }
    }
}

/// Single owner of the companion power rail.
///
/// Bring-up code borrows it mutably, so only one provisioning sequence can
/// drive the rail at a time.
pub struct ConflictResolver<P: PowerSwitch> {
    rail: P,
    clock: Arc<dyn Clock + Send + Sync>,
    power_up: Duration,
    powered: Option<bool>,
}

impl<P: PowerSwitch> core::fmt::Debug for ConflictResolver<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConflictResolver")
            .field("power_up", &self.power_up)
            .field("powered", &self.powered)
            .finish()
    }
}

impl<P: PowerSwitch> ConflictResolver<P> {
    pub fn new(rail: P, power_up: Duration) -> Self {
        Self {
            rail,
            clock: Arc::new(MonotonicClock::new()),
            power_up,
            powered: None,
        }
    }

    /// Use a custom clock for the power-up wait (tests use `ManualClock`).
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Last state successfully commanded; `None` before the first switch.
    pub fn is_powered(&self) -> Option<bool> {
        self.powered
    }

    pub fn rail(&self) -> &P {
        &self.rail
    }

    /// Power the companion sensor on or off.
    pub fn switch_conflicting_sensor(&mut self, power_on: bool) -> Result<()> {
        self.rail
            .set_power(power_on)
            .map_err(|e| EncoderError::PowerRail(map_bus_error(&e).to_string()))?;
        self.powered = Some(power_on);
        debug!(power_on, "companion sensor power");
        Ok(())
    }

    /// Move the sensor at `base` to `target` with the companion isolated.
    ///
    /// The rail is switched back on before returning, on success and on error.
    pub fn provision<B: AngleSensorBus + ?Sized>(
        &mut self,
        bus: &mut B,
        base: u8,
        target: u8,
    ) -> Result<ProvisionOutcome> {
        let outcome = self.isolate_and_program(bus, base, target);

        let restored = self.switch_conflicting_sensor(true);
        if restored.is_ok() {
            self.clock.sleep(self.power_up);
        }

        match (outcome, restored) {
            (Ok(o), Ok(())) => {
                info!(base, target, outcome = ?o, "sensor address provisioned");
                Ok(o)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(_), Err(e)) => Err(e.wrap_err("restoring companion power")),
            (Err(e), Err(rail)) => {
                warn!(error = %rail, "companion power could not be restored");
                Err(e)
            }
        }
    }

    fn isolate_and_program<B: AngleSensorBus + ?Sized>(
        &mut self,
        bus: &mut B,
        base: u8,
        target: u8,
    ) -> Result<ProvisionOutcome> {
        self.switch_conflicting_sensor(false)
            .wrap_err("isolating companion sensor")?;

        if bus.probe(target) {
            debug!(target, "sensor already at target address");
            return Ok(ProvisionOutcome::AlreadyAddressed);
        }
        if !bus.probe(base) {
            return Err(EncoderError::AddressProgramming(format!(
                "no sensor answers at {base:#04x}"
            ))
            .into());
        }
        bus.program_address(base, target).map_err(|e| {
            EncoderError::AddressProgramming(format!(
                "{base:#04x} -> {target:#04x}: {}",
                map_bus_error(&e)
            ))
        })?;
        if !bus.probe(target) {
            return Err(EncoderError::AddressProgramming(format!(
                "sensor does not answer at {target:#04x} after programming"
            ))
            .into());
        }
        Ok(ProvisionOutcome::Programmed)
    }
}
