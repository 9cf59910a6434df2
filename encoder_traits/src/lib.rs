//! Capability traits shared by the encoder stack.
//!
//! Hardware backends implement these; `encoder_core` only ever talks to them.
//! Errors cross this boundary boxed so backends stay free to use their own
//! error types.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::sync::{Arc, Mutex};

/// Boxed error returned across the trait boundary.
pub type BusError = Box<dyn std::error::Error + Send + Sync>;

/// A bus carrying one or more absolute-angle sensors, each at a 7-bit address.
///
/// Every method is one blocking bus transaction.
pub trait AngleSensorBus {
    /// True when a device acknowledges at `address`.
    fn probe(&mut self, address: u8) -> bool;

    /// Read the current angle in degrees, `[0, 360)`.
    fn read_angle(&mut self, address: u8) -> Result<f32, BusError>;

    /// Move the device answering at `old` to `new`.
    fn program_address(&mut self, old: u8, new: u8) -> Result<(), BusError>;
}

/// The enable line powering the companion sensor.
pub trait PowerSwitch {
    fn set_power(&mut self, on: bool) -> Result<(), BusError>;
}

impl<B: AngleSensorBus + ?Sized> AngleSensorBus for Box<B> {
    fn probe(&mut self, address: u8) -> bool {
        (**self).probe(address)
    }
    fn read_angle(&mut self, address: u8) -> Result<f32, BusError> {
        (**self).read_angle(address)
    }
    fn program_address(&mut self, old: u8, new: u8) -> Result<(), BusError> {
        (**self).program_address(old, new)
    }
}

impl<B: AngleSensorBus + ?Sized> AngleSensorBus for &mut B {
    fn probe(&mut self, address: u8) -> bool {
        (**self).probe(address)
    }
    fn read_angle(&mut self, address: u8) -> Result<f32, BusError> {
        (**self).read_angle(address)
    }
    fn program_address(&mut self, old: u8, new: u8) -> Result<(), BusError> {
        (**self).program_address(old, new)
    }
}

/// One physical bus shared by several joints: every transaction takes the lock.
///
/// A poisoned lock is reported as a failed transaction.
impl<B: AngleSensorBus + ?Sized> AngleSensorBus for Arc<Mutex<B>> {
    fn probe(&mut self, address: u8) -> bool {
        match self.lock() {
            Ok(mut bus) => bus.probe(address),
            Err(_) => false,
        }
    }
    fn read_angle(&mut self, address: u8) -> Result<f32, BusError> {
        let mut bus = self.lock().map_err(|_| poisoned())?;
        bus.read_angle(address)
    }
    fn program_address(&mut self, old: u8, new: u8) -> Result<(), BusError> {
        let mut bus = self.lock().map_err(|_| poisoned())?;
        bus.program_address(old, new)
    }
}

impl<P: PowerSwitch + ?Sized> PowerSwitch for Box<P> {
    fn set_power(&mut self, on: bool) -> Result<(), BusError> {
        (**self).set_power(on)
    }
}

impl<P: PowerSwitch + ?Sized> PowerSwitch for &mut P {
    fn set_power(&mut self, on: bool) -> Result<(), BusError> {
        (**self).set_power(on)
    }
}

fn poisoned() -> BusError {
    Box::new(std::io::Error::other("bus lock poisoned"))
}
