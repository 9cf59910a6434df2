//! Sensor backends for the encoder stack.
//!
//! - `SimulatedBus` / `SimulatedPowerRail`: in-process model of AS5048B devices
//!   sharing one bus, used by tests and by the CLI without `--features hardware`.
//! - `as5048b` (feature `hardware`, Linux): `rppal` I2C + GPIO backend.
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod as5048b;
pub mod error;
pub mod registers;

use encoder_traits::{AngleSensorBus, BusError, PowerSwitch};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::trace;

use crate::error::HwError;
use crate::registers::{PIN_STRAPPED_MASK, address_register_value, counts_to_degrees, degrees_to_counts};

/// Simulated companion power rail. Clones share state with the bus that watches them.
#[derive(Debug, Clone)]
pub struct SimulatedPowerRail {
    on: Arc<AtomicBool>,
    // Bumped on every off transition so a bus notices power cycles it did not observe.
    off_cycles: Arc<AtomicU32>,
    switches: Arc<AtomicU32>,
}

impl Default for SimulatedPowerRail {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPowerRail {
    /// A rail that starts powered, like the hardware after boot.
    pub fn new() -> Self {
        Self {
            on: Arc::new(AtomicBool::new(true)),
            off_cycles: Arc::new(AtomicU32::new(0)),
            switches: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }

    /// Number of `set_power` calls seen so far.
    pub fn switch_count(&self) -> u32 {
        self.switches.load(Ordering::Relaxed)
    }

    fn off_cycles(&self) -> u32 {
        self.off_cycles.load(Ordering::Relaxed)
    }
}

impl PowerSwitch for SimulatedPowerRail {
    fn set_power(&mut self, on: bool) -> Result<(), BusError> {
        self.switches.fetch_add(1, Ordering::Relaxed);
        let was_on = self.on.swap(on, Ordering::Relaxed);
        if was_on && !on {
            self.off_cycles.fetch_add(1, Ordering::Relaxed);
        }
        trace!(on, "simulated power rail");
        Ok(())
    }
}

/// One simulated AS5048B.
#[derive(Debug, Clone)]
pub struct SimDevice {
    factory_address: u8,
    address: u8,
    switched: bool,
    angle_deg: f32,
    jitter_deg: f32,
    fail_reads: u32,
    reads: u32,
}

impl SimDevice {
    pub fn new(factory_address: u8, angle_deg: f32) -> Self {
        Self {
            factory_address,
            address: factory_address,
            switched: false,
            angle_deg,
            jitter_deg: 0.0,
            fail_reads: 0,
            reads: 0,
        }
    }

    /// Supply this device from the switched companion rail.
    pub fn on_switched_rail(mut self) -> Self {
        self.switched = true;
        self
    }

    /// Alternate `+jitter` / `-jitter` on successive reads.
    pub fn with_jitter(mut self, jitter_deg: f32) -> Self {
        self.jitter_deg = jitter_deg.abs();
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn angle_deg(&self) -> f32 {
        self.angle_deg
    }

    pub fn is_switched(&self) -> bool {
        self.switched
    }
}

/// In-process bus holding several `SimDevice`s.
///
/// Unpowered devices stay silent, a power cycle restores the factory address,
/// and two powered devices at the same address collide.
#[derive(Debug)]
pub struct SimulatedBus {
    devices: Vec<SimDevice>,
    rail: SimulatedPowerRail,
    seen_off_cycles: u32,
    transactions: u64,
}

impl SimulatedBus {
    pub fn new(rail: SimulatedPowerRail) -> Self {
        let seen_off_cycles = rail.off_cycles();
        Self {
            devices: Vec::new(),
            rail,
            seen_off_cycles,
            transactions: 0,
        }
    }

    pub fn with_device(mut self, device: SimDevice) -> Self {
        self.devices.push(device);
        self
    }

    pub fn add_device(&mut self, device: SimDevice) -> usize {
        self.devices.push(device);
        self.devices.len() - 1
    }

    pub fn device(&self, index: usize) -> Option<&SimDevice> {
        self.devices.get(index)
    }

    pub fn set_angle(&mut self, index: usize, angle_deg: f32) {
        if let Some(d) = self.devices.get_mut(index) {
            d.angle_deg = angle_deg;
        }
    }

    pub fn set_jitter(&mut self, index: usize, jitter_deg: f32) {
        if let Some(d) = self.devices.get_mut(index) {
            d.jitter_deg = jitter_deg.abs();
        }
    }

    /// Make the next `n` angle reads of device `index` fail.
    pub fn fail_next_reads(&mut self, index: usize, n: u32) {
        if let Some(d) = self.devices.get_mut(index) {
            d.fail_reads = n;
        }
    }

    /// Addresses currently answering, in device order.
    pub fn live_addresses(&mut self) -> Vec<u8> {
        self.sync_power();
        let rail_on = self.rail.is_on();
        self.devices
            .iter()
            .filter(|d| rail_on || !d.switched)
            .map(|d| d.address)
            .collect()
    }

    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    fn sync_power(&mut self) {
        let cycles = self.rail.off_cycles();
        if cycles != self.seen_off_cycles {
            for d in self.devices.iter_mut().filter(|d| d.switched) {
                d.address = d.factory_address;
            }
            self.seen_off_cycles = cycles;
        }
        if !self.rail.is_on() {
            for d in self.devices.iter_mut().filter(|d| d.switched) {
                d.address = d.factory_address;
            }
        }
    }

    fn responder(&mut self, address: u8) -> Result<usize, HwError> {
        self.sync_power();
        self.transactions += 1;
        let rail_on = self.rail.is_on();
        let mut found = self
            .devices
            .iter()
            .enumerate()
            .filter(|(_, d)| (rail_on || !d.switched) && d.address == address)
            .map(|(i, _)| i);
        match (found.next(), found.next()) {
            (Some(i), None) => Ok(i),
            (Some(_), Some(_)) => Err(HwError::BusCollision { address }),
            (None, _) => Err(HwError::Nack { address }),
        }
    }
}

impl AngleSensorBus for SimulatedBus {
    fn probe(&mut self, address: u8) -> bool {
        match self.responder(address) {
            Ok(_) => true,
            // Every device on the address still acknowledges.
            Err(HwError::BusCollision { .. }) => true,
            Err(_) => false,
        }
    }

    fn read_angle(&mut self, address: u8) -> Result<f32, BusError> {
        let idx = self.responder(address)?;
        let d = &mut self.devices[idx];
        if d.fail_reads > 0 {
            d.fail_reads -= 1;
            return Err(Box::new(HwError::Nack { address }));
        }
        let sign = if d.reads % 2 == 0 { 1.0 } else { -1.0 };
        d.reads = d.reads.wrapping_add(1);
        let deg = counts_to_degrees(degrees_to_counts(d.angle_deg + sign * d.jitter_deg));
        trace!(address, deg, "simulated angle read");
        Ok(deg)
    }

    fn program_address(&mut self, old: u8, new: u8) -> Result<(), BusError> {
        // Validates the strapped bits the same way the device register would.
        address_register_value(old, new)?;
        let idx = self.responder(old)?;
        debug_assert_eq!(old & PIN_STRAPPED_MASK, new & PIN_STRAPPED_MASK);
        self.devices[idx].address = new;
        trace!(old, new, "simulated address programmed");
        Ok(())
    }
}
