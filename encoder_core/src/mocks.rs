//! Test and helper mocks for encoder_core

use std::collections::VecDeque;

use encoder_traits::{AngleSensorBus, BusError};

/// A single-sensor bus that replays a script of readings.
///
/// `Some(deg)` entries are returned as reads, `None` entries fail. Once the
/// script is exhausted every read returns the fallback (or fails without one).
#[derive(Debug, Clone)]
pub struct ScriptedBus {
    address: Option<u8>,
    script: VecDeque<Option<f32>>,
    fallback: Option<f32>,
    reads: usize,
}

impl ScriptedBus {
    pub fn new(address: u8) -> Self {
        Self {
            address: Some(address),
            script: VecDeque::new(),
            fallback: None,
            reads: 0,
        }
    }

    /// A bus where nothing answers.
    pub fn empty() -> Self {
        Self {
            address: None,
            script: VecDeque::new(),
            fallback: None,
            reads: 0,
        }
    }

    pub fn then_angles(mut self, angles: &[f32]) -> Self {
        self.script.extend(angles.iter().copied().map(Some));
        self
    }

    pub fn then_failures(mut self, n: usize) -> Self {
        self.script.extend(std::iter::repeat_n(None, n));
        self
    }

    pub fn with_fallback(mut self, angle: f32) -> Self {
        self.fallback = Some(angle);
        self
    }

    /// Number of `read_angle` calls that reached the sensor.
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn address(&self) -> Option<u8> {
        self.address
    }
}

impl AngleSensorBus for ScriptedBus {
    fn probe(&mut self, address: u8) -> bool {
        self.address == Some(address)
    }

    fn read_angle(&mut self, address: u8) -> Result<f32, BusError> {
        if self.address != Some(address) {
            return Err(Box::new(std::io::Error::other(format!(
                "no device at {address:#04x}"
            ))));
        }
        self.reads += 1;
        let next = match self.script.pop_front() {
            Some(entry) => entry,
            None => self.fallback,
        };
        next.ok_or_else(|| -> BusError { Box::new(std::io::Error::other("scripted read failure")) })
    }

    fn program_address(&mut self, old: u8, new: u8) -> Result<(), BusError> {
        if self.address != Some(old) {
            return Err(Box::new(std::io::Error::other(format!(
                "no device at {old:#04x}"
            ))));
        }
        self.address = Some(new);
        Ok(())
    }
}
