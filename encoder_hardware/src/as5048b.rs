use rppal::gpio::{Gpio, OutputPin};
use rppal::i2c::I2c;
use tracing::{debug, trace, warn};

use crate::error::{HwError, Result};
use crate::registers::{
    REG_ANGLE_MSB, REG_I2C_ADDRESS, REG_PROBE, address_register_value, angle_counts,
    counts_to_degrees,
};

fn transfer_error(address: u8, e: rppal::i2c::Error) -> HwError {
    match e {
        rppal::i2c::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => HwError::Timeout,
        _ => HwError::Nack { address },
    }
}

/// Every AS5048B on one Linux I2C bus (`/dev/i2c-N`).
pub struct As5048bBus {
    i2c: I2c,
    current: Option<u8>,
    retries: u8,
}

impl As5048bBus {
    pub fn new(bus: u8, timeout_ms: u32) -> Result<Self> {
        let i2c = I2c::with_bus(bus).map_err(|e| HwError::I2c(format!("open i2c-{bus}: {e}")))?;
        i2c.set_timeout(timeout_ms)
            .map_err(|e| HwError::I2c(format!("set timeout: {e}")))?;
        Ok(Self {
            i2c,
            current: None,
            retries: 2,
        })
    }

    fn select(&mut self, address: u8) -> Result<()> {
        if self.current != Some(address) {
            self.i2c
                .set_slave_address(u16::from(address))
                .map_err(|e| HwError::I2c(e.to_string()))?;
            self.current = Some(address);
        }
        Ok(())
    }

    fn read_counts(&mut self, address: u8) -> Result<u16> {
        self.select(address)?;
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(&[REG_ANGLE_MSB], &mut buf)
            .map_err(|e| transfer_error(address, e))?;
        let counts = angle_counts(buf[0], buf[1]);
        trace!(address, counts, "as5048b raw read");
        Ok(counts)
    }

    pub fn read_degrees(&mut self, address: u8) -> Result<f32> {
        let mut attempts = 0;
        loop {
            match self.read_counts(address) {
                Ok(counts) => return Ok(counts_to_degrees(counts)),
                Err(HwError::Nack { .. }) if attempts < self.retries => {
                    attempts += 1;
                    warn!(address, retries = attempts, "angle read not acknowledged, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn probe_address(&mut self, address: u8) -> bool {
        if self.select(address).is_err() {
            return false;
        }
        let mut buf = [0u8; 1];
        self.i2c.write_read(&[REG_PROBE], &mut buf).is_ok()
    }

    pub fn reprogram(&mut self, old: u8, new: u8) -> Result<()> {
        let value = address_register_value(old, new)?;
        self.select(old)?;
        self.i2c
            .smbus_write_byte(REG_I2C_ADDRESS, value)
            .map_err(|e| transfer_error(old, e))?;
        // The device answers at the new address from the next transaction on.
        self.current = None;
        debug!(old, new, value, "as5048b address register written");
        Ok(())
    }
}

impl encoder_traits::AngleSensorBus for As5048bBus {
    fn probe(&mut self, address: u8) -> bool {
        self.probe_address(address)
    }

    fn read_angle(&mut self, address: u8) -> std::result::Result<f32, encoder_traits::BusError> {
        Ok(self.read_degrees(address)?)
    }

    fn program_address(
        &mut self,
        old: u8,
        new: u8,
    ) -> std::result::Result<(), encoder_traits::BusError> {
        Ok(self.reprogram(old, new)?)
    }
}

/// GPIO line driving the companion sensor's supply (high = powered).
pub struct GpioPowerRail {
    pin: OutputPin,
}

impl GpioPowerRail {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pin = gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))?
            .into_output();
        // Companion stays powered unless provisioning says otherwise.
        pin.set_high();
        Ok(Self { pin })
    }
}

impl encoder_traits::PowerSwitch for GpioPowerRail {
    fn set_power(&mut self, on: bool) -> std::result::Result<(), encoder_traits::BusError> {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        debug!(on, "companion power rail");
        Ok(())
    }
}
