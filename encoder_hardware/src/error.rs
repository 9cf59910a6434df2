use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("i2c error: {0}")]
    I2c(String),
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("no acknowledge from device at {address:#04x}")]
    Nack { address: u8 },
    #[error("bus collision: more than one device answers at {address:#04x}")]
    BusCollision { address: u8 },
    #[error("cannot move {old:#04x} to {new:#04x}: low address bits are pin-strapped")]
    AddressMismatch { old: u8, new: u8 },
    #[error("i2c read timeout")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
