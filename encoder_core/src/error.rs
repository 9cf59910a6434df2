use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncoderError {
    #[error("communication error: {0}")]
    Communication(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("address programming failed: {0}")]
    AddressProgramming(String),
    #[error("power rail error: {0}")]
    PowerRail(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("no samples to evaluate")]
    NoSamples,
    #[error("sensor too noisy: variance {variance:.4} >= {threshold:.4} deg^2")]
    TooNoisy { variance: f32, threshold: f32 },
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing sensor bus")]
    MissingBus,
    #[error("missing joint config handle")]
    MissingConfig,
    #[error("missing joint setup")]
    MissingSetup,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
