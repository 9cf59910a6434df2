//! Maps `Box<dyn Error>` from trait boundaries to typed `EncoderError`.
//!
//! The traits in `encoder_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `encoder_hardware::HwError` downcasting.

use crate::error::EncoderError;

/// Map a trait-boundary error to a typed `EncoderError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> EncoderError {
    #[cfg(feature = "hardware-errors")]
    {
        use encoder_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => EncoderError::Timeout,
                HwError::AddressMismatch { .. } => {
                    EncoderError::AddressProgramming(hw.to_string())
                }
                HwError::Gpio(_) => EncoderError::PowerRail(hw.to_string()),
                other => EncoderError::Communication(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        EncoderError::Timeout
    } else {
        EncoderError::Communication(s)
    }
}

/// Same as `map_hw_error` for the boxed form returned by the traits.
#[inline]
pub fn map_bus_error(e: &encoder_traits::BusError) -> EncoderError {
    map_hw_error(&**e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_text_maps_to_timeout() {
        let e: encoder_traits::BusError = Box::new(std::io::Error::other("read Timeout"));
        assert_eq!(map_bus_error(&e), EncoderError::Timeout);
    }

    #[test]
    fn other_text_maps_to_communication() {
        let e: encoder_traits::BusError = Box::new(std::io::Error::other("crc"));
        assert!(matches!(map_bus_error(&e), EncoderError::Communication(m) if m == "crc"));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hardware_errors_are_downcast() {
        use encoder_hardware::error::HwError;
        let e: encoder_traits::BusError = Box::new(HwError::AddressMismatch { old: 0x40, new: 0x41 });
        assert!(matches!(map_bus_error(&e), EncoderError::AddressProgramming(_)));
        let e: encoder_traits::BusError = Box::new(HwError::Nack { address: 0x40 });
        assert!(matches!(map_bus_error(&e), EncoderError::Communication(_)));
    }
}
