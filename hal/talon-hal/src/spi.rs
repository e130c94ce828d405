//! SPI bus abstractions
//!
//! Provides traits for SPI master operations that can be implemented
//! by chip-specific HALs.

/// SPI bus master
///
/// Provides basic blocking SPI operations for communicating with
/// peripheral devices.
pub trait SpiBus {
    /// Error type for SPI operations
    type Error;

    /// Write data without reading
    fn write(&self, data: &[u8], timeout_ms: u32) -> Result<(), Self::Error>;

    /// Read data into `buf`, returning the number of bytes read
    fn read(&self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Transfer data (simultaneous read/write)
    ///
    /// Writes data from `write` buffer while reading into `read` buffer.
    /// Both buffers must be the same length.
    fn transfer(&self, read: &mut [u8], write: &[u8], timeout_ms: u32)
        -> Result<(), Self::Error>;
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

/// Bit order on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Most significant bit first
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_split() {
        let (polarity, phase) = Mode::Mode3.into();
        assert_eq!(polarity, Polarity::IdleHigh);
        assert_eq!(phase, Phase::CaptureOnSecondTransition);

        let (polarity, phase) = Mode::Mode0.into();
        assert_eq!(polarity, Polarity::IdleLow);
        assert_eq!(phase, Phase::CaptureOnFirstTransition);
    }
}
