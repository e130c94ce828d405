//! UART serial communication abstractions
//!
//! Provides traits for blocking serial communication that can be
//! implemented by chip-specific HALs.

/// UART transmitter
pub trait UartTx {
    /// Error type for transmit operations
    type Error;

    /// Write data to the UART
    ///
    /// Blocks until all data has been written, the timeout expires or an
    /// error occurs.
    fn write(&self, data: &[u8], timeout_ms: u32) -> Result<(), Self::Error>;
}

/// UART receiver
pub trait UartRx {
    /// Error type for receive operations
    type Error;

    /// Read data from the UART
    ///
    /// Returns the number of bytes read. A `timeout_ms` of zero polls for a
    /// single byte and reports `0` instead of a timeout when none is waiting.
    fn read(&self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Read a single byte from the UART
    fn read_byte(&self, timeout_ms: u32) -> Result<Option<u8>, Self::Error> {
        let mut buf = [0u8; 1];
        let n = self.read(&mut buf, timeout_ms)?;
        Ok((n == 1).then_some(buf[0]))
    }
}

/// Combined UART interface
///
/// For UARTs that provide both TX and RX on a single peripheral.
pub trait Uart: UartTx + UartRx {}

// Blanket implementation
impl<T: UartTx + UartRx> Uart for T {}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct OneByte {
        pending: Cell<Option<u8>>,
    }

    impl UartRx for OneByte {
        type Error = ();

        fn read(&self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, ()> {
            match self.pending.take() {
                Some(byte) => {
                    buf[0] = byte;
                    Ok(1)
                }
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_read_byte() {
        let rx = OneByte {
            pending: Cell::new(Some(0x42)),
        };
        assert_eq!(rx.read_byte(0), Ok(Some(0x42)));
        assert_eq!(rx.read_byte(0), Ok(None));
    }
}
