//! Error types and vendor status mapping

use core::fmt;

/// Errors reported by the peripheral layer
///
/// Every status code returned by the vendor driver maps onto exactly one of
/// these, or onto success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Generic hardware fault
    UnknownError,
    /// Peripheral is engaged in another transfer
    Busy,
    /// Operation did not complete within its bound
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownError => write!(f, "Hardware error"),
            Error::Busy => write!(f, "Peripheral busy"),
            Error::Timeout => write!(f, "Operation timeout"),
        }
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Error::Timeout => embedded_io::ErrorKind::TimedOut,
            Error::Busy | Error::UnknownError => embedded_io::ErrorKind::Other,
        }
    }
}

// The vendor status does not say why a transfer failed
impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        embedded_hal::i2c::ErrorKind::Other
    }
}

/// Raw status code returned by a vendor driver routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u32);

impl Status {
    pub const OK: Status = Status(0);
    pub const ERROR: Status = Status(1);
    pub const BUSY: Status = Status(2);
    pub const TIMEOUT: Status = Status(3);

    /// Map the status onto the error taxonomy
    ///
    /// # Panics
    ///
    /// An unrecognized code means an unsupported driver revision or
    /// corrupted state; it is treated as fatal.
    pub fn check(self) -> Result<(), Error> {
        match self {
            Status::OK => Ok(()),
            Status::ERROR => Err(Error::UnknownError),
            Status::BUSY => Err(Error::Busy),
            Status::TIMEOUT => Err(Error::Timeout),
            Status(code) => panic!("unknown HAL status {}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Status::OK.check(), Ok(()));
        assert_eq!(Status::ERROR.check(), Err(Error::UnknownError));
        assert_eq!(Status::BUSY.check(), Err(Error::Busy));
        assert_eq!(Status::TIMEOUT.check(), Err(Error::Timeout));
    }

    #[test]
    #[should_panic(expected = "unknown HAL status")]
    fn test_unknown_status_is_fatal() {
        let _ = Status(0x7F).check();
    }

    #[test]
    fn test_io_error_kind() {
        use embedded_io::Error as _;
        assert_eq!(Error::Timeout.kind(), embedded_io::ErrorKind::TimedOut);
        assert_eq!(Error::Busy.kind(), embedded_io::ErrorKind::Other);
    }
}
