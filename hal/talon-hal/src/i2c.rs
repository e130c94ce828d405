//! I2C bus abstractions
//!
//! Provides traits for I2C master operations that can be implemented
//! by chip-specific HALs.

/// I2C bus master
///
/// Provides basic I2C read/write operations for communicating with
/// peripheral devices.
pub trait I2cBus {
    /// Error type for I2C operations
    type Error;

    /// Write data to a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `data` - Bytes to write
    /// * `stop` - Whether to finish with a STOP condition
    /// * `timeout_ms` - Upper bound for the whole transfer
    fn write(&self, address: u8, data: &[u8], stop: bool, timeout_ms: u32)
        -> Result<(), Self::Error>;

    /// Read data from a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `buf` - Buffer to read into
    /// * `stop` - Whether to finish with a STOP condition
    /// * `timeout_ms` - Upper bound for the whole transfer
    fn read(&self, address: u8, buf: &mut [u8], stop: bool, timeout_ms: u32)
        -> Result<(), Self::Error>;
}

/// Register-addressed I2C access
///
/// Most sensors expose an 8-bit register map; these operations send the
/// register address and transfer the payload in one transaction.
pub trait I2cMemory {
    /// Error type for I2C operations
    type Error;

    /// Read `buf.len()` bytes starting at `register`
    fn read_register(&self, address: u8, register: u8, buf: &mut [u8], timeout_ms: u32)
        -> Result<(), Self::Error>;

    /// Write `data` starting at `register`
    fn write_register(&self, address: u8, register: u8, data: &[u8], timeout_ms: u32)
        -> Result<(), Self::Error>;
}
