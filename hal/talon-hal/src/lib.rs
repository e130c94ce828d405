//! Talon Hardware Abstraction Layer
//!
//! This crate defines the portable side of the Talon peripheral layer:
//! traits that application code programs against, and the chip-independent
//! parameter enums that chip crates translate into vendor register values.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application code                       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  talon-hal (this crate - traits)        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  talon-hal-stm32f4                      │
//! │  (pins, controllers, interrupt routing) │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  vendor driver routines                 │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::DigitalIn`], [`gpio::DigitalOut`], [`gpio::ToggleableDigitalOut`] - Digital I/O
//! - [`uart::UartTx`], [`uart::UartRx`] - Serial communication
//! - [`i2c::I2cBus`], [`i2c::I2cMemory`] - I2C bus operations
//! - [`spi::SpiBus`] - SPI bus operations
//!
//! All transfer operations block until completion or until `timeout_ms`
//! milliseconds have elapsed.

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod i2c;
pub mod spi;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use gpio::{DigitalIn, DigitalOut, PinState, Pull, ToggleableDigitalOut};
pub use i2c::{I2cBus, I2cMemory};
pub use spi::SpiBus;
pub use uart::{UartRx, UartTx};
