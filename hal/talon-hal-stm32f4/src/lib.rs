//! STM32F4 peripheral layer for Talon
//!
//! Turns the shared, stateful peripherals of an STM32F4 into lazily created
//! per-pin and per-controller objects. Register access is delegated to a
//! vendor driver behind the [`driver::Driver`] trait; this crate owns the
//! resource model, the configuration translation and the interrupt routing.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        Stm32f4                            │
//! │     ResourceCache: Gpio │ Spi1-3 │ I2c1-2 │ Uart3          │
//! ├───────────────┬───────────────────┬───────────────────────┤
//! │ gpio          │ spi / i2c / uart  │ exti                  │
//! │ Peripheral    │ Config → init     │ 7 vectors → 16 slots  │
//! │ Pin (Mode)    │ record, transfers │ SysTick callback      │
//! ├───────────────┴───────────────────┴───────────────────────┤
//! │            driver::Driver (vendor routines)               │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - `defmt` - Enable debug formatting and logging
//! - `mock` - Export [`driver::mock::MockDriver`] for host-side tests
//! - `critical-section-impl` - Use cortex-m's single-core critical section
//!
//! # Usage
//!
//! ```ignore
//! let system = Stm32f4::new(&driver)?;
//! let led = system.gpio().pin(Port::B, 13, Some(Mode::Output));
//! led.set(PinState::High);
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod cache;
pub mod clock;
pub mod critical;
pub mod driver;
pub mod error;
pub mod exti;
pub mod gpio;
pub mod handle;
pub mod i2c;
pub mod regs;
pub mod spi;
pub mod system;
pub mod uart;

pub use clock::ClockConfig;
pub use critical::run_exclusive;
pub use driver::Driver;
pub use error::{Error, Status};
pub use exti::{dispatch_exti, on_system_tick, register_system_tick_handler, ExtiLine};
pub use gpio::{Edge, Mode, Pin, Port};
pub use i2c::I2cConfig;
pub use spi::{SpiConfig, SpiPins};
pub use system::{HalVersion, Stm32f4};
pub use uart::UartConfig;

// Re-export shared types from talon-hal
pub use talon_hal::{PinState, Pull};

/// Serializes tests that touch process-wide state
#[cfg(test)]
pub(crate) mod test_lock {
    use std::sync::{Mutex, MutexGuard};

    static LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn acquire() -> MutexGuard<'static, ()> {
        LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}
