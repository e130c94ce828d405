//! Vendor driver capability
//!
//! Everything that touches registers is delegated to a vendor driver. The
//! peripheral layer only decides *what* to program; a [`Driver`] decides
//! *how*. Routines that the vendor reports a status for return [`Status`],
//! which callers map with [`Status::check`].
//!
//! The capability is split per peripheral family. Any type implementing all
//! of the family traits is a [`Driver`].
//!
//! [`Status::check`]: crate::error::Status::check

pub mod mock;

use crate::clock::ClockConfig;
use crate::error::Status;
use crate::gpio::Port;
use crate::handle::{GpioInit, I2cHandle, RegisterBlock, SpiHandle, UartHandle};

/// Peripheral clock gates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockGate {
    Gpio(Port),
    Spi1,
    Spi2,
    Spi3,
    I2c1,
    I2c2,
    Usart3,
}

/// Peripheral buses with their own clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bus {
    Apb1,
    Apb2,
}

/// Interrupt lines used by the peripheral layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Irq {
    SysTick,
    Exti0,
    Exti1,
    Exti2,
    Exti3,
    Exti4,
    Exti9_5,
    Exti15_10,
    Usart3,
}

impl Irq {
    /// Position in the vector table, relative to the first device interrupt
    pub const fn number(self) -> i16 {
        match self {
            Irq::SysTick => -1,
            Irq::Exti0 => 6,
            Irq::Exti1 => 7,
            Irq::Exti2 => 8,
            Irq::Exti3 => 9,
            Irq::Exti4 => 10,
            Irq::Exti9_5 => 23,
            Irq::Usart3 => 39,
            Irq::Exti15_10 => 40,
        }
    }
}

/// Core system services
pub trait SystemDriver {
    /// Bring up the vendor layer (flash, SysTick, NVIC grouping)
    fn init(&self) -> Status;

    /// Return peripherals to their reset state
    fn deinit(&self) -> Status;

    /// Program the clock tree
    fn setup_clocks(&self, config: &ClockConfig) -> Status;

    /// Packed vendor driver version word
    fn version(&self) -> u32;

    fn sysclk_frequency(&self) -> u32;

    fn bus_frequency(&self, bus: Bus) -> u32;

    /// Milliseconds since `init`
    fn tick(&self) -> u32;

    /// Advance the tick; called from the SysTick interrupt
    fn increment_tick(&self);

    /// Busy-wait against the tick
    fn delay_ms(&self, ms: u32);

    fn enable_clock(&self, gate: ClockGate);

    fn set_priority(&self, irq: Irq, preempt: u32, sub: u32);

    fn enable_irq(&self, irq: Irq);

    fn disable_irq(&self, irq: Irq);
}

/// GPIO and EXTI routines
pub trait GpioDriver {
    fn gpio_init(&self, port: RegisterBlock, init: &GpioInit);

    /// Return the pins in `mask` to their reset configuration
    fn gpio_deinit(&self, port: RegisterBlock, mask: u16);

    /// Input level of the pin in `mask`
    fn gpio_read(&self, port: RegisterBlock, mask: u16) -> bool;

    fn gpio_write(&self, port: RegisterBlock, mask: u16, high: bool);

    fn gpio_toggle(&self, port: RegisterBlock, mask: u16);

    /// Check the EXTI pending flag for `mask` and clear it if set
    ///
    /// Returns whether the flag was set.
    fn exti_check_and_clear(&self, mask: u16) -> bool;
}

/// SPI routines
pub trait SpiDriver {
    fn spi_init(&self, handle: &SpiHandle) -> Status;

    fn spi_transmit(&self, handle: &SpiHandle, data: &[u8], timeout_ms: u32) -> Status;

    fn spi_receive(&self, handle: &SpiHandle, buf: &mut [u8], timeout_ms: u32) -> Status;

    fn spi_transmit_receive(
        &self,
        handle: &SpiHandle,
        tx: &[u8],
        rx: &mut [u8],
        timeout_ms: u32,
    ) -> Status;

    /// Controller is idle and ready for the next transfer
    fn spi_is_ready(&self, handle: &SpiHandle) -> bool;
}

/// I2C routines
///
/// Device addresses are passed pre-shifted into the 8-bit bus format.
pub trait I2cDriver {
    fn i2c_init(&self, handle: &I2cHandle) -> Status;

    fn i2c_master_transmit(
        &self,
        handle: &I2cHandle,
        address: u16,
        data: &[u8],
        timeout_ms: u32,
    ) -> Status;

    fn i2c_master_receive(
        &self,
        handle: &I2cHandle,
        address: u16,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Status;

    fn i2c_mem_read(
        &self,
        handle: &I2cHandle,
        address: u16,
        register: u16,
        register_size: u16,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Status;

    fn i2c_mem_write(
        &self,
        handle: &I2cHandle,
        address: u16,
        register: u16,
        register_size: u16,
        data: &[u8],
        timeout_ms: u32,
    ) -> Status;

    /// Clear then set bits of the controller's CR1 register
    fn i2c_modify_control(&self, instance: RegisterBlock, clear: u32, set: u32);
}

/// UART routines
pub trait UartDriver {
    fn uart_init(&self, handle: &UartHandle) -> Status;

    fn uart_transmit(&self, handle: &UartHandle, data: &[u8], timeout_ms: u32) -> Status;

    fn uart_receive(&self, handle: &UartHandle, buf: &mut [u8], timeout_ms: u32) -> Status;
}

/// Complete vendor driver
pub trait Driver: SystemDriver + GpioDriver + SpiDriver + I2cDriver + UartDriver {}

impl<T> Driver for T where T: SystemDriver + GpioDriver + SpiDriver + I2cDriver + UartDriver {}
