//! Register block binding and vendor init records
//!
//! A peripheral is identified by the fixed base address of its register
//! block. The init records mirror the vendor driver's configuration structs
//! field for field; they carry already-translated discrete values.

use crate::regs;

/// Base address of a peripheral register block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterBlock(usize);

impl RegisterBlock {
    pub const SPI1: RegisterBlock = RegisterBlock(regs::SPI1_BASE);
    pub const SPI2: RegisterBlock = RegisterBlock(regs::SPI2_BASE);
    pub const SPI3: RegisterBlock = RegisterBlock(regs::SPI3_BASE);
    pub const I2C1: RegisterBlock = RegisterBlock(regs::I2C1_BASE);
    pub const I2C2: RegisterBlock = RegisterBlock(regs::I2C2_BASE);
    pub const USART3: RegisterBlock = RegisterBlock(regs::USART3_BASE);

    /// Bind an arbitrary base address
    pub const fn at(address: usize) -> Self {
        Self(address)
    }

    /// Register block of the GPIO port with the given index (A = 0)
    pub const fn gpio(index: usize) -> Self {
        Self(regs::AHB1PERIPH_BASE + regs::GPIO_PORT_STRIDE * index)
    }

    /// Physical base address
    pub const fn address(self) -> usize {
        self.0
    }
}

/// GPIO pin configuration record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpioInit {
    /// Pin mask; overwritten with the configured pin's mask on apply
    pub pin: u32,
    pub mode: u32,
    pub pull: u32,
    pub speed: u32,
    pub alternate: u32,
}

/// SPI controller configuration record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiInit {
    pub mode: u32,
    pub direction: u32,
    pub data_size: u32,
    pub clk_polarity: u32,
    pub clk_phase: u32,
    pub nss: u32,
    pub baud_rate_prescaler: u32,
    pub first_bit: u32,
    pub ti_mode: u32,
    pub crc_calculation: u32,
    pub crc_polynomial: u32,
}

/// I2C controller configuration record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cInit {
    pub clock_speed: u32,
    pub duty_cycle: u32,
    pub own_address1: u32,
    pub addressing_mode: u32,
    pub dual_address_mode: u32,
    pub own_address2: u32,
    pub general_call_mode: u32,
    pub no_stretch_mode: u32,
}

/// UART configuration record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartInit {
    pub baud_rate: u32,
    pub word_length: u32,
    pub stop_bits: u32,
    pub parity: u32,
    pub mode: u32,
    pub hw_flow_ctl: u32,
    pub over_sampling: u32,
}

/// Vendor handle for an SPI controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiHandle {
    pub instance: RegisterBlock,
    pub init: SpiInit,
}

/// Vendor handle for an I2C controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cHandle {
    pub instance: RegisterBlock,
    pub init: I2cInit,
}

/// Vendor handle for a UART
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartHandle {
    pub instance: RegisterBlock,
    pub init: UartInit,
}

macro_rules! impl_bind {
    ($($handle:ident),*) => {
        $(
            impl $handle {
                /// Bind a handle with an empty init record to a register block
                pub fn bind(instance: RegisterBlock) -> Self {
                    Self {
                        instance,
                        init: Default::default(),
                    }
                }
            }
        )*
    };
}

impl_bind!(SpiHandle, I2cHandle, UartHandle);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpio_addresses() {
        assert_eq!(RegisterBlock::gpio(0).address(), 0x4002_0000);
        assert_eq!(RegisterBlock::gpio(1).address(), 0x4002_0400);
        assert_eq!(RegisterBlock::gpio(10).address(), 0x4002_2800);
    }

    #[test]
    fn test_controller_addresses() {
        assert_eq!(RegisterBlock::SPI1.address(), 0x4001_3000);
        assert_eq!(RegisterBlock::SPI2.address(), 0x4000_3800);
        assert_eq!(RegisterBlock::SPI3.address(), 0x4000_3C00);
        assert_eq!(RegisterBlock::USART3.address(), 0x4000_4800);
        assert_eq!(RegisterBlock::I2C1.address(), 0x4000_5400);
        assert_eq!(RegisterBlock::I2C2.address(), 0x4000_5800);
    }

    #[test]
    fn test_bind_starts_empty() {
        let handle = SpiHandle::bind(RegisterBlock::SPI2);
        assert_eq!(handle.instance, RegisterBlock::SPI2);
        assert_eq!(handle.init, SpiInit::default());
    }
}
