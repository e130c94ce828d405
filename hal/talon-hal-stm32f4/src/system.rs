//! System object
//!
//! [`Stm32f4`] brings up the clock tree and the vendor layer, then hands out
//! peripherals on demand. Every peripheral is created once, on first access,
//! and lives until the system object is dropped.

use embedded_hal::delay::DelayNs;

use crate::cache::{ResourceCache, ResourceId};
use crate::clock::ClockConfig;
use crate::driver::{Bus, ClockGate, Driver, Irq};
use crate::error::Error;
use crate::gpio::{Gpio, Port};
use crate::handle::RegisterBlock;
use crate::i2c::I2c;
use crate::regs;
use crate::spi::Spi;
use crate::uart::{Uart, UartInstance};

/// USART3 receive pin (PD9)
const UART3_RX: (Port, u8) = (Port::D, 9);
/// USART3 transmit pin (PD8)
const UART3_TX: (Port, u8) = (Port::D, 8);

/// Decoded vendor driver version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HalVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
}

impl HalVersion {
    /// Decode a packed version word
    pub const fn from_word(word: u32) -> Self {
        Self {
            major: ((word >> 24) & 0x0F) as u8,
            minor: ((word >> 16) & 0x0F) as u8,
            build: ((word >> 8) & 0x0F) as u8,
        }
    }
}

/// A cached peripheral
pub enum Resource<'d, D: Driver> {
    Gpio(Gpio<'d, D>),
    Spi(Spi<'d, D>),
    I2c(I2c<'d, D>),
    Uart(UartInstance<'d, D>),
}

/// The microcontroller
pub struct Stm32f4<'d, D: Driver> {
    driver: &'d D,
    resources: ResourceCache<Resource<'d, D>>,
}

impl<'d, D: Driver> Stm32f4<'d, D> {
    /// Bring up the default clock tree and the vendor layer
    pub fn new(driver: &'d D) -> Result<Self, Error> {
        Self::with_clock_config(driver, &ClockConfig::default())
    }

    pub fn with_clock_config(driver: &'d D, config: &ClockConfig) -> Result<Self, Error> {
        driver.setup_clocks(config).check()?;
        driver.init().check()?;
        info!("STM32F4 up, SYSCLK {} Hz", driver.sysclk_frequency());

        Ok(Self {
            driver,
            resources: ResourceCache::new(),
        })
    }

    pub fn driver(&self) -> &'d D {
        self.driver
    }

    /// Busy-wait for `ms` milliseconds
    pub fn delay(&self, ms: u32) {
        self.driver.delay_ms(ms);
    }

    /// Milliseconds since bring-up
    pub fn tick(&self) -> u32 {
        self.driver.tick()
    }

    pub fn system_clock_frequency(&self) -> u32 {
        self.driver.sysclk_frequency()
    }

    pub fn version(&self) -> HalVersion {
        HalVersion::from_word(self.driver.version())
    }

    pub fn gpio(&self) -> &Gpio<'d, D> {
        let resource = self
            .resources
            .get_or_create(ResourceId::Gpio, || Resource::Gpio(Gpio::new(self.driver)));
        match resource {
            Resource::Gpio(gpio) => gpio,
            _ => unreachable!("GPIO slot holds another resource"),
        }
    }

    /// SPI1, clocked from APB2
    pub fn spi1(&self) -> &Spi<'d, D> {
        self.spi(
            ResourceId::Spi1,
            RegisterBlock::SPI1,
            ClockGate::Spi1,
            Bus::Apb2,
            regs::GPIO_AF5_SPI1,
        )
    }

    /// SPI2, clocked from APB1
    pub fn spi2(&self) -> &Spi<'d, D> {
        self.spi(
            ResourceId::Spi2,
            RegisterBlock::SPI2,
            ClockGate::Spi2,
            Bus::Apb1,
            regs::GPIO_AF5_SPI2,
        )
    }

    /// SPI3, clocked from APB1
    pub fn spi3(&self) -> &Spi<'d, D> {
        self.spi(
            ResourceId::Spi3,
            RegisterBlock::SPI3,
            ClockGate::Spi3,
            Bus::Apb1,
            regs::GPIO_AF6_SPI3,
        )
    }

    fn spi(
        &self,
        id: ResourceId,
        instance: RegisterBlock,
        gate: ClockGate,
        bus: Bus,
        alternate: u32,
    ) -> &Spi<'d, D> {
        let resource = self.resources.get_or_create(id, || {
            Resource::Spi(Spi::new(self.driver, instance, gate, bus, alternate))
        });
        match resource {
            Resource::Spi(spi) => spi,
            _ => unreachable!("SPI slot holds another resource"),
        }
    }

    pub fn i2c1(&self) -> &I2c<'d, D> {
        self.i2c(
            ResourceId::I2c1,
            RegisterBlock::I2C1,
            ClockGate::I2c1,
            regs::GPIO_AF4_I2C1,
        )
    }

    pub fn i2c2(&self) -> &I2c<'d, D> {
        self.i2c(
            ResourceId::I2c2,
            RegisterBlock::I2C2,
            ClockGate::I2c2,
            regs::GPIO_AF4_I2C2,
        )
    }

    fn i2c(&self, id: ResourceId, instance: RegisterBlock, gate: ClockGate, alternate: u32) -> &I2c<'d, D> {
        let resource = self
            .resources
            .get_or_create(id, || Resource::I2c(I2c::new(self.driver, instance, gate, alternate)));
        match resource {
            Resource::I2c(i2c) => i2c,
            _ => unreachable!("I2C slot holds another resource"),
        }
    }

    /// USART3 on PD9 (RX) and PD8 (TX)
    pub fn uart3(&self) -> Uart<'_, 'd, D> {
        let resource = self.resources.get_or_create(ResourceId::Uart3, || {
            Resource::Uart(UartInstance::new(
                self.driver,
                RegisterBlock::USART3,
                ClockGate::Usart3,
                Irq::Usart3,
                regs::GPIO_AF7_USART3,
            ))
        });
        let instance = match resource {
            Resource::Uart(uart) => uart,
            _ => unreachable!("UART slot holds another resource"),
        };

        let gpio = self.gpio();
        Uart::new(
            instance,
            gpio.pin(UART3_RX.0, UART3_RX.1, None),
            gpio.pin(UART3_TX.0, UART3_TX.1, None),
        )
    }
}

impl<D: Driver> Drop for Stm32f4<'_, D> {
    fn drop(&mut self) {
        if let Err(e) = self.driver.deinit().check() {
            error!("HAL deinit failed: {}", e);
        }
    }
}

impl<D: Driver> DelayNs for Stm32f4<'_, D> {
    /// Rounded up to whole milliseconds, the tick resolution
    fn delay_ns(&mut self, ns: u32) {
        self.driver.delay_ms(ns.div_ceil(1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.driver.delay_ms(ms);
    }
}
