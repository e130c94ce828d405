//! I2C bus master
//!
//! Provides I2C communication for sensors and displays on I2C1 and I2C2.
//! Only 7-bit addressing with a STOP after every transfer is supported.

use core::cell::Cell;

use talon_hal::{I2cBus, I2cMemory, PinState};

use crate::driver::{ClockGate, Driver};
use crate::error::Error;
use crate::gpio::{Mode, Pin};
use crate::handle::{I2cHandle, I2cInit, RegisterBlock};
use crate::regs;

/// Default bound for transfers issued through the bus traits
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// Level polls per step of the bus recovery sequence
const RECOVERY_POLLS: u32 = 100;

/// I2C configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// SCL frequency in Hz
    pub speed_hz: u32,
}

impl I2cConfig {
    /// 100 kHz standard mode
    pub const STANDARD: I2cConfig = I2cConfig { speed_hz: 100_000 };
    /// 400 kHz fast mode
    pub const FAST: I2cConfig = I2cConfig { speed_hz: 400_000 };

    /// Translate into the vendor init record
    pub fn to_init(&self) -> I2cInit {
        I2cInit {
            clock_speed: self.speed_hz,
            duty_cycle: regs::I2C_DUTYCYCLE_2,
            own_address1: 0,
            addressing_mode: regs::I2C_ADDRESSINGMODE_7BIT,
            dual_address_mode: regs::I2C_DUALADDRESS_DISABLE,
            own_address2: 0,
            general_call_mode: regs::I2C_GENERALCALL_DISABLE,
            no_stretch_mode: regs::I2C_NOSTRETCH_DISABLE,
        }
    }
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Bus-format address of a 7-bit device address
fn bus_address(address: u8) -> u16 {
    u16::from(address) << 1
}

/// An I2C controller
pub struct I2c<'d, D: Driver> {
    driver: &'d D,
    handle: Cell<I2cHandle>,
    gate: ClockGate,
    alternate: u32,
    timeout_ms: Cell<u32>,
}

impl<'d, D: Driver> I2c<'d, D> {
    pub(crate) fn new(driver: &'d D, instance: RegisterBlock, gate: ClockGate, alternate: u32) -> Self {
        Self {
            driver,
            handle: Cell::new(I2cHandle::bind(instance)),
            gate,
            alternate,
            timeout_ms: Cell::new(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn instance(&self) -> RegisterBlock {
        self.handle.get().instance
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms.get()
    }

    pub fn set_timeout_ms(&self, timeout_ms: u32) {
        self.timeout_ms.set(timeout_ms);
    }

    fn routing(&self) -> Mode {
        Mode::alternate(
            regs::GPIO_MODE_AF_OD,
            regs::GPIO_PULLUP,
            regs::GPIO_SPEED_FREQ_HIGH,
            self.alternate,
        )
    }

    /// Route `scl` and `sda` and initialize the controller
    pub fn configure(
        &self,
        config: &I2cConfig,
        scl: &Pin<'d, D>,
        sda: &Pin<'d, D>,
    ) -> Result<(), Error> {
        let routing = self.routing();
        scl.configure(routing);
        sda.configure(routing);

        self.driver.enable_clock(self.gate);

        let mut handle = self.handle.get();
        handle.init = config.to_init();
        if let Err(e) = self.driver.i2c_init(&handle).check() {
            warn!("I2C init failed: {}", e);
            return Err(e);
        }
        self.handle.set(handle);
        info!("I2C configured at {} Hz", config.speed_hz);
        Ok(())
    }

    /// Write `data` to the device at 7-bit `address`
    ///
    /// # Panics
    ///
    /// If `stop` is false; repeated starts are not supported.
    pub fn write(&self, address: u8, data: &[u8], stop: bool, timeout_ms: u32) -> Result<(), Error> {
        assert!(stop, "I2C write without STOP is not supported");
        self.driver
            .i2c_master_transmit(&self.handle.get(), bus_address(address), data, timeout_ms)
            .check()
    }

    /// Read into `buf` from the device at 7-bit `address`
    ///
    /// # Panics
    ///
    /// If `stop` is false; repeated starts are not supported.
    pub fn read(&self, address: u8, buf: &mut [u8], stop: bool, timeout_ms: u32) -> Result<(), Error> {
        assert!(stop, "I2C read without STOP is not supported");
        self.driver
            .i2c_master_receive(&self.handle.get(), bus_address(address), buf, timeout_ms)
            .check()
    }

    pub fn read_register(
        &self,
        address: u8,
        register: u8,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), Error> {
        self.driver
            .i2c_mem_read(
                &self.handle.get(),
                bus_address(address),
                u16::from(register),
                regs::I2C_MEMADD_SIZE_8BIT,
                buf,
                timeout_ms,
            )
            .check()
    }

    pub fn write_register(
        &self,
        address: u8,
        register: u8,
        data: &[u8],
        timeout_ms: u32,
    ) -> Result<(), Error> {
        self.driver
            .i2c_mem_write(
                &self.handle.get(),
                bus_address(address),
                u16::from(register),
                regs::I2C_MEMADD_SIZE_8BIT,
                data,
                timeout_ms,
            )
            .check()
    }

    /// Clear a stuck BUSY flag
    ///
    /// Works around the analog filter erratum of the STM32F4: the lines are
    /// taken over as open-drain outputs, SCL is clocked until a slave caught
    /// mid-byte lets go of SDA, and both lines are walked through a
    /// START/STOP pattern. The controller is then reset and re-initialized
    /// with the last configuration. A line that never reaches the expected
    /// level fails with [`Error::Timeout`], leaving the controller disabled.
    pub fn recover_bus(&self, scl: &Pin<'d, D>, sda: &Pin<'d, D>) -> Result<(), Error> {
        let instance = self.instance();
        warn!("I2C bus recovery started");

        self.driver.i2c_modify_control(instance, regs::I2C_CR1_PE, 0);

        let manual = Mode::alternate(
            regs::GPIO_MODE_OUTPUT_OD,
            regs::GPIO_PULLUP,
            regs::GPIO_SPEED_FREQ_HIGH,
            0,
        );
        scl.configure(manual);
        scl.set(PinState::High);
        sda.configure(manual);
        sda.set(PinState::High);

        wait_for_level(scl, PinState::High)?;
        release_sda(scl, sda)?;

        let steps = [
            (sda, PinState::Low),
            (scl, PinState::Low),
            (scl, PinState::High),
            (sda, PinState::High),
        ];
        for (pin, level) in steps {
            pin.set(level);
            wait_for_level(pin, level)?;
        }

        let routing = Mode::alternate(
            regs::GPIO_MODE_AF_OD,
            regs::GPIO_PULLUP,
            regs::GPIO_SPEED_FREQ_LOW,
            self.alternate,
        );
        scl.configure(routing);
        sda.configure(routing);
        scl.set(PinState::High);
        sda.set(PinState::High);

        self.driver.i2c_modify_control(instance, 0, regs::I2C_CR1_SWRST);
        self.driver.i2c_modify_control(instance, regs::I2C_CR1_SWRST, 0);
        self.driver.i2c_modify_control(instance, 0, regs::I2C_CR1_PE);

        self.driver.i2c_init(&self.handle.get()).check()?;
        info!("I2C bus recovered");
        Ok(())
    }
}

fn wait_for_level<D: Driver>(pin: &Pin<'_, D>, level: PinState) -> Result<(), Error> {
    for _ in 0..RECOVERY_POLLS {
        if pin.get() == level {
            return Ok(());
        }
    }
    Err(Error::Timeout)
}

/// Clock SCL until SDA reads high
fn release_sda<D: Driver>(scl: &Pin<'_, D>, sda: &Pin<'_, D>) -> Result<(), Error> {
    for _ in 0..RECOVERY_POLLS {
        if sda.get() == PinState::High {
            return Ok(());
        }
        scl.set(PinState::Low);
        scl.set(PinState::High);
    }
    Err(Error::Timeout)
}

impl<D: Driver> I2cBus for I2c<'_, D> {
    type Error = Error;

    fn write(&self, address: u8, data: &[u8], stop: bool, timeout_ms: u32) -> Result<(), Error> {
        I2c::write(self, address, data, stop, timeout_ms)
    }

    fn read(&self, address: u8, buf: &mut [u8], stop: bool, timeout_ms: u32) -> Result<(), Error> {
        I2c::read(self, address, buf, stop, timeout_ms)
    }
}

impl<D: Driver> I2cMemory for I2c<'_, D> {
    type Error = Error;

    fn read_register(&self, address: u8, register: u8, buf: &mut [u8], timeout_ms: u32) -> Result<(), Error> {
        I2c::read_register(self, address, register, buf, timeout_ms)
    }

    fn write_register(&self, address: u8, register: u8, data: &[u8], timeout_ms: u32) -> Result<(), Error> {
        I2c::write_register(self, address, register, data, timeout_ms)
    }
}

impl<D: Driver> embedded_hal::i2c::ErrorType for I2c<'_, D> {
    type Error = Error;
}

impl<D: Driver> embedded_hal::i2c::I2c for I2c<'_, D> {
    /// Runs each operation as its own transfer with the default timeout
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> Result<(), Error> {
        let timeout_ms = self.timeout_ms();
        for operation in operations {
            match operation {
                embedded_hal::i2c::Operation::Read(buf) => {
                    I2c::read(self, address, buf, true, timeout_ms)?
                }
                embedded_hal::i2c::Operation::Write(data) => {
                    I2c::write(self, address, data, true, timeout_ms)?
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{Call, MockDriver};
    use crate::error::Status;
    use crate::gpio::{Gpio, Port};

    fn i2c1(driver: &MockDriver) -> I2c<'_, MockDriver> {
        I2c::new(driver, RegisterBlock::I2C1, ClockGate::I2c1, regs::GPIO_AF4_I2C1)
    }

    #[test]
    fn test_init_record() {
        let init = I2cConfig::FAST.to_init();
        assert_eq!(init.clock_speed, 400_000);
        assert_eq!(init.duty_cycle, regs::I2C_DUTYCYCLE_2);
        assert_eq!(init.addressing_mode, 0x4000);
        assert_eq!(I2cConfig::default(), I2cConfig::STANDARD);
    }

    #[test]
    fn test_configure_sequence() {
        let driver = MockDriver::new();
        let gpio = Gpio::new(&driver);
        let i2c = i2c1(&driver);
        let scl = gpio.pin(Port::B, 8, None);
        let sda = gpio.pin(Port::B, 9, None);

        i2c.configure(&I2cConfig::FAST, scl, sda).unwrap();

        let calls = driver.calls();
        let routed: heapless::Vec<usize, 4> = calls
            .iter()
            .enumerate()
            .filter(|(_, call)| {
                matches!(call, Call::GpioInit(_, init)
                    if init.mode == regs::GPIO_MODE_AF_OD
                        && init.pull == regs::GPIO_PULLUP
                        && init.alternate == regs::GPIO_AF4_I2C1)
            })
            .map(|(index, _)| index)
            .collect();
        let clock = calls
            .iter()
            .position(|call| *call == Call::EnableClock(ClockGate::I2c1))
            .unwrap();
        assert_eq!(routed.len(), 2);
        assert!(routed.iter().all(|&index| index < clock));
        assert!(matches!(calls.last(), Some(Call::I2cInit(handle))
            if handle.init.clock_speed == 400_000));
    }

    #[test]
    fn test_address_is_shifted() {
        let driver = MockDriver::new();
        let i2c = i2c1(&driver);

        i2c.write(0x3C, &[0x00, 0xAF], true, 50).unwrap();
        assert!(driver.calls().contains(&Call::I2cTransmit(0x78, 2)));
        assert_eq!(driver.i2c_tx().as_slice(), &[0x00, 0xAF]);

        driver.push_i2c_rx(&[0x5A]);
        let mut buf = [0u8; 1];
        i2c.read(0x3C, &mut buf, true, 50).unwrap();
        assert_eq!(buf, [0x5A]);
    }

    #[test]
    #[should_panic(expected = "without STOP")]
    fn test_write_without_stop_panics() {
        let driver = MockDriver::new();
        let _ = i2c1(&driver).write(0x3C, &[0], false, 50);
    }

    #[test]
    #[should_panic(expected = "without STOP")]
    fn test_read_without_stop_panics() {
        let driver = MockDriver::new();
        let mut buf = [0u8; 1];
        let _ = i2c1(&driver).read(0x3C, &mut buf, false, 50);
    }

    #[test]
    fn test_register_access() {
        let driver = MockDriver::new();
        let i2c = i2c1(&driver);

        i2c.write_register(0x68, 0x6B, &[0x01, 0x02], 50).unwrap();
        assert_eq!(driver.i2c_register(0x6B), 0x01);
        assert_eq!(driver.i2c_register(0x6C), 0x02);

        driver.set_i2c_register(0x75, 0x68);
        let mut who_am_i = [0u8; 1];
        i2c.read_register(0x68, 0x75, &mut who_am_i, 50).unwrap();
        assert_eq!(who_am_i, [0x68]);
        assert!(driver.calls().contains(&Call::I2cMemRead(0xD0, 0x75, 1)));
    }

    #[test]
    fn test_nack_maps_to_error() {
        let driver = MockDriver::new();
        let i2c = i2c1(&driver);
        driver.set_status(Status::ERROR);

        assert_eq!(i2c.write(0x10, &[1], true, 50), Err(Error::UnknownError));
    }

    #[test]
    fn test_default_timeout() {
        let driver = MockDriver::new();
        let i2c = i2c1(&driver);
        assert_eq!(i2c.timeout_ms(), 1000);
        i2c.set_timeout_ms(20);
        assert_eq!(i2c.timeout_ms(), 20);
    }

    #[test]
    fn test_recover_bus() {
        let driver = MockDriver::new();
        let gpio = Gpio::new(&driver);
        let i2c = i2c1(&driver);
        let scl = gpio.pin(Port::B, 6, None);
        let sda = gpio.pin(Port::B, 7, None);
        i2c.configure(&I2cConfig::STANDARD, scl, sda).unwrap();
        driver.clear_calls();

        i2c.recover_bus(scl, sda).unwrap();

        let control: heapless::Vec<Call, 8> = driver
            .calls()
            .iter()
            .copied()
            .filter(|call| matches!(call, Call::I2cModifyControl(..)))
            .collect();
        assert_eq!(
            control.as_slice(),
            &[
                Call::I2cModifyControl(RegisterBlock::I2C1, regs::I2C_CR1_PE, 0),
                Call::I2cModifyControl(RegisterBlock::I2C1, 0, regs::I2C_CR1_SWRST),
                Call::I2cModifyControl(RegisterBlock::I2C1, regs::I2C_CR1_SWRST, 0),
                Call::I2cModifyControl(RegisterBlock::I2C1, 0, regs::I2C_CR1_PE),
            ]
        );
        assert_eq!(driver.i2c_control(RegisterBlock::I2C1), regs::I2C_CR1_PE);
        assert!(matches!(scl.mode(), Some(Mode::Manual(init))
            if init.mode == regs::GPIO_MODE_AF_OD && init.speed == regs::GPIO_SPEED_FREQ_LOW));
        assert!(driver.level(Port::B, 6));
        assert!(driver.level(Port::B, 7));
        assert!(matches!(driver.calls().last(), Some(Call::I2cInit(_))));
    }

    #[test]
    fn test_recover_bus_clocks_out_held_sda() {
        let driver = MockDriver::new();
        let gpio = Gpio::new(&driver);
        let i2c = i2c1(&driver);
        let scl = gpio.pin(Port::B, 6, None);
        let sda = gpio.pin(Port::B, 7, None);
        i2c.configure(&I2cConfig::STANDARD, scl, sda).unwrap();

        driver.stick_until_clocked(Port::B, 7, 6, 3);

        assert_eq!(i2c.recover_bus(scl, sda), Ok(()));
        assert!(driver.level(Port::B, 7));
        assert_eq!(driver.i2c_control(RegisterBlock::I2C1), regs::I2C_CR1_PE);
    }

    #[test]
    fn test_recover_bus_with_stuck_line() {
        let driver = MockDriver::new();
        let gpio = Gpio::new(&driver);
        let i2c = i2c1(&driver);
        let scl = gpio.pin(Port::B, 6, None);
        let sda = gpio.pin(Port::B, 7, None);
        i2c.configure(&I2cConfig::STANDARD, scl, sda).unwrap();

        driver.hold_low(Port::B, 7, true);
        assert_eq!(i2c.recover_bus(scl, sda), Err(Error::Timeout));
        assert_eq!(driver.i2c_control(RegisterBlock::I2C1) & regs::I2C_CR1_PE, 0);
    }

    #[test]
    fn test_embedded_hal_transaction() {
        use embedded_hal::i2c::{I2c as _, Operation};

        let driver = MockDriver::new();
        let mut i2c = i2c1(&driver);
        driver.push_i2c_rx(&[0x11, 0x22]);

        let mut buf = [0u8; 2];
        i2c.transaction(0x50, &mut [Operation::Write(&[0x00]), Operation::Read(&mut buf)])
            .unwrap();
        assert_eq!(buf, [0x11, 0x22]);
        assert!(driver.calls().contains(&Call::I2cReceive(0xA0, 2)));
    }
}
