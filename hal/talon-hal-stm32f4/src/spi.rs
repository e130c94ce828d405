//! SPI controllers
//!
//! [`SpiConfig`] holds portable settings; [`SpiConfig::to_init`] translates
//! them into the vendor init record for a given peripheral clock. The
//! baud-rate prescaler is picked by [`select_prescaler`].

use core::cell::Cell;

use talon_hal::spi::{BitOrder, Phase, Polarity};
use talon_hal::SpiBus;

use crate::driver::{Bus, ClockGate, Driver};
use crate::error::Error;
use crate::gpio::{Mode, Pin};
use crate::handle::{RegisterBlock, SpiHandle, SpiInit};
use crate::regs;

/// Available prescaler divisors and their register encodings, ascending
const PRESCALERS: [(u32, u32); 8] = [
    (2, regs::SPI_BAUDRATEPRESCALER_2),
    (4, regs::SPI_BAUDRATEPRESCALER_4),
    (8, regs::SPI_BAUDRATEPRESCALER_8),
    (16, regs::SPI_BAUDRATEPRESCALER_16),
    (32, regs::SPI_BAUDRATEPRESCALER_32),
    (64, regs::SPI_BAUDRATEPRESCALER_64),
    (128, regs::SPI_BAUDRATEPRESCALER_128),
    (256, regs::SPI_BAUDRATEPRESCALER_256),
];

/// SCK frequency request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frequency {
    /// Target SCK rate in Hz
    Baudrate(u32),
    /// Explicit divisor of the peripheral clock
    Prescaler(u32),
}

/// Controller role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Master { frequency: Frequency },
    Slave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    #[default]
    TwoLines,
    TwoLinesRxOnly,
    OneLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataSize {
    #[default]
    Eight,
    Sixteen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Crc {
    #[default]
    Disabled,
    Polynomial(u16),
}

/// Slave-select management
///
/// The hardware variants need an NSS pin in [`SpiPins`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveSelect {
    #[default]
    Soft,
    HardInput,
    HardOutput,
}

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    pub role: Role,
    pub direction: Direction,
    pub data_size: DataSize,
    pub polarity: Polarity,
    pub phase: Phase,
    pub bit_order: BitOrder,
    pub crc: Crc,
    pub ti_mode: bool,
    pub slave_select: SlaveSelect,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            role: Role::Master {
                frequency: Frequency::Baudrate(328_125),
            },
            direction: Direction::TwoLines,
            data_size: DataSize::Eight,
            polarity: Polarity::IdleHigh,
            phase: Phase::CaptureOnFirstTransition,
            bit_order: BitOrder::MsbFirst,
            crc: Crc::Disabled,
            ti_mode: false,
            slave_select: SlaveSelect::Soft,
        }
    }
}

impl SpiConfig {
    /// Take polarity and phase from a numbered SPI mode
    pub fn with_mode(self, mode: talon_hal::spi::Mode) -> Self {
        let (polarity, phase) = mode.into();
        Self {
            polarity,
            phase,
            ..self
        }
    }

    /// Translate into the vendor init record
    ///
    /// `pclk` is the clock of the bus the controller sits on.
    pub fn to_init(&self, pclk: u32) -> SpiInit {
        let mut init = SpiInit::default();

        match self.role {
            Role::Master { frequency } => {
                init.mode = regs::SPI_MODE_MASTER;
                init.baud_rate_prescaler = prescaler_bits(frequency, pclk);
            }
            Role::Slave => init.mode = regs::SPI_MODE_SLAVE,
        }

        init.direction = match self.direction {
            Direction::TwoLines => regs::SPI_DIRECTION_2LINES,
            Direction::TwoLinesRxOnly => regs::SPI_DIRECTION_2LINES_RXONLY,
            Direction::OneLine => regs::SPI_DIRECTION_1LINE,
        };

        init.data_size = match self.data_size {
            DataSize::Eight => regs::SPI_DATASIZE_8BIT,
            DataSize::Sixteen => regs::SPI_DATASIZE_16BIT,
        };

        init.clk_polarity = match self.polarity {
            Polarity::IdleLow => regs::SPI_POLARITY_LOW,
            Polarity::IdleHigh => regs::SPI_POLARITY_HIGH,
        };

        init.clk_phase = match self.phase {
            Phase::CaptureOnFirstTransition => regs::SPI_PHASE_1EDGE,
            Phase::CaptureOnSecondTransition => regs::SPI_PHASE_2EDGE,
        };

        init.first_bit = match self.bit_order {
            BitOrder::MsbFirst => regs::SPI_FIRSTBIT_MSB,
            BitOrder::LsbFirst => regs::SPI_FIRSTBIT_LSB,
        };

        match self.crc {
            Crc::Disabled => init.crc_calculation = regs::SPI_CRCCALCULATION_DISABLE,
            Crc::Polynomial(polynomial) => {
                init.crc_calculation = regs::SPI_CRCCALCULATION_ENABLE;
                init.crc_polynomial = u32::from(polynomial);
            }
        }

        init.ti_mode = if self.ti_mode {
            regs::SPI_TIMODE_ENABLE
        } else {
            regs::SPI_TIMODE_DISABLE
        };

        init.nss = match self.slave_select {
            SlaveSelect::Soft => regs::SPI_NSS_SOFT,
            SlaveSelect::HardInput => regs::SPI_NSS_HARD_INPUT,
            SlaveSelect::HardOutput => regs::SPI_NSS_HARD_OUTPUT,
        };

        init
    }
}

/// Divisor needed to bring `pclk` down to at most `baudrate`
///
/// Computed as `(pclk + baudrate - 2) / baudrate`, which rounds up except
/// when `pclk` is one more than a multiple of `baudrate`.
pub fn prescale(baudrate: u32, pclk: u32) -> u32 {
    assert!(baudrate > 0, "SPI baud rate must be non-zero");
    let (baudrate, pclk) = (u64::from(baudrate), u64::from(pclk));
    u32::try_from((pclk + baudrate).saturating_sub(2) / baudrate).unwrap_or(u32::MAX)
}

/// Smallest hardware divisor not below `prescale`, saturating at 256
pub fn select_prescaler(prescale: u32) -> u32 {
    PRESCALERS
        .iter()
        .map(|&(divisor, _)| divisor)
        .find(|&divisor| prescale <= divisor)
        .unwrap_or(256)
}

/// Register encoding of the prescaler for `frequency`
pub fn prescaler_bits(frequency: Frequency, pclk: u32) -> u32 {
    let requested = match frequency {
        Frequency::Baudrate(baudrate) => prescale(baudrate, pclk),
        Frequency::Prescaler(divisor) => divisor,
    };
    let divisor = select_prescaler(requested);
    PRESCALERS
        .iter()
        .find(|&&(candidate, _)| candidate == divisor)
        .map_or(regs::SPI_BAUDRATEPRESCALER_256, |&(_, bits)| bits)
}

/// Pins routed to an SPI controller
pub struct SpiPins<'a, 'd, D: Driver> {
    pub sck: &'a Pin<'d, D>,
    pub miso: &'a Pin<'d, D>,
    pub mosi: &'a Pin<'d, D>,
    /// Required for hardware slave select
    pub nss: Option<&'a Pin<'d, D>>,
}

/// An SPI controller
pub struct Spi<'d, D: Driver> {
    driver: &'d D,
    handle: Cell<SpiHandle>,
    gate: ClockGate,
    bus: Bus,
    alternate: u32,
}

impl<'d, D: Driver> Spi<'d, D> {
    pub(crate) fn new(
        driver: &'d D,
        instance: RegisterBlock,
        gate: ClockGate,
        bus: Bus,
        alternate: u32,
    ) -> Self {
        Self {
            driver,
            handle: Cell::new(SpiHandle::bind(instance)),
            gate,
            bus,
            alternate,
        }
    }

    pub fn instance(&self) -> RegisterBlock {
        self.handle.get().instance
    }

    /// Init record applied by the last successful `configure`
    pub fn init(&self) -> SpiInit {
        self.handle.get().init
    }

    /// Route the pins and initialize the controller
    ///
    /// May be called again to reconfigure.
    ///
    /// # Panics
    ///
    /// If hardware slave select is requested without an NSS pin.
    pub fn configure(&self, pins: &SpiPins<'_, 'd, D>, config: &SpiConfig) -> Result<(), Error> {
        let routing = Mode::alternate(
            regs::GPIO_MODE_AF_PP,
            regs::GPIO_NOPULL,
            regs::GPIO_SPEED_FREQ_HIGH,
            self.alternate,
        );
        pins.sck.configure(routing);
        pins.mosi.configure(routing);
        pins.miso.configure(routing);
        if config.slave_select != SlaveSelect::Soft {
            let Some(nss) = pins.nss else {
                panic!("hardware slave select needs an NSS pin");
            };
            nss.configure(routing);
        }

        self.driver.enable_clock(self.gate);

        let pclk = self.driver.bus_frequency(self.bus);
        let mut handle = self.handle.get();
        handle.init = config.to_init(pclk);

        if let Err(e) = self.driver.spi_init(&handle).check() {
            warn!("SPI init failed: {}", e);
            return Err(e);
        }
        self.handle.set(handle);
        info!(
            "SPI configured: pclk={} prescaler bits={:#x}",
            pclk,
            handle.init.baud_rate_prescaler
        );
        Ok(())
    }

    /// Send `data`, then wait for the controller to go idle
    pub fn write(&self, data: &[u8], timeout_ms: u32) -> Result<(), Error> {
        let handle = self.handle.get();
        self.driver.spi_transmit(&handle, data, timeout_ms).check()?;
        while !self.driver.spi_is_ready(&handle) {}
        Ok(())
    }

    /// Fill `buf`; returns the number of bytes read
    pub fn read(&self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Error> {
        let handle = self.handle.get();
        self.driver.spi_receive(&handle, buf, timeout_ms).check()?;
        Ok(buf.len())
    }

    /// Full-duplex exchange
    ///
    /// # Panics
    ///
    /// If `read` and `write` differ in length.
    pub fn transfer(&self, read: &mut [u8], write: &[u8], timeout_ms: u32) -> Result<(), Error> {
        assert_eq!(read.len(), write.len(), "transfer buffers differ in length");
        let handle = self.handle.get();
        self.driver
            .spi_transmit_receive(&handle, write, read, timeout_ms)
            .check()
    }
}

impl<D: Driver> SpiBus for Spi<'_, D> {
    type Error = Error;

    fn write(&self, data: &[u8], timeout_ms: u32) -> Result<(), Error> {
        Spi::write(self, data, timeout_ms)
    }

    fn read(&self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Error> {
        Spi::read(self, buf, timeout_ms)
    }

    fn transfer(&self, read: &mut [u8], write: &[u8], timeout_ms: u32) -> Result<(), Error> {
        Spi::transfer(self, read, write, timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockConfig;
    use crate::driver::mock::{Call, MockDriver};
    use crate::driver::SystemDriver;
    use crate::error::Status;
    use crate::gpio::{Gpio, Port};
    use proptest::prelude::*;

    fn spi2(driver: &MockDriver) -> Spi<'_, MockDriver> {
        Spi::new(
            driver,
            RegisterBlock::SPI2,
            ClockGate::Spi2,
            Bus::Apb1,
            regs::GPIO_AF5_SPI2,
        )
    }

    #[test]
    fn test_default_baudrate_on_apb1() {
        // 42 MHz / 328_125 Hz is exactly 128
        assert_eq!(prescale(328_125, 42_000_000), 128);
        assert_eq!(select_prescaler(128), 128);
        assert_eq!(
            prescaler_bits(Frequency::Baudrate(328_125), 42_000_000),
            regs::SPI_BAUDRATEPRESCALER_128
        );
    }

    #[test]
    fn test_prescale_rounding_differs_from_ceiling() {
        // pclk = 8 * baud + 1: a true ceiling gives 9, the formula gives 8
        let baudrate: u32 = 1_000_000;
        let pclk = 8 * baudrate + 1;
        assert_eq!(pclk.div_ceil(baudrate), 9);
        assert_eq!(prescale(baudrate, pclk), 8);
        assert_eq!(
            prescaler_bits(Frequency::Baudrate(baudrate), pclk),
            regs::SPI_BAUDRATEPRESCALER_8
        );
    }

    #[test]
    fn test_prescaler_saturates() {
        assert_eq!(select_prescaler(257), 256);
        assert_eq!(
            prescaler_bits(Frequency::Baudrate(1_000), 84_000_000),
            regs::SPI_BAUDRATEPRESCALER_256
        );
    }

    #[test]
    fn test_explicit_prescaler_bypasses_division() {
        assert_eq!(
            prescaler_bits(Frequency::Prescaler(16), 84_000_000),
            regs::SPI_BAUDRATEPRESCALER_16
        );
        assert_eq!(
            prescaler_bits(Frequency::Prescaler(1), 84_000_000),
            regs::SPI_BAUDRATEPRESCALER_2
        );
    }

    #[test]
    fn test_default_init_record() {
        let init = SpiConfig::default().to_init(42_000_000);
        assert_eq!(init.mode, regs::SPI_MODE_MASTER);
        assert_eq!(init.mode, 0x104);
        assert_eq!(init.direction, regs::SPI_DIRECTION_2LINES);
        assert_eq!(init.data_size, regs::SPI_DATASIZE_8BIT);
        assert_eq!(init.clk_polarity, regs::SPI_POLARITY_HIGH);
        assert_eq!(init.clk_phase, regs::SPI_PHASE_1EDGE);
        assert_eq!(init.first_bit, regs::SPI_FIRSTBIT_MSB);
        assert_eq!(init.crc_calculation, regs::SPI_CRCCALCULATION_DISABLE);
        assert_eq!(init.ti_mode, regs::SPI_TIMODE_DISABLE);
        assert_eq!(init.nss, regs::SPI_NSS_SOFT);
        assert_eq!(init.baud_rate_prescaler, regs::SPI_BAUDRATEPRESCALER_128);
    }

    #[test]
    fn test_numbered_mode() {
        let config = SpiConfig::default().with_mode(talon_hal::spi::Mode::Mode3);
        assert_eq!(config.polarity, Polarity::IdleHigh);
        assert_eq!(config.phase, Phase::CaptureOnSecondTransition);
        let init = config.to_init(84_000_000);
        assert_eq!(init.clk_polarity, regs::SPI_POLARITY_HIGH);
        assert_eq!(init.clk_phase, regs::SPI_PHASE_2EDGE);
    }

    #[test]
    fn test_slave_crc_record() {
        let config = SpiConfig {
            role: Role::Slave,
            direction: Direction::OneLine,
            data_size: DataSize::Sixteen,
            polarity: Polarity::IdleLow,
            phase: Phase::CaptureOnSecondTransition,
            bit_order: BitOrder::LsbFirst,
            crc: Crc::Polynomial(7),
            ti_mode: true,
            slave_select: SlaveSelect::HardInput,
        };
        let init = config.to_init(42_000_000);
        assert_eq!(init.mode, regs::SPI_MODE_SLAVE);
        assert_eq!(init.baud_rate_prescaler, 0);
        assert_eq!(init.direction, regs::SPI_DIRECTION_1LINE);
        assert_eq!(init.data_size, regs::SPI_DATASIZE_16BIT);
        assert_eq!(init.clk_phase, regs::SPI_PHASE_2EDGE);
        assert_eq!(init.first_bit, regs::SPI_FIRSTBIT_LSB);
        assert_eq!(init.crc_calculation, regs::SPI_CRCCALCULATION_ENABLE);
        assert_eq!(init.crc_polynomial, 7);
        assert_eq!(init.ti_mode, regs::SPI_TIMODE_ENABLE);
        assert_eq!(init.nss, regs::SPI_NSS_HARD_INPUT);
    }

    #[test]
    fn test_configure_routes_pins_before_clock() {
        let driver = MockDriver::new();
        driver.setup_clocks(&ClockConfig::default());
        let gpio = Gpio::new(&driver);
        let spi = spi2(&driver);
        let pins = SpiPins {
            sck: gpio.pin(Port::B, 13, None),
            miso: gpio.pin(Port::B, 14, None),
            mosi: gpio.pin(Port::B, 15, None),
            nss: None,
        };
        driver.clear_calls();

        spi.configure(&pins, &SpiConfig::default()).unwrap();

        let calls = driver.calls();
        let clock = calls
            .iter()
            .position(|call| *call == Call::EnableClock(ClockGate::Spi2))
            .unwrap();
        let routed = calls
            .iter()
            .filter(|call| {
                matches!(call, Call::GpioInit(_, init)
                    if init.mode == regs::GPIO_MODE_AF_PP && init.alternate == regs::GPIO_AF5_SPI2)
            })
            .count();
        assert_eq!(routed, 3);
        assert!(calls[..clock]
            .iter()
            .all(|call| !matches!(call, Call::SpiInit(_))));
        assert!(matches!(calls.last(), Some(Call::SpiInit(handle))
            if handle.instance == RegisterBlock::SPI2
                && handle.init.baud_rate_prescaler == regs::SPI_BAUDRATEPRESCALER_128));
        let last_pin_init = calls
            .iter()
            .rposition(|call| matches!(call, Call::GpioInit(..)))
            .unwrap();
        assert!(last_pin_init < clock);
    }

    #[test]
    fn test_configure_reports_vendor_status() {
        let driver = MockDriver::new();
        let gpio = Gpio::new(&driver);
        let spi = spi2(&driver);
        let pins = SpiPins {
            sck: gpio.pin(Port::B, 13, None),
            miso: gpio.pin(Port::B, 14, None),
            mosi: gpio.pin(Port::B, 15, None),
            nss: None,
        };

        driver.set_status(Status::BUSY);
        assert_eq!(spi.configure(&pins, &SpiConfig::default()), Err(Error::Busy));
    }

    #[test]
    #[should_panic(expected = "NSS pin")]
    fn test_hardware_nss_requires_pin() {
        let driver = MockDriver::new();
        let gpio = Gpio::new(&driver);
        let spi = spi2(&driver);
        let pins = SpiPins {
            sck: gpio.pin(Port::B, 13, None),
            miso: gpio.pin(Port::B, 14, None),
            mosi: gpio.pin(Port::B, 15, None),
            nss: None,
        };
        let config = SpiConfig {
            slave_select: SlaveSelect::HardOutput,
            ..Default::default()
        };
        let _ = spi.configure(&pins, &config);
    }

    #[test]
    fn test_write_waits_until_ready() {
        let driver = MockDriver::new();
        let spi = spi2(&driver);
        driver.set_spi_busy_polls(3);

        spi.write(&[0xAA, 0x55], 10).unwrap();
        assert_eq!(driver.spi_tx().as_slice(), &[0xAA, 0x55]);
        assert!(driver.calls().contains(&Call::SpiTransmit(RegisterBlock::SPI2, 2, 10)));
    }

    #[test]
    fn test_read_and_transfer() {
        let driver = MockDriver::new();
        let spi = spi2(&driver);
        driver.push_spi_rx(&[1, 2, 3, 4]);

        let mut buf = [0u8; 2];
        assert_eq!(spi.read(&mut buf, 10), Ok(2));
        assert_eq!(buf, [1, 2]);

        let mut rx = [0u8; 2];
        spi.transfer(&mut rx, &[9, 9], 10).unwrap();
        assert_eq!(rx, [3, 4]);
    }

    #[test]
    fn test_transfer_timeout() {
        let driver = MockDriver::new();
        let spi = spi2(&driver);
        driver.set_status(Status::TIMEOUT);

        let mut rx = [0u8; 1];
        assert_eq!(spi.transfer(&mut rx, &[0], 1), Err(Error::Timeout));
    }

    proptest! {
        #[test]
        fn test_selected_prescaler_is_minimal_power_of_two(prescale in 0u32..10_000) {
            let divisor = select_prescaler(prescale);
            prop_assert!(divisor.is_power_of_two());
            prop_assert!((2..=256).contains(&divisor));
            if prescale <= 256 {
                prop_assert!(divisor >= prescale);
                prop_assert!(divisor == 2 || divisor / 2 < prescale);
            } else {
                prop_assert_eq!(divisor, 256);
            }
        }

        #[test]
        fn test_sck_never_exceeds_request_below_saturation(
            baudrate in 200_000u32..42_000_000,
            pclk in prop::sample::select(vec![42_000_000u32, 84_000_000]),
        ) {
            let divisor = select_prescaler(prescale(baudrate, pclk));
            let exact = pclk % baudrate != 1;
            if divisor < 256 && exact {
                prop_assert!(pclk / divisor <= baudrate);
            }
        }
    }
}
