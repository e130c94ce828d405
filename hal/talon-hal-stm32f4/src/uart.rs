//! UART on USART3
//!
//! The controller state lives in a cached [`UartInstance`]; [`Uart`] pairs
//! it with the RX/TX pins it is wired to.

use core::cell::Cell;

use talon_hal::uart::Parity;
use talon_hal::{UartRx, UartTx};

use crate::driver::{ClockGate, Driver, Irq};
use crate::error::Error;
use crate::gpio::{Mode, Pin};
use crate::handle::{RegisterBlock, UartHandle, UartInit};
use crate::regs;

/// Bound used by the `embedded-io` implementations
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate
    pub baudrate: u32,
    pub parity: Parity,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: 9600,
            parity: Parity::None,
        }
    }
}

impl UartConfig {
    /// Translate into the vendor init record (8 data bits, 1 stop bit)
    pub fn to_init(&self) -> UartInit {
        UartInit {
            baud_rate: self.baudrate,
            word_length: regs::UART_WORDLENGTH_8B,
            stop_bits: regs::UART_STOPBITS_1,
            parity: parity_bits(self.parity),
            mode: regs::UART_MODE_RX | regs::UART_MODE_TX,
            hw_flow_ctl: regs::UART_HWCONTROL_NONE,
            over_sampling: regs::UART_OVERSAMPLING_16,
        }
    }
}

/// Map a parity setting to its control-register bits
pub const fn parity_bits(parity: Parity) -> u32 {
    match parity {
        Parity::None => regs::UART_PARITY_NONE,
        Parity::Even => regs::UART_PARITY_EVEN,
        Parity::Odd => regs::USART_CR1_PCE | regs::USART_CR1_PS,
    }
}

/// USART controller state
pub struct UartInstance<'d, D: Driver> {
    driver: &'d D,
    handle: Cell<UartHandle>,
    gate: ClockGate,
    irq: Irq,
    alternate: u32,
}

impl<'d, D: Driver> UartInstance<'d, D> {
    pub(crate) fn new(
        driver: &'d D,
        instance: RegisterBlock,
        gate: ClockGate,
        irq: Irq,
        alternate: u32,
    ) -> Self {
        Self {
            driver,
            handle: Cell::new(UartHandle::bind(instance)),
            gate,
            irq,
            alternate,
        }
    }
}

/// A UART wired to its pins
pub struct Uart<'a, 'd, D: Driver> {
    instance: &'a UartInstance<'d, D>,
    rx: &'a Pin<'d, D>,
    tx: &'a Pin<'d, D>,
}

impl<'a, 'd, D: Driver> Uart<'a, 'd, D> {
    pub(crate) fn new(
        instance: &'a UartInstance<'d, D>,
        rx: &'a Pin<'d, D>,
        tx: &'a Pin<'d, D>,
    ) -> Self {
        Self { instance, rx, tx }
    }

    pub fn rx_pin(&self) -> &'a Pin<'d, D> {
        self.rx
    }

    pub fn tx_pin(&self) -> &'a Pin<'d, D> {
        self.tx
    }

    /// Init record applied by the last successful `configure`
    pub fn init(&self) -> UartInit {
        self.instance.handle.get().init
    }

    /// Route the pins, initialize the controller and enable its interrupt
    pub fn configure(&self, config: &UartConfig) -> Result<(), Error> {
        let uart = self.instance;
        let routing = Mode::alternate(
            regs::GPIO_MODE_AF_PP,
            regs::GPIO_PULLUP,
            regs::GPIO_SPEED_FREQ_VERY_HIGH,
            uart.alternate,
        );
        self.rx.configure(routing);
        self.tx.configure(routing);

        uart.driver.enable_clock(uart.gate);

        let mut handle = uart.handle.get();
        handle.init = config.to_init();
        if let Err(e) = uart.driver.uart_init(&handle).check() {
            warn!("UART init failed: {}", e);
            return Err(e);
        }
        uart.handle.set(handle);

        uart.driver.set_priority(
            uart.irq,
            regs::PERIPHERAL_IRQ_PREEMPT_PRIORITY,
            regs::PERIPHERAL_IRQ_SUB_PRIORITY,
        );
        uart.driver.enable_irq(uart.irq);
        info!("UART configured at {} baud", config.baudrate);
        Ok(())
    }

    pub fn write(&self, data: &[u8], timeout_ms: u32) -> Result<(), Error> {
        let uart = self.instance;
        uart.driver
            .uart_transmit(&uart.handle.get(), data, timeout_ms)
            .check()
    }

    /// Receive into `buf`
    ///
    /// With a `timeout_ms` of zero, polls for a single byte and returns 0
    /// when none is waiting. Otherwise fills the whole buffer or fails with
    /// [`Error::Timeout`].
    pub fn read(&self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let uart = self.instance;
        let handle = uart.handle.get();

        if timeout_ms == 0 {
            return match uart.driver.uart_receive(&handle, &mut buf[..1], 0).check() {
                Ok(()) => Ok(1),
                Err(Error::Timeout) => Ok(0),
                Err(e) => Err(e),
            };
        }

        uart.driver.uart_receive(&handle, buf, timeout_ms).check()?;
        Ok(buf.len())
    }
}

impl<D: Driver> UartTx for Uart<'_, '_, D> {
    type Error = Error;

    fn write(&self, data: &[u8], timeout_ms: u32) -> Result<(), Error> {
        Uart::write(self, data, timeout_ms)
    }
}

impl<D: Driver> UartRx for Uart<'_, '_, D> {
    type Error = Error;

    fn read(&self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Error> {
        Uart::read(self, buf, timeout_ms)
    }
}

impl<D: Driver> embedded_io::ErrorType for Uart<'_, '_, D> {
    type Error = Error;
}

impl<D: Driver> embedded_io::Read for Uart<'_, '_, D> {
    /// Blocks for one byte
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        Uart::read(self, &mut buf[..1], DEFAULT_TIMEOUT_MS)
    }
}

impl<D: Driver> embedded_io::Write for Uart<'_, '_, D> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        Uart::write(self, buf, DEFAULT_TIMEOUT_MS)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
