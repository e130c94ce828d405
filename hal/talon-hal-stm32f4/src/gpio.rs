//! GPIO ports and pins
//!
//! Each of the eleven ports is a [`Peripheral`] owning up to sixteen
//! [`Pin`]s. Pins are created on first lookup and live as long as the
//! port; every later lookup of the same number returns the same object.
//!
//! ```text
//!   Gpio ── port(Port::B) ──► Peripheral ── pin(13) ──► &Pin
//!                                 │                       │
//!                          clock gate (lazy)       Mode state machine
//! ```
//!
//! A pin's port clock is enabled the first time the pin is configured.

use core::cell::{Cell, OnceCell};
use core::convert::Infallible;

use bitflags::bitflags;
use talon_hal::{DigitalIn, DigitalOut, PinState, Pull, ToggleableDigitalOut};

use crate::driver::{ClockGate, Driver};
use crate::exti::{self, ExtiLine};
use crate::handle::{GpioInit, RegisterBlock};
use crate::regs;

/// Pins per port
pub const PINS_PER_PORT: u8 = 16;

/// GPIO port identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
}

impl Port {
    /// All ports in register order
    pub const ALL: [Port; 11] = [
        Port::A,
        Port::B,
        Port::C,
        Port::D,
        Port::E,
        Port::F,
        Port::G,
        Port::H,
        Port::I,
        Port::J,
        Port::K,
    ];

    /// Register block of this port
    pub const fn base(self) -> RegisterBlock {
        RegisterBlock::gpio(self as usize)
    }

    pub const fn clock_gate(self) -> ClockGate {
        ClockGate::Gpio(self)
    }
}

bitflags! {
    /// Interrupt trigger edges
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Edge: u32 {
        const RISING = regs::GPIO_MODE_IT_RISING;
        const FALLING = regs::GPIO_MODE_IT_FALLING;
        const BOTH = regs::GPIO_MODE_IT_RISING | regs::GPIO_MODE_IT_FALLING;
    }
}

/// Pin operating mode
#[derive(Debug, Clone, Copy)]
pub enum Mode {
    /// Digital input, low speed
    Input { pull: Pull },
    /// Push-pull output, no pull, very high speed
    Output,
    /// EXTI interrupt source; `handler` runs in interrupt context
    Interrupt {
        edge: Edge,
        pull: Pull,
        handler: fn(),
    },
    /// Raw init record, used to route pins to alternate functions
    Manual(GpioInit),
}

impl Mode {
    /// Translate into an init record for the pin in `mask`
    pub fn to_init(&self, mask: u16) -> GpioInit {
        let pin = u32::from(mask);
        match *self {
            Mode::Input { pull } => GpioInit {
                pin,
                mode: regs::GPIO_MODE_INPUT,
                pull: pull_bits(pull),
                speed: regs::GPIO_SPEED_FREQ_LOW,
                alternate: 0,
            },
            Mode::Output => GpioInit {
                pin,
                mode: regs::GPIO_MODE_OUTPUT_PP,
                pull: regs::GPIO_NOPULL,
                speed: regs::GPIO_SPEED_FREQ_VERY_HIGH,
                alternate: 0,
            },
            Mode::Interrupt { edge, pull, .. } => GpioInit {
                pin,
                mode: edge.bits(),
                pull: pull_bits(pull),
                speed: regs::GPIO_SPEED_FREQ_VERY_HIGH,
                alternate: 0,
            },
            Mode::Manual(init) => GpioInit { pin, ..init },
        }
    }

    /// Alternate-function routing record for controller signals
    pub const fn alternate(mode: u32, pull: u32, speed: u32, alternate: u32) -> Mode {
        Mode::Manual(GpioInit {
            pin: 0,
            mode,
            pull,
            speed,
            alternate,
        })
    }
}

/// Map a pull setting to its vendor constant
pub const fn pull_bits(pull: Pull) -> u32 {
    match pull {
        Pull::Up => regs::GPIO_PULLUP,
        Pull::Down => regs::GPIO_PULLDOWN,
        Pull::None => regs::GPIO_NOPULL,
    }
}

/// Single-bit mask of pin `number`
pub const fn pin_mask(number: u8) -> u16 {
    1 << number
}

/// Pin number of a single-bit mask
///
/// Only meaningful for masks with exactly one bit set.
pub fn pin_number_from_mask(mask: u16) -> u8 {
    debug_assert!(mask.count_ones() == 1, "mask {:#x} is not a single pin", mask);
    let mut value = mask;
    let mut number = 0;
    while value > 1 {
        value >>= 1;
        number += 1;
    }
    number
}

/// All GPIO ports of the chip
pub struct Gpio<'d, D: Driver> {
    ports: [Peripheral<'d, D>; 11],
}

impl<'d, D: Driver> Gpio<'d, D> {
    pub fn new(driver: &'d D) -> Self {
        Self {
            ports: core::array::from_fn(|i| Peripheral::new(Port::ALL[i], driver)),
        }
    }

    pub fn port(&self, port: Port) -> &Peripheral<'d, D> {
        &self.ports[port as usize]
    }

    /// Shorthand for `port(port).pin(number, mode)`
    pub fn pin(&self, port: Port, number: u8, mode: Option<Mode>) -> &Pin<'d, D> {
        self.port(port).pin(number, mode)
    }
}

/// One GPIO port
pub struct Peripheral<'d, D: Driver> {
    port: Port,
    driver: &'d D,
    pins: [OnceCell<Pin<'d, D>>; PINS_PER_PORT as usize],
}

impl<'d, D: Driver> Peripheral<'d, D> {
    fn new(port: Port, driver: &'d D) -> Self {
        Self {
            port,
            driver,
            pins: core::array::from_fn(|_| OnceCell::new()),
        }
    }

    pub fn id(&self) -> Port {
        self.port
    }

    /// Look up a pin, creating it on first use
    ///
    /// `mode` is applied only when the pin is created; for an existing pin it
    /// is ignored.
    ///
    /// # Panics
    ///
    /// If `number` is not below [`PINS_PER_PORT`].
    pub fn pin(&self, number: u8, mode: Option<Mode>) -> &Pin<'d, D> {
        assert!(
            number < PINS_PER_PORT,
            "pin number {} out of range",
            number
        );

        let mut created = false;
        let pin = self.pins[number as usize].get_or_init(|| {
            created = true;
            Pin::new(self.port, number, self.driver)
        });

        if created {
            if let Some(mode) = mode {
                pin.configure(mode);
            }
        }
        pin
    }
}

/// A single GPIO pin
pub struct Pin<'d, D: Driver> {
    port: Port,
    number: u8,
    driver: &'d D,
    mode: Cell<Option<Mode>>,
}

impl<'d, D: Driver> Pin<'d, D> {
    fn new(port: Port, number: u8, driver: &'d D) -> Self {
        Self {
            port,
            number,
            driver,
            mode: Cell::new(None),
        }
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn mask(&self) -> u16 {
        pin_mask(self.number)
    }

    /// Mode applied by the last `configure`, `None` when unconfigured
    pub fn mode(&self) -> Option<Mode> {
        self.mode.get()
    }

    /// Apply `mode`; legal from any state
    ///
    /// Interrupt mode registers the handler in the slot for this pin
    /// number, replacing whatever was there regardless of port, and enables
    /// the pin's EXTI line.
    pub fn configure(&self, mode: Mode) {
        self.driver.enable_clock(self.port.clock_gate());

        let init = mode.to_init(self.mask());

        if let Mode::Interrupt { handler, .. } = mode {
            exti::register_handler(self.number, handler);
            let irq = ExtiLine::for_pin(self.number).irq();
            self.driver.set_priority(
                irq,
                regs::PERIPHERAL_IRQ_PREEMPT_PRIORITY,
                regs::PERIPHERAL_IRQ_SUB_PRIORITY,
            );
            self.driver.enable_irq(irq);
        }

        self.driver.gpio_init(self.port.base(), &init);
        self.mode.set(Some(mode));
        debug!("P{}{} configured", self.port, self.number);
    }

    /// Return the pin to its reset state
    ///
    /// An interrupt handler registered for this pin number stays in place.
    pub fn unconfigure(&self) {
        self.driver.gpio_deinit(self.port.base(), self.mask());
        self.mode.set(None);
    }

    pub fn get(&self) -> PinState {
        PinState::from(self.driver.gpio_read(self.port.base(), self.mask()))
    }

    pub fn set(&self, state: PinState) {
        self.driver
            .gpio_write(self.port.base(), self.mask(), state.is_high());
    }

    pub fn toggle(&self) {
        self.driver.gpio_toggle(self.port.base(), self.mask());
    }
}

impl<D: Driver> DigitalIn for Pin<'_, D> {
    fn get(&self) -> PinState {
        Pin::get(self)
    }
}

impl<D: Driver> DigitalOut for Pin<'_, D> {
    fn set(&self, state: PinState) {
        Pin::set(self, state)
    }
}

impl<D: Driver> ToggleableDigitalOut for Pin<'_, D> {
    fn toggle(&self) {
        Pin::toggle(self)
    }
}

impl<D: Driver> embedded_hal::digital::ErrorType for &Pin<'_, D> {
    type Error = Infallible;
}

impl<D: Driver> embedded_hal::digital::InputPin for &Pin<'_, D> {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(Pin::get(*self).is_high())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!Pin::get(*self).is_high())
    }
}

impl<D: Driver> embedded_hal::digital::OutputPin for &Pin<'_, D> {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Pin::set(*self, PinState::Low);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Pin::set(*self, PinState::High);
        Ok(())
    }
}

impl<D: Driver> embedded_hal::digital::StatefulOutputPin for &Pin<'_, D> {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(Pin::get(*self).is_high())
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!Pin::get(*self).is_high())
    }

    fn toggle(&mut self) -> Result<(), Infallible> {
        Pin::toggle(*self);
        Ok(())
    }
}
