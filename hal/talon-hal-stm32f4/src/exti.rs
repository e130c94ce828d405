//! Interrupt routing
//!
//! The chip has sixteen EXTI lines but only seven vectors for them: pins 0
//! to 4 have their own, pins 5-9 and 10-15 share one each. The vector for a
//! line is demultiplexed here onto a table of sixteen handler slots indexed
//! by pin number. The slot does not know the port; the last pin configured
//! for a number owns it, matching the hardware line selection.
//!
//! The board's vector table calls [`dispatch_exti`] and [`on_system_tick`]
//! from the corresponding interrupt handlers.

use core::cell::{Cell, RefCell};
use core::ops::RangeInclusive;

use critical_section::Mutex;

use crate::driver::{GpioDriver, Irq, SystemDriver};
use crate::gpio::{pin_mask, pin_number_from_mask, PINS_PER_PORT};

static INTERRUPT_HANDLERS: Mutex<RefCell<[Option<fn()>; PINS_PER_PORT as usize]>> =
    Mutex::new(RefCell::new([None; PINS_PER_PORT as usize]));

static SYSTEM_TICK_HANDLER: Mutex<Cell<Option<fn()>>> = Mutex::new(Cell::new(None));

/// An EXTI interrupt vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExtiLine {
    Exti0,
    Exti1,
    Exti2,
    Exti3,
    Exti4,
    Exti9_5,
    Exti15_10,
}

impl ExtiLine {
    /// Vector serving pin `number`
    ///
    /// # Panics
    ///
    /// If `number` is not a valid pin number.
    pub const fn for_pin(number: u8) -> Self {
        match number {
            0 => ExtiLine::Exti0,
            1 => ExtiLine::Exti1,
            2 => ExtiLine::Exti2,
            3 => ExtiLine::Exti3,
            4 => ExtiLine::Exti4,
            5..=9 => ExtiLine::Exti9_5,
            10..=15 => ExtiLine::Exti15_10,
            _ => panic!("pin number out of range"),
        }
    }

    /// Pin numbers served by this vector, ascending
    pub const fn pins(self) -> RangeInclusive<u8> {
        match self {
            ExtiLine::Exti0 => 0..=0,
            ExtiLine::Exti1 => 1..=1,
            ExtiLine::Exti2 => 2..=2,
            ExtiLine::Exti3 => 3..=3,
            ExtiLine::Exti4 => 4..=4,
            ExtiLine::Exti9_5 => 5..=9,
            ExtiLine::Exti15_10 => 10..=15,
        }
    }

    pub const fn irq(self) -> Irq {
        match self {
            ExtiLine::Exti0 => Irq::Exti0,
            ExtiLine::Exti1 => Irq::Exti1,
            ExtiLine::Exti2 => Irq::Exti2,
            ExtiLine::Exti3 => Irq::Exti3,
            ExtiLine::Exti4 => Irq::Exti4,
            ExtiLine::Exti9_5 => Irq::Exti9_5,
            ExtiLine::Exti15_10 => Irq::Exti15_10,
        }
    }
}

/// Store `handler` in the slot for pin `number`, replacing any previous one
pub(crate) fn register_handler(number: u8, handler: fn()) {
    critical_section::with(|cs| {
        INTERRUPT_HANDLERS.borrow_ref_mut(cs)[number as usize] = Some(handler);
    });
    debug!("EXTI handler registered for pin {}", number);
}

pub(crate) fn registered_handler(number: u8) -> Option<fn()> {
    critical_section::with(|cs| INTERRUPT_HANDLERS.borrow_ref(cs)[number as usize])
}

/// Run the handler registered for the pin in `mask`, if any
///
/// `mask` must have exactly one bit set.
pub fn exti_callback(mask: u16) {
    let number = pin_number_from_mask(mask);
    // Called outside the lock so the handler may itself take it
    if let Some(handler) = registered_handler(number) {
        handler();
    }
}

/// Service an EXTI vector
///
/// Checks and clears the pending flag of every pin on `line` in ascending
/// order and runs the handlers of the pins that had fired.
pub fn dispatch_exti<D: GpioDriver>(driver: &D, line: ExtiLine) {
    for number in line.pins() {
        let mask = pin_mask(number);
        if driver.exti_check_and_clear(mask) {
            trace!("EXTI{} fired", number);
            exti_callback(mask);
        }
    }
}

/// Set the callback run on every SysTick, replacing any previous one
pub fn register_system_tick_handler(handler: fn()) {
    critical_section::with(|cs| SYSTEM_TICK_HANDLER.borrow(cs).set(Some(handler)));
}

/// Service the SysTick vector
///
/// The driver tick advances before the user callback runs, so the callback
/// observes the new tick.
pub fn on_system_tick<D: SystemDriver>(driver: &D) {
    driver.increment_tick();
    let handler = critical_section::with(|cs| SYSTEM_TICK_HANDLER.borrow(cs).get());
    if let Some(handler) = handler {
        handler();
    }
}
