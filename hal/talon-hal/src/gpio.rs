//! GPIO pin abstractions
//!
//! Provides traits for digital input and output pins that can be implemented
//! by chip-specific HALs.
//!
//! Pins are shared objects: several owners (application code, a bus
//! controller routing its signals) may hold a reference to the same pin, so
//! every operation takes `&self`.

/// Logic level of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinState {
    /// Logic 0
    Low,
    /// Logic 1
    High,
}

impl PinState {
    /// The opposite level
    pub fn toggled(self) -> Self {
        match self {
            PinState::Low => PinState::High,
            PinState::High => PinState::Low,
        }
    }

    /// Check if this is the high level
    pub fn is_high(self) -> bool {
        self == PinState::High
    }
}

impl From<bool> for PinState {
    fn from(high: bool) -> Self {
        if high {
            PinState::High
        } else {
            PinState::Low
        }
    }
}

/// Internal pull resistor selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// Pull-up resistor enabled
    Up,
    /// Pull-down resistor enabled
    Down,
    /// Floating
    #[default]
    None,
}

/// Digital input pin
pub trait DigitalIn {
    /// Read the current level of the pin
    fn get(&self) -> PinState;

    /// Check if the pin reads high (logic 1)
    fn is_high(&self) -> bool {
        self.get().is_high()
    }

    /// Check if the pin reads low (logic 0)
    fn is_low(&self) -> bool {
        !self.is_high()
    }
}

/// Digital output pin
pub trait DigitalOut {
    /// Drive the pin to `state`
    fn set(&self, state: PinState);

    /// Set the pin high (logic 1)
    fn set_high(&self) {
        self.set(PinState::High);
    }

    /// Set the pin low (logic 0)
    fn set_low(&self) {
        self.set(PinState::Low);
    }
}

/// Output pin with a hardware toggle primitive
pub trait ToggleableDigitalOut: DigitalOut {
    /// Invert the output level
    fn toggle(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct MockPin {
        level: Cell<PinState>,
    }

    impl DigitalIn for MockPin {
        fn get(&self) -> PinState {
            self.level.get()
        }
    }

    impl DigitalOut for MockPin {
        fn set(&self, state: PinState) {
            self.level.set(state);
        }
    }

    #[test]
    fn test_default_helpers() {
        let pin = MockPin {
            level: Cell::new(PinState::Low),
        };
        assert!(pin.is_low());

        pin.set_high();
        assert!(pin.is_high());

        pin.set_low();
        assert_eq!(pin.get(), PinState::Low);
    }

    #[test]
    fn test_pin_state_conversions() {
        assert_eq!(PinState::from(true), PinState::High);
        assert_eq!(PinState::from(false), PinState::Low);
        assert_eq!(PinState::High.toggled(), PinState::Low);
        assert_eq!(PinState::Low.toggled(), PinState::High);
    }
}
