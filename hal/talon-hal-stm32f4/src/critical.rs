//! Nested critical sections
//!
//! [`run_exclusive`] masks interrupts for the outermost call only. Nested
//! calls share the outer section; interrupts come back when the last one
//! exits, on every exit path including unwinding.

use core::sync::atomic::{AtomicUsize, Ordering};

static DEPTH: AtomicUsize = AtomicUsize::new(0);

/// Run `f` with interrupts masked
///
/// Re-entrant: calling it from inside another `run_exclusive` body is fine
/// and does not unmask interrupts early.
pub fn run_exclusive<R>(f: impl FnOnce() -> R) -> R {
    let _section = Section::enter();
    f()
}

/// Current nesting depth; zero outside any critical section
pub fn nesting_depth() -> usize {
    DEPTH.load(Ordering::SeqCst)
}

/// Whether interrupts are currently unmasked
pub fn interrupts_enabled() -> bool {
    interrupts::enabled()
}

struct Section;

impl Section {
    fn enter() -> Self {
        if DEPTH.fetch_add(1, Ordering::SeqCst) == 0 {
            interrupts::disable();
        }
        Section
    }
}

impl Drop for Section {
    fn drop(&mut self) {
        if DEPTH.fetch_sub(1, Ordering::SeqCst) == 1 {
            interrupts::enable();
        }
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod interrupts {
    pub fn disable() {
        cortex_m::interrupt::disable();
    }

    pub fn enable() {
        // Only reached when the outermost section exits
        #[allow(unsafe_code)]
        unsafe {
            cortex_m::interrupt::enable()
        }
    }

    pub fn enabled() -> bool {
        cortex_m::register::primask::read().is_inactive()
    }
}

// Host builds track the mask in memory
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
mod interrupts {
    use core::sync::atomic::{AtomicBool, Ordering};

    static ENABLED: AtomicBool = AtomicBool::new(true);

    pub fn disable() {
        ENABLED.store(false, Ordering::SeqCst);
    }

    pub fn enable() {
        ENABLED.store(true, Ordering::SeqCst);
    }

    pub fn enabled() -> bool {
        ENABLED.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_lock;

    #[test]
    fn test_single_section() {
        let _lock = test_lock::acquire();
        assert!(interrupts_enabled());

        let value = run_exclusive(|| {
            assert!(!interrupts_enabled());
            assert_eq!(nesting_depth(), 1);
            42
        });

        assert_eq!(value, 42);
        assert!(interrupts_enabled());
        assert_eq!(nesting_depth(), 0);
    }

    #[test]
    fn test_nested_sections_unmask_once() {
        let _lock = test_lock::acquire();

        run_exclusive(|| {
            run_exclusive(|| {
                run_exclusive(|| assert_eq!(nesting_depth(), 3));
                assert_eq!(nesting_depth(), 2);
                assert!(!interrupts_enabled());
            });
            // Inner exit must not unmask
            assert_eq!(nesting_depth(), 1);
            assert!(!interrupts_enabled());
        });

        assert_eq!(nesting_depth(), 0);
        assert!(interrupts_enabled());
    }

    #[test]
    fn test_unwinding_restores_state() {
        let _lock = test_lock::acquire();

        let result = std::panic::catch_unwind(|| {
            run_exclusive(|| {
                run_exclusive(|| panic!("body failed"));
            })
        });

        assert!(result.is_err());
        assert_eq!(nesting_depth(), 0);
        assert!(interrupts_enabled());
    }
}
