//! Logging shim
//!
//! Forwards to `defmt` when the `defmt` feature is enabled; otherwise the
//! macros only evaluate their arguments so the crate stays free of a
//! logging backend. Declared with `#[macro_use]` ahead of every other
//! module, so the macros are in scope by name without imports.

#![allow(unused_macros)]

#[cfg(feature = "defmt")]
macro_rules! trace {
    ($($arg:tt)*) => { ::defmt::trace!($($arg)*) };
}

#[cfg(feature = "defmt")]
macro_rules! debug {
    ($($arg:tt)*) => { ::defmt::debug!($($arg)*) };
}

#[cfg(feature = "defmt")]
macro_rules! info {
    ($($arg:tt)*) => { ::defmt::info!($($arg)*) };
}

#[cfg(feature = "defmt")]
macro_rules! warn {
    ($($arg:tt)*) => { ::defmt::warn!($($arg)*) };
}

#[cfg(feature = "defmt")]
macro_rules! error {
    ($($arg:tt)*) => { ::defmt::error!($($arg)*) };
}

// Stub macros when defmt is not available
#[cfg(not(feature = "defmt"))]
macro_rules! trace {
    ($fmt:literal $(, $arg:expr)*) => {{ $( let _ = &$arg; )* }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($fmt:literal $(, $arg:expr)*) => {{ $( let _ = &$arg; )* }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($fmt:literal $(, $arg:expr)*) => {{ $( let _ = &$arg; )* }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($fmt:literal $(, $arg:expr)*) => {{ $( let _ = &$arg; )* }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! error {
    ($fmt:literal $(, $arg:expr)*) => {{ $( let _ = &$arg; )* }};
}

#[cfg(all(test, not(feature = "defmt")))]
mod tests {
    use core::cell::Cell;

    #[test]
    fn test_stubs_evaluate_arguments() {
        let evaluated = Cell::new(0);
        let count = || {
            evaluated.set(evaluated.get() + 1);
            evaluated.get()
        };

        trace!("trace {}", count());
        debug!("debug {} {}", count(), count());
        info!("info {}", count());
        warn!("warn {}", count());
        error!("error {}", count());
        info!("no arguments");

        assert_eq!(evaluated.get(), 6);
    }
}
