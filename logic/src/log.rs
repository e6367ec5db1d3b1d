//! Logging shims.
//!
//! With the `defmt` feature the macros forward to `defmt`. Host unit tests print to stdout.
//! Otherwise they compile to nothing, so the control loop carries no logging cost.
//!
//! Only plain `{}` placeholders are used so one format string works for both backends.

macro_rules! log_warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(all(feature = "defmt", not(test)))]
        ::defmt::warn!($fmt $(, $arg)*);
        #[cfg(test)]
        std::println!(concat!("[WARN] ", $fmt) $(, $arg)*);
        #[cfg(all(not(feature = "defmt"), not(test)))]
        {
            $(let _ = &$arg;)*
        }
    }};
}

macro_rules! log_debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(all(feature = "defmt", not(test)))]
        ::defmt::debug!($fmt $(, $arg)*);
        #[cfg(test)]
        std::println!(concat!("[DEBUG] ", $fmt) $(, $arg)*);
        #[cfg(all(not(feature = "defmt"), not(test)))]
        {
            $(let _ = &$arg;)*
        }
    }};
}

macro_rules! log_trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(all(feature = "defmt", not(test)))]
        ::defmt::trace!($fmt $(, $arg)*);
        #[cfg(test)]
        std::println!(concat!("[TRACE] ", $fmt) $(, $arg)*);
        #[cfg(all(not(feature = "defmt"), not(test)))]
        {
            $(let _ = &$arg;)*
        }
    }};
}
