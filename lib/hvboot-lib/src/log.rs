use core::fmt::Arguments;

use cfg_if::cfg_if;

pub type LogHandler = unsafe fn(Arguments<'_>, bool);

static mut LOG_HANDLER: Option<LogHandler> = None;

/// # Safety
/// Must not race with a concurrent `log_impl`; bring-up is single threaded.
pub unsafe fn set_handler(handler: LogHandler) {
    LOG_HANDLER = Some(handler);
}

/// # Safety
/// `is_unsafe` lets the handler skip its output lock; only the panic path may pass `true`.
pub unsafe fn log_impl(args: Arguments<'_>, is_unsafe: bool) {
    let handler = LOG_HANDLER;
    if let Some(log) = handler {
        log(args, is_unsafe);
    }
}

cfg_if! {
    if #[cfg(feature = "log-debug")] {
        pub const DEBUG: bool = true;
    } else {
        pub const DEBUG: bool = false;
    }
}

cfg_if! {
    if #[cfg(feature = "log-info")] {
        pub const INFO: bool = true;
    } else {
        pub const INFO: bool = false;
    }
}

cfg_if! {
    if #[cfg(feature = "log-warn")] {
        pub const WARN: bool = true;
    } else {
        pub const WARN: bool = false;
    }
}

cfg_if! {
    if #[cfg(feature = "log-error")] {
        pub const ERROR: bool = true;
    } else {
        pub const ERROR: bool = false;
    }
}

cfg_if! {
    if #[cfg(feature = "log-critical")] {
        pub const CRITICAL: bool = true;
    } else {
        pub const CRITICAL: bool = false;
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($uns:expr, $enabled:expr, $term_fmt:literal, $fmt:literal $(, $args:expr)* $(,)?) => {
        if $enabled {
            #[allow(unused_unsafe)]
            unsafe {
                $crate::log::log_impl(
                    format_args!(concat!("\x1b[", $term_fmt, "m", $fmt, "\x1b[0m") $(, $args)*),
                    $uns,
                )
            }
        }
    };
}

#[macro_export]
macro_rules! debug {
    ($($args:tt)*) => { $crate::__log!(false, $crate::log::DEBUG, "2", $($args)*) };
}

#[macro_export]
macro_rules! unsafe_debug {
    ($($args:tt)*) => { $crate::__log!(true, $crate::log::DEBUG, "2", $($args)*) };
}

#[macro_export]
macro_rules! info {
    ($($args:tt)*) => { $crate::__log!(false, $crate::log::INFO, "", $($args)*) };
}

#[macro_export]
macro_rules! unsafe_info {
    ($($args:tt)*) => { $crate::__log!(true, $crate::log::INFO, "", $($args)*) };
}

#[macro_export]
macro_rules! warn {
    ($($args:tt)*) => { $crate::__log!(false, $crate::log::WARN, "1;33", $($args)*) };
}

#[macro_export]
macro_rules! unsafe_warn {
    ($($args:tt)*) => { $crate::__log!(true, $crate::log::WARN, "1;33", $($args)*) };
}

#[macro_export]
macro_rules! error {
    ($($args:tt)*) => { $crate::__log!(false, $crate::log::ERROR, "1;31", $($args)*) };
}

#[macro_export]
macro_rules! unsafe_error {
    ($($args:tt)*) => { $crate::__log!(true, $crate::log::ERROR, "1;31", $($args)*) };
}

#[macro_export]
macro_rules! critical {
    ($($args:tt)*) => { $crate::__log!(false, $crate::log::CRITICAL, "1;37;41", $($args)*) };
}

#[macro_export]
macro_rules! unsafe_critical {
    ($($args:tt)*) => { $crate::__log!(true, $crate::log::CRITICAL, "1;37;41", $($args)*) };
}
