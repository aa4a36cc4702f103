pub mod config;
pub mod error;
pub mod storage;
pub mod gateway;
pub mod identity;
pub mod notify;

pub use config::GatewayConfig;
pub use error::{AppError, AppResult, ErrorKind};

// Test-only printing helper: expands to eprintln! during tests and debug builds and is absent otherwise.
// Never pass token values to it.
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
