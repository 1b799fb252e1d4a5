//! A leveled, debug-build-only trace facility - this crate's ambient logging
//! story in place of a `log`/`tracing` dependency, neither of which the
//! teacher pulls in.
//!
//! Grounded on `examples/creative-forest-lang-pt`'s `util::logger::Log<T>`:
//! same four-level enum plus an `order()` total order used to gate
//! `println!` calls behind `#[cfg(debug_assertions)]`, so a release build
//! pays nothing for it. Generalized here to a plain `&str` payload (the
//! teacher's version is generic over the logged value only because it reuses
//! `Log` as a lexeme-debug verbosity knob tied to one call site); call sites
//! in this crate pass a formatted `String` directly.
use std::fmt::{self, Display, Formatter};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Log<T> {
    None,
    Default(T),
    Success(T),
    Result(T),
    Verbose(T),
}

impl<T> Log<T> {
    pub fn order(&self) -> u8 {
        match self {
            Log::None => 0,
            Log::Default(_) => 1,
            Log::Success(_) => 2,
            Log::Result(_) => 3,
            Log::Verbose(_) => 4,
        }
    }
}

impl<T: Display> Display for Log<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Log::None => Ok(()),
            Log::Default(s) | Log::Success(s) | Log::Result(s) | Log::Verbose(s) => write!(f, "{}", s),
        }
    }
}

impl Log<()> {
    /// Prints `message` when `level` is at least as verbose as `threshold`,
    /// compiled out entirely in release builds.
    pub fn trace(threshold: Log<()>, level: Log<()>, message: &str) {
        #[cfg(debug_assertions)]
        if level.order() >= threshold.order() {
            println!("[{}] {}", level, message);
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = (threshold, level, message);
        }
    }
}

impl Display for Log<()> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Log::None => write!(f, "none"),
            Log::Default(()) => write!(f, "default"),
            Log::Success(()) => write!(f, "success"),
            Log::Result(()) => write!(f, "result"),
            Log::Verbose(()) => write!(f, "verbose"),
        }
    }
}
