//! Logging macros, backed by `tracing` when the feature is turned on.
//! Declared before the other modules so they are in scope everywhere.

#[cfg(feature = "tracing")]
macro_rules! debug {
    ($($t: tt)*) => {
        tracing::debug!($($t)*)
    };
}

#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! info {
    ($($t: tt)*) => {
        tracing::info!($($t)*)
    };
}

#[cfg(feature = "tracing")]
macro_rules! warn {
    ($($t: tt)*) => {
        tracing::warn!($($t)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn {
    ($($t: tt)*) => {};
}
