// Logging goes through `tracing` when the `with_tracing` feature is enabled
// and compiles away otherwise.

#[cfg(feature = "with_tracing")]
macro_rules! debug {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "with_tracing"))]
macro_rules! debug {
    ($($arg:tt)*) => { discard_fields!($($arg)*) };
}

#[cfg(feature = "with_tracing")]
macro_rules! info {
    ($($arg:tt)*) => { ::tracing::info!($($arg)*) };
}

#[cfg(not(feature = "with_tracing"))]
macro_rules! info {
    ($($arg:tt)*) => { discard_fields!($($arg)*) };
}

#[cfg(feature = "with_tracing")]
macro_rules! error {
    ($($arg:tt)*) => { ::tracing::error!($($arg)*) };
}

#[cfg(not(feature = "with_tracing"))]
macro_rules! error {
    ($($arg:tt)*) => { discard_fields!($($arg)*) };
}

// Marks every field as used without evaluating `key = value` expressions.
#[cfg(not(feature = "with_tracing"))]
macro_rules! discard_fields {
    () => {};
    ($message:literal $($rest:tt)*) => {};
    (% $field:ident $(, $($rest:tt)*)?) => {{
        let _ = &$field;
        $(discard_fields!($($rest)*);)?
    }};
    (? $field:ident $(, $($rest:tt)*)?) => {{
        let _ = &$field;
        $(discard_fields!($($rest)*);)?
    }};
    ($key:ident = $value:expr $(, $($rest:tt)*)?) => {{
        let _ = || $value;
        $(discard_fields!($($rest)*);)?
    }};
}
