//! Macros for building and returning [`crate::error::SilverError`] values.

/// Creates a [`crate::error::SilverError`] from a kind and a static description.
///
/// An optional detail (anything implementing [`ToString`], or `detail = expr` to move an owned
/// [`String`]) and an optional `source: expr` can follow.
#[macro_export]
macro_rules! silver_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::SilverError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::SilverError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, detail = $detail:expr) => {
        $crate::error::SilverError::from(($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr, source: $source:expr) => {
        $crate::error::SilverError::from(($kind, $desc, $detail)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::SilverError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::SilverError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Returns early with a [`crate::error::SilverError`], accepting the same arguments as
/// [`silver_error!`].
#[macro_export]
macro_rules! bail {
    ($($arg:tt)+) => {
        return ::core::result::Result::Err($crate::silver_error!($($arg)+))
    };
}
