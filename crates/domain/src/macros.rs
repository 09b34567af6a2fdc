//! Macro for implementing Display and FromStr for wire-string enums
//!
//! Operation types, statuses, payment methods and the other closed sets in
//! this crate all travel as strings (JSON payloads, SQLite columns, RPC
//! parameters). This macro keeps their string form in one place.
//!
//! # Example
//!
//! ```rust
//! use barsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum TicketStatus {
//!     Open,
//!     Paid,
//! }
//!
//! impl_domain_status_conversions!(TicketStatus {
//!     Open => "open",
//!     Paid => "paid",
//! });
//!
//! assert_eq!(TicketStatus::Paid.to_string(), "paid");
//! assert_eq!("OPEN".parse::<TicketStatus>(), Ok(TicketStatus::Open));
//! ```

/// Implements Display and FromStr traits for string-backed enums
///
/// This macro generates:
/// - Display trait: writes the declared string for each variant verbatim
/// - FromStr trait: ASCII case-insensitive match against the declared strings
///
/// The declared strings may use any casing (`"pending"`,
/// `"CREATE_SALE"`); parsing accepts every casing of them.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical wire representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
