//! Common identifier types used across the registry.

/// Macro to define a newtype wrapper around `i64` with standard trait
/// implementations.
///
/// Each generated type:
/// - Is a transparent wrapper around `i64` (zero runtime cost)
/// - Derives `Copy`, `Clone`, `Debug`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Derives `Serialize` and `Deserialize` (transparent)
/// - Implements `From<i64>` and `Into<i64>`
/// - Implements `Display` that outputs the inner value
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<i64>().map(Self)
            }
        }
    };
}

define_id!(
    /// Tenant identifier scoping every key and token.
    ///
    /// Each tenant owns an isolated key registry. No operation ever relates
    /// keys or tokens of one tenant to another, and the wrapper makes it a
    /// compile-time error to pass some other integer where a tenant is
    /// expected.
    ///
    /// # Examples
    ///
    /// ```
    /// use geotracker_common_storage::TenantId;
    ///
    /// let tenant = TenantId::from(42);
    /// assert_eq!(i64::from(tenant), 42);
    /// assert_eq!(tenant.to_string(), "42");
    /// assert_eq!("42".parse::<TenantId>().unwrap(), tenant);
    /// ```
    TenantId
);
