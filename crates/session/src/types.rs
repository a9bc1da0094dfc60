//! String identifiers exchanged with callers.
//!
//! [`Ticket`] and [`Token`] are bearer credentials: their `Debug` output is
//! redacted so they never end up in span fields or panic messages by
//! accident. `Display` and [`as_str`](Ticket::as_str) still expose the raw
//! value for transport.

use std::fmt;

/// Macro to define a newtype wrapper around `String` with standard trait
/// implementations.
///
/// Each generated type:
/// - Derives `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Derives `Serialize` and `Deserialize` (transparent)
/// - Implements `From<String>`, `From<&str>` and `From<$name> for String`
/// - Implements `Display` and `AsRef<str>`
///
/// `Debug` is left to each type.
macro_rules! define_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Borrows the raw value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the raw value.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(key: $name) -> Self {
                key.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_key!(
    /// Application-level user identifier a ticket is bound to.
    ///
    /// Also the row key of the user's session attributes.
    ///
    /// # Examples
    ///
    /// ```
    /// use proteus_session::UserId;
    ///
    /// let user = UserId::from("100");
    /// assert_eq!(user.as_str(), "100");
    /// assert_eq!(format!("{user:?}"), "UserId(\"100\")");
    /// ```
    UserId
);

define_key!(
    /// Opaque credential resolving to a [`UserId`].
    ///
    /// Generated tickets are 24 random bytes in standard base64 (32
    /// characters). Any string is accepted when parsing caller input; unknown
    /// values simply fail to resolve.
    ///
    /// # Examples
    ///
    /// ```
    /// use proteus_session::Ticket;
    ///
    /// let ticket = Ticket::from("q1Xn0mS3...");
    /// assert_eq!(format!("{ticket:?}"), "Ticket(<redacted>)");
    /// ```
    Ticket
);

define_key!(
    /// Short-lived handle that relays a [`Ticket`] to a second device.
    ///
    /// Generated tokens are eight lowercase ASCII letters.
    Token
);

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UserId").field(&self.0).finish()
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ticket(<redacted>)")
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}
