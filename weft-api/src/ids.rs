//! # Correlation Identifiers
//!
//! Opaque string identifiers used by the pool and its units. Each kind is a
//! separate newtype so a `CallId` can never be looked up in a registration log
//! by accident.
//!
//! Identifiers are minted from random v4 UUIDs. The only property callers may
//! rely on is uniqueness within the identifier's scope.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First eight characters, for thread names and compact log lines.
            pub fn short(&self) -> &str {
                let end = self.0.char_indices().nth(8).map(|(i, _)| i).unwrap_or(self.0.len());
                &self.0[..end]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

opaque_id!(
    /// Identifies one pool; diagnostics only.
    PoolId
);
opaque_id!(
    /// Identifies one execution unit for its whole lifetime.
    UnitId
);
opaque_id!(
    /// Registry key of a deployed function inside every unit that accepted it.
    FunctionId
);
opaque_id!(
    /// Matches an invoke reply to the caller waiting on it.
    CallId
);
