//! Strongly-typed identifiers for keyroute entities.
//!
//! Following `TigerStyle`: explicit types prevent bugs from mixing up IDs.
//! Identifiers are opaque strings assigned by the data service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Macro to generate strongly-typed string ID wrappers.
///
/// Each ID type wraps a `String` and provides:
/// - Type safety (can't mix `CollectionId` with `PartitionKeyRangeId`)
/// - Debug/Display formatting
/// - Transparent serde representation (same as a bare JSON string)
macro_rules! define_name {
    ($name:ident, $prefix:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID from a raw string.
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the raw string value.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the ID is the empty string.
            #[inline]
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $prefix, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_name!(
    CollectionId,
    "collection",
    "Identifier (link) of a partitioned collection."
);
define_name!(
    PartitionKeyRangeId,
    "pkrange",
    "Identifier of one physical partition key range within a collection."
);
