//! Strong type definitions for Lockbox.
//!
//! All identifiers are newtypes to prevent misuse at compile time. A
//! `FileId` can never be passed where a `UserId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random (v4) identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            /// Get the raw bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Parse from the hyphenated string form used in request paths.
            pub fn parse(s: &str) -> Result<Self, CoreError> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| CoreError::InvalidId(format!("{}: {}", $label, e)))
            }

            /// The nil identifier (used as a sentinel).
            pub const NIL: Self = Self(Uuid::nil());
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = CoreError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                Uuid::from_slice(slice)
                    .map(Self)
                    .map_err(|e| CoreError::InvalidId(format!("{}: {}", $label, e)))
            }
        }
    };
}

uuid_id!(
    /// Identifier of a registered user.
    UserId,
    "user id"
);

uuid_id!(
    /// Identifier of an uploaded file record.
    FileId,
    "file id"
);

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_parse_roundtrip() {
        let id = FileId::new();
        let recovered = FileId::parse(&id.to_string()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = UserId::parse("not-a-uuid").unwrap_err();
        assert!(matches!(err, CoreError::InvalidId(_)));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(UserId::new(), UserId::new());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let id = UserId::new();
        let recovered = UserId::try_from(id.as_bytes().as_slice()).unwrap();
        assert_eq!(id, recovered);
        assert!(UserId::try_from(&[1u8, 2, 3][..]).is_err());
    }

    #[test]
    fn test_debug_names_the_type() {
        let debug = format!("{:?}", FileId::NIL);
        assert!(debug.starts_with("FileId("));
    }
}
