//! Strong type definitions for Vaultline.
//!
//! All identifiers are newtypes to prevent misuse at compile time. They are
//! opaque strings on the wire and order lexicographically.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier, rejecting the empty string.
            pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(CoreError::InvalidIdentifier(
                        concat!(stringify!($name), " must not be empty").into(),
                    ));
                }
                Ok(Self(id))
            }

            /// Borrow the identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a dataset (one version chain per dataset).
    DatasetId
);

string_id!(
    /// Identifier of a manifest entry. Entries are hashed in this order.
    EntryId
);

string_id!(
    /// Identifier of a version commit.
    CommitId
);

string_id!(
    /// Opaque content identifier assigned by the blob store.
    BlobId
);

impl EntryId {
    /// Generate a time-ordered identifier (UUIDv7).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl CommitId {
    /// Generate a time-ordered identifier (UUIDv7).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

/// A caller identity as it appears in access policies.
///
/// Addresses are trimmed and lowercased on construction so that hex
/// addresses compare equal regardless of checksum casing.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Normalize and wrap an address.
    pub fn new(address: impl AsRef<str>) -> Result<Self, CoreError> {
        let normalized = address.as_ref().trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(CoreError::InvalidIdentifier("address must not be empty".into()));
        }
        if normalized.contains(',') {
            return Err(CoreError::InvalidIdentifier(format!(
                "address must not contain ',': {normalized}"
            )));
        }
        Ok(Self(normalized))
    }

    /// Borrow the normalized address text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
