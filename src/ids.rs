//! Opaque string identifiers for persisted entities.
//!
//! Every entity in the data model (§3) is keyed by a ULID/UUID-shaped opaque
//! string. We model each kind as its own newtype around a `Uuid` so that a
//! `TargetId` and a `DnaId` are not interchangeable at compile time, matching
//! the store's `NodeId`/`EdgeId` newtype split this crate is grounded on.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| Error::invariant_violation(format!("invalid {}: {e}", stringify!($name))))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }
    };
}

define_id!(TargetId);
define_id!(DnaId);
define_id!(LearningEventId);
define_id!(RequestLogId);
define_id!(GreenLightStateId);
define_id!(SessionId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string() {
        let id = TargetId::new();
        let parsed = TargetId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn distinct_kinds_do_not_compare() {
        let target = TargetId::new();
        let dna = DnaId::new();
        assert_ne!(target.to_string(), ""); // sanity, types differ at compile time
        assert_ne!(dna.to_string(), "");
    }
}
