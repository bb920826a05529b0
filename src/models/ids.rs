//! Numeric entity identifiers.
//!
//! Every warehouse entity is addressed by a small integer id. All engine
//! state is keyed on these ids in ordered maps, so iteration order — and
//! therefore every observable tie-break — is stable across runs.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

entity_id!(
    /// Identifier of a customer order.
    OrderId,
    "O"
);
entity_id!(
    /// Identifier of a movable storage pod.
    PodId,
    "P"
);
entity_id!(
    /// Identifier of a mobile robot.
    RobotId,
    "R"
);
entity_id!(
    /// Identifier of a pick/pack output station.
    StationId,
    "S"
);
entity_id!(
    /// Identifier of an item type (SKU).
    ItemId,
    "I"
);
entity_id!(
    /// Identifier of a waypoint on the warehouse grid.
    WaypointId,
    "W"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(OrderId(3).to_string(), "O3");
        assert_eq!(PodId(0).to_string(), "P0");
        assert_eq!(StationId(12).to_string(), "S12");
    }

    #[test]
    fn test_ordering_is_numeric() {
        let mut ids = vec![PodId(10), PodId(2), PodId(7)];
        ids.sort();
        assert_eq!(ids, vec![PodId(2), PodId(7), PodId(10)]);
    }

    #[test]
    fn test_serde_transparent() {
        let id: ItemId = serde_json::from_str("5").unwrap();
        assert_eq!(id, ItemId(5));
        assert_eq!(serde_json::to_string(&id).unwrap(), "5");
    }
}
