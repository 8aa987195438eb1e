//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every entity in the city has a strongly-typed ID to prevent accidental
//! mixing of identifiers at compile time. All IDs use UUID v7 (time-ordered)
//! for efficient database indexing.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a citizen of the city.
    AgentId
}

define_id! {
    /// Unique identifier for a ledger transaction.
    TransactionId
}

define_id! {
    /// Unique identifier for an entry in the event log.
    EventId
}

define_id! {
    /// Unique identifier for a police case.
    CaseId
}

define_id! {
    /// Unique identifier for a shared building project.
    ProjectId
}

define_id! {
    /// Unique identifier for a standing city asset.
    AssetId
}

define_id! {
    /// Unique identifier for a gang.
    GangId
}

define_id! {
    /// Unique identifier for an inbox message.
    MessageId
}

define_id! {
    /// Unique identifier for a narrative artifact (daily paper, weekly
    /// review, monthly chronicle).
    StoryId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let agent = AgentId::new();
        let case = CaseId::new();
        // Different types -- the compiler enforces no mixing.
        assert_ne!(agent.into_inner(), Uuid::nil());
        assert_ne!(case.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_roundtrip_serde() {
        let original = EventId::new();
        let json = serde_json::to_string(&original).ok();
        assert!(json.is_some());
        let restored: Result<EventId, _> =
            serde_json::from_str(json.as_deref().unwrap_or(""));
        assert!(restored.is_ok());
    }

    #[test]
    fn id_display_matches_uuid() {
        let id = AgentId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }
}
