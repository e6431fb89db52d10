//! Identifiers for tasks, sessions and users
//!
//! All three are opaque strings on the wire. Task and session ids are
//! generated here as v4 UUIDs; user ids come from whatever identity
//! source the caller plugs in and are never generated by Prism.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing id string
            pub fn from_raw(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Ledger id of one provider/model generation attempt. Immutable once created.
    TaskId
);

string_id!(
    /// Shared id of all tasks created by one dispatch or iteration call
    SessionId
);

string_id!(
    /// Identity of the caller that owns a session
    UserId
);

impl TaskId {
    /// Create a new unique TaskId
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl SessionId {
    /// Create a new unique SessionId
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = UserId::from("alice");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"alice\"");
        let back: UserId = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_debug_names_the_kind() {
        let id = TaskId::from_raw("t-1");
        assert_eq!(format!("{:?}", id), "TaskId(t-1)");
        assert_eq!(id.to_string(), "t-1");
    }
}
