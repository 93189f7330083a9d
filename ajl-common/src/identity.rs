//! Participant identity
//!
//! An identity is created once on the start screen and then carried by the
//! client with every request. The group number is derived from the stored
//! group label, never persisted on its own.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{parse_group_number, GroupNumber};
use crate::{Error, Result};

/// Request header carrying the JSON-encoded identity
pub const IDENTITY_HEADER: &str = "x-ajl-identity";

pub const DISPLAY_NAME_MIN: usize = 2;
pub const DISPLAY_NAME_MAX: usize = 30;

/// Who is using the toolkit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub display_name: String,
    pub group_id: String,
    pub group_name: String,
    pub session_id: Uuid,
}

impl Identity {
    /// Build a new identity, reusing `session_id` when the client already has one
    pub fn register(
        display_name: &str,
        group_id: &str,
        group_name: &str,
        session_id: Option<Uuid>,
    ) -> Result<Self> {
        let display_name = display_name.trim();
        let len = display_name.chars().count();
        if !(DISPLAY_NAME_MIN..=DISPLAY_NAME_MAX).contains(&len) {
            return Err(Error::InvalidInput(format!(
                "Display name must be between {} and {} characters.",
                DISPLAY_NAME_MIN, DISPLAY_NAME_MAX
            )));
        }
        if group_id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Choose a group so we can attribute entries.".to_string(),
            ));
        }

        Ok(Self {
            display_name: display_name.to_string(),
            group_id: group_id.to_string(),
            group_name: group_name.to_string(),
            session_id: session_id.unwrap_or_else(Uuid::new_v4),
        })
    }

    /// Decode the header value sent by the client; malformed values yield `None`
    pub fn from_header_value(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn group_number(&self) -> Option<GroupNumber> {
        parse_group_number(&self.group_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_trims_and_assigns_session() {
        let identity = Identity::register("  Sam  ", "g-1", "Group 2", None).unwrap();
        assert_eq!(identity.display_name, "Sam");
        assert_eq!(identity.group_number(), GroupNumber::new(2));
    }

    #[test]
    fn test_register_reuses_session() {
        let session = Uuid::new_v4();
        let identity = Identity::register("Sam", "g-1", "Group 2", Some(session)).unwrap();
        assert_eq!(identity.session_id, session);
    }

    #[test]
    fn test_register_rejects_bad_names() {
        assert!(Identity::register("A", "g-1", "Group 1", None).is_err());
        assert!(Identity::register(&"x".repeat(31), "g-1", "Group 1", None).is_err());
        assert!(Identity::register("Alex", "  ", "Group 1", None).is_err());
    }

    #[test]
    fn test_header_value_parsing() {
        let identity = Identity::register("Robin", "g-3", "Group 3", None).unwrap();
        let raw = serde_json::to_string(&identity).unwrap();
        assert!(raw.contains("\"groupName\":\"Group 3\""));
        assert_eq!(Identity::from_header_value(&raw), Some(identity));
        assert_eq!(Identity::from_header_value("not json"), None);
    }

    #[test]
    fn test_unparseable_group_has_no_number() {
        let identity = Identity::register("Robin", "g-9", "Facilitators", None).unwrap();
        assert_eq!(identity.group_number(), None);
    }
}
