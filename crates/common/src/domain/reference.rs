use crate::domain::identifier::CanonicalIdentifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource types a canonical reference can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Practitioner,
    PractitionerRole,
    CareTeam,
    Organization,
    Group,
    Communication,
    Media,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Practitioner => "Practitioner",
            ResourceType::PractitionerRole => "PractitionerRole",
            ResourceType::CareTeam => "CareTeam",
            ResourceType::Organization => "Organization",
            ResourceType::Group => "Group",
            ResourceType::Communication => "Communication",
            ResourceType::Media => "Media",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer from one target resource to another, by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalReference {
    #[serde(rename = "type")]
    pub target_type: ResourceType,
    pub identifier: CanonicalIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl CanonicalReference {
    pub fn new(target_type: ResourceType, identifier: CanonicalIdentifier) -> Self {
        Self {
            target_type,
            identifier,
            display: None,
        }
    }

    /// Reference whose display reads `"{Type} = {label}"`.
    pub fn labelled(
        target_type: ResourceType,
        identifier: CanonicalIdentifier,
        label: &str,
    ) -> Self {
        Self {
            target_type,
            identifier,
            display: Some(format!("{} = {}", target_type, label)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labelled_reference_display() {
        let reference = CanonicalReference::labelled(
            ResourceType::Group,
            CanonicalIdentifier::temporary("!room:x"),
            "!room:x",
        );
        assert_eq!(reference.display.as_deref(), Some("Group = !room:x"));
    }

    #[test]
    fn test_reference_serializes_type_name() {
        let reference = CanonicalReference::new(
            ResourceType::PractitionerRole,
            CanonicalIdentifier::temporary("@bob:x"),
        );
        let json = serde_json::to_value(&reference).unwrap();
        assert_eq!(json["type"], "PractitionerRole");
        assert!(json.get("display").is_none());
    }
}
