use crate::domain::communication::CommunicationResource;
use crate::domain::group::GroupResource;
use crate::domain::reference::ResourceType;
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Intended downstream operation for the wrapped resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resource_type")]
pub enum Resource {
    Group(GroupResource),
    Communication(CommunicationResource),
}

impl Resource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Resource::Group(_) => ResourceType::Group,
            Resource::Communication(_) => ResourceType::Communication,
        }
    }
}

/// Versioned message code identifying what kind of bundle an envelope carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCode {
    pub system: String,
    pub version: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceHeader {
    pub event: EventCode,
    pub source_name: String,
    pub software: String,
    pub endpoint: String,
}

/// Packaged output unit handed to the egress sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEnvelope {
    pub header: ProvenanceHeader,
    pub operation: Operation,
    pub target_type: ResourceType,
    pub resource: Resource,
    pub timestamp: DateTime<Utc>,
}

/// Routing class of an envelope, taken from what its resource is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    Practitioner,
    PractitionerRole,
    CareTeam,
    Organization,
    Group,
    Other,
}

impl SubjectKind {
    pub fn as_token(&self) -> &'static str {
        match self {
            SubjectKind::Practitioner => "practitioner",
            SubjectKind::PractitionerRole => "practitioner_role",
            SubjectKind::CareTeam => "care_team",
            SubjectKind::Organization => "organization",
            SubjectKind::Group => "group",
            SubjectKind::Other => "other",
        }
    }
}

impl ResourceEnvelope {
    /// Groups are their own subject; communications are classified by their subject reference.
    pub fn subject_kind(&self) -> SubjectKind {
        match &self.resource {
            Resource::Group(_) => SubjectKind::Group,
            Resource::Communication(communication) => match communication.subject.target_type {
                ResourceType::Practitioner => SubjectKind::Practitioner,
                ResourceType::PractitionerRole => SubjectKind::PractitionerRole,
                ResourceType::CareTeam => SubjectKind::CareTeam,
                ResourceType::Organization => SubjectKind::Organization,
                ResourceType::Group => SubjectKind::Group,
                ResourceType::Communication | ResourceType::Media => SubjectKind::Other,
            },
        }
    }
}

/// Trait for publishing packaged resource envelopes to the egress sinks
///
/// Implementations pick the sink from the resource kind and serialize the
/// whole envelope; a failed publish surfaces as `DomainError::PublishFailed`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EnvelopeProducer: Send + Sync {
    async fn publish(&self, envelope: &ResourceEnvelope) -> DomainResult<()>;
}
