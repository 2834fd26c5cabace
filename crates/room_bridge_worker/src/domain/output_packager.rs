use common::domain::{
    EventCode, Operation, ProvenanceHeader, Resource, ResourceEnvelope, ResourceType,
};
use chrono::Utc;

pub const BUNDLE_EVENT_SYSTEM: &str = "urn:room-bridge:message-events";
pub const BUNDLE_EVENT_VERSION: &str = "1.0.0";
pub const GROUP_BUNDLE_CODE: &str = "group-bundle";
pub const COMMUNICATION_BUNDLE_CODE: &str = "communication-bundle";

/// Provenance values stamped on every envelope.
#[derive(Debug, Clone)]
pub struct PackagerConfig {
    pub source_name: String,
    pub software: String,
    pub group_endpoint: String,
    pub communication_endpoint: String,
}

/// Wraps resources into envelopes ready for the egress sinks.
#[derive(Debug, Clone)]
pub struct OutputPackager {
    config: PackagerConfig,
}

impl OutputPackager {
    pub fn new(config: PackagerConfig) -> Self {
        Self { config }
    }

    pub fn package(
        &self,
        resource: Resource,
        target_type: ResourceType,
        operation: Operation,
    ) -> ResourceEnvelope {
        let (code, endpoint) = match &resource {
            Resource::Group(_) => (GROUP_BUNDLE_CODE, &self.config.group_endpoint),
            Resource::Communication(_) => (
                COMMUNICATION_BUNDLE_CODE,
                &self.config.communication_endpoint,
            ),
        };

        ResourceEnvelope {
            header: ProvenanceHeader {
                event: EventCode {
                    system: BUNDLE_EVENT_SYSTEM.to_string(),
                    version: BUNDLE_EVENT_VERSION.to_string(),
                    code: code.to_string(),
                },
                source_name: self.config.source_name.clone(),
                software: self.config.software.clone(),
                endpoint: endpoint.clone(),
            },
            operation,
            target_type,
            resource,
            timestamp: Utc::now(),
        }
    }
}
