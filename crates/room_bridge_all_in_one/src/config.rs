use anyhow::bail;
use config::{Config, ConfigError, Environment};
use room_bridge_worker::domain::{PackagerConfig, SplitMode};
use room_bridge_worker::{IdentityCacheBackend, IdentityCacheConfig, RoomBridgeWorkerConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Startup timeout for connecting and provisioning, in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// JetStream stream holding inbound room event batches
    #[serde(default = "default_room_events_stream")]
    pub room_events_stream: String,

    /// Consumer filter subject on the room events stream
    #[serde(default = "default_room_events_subject")]
    pub room_events_subject: String,

    /// Durable consumer name
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    /// Batch size for consumer
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Seconds before a rejected message is redelivered
    #[serde(default = "default_nats_nak_delay_secs")]
    pub nats_nak_delay_secs: u64,

    /// Deliveries after which a message is no longer redelivered
    #[serde(default = "default_nats_max_deliver")]
    pub nats_max_deliver: i64,

    /// JetStream stream capturing outbound envelopes
    #[serde(default = "default_bundles_stream")]
    pub bundles_stream: String,

    /// Subject prefix for group envelopes
    #[serde(default = "default_group_subject")]
    pub group_subject: String,

    /// Subject prefix for communication envelopes
    #[serde(default = "default_communication_subject")]
    pub communication_subject: String,

    // Identity cache configuration
    /// "nats" for shared KV buckets, "memory" for a single process
    #[serde(default = "default_identity_cache_backend")]
    pub identity_cache_backend: String,

    #[serde(default = "default_room_identity_bucket")]
    pub room_identity_bucket: String,

    #[serde(default = "default_user_identity_bucket")]
    pub user_identity_bucket: String,

    #[serde(default = "default_room_name_bucket")]
    pub room_name_bucket: String,

    /// How long a room name mapping is kept, in days
    #[serde(default = "default_room_name_retention_days")]
    pub room_name_retention_days: u64,

    /// Drop exact duplicate events within a batch
    #[serde(default = "default_strict_unique_split")]
    pub strict_unique_split: bool,

    // Envelope provenance
    #[serde(default = "default_source_name")]
    pub source_name: String,

    #[serde(default = "default_software_name")]
    pub software_name: String,

    #[serde(default = "default_group_endpoint")]
    pub group_endpoint: String,

    #[serde(default = "default_communication_endpoint")]
    pub communication_endpoint: String,

    // OpenTelemetry configuration
    /// OpenTelemetry OTLP endpoint (gRPC)
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Enable OpenTelemetry export
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    /// Service name for OpenTelemetry resource
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_room_events_stream() -> String {
    "room_events".to_string()
}

fn default_room_events_subject() -> String {
    "room_events.>".to_string()
}

fn default_consumer_name() -> String {
    "room-bridge-consumer".to_string()
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_nats_nak_delay_secs() -> u64 {
    5
}

fn default_nats_max_deliver() -> i64 {
    10
}

fn default_bundles_stream() -> String {
    "bundles".to_string()
}

fn default_group_subject() -> String {
    "bundles.group".to_string()
}

fn default_communication_subject() -> String {
    "bundles.communication".to_string()
}

// Identity cache defaults
fn default_identity_cache_backend() -> String {
    "nats".to_string()
}

fn default_room_identity_bucket() -> String {
    "room_identities".to_string()
}

fn default_user_identity_bucket() -> String {
    "user_identities".to_string()
}

fn default_room_name_bucket() -> String {
    "room_names".to_string()
}

fn default_room_name_retention_days() -> u64 {
    30
}

fn default_strict_unique_split() -> bool {
    false
}

// Provenance defaults
fn default_source_name() -> String {
    "matrix".to_string()
}

fn default_software_name() -> String {
    "room-bridge".to_string()
}

fn default_group_endpoint() -> String {
    "http://localhost/fhir/Group".to_string()
}

fn default_communication_endpoint() -> String {
    "http://localhost/fhir/Communication".to_string()
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_enabled() -> bool {
    true
}

fn default_otel_service_name() -> String {
    "room-bridge-all-in-one".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("ROOM_BRIDGE"))
            .build()?
            .try_deserialize()
    }

    pub fn identity_cache_backend(&self) -> anyhow::Result<IdentityCacheBackend> {
        match self.identity_cache_backend.to_ascii_lowercase().as_str() {
            "nats" => Ok(IdentityCacheBackend::Nats),
            "memory" => Ok(IdentityCacheBackend::Memory),
            other => bail!("unknown identity cache backend '{}', expected nats or memory", other),
        }
    }

    pub fn split_mode(&self) -> SplitMode {
        if self.strict_unique_split {
            SplitMode::Unique
        } else {
            SplitMode::Ordered
        }
    }

    pub fn room_name_retention(&self) -> anyhow::Result<Duration> {
        match self.room_name_retention_days.checked_mul(SECONDS_PER_DAY) {
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => bail!(
                "room name retention of {} days is out of range",
                self.room_name_retention_days
            ),
        }
    }

    pub fn worker_config(&self) -> anyhow::Result<RoomBridgeWorkerConfig> {
        Ok(RoomBridgeWorkerConfig {
            room_events_stream: self.room_events_stream.clone(),
            room_events_subject: self.room_events_subject.clone(),
            consumer_name: self.consumer_name.clone(),
            nats_batch_size: self.nats_batch_size,
            nats_batch_wait_secs: self.nats_batch_wait_secs,
            nats_nak_delay_secs: self.nats_nak_delay_secs,
            nats_max_deliver: self.nats_max_deliver,
            group_subject: self.group_subject.clone(),
            communication_subject: self.communication_subject.clone(),
            split_mode: self.split_mode(),
            identity_cache: IdentityCacheConfig {
                backend: self.identity_cache_backend()?,
                room_bucket: self.room_identity_bucket.clone(),
                user_bucket: self.user_identity_bucket.clone(),
                room_name_bucket: self.room_name_bucket.clone(),
                room_name_retention: self.room_name_retention()?,
            },
            packager: PackagerConfig {
                source_name: self.source_name.clone(),
                software: self.software_name.clone(),
                group_endpoint: self.group_endpoint.clone(),
                communication_endpoint: self.communication_endpoint.clone(),
            },
        })
    }
}
