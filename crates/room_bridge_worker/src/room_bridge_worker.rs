use crate::domain::{
    BatchSplitter, EventTransformer, IdentityResolver, OutputPackager, PackagerConfig,
    RoomEventService, SplitMode,
};
use crate::nats::{ResourceEnvelopeProducer, RoomEventConsumerService};
use anyhow::Context;
use common::domain::{IdentityCache, InMemoryIdentityCache};
use common::nats::{
    NatsClient, NatsConsumeLoggingLayer, NatsConsumeLoggingService, NatsConsumeTracingLayer,
    NatsConsumeTracingService, NatsKvIdentityCache, NatsTracingConfig, TowerConsumer,
    TowerConsumerConfig,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::info;

/// Where identity mappings live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityCacheBackend {
    /// JetStream KV buckets shared by every bridge instance.
    Nats,
    /// Process-local maps, for single-instance runs and tests.
    Memory,
}

#[derive(Debug, Clone)]
pub struct IdentityCacheConfig {
    pub backend: IdentityCacheBackend,
    pub room_bucket: String,
    pub user_bucket: String,
    pub room_name_bucket: String,
    pub room_name_retention: Duration,
}

pub struct RoomBridgeWorkerConfig {
    pub room_events_stream: String,
    pub room_events_subject: String,
    pub consumer_name: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    pub nats_nak_delay_secs: u64,
    pub nats_max_deliver: i64,
    pub group_subject: String,
    pub communication_subject: String,
    pub split_mode: SplitMode,
    pub identity_cache: IdentityCacheConfig,
    pub packager: PackagerConfig,
}

/// The three identity caches the transformers consult.
pub struct IdentityCaches {
    pub rooms: Arc<dyn IdentityCache>,
    pub users: Arc<dyn IdentityCache>,
    pub room_names: Arc<dyn IdentityCache>,
}

impl IdentityCaches {
    pub async fn open(nats_client: &NatsClient, config: &IdentityCacheConfig) -> anyhow::Result<Self> {
        match config.backend {
            IdentityCacheBackend::Memory => Ok(Self {
                rooms: Arc::new(InMemoryIdentityCache::new()),
                users: Arc::new(InMemoryIdentityCache::new()),
                room_names: Arc::new(InMemoryIdentityCache::with_retention(
                    config.room_name_retention,
                )),
            }),
            IdentityCacheBackend::Nats => {
                let rooms = nats_client
                    .create_key_value_client(&config.room_bucket, None)
                    .await
                    .context("failed to open room identity bucket")?;
                let users = nats_client
                    .create_key_value_client(&config.user_bucket, None)
                    .await
                    .context("failed to open user identity bucket")?;
                let room_names = nats_client
                    .create_key_value_client(
                        &config.room_name_bucket,
                        Some(config.room_name_retention),
                    )
                    .await
                    .context("failed to open room name bucket")?;

                Ok(Self {
                    rooms: Arc::new(NatsKvIdentityCache::new(rooms)),
                    users: Arc::new(NatsKvIdentityCache::new(users)),
                    room_names: Arc::new(NatsKvIdentityCache::new(room_names)),
                })
            }
        }
    }

    pub fn into_resolver(self) -> IdentityResolver {
        IdentityResolver::new(self.rooms, self.users, self.room_names)
    }
}

pub type RunnerProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

/// Consumes room event batches and publishes the projected resource envelopes.
pub struct RoomBridgeWorker {
    consumer: TowerConsumer<RoomEventConsumerStack>,
}

type RoomEventConsumerStack =
    NatsConsumeTracingService<NatsConsumeLoggingService<RoomEventConsumerService>>;

impl RoomBridgeWorker {
    pub async fn new(nats_client: Arc<NatsClient>, config: RoomBridgeWorkerConfig) -> anyhow::Result<Self> {
        info!("initializing room bridge worker");

        let caches = IdentityCaches::open(&nats_client, &config.identity_cache).await?;
        info!(backend = ?config.identity_cache.backend, "identity caches ready");

        let producer = Arc::new(ResourceEnvelopeProducer::new(
            nats_client.create_publisher_client(),
            config.group_subject.clone(),
            config.communication_subject.clone(),
        ));

        let room_event_service = Arc::new(RoomEventService::new(
            BatchSplitter::new(config.split_mode),
            EventTransformer::new(caches.into_resolver()),
            OutputPackager::new(config.packager.clone()),
            producer,
        ));

        let service = build_consumer_stack(RoomEventConsumerService::new(room_event_service));

        let consumer = TowerConsumer::new(
            nats_client.create_consumer_client(),
            TowerConsumerConfig {
                stream_name: config.room_events_stream.clone(),
                consumer_name: config.consumer_name.clone(),
                filter_subject: config.room_events_subject.clone(),
                batch_size: config.nats_batch_size,
                max_wait: Duration::from_secs(config.nats_batch_wait_secs),
                nak_delay: Duration::from_secs(config.nats_nak_delay_secs),
                max_deliver: config.nats_max_deliver,
            },
            service,
        )
        .await?;

        info!("room bridge worker initialized");

        Ok(Self { consumer })
    }

    pub fn into_runner_processes(self) -> Vec<RunnerProcess> {
        let consumer = self.consumer;
        vec![Box::new(move |ctx| Box::pin(async move { consumer.run(ctx).await }))]
    }
}

fn build_consumer_stack(service: RoomEventConsumerService) -> RoomEventConsumerStack {
    ServiceBuilder::new()
        .layer(NatsConsumeTracingLayer::new(NatsTracingConfig::new("room_event_consumer")))
        .layer(NatsConsumeLoggingLayer::new())
        .service(service)
}
