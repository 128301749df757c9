//! Producer API for publishing messages to FlowMQ topics.
//!
//! The producer owns the send pipeline: resolve the topic's publish info,
//! pick candidate partitions, sign and dispatch the request, classify the
//! response, and rotate to the next candidate on failure — all without
//! blocking the caller. `send` bounds that pipeline with a deadline;
//! `send_with_callback` runs it in the background and delivers the outcome
//! on a dedicated callback executor; `send_oneway` fires a single attempt
//! and forgets it.
//!
//! ## Retry shape
//!
//! The candidate partitions for one message are fixed up front; attempt `i`
//! targets `candidates[i % candidates.len()]`. Attempts are strictly
//! serial, there is no sleep between them, and the request is rebuilt only
//! to swap the partition id — the message id never changes across retries.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use flowmq_client::{ClientRegistry, Message, Producer};
//!
//! let registry = Arc::new(ClientRegistry::new());
//! let producer = Producer::builder()
//!     .registry(registry)
//!     .arn("arn:flowmq:prod")
//!     .group("group-orders")
//!     .access_point("route.flowmq.internal:8081".parse()?)
//!     .build()
//!     .await?;
//! producer.start()?;
//!
//! let message = Message::builder()
//!     .topic("orders")
//!     .body(b"order data".as_slice())
//!     .build()?;
//! let result = producer.send(message).await?;
//! println!("sent as {}", result.message_id);
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use flowmq_proto::v1 as pb;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::callback::{CallbackExecutor, DEFAULT_CALLBACK_QUEUE_CAPACITY};
use crate::config::{
    ClientConfig, CredentialsProvider, DEFAULT_IO_TIMEOUT, DEFAULT_MAX_ATTEMPT_TIMES,
    DEFAULT_SEND_MESSAGE_TIMEOUT,
};
use crate::error::{ClientError, Result};
use crate::instance::{ClientInstance, ClientRegistry};
use crate::message::{local_ipv4_address, unique_message_id, Message};
use crate::publish_info::TopicPublishInfo;
use crate::route::{Endpoints, Partition, TopicRouteData};
use crate::signature::sign;

/// Bodies above this size are GZIP-compressed before they leave the client.
pub const MESSAGE_COMPRESSION_THRESHOLD: usize = 1024 * 1024 * 4;

/// Compression level used when the process-wide knob is unset.
pub const DEFAULT_MESSAGE_COMPRESSION_LEVEL: u32 = 5;

/// Environment knob overriding the GZIP level for the whole process.
pub const MESSAGE_COMPRESSION_LEVEL_ENV: &str = "FLOWMQ_MESSAGE_COMPRESSION_LEVEL";

fn message_compression_level() -> u32 {
    static LEVEL: OnceLock<u32> = OnceLock::new();
    *LEVEL.get_or_init(|| {
        std::env::var(MESSAGE_COMPRESSION_LEVEL_ENV)
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .map(|level| level.min(9))
            .unwrap_or(DEFAULT_MESSAGE_COMPRESSION_LEVEL)
    })
}

/// Producer lifecycle state.
///
/// `start` drives `Created → Ready → Started`; `shutdown` drives
/// `Started → Stopping → Ready`, and a stopped producer stays in `Ready`.
/// Send methods require `Started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    Created = 0,
    Ready = 1,
    Started = 2,
    Stopping = 3,
}

struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(ServiceState::Created as u8))
    }

    fn load(&self) -> ServiceState {
        match self.0.load(Ordering::SeqCst) {
            0 => ServiceState::Created,
            1 => ServiceState::Ready,
            2 => ServiceState::Started,
            _ => ServiceState::Stopping,
        }
    }

    fn compare_and_set(&self, from: ServiceState, to: ServiceState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResult {
    /// Client-generated message id, echoed or replaced by the broker.
    pub message_id: String,

    /// Partition the accepted attempt targeted.
    pub partition_id: i32,

    /// Offset the broker assigned within the partition, when reported.
    pub queue_offset: Option<i64>,

    /// Transaction id for prepared transactional messages.
    pub transaction_id: Option<String>,
}

/// How to terminate a prepared transactional message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionResolution {
    Commit,
    Rollback,
}

impl TransactionResolution {
    fn to_proto(self) -> pb::TransactionResolution {
        match self {
            TransactionResolution::Commit => pb::TransactionResolution::Commit,
            TransactionResolution::Rollback => pb::TransactionResolution::Rollback,
        }
    }
}

/// Caller-supplied partition choice for selector-directed sends.
///
/// Reserved surface: `Producer::send_with_selector` currently fails with
/// [`ClientError::Unsupported`].
pub trait QueueSelector: Send + Sync {
    /// Chooses the target partition from the topic's writable partitions.
    fn select<'a>(&self, partitions: &'a [Partition], message: &Message) -> Option<&'a Partition>;
}

/// Handle to a producer. Cheap to clone; all clones share one pipeline.
#[derive(Clone)]
pub struct Producer {
    inner: Arc<ProducerInner>,
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer").finish_non_exhaustive()
    }
}

struct ProducerInner {
    config: ClientConfig,
    instance: Arc<ClientInstance>,
    publish_info: RwLock<HashMap<String, Arc<TopicPublishInfo>>>,
    state: StateCell,
    callbacks: CallbackExecutor,
}

impl Producer {
    pub fn builder() -> ProducerBuilder {
        ProducerBuilder::new()
    }

    pub fn arn(&self) -> &str {
        &self.inner.config.arn
    }

    pub fn group(&self) -> &str {
        &self.inner.config.group
    }

    pub fn state(&self) -> ServiceState {
        self.inner.state.load()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.load() == ServiceState::Started
    }

    /// Starts the producer. Calling `start` on a producer that was already
    /// started (or already shut down) is a logged no-op.
    pub fn start(&self) -> Result<()> {
        info!(group = %self.inner.config.group, "starting producer");
        if !self
            .inner
            .state
            .compare_and_set(ServiceState::Created, ServiceState::Ready)
        {
            warn!("producer has been started before");
            return Ok(());
        }
        self.inner
            .state
            .compare_and_set(ServiceState::Ready, ServiceState::Started);
        info!(group = %self.inner.config.group, "producer started");
        Ok(())
    }

    /// Stops accepting sends, then drains the callback executor. In-flight
    /// sends complete in the background. Repeat calls are logged no-ops.
    pub async fn shutdown(&self) {
        info!(group = %self.inner.config.group, "shutting down producer");
        if !self
            .inner
            .state
            .compare_and_set(ServiceState::Started, ServiceState::Stopping)
        {
            warn!("producer has not been started before");
            return;
        }
        self.inner.callbacks.shutdown().await;
        self.inner
            .state
            .compare_and_set(ServiceState::Stopping, ServiceState::Ready);
        info!(group = %self.inner.config.group, "producer shut down");
    }

    /// Sends a message, waiting up to the configured send timeout.
    pub async fn send(&self, message: Message) -> Result<SendResult> {
        self.send_with_timeout(message, self.inner.config.send_message_timeout)
            .await
    }

    /// Sends a message, waiting up to `timeout`. On timeout the in-flight
    /// RPC is not cancelled; a late broker response is discarded.
    pub async fn send_with_timeout(
        &self,
        message: Message,
        timeout: Duration,
    ) -> Result<SendResult> {
        self.inner.ensure_running()?;
        let attempts = self.inner.config.max_attempt_times;
        match tokio::time::timeout(timeout, self.inner.send0(message, attempts)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(timeout)),
        }
    }

    /// Sends a message in the background and delivers the outcome to
    /// `callback` on the dedicated callback executor, so user code never
    /// runs on the tasks completing RPCs. A panicking callback is caught
    /// and logged.
    pub fn send_with_callback<F>(&self, message: Message, callback: F) -> Result<()>
    where
        F: FnOnce(Result<SendResult>) + Send + 'static,
    {
        self.inner.ensure_running()?;
        let inner = Arc::clone(&self.inner);
        let timeout = inner.config.send_message_timeout;
        tokio::spawn(async move {
            let attempts = inner.config.max_attempt_times;
            let result = match tokio::time::timeout(timeout, inner.send0(message, attempts)).await
            {
                Ok(result) => result,
                Err(_) => Err(ClientError::Timeout(timeout)),
            };
            inner
                .callbacks
                .submit(Box::new(move || callback(result)))
                .await;
        });
        Ok(())
    }

    /// Fires a single attempt and discards the outcome.
    pub fn send_oneway(&self, message: Message) -> Result<()> {
        self.inner.ensure_running()?;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(err) = inner.send0(message, 1).await {
                debug!(error = %err, "one-way send failed");
            }
        });
        Ok(())
    }

    /// Transactional send is not implemented; the broker-side check-back
    /// protocol is undefined for this client.
    pub fn send_transaction(&self, _message: &Message) -> Result<SendResult> {
        Err(ClientError::Unsupported("transactional send"))
    }

    /// Selector-directed send is not implemented.
    pub fn send_with_selector(
        &self,
        _message: &Message,
        _selector: &dyn QueueSelector,
    ) -> Result<SendResult> {
        Err(ClientError::Unsupported("selector-directed send"))
    }

    /// Terminates a prepared transactional message by committing or rolling
    /// it back on the broker that holds it.
    pub async fn end_transaction(
        &self,
        target: &Endpoints,
        message_id: &str,
        transaction_id: &str,
        trace_context: &str,
        resolution: TransactionResolution,
    ) -> Result<()> {
        self.inner.ensure_running()?;
        let request = pb::EndTransactionRequest {
            message_id: message_id.to_string(),
            transaction_id: transaction_id.to_string(),
            trace_context: trace_context.to_string(),
            resolution: resolution.to_proto() as i32,
        };
        let metadata = sign(&self.inner.config, Utc::now())?;
        let response = self
            .inner
            .instance
            .end_transaction(target, metadata, request, self.inner.config.io_timeout)
            .await?;

        let status = response
            .common
            .as_ref()
            .map(pb::ResponseCommon::status)
            .unwrap_or_default();
        if status.code != pb::Code::Ok as i32 {
            error!(
                message_id = %message_id,
                transaction_id = %transaction_id,
                code = status.code,
                message = %status.message,
                "failed to end transaction"
            );
            return Err(ClientError::BrokerRejected {
                endpoints: target.to_string(),
                code: status.code,
                message: status.message,
            });
        }
        debug!(message_id = %message_id, transaction_id = %transaction_id, "transaction ended");
        Ok(())
    }

    /// Installs a refreshed route for `topic`, replacing the producer's
    /// publish info and the shared route cache entry. Hook for periodic
    /// refresh or server push.
    pub async fn apply_route_update(&self, topic: &str, route: TopicRouteData) {
        let info = Arc::new(TopicPublishInfo::new(topic, &route));
        self.inner
            .publish_info
            .write()
            .await
            .insert(topic.to_string(), info);
        self.inner.instance.update_route(topic, route).await;
    }
}

impl ProducerInner {
    fn ensure_running(&self) -> Result<()> {
        if self.state.load() != ServiceState::Started {
            return Err(ClientError::NotStarted);
        }
        Ok(())
    }

    /// Publish info for `topic`, filled through the shared route cache on
    /// a miss. Concurrent misses may both store an entry; the partition set
    /// is identical because the route fetch is single-flight.
    async fn publish_info(&self, topic: &str) -> Result<Arc<TopicPublishInfo>> {
        if let Some(info) = self.publish_info.read().await.get(topic) {
            return Ok(Arc::clone(info));
        }

        let metadata = sign(&self.config, Utc::now())?;
        let route = self
            .instance
            .topic_route(topic, &self.config.access_point, metadata, self.config.io_timeout)
            .await
            .map_err(|err| match err {
                err @ ClientError::RouteResolution { .. } => err,
                other => ClientError::RouteResolution {
                    topic: topic.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let info = Arc::new(TopicPublishInfo::new(topic, &route));
        self.publish_info
            .write()
            .await
            .insert(topic.to_string(), Arc::clone(&info));
        Ok(info)
    }

    /// Drives one message through up to `max_attempts` attempts across a
    /// fixed candidate list.
    async fn send0(&self, message: Message, max_attempts: usize) -> Result<SendResult> {
        let publish_info = self.publish_info(message.topic()).await?;
        let isolated = self.instance.isolated_endpoints().await;
        let candidates = publish_info.take_partitions(&isolated, max_attempts)?;

        let mut request = self.wrap_send_message_request(&message, &candidates[0]);
        let mut attempt = 0usize;
        loop {
            let partition = &candidates[attempt % candidates.len()];
            // A signing failure is not retriable; it ends the send as-is.
            let metadata = sign(&self.config, Utc::now())?;
            let span = self.start_send_span(&mut request);

            let outcome = async {
                let response = self
                    .instance
                    .send_message(
                        partition.endpoints(),
                        metadata,
                        request.clone(),
                        self.config.io_timeout,
                    )
                    .await?;
                interpret_send_response(partition, response)
            }
            .instrument(span)
            .await;

            match outcome {
                Ok(result) => {
                    debug!(
                        topic = %message.topic(),
                        message_id = %result.message_id,
                        partition_id = result.partition_id,
                        attempt = attempt + 1,
                        "message sent"
                    );
                    return Ok(result);
                }
                Err(err) => {
                    if attempt + 1 >= max_attempts {
                        error!(
                            topic = %message.topic(),
                            attempts = attempt + 1,
                            error = %err,
                            "send attempts exhausted"
                        );
                        return Err(err);
                    }
                    warn!(
                        topic = %message.topic(),
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        "send attempt failed, rotating to next partition"
                    );
                    attempt += 1;
                    let next = &candidates[attempt % candidates.len()];
                    set_partition_id(&mut request, next.id());
                }
            }
        }
    }

    /// Builds the wire request for a message once per send. Retries only
    /// rewrite the partition id afterwards.
    fn wrap_send_message_request(
        &self,
        message: &Message,
        partition: &Partition,
    ) -> pb::SendMessageRequest {
        let mut body = message.body().clone();
        let mut encoding = pb::Encoding::Identity;
        if body.len() > MESSAGE_COMPRESSION_THRESHOLD {
            match compress_gzip(&body, message_compression_level()) {
                Ok(compressed) => {
                    body = Bytes::from(compressed);
                    encoding = pb::Encoding::Gzip;
                }
                Err(err) => {
                    // Non-fatal: send the original bytes unencoded.
                    warn!(
                        topic = %message.topic(),
                        error = %err,
                        "failed to compress message body, falling back to identity encoding"
                    );
                }
            }
        }

        let message_type = if message.is_transaction_prepared() {
            pb::MessageType::Transaction
        } else if message.delay_level() > 0 || message.delivery_timestamp() > 0 {
            pb::MessageType::Delay
        } else {
            pb::MessageType::Normal
        };

        let mut system_attribute = pb::SystemAttribute {
            tag: message.tag().unwrap_or_default().to_string(),
            keys: message.keys().to_vec(),
            message_id: unique_message_id(),
            body_encoding: encoding as i32,
            message_type: message_type as i32,
            born_timestamp: Some(timestamp_from_millis(Utc::now().timestamp_millis())),
            born_host: local_ipv4_address().to_string(),
            producer_group: Some(pb::Resource {
                arn: self.config.arn.clone(),
                name: self.config.group.clone(),
            }),
            delay_level: 0,
            delivery_timestamp: None,
            partition_id: partition.id(),
            trace_context: String::new(),
        };
        if message.delay_level() > 0 {
            system_attribute.delay_level = message.delay_level();
        } else if message.delivery_timestamp() > 0 {
            system_attribute.delivery_timestamp =
                Some(timestamp_from_millis(message.delivery_timestamp()));
        }

        pb::SendMessageRequest {
            message: Some(pb::Message {
                topic: Some(pb::Resource {
                    arn: self.config.arn.clone(),
                    name: message.topic().to_string(),
                }),
                user_attribute: message.user_properties().clone(),
                system_attribute: Some(system_attribute),
                body,
            }),
        }
    }

    /// Opens the per-attempt send span and injects a fresh trace context
    /// into the outgoing system attributes. Disabled tracing yields a
    /// disabled span and leaves the request untouched.
    fn start_send_span(&self, request: &mut pb::SendMessageRequest) -> Span {
        if !self.config.message_tracing_enabled {
            return Span::none();
        }
        let Some(message) = request.message.as_mut() else {
            return Span::none();
        };
        let topic = message
            .topic
            .as_ref()
            .map(|t| t.name.clone())
            .unwrap_or_default();
        let Some(system) = message.system_attribute.as_mut() else {
            return Span::none();
        };
        system.trace_context = new_traceparent();

        tracing::info_span!(
            "send_message",
            topic = %topic,
            message_id = %system.message_id,
            group = %self.config.group,
            tag = %system.tag,
            keys = ?system.keys,
            born_host = %system.born_host,
            message_type = ?system.message_type(),
            trace_context = %system.trace_context,
        )
    }
}

fn interpret_send_response(
    partition: &Partition,
    response: pb::SendMessageResponse,
) -> Result<SendResult> {
    let status = response
        .common
        .as_ref()
        .map(pb::ResponseCommon::status)
        .unwrap_or_default();
    if status.code != pb::Code::Ok as i32 {
        return Err(ClientError::BrokerRejected {
            endpoints: partition.endpoints().to_string(),
            code: status.code,
            message: status.message,
        });
    }

    let transaction_id = if response.transaction_id.is_empty() {
        None
    } else {
        Some(response.transaction_id)
    };
    Ok(SendResult {
        message_id: response.message_id,
        partition_id: partition.id(),
        queue_offset: response.queue_offset,
        transaction_id,
    })
}

fn set_partition_id(request: &mut pb::SendMessageRequest, partition_id: i32) {
    if let Some(system) = request
        .message
        .as_mut()
        .and_then(|message| message.system_attribute.as_mut())
    {
        system.partition_id = partition_id;
    }
}

fn compress_gzip(body: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(body.len() / 8),
        Compression::new(level),
    );
    encoder.write_all(body)?;
    encoder.finish()
}

fn timestamp_from_millis(millis: i64) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: millis.div_euclid(1000),
        nanos: (millis.rem_euclid(1000) * 1_000_000) as i32,
    }
}

/// W3C `traceparent` with random trace and span ids, sampled flag set.
fn new_traceparent() -> String {
    let trace_id: u128 = rand::random::<u128>() | 1;
    let span_id: u64 = rand::random::<u64>() | 1;
    format!("00-{trace_id:032x}-{span_id:016x}-01")
}

/// Builder for [`Producer`].
pub struct ProducerBuilder {
    registry: Option<Arc<ClientRegistry>>,
    arn: String,
    group: String,
    access_point: Option<Endpoints>,
    namespace: String,
    region_id: String,
    service_name: String,
    tenant_id: String,
    credentials_provider: Option<Arc<dyn CredentialsProvider>>,
    io_timeout: Duration,
    send_message_timeout: Duration,
    max_attempt_times: usize,
    message_tracing_enabled: bool,
    callback_queue_capacity: usize,
}

impl ProducerBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            arn: String::new(),
            group: String::new(),
            access_point: None,
            namespace: String::new(),
            region_id: "default".to_string(),
            service_name: "flowmq".to_string(),
            tenant_id: String::new(),
            credentials_provider: None,
            io_timeout: DEFAULT_IO_TIMEOUT,
            send_message_timeout: DEFAULT_SEND_MESSAGE_TIMEOUT,
            max_attempt_times: DEFAULT_MAX_ATTEMPT_TIMES,
            message_tracing_enabled: false,
            callback_queue_capacity: DEFAULT_CALLBACK_QUEUE_CAPACITY,
        }
    }

    /// Registry the producer resolves its shared client instance from
    /// (required).
    pub fn registry(mut self, registry: Arc<ClientRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Tenant realm identifier. Producers with equal `arn` share one client
    /// instance.
    pub fn arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = arn.into();
        self
    }

    /// Producer group name (required).
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Route-service access point (required).
    pub fn access_point(mut self, access_point: Endpoints) -> Self {
        self.access_point = Some(access_point);
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn region_id(mut self, region_id: impl Into<String>) -> Self {
        self.region_id = region_id.into();
        self
    }

    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    pub fn credentials_provider(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials_provider = Some(provider);
        self
    }

    /// Deadline for one RPC attempt.
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Default caller-facing deadline for `send`, retries included.
    pub fn send_message_timeout(mut self, timeout: Duration) -> Self {
        self.send_message_timeout = timeout;
        self
    }

    /// Attempt budget per message.
    pub fn max_attempt_times(mut self, attempts: usize) -> Self {
        self.max_attempt_times = attempts;
        self
    }

    /// Enables send spans and trace-context injection.
    pub fn message_tracing_enabled(mut self, enabled: bool) -> Self {
        self.message_tracing_enabled = enabled;
        self
    }

    /// Capacity of the callback queue; submission waits when it is full.
    pub fn callback_queue_capacity(mut self, capacity: usize) -> Self {
        self.callback_queue_capacity = capacity;
        self
    }

    /// Resolves the shared client instance and assembles the producer in
    /// the `Created` state.
    pub async fn build(self) -> Result<Producer> {
        let registry = self
            .registry
            .ok_or_else(|| ClientError::Config("a client registry is required".to_string()))?;
        if self.group.is_empty() {
            return Err(ClientError::Config("a producer group is required".to_string()));
        }
        let access_point = self
            .access_point
            .ok_or_else(|| ClientError::Config("an access point is required".to_string()))?;
        if self.max_attempt_times == 0 {
            return Err(ClientError::Config(
                "max attempt times must be at least 1".to_string(),
            ));
        }

        let config = ClientConfig {
            arn: self.arn,
            group: self.group,
            access_point,
            namespace: self.namespace,
            region_id: self.region_id,
            service_name: self.service_name,
            tenant_id: self.tenant_id,
            credentials_provider: self.credentials_provider,
            io_timeout: self.io_timeout,
            send_message_timeout: self.send_message_timeout,
            max_attempt_times: self.max_attempt_times,
            message_tracing_enabled: self.message_tracing_enabled,
        };
        let instance = registry.client_instance(&config).await;

        Ok(Producer {
            inner: Arc::new(ProducerInner {
                config,
                instance,
                publish_info: RwLock::new(HashMap::new()),
                state: StateCell::new(),
                callbacks: CallbackExecutor::with_default_workers(self.callback_queue_capacity),
            }),
        })
    }
}

impl Default for ProducerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::route::{Address, Permission};

    fn partition() -> Partition {
        Partition::new(
            "orders",
            4,
            Permission::Write,
            "broker-a",
            Endpoints::new(vec![Address::new("broker-a", 8081)]).unwrap(),
        )
    }

    #[test]
    fn state_cell_follows_lifecycle() {
        let state = StateCell::new();
        assert_eq!(state.load(), ServiceState::Created);
        assert!(state.compare_and_set(ServiceState::Created, ServiceState::Ready));
        assert!(state.compare_and_set(ServiceState::Ready, ServiceState::Started));
        assert!(!state.compare_and_set(ServiceState::Created, ServiceState::Ready));
        assert!(state.compare_and_set(ServiceState::Started, ServiceState::Stopping));
        assert!(state.compare_and_set(ServiceState::Stopping, ServiceState::Ready));
        assert_eq!(state.load(), ServiceState::Ready);
    }

    #[test]
    fn interpret_ok_response() {
        let response = pb::SendMessageResponse {
            common: Some(pb::ResponseCommon {
                status: Some(pb::Status {
                    code: pb::Code::Ok as i32,
                    message: String::new(),
                }),
            }),
            message_id: "ABCD".to_string(),
            transaction_id: String::new(),
            queue_offset: Some(42),
        };
        let result = interpret_send_response(&partition(), response).unwrap();
        assert_eq!(result.message_id, "ABCD");
        assert_eq!(result.partition_id, 4);
        assert_eq!(result.queue_offset, Some(42));
        assert_eq!(result.transaction_id, None);
    }

    #[test]
    fn interpret_rejection() {
        let response = pb::SendMessageResponse {
            common: Some(pb::ResponseCommon {
                status: Some(pb::Status {
                    code: pb::Code::Internal as i32,
                    message: "partition unavailable".to_string(),
                }),
            }),
            message_id: String::new(),
            transaction_id: String::new(),
            queue_offset: None,
        };
        let err = interpret_send_response(&partition(), response).unwrap_err();
        assert!(matches!(
            err,
            ClientError::BrokerRejected { code, .. } if code == pb::Code::Internal as i32
        ));
    }

    #[test]
    fn absent_status_is_success() {
        let response = pb::SendMessageResponse {
            common: None,
            message_id: "A".to_string(),
            transaction_id: "tx-1".to_string(),
            queue_offset: None,
        };
        let result = interpret_send_response(&partition(), response).unwrap();
        assert_eq!(result.transaction_id.as_deref(), Some("tx-1"));
    }

    #[test]
    fn partition_id_rewrite() {
        let mut request = pb::SendMessageRequest {
            message: Some(pb::Message {
                topic: None,
                user_attribute: Default::default(),
                system_attribute: Some(pb::SystemAttribute {
                    partition_id: 1,
                    ..Default::default()
                }),
                body: Bytes::new(),
            }),
        };
        set_partition_id(&mut request, 7);
        assert_eq!(
            request
                .message
                .unwrap()
                .system_attribute
                .unwrap()
                .partition_id,
            7
        );
    }

    #[test]
    fn gzip_round_trip() {
        let body = vec![0u8; 64 * 1024];
        let compressed = compress_gzip(&body, DEFAULT_MESSAGE_COMPRESSION_LEVEL).unwrap();
        assert!(compressed.len() < body.len() / 100);

        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut restored = Vec::new();
        decoder.read_to_end(&mut restored).unwrap();
        assert_eq!(restored, body);
    }

    #[test]
    fn send_result_serializes_for_logging() {
        let result = SendResult {
            message_id: "ABCD".to_string(),
            partition_id: 2,
            queue_offset: Some(11),
            transaction_id: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        let restored: SendResult = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, result);
    }

    #[test]
    fn traceparent_shape() {
        let traceparent = new_traceparent();
        let parts: Vec<&str> = traceparent.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "00");
        assert_eq!(parts[1].len(), 32);
        assert_eq!(parts[2].len(), 16);
        assert_eq!(parts[3], "01");
    }

    #[test]
    fn timestamp_conversion() {
        let ts = timestamp_from_millis(1_700_000_123_456);
        assert_eq!(ts.seconds, 1_700_000_123);
        assert_eq!(ts.nanos, 456_000_000);
    }

    #[tokio::test]
    async fn builder_validates_required_fields() {
        let err = Producer::builder().build().await.unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));

        let registry = Arc::new(ClientRegistry::new());
        let err = Producer::builder()
            .registry(registry)
            .access_point("route:8081".parse().unwrap())
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
