//! Shared client instance and its registry.
//!
//! All producers configured for the same realm (`arn`) share one
//! [`ClientInstance`]: one transport, one topic-route cache, one endpoint
//! isolation set. The [`ClientRegistry`] owns that sharing. It is an
//! explicit handle the host process constructs and passes to producer
//! builders — there is no hidden process-wide singleton.
//!
//! ## Route cache
//!
//! `topic_route` is single-flight per topic: the first caller for an
//! uncached topic issues the RPC, every concurrent caller for the same
//! topic waits on that one fetch. Failures are never cached; the next call
//! retries. External refreshes overwrite an entry atomically via
//! `update_route`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flowmq_proto::v1 as pb;
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::isolation::IsolationRegistry;
use crate::route::{Endpoints, TopicRouteData};
use crate::transport::{GrpcTransport, Transport};

type RouteWaiter = oneshot::Sender<Result<Arc<TopicRouteData>>>;

/// Transport, route cache, and isolation state shared by every producer of
/// one realm.
pub struct ClientInstance {
    arn: String,
    transport: Arc<dyn Transport>,
    routes: RwLock<HashMap<String, Arc<TopicRouteData>>>,
    route_waiters: Mutex<HashMap<String, Vec<RouteWaiter>>>,
    isolation: IsolationRegistry,
}

impl ClientInstance {
    fn new(arn: String, transport: Arc<dyn Transport>) -> Self {
        Self {
            arn,
            transport,
            routes: RwLock::new(HashMap::new()),
            route_waiters: Mutex::new(HashMap::new()),
            isolation: IsolationRegistry::default(),
        }
    }

    pub fn arn(&self) -> &str {
        &self.arn
    }

    /// Marks a broker endpoint unhealthy for subsequent partition selection.
    pub async fn isolate(&self, endpoints: Endpoints) {
        self.isolation.isolate(endpoints).await;
    }

    /// Re-admits a broker endpoint.
    pub async fn unisolate(&self, endpoints: &Endpoints) {
        self.isolation.unisolate(endpoints).await;
    }

    /// Snapshot of the currently isolated endpoints.
    pub async fn isolated_endpoints(&self) -> std::collections::HashSet<Endpoints> {
        self.isolation.snapshot().await
    }

    /// Resolves the route for `topic`, coalescing concurrent lookups into
    /// one RPC against the route service at `access_point`.
    pub async fn topic_route(
        &self,
        topic: &str,
        access_point: &Endpoints,
        metadata: tonic::metadata::MetadataMap,
        timeout: Duration,
    ) -> Result<Arc<TopicRouteData>> {
        if let Some(route) = self.routes.read().await.get(topic) {
            return Ok(Arc::clone(route));
        }

        let waiter = {
            let mut waiters = self.route_waiters.lock().await;
            // The leader fills the cache before draining its waiter list, so
            // re-check under the waiter lock to avoid fetching a route that
            // just landed.
            if let Some(route) = self.routes.read().await.get(topic) {
                return Ok(Arc::clone(route));
            }
            match waiters.get_mut(topic) {
                Some(list) => {
                    let (tx, rx) = oneshot::channel();
                    list.push(tx);
                    Some(rx)
                }
                None => {
                    waiters.insert(topic.to_string(), Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return match rx.await {
                Ok(result) => result,
                Err(_) => Err(ClientError::RouteResolution {
                    topic: topic.to_string(),
                    reason: "route fetch was abandoned".to_string(),
                }),
            };
        }

        let result = self.fetch_route(topic, access_point, metadata, timeout).await;
        if let Ok(route) = &result {
            self.routes
                .write()
                .await
                .insert(topic.to_string(), Arc::clone(route));
        }

        let pending = self
            .route_waiters
            .lock()
            .await
            .remove(topic)
            .unwrap_or_default();
        for tx in pending {
            let shared = match &result {
                Ok(route) => Ok(Arc::clone(route)),
                Err(err) => Err(ClientError::RouteResolution {
                    topic: topic.to_string(),
                    reason: err.to_string(),
                }),
            };
            let _ = tx.send(shared);
        }

        result
    }

    async fn fetch_route(
        &self,
        topic: &str,
        access_point: &Endpoints,
        metadata: tonic::metadata::MetadataMap,
        timeout: Duration,
    ) -> Result<Arc<TopicRouteData>> {
        debug!(topic = %topic, arn = %self.arn, "fetching topic route");
        let request = pb::QueryRouteRequest {
            topic: Some(pb::Resource {
                arn: self.arn.clone(),
                name: topic.to_string(),
            }),
        };
        let response = self
            .transport
            .query_route(access_point, metadata, request, timeout)
            .await?;

        let status = response
            .common
            .as_ref()
            .map(pb::ResponseCommon::status)
            .unwrap_or_default();
        if status.code != pb::Code::Ok as i32 {
            return Err(ClientError::BrokerRejected {
                endpoints: access_point.to_string(),
                code: status.code,
                message: status.message,
            });
        }

        let route = TopicRouteData::from_proto(topic, response);
        debug!(
            topic = %topic,
            partitions = route.partitions().len(),
            "topic route resolved"
        );
        Ok(Arc::new(route))
    }

    /// Replaces the cached route for `topic`, e.g. from a periodic refresh
    /// or a server push.
    pub async fn update_route(&self, topic: &str, route: TopicRouteData) {
        self.routes
            .write()
            .await
            .insert(topic.to_string(), Arc::new(route));
    }

    /// Dispatches one send attempt. A transport-level failure isolates the
    /// endpoint so subsequent selections avoid it while it recovers.
    pub async fn send_message(
        &self,
        endpoints: &Endpoints,
        metadata: tonic::metadata::MetadataMap,
        request: pb::SendMessageRequest,
        timeout: Duration,
    ) -> Result<pb::SendMessageResponse> {
        match self
            .transport
            .send_message(endpoints, metadata, request, timeout)
            .await
        {
            Ok(response) => Ok(response),
            Err(err) => {
                warn!(endpoints = %endpoints, error = %err, "send transport failure, isolating endpoint");
                self.isolation.isolate(endpoints.clone()).await;
                Err(err)
            }
        }
    }

    pub async fn end_transaction(
        &self,
        endpoints: &Endpoints,
        metadata: tonic::metadata::MetadataMap,
        request: pb::EndTransactionRequest,
        timeout: Duration,
    ) -> Result<pb::EndTransactionResponse> {
        self.transport
            .end_transaction(endpoints, metadata, request, timeout)
            .await
    }
}

/// Keyed registry of [`ClientInstance`]s: one live instance per realm.
///
/// Lookup and create happen under a single lock, so two producers built
/// concurrently for the same `arn` always land on the same instance.
/// Removal is cooperative; callers must not remove an instance other
/// producers still use.
pub struct ClientRegistry {
    transport: Option<Arc<dyn Transport>>,
    instances: Mutex<HashMap<String, Arc<ClientInstance>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            transport: None,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Registry whose instances use the given transport instead of dialing
    /// gRPC channels. The seam tests and embedded setups plug into.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport: Some(transport),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the instance for the config's realm, creating it if absent.
    pub async fn client_instance(&self, config: &ClientConfig) -> Arc<ClientInstance> {
        let mut instances = self.instances.lock().await;
        if let Some(instance) = instances.get(&config.arn) {
            return Arc::clone(instance);
        }

        info!(arn = %config.arn, "creating client instance");
        let transport = self
            .transport
            .clone()
            .unwrap_or_else(|| Arc::new(GrpcTransport::new()));
        let instance = Arc::new(ClientInstance::new(config.arn.clone(), transport));
        instances.insert(config.arn.clone(), Arc::clone(&instance));
        instance
    }

    /// Drops the registry entry for a realm. Existing holders keep their
    /// `Arc`; the next lookup creates a fresh instance.
    pub async fn remove_client_instance(&self, arn: &str) {
        if self.instances.lock().await.remove(arn).is_some() {
            info!(arn = %arn, "removed client instance");
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
