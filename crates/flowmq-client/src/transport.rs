//! RPC transport seam.
//!
//! The send pipeline talks to brokers through the [`Transport`] trait; the
//! production implementation dials tonic channels and keeps one channel per
//! endpoint, dropping a channel when a call on it fails so the next attempt
//! redials. Tests substitute their own `Transport` to script broker
//! behavior without a network.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use flowmq_proto::v1::messaging_service_client::MessagingServiceClient;
use flowmq_proto::v1::{
    EndTransactionRequest, EndTransactionResponse, QueryRouteRequest, QueryRouteResponse,
    SendMessageRequest, SendMessageResponse,
};
use tokio::sync::RwLock;
use tonic::metadata::MetadataMap;
use tonic::transport::{Channel, Endpoint as TonicEndpoint};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::route::Endpoints;

/// Unary RPC surface the producer pipeline depends on.
///
/// Implementations return [`ClientError::Transport`] for anything that kept
/// a broker response from arriving; broker-level rejection travels inside
/// the response and is classified by the caller.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn query_route(
        &self,
        endpoints: &Endpoints,
        metadata: MetadataMap,
        request: QueryRouteRequest,
        timeout: Duration,
    ) -> Result<QueryRouteResponse>;

    async fn send_message(
        &self,
        endpoints: &Endpoints,
        metadata: MetadataMap,
        request: SendMessageRequest,
        timeout: Duration,
    ) -> Result<SendMessageResponse>;

    async fn end_transaction(
        &self,
        endpoints: &Endpoints,
        metadata: MetadataMap,
        request: EndTransactionRequest,
        timeout: Duration,
    ) -> Result<EndTransactionResponse>;
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// tonic-backed [`Transport`] with per-endpoint channel reuse.
pub struct GrpcTransport {
    channels: RwLock<HashMap<Endpoints, Channel>>,
}

impl GrpcTransport {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    async fn channel(&self, endpoints: &Endpoints) -> Result<Channel> {
        if let Some(channel) = self.channels.read().await.get(endpoints) {
            return Ok(channel.clone());
        }

        debug!(endpoints = %endpoints, "dialing broker");
        let endpoint = TonicEndpoint::from_shared(endpoints.grpc_uri())
            .map_err(|err| transport_error(endpoints, err))?
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(Some(TCP_KEEPALIVE));
        let channel = endpoint
            .connect()
            .await
            .map_err(|err| transport_error(endpoints, err))?;

        self.channels
            .write()
            .await
            .insert(endpoints.clone(), channel.clone());
        Ok(channel)
    }

    /// Forget the cached channel after a failed call; the next attempt
    /// against this endpoint redials.
    async fn evict(&self, endpoints: &Endpoints) {
        self.channels.write().await.remove(endpoints);
    }
}

impl Default for GrpcTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn transport_error(endpoints: &Endpoints, err: impl std::fmt::Display) -> ClientError {
    ClientError::Transport {
        endpoints: endpoints.to_string(),
        reason: err.to_string(),
    }
}

fn rpc_timeout_error(endpoints: &Endpoints, timeout: Duration) -> ClientError {
    ClientError::Transport {
        endpoints: endpoints.to_string(),
        reason: format!("rpc timed out after {timeout:?}"),
    }
}

macro_rules! unary {
    ($self:ident, $endpoints:ident, $metadata:ident, $request:ident, $timeout:ident, $method:ident) => {{
        let channel = $self.channel($endpoints).await?;
        let mut client = MessagingServiceClient::new(channel);

        let mut request = tonic::Request::new($request);
        *request.metadata_mut() = $metadata;
        request.set_timeout($timeout);

        let outcome = tokio::time::timeout($timeout, client.$method(request)).await;
        match outcome {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => {
                $self.evict($endpoints).await;
                Err(transport_error($endpoints, status))
            }
            Err(_) => {
                $self.evict($endpoints).await;
                Err(rpc_timeout_error($endpoints, $timeout))
            }
        }
    }};
}

#[async_trait]
impl Transport for GrpcTransport {
    async fn query_route(
        &self,
        endpoints: &Endpoints,
        metadata: MetadataMap,
        request: QueryRouteRequest,
        timeout: Duration,
    ) -> Result<QueryRouteResponse> {
        unary!(self, endpoints, metadata, request, timeout, query_route)
    }

    async fn send_message(
        &self,
        endpoints: &Endpoints,
        metadata: MetadataMap,
        request: SendMessageRequest,
        timeout: Duration,
    ) -> Result<SendMessageResponse> {
        unary!(self, endpoints, metadata, request, timeout, send_message)
    }

    async fn end_transaction(
        &self,
        endpoints: &Endpoints,
        metadata: MetadataMap,
        request: EndTransactionRequest,
        timeout: Duration,
    ) -> Result<EndTransactionResponse> {
        unary!(self, endpoints, metadata, request, timeout, end_transaction)
    }
}
