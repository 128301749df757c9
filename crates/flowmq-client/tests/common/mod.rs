//! Shared test fixtures: a scriptable in-memory transport and producer
//! builders wired to it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flowmq_client::{ClientError, ClientRegistry, Endpoints, Producer, Result, Transport};
use flowmq_proto::v1 as pb;
use tonic::metadata::MetadataMap;

/// What the broker does with the next send attempt.
#[derive(Debug, Clone, Copy)]
pub enum SendBehavior {
    /// gRPC OK, broker status OK, message id echoed back.
    Ok,
    /// gRPC OK, broker status non-OK.
    Reject(i32, &'static str),
    /// The RPC never produces a response.
    TransportError,
    /// The RPC stalls before answering OK.
    Hang(Duration),
}

/// Scriptable [`Transport`]: routes and send outcomes are programmed by the
/// test, every request is recorded for assertions.
#[derive(Default)]
pub struct MockTransport {
    pub route_partitions: Mutex<Vec<pb::Partition>>,
    pub route_calls: AtomicUsize,
    pub route_delay: Mutex<Option<Duration>>,
    pub route_failures_remaining: AtomicUsize,

    pub send_calls: AtomicUsize,
    pub send_script: Mutex<VecDeque<SendBehavior>>,
    pub send_requests: Mutex<Vec<(Endpoints, pb::SendMessageRequest)>>,

    pub end_requests: Mutex<Vec<pb::EndTransactionRequest>>,
}

impl MockTransport {
    /// Transport answering route queries with `partitions`.
    pub fn with_route(partitions: Vec<pb::Partition>) -> Arc<Self> {
        let transport = Self::default();
        *transport.route_partitions.lock().unwrap() = partitions;
        Arc::new(transport)
    }

    pub fn script_sends(&self, behaviors: impl IntoIterator<Item = SendBehavior>) {
        self.send_script.lock().unwrap().extend(behaviors);
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn route_calls(&self) -> usize {
        self.route_calls.load(Ordering::SeqCst)
    }

    /// Recorded send attempts as `(endpoints, system_attribute)` pairs.
    pub fn recorded_attempts(&self) -> Vec<(Endpoints, pb::SystemAttribute)> {
        self.send_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(endpoints, request)| {
                let system = request
                    .message
                    .as_ref()
                    .and_then(|message| message.system_attribute.as_ref())
                    .cloned()
                    .unwrap_or_default();
                (endpoints.clone(), system)
            })
            .collect()
    }
}

fn ok_common() -> Option<pb::ResponseCommon> {
    Some(pb::ResponseCommon {
        status: Some(pb::Status {
            code: pb::Code::Ok as i32,
            message: String::new(),
        }),
    })
}

#[async_trait]
impl Transport for MockTransport {
    async fn query_route(
        &self,
        endpoints: &Endpoints,
        _metadata: MetadataMap,
        _request: pb::QueryRouteRequest,
        _timeout: Duration,
    ) -> Result<pb::QueryRouteResponse> {
        self.route_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.route_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.route_failures_remaining.load(Ordering::SeqCst) > 0 {
            self.route_failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(ClientError::Transport {
                endpoints: endpoints.to_string(),
                reason: "route service unreachable".to_string(),
            });
        }

        Ok(pb::QueryRouteResponse {
            common: ok_common(),
            partitions: self.route_partitions.lock().unwrap().clone(),
        })
    }

    async fn send_message(
        &self,
        endpoints: &Endpoints,
        _metadata: MetadataMap,
        request: pb::SendMessageRequest,
        _timeout: Duration,
    ) -> Result<pb::SendMessageResponse> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.send_requests
            .lock()
            .unwrap()
            .push((endpoints.clone(), request.clone()));

        let behavior = self
            .send_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SendBehavior::Ok);

        let message_id = request
            .message
            .as_ref()
            .and_then(|message| message.system_attribute.as_ref())
            .map(|system| system.message_id.clone())
            .unwrap_or_default();

        match behavior {
            SendBehavior::Ok => Ok(pb::SendMessageResponse {
                common: ok_common(),
                message_id,
                transaction_id: String::new(),
                queue_offset: Some(7),
            }),
            SendBehavior::Reject(code, message) => Ok(pb::SendMessageResponse {
                common: Some(pb::ResponseCommon {
                    status: Some(pb::Status {
                        code,
                        message: message.to_string(),
                    }),
                }),
                message_id: String::new(),
                transaction_id: String::new(),
                queue_offset: None,
            }),
            SendBehavior::TransportError => Err(ClientError::Transport {
                endpoints: endpoints.to_string(),
                reason: "connection reset".to_string(),
            }),
            SendBehavior::Hang(delay) => {
                tokio::time::sleep(delay).await;
                Ok(pb::SendMessageResponse {
                    common: ok_common(),
                    message_id,
                    transaction_id: String::new(),
                    queue_offset: None,
                })
            }
        }
    }

    async fn end_transaction(
        &self,
        _endpoints: &Endpoints,
        _metadata: MetadataMap,
        request: pb::EndTransactionRequest,
        _timeout: Duration,
    ) -> Result<pb::EndTransactionResponse> {
        self.end_requests.lock().unwrap().push(request);
        Ok(pb::EndTransactionResponse {
            common: ok_common(),
        })
    }
}

/// One writable partition hosted by `broker`.
pub fn writable_partition(topic: &str, id: i32, broker: &str) -> pb::Partition {
    partition_with_permission(topic, id, broker, pb::Permission::Write)
}

pub fn partition_with_permission(
    topic: &str,
    id: i32,
    broker: &str,
    permission: pb::Permission,
) -> pb::Partition {
    pb::Partition {
        topic: Some(pb::Resource {
            arn: "arn:test".to_string(),
            name: topic.to_string(),
        }),
        id,
        permission: permission as i32,
        broker: Some(pb::Broker {
            name: broker.to_string(),
            id: 0,
            endpoints: Some(pb::Endpoints {
                addresses: vec![pb::Address {
                    host: broker.to_string(),
                    port: 8081,
                }],
            }),
        }),
    }
}

/// Three writable partitions spread over three brokers.
pub fn three_broker_route(topic: &str) -> Vec<pb::Partition> {
    vec![
        writable_partition(topic, 0, "broker-a"),
        writable_partition(topic, 1, "broker-b"),
        writable_partition(topic, 2, "broker-c"),
    ]
}

/// Producer bound to a fresh registry over `transport`, already started.
pub async fn started_producer(transport: Arc<MockTransport>) -> Producer {
    let registry = Arc::new(ClientRegistry::with_transport(transport));
    let producer = Producer::builder()
        .registry(registry)
        .arn("arn:test")
        .group("group-it")
        .access_point("route:8081".parse().unwrap())
        .build()
        .await
        .unwrap();
    producer.start().unwrap();
    producer
}
