//! FlowMQ Client - Producer API
//!
//! This crate publishes messages to FlowMQ topics. It resolves topic
//! routes through a shared, single-flight cache, rotates sends across
//! partitions while steering around unhealthy broker endpoints, signs
//! every request, and retries failed attempts on alternative partitions
//! without blocking the caller.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use flowmq_client::{ClientRegistry, Message, Producer};
//!
//! // One registry per process; producers sharing an `arn` share a client
//! // instance (transport, route cache, endpoint isolation).
//! let registry = Arc::new(ClientRegistry::new());
//!
//! let producer = Producer::builder()
//!     .registry(Arc::clone(&registry))
//!     .arn("arn:flowmq:prod")
//!     .group("group-orders")
//!     .access_point("route.flowmq.internal:8081".parse()?)
//!     .build()
//!     .await?;
//! producer.start()?;
//!
//! let message = Message::builder()
//!     .topic("orders")
//!     .tag("created")
//!     .body(b"order data".as_slice())
//!     .build()?;
//!
//! // Bounded wait over the async pipeline.
//! let result = producer.send(message).await?;
//! println!("partition {} id {}", result.partition_id, result.message_id);
//!
//! producer.shutdown().await;
//! ```

mod callback;

pub mod config;
pub mod error;
pub mod instance;
pub mod isolation;
pub mod message;
pub mod producer;
pub mod publish_info;
pub mod route;
pub mod signature;
pub mod transport;

pub use config::{
    ClientConfig, Credentials, CredentialsProvider, StaticCredentialsProvider,
};
pub use error::{ClientError, Result};
pub use instance::{ClientInstance, ClientRegistry};
pub use isolation::IsolationRegistry;
pub use message::{Message, MessageBuilder, PROPERTY_TRANSACTION_PREPARED};
pub use producer::{
    Producer, ProducerBuilder, QueueSelector, SendResult, ServiceState, TransactionResolution,
};
pub use publish_info::TopicPublishInfo;
pub use route::{Address, Endpoints, Partition, Permission, TopicRouteData};
pub use transport::{GrpcTransport, Transport};
