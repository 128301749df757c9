//! User-facing message type and the identifiers stamped onto it.
//!
//! A `Message` is immutable once built; the send pipeline reads it but
//! never mutates it, so one message value can be retried across partitions
//! without copying.

use std::collections::HashMap;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use bytes::Bytes;
use chrono::Utc;

use crate::error::{ClientError, Result};

/// User property marking a message as the prepared half of a transaction.
/// The send pipeline switches the wire message type to TRANSACTION when this
/// property parses as true.
pub const PROPERTY_TRANSACTION_PREPARED: &str = "TRAN_MSG";

/// A message to publish to a FlowMQ topic.
///
/// Build one with [`Message::builder`]:
///
/// ```ignore
/// let message = Message::builder()
///     .topic("orders")
///     .tag("created")
///     .body(b"order data".as_slice())
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct Message {
    topic: String,
    body: Bytes,
    tag: Option<String>,
    keys: Vec<String>,
    user_properties: HashMap<String, String>,
    delay_level: i32,
    delivery_timestamp: i64,
}

impl Message {
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn user_properties(&self) -> &HashMap<String, String> {
        &self.user_properties
    }

    /// Broker-defined delay level; 0 means no level-based delay.
    pub fn delay_level(&self) -> i32 {
        self.delay_level
    }

    /// Absolute delivery time in epoch milliseconds; 0 means immediate.
    pub fn delivery_timestamp(&self) -> i64 {
        self.delivery_timestamp
    }

    /// Whether the transaction-prepared user property is set and truthy.
    pub fn is_transaction_prepared(&self) -> bool {
        self.user_properties
            .get(PROPERTY_TRANSACTION_PREPARED)
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

/// Builder for [`Message`].
#[derive(Debug, Default)]
pub struct MessageBuilder {
    topic: String,
    body: Bytes,
    tag: Option<String>,
    keys: Vec<String>,
    user_properties: HashMap<String, String>,
    delay_level: i32,
    delivery_timestamp: i64,
}

impl MessageBuilder {
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn user_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_properties.insert(key.into(), value.into());
        self
    }

    /// Marks the message as the prepared half of a transaction.
    pub fn transaction_prepared(self) -> Self {
        self.user_property(PROPERTY_TRANSACTION_PREPARED, "true")
    }

    /// Broker-defined delay level. Mutually exclusive with
    /// [`delivery_timestamp`](Self::delivery_timestamp).
    pub fn delay_level(mut self, level: i32) -> Self {
        self.delay_level = level;
        self
    }

    /// Absolute delivery time in epoch milliseconds. Mutually exclusive
    /// with [`delay_level`](Self::delay_level).
    pub fn delivery_timestamp(mut self, timestamp_millis: i64) -> Self {
        self.delivery_timestamp = timestamp_millis;
        self
    }

    pub fn build(self) -> Result<Message> {
        if self.topic.is_empty() {
            return Err(ClientError::Config("message topic must not be empty".to_string()));
        }
        if self.delay_level < 0 {
            return Err(ClientError::Config("delay level must not be negative".to_string()));
        }
        if self.delay_level > 0 && self.delivery_timestamp > 0 {
            return Err(ClientError::Config(
                "delay level and delivery timestamp are mutually exclusive".to_string(),
            ));
        }
        Ok(Message {
            topic: self.topic,
            body: self.body,
            tag: self.tag,
            keys: self.keys,
            user_properties: self.user_properties,
            delay_level: self.delay_level,
            delivery_timestamp: self.delivery_timestamp,
        })
    }
}

static MESSAGE_ID_PREFIX: OnceLock<String> = OnceLock::new();
static MESSAGE_ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A globally unique, opaque message id.
///
/// Layout: a process-constant prefix (6 random bytes, the process id, and
/// the process start second) followed by a monotonically increasing
/// sequence, all uppercase hex. Brokers treat the string as opaque.
pub(crate) fn unique_message_id() -> String {
    let prefix = MESSAGE_ID_PREFIX.get_or_init(|| {
        let host: [u8; 6] = rand::random();
        let pid = std::process::id() as u16;
        let started = Utc::now().timestamp() as u32;
        format!("{}{:04X}{:08X}", hex::encode_upper(host), pid, started)
    });
    let sequence = MESSAGE_ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}{sequence:08X}")
}

/// IPv4 literal of the local interface a default route would use, probed
/// once per process. Falls back to the loopback literal when the probe
/// cannot determine an address.
pub(crate) fn local_ipv4_address() -> &'static str {
    static ADDRESS: OnceLock<String> = OnceLock::new();
    ADDRESS.get_or_init(|| {
        UdpSocket::bind(("0.0.0.0", 0))
            .and_then(|socket| {
                socket.connect(("8.8.8.8", 80))?;
                socket.local_addr()
            })
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|_| "127.0.0.1".to_string())
    })
}
