//! Client configuration and credential plumbing.
//!
//! A `ClientConfig` carries everything a producer needs to talk to a realm:
//! the realm identifier (`arn`), the producer group, the route-service
//! access point, and the signing inputs. Producers with the same `arn`
//! share one `ClientInstance` (see `instance.rs`), so the `arn` doubles as
//! the sharing key.

use std::sync::Arc;
use std::time::Duration;

use crate::route::Endpoints;

/// Default bound on one send RPC, route fetch included.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(3);

/// Default caller-facing deadline for a whole send, retries included.
pub const DEFAULT_SEND_MESSAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default attempt budget for one message.
pub const DEFAULT_MAX_ATTEMPT_TIMES: usize = 3;

/// Access credentials handed to the request signer.
///
/// Blank keys are treated the same as absent credentials: the signer emits
/// unsigned metadata instead of failing.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub access_key: String,
    pub access_secret: String,
    pub security_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, access_secret: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            access_secret: access_secret.into(),
            security_token: None,
        }
    }

    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = Some(token.into());
        self
    }
}

/// Source of access credentials, queried on every signed request so
/// rotating providers pick up fresh keys without a client restart.
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Credentials;
}

/// Provider returning one fixed set of credentials.
#[derive(Debug, Clone)]
pub struct StaticCredentialsProvider {
    credentials: Credentials,
}

impl StaticCredentialsProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl CredentialsProvider for StaticCredentialsProvider {
    fn credentials(&self) -> Credentials {
        self.credentials.clone()
    }
}

/// Resolved producer configuration. Built by `ProducerBuilder`; immutable
/// afterwards.
#[derive(Clone)]
pub struct ClientConfig {
    /// Tenant realm. Scopes credentials, routes, and the shared client
    /// instance.
    pub arn: String,

    /// Producer group name.
    pub group: String,

    /// Route-service access point topic queries are sent to.
    pub access_point: Endpoints,

    /// Optional namespace, forwarded as a metadata header when non-empty.
    pub namespace: String,

    /// Region identifier used in the authorization credential scope.
    pub region_id: String,

    /// Service name used in the authorization credential scope.
    pub service_name: String,

    /// Optional tenant id, forwarded as a metadata header when non-empty.
    pub tenant_id: String,

    /// Optional credentials source. Absent or blank credentials produce
    /// unsigned requests.
    pub credentials_provider: Option<Arc<dyn CredentialsProvider>>,

    /// Deadline for one RPC attempt. This is not the caller deadline; the
    /// caller deadline spans all attempts and is enforced by the facade.
    pub io_timeout: Duration,

    /// Default caller-facing deadline for `send`.
    pub send_message_timeout: Duration,

    /// Attempt budget per message.
    pub max_attempt_times: usize,

    /// Whether send spans are opened and a trace context is injected into
    /// outgoing messages.
    pub message_tracing_enabled: bool,
}
