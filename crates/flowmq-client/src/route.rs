//! Topic route domain types.
//!
//! The route service answers a topic query with an ordered partition list;
//! this module holds the client-side view of that answer. `Endpoints` is the
//! identity used by the isolation registry: two endpoints are equal when
//! their address sets are equal, regardless of the order the route service
//! listed them in.

use std::fmt;
use std::str::FromStr;

use flowmq_proto::v1 as pb;
use tracing::warn;

use crate::error::{ClientError, Result};

/// A single `host:port` broker address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The address set of one remote broker; the key of the isolation registry.
///
/// Addresses are kept sorted so equality and hashing are structural over the
/// set, not the order the route service happened to use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoints {
    addresses: Vec<Address>,
}

impl Endpoints {
    pub fn new(mut addresses: Vec<Address>) -> Result<Self> {
        if addresses.is_empty() {
            return Err(ClientError::Config(
                "endpoints require at least one address".to_string(),
            ));
        }
        addresses.sort();
        addresses.dedup();
        Ok(Self { addresses })
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// URI of the address a gRPC channel is dialed against.
    pub(crate) fn grpc_uri(&self) -> String {
        format!("http://{}", self.addresses[0])
    }

    pub(crate) fn from_proto(endpoints: pb::Endpoints) -> Result<Self> {
        let addresses = endpoints
            .addresses
            .into_iter()
            .map(|address| {
                let port = u16::try_from(address.port).map_err(|_| {
                    ClientError::Config(format!("invalid broker port {}", address.port))
                })?;
                Ok(Address::new(address.host, port))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(addresses)
    }
}

impl fmt::Display for Endpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, address) in self.addresses.iter().enumerate() {
            if index > 0 {
                f.write_str(";")?;
            }
            write!(f, "{address}")?;
        }
        Ok(())
    }
}

impl FromStr for Endpoints {
    type Err = ClientError;

    /// Parses `host:port` or `host:port;host:port`.
    fn from_str(input: &str) -> Result<Self> {
        let addresses = input
            .split(';')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (host, port) = part.rsplit_once(':').ok_or_else(|| {
                    ClientError::Config(format!("address '{part}' is missing a port"))
                })?;
                let port = port.parse::<u16>().map_err(|_| {
                    ClientError::Config(format!("address '{part}' has an invalid port"))
                })?;
                Ok(Address::new(host, port))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(addresses)
    }
}

/// What the producer may do with a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    None,
    Read,
    Write,
    ReadWrite,
}

impl Permission {
    pub fn is_writable(self) -> bool {
        matches!(self, Permission::Write | Permission::ReadWrite)
    }

    fn from_proto(permission: i32) -> Self {
        match pb::Permission::try_from(permission) {
            Ok(pb::Permission::Read) => Permission::Read,
            Ok(pb::Permission::Write) => Permission::Write,
            Ok(pb::Permission::ReadWrite) => Permission::ReadWrite,
            Ok(pb::Permission::None) | Err(_) => Permission::None,
        }
    }
}

/// A broker-owned shard of a topic. Identity is `(topic, id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    topic: String,
    id: i32,
    permission: Permission,
    broker_name: String,
    endpoints: Endpoints,
}

impl Partition {
    pub fn new(
        topic: impl Into<String>,
        id: i32,
        permission: Permission,
        broker_name: impl Into<String>,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            topic: topic.into(),
            id,
            permission,
            broker_name: broker_name.into(),
            endpoints,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn broker_name(&self) -> &str {
        &self.broker_name
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn from_proto(partition: pb::Partition) -> Option<Self> {
        let topic = partition.topic?.name;
        let broker = partition.broker?;
        let endpoints = Endpoints::from_proto(broker.endpoints?).ok()?;
        Some(Self {
            topic,
            id: partition.id,
            permission: Permission::from_proto(partition.permission),
            broker_name: broker.name,
            endpoints,
        })
    }
}

/// Ordered partition list for one topic, as delivered by the route service.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopicRouteData {
    partitions: Vec<Partition>,
}

impl TopicRouteData {
    pub fn new(partitions: Vec<Partition>) -> Self {
        Self { partitions }
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub(crate) fn from_proto(topic: &str, response: pb::QueryRouteResponse) -> Self {
        let partitions = response
            .partitions
            .into_iter()
            .filter_map(|partition| {
                let converted = Partition::from_proto(partition);
                if converted.is_none() {
                    warn!(topic = %topic, "dropping malformed partition from route response");
                }
                converted
            })
            .collect();
        Self { partitions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_equality_ignores_address_order() {
        let a = Endpoints::new(vec![
            Address::new("broker-a", 8081),
            Address::new("broker-b", 8081),
        ])
        .unwrap();
        let b = Endpoints::new(vec![
            Address::new("broker-b", 8081),
            Address::new("broker-a", 8081),
        ])
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn endpoints_parse_round_trip() {
        let endpoints: Endpoints = "broker-a:8081;broker-b:9091".parse().unwrap();
        assert_eq!(endpoints.to_string(), "broker-a:8081;broker-b:9091");
    }

    #[test]
    fn endpoints_reject_missing_port() {
        assert!("broker-a".parse::<Endpoints>().is_err());
        assert!("".parse::<Endpoints>().is_err());
    }

    #[test]
    fn writable_permissions() {
        assert!(Permission::Write.is_writable());
        assert!(Permission::ReadWrite.is_writable());
        assert!(!Permission::Read.is_writable());
        assert!(!Permission::None.is_writable());
    }

    #[test]
    fn malformed_route_entries_are_dropped() {
        let response = pb::QueryRouteResponse {
            common: None,
            partitions: vec![
                pb::Partition {
                    topic: Some(pb::Resource {
                        arn: String::new(),
                        name: "orders".to_string(),
                    }),
                    id: 0,
                    permission: pb::Permission::Write as i32,
                    broker: Some(pb::Broker {
                        name: "broker-a".to_string(),
                        id: 0,
                        endpoints: Some(pb::Endpoints {
                            addresses: vec![pb::Address {
                                host: "broker-a".to_string(),
                                port: 8081,
                            }],
                        }),
                    }),
                },
                // No broker: cannot be routed to.
                pb::Partition {
                    topic: Some(pb::Resource {
                        arn: String::new(),
                        name: "orders".to_string(),
                    }),
                    id: 1,
                    permission: pb::Permission::Write as i32,
                    broker: None,
                },
            ],
        };

        let route = TopicRouteData::from_proto("orders", response);
        assert_eq!(route.partitions().len(), 1);
        assert_eq!(route.partitions()[0].id(), 0);
    }
}
