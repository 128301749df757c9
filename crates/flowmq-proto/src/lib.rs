//! FlowMQ Protocol Definitions
//!
//! Wire types for the `flowmq.v1.MessagingService` gRPC API shared by
//! producers and brokers.
//!
//! The message structs are hand-maintained `prost` definitions rather than
//! `tonic-build` output, which keeps `protoc` out of the build. Tags are
//! frozen; adding a field means picking a fresh tag, never renumbering.
//!
//! ## Usage
//!
//! ```ignore
//! use flowmq_proto::v1::{
//!     messaging_service_client::MessagingServiceClient,
//!     SendMessageRequest,
//! };
//!
//! let mut client = MessagingServiceClient::connect("http://localhost:8081").await?;
//! let response = client.send_message(request).await?;
//! ```

/// FlowMQ gRPC API, protocol revision v1.
pub mod v1 {
    use std::collections::HashMap;

    /// A named resource scoped to a tenant realm (`arn`).
    ///
    /// Topics and producer groups are both resources; the `arn` carries the
    /// authentication realm they belong to.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Resource {
        #[prost(string, tag = "1")]
        pub arn: String,
        #[prost(string, tag = "2")]
        pub name: String,
    }

    /// One broker address.
    #[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
    pub struct Address {
        #[prost(string, tag = "1")]
        pub host: String,
        #[prost(int32, tag = "2")]
        pub port: i32,
    }

    /// The address set of a single broker endpoint.
    #[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
    pub struct Endpoints {
        #[prost(message, repeated, tag = "1")]
        pub addresses: Vec<Address>,
    }

    /// A broker node hosting partitions.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Broker {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(int32, tag = "2")]
        pub id: i32,
        #[prost(message, optional, tag = "3")]
        pub endpoints: Option<Endpoints>,
    }

    /// A broker-owned shard of a topic; the unit of routing for a send.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Partition {
        #[prost(message, optional, tag = "1")]
        pub topic: Option<Resource>,
        #[prost(int32, tag = "2")]
        pub id: i32,
        #[prost(enumeration = "Permission", tag = "3")]
        pub permission: i32,
        #[prost(message, optional, tag = "4")]
        pub broker: Option<Broker>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Permission {
        None = 0,
        Read = 1,
        Write = 2,
        ReadWrite = 3,
    }

    /// Broker-side outcome of a request. `code` follows the `google.rpc.Code`
    /// numbering; `0` is success.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Status {
        #[prost(int32, tag = "1")]
        pub code: i32,
        #[prost(string, tag = "2")]
        pub message: String,
    }

    /// Subset of `google.rpc.Code` values the client interprets.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Code {
        Ok = 0,
        InvalidArgument = 3,
        DeadlineExceeded = 4,
        NotFound = 5,
        PermissionDenied = 7,
        ResourceExhausted = 8,
        Internal = 13,
        Unavailable = 14,
        Unauthenticated = 16,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ResponseCommon {
        #[prost(message, optional, tag = "1")]
        pub status: Option<Status>,
    }

    impl ResponseCommon {
        /// The broker status, treating an absent status as success (proto3
        /// default semantics).
        pub fn status(&self) -> Status {
            self.status.clone().unwrap_or_default()
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Encoding {
        Identity = 0,
        Gzip = 1,
        Snappy = 2,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum MessageType {
        Normal = 0,
        Fifo = 1,
        Delay = 2,
        Transaction = 3,
    }

    /// Attributes the client sets on every outgoing message.
    ///
    /// `delay_level` and `delivery_timestamp` are mutually exclusive; at most
    /// one is populated. `partition_id` is rewritten when a send rotates to
    /// another partition, everything else stays fixed for the lifetime of one
    /// send, including `message_id`.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SystemAttribute {
        #[prost(string, tag = "1")]
        pub tag: String,
        #[prost(string, repeated, tag = "2")]
        pub keys: Vec<String>,
        #[prost(string, tag = "3")]
        pub message_id: String,
        #[prost(enumeration = "Encoding", tag = "4")]
        pub body_encoding: i32,
        #[prost(enumeration = "MessageType", tag = "5")]
        pub message_type: i32,
        #[prost(message, optional, tag = "6")]
        pub born_timestamp: Option<::prost_types::Timestamp>,
        #[prost(string, tag = "7")]
        pub born_host: String,
        #[prost(message, optional, tag = "8")]
        pub producer_group: Option<Resource>,
        #[prost(int32, tag = "9")]
        pub delay_level: i32,
        #[prost(message, optional, tag = "10")]
        pub delivery_timestamp: Option<::prost_types::Timestamp>,
        #[prost(int32, tag = "11")]
        pub partition_id: i32,
        #[prost(string, tag = "12")]
        pub trace_context: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Message {
        #[prost(message, optional, tag = "1")]
        pub topic: Option<Resource>,
        #[prost(map = "string, string", tag = "2")]
        pub user_attribute: HashMap<String, String>,
        #[prost(message, optional, tag = "3")]
        pub system_attribute: Option<SystemAttribute>,
        #[prost(bytes = "bytes", tag = "4")]
        pub body: ::bytes::Bytes,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SendMessageRequest {
        #[prost(message, optional, tag = "1")]
        pub message: Option<Message>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SendMessageResponse {
        #[prost(message, optional, tag = "1")]
        pub common: Option<ResponseCommon>,
        #[prost(string, tag = "2")]
        pub message_id: String,
        #[prost(string, tag = "3")]
        pub transaction_id: String,
        #[prost(int64, optional, tag = "4")]
        pub queue_offset: Option<i64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct QueryRouteRequest {
        #[prost(message, optional, tag = "1")]
        pub topic: Option<Resource>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct QueryRouteResponse {
        #[prost(message, optional, tag = "1")]
        pub common: Option<ResponseCommon>,
        #[prost(message, repeated, tag = "2")]
        pub partitions: Vec<Partition>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum TransactionResolution {
        Commit = 0,
        Rollback = 1,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct EndTransactionRequest {
        #[prost(string, tag = "1")]
        pub message_id: String,
        #[prost(string, tag = "2")]
        pub transaction_id: String,
        #[prost(string, tag = "3")]
        pub trace_context: String,
        #[prost(enumeration = "TransactionResolution", tag = "4")]
        pub resolution: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct EndTransactionResponse {
        #[prost(message, optional, tag = "1")]
        pub common: Option<ResponseCommon>,
    }

    /// Client stubs for `flowmq.v1.MessagingService`.
    ///
    /// Hand-rolled unary stubs in the shape `tonic-build` would emit, kept in
    /// lockstep with the message structs above.
    pub mod messaging_service_client {
        use tonic::codegen::http::Uri;
        use tonic::codegen::*;

        #[derive(Debug, Clone)]
        pub struct MessagingServiceClient<T> {
            inner: tonic::client::Grpc<T>,
        }

        impl MessagingServiceClient<tonic::transport::Channel> {
            /// Attempt to create a new client by connecting to a given endpoint.
            pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
            where
                D: TryInto<tonic::transport::Endpoint>,
                D::Error: Into<StdError>,
            {
                let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
                Ok(Self::new(conn))
            }
        }

        impl<T> MessagingServiceClient<T>
        where
            T: tonic::client::GrpcService<tonic::body::BoxBody>,
            T::Error: Into<StdError>,
            T::ResponseBody: Body<Data = Bytes> + Send + 'static,
            <T::ResponseBody as Body>::Error: Into<StdError> + Send,
        {
            pub fn new(inner: T) -> Self {
                let inner = tonic::client::Grpc::new(inner);
                Self { inner }
            }

            pub fn with_origin(inner: T, origin: Uri) -> Self {
                let inner = tonic::client::Grpc::with_origin(inner, origin);
                Self { inner }
            }

            pub async fn send_message(
                &mut self,
                request: impl tonic::IntoRequest<super::SendMessageRequest>,
            ) -> std::result::Result<tonic::Response<super::SendMessageResponse>, tonic::Status>
            {
                self.inner.ready().await.map_err(|e| {
                    tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
                let codec = tonic::codec::ProstCodec::default();
                let path = http::uri::PathAndQuery::from_static(
                    "/flowmq.v1.MessagingService/SendMessage",
                );
                let mut req = request.into_request();
                req.extensions_mut()
                    .insert(GrpcMethod::new("flowmq.v1.MessagingService", "SendMessage"));
                self.inner.unary(req, path, codec).await
            }

            pub async fn query_route(
                &mut self,
                request: impl tonic::IntoRequest<super::QueryRouteRequest>,
            ) -> std::result::Result<tonic::Response<super::QueryRouteResponse>, tonic::Status>
            {
                self.inner.ready().await.map_err(|e| {
                    tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
                let codec = tonic::codec::ProstCodec::default();
                let path = http::uri::PathAndQuery::from_static(
                    "/flowmq.v1.MessagingService/QueryRoute",
                );
                let mut req = request.into_request();
                req.extensions_mut()
                    .insert(GrpcMethod::new("flowmq.v1.MessagingService", "QueryRoute"));
                self.inner.unary(req, path, codec).await
            }

            pub async fn end_transaction(
                &mut self,
                request: impl tonic::IntoRequest<super::EndTransactionRequest>,
            ) -> std::result::Result<tonic::Response<super::EndTransactionResponse>, tonic::Status>
            {
                self.inner.ready().await.map_err(|e| {
                    tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
                let codec = tonic::codec::ProstCodec::default();
                let path = http::uri::PathAndQuery::from_static(
                    "/flowmq.v1.MessagingService/EndTransaction",
                );
                let mut req = request.into_request();
                req.extensions_mut().insert(GrpcMethod::new(
                    "flowmq.v1.MessagingService",
                    "EndTransaction",
                ));
                self.inner.unary(req, path, codec).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::v1::*;
    use prost::Message as _;

    fn sample_request() -> SendMessageRequest {
        SendMessageRequest {
            message: Some(Message {
                topic: Some(Resource {
                    arn: "arn:test".to_string(),
                    name: "orders".to_string(),
                }),
                user_attribute: Default::default(),
                system_attribute: Some(SystemAttribute {
                    message_id: "0102030405FF".to_string(),
                    partition_id: 2,
                    born_host: "192.168.0.1".to_string(),
                    ..Default::default()
                }),
                body: bytes::Bytes::from_static(b"payload"),
            }),
        }
    }

    #[test]
    fn round_trips_send_message_request() {
        let request = sample_request();
        let encoded = request.encode_to_vec();
        let decoded = SendMessageRequest::decode(encoded.as_slice()).unwrap();
        assert_eq!(request, decoded);
    }

    #[test]
    fn partition_id_rewrite_only_touches_partition_id() {
        let request = sample_request();
        let mut rewritten = request.clone();
        rewritten
            .message
            .as_mut()
            .unwrap()
            .system_attribute
            .as_mut()
            .unwrap()
            .partition_id = 5;

        let decoded =
            SendMessageRequest::decode(rewritten.encode_to_vec().as_slice()).unwrap();
        let system = decoded.message.unwrap().system_attribute.unwrap();
        assert_eq!(system.partition_id, 5);
        assert_eq!(system.message_id, "0102030405FF");
    }

    #[test]
    fn absent_status_reads_as_ok() {
        let common = ResponseCommon { status: None };
        assert_eq!(common.status().code, Code::Ok as i32);
    }

    #[test]
    fn unknown_encoding_falls_back_to_identity() {
        let system = SystemAttribute {
            body_encoding: 42,
            ..Default::default()
        };
        assert_eq!(system.body_encoding(), Encoding::Identity);
    }
}
