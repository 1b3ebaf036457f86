// Downstream profile-service transports.
//
// One capability interface, two implementations selected at construction
// time: a gRPC client (preferred) and an HTTP client used as the fallback.
// Both propagate the request id as `x-request-id` and report a
// profile-already-exists response as `AlreadyExists`, which callers treat
// as success.

use async_trait::async_trait;
use uuid::Uuid;

/// Result of a create-profile call that reached the downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    /// Duplicate create — provisioning is idempotent, so this is success.
    AlreadyExists,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Transport-level failure: connect refused, channel down, deadline.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    /// The call was abandoned at the 1 s deadline. Never success.
    #[error("call timed out")]
    Timeout,
    /// The downstream answered with a non-conflict application error.
    #[error("downstream rejected the call: {0}")]
    Rejected(String),
}

/// The create-profile capability.
#[async_trait]
pub trait ProfileTransport: Send + Sync + std::fmt::Debug {
    async fn create_profile(
        &self,
        account_id: Uuid,
        username: &str,
        request_id: &str,
    ) -> Result<ProvisionOutcome, TransportError>;
}

/// Wire messages for the profile service's gRPC surface.
pub mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CreateProfileRequest {
        #[prost(string, tag = "1")]
        pub user_id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub username: ::prost::alloc::string::String,
        #[prost(string, tag = "3")]
        pub request_id: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CreateProfileResponse {
        #[prost(string, tag = "1")]
        pub profile_id: ::prost::alloc::string::String,
    }
}

const CREATE_PROFILE_PATH: &str = "/profile.v1.ProfileService/CreateProfile";

/// gRPC transport over a lazily-connected channel.
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    channel: tonic::transport::Channel,
}

impl GrpcTransport {
    /// Build against an endpoint URL without connecting; connection
    /// failures surface on the first call.
    pub fn connect_lazy(endpoint: &str) -> Result<Self, TransportError> {
        let channel = tonic::transport::Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| TransportError::Unavailable(format!("bad endpoint: {e}")))?
            .connect_lazy();
        Ok(Self { channel })
    }
}

#[async_trait]
impl ProfileTransport for GrpcTransport {
    async fn create_profile(
        &self,
        account_id: Uuid,
        username: &str,
        request_id: &str,
    ) -> Result<ProvisionOutcome, TransportError> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| TransportError::Unavailable(format!("channel not ready: {e}")))?;

        let mut request = tonic::Request::new(proto::CreateProfileRequest {
            user_id: account_id.to_string(),
            username: username.to_owned(),
            request_id: request_id.to_owned(),
        });
        if let Ok(value) = tonic::metadata::MetadataValue::try_from(request_id) {
            request.metadata_mut().insert("x-request-id", value);
        }

        let codec = tonic::codec::ProstCodec::default();
        let path = tonic::codegen::http::uri::PathAndQuery::from_static(CREATE_PROFILE_PATH);

        let result: Result<tonic::Response<proto::CreateProfileResponse>, tonic::Status> =
            grpc.unary(request, path, codec).await;

        match result {
            Ok(_) => Ok(ProvisionOutcome::Created),
            Err(status) if status.code() == tonic::Code::AlreadyExists => {
                Ok(ProvisionOutcome::AlreadyExists)
            }
            Err(status)
                if matches!(
                    status.code(),
                    tonic::Code::Unavailable | tonic::Code::DeadlineExceeded | tonic::Code::Unknown
                ) =>
            {
                Err(TransportError::Unavailable(status.message().to_string()))
            }
            Err(status) => Err(TransportError::Rejected(format!(
                "{}: {}",
                status.code(),
                status.message()
            ))),
        }
    }
}

/// HTTP transport posting to the profile service's internal create endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, serde::Serialize)]
struct HttpCreateProfileRequest<'a> {
    user_id: String,
    username: &'a str,
    request_id: &'a str,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ProfileTransport for HttpTransport {
    async fn create_profile(
        &self,
        account_id: Uuid,
        username: &str,
        request_id: &str,
    ) -> Result<ProvisionOutcome, TransportError> {
        let url = format!("{}/internal/users/create_profile", self.base_url);
        let body = HttpCreateProfileRequest {
            user_id: account_id.to_string(),
            username,
            request_id,
        };

        let response = self
            .client
            .post(&url)
            .header("X-Request-Id", request_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(ProvisionOutcome::Created)
        } else if status == reqwest::StatusCode::CONFLICT {
            Ok(ProvisionOutcome::AlreadyExists)
        } else {
            Err(TransportError::Rejected(format!("status {status}")))
        }
    }
}
