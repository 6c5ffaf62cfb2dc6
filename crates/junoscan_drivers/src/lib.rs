pub mod config;
pub mod drivers;
pub mod reply;
mod ssh;

pub use reply::{DeviceReply, ReplyError};

use async_trait::async_trait;
use junoscan_model::{ConnectionParameters, FailureKind, Variant};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcRequest {
    GetSoftwareInformation,
    GetRunningConfig,
}

impl RpcRequest {
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::SoftwareInfo => RpcRequest::GetSoftwareInformation,
            Variant::RunningConfig => RpcRequest::GetRunningConfig,
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            RpcRequest::GetSoftwareInformation => "<get-software-information/>",
            RpcRequest::GetRunningConfig => "<get-config><source><running/></source></get-config>",
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("missing connection parameter '{0}'")]
    MissingParameter(&'static str),
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Authentication(String),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("malformed reply: {0}")]
    MalformedReply(#[from] ReplyError),
    #[error("{0}")]
    Other(String),
}

impl SessionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SessionError::Transport(_) | SessionError::Timeout(_) => FailureKind::Transport,
            SessionError::Authentication(_) => FailureKind::Authentication,
            SessionError::MissingParameter(_)
            | SessionError::Rpc(_)
            | SessionError::MalformedReply(_)
            | SessionError::Other(_) => FailureKind::Other,
        }
    }
}

/// One read-only request per call. Implementations open a session, issue
/// the request and release the session before returning.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(
        &self,
        params: &ConnectionParameters,
        request: RpcRequest,
    ) -> Result<DeviceReply, SessionError>;
}

pub type DynDeviceDriver = Arc<dyn DeviceDriver>;
