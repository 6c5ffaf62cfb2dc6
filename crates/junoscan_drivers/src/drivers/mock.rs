use crate::{DeviceDriver, DeviceReply, ReplyError, RpcRequest, SessionError};
use async_trait::async_trait;
use junoscan_model::ConnectionParameters;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

pub const MOCK_JUNOS_VERSION: &str = "21.4R3-S5";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Reply,
    TransportFailure,
    AuthFailure,
    OtherFailure,
    MissingFields,
    Hang,
}

impl MockBehavior {
    /// Behavior picked from markers in the host name, so inventories can
    /// script failures without code.
    pub fn from_host(host: &str) -> Self {
        if host.contains("unreachable") {
            MockBehavior::TransportFailure
        } else if host.contains("denied") {
            MockBehavior::AuthFailure
        } else if host.contains("broken") {
            MockBehavior::OtherFailure
        } else if host.contains("garbled") {
            MockBehavior::MissingFields
        } else if host.contains("hang") {
            MockBehavior::Hang
        } else {
            MockBehavior::Reply
        }
    }
}

#[derive(Clone, Default)]
pub struct MockDriver {
    scripted: HashMap<String, MockBehavior>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(mut self, host: impl Into<String>, behavior: MockBehavior) -> Self {
        self.scripted.insert(host.into(), behavior);
        self
    }

    /// Hosts contacted so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn behavior(&self, host: &str) -> MockBehavior {
        self.scripted
            .get(host)
            .copied()
            .unwrap_or_else(|| MockBehavior::from_host(host))
    }
}

#[async_trait]
impl DeviceDriver for MockDriver {
    fn name(&self) -> &'static str {
        "Mock Driver"
    }

    async fn fetch(
        &self,
        params: &ConnectionParameters,
        request: RpcRequest,
    ) -> Result<DeviceReply, SessionError> {
        let host = params
            .host()
            .ok_or(SessionError::MissingParameter(junoscan_model::HOST_KEY))?;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(host.clone());
        }

        match self.behavior(&host) {
            MockBehavior::Reply => {
                DeviceReply::parse(&canned_reply(&host, request)).map_err(SessionError::from)
            }
            MockBehavior::TransportFailure => Err(SessionError::Transport(format!(
                "Connection refused (os error 111) to {}:{}",
                host,
                params.port()
            ))),
            MockBehavior::AuthFailure => Err(SessionError::Authentication(
                "Password authentication failed".into(),
            )),
            MockBehavior::OtherFailure => Err(SessionError::Other("mock driver failure".into())),
            MockBehavior::MissingFields => {
                DeviceReply::parse("<rpc-reply><ok/></rpc-reply>").map_err(SessionError::from)
            }
            MockBehavior::Hang => {
                sleep(Duration::from_secs(3600)).await;
                Err(SessionError::MalformedReply(ReplyError::Xml(
                    "mock hang elapsed".into(),
                )))
            }
        }
    }
}

pub fn mock_hostname(host: &str) -> String {
    format!("mock-{}", host.replace('.', "-"))
}

fn canned_reply(host: &str, request: RpcRequest) -> String {
    let hostname = mock_hostname(host);
    match request {
        RpcRequest::GetSoftwareInformation => format!(
            r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="1">
<software-information>
<host-name>{hostname}</host-name>
<product-model>vmx</product-model>
<junos-version>{MOCK_JUNOS_VERSION}</junos-version>
</software-information>
</rpc-reply>"#
        ),
        RpcRequest::GetRunningConfig => format!(
            r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="1">
<data>
<configuration>
<version>{MOCK_JUNOS_VERSION}</version>
<system><host-name>{hostname}</host-name></system>
</configuration>
</data>
</rpc-reply>"#
        ),
    }
}
