use crate::{ssh, DeviceDriver, DeviceReply, RpcRequest, SessionError};
use async_ssh2_tokio::Client;
use async_trait::async_trait;
use junoscan_model::ConnectionParameters;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

const NETCONF_EOM: &str = "]]>]]>";

const CLIENT_HELLO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
  <capabilities>
    <capability>urn:ietf:params:netconf:base:1.0</capability>
  </capabilities>
</hello>]]>]]>"#;

trait NetconfIo: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T> NetconfIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

#[derive(Debug, Clone, Default)]
pub struct JunosNetconfDriver;

#[async_trait]
impl DeviceDriver for JunosNetconfDriver {
    fn name(&self) -> &'static str {
        "Juniper Junos NETCONF"
    }

    async fn fetch(
        &self,
        params: &ConnectionParameters,
        request: RpcRequest,
    ) -> Result<DeviceReply, SessionError> {
        let host = params.display_host();
        if let Some(profile) = params.device_profile() {
            debug!(target: "drivers::junos", "{} device profile {}", host, profile);
        }

        let client = ssh::connect(params).await?;
        let result = run_session(&client, &host, request).await;
        if let Err(err) = client.disconnect().await {
            warn!(target: "drivers::junos", "{} disconnect: {}", host, err);
        }
        result
    }
}

async fn run_session(
    client: &Client,
    host: &str,
    request: RpcRequest,
) -> Result<DeviceReply, SessionError> {
    let channel = client
        .get_channel()
        .await
        .map_err(|err| SessionError::Transport(format!("netconf channel: {err}")))?;
    channel
        .request_subsystem(true, "netconf")
        .await
        .map_err(|err| SessionError::Transport(format!("netconf subsystem denied: {err}")))?;
    let mut session = NetconfSession::new(Box::pin(channel.into_stream()));
    session.hello().await?;
    info!(target: "drivers::junos", "{} session open, sending {:?}", host, request);
    session.exchange(host, request).await
}

/// Framing and message exchange over an open `netconf` subsystem stream.
struct NetconfSession {
    stream: Pin<Box<dyn NetconfIo>>,
    next_id: u32,
}

impl NetconfSession {
    fn new(stream: Pin<Box<dyn NetconfIo>>) -> Self {
        Self { stream, next_id: 1 }
    }

    async fn hello(&mut self) -> Result<String, SessionError> {
        self.write(CLIENT_HELLO).await?;
        self.read_reply().await
    }

    /// One request, then `<close-session/>` regardless of how the request went.
    async fn exchange(
        &mut self,
        host: &str,
        request: RpcRequest,
    ) -> Result<DeviceReply, SessionError> {
        let raw = self.rpc(request.body()).await;
        self.close(host).await;

        let reply = DeviceReply::parse(&raw?)?;
        if let Some(message) = reply.rpc_error() {
            return Err(SessionError::Rpc(message));
        }
        Ok(reply)
    }

    async fn rpc(&mut self, inner: &str) -> Result<String, SessionError> {
        let message_id = self.next_id;
        self.next_id += 1;
        let payload = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><rpc message-id="{message_id}" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">{inner}</rpc>{NETCONF_EOM}"#
        );
        self.write(&payload).await?;
        self.read_reply().await
    }

    /// Best effort: the session is going away whether or not the device
    /// acknowledges the close.
    async fn close(&mut self, host: &str) {
        if let Err(err) = self.rpc("<close-session/>").await {
            debug!(target: "drivers::junos", "{} close-session: {}", host, err);
        }
    }

    async fn write(&mut self, payload: &str) -> Result<(), SessionError> {
        self.stream
            .as_mut()
            .write_all(payload.as_bytes())
            .await
            .map_err(|err| SessionError::Transport(format!("write netconf frame: {err}")))?;
        self.stream
            .as_mut()
            .flush()
            .await
            .map_err(|err| SessionError::Transport(format!("flush netconf frame: {err}")))
    }

    async fn read_reply(&mut self) -> Result<String, SessionError> {
        let mut buf = Vec::new();
        let mut chunk = vec![0u8; 4096];
        loop {
            let read = self
                .stream
                .as_mut()
                .read(&mut chunk)
                .await
                .map_err(|err| SessionError::Transport(format!("read netconf frame: {err}")))?;
            if read == 0 {
                return Err(SessionError::Transport("netconf stream closed".into()));
            }
            buf.extend_from_slice(&chunk[..read]);
            if let Some(end) = frame_end(&buf) {
                buf.truncate(end);
                break;
            }
        }
        String::from_utf8(buf).map_err(|_| SessionError::Other("netconf reply not utf8".into()))
    }
}

/// Offset of the end-of-message marker, tolerating trailing whitespace after it.
fn frame_end(buf: &[u8]) -> Option<usize> {
    let trimmed = buf
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|idx| idx + 1)?;
    let marker = NETCONF_EOM.as_bytes();
    if trimmed >= marker.len() && &buf[trimmed - marker.len()..trimmed] == marker {
        Some(trimmed - marker.len())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;

    const SERVER_HELLO: &str = "<hello><capabilities><capability>urn:ietf:params:netconf:base:1.0</capability></capabilities><session-id>42</session-id></hello>";
    const SOFTWARE_REPLY: &str = r#"<rpc-reply message-id="1"><software-information><host-name>edge-j1</host-name><junos-version>21.4R3-S5</junos-version></software-information></rpc-reply>"#;
    const ERROR_REPLY: &str = r#"<rpc-reply message-id="1"><rpc-error><error-severity>error</error-severity><error-message>permission denied</error-message></rpc-error></rpc-reply>"#;
    const CLOSE_REPLY: &str = r#"<rpc-reply message-id="2"><ok/></rpc-reply>"#;

    async fn read_frame(io: &mut DuplexStream) -> Option<String> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 512];
        loop {
            let read = io.read(&mut chunk).await.ok()?;
            if read == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..read]);
            if let Some(end) = frame_end(&buf) {
                buf.truncate(end);
                return String::from_utf8(buf).ok();
            }
        }
    }

    /// Answers each client frame with the next reply and hands back what it received.
    fn serve(mut io: DuplexStream, replies: Vec<&'static str>) -> JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut received = Vec::new();
            for reply in replies {
                let Some(frame) = read_frame(&mut io).await else {
                    break;
                };
                received.push(frame);
                let framed = format!("{reply}{NETCONF_EOM}\n");
                if io.write_all(framed.as_bytes()).await.is_err() {
                    break;
                }
            }
            received
        })
    }

    fn session(io: DuplexStream) -> NetconfSession {
        NetconfSession::new(Box::pin(io))
    }

    #[test]
    fn frame_end_finds_marker() {
        assert_eq!(frame_end(b"<rpc-reply/>]]>]]>"), Some(12));
        assert_eq!(frame_end(b"<rpc-reply/>]]>]]>\n"), Some(12));
        assert_eq!(frame_end(b"<rpc-reply/>]]>"), None);
        assert_eq!(frame_end(b""), None);
    }

    #[test]
    fn hello_is_framed() {
        assert!(CLIENT_HELLO.ends_with(NETCONF_EOM));
        assert!(CLIENT_HELLO.contains("urn:ietf:params:netconf:base:1.0"));
    }

    #[tokio::test]
    async fn exchange_sends_hello_rpc_then_close_session() {
        let (client, server) = duplex(8192);
        let device = serve(server, vec![SERVER_HELLO, SOFTWARE_REPLY, CLOSE_REPLY]);

        let mut session = session(client);
        let hello = session.hello().await.expect("hello");
        assert!(hello.contains("<session-id>42</session-id>"));
        let reply = session
            .exchange("edge-j1", RpcRequest::GetSoftwareInformation)
            .await
            .expect("reply");
        assert_eq!(reply.leaf("software-information/host-name"), Ok("edge-j1"));
        drop(session);

        let frames = device.await.expect("server task");
        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains("<hello"));
        assert!(frames[1].contains(r#"<rpc message-id="1""#));
        assert!(frames[1].contains("<get-software-information/>"));
        assert!(frames[2].contains(r#"<rpc message-id="2""#));
        assert!(frames[2].contains("<close-session/>"));
    }

    #[tokio::test]
    async fn close_session_follows_an_rpc_error() {
        let (client, server) = duplex(8192);
        let device = serve(server, vec![SERVER_HELLO, ERROR_REPLY, CLOSE_REPLY]);

        let mut session = session(client);
        session.hello().await.expect("hello");
        let err = session
            .exchange("edge-j1", RpcRequest::GetRunningConfig)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Rpc(ref message) if message == "permission denied"));
        drop(session);

        let frames = device.await.expect("server task");
        assert_eq!(frames.len(), 3);
        assert!(frames[1].contains("<get-config><source><running/></source></get-config>"));
        assert!(frames[2].contains(r#"<rpc message-id="2""#));
        assert!(frames[2].contains("<close-session/>"));
    }

    #[tokio::test]
    async fn reply_split_across_reads_is_joined() {
        let (client, mut server) = duplex(1024);
        let interfaces: String = (0..400)
            .map(|idx| format!("<interface><name>ge-0/0/{idx}</name></interface>"))
            .collect();
        let body = format!(
            "<rpc-reply><data><configuration>{interfaces}</configuration></data></rpc-reply>"
        );
        assert!(body.len() > 3 * 4096);

        let framed = format!("{body}{NETCONF_EOM}\n");
        let writer = tokio::spawn(async move {
            for piece in framed.as_bytes().chunks(700) {
                server.write_all(piece).await.expect("write piece");
                tokio::task::yield_now().await;
            }
            server
        });

        let mut session = session(client);
        let raw = session.read_reply().await.expect("reply");
        assert_eq!(raw, body);
        writer.await.expect("writer task");
    }

    #[tokio::test]
    async fn early_eof_is_a_transport_error() {
        let (client, mut server) = duplex(1024);
        server
            .write_all(b"<rpc-reply><software-information>")
            .await
            .expect("write partial");
        drop(server);

        let mut session = session(client);
        let err = session.read_reply().await.unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
    }
}
