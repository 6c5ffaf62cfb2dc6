use crate::SessionError;
use async_ssh2_tokio::{AuthMethod, Client, ServerCheckMethod};
use junoscan_model::{ConnectionParameters, HOST_KEY, PASSWORD_KEY, USERNAME_KEY};
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::fs;

pub async fn connect(params: &ConnectionParameters) -> Result<Client, SessionError> {
    let host = params
        .host()
        .ok_or(SessionError::MissingParameter(HOST_KEY))?;
    let username = params
        .username()
        .ok_or(SessionError::MissingParameter(USERNAME_KEY))?;
    let auth = auth_method(params).await?;

    let target = SocketAddr::from_str(&host)
        .map(TargetAddr::Socket)
        .unwrap_or_else(|_| TargetAddr::HostPort(host.clone(), params.port()));

    let server_check = if params.hostkey_verify() {
        ServerCheckMethod::DefaultKnownHostsFile
    } else {
        ServerCheckMethod::NoCheck
    };

    match target {
        TargetAddr::Socket(addr) => Client::connect(addr, &username, auth, server_check).await,
        TargetAddr::HostPort(host, port) => {
            Client::connect((host.as_str(), port), &username, auth, server_check).await
        }
    }
    .map_err(classify)
}

enum TargetAddr {
    Socket(SocketAddr),
    HostPort(String, u16),
}

async fn auth_method(params: &ConnectionParameters) -> Result<AuthMethod, SessionError> {
    if let Some(key_path) = params.ssh_private_key_file() {
        let key_content = fs::read_to_string(&key_path)
            .await
            .map_err(|err| SessionError::Other(format!("reading ssh key {}: {}", key_path, err)))?;
        let passphrase = params.password();
        return Ok(AuthMethod::with_key(&key_content, passphrase.as_deref()));
    }
    let password = params
        .password()
        .ok_or(SessionError::MissingParameter(PASSWORD_KEY))?;
    Ok(AuthMethod::with_password(&password))
}

fn classify(err: async_ssh2_tokio::Error) -> SessionError {
    match &err {
        async_ssh2_tokio::Error::PasswordWrong | async_ssh2_tokio::Error::KeyAuthFailed => {
            SessionError::Authentication(err.to_string())
        }
        async_ssh2_tokio::Error::KeyInvalid(_) => SessionError::Other(err.to_string()),
        _ => SessionError::Transport(err.to_string()),
    }
}
