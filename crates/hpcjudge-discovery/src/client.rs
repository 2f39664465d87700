// crates/hpcjudge-discovery/src/client.rs
// ============================================================================
// Module: HPC Judge Discovery Client
// Description: Read-side HTTP client used by judgers, bridges, and the
// utility CLI to query the discovery mesh.
// Purpose: Wrap `/query`, `/list`, `/add`, `/delete` behind a small typed
// surface with the same access-key header convention as the server.
// Dependencies: reqwest, hpcjudge-core
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use futures_util::SinkExt as _;
use futures_util::StreamExt as _;
use hpcjudge_core::QueryParameters;
use hpcjudge_core::ResponseEnvelope;
use hpcjudge_core::Service;
use rand::seq::SliceRandom as _;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

use crate::error::DiscoveryError;
use crate::protocol::ListResponse;
use crate::protocol::QueryRequest;
use crate::protocol::RegisterAck;
use crate::protocol::RegisterMessage;

// ============================================================================
// SECTION: Client
// ============================================================================

/// A read-side discovery client bound to one or more candidate node
/// addresses. Multi-address clients shuffle candidates and return the
/// first address that answers successfully.
#[derive(Clone)]
pub struct Client {
    addresses: Vec<String>,
    access_key: String,
    http: reqwest::Client,
}

impl Client {
    /// Builds a client over `addresses`, authenticating with `access_key`.
    #[must_use]
    pub fn new(addresses: Vec<String>, access_key: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { addresses, access_key, http }
    }

    /// Returns one service matching `params`, chosen by the responding
    /// node uniformly at random among its candidates.
    ///
    /// # Errors
    /// Returns [`DiscoveryError::NoServiceAvailable`] if no configured
    /// address has a match, or [`DiscoveryError::Transport`] if every
    /// configured address is unreachable.
    pub async fn query_one(&self, params: &QueryParameters) -> Result<Service, DiscoveryError> {
        let mut addresses = self.addresses.clone();
        addresses.shuffle(&mut rand::thread_rng());
        let mut last_transport_error = None;
        for address in addresses {
            let url = format!("{address}/query");
            let response = self
                .http
                .post(&url)
                .header("X-Access-Key", &self.access_key)
                .json(&QueryRequest { params: params.clone() })
                .send()
                .await;
            match response {
                Ok(response) => {
                    let envelope: ResponseEnvelope<Service> = response.json().await?;
                    if envelope.success {
                        if let Some(service) = envelope.data {
                            return Ok(service);
                        }
                    }
                }
                Err(err) => last_transport_error = Some(err),
            }
        }
        match last_transport_error {
            Some(err) => Err(DiscoveryError::Transport(err)),
            None => Err(DiscoveryError::NoServiceAvailable),
        }
    }

    /// Returns every service matching `params` from the first address
    /// that answers.
    ///
    /// # Errors
    /// Returns [`DiscoveryError::Transport`] if every configured address
    /// is unreachable.
    pub async fn list(&self, params: &QueryParameters) -> Result<Vec<Service>, DiscoveryError> {
        let mut last_transport_error = None;
        for address in &self.addresses {
            let url = format!("{address}/list");
            let response = self
                .http
                .post(&url)
                .header("X-Access-Key", &self.access_key)
                .json(&QueryRequest { params: params.clone() })
                .send()
                .await;
            match response {
                Ok(response) => {
                    let body: ListResponse = response.json().await?;
                    return Ok(body.services);
                }
                Err(err) => last_transport_error = Some(err),
            }
        }
        Err(last_transport_error.map(DiscoveryError::Transport).unwrap_or(DiscoveryError::NoServiceAvailable))
    }
}

// ============================================================================
// SECTION: Register Session (write side)
// ============================================================================

type Socket = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A long-lived `WS /register` session: the write side a service uses to
/// hold its own registration open for the lifetime of its process.
///
/// Connecting informs and adds the service; dropping the session (or
/// calling [`RegisterSession::close`] explicitly) tells the server to
/// delete it, matching the server's disconnect-deletes-registration
/// behaviour.
pub struct RegisterSession {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl RegisterSession {
    /// Connects to `address`, informs and adds `service`, and keeps the
    /// channel alive with a `Noop` every `keepalive` until the session is
    /// dropped or closed.
    ///
    /// # Errors
    /// Returns [`DiscoveryError::WebSocket`] if the connection cannot be
    /// established, or [`DiscoveryError::PeerRequestFailed`] if the server
    /// rejects the inform or add step.
    pub async fn connect(address: &str, access_key: &str, service: Service, keepalive: Duration) -> Result<Self, DiscoveryError> {
        let url = register_url(address, access_key);
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await?;

        send_message(&mut socket, &RegisterMessage::Inform { service }).await?;
        let inform_ack = recv_ack(&mut socket).await?;
        if !inform_ack.success {
            return Err(DiscoveryError::PeerRequestFailed(inform_ack.error.unwrap_or_default()));
        }

        send_message(&mut socket, &RegisterMessage::Add).await?;
        let add_ack = recv_ack(&mut socket).await?;
        if !add_ack.success {
            return Err(DiscoveryError::PeerRequestFailed(add_ack.error.unwrap_or_default()));
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(keepalive_loop(socket, keepalive, shutdown_rx));
        Ok(Self { shutdown: Some(shutdown_tx), task: Some(task) })
    }

    /// Sends `Delete` and closes the channel, waiting for the background
    /// keepalive task to finish. Prefer this over letting the session drop
    /// when the caller can await a clean shutdown.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RegisterSession {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn keepalive_loop(mut socket: Socket, interval: Duration, mut shutdown: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if send_message(&mut socket, &RegisterMessage::Noop).await.is_err() {
                    break;
                }
                if recv_ack(&mut socket).await.is_err() {
                    break;
                }
            }
            _ = &mut shutdown => {
                let _ = send_message(&mut socket, &RegisterMessage::Delete).await;
                let _ = recv_ack(&mut socket).await;
                break;
            }
        }
    }
    let _ = socket.close(None).await;
}

async fn send_message(socket: &mut Socket, message: &RegisterMessage) -> Result<(), DiscoveryError> {
    let text = serde_json::to_string(message)?;
    socket.send(Message::Text(text.into())).await?;
    Ok(())
}

async fn recv_ack(socket: &mut Socket) -> Result<RegisterAck, DiscoveryError> {
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
            Some(Ok(_)) => continue,
            Some(Err(err)) => return Err(DiscoveryError::from(err)),
            None => return Err(DiscoveryError::RegisterChannelClosed),
        }
    }
}

/// Rewrites an `http(s)://` address into the matching `ws(s)://` scheme
/// and appends the register path and access key query parameter.
fn register_url(address: &str, access_key: &str) -> String {
    let ws_address = address
        .strip_prefix("https://")
        .map(|rest| format!("wss://{rest}"))
        .or_else(|| address.strip_prefix("http://").map(|rest| format!("ws://{rest}")))
        .unwrap_or_else(|| address.to_string());
    format!("{ws_address}/register?access-key={access_key}")
}

#[cfg(test)]
mod tests {
    use super::register_url;

    #[test]
    fn rewrites_http_scheme_to_ws() {
        assert_eq!(register_url("http://disco-1:8500", "k"), "ws://disco-1:8500/register?access-key=k");
    }

    #[test]
    fn rewrites_https_scheme_to_wss() {
        assert_eq!(register_url("https://disco-1:8500", "k"), "wss://disco-1:8500/register?access-key=k");
    }
}
