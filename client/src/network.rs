//! Connection manager owning the session's single WebSocket transport

use crate::error::ClientError;
use crate::input::CommandSink;
use crate::session::SessionEvent;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode, encode, InboundEvent, OutboundEvent};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, tungstenite};

/// What the transport tasks report back to the session queue
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected { id: String },
    Disconnected { reason: String },
    Inbound(InboundEvent),
}

/// One live transport: the writer queue and the task driving the socket
pub struct Link {
    id: u64,
    url: String,
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    task: JoinHandle<()>,
}

impl Link {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

pub struct ConnectionManager {
    runtime: Handle,
    events: mpsc::UnboundedSender<SessionEvent>,
    link: Option<Link>,
    next_link_id: u64,
    connected: bool,
    session_id: Option<String>,
}

impl ConnectionManager {
    pub fn new(runtime: Handle, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            runtime,
            events,
            link: None,
            next_link_id: 1,
            connected: false,
            session_id: None,
        }
    }

    /// Opens the transport. While one exists this is a no-op returning it.
    pub fn connect(&mut self, url: &str, token: &str) -> Result<&Link, ClientError> {
        let link = match self.link.take() {
            Some(existing) => {
                debug!("Transport to {} already exists, reusing it", existing.url);
                existing
            }
            None => self.open(url, token)?,
        };
        Ok(self.link.insert(link))
    }

    fn open(&mut self, url: &str, token: &str) -> Result<Link, ClientError> {
        let mut request = url.into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ClientError::InvalidToken)?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let id = self.next_link_id;
        self.next_link_id += 1;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = self
            .runtime
            .spawn(run_link(id, request, outbound_rx, self.events.clone()));

        info!("Connecting to {}", url);
        Ok(Link {
            id,
            url: url.to_string(),
            outbound,
            task,
        })
    }

    pub fn link(&self) -> Option<&Link> {
        self.link.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Session identifier assigned by the server on the last handshake
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Applies a transport report. Returns false for reports from a link that
    /// has since been replaced or torn down.
    pub fn on_transport_event(&mut self, link_id: u64, event: &TransportEvent) -> bool {
        if self.link.as_ref().map(Link::id) != Some(link_id) {
            debug!("Ignoring event from stale link {}", link_id);
            return false;
        }

        match event {
            TransportEvent::Connected { id } => {
                info!("Connected! Session ID: {}", id);
                self.connected = true;
                self.session_id = Some(id.clone());
            }
            TransportEvent::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                // The link task has finished; a later connect starts fresh.
                self.link = None;
            }
            TransportEvent::Inbound(_) => {}
        }
        true
    }

    /// Fire-and-forget. Commands are dropped, not queued, while disconnected.
    pub fn send(&mut self, event: OutboundEvent) -> bool {
        let link = match (&self.link, self.connected) {
            (Some(link), true) => link,
            _ => {
                warn!("Not connected, dropping {}", event.name());
                return false;
            }
        };

        let name = event.name();
        if link.outbound.send(event).is_err() {
            warn!("Transport closed, dropping {}", name);
            return false;
        }
        true
    }

    /// Closes the transport and forgets it, so the next connect is fresh
    pub fn teardown(&mut self) {
        if let Some(link) = self.link.take() {
            link.task.abort();
            info!("Closed transport to {}", link.url);
        }
        self.connected = false;
        self.session_id = None;
    }

    #[cfg(test)]
    pub(crate) fn attach_test_link(&mut self) -> (u64, mpsc::UnboundedReceiver<OutboundEvent>) {
        let id = self.next_link_id;
        self.next_link_id += 1;
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = self.runtime.spawn(async {});
        self.link = Some(Link {
            id,
            url: "test".to_string(),
            outbound,
            task,
        });
        (id, outbound_rx)
    }
}

impl CommandSink for ConnectionManager {
    fn send(&mut self, event: OutboundEvent) -> bool {
        ConnectionManager::send(self, event)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.task.abort();
        }
    }
}

fn report(events: &mpsc::UnboundedSender<SessionEvent>, link: u64, event: TransportEvent) -> bool {
    events.send(SessionEvent::Transport { link, event }).is_ok()
}

/// Drives one socket until it closes, the session goes away, or the manager
/// drops the writer queue
async fn run_link(
    link: u64,
    request: tungstenite::handshake::client::Request,
    mut outbound: mpsc::UnboundedReceiver<OutboundEvent>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let stream = match connect_async(request).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            error!("Failed to connect: {}", e);
            report(
                &events,
                link,
                TransportEvent::Disconnected {
                    reason: e.to_string(),
                },
            );
            return;
        }
    };
    let (mut writer, mut reader) = stream.split();

    let reason = loop {
        tokio::select! {
            command = outbound.recv() => {
                let Some(command) = command else {
                    let _ = writer.close().await;
                    return;
                };
                match encode(&command) {
                    Ok(text) => {
                        if let Err(e) = writer.send(Message::Text(text)).await {
                            error!("Error sending {}: {}", command.name(), e);
                            break e.to_string();
                        }
                    }
                    Err(e) => error!("Could not encode {}: {}", command.name(), e),
                }
            },

            message = reader.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => match decode(&text) {
                        Ok(InboundEvent::Connect { id }) => {
                            if !report(&events, link, TransportEvent::Connected { id }) {
                                return;
                            }
                        }
                        Ok(inbound) => {
                            if !report(&events, link, TransportEvent::Inbound(inbound)) {
                                return;
                            }
                        }
                        Err(e) => debug!("Ignoring unrecognised frame: {}", e),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "closed by server".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Error receiving frame: {}", e);
                        break e.to_string();
                    }
                    None => break "connection closed".to_string(),
                }
            },
        }
    };

    report(&events, link, TransportEvent::Disconnected { reason });
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Direction;

    fn manager() -> (ConnectionManager, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (ConnectionManager::new(Handle::current(), events_tx), events_rx)
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_dropped() {
        let (mut manager, _events) = manager();
        assert!(!manager.send(OutboundEvent::CreateBullet {}));

        let (_, mut outbound) = manager.attach_test_link();
        assert!(!manager.is_connected());
        assert!(!manager.send(OutboundEvent::CreateBullet {}));
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connected_link_carries_commands() {
        let (mut manager, _events) = manager();
        let (link, mut outbound) = manager.attach_test_link();

        assert!(manager.on_transport_event(
            link,
            &TransportEvent::Connected {
                id: "abc".to_string()
            }
        ));
        assert!(manager.is_connected());
        assert_eq!(manager.session_id(), Some("abc"));

        let command = OutboundEvent::MovePlayer { dir: Direction::Left };
        assert!(manager.send(command.clone()));
        assert_eq!(outbound.try_recv().unwrap(), command);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (mut manager, _events) = manager();

        let first = manager.connect("ws://127.0.0.1:9", "token").unwrap().id();
        let second = manager.connect("ws://127.0.0.1:9", "other").unwrap().id();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_teardown_allows_fresh_connect() {
        let (mut manager, _events) = manager();
        let first = manager.connect("ws://127.0.0.1:9", "token").unwrap().id();

        manager.teardown();
        assert!(manager.link().is_none());
        assert!(!manager.is_connected());
        assert!(manager.session_id().is_none());

        let second = manager.connect("ws://127.0.0.1:9", "token").unwrap().id();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_stale_link_events_are_ignored() {
        let (mut manager, _events) = manager();
        let (old, _) = manager.attach_test_link();
        manager.teardown();
        let (current, _) = manager.attach_test_link();

        let applied = manager.on_transport_event(
            old,
            &TransportEvent::Connected {
                id: "old".to_string(),
            },
        );
        assert!(!applied);
        assert!(!manager.is_connected());

        manager.on_transport_event(
            current,
            &TransportEvent::Connected {
                id: "new".to_string(),
            },
        );
        assert_eq!(manager.session_id(), Some("new"));
    }

    #[tokio::test]
    async fn test_disconnect_clears_link() {
        let (mut manager, _events) = manager();
        let (link, _) = manager.attach_test_link();
        manager.on_transport_event(
            link,
            &TransportEvent::Connected {
                id: "abc".to_string(),
            },
        );

        manager.on_transport_event(
            link,
            &TransportEvent::Disconnected {
                reason: "bye".to_string(),
            },
        );

        assert!(!manager.is_connected());
        assert!(manager.link().is_none());
        assert!(!manager.send(OutboundEvent::CreateBullet {}));
    }

    #[tokio::test]
    async fn test_failed_connect_reports_disconnect() {
        let (mut manager, mut events) = manager();
        let link = manager.connect("ws://127.0.0.1:9", "token").unwrap().id();

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();

        match event {
            SessionEvent::Transport {
                link: reported,
                event: TransportEvent::Disconnected { .. },
            } => assert_eq!(reported, link),
            other => panic!("Expected a disconnect, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_url_is_an_error() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let mut manager = ConnectionManager::new(runtime.handle().clone(), events_tx);

        assert!(manager.connect("not a url", "token").is_err());
        assert!(manager.link().is_none());
    }
}
