use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use super::messages::OutgoingFrame;
use super::reconnect::{BackoffPolicy, Reconnector};
use super::{CloseReason, ConnectionState, ConnectionStatus};
use crate::error::TransportError;
use crate::health::HealthProbe;
use crate::traits::{FrameSink, HttpClient, SendOutcome};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Socket URL and its sibling health endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub socket: Url,
    pub health: Url,
}

/// Resolve user input into socket and health URLs.
///
/// Accepts `ws://`, `wss://`, `http://`, `https://` or a bare `host:port`.
/// http(s) maps to ws(s) and an empty path becomes `/ws`. The health URL
/// keeps the origin with an http(s) scheme and path `/health`.
pub fn resolve_endpoints(input: &str) -> Result<Endpoints, TransportError> {
    let trimmed = input.trim();
    let invalid = |message: String| TransportError::InvalidUrl {
        url: trimmed.to_string(),
        message,
    };
    if trimmed.is_empty() {
        return Err(invalid("empty url".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("ws://{}", trimmed)
    };
    let mut socket = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;

    let (ws_scheme, http_scheme) = match socket.scheme() {
        "ws" | "http" => ("ws", "http"),
        "wss" | "https" => ("wss", "https"),
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    if socket.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    socket
        .set_scheme(ws_scheme)
        .map_err(|_| invalid("cannot set scheme".to_string()))?;
    if socket.path().is_empty() || socket.path() == "/" {
        socket.set_path("/ws");
    }

    let mut health = socket.clone();
    health
        .set_scheme(http_scheme)
        .map_err(|_| invalid("cannot set scheme".to_string()))?;
    health.set_path("/health");
    health.set_query(None);
    health.set_fragment(None);

    Ok(Endpoints { socket, health })
}

/// Timing for the connection task
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub backoff: BackoffPolicy,
    /// A connection must stay open this long before failures reset
    pub grace_window: Duration,
    pub connect_timeout: Duration,
    pub probe_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            grace_window: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            probe_interval: Duration::from_secs(30),
        }
    }
}

/// Events delivered to the session, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    /// One raw text frame
    Frame(String),
    Closed(CloseReason),
}

#[derive(Debug)]
enum Command {
    Connect(Endpoints),
    Reconnect,
    Shutdown,
}

/// Spawns the connection task.
pub struct WsClient;

impl WsClient {
    /// Start the connection task without connecting.
    ///
    /// Returns the handle used to drive it and the receiver for transport
    /// events. With an HTTP client the health endpoint is probed while
    /// disconnected.
    pub fn spawn(
        config: TransportConfig,
        http: Option<Arc<dyn HttpClient>>,
    ) -> (WsHandle, mpsc::Receiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(256);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<OutgoingFrame>();
        let (state_tx, state_rx) = watch::channel(ConnectionState::default());

        let task = ConnectionTask {
            reconnector: Reconnector::new(config.backoff, config.grace_window),
            config,
            http,
            endpoints: None,
            link: None,
            event_tx,
            state_tx,
            last_error: None,
        };
        tokio::spawn(task.run(cmd_rx, outgoing_rx));

        (
            WsHandle {
                cmd_tx,
                outgoing_tx,
                state_rx,
            },
            event_rx,
        )
    }
}

/// Cheap, cloneable handle to the connection task
#[derive(Debug, Clone)]
pub struct WsHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    outgoing_tx: mpsc::UnboundedSender<OutgoingFrame>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl WsHandle {
    /// Connect to `url`. A no-op while already connecting or connected.
    pub fn connect(&self, url: &str) -> Result<(), TransportError> {
        let endpoints = resolve_endpoints(url)?;
        self.cmd_tx
            .send(Command::Connect(endpoints))
            .map_err(|_| TransportError::TaskStopped)
    }

    /// Drop any pending backoff and retry immediately.
    pub fn reconnect(&self) -> Result<(), TransportError> {
        self.cmd_tx
            .send(Command::Reconnect)
            .map_err(|_| TransportError::TaskStopped)
    }

    /// Close the socket and stop the connection task.
    pub fn shutdown(&self) {
        info!("Shutting down transport");
        let _ = self.cmd_tx.send(Command::Shutdown);
    }

    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to connection state changes
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }
}

impl FrameSink for WsHandle {
    fn send(&self, frame: OutgoingFrame) -> SendOutcome {
        let status = self.state_rx.borrow().status;
        if status != ConnectionStatus::Connected {
            warn!("Not connected ({}), dropping {} frame", status, frame.tag());
            return SendOutcome::NotConnected;
        }
        match self.outgoing_tx.send(frame) {
            Ok(()) => SendOutcome::Sent,
            Err(e) => {
                warn!("Transport task stopped, dropping {} frame", e.0.tag());
                SendOutcome::NotConnected
            }
        }
    }

    fn status(&self) -> ConnectionStatus {
        self.state_rx.borrow().status
    }
}

struct Link {
    sink: WsSink,
    source: WsSource,
}

struct ConnectionTask {
    config: TransportConfig,
    reconnector: Reconnector,
    http: Option<Arc<dyn HttpClient>>,
    endpoints: Option<Endpoints>,
    link: Option<Link>,
    event_tx: mpsc::Sender<TransportEvent>,
    state_tx: watch::Sender<ConnectionState>,
    last_error: Option<String>,
}

impl ConnectionTask {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut outgoing_rx: mpsc::UnboundedReceiver<OutgoingFrame>,
    ) {
        let (alive_tx, mut alive_rx) = mpsc::channel::<()>(1);

        loop {
            let backoff_at = self.reconnector.backoff_deadline();
            let grace_at = self.reconnector.grace_deadline();
            let far = Instant::now() + Duration::from_secs(86_400);

            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Connect(endpoints)) => {
                            if !self.reconnector.start() {
                                debug!("Connect ignored, already started");
                                continue;
                            }
                            if let Some(http) = &self.http {
                                let probe = HealthProbe::new(http.clone(), &endpoints.health);
                                tokio::spawn(run_probe(
                                    probe,
                                    self.config.probe_interval,
                                    self.state_tx.subscribe(),
                                    alive_tx.clone(),
                                ));
                            }
                            self.endpoints = Some(endpoints);
                            if !self.open().await {
                                break;
                            }
                        }
                        Some(Command::Reconnect) => {
                            if self.link.is_some() {
                                info!("Manual reconnect, closing current socket");
                                self.close_link().await;
                                if !self.emit(TransportEvent::Closed(CloseReason::Normal)).await {
                                    break;
                                }
                            }
                            if self.reconnector.manual_reconnect() && !self.open().await {
                                break;
                            }
                        }
                        Some(Command::Shutdown) | None => {
                            debug!("Shutdown requested, closing connection");
                            self.close_link().await;
                            break;
                        }
                    }
                }
                frame = outgoing_rx.recv() => {
                    let Some(frame) = frame else { break };
                    self.write(frame).await;
                }
                msg = next_message(&mut self.link) => {
                    if !self.on_message(msg).await {
                        break;
                    }
                }
                _ = sleep_until(backoff_at.unwrap_or(far)), if backoff_at.is_some() => {
                    if self.reconnector.backoff_elapsed(Instant::now()) && !self.open().await {
                        break;
                    }
                }
                _ = sleep_until(grace_at.unwrap_or(far)), if grace_at.is_some() => {
                    if self.reconnector.settle(Instant::now()) {
                        self.publish(ConnectionStatus::Connected);
                    }
                }
                Some(()) = alive_rx.recv() => {
                    if self.reconnector.on_probe_alive() && !self.open().await {
                        break;
                    }
                }
            }
        }

        info!("Connection loop ended");
        self.publish(ConnectionStatus::Disconnected);
    }

    /// One connect attempt. Returns false once the event receiver is gone.
    async fn open(&mut self) -> bool {
        let Some(endpoints) = self.endpoints.clone() else {
            return true;
        };
        self.publish(ConnectionStatus::Connecting);
        let url = endpoints.socket.as_str();
        debug!("Connecting to {}", url);

        let attempt = tokio::time::timeout(self.config.connect_timeout, connect_async(url)).await;
        let reason = match attempt {
            Ok(Ok((stream, _))) => {
                info!("Connected to WebSocket server at {}", url);
                let (sink, source) = stream.split();
                self.link = Some(Link { sink, source });
                self.last_error = None;
                self.reconnector.on_connected(Instant::now());
                self.publish(ConnectionStatus::Connected);
                return self.emit(TransportEvent::Opened).await;
            }
            Ok(Err(e)) => {
                let err = TransportError::ConnectionFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                };
                warn!("{}", err);
                self.last_error = Some(err.user_message());
                CloseReason::Error
            }
            Err(_) => {
                let err = TransportError::Timeout {
                    url: url.to_string(),
                    duration_secs: self.config.connect_timeout.as_secs(),
                };
                warn!("{}", err);
                self.last_error = Some(err.user_message());
                CloseReason::Timeout
            }
        };

        if !self.emit(TransportEvent::Closed(reason)).await {
            return false;
        }
        self.reconnector.on_connect_failed(Instant::now());
        self.publish(ConnectionStatus::Disconnected);
        true
    }

    async fn on_message(
        &mut self,
        msg: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) -> bool {
        match msg {
            Some(Ok(Message::Text(text))) => self.emit(TransportEvent::Frame(text)).await,
            Some(Ok(Message::Ping(data))) => {
                debug!("Received ping, sending pong");
                if let Some(link) = self.link.as_mut() {
                    let _ = link.sink.send(Message::Pong(data)).await;
                }
                true
            }
            Some(Ok(Message::Close(_))) => {
                info!("Received close frame from server");
                self.closed(CloseReason::Normal, None).await
            }
            Some(Ok(_)) => {
                // Binary, Pong and raw frames carry nothing for us
                true
            }
            Some(Err(e)) => {
                error!("WebSocket error: {}", e);
                let err = TransportError::Socket {
                    message: e.to_string(),
                };
                self.closed(CloseReason::Error, Some(err.user_message())).await
            }
            None => {
                info!("WebSocket stream ended");
                self.closed(CloseReason::Normal, None).await
            }
        }
    }

    async fn closed(&mut self, reason: CloseReason, error: Option<String>) -> bool {
        self.link = None;
        if error.is_some() {
            self.last_error = error;
        }
        if !self.emit(TransportEvent::Closed(reason)).await {
            return false;
        }
        self.reconnector.on_closed(Instant::now());
        self.publish(ConnectionStatus::Disconnected);
        true
    }

    async fn write(&mut self, frame: OutgoingFrame) {
        let Some(link) = self.link.as_mut() else {
            warn!("Socket closed before {} frame was written, dropping", frame.tag());
            return;
        };
        match serde_json::to_string(&frame) {
            Ok(json) => {
                debug!("Sending frame: {}", json);
                if let Err(e) = link.sink.send(Message::Text(json)).await {
                    // The read side reports the failure and schedules the reconnect
                    error!("Failed to send frame: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize {} frame: {}", frame.tag(), e),
        }
    }

    async fn close_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            let _ = link.sink.close().await;
        }
    }

    async fn emit(&self, event: TransportEvent) -> bool {
        if self.event_tx.send(event).await.is_err() {
            warn!("Event receiver dropped, stopping transport");
            return false;
        }
        true
    }

    fn publish(&self, status: ConnectionStatus) {
        let state = ConnectionState {
            status,
            last_error: self.last_error.clone(),
            consecutive_failures: self.reconnector.consecutive_failures(),
        };
        self.state_tx.send_replace(state);
    }
}

async fn next_message(
    link: &mut Option<Link>,
) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
    match link.as_mut() {
        Some(link) => link.source.next().await,
        None => std::future::pending().await,
    }
}

/// Poll the health endpoint while disconnected; report when it answers.
async fn run_probe(
    probe: HealthProbe,
    interval: Duration,
    state_rx: watch::Receiver<ConnectionState>,
    alive_tx: mpsc::Sender<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if alive_tx.is_closed() {
            break;
        }
        if state_rx.borrow().status != ConnectionStatus::Disconnected {
            continue;
        }
        if probe.is_alive().await {
            match alive_tx.try_send(()) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => break,
            }
        }
    }
    debug!("Health probe stopped");
}
