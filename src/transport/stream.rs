use futures::{SinkExt, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::sse::{DEFAULT_EVENT, SseDecoder};
use super::{CommandChannel, TransportError};
use crate::model::InstanceCommand;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SocketState {
    Connecting,
    Open,
    Closed,
}

impl SocketState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Push(Value),
    Broadcast(Value),
    Socket(SocketState),
}

const CLOSE_GRACE: Duration = Duration::from_millis(500);

pub struct StreamClient {
    client: Client,
    base_url: Url,
    push_task: Option<JoinHandle<()>>,
    socket_task: Option<JoinHandle<()>>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    socket_state: Arc<watch::Sender<SocketState>>,
}

impl StreamClient {
    pub fn new(client: Client, base_url: Url) -> Self {
        let (socket_state, _) = watch::channel(SocketState::Closed);
        Self {
            client,
            base_url,
            push_task: None,
            socket_task: None,
            outbound: None,
            socket_state: Arc::new(socket_state),
        }
    }

    pub fn socket_state(&self) -> SocketState {
        *self.socket_state.borrow()
    }

    pub fn connect_push(&mut self, events: mpsc::UnboundedSender<StreamEvent>) {
        self.disconnect_push();

        let url = match push_url(&self.base_url) {
            Ok(url) => url,
            Err(error) => {
                error!("SSE connection error: {error}");
                return;
            }
        };
        let client = self.client.clone();
        self.push_task = Some(tokio::spawn(async move {
            if let Err(error) = run_push_subscription(&client, url, &events).await {
                error!("SSE connection error: {error}");
            }
        }));
    }

    pub fn disconnect_push(&mut self) {
        if let Some(task) = self.push_task.take() {
            task.abort();
            info!("SSE subscription closed");
        }
    }

    pub fn connect_socket(&mut self, events: mpsc::UnboundedSender<StreamEvent>) {
        self.outbound = None;
        if let Some(task) = self.socket_task.take() {
            task.abort();
        }

        let url = match socket_url(&self.base_url) {
            Ok(url) => url,
            Err(error) => {
                error!("WebSocket error: {error}");
                return;
            }
        };
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.outbound = Some(outbound_tx);

        let state = Arc::clone(&self.socket_state);
        publish_state(&state, &events, SocketState::Connecting);
        self.socket_task = Some(tokio::spawn(async move {
            if let Err(error) = run_socket(url, outbound_rx, &state, &events).await {
                error!("WebSocket error: {error}");
            }
            publish_state(&state, &events, SocketState::Closed);
            info!("WebSocket disconnected");
        }));
    }

    // An open socket gets CLOSE_GRACE to send its close frame.
    pub async fn disconnect_socket(&mut self) {
        self.outbound = None;
        if let Some(mut task) = self.socket_task.take() {
            let open = self.socket_state() == SocketState::Open;
            if !open || time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
                task.abort();
            }
        }
        self.socket_state.send_replace(SocketState::Closed);
    }
}

impl CommandChannel for StreamClient {
    fn send_command(&self, command: &InstanceCommand) {
        let outbound = match (&self.outbound, self.socket_state()) {
            (Some(outbound), SocketState::Open) => outbound,
            _ => {
                error!(
                    "WebSocket is not connected, dropping {} for {}",
                    command.action, command.id
                );
                return;
            }
        };

        let payload = match serde_json::to_string(command) {
            Ok(payload) => payload,
            Err(error) => {
                error!("failed to encode command for {}: {error}", command.id);
                return;
            }
        };
        debug!("sending command {payload}");
        if outbound.send(Message::Text(payload.into())).is_err() {
            error!("WebSocket writer is gone, dropping {} for {}", command.action, command.id);
        }
    }
}

fn publish_state(
    state: &watch::Sender<SocketState>,
    events: &mpsc::UnboundedSender<StreamEvent>,
    next: SocketState,
) {
    state.send_replace(next);
    let _ = events.send(StreamEvent::Socket(next));
}

async fn run_push_subscription(
    client: &Client,
    url: Url,
    events: &mpsc::UnboundedSender<StreamEvent>,
) -> Result<(), TransportError> {
    let response = client
        .get(url.clone())
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status { status });
    }
    info!("SSE subscribed to {url}");

    let mut decoder = SseDecoder::default();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for event in decoder.feed(&chunk) {
            if event.event != DEFAULT_EVENT {
                debug!("ignoring SSE event type {} (id {:?})", event.event, event.id);
                continue;
            }
            match serde_json::from_str::<Value>(&event.data) {
                Ok(value) => {
                    if events.send(StreamEvent::Push(value)).is_err() {
                        return Ok(());
                    }
                }
                Err(error) => warn!("dropping malformed SSE payload: {error}"),
            }
        }
    }

    info!("SSE stream ended by server");
    Ok(())
}

async fn run_socket(
    url: Url,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    state: &watch::Sender<SocketState>,
    events: &mpsc::UnboundedSender<StreamEvent>,
) -> Result<(), TransportError> {
    let (socket, _) = connect_async(url.as_str()).await?;
    info!("WebSocket connected to {url}");
    publish_state(state, events, SocketState::Open);

    let (mut write, mut read) = socket.split();
    loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(message) => write.send(message).await?,
                None => {
                    state.send_replace(SocketState::Closed);
                    write.send(Message::Close(None)).await?;
                    return Ok(());
                }
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
                    Ok(value) => {
                        if events.send(StreamEvent::Broadcast(value)).is_err() {
                            return Ok(());
                        }
                    }
                    Err(error) => warn!("dropping malformed socket payload: {error}"),
                },
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(error.into()),
            },
        }
    }
}

fn push_url(base: &Url) -> Result<Url, TransportError> {
    if base.cannot_be_a_base() {
        return Err(TransportError::Address {
            kind: "push",
            url: base.to_string(),
        });
    }
    let mut url = base.clone();
    let path = format!("{}/sse", base.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

fn socket_url(base: &Url) -> Result<Url, TransportError> {
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|()| TransportError::Address {
            kind: "socket",
            url: base.to_string(),
        })?;
    Ok(url)
}
