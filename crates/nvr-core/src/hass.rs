//! Home Assistant websocket client for the `media_source` commands.
//!
//! Architecture:
//!
//! ```text
//!   HassClient::connection()      (lazy, reconnects once the socket is gone)
//!         │
//!         ├── writer_task   ← receives PendingRequest via mpsc, assigns id → socket
//!         └── reader_task   ← reads result frames
//!                                └── result (has id) → matched oneshot::Sender
//! ```
//!
//! Ids are assigned by the writer so they reach the server strictly increasing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use nvr_proto::protocol::{
    Auth, BrowseMedia, Command, ErrorPayload, Request, ResolvedMedia, ServerMessage,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use crate::source::{MediaSource, SourceError};

/// Connection-level failures.
#[derive(Debug, Error)]
pub enum HassError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("authentication rejected: {0}")]
    AuthInvalid(String),

    #[error("unexpected message during auth: {0}")]
    Handshake(String),

    #[error("connection closed")]
    Closed,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single command's failure: either the server said no, or we never got an answer.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("{}: {}", .0.code, .0.message)]
    Rejected(ErrorPayload),

    #[error(transparent)]
    Hass(#[from] HassError),
}

impl CallError {
    fn into_source_error(self, content_id: &str) -> SourceError {
        match self {
            CallError::Rejected(payload) if payload.is_not_found() => {
                SourceError::not_found(content_id)
            }
            other => SourceError::transport(content_id, other),
        }
    }
}

type Reply = Result<Value, CallError>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

struct PendingRequest {
    command: Command,
    reply: oneshot::Sender<Reply>,
}

#[derive(Clone)]
struct Connection {
    tx: mpsc::Sender<PendingRequest>,
    pending: PendingMap,
}

impl Connection {
    /// Drops entries whose caller stopped waiting (timed out).
    async fn forget_abandoned(&self) {
        let mut map = self.pending.lock().await;
        let before = map.len();
        map.retain(|_, tx| !tx.is_closed());
        if map.len() < before {
            debug!("hass: dropped {} abandoned request(s)", before - map.len());
        }
    }
}

pub struct HassClient {
    url: String,
    token: String,
    timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl HassClient {
    /// Does not connect; the first request (or [`HassClient::connect`]) does.
    pub fn new(url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            timeout,
            conn: Mutex::new(None),
        }
    }

    /// Connects and authenticates now instead of on first use.
    pub async fn connect(&self) -> Result<(), HassError> {
        self.connection().await.map(|_| ())
    }

    async fn connection(&self) -> Result<Connection, HassError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            if !conn.tx.is_closed() {
                return Ok(conn.clone());
            }
            info!("hass: connection lost, reconnecting");
        }

        let conn = open(&self.url, &self.token).await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Sends one command and waits for its result payload.
    pub async fn call(&self, command: Command) -> Result<Value, CallError> {
        let conn = self.connection().await?;

        let (reply_tx, reply_rx) = oneshot::channel();
        conn.tx
            .send(PendingRequest {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| HassError::Closed)?;

        // reply_rx is dropped here, closing the sender left in the pending map
        let reply = tokio::time::timeout(self.timeout, reply_rx).await;
        match reply {
            Ok(reply) => reply.map_err(|_| HassError::Closed)?,
            Err(_) => {
                warn!("hass: request timed out after {:?}", self.timeout);
                conn.forget_abandoned().await;
                Err(HassError::Timeout(self.timeout).into())
            }
        }
    }

    /// Requests sent and still waiting for a result.
    pub async fn pending_requests(&self) -> usize {
        let conn = self.conn.lock().await.clone();
        match conn {
            Some(conn) => conn.pending.lock().await.len(),
            None => 0,
        }
    }
}

impl MediaSource for HassClient {
    async fn browse(&self, content_id: &str) -> Result<BrowseMedia, SourceError> {
        let command = Command::BrowseMedia {
            media_content_id: content_id.to_string(),
        };
        let value = self
            .call(command)
            .await
            .map_err(|e| e.into_source_error(content_id))?;
        serde_json::from_value(value)
            .map_err(|e| SourceError::transport(content_id, format!("malformed browse result: {e}")))
    }

    async fn resolve(
        &self,
        content_id: &str,
        expires: Duration,
    ) -> Result<ResolvedMedia, SourceError> {
        let command = Command::ResolveMedia {
            media_content_id: content_id.to_string(),
            expires: u32::try_from(expires.as_secs()).unwrap_or(u32::MAX),
        };
        let value = self
            .call(command)
            .await
            .map_err(|e| e.into_source_error(content_id))?;
        serde_json::from_value(value)
            .map_err(|e| SourceError::transport(content_id, format!("malformed resolve result: {e}")))
    }
}

// ── connect + auth ────────────────────────────────────────────────────────────

async fn open(url: &str, token: &str) -> Result<Connection, HassError> {
    info!("hass: connecting to {}", url);
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await?;

    match next_message(&mut ws).await? {
        ServerMessage::AuthRequired { ha_version } => {
            debug!("hass: auth required (version {:?})", ha_version);
        }
        other => return Err(HassError::Handshake(format!("{other:?}"))),
    }

    let auth = serde_json::to_string(&Auth {
        access_token: token,
    })?;
    ws.send(Message::Text(auth)).await?;

    match next_message(&mut ws).await? {
        ServerMessage::AuthOk { ha_version } => {
            info!("hass: authenticated (version {:?})", ha_version);
        }
        ServerMessage::AuthInvalid { message } => {
            return Err(HassError::AuthInvalid(message.unwrap_or_default()));
        }
        other => return Err(HassError::Handshake(format!("{other:?}"))),
    }

    let (write, read) = ws.split();
    let (tx, rx) = mpsc::channel(64);
    let (closed_tx, closed_rx) = oneshot::channel();

    // pending map: id → reply channel.  Shared between writer (inserts) and reader (resolves).
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    tokio::spawn(writer_task(write, rx, pending.clone(), closed_rx));
    tokio::spawn(reader_task(read, pending.clone(), closed_tx));

    Ok(Connection { tx, pending })
}

/// Next text frame during the handshake, skipping control frames.
async fn next_message<S>(ws: &mut S) -> Result<ServerMessage, HassError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = ws.next().await {
        match frame? {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Close(_) => return Err(HassError::Closed),
            _ => continue,
        }
    }
    Err(HassError::Closed)
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(mut read: R, pending: PendingMap, closed_tx: oneshot::Sender<()>)
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = read.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                debug!("hass reader: close frame {:?}", frame);
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!("hass reader: read error: {}", e);
                break;
            }
        };

        let msg: ServerMessage = match serde_json::from_str(&text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!("hass reader: invalid json '{}': {}", text, e);
                continue;
            }
        };

        if let ServerMessage::Result {
            id,
            success,
            result,
            error,
        } = msg
        {
            let Some(tx) = pending.lock().await.remove(&id) else {
                debug!("hass reader: result for unknown id={}", id);
                continue;
            };
            let reply = if success {
                debug!("hass reader: result id={} ok", id);
                Ok(result.unwrap_or(Value::Null))
            } else {
                let error = error.unwrap_or_else(|| ErrorPayload {
                    code: "unknown_error".to_string(),
                    message: String::new(),
                });
                debug!("hass reader: result id={} err={}", id, error.code);
                Err(CallError::Rejected(error))
            };
            let _ = tx.send(reply);
        }
    }

    debug!("hass reader: connection closed");
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(HassError::Closed.into()));
    }
    let _ = closed_tx.send(());
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(
    mut write: W,
    mut rx: mpsc::Receiver<PendingRequest>,
    pending: PendingMap,
    mut closed_rx: oneshot::Receiver<()>,
) where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let mut next_id: u64 = 1;

    loop {
        let req = tokio::select! {
            req = rx.recv() => match req {
                Some(req) => req,
                None => break,
            },
            _ = &mut closed_rx => break,
        };

        if req.reply.is_closed() {
            debug!("hass writer: caller gave up before send, skipping");
            continue;
        }

        let id = next_id;
        next_id += 1;

        let payload = match serde_json::to_string(&Request {
            id,
            command: &req.command,
        }) {
            Ok(payload) => payload,
            Err(e) => {
                let _ = req.reply.send(Err(HassError::Json(e).into()));
                continue;
            }
        };

        // Register reply channel before writing so reader can match it
        pending.lock().await.insert(id, req.reply);
        debug!("hass writer: send id={} payload={}", id, payload);

        if let Err(e) = write.send(Message::Text(payload)).await {
            warn!("hass writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&id) {
                let _ = tx.send(Err(HassError::WebSocket(e).into()));
            }
            break;
        }
    }

    let _ = write.close().await;
    debug!("hass writer: task exiting");
}
