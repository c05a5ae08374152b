use crate::assembler::Assembler;
use crate::collectors::{ProbeError, SystemProbe};
use crate::metrics::Metrics;
use axum::body::Bytes;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const EVENT_NAME: &str = "sysInfo";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("клиент закрыл соединение")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("ошибка сбора метрик: {0}")]
    Probe(#[from] ProbeError),
    #[error("ошибка сериализации снимка: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("ошибка передачи клиенту: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Disconnected,
    Failed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Active => "active",
            SessionState::Disconnected => "disconnected",
            SessionState::Failed => "failed",
        }
    }
}

pub trait Flushable {
    /// Hands everything written so far to the connection. May wait for a
    /// slow peer.
    fn flush(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

pub trait Transport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
    /// Resolves once the peer has gone away.
    fn closed(&self) -> impl Future<Output = ()> + Send;
}

/// Transport backed by the channel that feeds a streaming response body.
/// Dropping the body (the client hung up) closes the channel.
pub struct ChannelTransport {
    tx: mpsc::Sender<Bytes>,
    buffer: Vec<u8>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            tx,
            buffer: Vec::new(),
        }
    }
}

impl Transport for ChannelTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.tx.is_closed() {
            return Err(TransportError::Closed);
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

impl Flushable for ChannelTransport {
    async fn flush(&mut self) -> Result<(), TransportError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::take(&mut self.buffer));
        self.tx
            .send(chunk)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

pub fn encode_event(event: &str, data: &str) -> String {
    format!("event:{event}\ndata:{data}\n\n")
}

/// Streams snapshots to one client until it disconnects or a tick fails.
pub struct Session<P, T> {
    assembler: Assembler<P>,
    transport: T,
    metrics: Arc<Metrics>,
    state: SessionState,
    events_sent: u64,
}

impl<P, T> Session<P, T>
where
    P: SystemProbe,
    T: Transport + Flushable,
{
    pub fn new(assembler: Assembler<P>, transport: T, metrics: Arc<Metrics>) -> Self {
        Self {
            assembler,
            transport,
            metrics,
            state: SessionState::Active,
            events_sent: 0,
        }
    }

    pub async fn run(mut self) -> SessionState {
        let started = Instant::now();
        self.metrics.session_started();
        info!("клиент подключён к потоку");

        let mut ticker = interval_at(started + TICK_INTERVAL, TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.state == SessionState::Active {
            // Disconnect wins over a due tick; a running tick is never cut short.
            let disconnected = tokio::select! {
                biased;
                _ = self.transport.closed() => true,
                _ = ticker.tick() => false,
            };

            if disconnected {
                self.state = SessionState::Disconnected;
                break;
            }

            if let Err(err) = self.tick().await {
                error!(error = %err, "сессия прервана");
                self.state = SessionState::Failed;
            }
        }

        let elapsed = Duration::from_secs(started.elapsed().as_secs());
        self.metrics.session_ended(self.state.as_str());
        info!(
            outcome = self.state.as_str(),
            events = self.events_sent,
            duration = %humantime::format_duration(elapsed),
            "сессия завершена"
        );
        self.state
    }

    async fn tick(&mut self) -> Result<(), SessionError> {
        let snapshot = self.assembler.assemble()?;
        let payload = serde_json::to_string(&snapshot)?;
        self.transport
            .write(encode_event(EVENT_NAME, &payload).as_bytes())?;
        self.transport.flush().await?;
        self.events_sent += 1;
        self.metrics.inc_events_sent();
        Ok(())
    }
}
