//! Session management for the device link
//!
//! A Session owns the transport, the line framer and the state tracker for
//! one device. It is driven by [`Session::poll`] ticks and by explicit
//! requests, and reports changes to observers and broadcast subscribers.

use super::command::{LineEnding, Request};
use super::event::classify;
use super::framing::{LineFramer, DEFAULT_MAX_LINE_LENGTH};
use super::history::{ExchangeRecord, History};
use super::logger::TranscriptLogger;
use super::tracker::{KeyMaterial, SessionTracker, SessionUpdate};
use super::transport::{TransportError, TransportStats, TransportTrait};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected
    Disconnected,
    /// Connected and polling
    Connected,
}

/// Session events
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// State changed
    StateChanged(SessionState),
    /// Key material changed (including the reset on disconnect)
    KeysUpdated(KeyMaterial),
    /// An exchange completed and was appended to history
    ExchangeCompleted(ExchangeRecord),
    /// Device printed a line without a known marker
    UnrecognizedLine(String),
    /// A request was written to the device
    RequestSent(Request),
    /// Recoverable error
    Error(String),
}

/// Receives session changes synchronously, right after they happen
pub trait SessionObserver: Send + Sync {
    /// Key material changed
    fn on_key_updated(&self, _keys: &KeyMaterial) {}

    /// A record was appended to history
    fn on_history_appended(&self, _record: &ExchangeRecord) {}

    /// A line carried no known marker
    fn on_unrecognized_line(&self, _line: &str) {}
}

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Transport failure; the session is disconnected afterwards
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Operation needs an open connection
    #[error("Not connected")]
    NotConnected,

    /// The session task is gone
    #[error("Session closed")]
    Closed,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session name (for display and logs)
    pub name: String,
    /// Terminator appended to outbound requests
    pub line_ending: LineEnding,
    /// Longest inbound line kept by the framer
    pub max_line_length: usize,
}

impl SessionConfig {
    /// Create a new session configuration
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            line_ending: LineEnding::None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("Session")
    }
}

/// Device session
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    state: SessionState,
    transport: Box<dyn TransportTrait>,
    framer: LineFramer,
    tracker: SessionTracker,
    observers: Vec<Arc<dyn SessionObserver>>,
    event_tx: broadcast::Sender<SessionEvent>,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    /// Create a disconnected session with a fresh history
    pub fn new(transport: Box<dyn TransportTrait>, config: SessionConfig) -> Self {
        Self::with_history(transport, config, History::new())
    }

    /// Create a disconnected session appending into an existing history
    pub fn with_history(
        transport: Box<dyn TransportTrait>,
        config: SessionConfig,
        history: History,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            id: Uuid::new_v4(),
            framer: LineFramer::with_max_line_length(config.max_line_length),
            config,
            state: SessionState::Disconnected,
            transport,
            tracker: SessionTracker::new(history),
            observers: Vec::new(),
            event_tx,
            transcript: None,
        }
    }

    /// Get session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get session name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Latest key material
    pub fn keys(&self) -> &KeyMaterial {
        self.tracker.keys()
    }

    /// Original value waiting for its result
    pub fn pending_original(&self) -> Option<&str> {
        self.tracker.pending_original()
    }

    /// Exchange history (shared handle)
    pub fn history(&self) -> &History {
        self.tracker.history()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Register an observer
    pub fn add_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Record RX/TX lines into a transcript
    pub fn set_transcript(&mut self, transcript: TranscriptLogger) {
        self.transcript = Some(transcript);
    }

    /// Get connection statistics
    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }

    /// Get connection info string
    pub fn connection_info(&self) -> String {
        self.transport.connection_info()
    }

    /// Open the transport. Connecting an open session is a no-op.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        if self.is_connected() {
            return Ok(());
        }

        if let Err(e) = self.transport.connect().await {
            tracing::warn!(session = %self.id, "Connect failed: {}", e);
            self.log_info(&format!("connect failed: {e}"));
            let _ = self.event_tx.send(SessionEvent::Error(e.to_string()));
            return Err(e.into());
        }

        self.framer.clear();
        self.reset_state();
        self.state = SessionState::Connected;

        let info = self.transport.connection_info();
        tracing::info!(session = %self.id, "Connected to {}", info);
        self.log_info(&format!("connected to {info}"));
        let _ = self.event_tx.send(SessionEvent::StateChanged(SessionState::Connected));
        Ok(())
    }

    /// Close the transport and forget keys, pending original and any
    /// half-received line. History is kept. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            tracing::warn!(session = %self.id, "Transport close failed: {}", e);
        }
        self.framer.clear();
        self.reset_state();

        if self.state != SessionState::Disconnected {
            self.state = SessionState::Disconnected;
            tracing::info!(session = %self.id, "Disconnected");
            self.log_info("disconnected");
            let _ = self.event_tx.send(SessionEvent::StateChanged(SessionState::Disconnected));
        }
    }

    /// One poll tick: at most one read, then every completed line is
    /// classified and applied in arrival order.
    ///
    /// Returns the number of lines processed. A transport error disconnects
    /// the session before it is returned.
    pub async fn poll(&mut self) -> Result<usize, SessionError> {
        if !self.is_connected() {
            return Ok(0);
        }

        let chunk = match self.transport.receive().await {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(session = %self.id, "Read failed: {}", e);
                self.log_info(&format!("read failed: {e}"));
                let _ = self.event_tx.send(SessionEvent::Error(e.to_string()));
                self.disconnect().await;
                return Err(e.into());
            }
        };
        if chunk.is_empty() {
            return Ok(0);
        }

        let lines = self.framer.push(&chunk);
        for line in &lines {
            self.process_line(line);
        }
        Ok(lines.len())
    }

    /// Feed one already framed line through classification and tracking
    pub fn process_line(&mut self, line: &str) {
        tracing::debug!(session = %self.id, "RX {}", line);
        if let Some(ref mut transcript) = self.transcript {
            transcript.log_rx(line);
        }

        if let Some(update) = self.tracker.apply(classify(line)) {
            self.publish(update);
        }
    }

    /// Write a request to the device
    pub async fn send_request(&mut self, request: &Request) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let data = request.to_wire(self.config.line_ending);
        if let Err(e) = self.transport.send(&data).await {
            tracing::warn!(session = %self.id, "Send failed: {}", e);
            let _ = self.event_tx.send(SessionEvent::Error(e.to_string()));
            return Err(e.into());
        }

        let line = request.to_line();
        tracing::debug!(session = %self.id, "TX {}", line);
        if let Some(ref mut transcript) = self.transcript {
            transcript.log_tx(&line);
        }
        let _ = self.event_tx.send(SessionEvent::RequestSent(request.clone()));
        Ok(())
    }

    fn reset_state(&mut self) {
        let had_keys = !self.tracker.keys().is_empty();
        self.tracker.reset();
        if had_keys {
            self.publish(SessionUpdate::KeysChanged(KeyMaterial::default()));
        }
    }

    fn publish(&mut self, update: SessionUpdate) {
        let event = match update {
            SessionUpdate::KeysChanged(keys) => {
                for observer in &self.observers {
                    observer.on_key_updated(&keys);
                }
                SessionEvent::KeysUpdated(keys)
            }
            SessionUpdate::ExchangeCompleted(record) => {
                for observer in &self.observers {
                    observer.on_history_appended(&record);
                }
                SessionEvent::ExchangeCompleted(record)
            }
            SessionUpdate::Unrecognized(line) => {
                tracing::info!(session = %self.id, "Unrecognized device output: {}", line);
                for observer in &self.observers {
                    observer.on_unrecognized_line(&line);
                }
                SessionEvent::UnrecognizedLine(line)
            }
        };
        let _ = self.event_tx.send(event);
    }

    fn log_info(&mut self, message: &str) {
        if let Some(ref mut transcript) = self.transcript {
            transcript.log_info(message);
        }
    }
}
