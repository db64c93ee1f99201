//! Polling runtime
//!
//! Moves a [`Session`] into a single tokio task that ticks the poll loop on a
//! fixed interval and serialises user commands between ticks. That task is
//! the only writer of session state; everyone else reads through
//! [`History`] snapshots, a key-material watch channel and the event
//! broadcast.

use super::command::Request;
use super::history::History;
use super::session::{Session, SessionError, SessionEvent, SessionState};
use super::tracker::KeyMaterial;
use super::transport::TransportStats;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default poll period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum SessionCommand {
    Connect(Reply<()>),
    Disconnect(Reply<()>),
    Send(Request, Reply<()>),
    Stats(oneshot::Sender<TransportStats>),
    Shutdown,
}

/// Handle to a running session task
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
    keys_rx: watch::Receiver<KeyMaterial>,
    state_rx: watch::Receiver<SessionState>,
    history: History,
    task: Option<JoinHandle<Session>>,
}

impl SessionHandle {
    /// Start polling `session` every `poll_interval`
    pub fn spawn(session: Session, poll_interval: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (keys_tx, keys_rx) = watch::channel(session.keys().clone());
        let (state_tx, state_rx) = watch::channel(session.state());
        let (event_tx, _) = broadcast::channel(1024);
        let history = session.history().clone();

        let task = tokio::spawn(run(
            session,
            poll_interval,
            cmd_rx,
            event_tx.clone(),
            keys_tx,
            state_tx,
        ));

        Self {
            cmd_tx,
            event_tx,
            keys_rx,
            state_rx,
            history,
            task: Some(task),
        }
    }

    /// Open the transport
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.request(SessionCommand::Connect).await
    }

    /// Close the transport; history is kept
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.request(SessionCommand::Disconnect).await
    }

    /// Send a request to the device
    pub async fn send(&self, request: Request) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Send(request, reply)).await
    }

    /// Ask the device to encrypt `text`
    pub async fn encrypt(&self, text: &str) -> Result<(), SessionError> {
        self.send(Request::Encrypt(text.to_string())).await
    }

    /// Ask the device to decrypt `text`
    pub async fn decrypt(&self, text: &str) -> Result<(), SessionError> {
        self.send(Request::Decrypt(text.to_string())).await
    }

    /// Transport statistics
    pub async fn stats(&self) -> Result<TransportStats, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Stats(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Exchange history (consistent snapshots via [`History::snapshot`])
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Latest key material
    pub fn keys(&self) -> KeyMaterial {
        self.keys_rx.borrow().clone()
    }

    /// Watch channel following key material
    pub fn watch_keys(&self) -> watch::Receiver<KeyMaterial> {
        self.keys_rx.clone()
    }

    /// Current connection state
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch channel following connection state
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Stop the task, disconnect, and hand the session back
    pub async fn shutdown(mut self) -> Result<Session, SessionError> {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown).await;
        match self.task.take() {
            Some(task) => task.await.map_err(|_| SessionError::Closed),
            None => Err(SessionError::Closed),
        }
    }

    async fn request<F>(&self, make: F) -> Result<(), SessionError>
    where
        F: FnOnce(Reply<()>) -> SessionCommand,
    {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    mut session: Session,
    poll_interval: Duration,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
    keys_tx: watch::Sender<KeyMaterial>,
    state_tx: watch::Sender<SessionState>,
) -> Session {
    let mut events = session.subscribe();
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(session = %session.id(), "Poll loop started ({:?})", poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Errors already disconnected the session and went out as events.
                let _ = session.poll().await;
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    // Watch channels are refreshed before the reply goes out.
                    Some(SessionCommand::Connect(reply)) => {
                        let result = session.connect().await;
                        forward(&mut events, &event_tx, &keys_tx, &state_tx);
                        let _ = reply.send(result);
                    }
                    Some(SessionCommand::Disconnect(reply)) => {
                        session.disconnect().await;
                        forward(&mut events, &event_tx, &keys_tx, &state_tx);
                        let _ = reply.send(Ok(()));
                    }
                    Some(SessionCommand::Send(request, reply)) => {
                        let result = session.send_request(&request).await;
                        forward(&mut events, &event_tx, &keys_tx, &state_tx);
                        let _ = reply.send(result);
                    }
                    Some(SessionCommand::Stats(reply)) => {
                        let _ = reply.send(session.stats());
                    }
                    Some(SessionCommand::Shutdown) | None => {
                        session.disconnect().await;
                        forward(&mut events, &event_tx, &keys_tx, &state_tx);
                        break;
                    }
                }
            }
        }
        forward(&mut events, &event_tx, &keys_tx, &state_tx);
    }

    tracing::debug!(session = %session.id(), "Poll loop stopped");
    session
}

/// Republish what the session emitted during the last step
fn forward(
    events: &mut broadcast::Receiver<SessionEvent>,
    event_tx: &broadcast::Sender<SessionEvent>,
    keys_tx: &watch::Sender<KeyMaterial>,
    state_tx: &watch::Sender<SessionState>,
) {
    loop {
        match events.try_recv() {
            Ok(event) => {
                match &event {
                    SessionEvent::KeysUpdated(keys) => {
                        keys_tx.send_replace(keys.clone());
                    }
                    SessionEvent::StateChanged(state) => {
                        state_tx.send_replace(*state);
                    }
                    _ => {}
                }
                let _ = event_tx.send(event);
            }
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                tracing::warn!("Session event relay lagged, {} events skipped", n);
            }
            Err(_) => break,
        }
    }
}
