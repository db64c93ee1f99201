//! Offline replay of captured device output
//!
//! Pushes a capture through the same session pipeline the live link uses,
//! chunked the way a serial read might deliver it, and reports the state it
//! leaves behind. Useful for checking firmware output without the board.

use super::history::ExchangeRecord;
use super::session::{Session, SessionConfig, SessionError, SessionObserver};
use super::tracker::KeyMaterial;
use super::transport::ScriptedTransport;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Replay errors
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Capture could not be read
    #[error("Cannot read capture {}: {source}", path.display())]
    Read {
        /// Capture file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Session pipeline failed
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Default)]
struct UnrecognizedLines(Mutex<Vec<String>>);

impl SessionObserver for UnrecognizedLines {
    fn on_unrecognized_line(&self, line: &str) {
        self.0.lock().push(line.to_string());
    }
}

/// Result of a replay
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayOutcome {
    /// Lines framed out of the capture
    pub lines: usize,
    /// Key material at the end of the capture
    pub keys: KeyMaterial,
    /// Exchanges completed during the capture
    pub history: Vec<ExchangeRecord>,
    /// Lines that carried no known marker
    pub unrecognized: Vec<String>,
    /// Original value still waiting for a result at the end
    pub pending_original: Option<String>,
}

/// Replay raw capture bytes, delivering at most `chunk_size` bytes per read
pub async fn replay_bytes(data: &[u8], chunk_size: usize) -> Result<ReplayOutcome, SessionError> {
    let (transport, peer) = ScriptedTransport::new("replay");
    let mut session = Session::new(Box::new(transport), SessionConfig::new("replay"));
    let unrecognized = Arc::new(UnrecognizedLines::default());
    session.add_observer(unrecognized.clone());

    session.connect().await?;
    peer.push_chunked(data, chunk_size);

    let mut outcome = ReplayOutcome::default();
    while peer.pending_inbound() > 0 {
        outcome.lines += session.poll().await?;
    }

    outcome.unrecognized = std::mem::take(&mut *unrecognized.0.lock());
    outcome.keys = session.keys().clone();
    outcome.pending_original = session.pending_original().map(str::to_string);
    outcome.history = session.history().snapshot();
    Ok(outcome)
}

/// Replay a capture file
pub async fn replay_file(path: &Path, chunk_size: usize) -> Result<ReplayOutcome, ReplayError> {
    let data = tokio::fs::read(path).await.map_err(|source| ReplayError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Replaying {} ({} bytes)", path.display(), data.len());
    Ok(replay_bytes(&data, chunk_size).await?)
}
