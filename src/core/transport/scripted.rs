//! In-memory scripted peer
//!
//! Stands in for the microcontroller when replaying a captured transcript or
//! driving the session in tests. Inbound chunks are queued through a
//! [`ScriptedPeer`] handle and handed out one per `receive` call, the same
//! granularity a serial read has.

use super::{TransportError, TransportStats, TransportTrait, TransportType};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Default)]
struct PeerState {
    inbound: VecDeque<Bytes>,
    outbound: Vec<Bytes>,
    pending_fault: Option<std::io::ErrorKind>,
    refuse_connect: bool,
    connects: u32,
}

/// Handle used to script the peer side of a [`ScriptedTransport`]
#[derive(Debug, Clone, Default)]
pub struct ScriptedPeer {
    state: Arc<Mutex<PeerState>>,
}

impl ScriptedPeer {
    /// Create a new peer with nothing queued
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one inbound chunk
    pub fn push(&self, chunk: impl Into<Bytes>) {
        self.state.lock().inbound.push_back(chunk.into());
    }

    /// Queue `data` split into chunks of at most `chunk_size` bytes
    pub fn push_chunked(&self, data: &[u8], chunk_size: usize) {
        let mut state = self.state.lock();
        for chunk in data.chunks(chunk_size.max(1)) {
            state.inbound.push_back(Bytes::copy_from_slice(chunk));
        }
    }

    /// Make the next `receive` fail with an I/O error of the given kind
    pub fn inject_fault(&self, kind: std::io::ErrorKind) {
        self.state.lock().pending_fault = Some(kind);
    }

    /// Make subsequent `connect` calls fail
    pub fn refuse_connect(&self, refuse: bool) {
        self.state.lock().refuse_connect = refuse;
    }

    /// Number of inbound chunks not yet received
    pub fn pending_inbound(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// Everything written by the session, one entry per `send`
    pub fn sent(&self) -> Vec<Bytes> {
        self.state.lock().outbound.clone()
    }

    /// Outbound writes decoded as text
    pub fn sent_lines(&self) -> Vec<String> {
        self.state
            .lock()
            .outbound
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    /// How many times the transport has been opened
    pub fn connect_count(&self) -> u32 {
        self.state.lock().connects
    }
}

/// Transport backed by a [`ScriptedPeer`]
pub struct ScriptedTransport {
    name: String,
    peer: ScriptedPeer,
    connected: bool,
    stats: TransportStats,
    connected_at: Option<Instant>,
}

impl ScriptedTransport {
    /// Create a transport and the peer handle that drives it
    pub fn new(name: &str) -> (Self, ScriptedPeer) {
        let peer = ScriptedPeer::new();
        let transport = Self {
            name: name.to_string(),
            peer: peer.clone(),
            connected: false,
            stats: TransportStats::default(),
            connected_at: None,
        };
        (transport, peer)
    }
}

#[async_trait]
impl TransportTrait for ScriptedTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.peer.state.lock();
        if state.refuse_connect {
            return Err(TransportError::ConnectionFailed(format!("{} refused", self.name)));
        }
        state.connects += 1;
        self.connected = true;
        self.connected_at = Some(Instant::now());
        self.stats = TransportStats::default();
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        self.connected_at = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.peer.state.lock().outbound.push(Bytes::copy_from_slice(data));
        self.stats.bytes_sent += data.len() as u64;
        self.stats.chunks_sent += 1;
        Ok(data.len())
    }

    async fn receive(&mut self) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let mut state = self.peer.state.lock();
        if let Some(kind) = state.pending_fault.take() {
            self.stats.errors += 1;
            return Err(TransportError::IoError(std::io::Error::new(kind, "scripted fault")));
        }
        match state.inbound.pop_front() {
            Some(chunk) => {
                self.stats.bytes_received += chunk.len() as u64;
                self.stats.chunks_received += 1;
                Ok(chunk)
            }
            None => Ok(Bytes::new()),
        }
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Scripted
    }

    fn connection_info(&self) -> String {
        format!("scripted:{}", self.name)
    }

    fn stats(&self) -> TransportStats {
        let mut stats = self.stats.clone();
        if let Some(connected_at) = self.connected_at {
            stats.uptime_secs = connected_at.elapsed().as_secs();
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chunks_are_delivered_in_order() {
        let (mut transport, peer) = ScriptedTransport::new("board");
        transport.connect().await.unwrap();

        peer.push_chunked(b"Original: hi\n", 5);
        assert_eq!(peer.pending_inbound(), 3);

        assert_eq!(transport.receive().await.unwrap(), Bytes::from_static(b"Origi"));
        assert_eq!(transport.receive().await.unwrap(), Bytes::from_static(b"nal: "));
        assert_eq!(transport.receive().await.unwrap(), Bytes::from_static(b"hi\n"));
        assert!(transport.receive().await.unwrap().is_empty());
        assert_eq!(transport.stats().chunks_received, 3);
    }

    #[tokio::test]
    async fn test_fault_fires_once() {
        let (mut transport, peer) = ScriptedTransport::new("board");
        transport.connect().await.unwrap();
        peer.inject_fault(std::io::ErrorKind::BrokenPipe);

        assert!(matches!(transport.receive().await, Err(TransportError::IoError(_))));
        assert!(transport.receive().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sent_data_is_recorded() {
        let (mut transport, peer) = ScriptedTransport::new("board");
        assert!(transport.send(b"e hi").await.is_err());

        transport.connect().await.unwrap();
        transport.send(b"e hi").await.unwrap();
        assert_eq!(peer.sent_lines(), vec!["e hi".to_string()]);
    }

    #[tokio::test]
    async fn test_refused_connect() {
        let (mut transport, peer) = ScriptedTransport::new("board");
        peer.refuse_connect(true);
        assert!(matches!(transport.connect().await, Err(TransportError::ConnectionFailed(_))));
        assert!(!transport.is_connected());
        assert_eq!(peer.connect_count(), 0);
    }
}
