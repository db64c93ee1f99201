//! Transport layer for the device link
//!
//! Supports:
//! - Serial ports (USB-Serial adapters on the microcontroller board)
//! - Scripted in-memory peer (capture replay and tests)

mod scripted;
mod serial;

pub use scripted::{ScriptedPeer, ScriptedTransport};
pub use serial::{
    list_ports, SerialConfig, SerialParity, SerialTransport, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT,
};

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Serial port
    Serial,
    /// In-memory scripted peer
    Scripted,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "Serial"),
            Self::Scripted => write!(f, "Scripted"),
        }
    }
}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// Disconnected
    #[error("Disconnected")]
    Disconnected,
}

/// Transport statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
    /// Writes performed
    pub chunks_sent: u64,
    /// Non-empty reads performed
    pub chunks_received: u64,
    /// Errors count
    pub errors: u64,
    /// Connection uptime in seconds
    pub uptime_secs: u64,
}

/// Transport trait for the half-duplex device link
///
/// Inbound and outbound directions share no buffer: `receive` only ever
/// touches the read side and `send` only the write side.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransportTrait: Send {
    /// Open the link
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Close the link. Closing an already closed link is not an error.
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Send data
    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Receive data (non-blocking, returns empty bytes when nothing is waiting)
    async fn receive(&mut self) -> Result<Bytes, TransportError>;

    /// Get transport type
    fn transport_type(&self) -> TransportType;

    /// Get connection info string
    fn connection_info(&self) -> String;

    /// Get statistics
    fn stats(&self) -> TransportStats;
}
