//! # Cipherlink Core Library
//!
//! Host-side console for a microcontroller that demonstrates textbook RSA
//! over a serial link. The board prints its keys and the results of
//! encrypt/decrypt requests as marker-prefixed text lines; this library:
//!
//! - Frames the raw serial byte stream into lines
//! - Classifies each line into a typed device event
//! - Tracks the latest keys and pairs each original value with its result
//! - Keeps an append-only history of completed exchanges
//! - Encodes `e <text>` / `d <text>` requests for the device
//! - Drives all of the above from a single polling task
//!
//! ## Example
//!
//! ```rust,no_run
//! use cipherlink_core::{SerialConfig, SerialTransport, Session, SessionConfig, SessionHandle};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = SerialTransport::new(SerialConfig::new("/dev/ttyACM0", 9600));
//!     let session = Session::new(Box::new(transport), SessionConfig::new("board"));
//!     let handle = SessionHandle::spawn(session, Duration::from_millis(100));
//!
//!     handle.connect().await?;
//!     handle.encrypt("hello").await?;
//!
//!     let mut events = handle.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         if let cipherlink_core::SessionEvent::ExchangeCompleted(record) = event {
//!             println!("{record}");
//!             break;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, ConfigError};
pub use crate::core::command::{LineEnding, Request};
pub use crate::core::event::{classify, DeviceEvent};
pub use crate::core::framing::LineFramer;
pub use crate::core::history::{ExchangeKind, ExchangeRecord, History};
pub use crate::core::logger::{LogFormat, TranscriptLogger};
pub use crate::core::replay::{replay_bytes, replay_file, ReplayOutcome};
pub use crate::core::runtime::SessionHandle;
pub use crate::core::session::{
    Session, SessionConfig, SessionError, SessionEvent, SessionObserver, SessionState,
};
pub use crate::core::tracker::{KeyMaterial, SessionTracker};
pub use crate::core::transport::{
    ScriptedPeer, ScriptedTransport, SerialConfig, SerialTransport, TransportError, TransportType,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
