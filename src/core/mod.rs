//! Core module containing the device protocol handling
//!
//! This module provides:
//! - Transport layer (serial port, scripted in-memory peer)
//! - Line framing of the raw device stream
//! - Classification of device lines into typed events
//! - Session state tracking (keys, pending original, exchange history)
//! - Request encoding for the outbound direction
//! - Session controller and polling runtime
//! - Transcript logging and offline replay

pub mod command;
pub mod event;
pub mod framing;
pub mod history;
pub mod logger;
pub mod replay;
pub mod runtime;
pub mod session;
pub mod tracker;
pub mod transport;
