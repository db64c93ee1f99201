//! Classification of device output lines
//!
//! Every line the firmware prints carries at most one marker such as
//! `Public key:` or `Encrypted:`. Matching is by substring, case-sensitive,
//! and the first marker in [`MARKERS`] order wins.

use serde::{Deserialize, Serialize};

/// Marker preceding the public key
pub const PUBLIC_KEY_MARKER: &str = "Public key:";
/// Marker preceding the private key
pub const PRIVATE_KEY_MARKER: &str = "Private key:";
/// Marker preceding the echoed input of an exchange
pub const ORIGINAL_MARKER: &str = "Original:";
/// Marker preceding an encryption result
pub const ENCRYPTED_MARKER: &str = "Encrypted:";
/// Marker preceding a decryption result
pub const DECRYPTED_MARKER: &str = "Decrypted:";

/// Markers in priority order
pub const MARKERS: [(&str, EventKind); 5] = [
    (PUBLIC_KEY_MARKER, EventKind::PublicKey),
    (PRIVATE_KEY_MARKER, EventKind::PrivateKey),
    (ORIGINAL_MARKER, EventKind::OriginalValue),
    (ENCRYPTED_MARKER, EventKind::EncryptedValue),
    (DECRYPTED_MARKER, EventKind::DecryptedValue),
];

/// Discriminant of a recognised [`DeviceEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// `Public key:` line
    PublicKey,
    /// `Private key:` line
    PrivateKey,
    /// `Original:` line
    OriginalValue,
    /// `Encrypted:` line
    EncryptedValue,
    /// `Decrypted:` line
    DecryptedValue,
}

/// A typed line of device output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// Newly generated public key
    PublicKey(String),
    /// Newly generated private key
    PrivateKey(String),
    /// Input value of the exchange in progress
    OriginalValue(String),
    /// Encryption result, whitespace separated decimal integers
    EncryptedValue(String),
    /// Decryption result
    DecryptedValue(String),
    /// Line without a known marker, kept verbatim
    Unrecognized(String),
}

impl DeviceEvent {
    fn from_kind(kind: EventKind, value: String) -> Self {
        match kind {
            EventKind::PublicKey => Self::PublicKey(value),
            EventKind::PrivateKey => Self::PrivateKey(value),
            EventKind::OriginalValue => Self::OriginalValue(value),
            EventKind::EncryptedValue => Self::EncryptedValue(value),
            EventKind::DecryptedValue => Self::DecryptedValue(value),
        }
    }

    /// Kind of a recognised event, `None` for [`DeviceEvent::Unrecognized`]
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::PublicKey(_) => Some(EventKind::PublicKey),
            Self::PrivateKey(_) => Some(EventKind::PrivateKey),
            Self::OriginalValue(_) => Some(EventKind::OriginalValue),
            Self::EncryptedValue(_) => Some(EventKind::EncryptedValue),
            Self::DecryptedValue(_) => Some(EventKind::DecryptedValue),
            Self::Unrecognized(_) => None,
        }
    }
}

/// Classify one trimmed line
///
/// The value is everything after the first occurrence of the marker, trimmed.
pub fn classify(line: &str) -> DeviceEvent {
    for (marker, kind) in MARKERS {
        if let Some(idx) = line.find(marker) {
            let value = line[idx + marker.len()..].trim().to_string();
            return DeviceEvent::from_kind(kind, value);
        }
    }
    DeviceEvent::Unrecognized(line.to_string())
}
