//! Session state tracking
//!
//! Folds classified device events into the current key material and the
//! exchange history. The device prints `Original: <input>` followed by one
//! `Encrypted:` or `Decrypted:` line; the tracker pairs the most recent
//! original with the next result.
//!
//! | state            | event                 | effect                                  |
//! |------------------|-----------------------|-----------------------------------------|
//! | any              | `PublicKey(v)`        | public key = v                          |
//! | any              | `PrivateKey(v)`       | private key = v                         |
//! | any              | `OriginalValue(v)`    | pending = v, replacing any earlier one  |
//! | pending = o      | `EncryptedValue(v)`   | append {Encrypted, o, v}, pending = -   |
//! | pending = o      | `DecryptedValue(v)`   | append {Decrypted, o, v}, pending = -   |
//! | no pending       | result                | dropped                                 |
//! | any              | `Unrecognized`        | none                                    |

use super::event::DeviceEvent;
use super::history::{ExchangeKind, ExchangeRecord, History};
use serde::{Deserialize, Serialize};

/// Latest keys announced by the device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    /// Public key as printed by the device
    pub public_key: Option<String>,
    /// Private key as printed by the device
    pub private_key: Option<String>,
}

impl KeyMaterial {
    /// Neither key has been received
    pub fn is_empty(&self) -> bool {
        self.public_key.is_none() && self.private_key.is_none()
    }
}

/// Observable outcome of applying one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// A key line replaced part of the key material
    KeysChanged(KeyMaterial),
    /// An exchange was completed and appended to history
    ExchangeCompleted(ExchangeRecord),
    /// The line carried no known marker
    Unrecognized(String),
}

/// State machine over device events
#[derive(Debug, Default)]
pub struct SessionTracker {
    keys: KeyMaterial,
    pending_original: Option<String>,
    history: History,
}

impl SessionTracker {
    /// Create a tracker appending into `history`
    pub fn new(history: History) -> Self {
        Self {
            keys: KeyMaterial::default(),
            pending_original: None,
            history,
        }
    }

    /// Apply one event. Returns what changed, if anything observable did.
    pub fn apply(&mut self, event: DeviceEvent) -> Option<SessionUpdate> {
        match event {
            DeviceEvent::PublicKey(value) => {
                self.keys.public_key = Some(value);
                Some(SessionUpdate::KeysChanged(self.keys.clone()))
            }
            DeviceEvent::PrivateKey(value) => {
                self.keys.private_key = Some(value);
                Some(SessionUpdate::KeysChanged(self.keys.clone()))
            }
            DeviceEvent::OriginalValue(value) => {
                if let Some(previous) = self.pending_original.replace(value) {
                    tracing::debug!(%previous, "pending original replaced before a result arrived");
                }
                None
            }
            DeviceEvent::EncryptedValue(value) => self.complete(ExchangeKind::Encrypted, value),
            DeviceEvent::DecryptedValue(value) => self.complete(ExchangeKind::Decrypted, value),
            DeviceEvent::Unrecognized(line) => Some(SessionUpdate::Unrecognized(line)),
        }
    }

    fn complete(&mut self, kind: ExchangeKind, result: String) -> Option<SessionUpdate> {
        let Some(original) = self.pending_original.take() else {
            tracing::debug!(%kind, %result, "result without a pending original, discarded");
            return None;
        };
        let record = ExchangeRecord::new(kind, original, result);
        self.history.append(record.clone());
        Some(SessionUpdate::ExchangeCompleted(record))
    }

    /// Forget keys and any pending original. History is kept.
    pub fn reset(&mut self) {
        self.keys = KeyMaterial::default();
        self.pending_original = None;
    }

    /// Current key material
    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }

    /// Original value awaiting its result
    pub fn pending_original(&self) -> Option<&str> {
        self.pending_original.as_deref()
    }

    /// History handle
    pub fn history(&self) -> &History {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn original(v: &str) -> DeviceEvent {
        DeviceEvent::OriginalValue(v.into())
    }

    #[test]
    fn test_original_then_encrypted() {
        let mut tracker = SessionTracker::default();
        assert_eq!(tracker.apply(original("hi")), None);
        assert_eq!(tracker.pending_original(), Some("hi"));

        let update = tracker.apply(DeviceEvent::EncryptedValue("104 105".into()));
        let expected = ExchangeRecord::new(ExchangeKind::Encrypted, "hi", "104 105");
        assert_eq!(update, Some(SessionUpdate::ExchangeCompleted(expected.clone())));
        assert_eq!(tracker.history().snapshot(), vec![expected]);
        assert_eq!(tracker.pending_original(), None);
    }

    #[test]
    fn test_second_original_replaces_first() {
        let mut tracker = SessionTracker::default();
        tracker.apply(original("a"));
        tracker.apply(original("b"));
        tracker.apply(DeviceEvent::EncryptedValue("1 2".into()));

        let history = tracker.history().snapshot();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].original(), "b");
    }

    #[test]
    fn test_result_without_original_is_dropped() {
        let mut tracker = SessionTracker::default();
        assert_eq!(tracker.apply(DeviceEvent::EncryptedValue("1 2".into())), None);
        assert_eq!(tracker.apply(DeviceEvent::DecryptedValue("x".into())), None);
        assert!(tracker.history().is_empty());
    }

    #[test]
    fn test_result_consumes_pending() {
        let mut tracker = SessionTracker::default();
        tracker.apply(original("104 105"));
        tracker.apply(DeviceEvent::DecryptedValue("hi".into()));
        tracker.apply(DeviceEvent::DecryptedValue("again".into()));

        let history = tracker.history().snapshot();
        assert_eq!(history, vec![ExchangeRecord::new(ExchangeKind::Decrypted, "104 105", "hi")]);
    }

    #[test]
    fn test_keys_overwrite() {
        let mut tracker = SessionTracker::default();
        tracker.apply(DeviceEvent::PublicKey("(7, 187)".into()));
        let update = tracker.apply(DeviceEvent::PrivateKey("(23, 187)".into()));
        assert_eq!(
            update,
            Some(SessionUpdate::KeysChanged(KeyMaterial {
                public_key: Some("(7, 187)".into()),
                private_key: Some("(23, 187)".into()),
            }))
        );

        tracker.apply(DeviceEvent::PublicKey("(3, 33)".into()));
        assert_eq!(tracker.keys().public_key.as_deref(), Some("(3, 33)"));
    }

    #[test]
    fn test_key_lines_do_not_disturb_pending() {
        let mut tracker = SessionTracker::default();
        tracker.apply(original("hi"));
        tracker.apply(DeviceEvent::PublicKey("(7, 187)".into()));
        tracker.apply(DeviceEvent::Unrecognized("noise".into()));
        tracker.apply(DeviceEvent::EncryptedValue("104 105".into()));
        assert_eq!(tracker.history().len(), 1);
    }

    #[test]
    fn test_unrecognized_is_surfaced() {
        let mut tracker = SessionTracker::default();
        assert_eq!(
            tracker.apply(DeviceEvent::Unrecognized("Ready".into())),
            Some(SessionUpdate::Unrecognized("Ready".into()))
        );
        assert!(tracker.keys().is_empty());
    }

    #[test]
    fn test_reset_keeps_history() {
        let mut tracker = SessionTracker::default();
        tracker.apply(DeviceEvent::PublicKey("(7, 187)".into()));
        tracker.apply(original("a"));
        tracker.apply(DeviceEvent::EncryptedValue("97".into()));
        tracker.apply(original("b"));

        tracker.reset();

        assert!(tracker.keys().is_empty());
        assert_eq!(tracker.pending_original(), None);
        assert_eq!(tracker.history().len(), 1);
    }
}
