//! Console output rendering
//!
//! Every command prints either human-readable text or one JSON document per
//! item, so the console can be driven from scripts.

use crate::core::history::ExchangeRecord;
use crate::core::replay::ReplayOutcome;
use crate::core::session::{SessionEvent, SessionState};
use crate::core::tracker::KeyMaterial;
use clap::ValueEnum;
use serde_json::json;
use serialport::{SerialPortInfo, SerialPortType};

/// CLI output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON for scripting
    Json,
}

const NONE: &str = "(none)";

fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Disconnected => "disconnected",
        SessionState::Connected => "connected",
    }
}

/// Render the current key material
pub fn render_keys(keys: &KeyMaterial, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!(
            "Public key: {}\nPrivate key: {}",
            keys.public_key.as_deref().unwrap_or(NONE),
            keys.private_key.as_deref().unwrap_or(NONE)
        ),
        OutputFormat::Json => json!(keys).to_string(),
    }
}

/// Render one history record
pub fn render_record(record: &ExchangeRecord, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => record.to_string(),
        OutputFormat::Json => json!(record).to_string(),
    }
}

/// Render a whole history, oldest first
pub fn render_history(records: &[ExchangeRecord], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text if records.is_empty() => "History is empty".to_string(),
        OutputFormat::Text => records
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{:>3}. {r}", i + 1))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Json => json!(records).to_string(),
    }
}

/// Render a session event for the live console
///
/// Unrecognized lines and sent requests are only shown when `verbose`.
pub fn render_event(event: &SessionEvent, format: OutputFormat, verbose: bool) -> Option<String> {
    let text = match (event, format) {
        (SessionEvent::StateChanged(state), OutputFormat::Text) => {
            format!("-- {}", state_label(*state))
        }
        (SessionEvent::StateChanged(state), OutputFormat::Json) => {
            json!({ "event": "state", "state": state_label(*state) }).to_string()
        }
        (SessionEvent::KeysUpdated(keys), OutputFormat::Text) => render_keys(keys, format),
        (SessionEvent::KeysUpdated(keys), OutputFormat::Json) => {
            json!({ "event": "keys", "keys": keys }).to_string()
        }
        (SessionEvent::ExchangeCompleted(record), OutputFormat::Text) => record.to_string(),
        (SessionEvent::ExchangeCompleted(record), OutputFormat::Json) => {
            json!({ "event": "exchange", "record": record }).to_string()
        }
        (SessionEvent::UnrecognizedLine(_) | SessionEvent::RequestSent(_), _) if !verbose => {
            return None
        }
        (SessionEvent::UnrecognizedLine(line), OutputFormat::Text) => format!("<< {line}"),
        (SessionEvent::UnrecognizedLine(line), OutputFormat::Json) => {
            json!({ "event": "unrecognized", "line": line }).to_string()
        }
        (SessionEvent::RequestSent(request), OutputFormat::Text) => format!(">> {request}"),
        (SessionEvent::RequestSent(request), OutputFormat::Json) => {
            json!({ "event": "sent", "request": request }).to_string()
        }
        (SessionEvent::Error(message), OutputFormat::Text) => format!("!! {message}"),
        (SessionEvent::Error(message), OutputFormat::Json) => {
            json!({ "event": "error", "message": message }).to_string()
        }
    };
    Some(text)
}

/// Render the result of an offline replay
pub fn render_replay(outcome: &ReplayOutcome, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json!(outcome).to_string(),
        OutputFormat::Text => {
            let mut out = vec![
                format!("Lines: {}", outcome.lines),
                render_keys(&outcome.keys, format),
                render_history(&outcome.history, format),
            ];
            if let Some(original) = &outcome.pending_original {
                out.push(format!("Pending original: {original}"));
            }
            if !outcome.unrecognized.is_empty() {
                out.push(format!("Unrecognized lines: {}", outcome.unrecognized.len()));
            }
            out.join("\n")
        }
    }
}

fn port_kind(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => match &usb.product {
            Some(product) => format!("USB {:04x}:{:04x} {product}", usb.vid, usb.pid),
            None => format!("USB {:04x}:{:04x}", usb.vid, usb.pid),
        },
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::Unknown => "Unknown".to_string(),
    }
}

/// Render the list of OS serial ports
pub fn render_ports(ports: &[SerialPortInfo], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => ports
            .iter()
            .map(|p| format!("{:<24} {}", p.port_name, port_kind(&p.port_type)))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Json => {
            let ports: Vec<_> = ports
                .iter()
                .map(|p| json!({ "name": p.port_name, "type": port_kind(&p.port_type) }))
                .collect();
            json!(ports).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::Request;
    use crate::core::history::ExchangeKind;

    fn keys() -> KeyMaterial {
        KeyMaterial {
            public_key: Some("(7, 187)".into()),
            private_key: None,
        }
    }

    #[test]
    fn test_render_keys() {
        assert_eq!(
            render_keys(&keys(), OutputFormat::Text),
            "Public key: (7, 187)\nPrivate key: (none)"
        );

        let value: serde_json::Value =
            serde_json::from_str(&render_keys(&keys(), OutputFormat::Json)).unwrap();
        assert_eq!(value["public_key"], "(7, 187)");
        assert!(value["private_key"].is_null());
    }

    #[test]
    fn test_render_history() {
        let records = vec![
            ExchangeRecord::new(ExchangeKind::Encrypted, "hi", "104 105"),
            ExchangeRecord::new(ExchangeKind::Decrypted, "104 105", "hi"),
        ];
        let text = render_history(&records, OutputFormat::Text);
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().next().unwrap().ends_with("Original: hi | Encrypted: 104 105"));

        assert_eq!(render_history(&[], OutputFormat::Text), "History is empty");

        let value: serde_json::Value =
            serde_json::from_str(&render_history(&records, OutputFormat::Json)).unwrap();
        assert_eq!(value[1]["kind"], "decrypted");
    }

    #[test]
    fn test_render_event_verbosity() {
        let line = SessionEvent::UnrecognizedLine("RSA ready".into());
        assert!(render_event(&line, OutputFormat::Text, false).is_none());
        assert_eq!(
            render_event(&line, OutputFormat::Text, true).as_deref(),
            Some("<< RSA ready")
        );

        let sent = SessionEvent::RequestSent(Request::Encrypt("hi".into()));
        assert_eq!(render_event(&sent, OutputFormat::Text, true).as_deref(), Some(">> e hi"));

        let state = SessionEvent::StateChanged(SessionState::Connected);
        let json = render_event(&state, OutputFormat::Json, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["state"], "connected");
    }

    #[test]
    fn test_render_replay() {
        let outcome = ReplayOutcome {
            lines: 3,
            keys: keys(),
            pending_original: Some("hi".into()),
            ..ReplayOutcome::default()
        };
        let text = render_replay(&outcome, OutputFormat::Text);
        assert!(text.starts_with("Lines: 3"));
        assert!(text.contains("Pending original: hi"));
        assert!(!text.contains("Unrecognized"));
    }

    #[test]
    fn test_render_ports() {
        let ports = vec![SerialPortInfo {
            port_name: "/dev/ttyS0".into(),
            port_type: SerialPortType::Unknown,
        }];
        assert!(render_ports(&ports, OutputFormat::Text).starts_with("/dev/ttyS0"));

        let value: serde_json::Value =
            serde_json::from_str(&render_ports(&ports, OutputFormat::Json)).unwrap();
        assert_eq!(value[0]["type"], "Unknown");
    }
}
