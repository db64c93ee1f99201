//! Session transcript logging
//!
//! Records every line received from the device and every request sent to
//! it, with local timestamps, as plain text or JSON lines.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const FLUSH_EVERY: usize = 32;

/// Transcript format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text
    #[default]
    Text,
    /// JSON lines
    JsonLines,
}

impl LogFormat {
    /// Get file extension for format
    pub fn extension(&self) -> &'static str {
        match self {
            LogFormat::Text => "txt",
            LogFormat::JsonLines => "jsonl",
        }
    }
}

/// Data direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Line from the device
    Received,
    /// Request to the device
    Sent,
    /// Local note (connect, disconnect, errors)
    Info,
}

/// A single transcript entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was recorded
    pub timestamp: DateTime<Local>,
    /// Direction
    pub direction: Direction,
    /// Line content
    pub text: String,
}

impl LogEntry {
    /// Create new entry stamped now
    pub fn new(direction: Direction, text: &str) -> Self {
        Self {
            timestamp: Local::now(),
            direction,
            text: text.to_string(),
        }
    }

    /// Format as text
    pub fn to_text(&self) -> String {
        let dir = match self.direction {
            Direction::Received => "RX",
            Direction::Sent => "TX",
            Direction::Info => "##",
        };
        format!(
            "[{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            dir,
            self.text
        )
    }

    /// Format as JSON line
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Transcript errors
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// Could not open or write the transcript
    #[error("Transcript I/O error on {}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// Transcript writer
pub struct TranscriptLogger {
    writer: Box<dyn Write + Send>,
    format: LogFormat,
    path: Option<PathBuf>,
    lines_logged: usize,
}

impl TranscriptLogger {
    /// Append to a transcript file, creating it if needed
    pub fn open(path: &Path, format: LogFormat) -> Result<Self, TranscriptError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| TranscriptError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| TranscriptError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut logger = Self::from_writer(BufWriter::new(file), format);
        logger.path = Some(path.to_path_buf());
        Ok(logger)
    }

    /// Log into any writer
    pub fn from_writer(writer: impl Write + Send + 'static, format: LogFormat) -> Self {
        Self {
            writer: Box::new(writer),
            format,
            path: None,
            lines_logged: 0,
        }
    }

    /// File backing this transcript, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an entry. Write failures are logged, never propagated.
    pub fn log(&mut self, direction: Direction, text: &str) {
        let entry = LogEntry::new(direction, text);
        let line = match self.format {
            LogFormat::Text => entry.to_text(),
            LogFormat::JsonLines => entry.to_json(),
        };

        if let Err(e) = writeln!(self.writer, "{line}") {
            tracing::warn!("Transcript write failed: {}", e);
            return;
        }
        self.lines_logged += 1;

        if self.lines_logged % FLUSH_EVERY == 0 {
            self.flush();
        }
    }

    /// Log received line
    pub fn log_rx(&mut self, line: &str) {
        self.log(Direction::Received, line);
    }

    /// Log sent request
    pub fn log_tx(&mut self, line: &str) {
        self.log(Direction::Sent, line);
    }

    /// Log info message
    pub fn log_info(&mut self, message: &str) {
        self.log(Direction::Info, message);
    }

    /// Lines written so far
    pub fn lines_logged(&self) -> usize {
        self.lines_logged
    }

    /// Flush to disk
    pub fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!("Transcript flush failed: {}", e);
        }
    }
}

impl Drop for TranscriptLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Generate transcript filename with timestamp
pub fn generate_log_filename(prefix: &str, format: LogFormat) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.{}", prefix, timestamp, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.txt");

        {
            let mut logger = TranscriptLogger::open(&path, LogFormat::Text).unwrap();
            logger.log_info("connected");
            logger.log_tx("e hi");
            logger.log_rx("Original: hi");
            assert_eq!(logger.lines_logged(), 3);
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("## connected"));
        assert!(lines[1].ends_with("TX e hi"));
        assert!(lines[2].ends_with("RX Original: hi"));
        assert!(lines[2].starts_with('['));
    }

    #[test]
    fn test_json_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");

        {
            let mut logger = TranscriptLogger::open(&path, LogFormat::JsonLines).unwrap();
            logger.log_rx("Encrypted: 104 105");
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let entry: LogEntry = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(entry.direction, Direction::Received);
        assert_eq!(entry.text, "Encrypted: 104 105");
    }

    #[test]
    fn test_filename() {
        let name = generate_log_filename("cipherlink", LogFormat::JsonLines);
        assert!(name.starts_with("cipherlink_"));
        assert!(name.ends_with(".jsonl"));
    }
}
