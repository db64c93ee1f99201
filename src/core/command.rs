//! Outbound request lines
//!
//! The firmware reads `e <message>` to encrypt and `d <message>` to decrypt.
//! The text is forwarded verbatim; framing on the wire is up to the session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of an encryption request
pub const ENCRYPT_PREFIX: &str = "e ";
/// Prefix of a decryption request
pub const DECRYPT_PREFIX: &str = "d ";

/// Build an encryption request line
pub fn encode_encrypt_request(text: &str) -> String {
    format!("{ENCRYPT_PREFIX}{text}")
}

/// Build a decryption request line
pub fn encode_decrypt_request(text: &str) -> String {
    format!("{DECRYPT_PREFIX}{text}")
}

/// Terminator appended to request lines on the wire
///
/// The firmware frames requests by its own read timeout, so nothing is
/// appended unless configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// No terminator
    #[default]
    None,
    /// Line Feed only
    Lf,
    /// Both CR and LF
    CrLf,
}

impl LineEnding {
    /// Get the byte sequence for this line ending
    pub fn bytes(&self) -> &'static [u8] {
        match self {
            Self::None => b"",
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
        }
    }
}

/// A request for the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "text", rename_all = "lowercase")]
pub enum Request {
    /// Encrypt the given text
    Encrypt(String),
    /// Decrypt the given ciphertext
    Decrypt(String),
}

impl Request {
    /// Wire line without terminator
    pub fn to_line(&self) -> String {
        match self {
            Self::Encrypt(text) => encode_encrypt_request(text),
            Self::Decrypt(text) => encode_decrypt_request(text),
        }
    }

    /// Bytes to write, with the given terminator
    pub fn to_wire(&self, ending: LineEnding) -> Vec<u8> {
        let mut data = self.to_line().into_bytes();
        data.extend_from_slice(ending.bytes());
        data
    }

    /// Parse console input of the form `e <text>` or `d <text>`
    ///
    /// A bare `e` or `d` is an empty request.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim_end_matches(['\r', '\n']);
        match input {
            "e" => return Some(Self::Encrypt(String::new())),
            "d" => return Some(Self::Decrypt(String::new())),
            _ => {}
        }
        if let Some(text) = input.strip_prefix(ENCRYPT_PREFIX) {
            Some(Self::Encrypt(text.to_string()))
        } else {
            input
                .strip_prefix(DECRYPT_PREFIX)
                .map(|text| Self::Decrypt(text.to_string()))
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode_encrypt_request("test"), "e test");
        assert_eq!(encode_decrypt_request(""), "d ");
        assert_eq!(encode_decrypt_request("104 105"), "d 104 105");
    }

    #[test]
    fn test_text_is_not_escaped() {
        assert_eq!(encode_encrypt_request(" two  spaces\t"), "e  two  spaces\t");
    }

    #[test]
    fn test_request_line() {
        assert_eq!(Request::Encrypt("hi".into()).to_line(), "e hi");
        assert_eq!(Request::Decrypt(String::new()).to_string(), "d ");
    }

    #[test]
    fn test_wire_bytes() {
        let request = Request::Encrypt("hi".into());
        assert_eq!(request.to_wire(LineEnding::None), b"e hi".to_vec());
        assert_eq!(request.to_wire(LineEnding::CrLf), b"e hi\r\n".to_vec());
    }

    #[test]
    fn test_parse() {
        assert_eq!(Request::parse("e hello world\n"), Some(Request::Encrypt("hello world".into())));
        assert_eq!(Request::parse("d 104 105"), Some(Request::Decrypt("104 105".into())));
        assert_eq!(Request::parse("e"), Some(Request::Encrypt(String::new())));
        assert_eq!(Request::parse("x hi"), None);
        assert_eq!(Request::parse("encrypt"), None);
    }
}
