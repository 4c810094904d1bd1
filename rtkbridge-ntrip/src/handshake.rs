//! NTRIP upload handshakes and response recognition.

use crate::auth::authorization_header;
use crate::config::{EndpointConfig, NtripVersion};
use crate::{AGENT_VERSION, RESPONSE_BUFFER_SIZE};

/// Any of these anywhere in the response means the caster accepted us.
pub const ACCEPT_TOKENS: [&[u8]; 4] = [b"ICY 200", b"HTTP/1.1 200", b"HTTP/1.0 200", b"200 OK"];

/// Credential rejections.
pub const REJECT_TOKENS: [&[u8]; 2] = [b"401 Unauthorized", b"403 Forbidden"];

const LONGEST_TOKEN: usize = 16;

fn agent(config: &EndpointConfig) -> String {
    format!("NTRIP {}/App Version {}", config.client_name, AGENT_VERSION)
}

/// Builds the request bytes for the endpoint's protocol version.
pub fn build_request(config: &EndpointConfig) -> Vec<u8> {
    let request = match config.version {
        NtripVersion::V1 => format!(
            "SOURCE {} /{}\r\nSource-Agent: {}\r\n\r\n",
            config.password,
            config.mountpoint,
            agent(config)
        ),
        NtripVersion::V2 => format!(
            "POST /{} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nAuthorization: {}\r\nNtrip-Version: Ntrip/2.0\r\nConnection: close\r\n\r\n",
            config.mountpoint,
            config.host,
            agent(config),
            authorization_header(&config.username, &config.password)
        ),
    };
    request.into_bytes()
}

/// Wraps one frame as an HTTP/1.1 chunk.
pub fn encode_chunk(frame: &[u8]) -> Vec<u8> {
    let header = format!("{:X}\r\n", frame.len());
    let mut chunk = Vec::with_capacity(header.len() + frame.len() + 2);
    chunk.extend_from_slice(header.as_bytes());
    chunk.extend_from_slice(frame);
    chunk.extend_from_slice(b"\r\n");
    chunk
}

/// Result of scanning the response so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanVerdict {
    Accepted,
    Rejected,
    /// No token yet and room for more.
    Pending,
    /// Buffer exhausted without a token.
    Exhausted,
}

/// Accumulates caster response bytes and looks for status tokens as they arrive.
#[derive(Debug)]
pub struct ResponseScanner {
    buf: Vec<u8>,
    /// Bytes already searched, less the overlap a token could straddle.
    scanned: usize,
}

impl ResponseScanner {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(RESPONSE_BUFFER_SIZE),
            scanned: 0,
        }
    }

    /// Room left before the buffer is exhausted.
    pub fn remaining(&self) -> usize {
        RESPONSE_BUFFER_SIZE - self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn response(&self) -> &[u8] {
        &self.buf
    }

    /// Appends newly read bytes; anything beyond the buffer is ignored.
    pub fn feed(&mut self, data: &[u8]) -> ScanVerdict {
        let take = data.len().min(self.remaining());
        self.buf.extend_from_slice(&data[..take]);

        let window = &self.buf[self.scanned..];
        if ACCEPT_TOKENS.iter().any(|t| contains(window, t)) {
            return ScanVerdict::Accepted;
        }
        if REJECT_TOKENS.iter().any(|t| contains(window, t)) {
            return ScanVerdict::Rejected;
        }

        self.scanned = self.buf.len().saturating_sub(LONGEST_TOKEN - 1);
        if self.remaining() == 0 {
            ScanVerdict::Exhausted
        } else {
            ScanVerdict::Pending
        }
    }
}

impl Default for ResponseScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
