//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation. Wire-level
//! failures are split into [`FrameError`] (transport framing) and
//! [`CodecError`] (message body encoding) so the server can decide which ones
//! are recoverable on a live connection.

use thiserror::Error;

use crate::ipc::codec::MessageType;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while encoding or decoding a message body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("not enough data: needed {needed} bytes, {remaining} remaining")]
    NotEnoughData { needed: usize, remaining: usize },

    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("unsupported codec version: {0}")]
    UnsupportedVersion(u8),

    #[error("invalid callback")]
    InvalidCallback,

    #[error("length {0} does not fit in a u32 prefix")]
    LengthOverflow(usize),

    #[error("invalid utf-8 string: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Errors raised by the framed transport.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Outgoing payload does not fit the 16-bit length field.
    #[error("payload of {0} bytes exceeds the maximum frame size")]
    DataTooLong(usize),

    /// Incoming header announces more bytes than the configured limit.
    #[error("frame of {length} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { length: usize, limit: usize },

    #[error("crc mismatch: header says {expected:#06x}, payload hashes to {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether the stream is still aligned on a frame boundary after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::ChecksumMismatch { .. })
    }
}

/// Main error enum for the RPC host.
#[derive(Error, Debug)]
pub enum Error {
    /// Body encoding/decoding errors.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Framing errors.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// No service registered under the requested id.
    #[error("unknown service: {0}")]
    UnknownService(u8),

    /// Service exists but does not implement the request id.
    #[error("unknown method {request} on service {service}")]
    UnknownMethod { service: u8, request: u8 },

    /// A message type that is not valid in this direction.
    #[error("unexpected message type: {0:?}")]
    UnexpectedMessage(MessageType),

    /// Reply does not match the outstanding call.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// eRPC status name for this error, used as a structured log field.
    pub fn status_code(&self) -> &'static str {
        match self {
            Error::Codec(CodecError::NotEnoughData { .. }) => "BUFFER_OVERRUN",
            Error::Codec(CodecError::UnsupportedVersion(_)) => "INVALID_MESSAGE_VERSION",
            Error::Codec(_) => "INVALID_ARGUMENT",
            Error::Frame(FrameError::ChecksumMismatch { .. }) => "CRC_CHECK_FAILED",
            Error::Frame(FrameError::DataTooLong(_) | FrameError::FrameTooLarge { .. }) => {
                "BUFFER_OVERRUN"
            }
            Error::Frame(FrameError::Io(_)) | Error::Io(_) => "CONNECTION_FAILURE",
            Error::UnknownService(_) | Error::UnknownMethod { .. } => "UNKNOWN_NAME",
            Error::UnexpectedMessage(_) => "INVALID_ARGUMENT",
            Error::UnexpectedReply(_) => "EXPECTED_REPLY",
            Error::Timeout(_) => "TIMEOUT",
            Error::Config(_) => "INIT_FAILED",
            Error::Serialization(_) => "FAIL",
        }
    }
}

// Convenience constructors
impl Error {
    pub fn unexpected_reply(msg: impl Into<String>) -> Self {
        Self::UnexpectedReply(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
